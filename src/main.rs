mod telemetry;

use chime_api::Application;
use chime_infra::{run_migration, setup_context};
use telemetry::{get_subscriber, init_subscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    openssl_probe::init_ssl_cert_env_vars();

    let subscriber = get_subscriber("chime_server".into(), "info".into());
    init_subscriber(subscriber);

    let context = setup_context().await;

    if let Some(database_url) = context.config.database_url.clone() {
        run_migration(&database_url)
            .await
            .expect("To run database migrations");
    }

    let app = Application::new(context).await?;
    app.start().await
}
