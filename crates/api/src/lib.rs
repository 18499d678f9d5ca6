pub mod alarm;
pub mod command;
mod error;
mod job_runner;
pub mod reminder;
pub mod shared;
mod status;

pub use command::reply::CommandReply;
pub use command::{dispatch, CommandRequest};
pub use error::ChimeError;

use actix_cors::Cors;
use actix_web::{dev::Server, middleware, web, App, HttpServer};
use chime_infra::ChimeContext;
use job_runner::start_fired_job_consumer;
use reminder::restore_reminders::RestoreRemindersUseCase;
use shared::usecase::execute;
use std::net::TcpListener;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;

pub fn configure_server_api(cfg: &mut web::ServiceConfig) {
    command::configure_routes(cfg);
    status::configure_routes(cfg);
}

pub struct Application {
    server: Server,
    port: u16,
}

impl Application {
    pub async fn new(context: ChimeContext) -> Result<Self, std::io::Error> {
        Application::restore_reminders(&context).await;
        let (server, port) = Application::configure_server(context.clone()).await?;
        start_fired_job_consumer(context);

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Brings stored reminders back into the live registry. Runs to
    /// completion before the server accepts its first command.
    async fn restore_reminders(context: &ChimeContext) {
        match execute(RestoreRemindersUseCase, context).await {
            Ok(summary) => info!(
                "Restored {} reminder(s) from storage, dropped {} stale one-shot(s)",
                summary.restored, summary.dropped
            ),
            Err(e) => error!("Unable to restore stored reminders: {:?}", e),
        }
    }

    async fn configure_server(context: ChimeContext) -> Result<(Server, u16), std::io::Error> {
        let port = context.config.port;
        let address = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr().unwrap().port();

        let server = HttpServer::new(move || {
            let ctx = context.clone();

            App::new()
                .wrap(Cors::permissive())
                .wrap(middleware::Compress::default())
                .wrap(TracingLogger::default())
                .app_data(web::Data::new(ctx))
                .service(web::scope("/api/v1").configure(|cfg| configure_server_api(cfg)))
        })
        .listen(listener)?
        .workers(4)
        .run();

        Ok((server, port))
    }

    pub async fn start(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}
