use chime_api::Application;
use chime_infra::{setup_context_inmemory, ChimeContext, Config, ISys, InMemoryNotifier};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

pub struct TestApp {
    pub ctx: ChimeContext,
    pub notifier: Arc<InMemoryNotifier>,
}

struct LiveSys;

impl ISys for LiveSys {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct StaticSys {
    now: DateTime<Utc>,
}

impl ISys for StaticSys {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

fn test_config() -> Config {
    Config {
        timezone: chrono_tz::Asia::Shanghai,
        port: 0, // Random port
        webhook: None,
        database_url: None,
    }
}

/// Context with the clock stopped at Monday 2025-07-07 10:00 Shanghai
/// time, for flows that never wait on a real timer
pub fn test_context() -> (TestApp, DateTime<Utc>) {
    let tz = chrono_tz::Asia::Shanghai;
    let now = tz.ymd(2025, 7, 7).and_hms(10, 0, 0).with_timezone(&Utc);
    let mut ctx = setup_context_inmemory(test_config(), Arc::new(StaticSys { now }));
    let notifier = Arc::new(InMemoryNotifier::new());
    ctx.notifier = notifier.clone();
    (TestApp { ctx, notifier }, now)
}

// Launch the application as a background task
pub async fn spawn_app() -> (TestApp, String) {
    let mut ctx = setup_context_inmemory(test_config(), Arc::new(LiveSys));
    let notifier = Arc::new(InMemoryNotifier::new());
    ctx.notifier = notifier.clone();

    let app = TestApp {
        ctx: ctx.clone(),
        notifier,
    };
    let application = Application::new(ctx)
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}", application.port());
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    (app, address)
}
