use crate::reminder::fire_reminder::FireReminderUseCase;
use crate::shared::usecase::execute;
use chime_infra::ChimeContext;
use tracing::error;

/// Drains the fired-job queue, running one use case per event.
///
/// The consumer runs on the actix runtime so it can share the
/// context without `Send` bounds. There is exactly one consumer per
/// process, the scheduler hands out its receiver only once.
pub fn start_fired_job_consumer(ctx: ChimeContext) {
    let mut fired_rx = match ctx.scheduler.take_fired_rx() {
        Some(rx) => rx,
        None => {
            error!("Fired job queue already has a consumer, not starting another");
            return;
        }
    };
    actix_web::rt::spawn(async move {
        while let Some(fired) = fired_rx.recv().await {
            let _ = execute(FireReminderUseCase { fired }, &ctx).await;
        }
    });
}
