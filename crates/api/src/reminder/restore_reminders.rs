use crate::error::ChimeError;
use crate::shared::usecase::UseCase;
use chime_domain::Trigger;
use chime_infra::ChimeContext;
use tracing::{error, info};

/// Re-populates the registry from the durable store. Runs once at startup,
/// before the server starts taking commands.
#[derive(Debug)]
pub struct RestoreRemindersUseCase;

#[derive(Debug)]
pub struct RestoreSummary {
    pub restored: usize,
    pub dropped: usize,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

impl From<UseCaseErrors> for ChimeError {
    fn from(e: UseCaseErrors) -> Self {
        match e {
            UseCaseErrors::StorageError => ChimeError::InternalError,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for RestoreRemindersUseCase {
    type Response = RestoreSummary;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &ChimeContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        let records = ctx
            .repos
            .reminder_repo
            .find_all()
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;

        let mut restored = 0;
        let mut dropped = 0;
        for reminder in records {
            // a one-shot that came due while the process was down will never
            // fire again, drop the record instead of re-arming it
            let stale = matches!(&reminder.trigger, Trigger::OneShot(at) if *at <= now);
            if stale {
                let key = reminder.key();
                info!("Dropping stale one-shot reminder {}", key);
                if let Err(e) = ctx.repos.reminder_repo.delete(&key).await {
                    error!("Unable to delete stale reminder {}: {:?}", key, e);
                }
                dropped += 1;
                continue;
            }
            if ctx.registry.restore(reminder, &ctx.scheduler).is_some() {
                restored += 1;
            }
        }

        Ok(RestoreSummary { restored, dropped })
    }
}
