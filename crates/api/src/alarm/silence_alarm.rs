use crate::error::ChimeError;
use crate::shared::usecase::UseCase;
use chime_domain::{Reminder, ReminderKey};
use chime_infra::{ChimeContext, SilenceOutcome};
use tracing::error;

#[derive(Debug)]
pub struct SilenceAlarmUseCase {
    pub room_id: String,
    /// Exact (case-insensitive) alarm text, or `None` to silence the first
    /// firing alarm of the room
    pub text: Option<String>,
}

#[derive(Debug)]
pub enum SilenceResult {
    Silenced { reminder: Reminder },
    /// The text names a reminder that exists but is not ringing
    KnownButNotFiring { text: String },
    /// Nothing is ringing in this room (no-text variant only)
    NothingFiring,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    UnknownAlarm(String),
}

impl From<UseCaseErrors> for ChimeError {
    fn from(e: UseCaseErrors) -> Self {
        match e {
            UseCaseErrors::UnknownAlarm(text) => ChimeError::UnknownAlarm(text),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for SilenceAlarmUseCase {
    type Response = SilenceResult;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &ChimeContext) -> Result<Self::Response, Self::Errors> {
        match &self.text {
            Some(text) => {
                match ctx
                    .registry
                    .silence_by_text(&self.room_id, text, &ctx.scheduler)
                {
                    SilenceOutcome::Silenced {
                        reminder,
                        completed,
                    } => {
                        finish(ctx, &reminder, completed).await;
                        Ok(SilenceResult::Silenced { reminder })
                    }
                    SilenceOutcome::KnownButNotFiring => Ok(SilenceResult::KnownButNotFiring {
                        text: text.clone(),
                    }),
                    SilenceOutcome::Unknown => Err(UseCaseErrors::UnknownAlarm(text.clone())),
                }
            }
            None => match ctx.registry.silence_first(&self.room_id, &ctx.scheduler) {
                Some((reminder, completed)) => {
                    finish(ctx, &reminder, completed).await;
                    Ok(SilenceResult::Silenced { reminder })
                }
                None => Ok(SilenceResult::NothingFiring),
            },
        }
    }
}

/// A silenced one-shot alarm is over for good, its durable record goes too
async fn finish(ctx: &ChimeContext, reminder: &Reminder, completed: bool) {
    if !completed {
        return;
    }
    let key = reminder.key();
    if let Err(e) = ctx.repos.reminder_repo.delete(&key).await {
        error!("Unable to delete silenced alarm {} from storage: {:?}", key, e);
    }
}
