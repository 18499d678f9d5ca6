use crate::error::ChimeError;
use crate::shared::usecase::UseCase;
use chime_domain::{Reminder, ReminderKey};
use chime_infra::ChimeContext;
use tracing::error;

#[derive(Debug)]
pub struct CancelReminderUseCase {
    pub room_id: String,
    pub text: String,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(String),
}

impl From<UseCaseErrors> for ChimeError {
    fn from(e: UseCaseErrors) -> Self {
        match e {
            UseCaseErrors::NotFound(text) => ChimeError::UnknownReminder(text),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for CancelReminderUseCase {
    type Response = Reminder;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &ChimeContext) -> Result<Self::Response, Self::Errors> {
        let key = ReminderKey::new(&self.room_id, &self.text);
        let reminder = ctx
            .registry
            .cancel(&key, &ctx.scheduler)
            .ok_or_else(|| UseCaseErrors::NotFound(self.text.clone()))?;

        if let Err(e) = ctx.repos.reminder_repo.delete(&key).await {
            error!("Unable to delete reminder {} from storage: {:?}", key, e);
        }

        Ok(reminder)
    }
}
