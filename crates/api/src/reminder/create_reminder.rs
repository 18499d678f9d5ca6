use crate::error::ChimeError;
use crate::shared::usecase::UseCase;
use chime_domain::{parse_command_body, GrammarError, Reminder};
use chime_infra::ChimeContext;
use tracing::error;

#[derive(Debug)]
pub struct CreateReminderUseCase {
    pub room_id: String,
    /// Everything after the command verb, still unparsed
    pub body: String,
    pub target_user: Option<String>,
    pub is_alarm: bool,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    Grammar(GrammarError),
    Duplicate(String),
}

impl From<UseCaseErrors> for ChimeError {
    fn from(e: UseCaseErrors) -> Self {
        match e {
            UseCaseErrors::Grammar(e) => e.into(),
            UseCaseErrors::Duplicate(text) => ChimeError::DuplicateReminder(text),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for CreateReminderUseCase {
    type Response = Reminder;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &ChimeContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        let (trigger, text) = parse_command_body(&self.body, ctx.config.timezone, now)
            .map_err(UseCaseErrors::Grammar)?;

        let reminder = Reminder {
            room_id: self.room_id.clone(),
            text,
            timezone: ctx.config.timezone,
            trigger,
            target_user: self.target_user.clone(),
            is_alarm: self.is_alarm,
        };
        ctx.registry
            .create(reminder.clone(), &ctx.scheduler)
            .map_err(|_| UseCaseErrors::Duplicate(reminder.text.clone()))?;

        // the registry stays the source of truth, a failed write does not
        // undo the armed reminder
        if let Err(e) = ctx.repos.reminder_repo.insert(&reminder).await {
            error!("Unable to save reminder {}: {:?}", reminder.key(), e);
        }

        Ok(reminder)
    }
}
