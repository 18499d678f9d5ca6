use crate::error::ChimeError;
use crate::shared::usecase::UseCase;
use chime_domain::Reminder;
use chime_infra::{ChimeContext, FireAction, FiredJob, Notification, NotifyTarget};
use tracing::error;

/// Consumes one event from the fired-job queue: applies it to the registry
/// and delivers whatever notification the outcome calls for.
#[derive(Debug)]
pub struct FireReminderUseCase {
    pub fired: FiredJob,
}

#[derive(Debug)]
pub enum UseCaseErrors {}

impl From<UseCaseErrors> for ChimeError {
    fn from(e: UseCaseErrors) -> Self {
        match e {}
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for FireReminderUseCase {
    type Response = FireAction;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &ChimeContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        let action = ctx.registry.on_job_fired(&self.fired, now, &ctx.scheduler);

        match &action {
            FireAction::Stale => {}
            FireAction::Notify { reminder } => {
                ctx.notifier.notify(&notification(reminder)).await;
            }
            FireAction::NotifyAndComplete { reminder } => {
                ctx.notifier.notify(&notification(reminder)).await;
                let key = reminder.key();
                if let Err(e) = ctx.repos.reminder_repo.delete(&key).await {
                    error!("Unable to delete fired reminder {} from storage: {:?}", key, e);
                }
            }
            FireAction::AlarmFiring { reminder } | FireAction::EscalationTick { reminder } => {
                ctx.notifier.notify(&notification(reminder)).await;
            }
        }

        Ok(action)
    }
}

fn notification(reminder: &Reminder) -> Notification {
    let message = if reminder.is_alarm {
        format!(
            "ALARM: {}! Use the silence command to stop it.",
            reminder.text
        )
    } else {
        format!("Reminder: {}", reminder.text)
    };
    Notification {
        room_id: reminder.room_id.clone(),
        message,
        target: match &reminder.target_user {
            Some(user) => NotifyTarget::User(user.clone()),
            None => NotifyTarget::Room,
        },
    }
}
