use chime_api::reminder::fire_reminder::FireReminderUseCase;
use chime_api::shared::usecase::execute;
use chime_api::{dispatch, CommandReply, CommandRequest};
use chime_domain::ReminderKey;
use chime_infra::{ChimeContext, FiredJob, JobPurpose};

/// Delivers the trigger event the scheduler would eventually deliver
/// for `key`, without waiting on its timer
pub async fn fire_trigger(ctx: &ChimeContext, key: &ReminderKey) {
    let job = ctx
        .registry
        .job_for(key)
        .expect("the reminder should have an armed job");
    let fired = FiredJob {
        job,
        key: key.clone(),
        purpose: JobPurpose::Trigger,
    };
    execute(FireReminderUseCase { fired }, ctx)
        .await
        .expect("applying a fired job should not fail");
}

/// Runs a command the way the command endpoint would
pub async fn send_command(ctx: &ChimeContext, room_id: &str, body: &str) -> CommandReply {
    try_send_command(ctx, room_id, body)
        .await
        .expect("the command should succeed")
}

pub async fn try_send_command(
    ctx: &ChimeContext,
    room_id: &str,
    body: &str,
) -> Result<CommandReply, chime_api::ChimeError> {
    let req = CommandRequest {
        room_id: room_id.to_string(),
        sender: "@alice:example.org".to_string(),
        body: body.to_string(),
    };
    dispatch(req, ctx).await
}
