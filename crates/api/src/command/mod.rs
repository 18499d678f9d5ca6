pub mod reply;

use crate::alarm::silence_alarm::{SilenceAlarmUseCase, SilenceResult};
use crate::error::ChimeError;
use crate::reminder::cancel_reminder::CancelReminderUseCase;
use crate::reminder::create_reminder::CreateReminderUseCase;
use crate::reminder::list_reminders::ListRemindersUseCase;
use crate::shared::usecase::execute;
use actix_web::{web, HttpResponse};
use chime_infra::ChimeContext;
use reply::CommandReply;
use serde::Deserialize;

/// A command as the chat transport delivers it: the sender already
/// verified, the bot prefix already stripped
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub room_id: String,
    pub sender: String,
    pub body: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/command", web::post().to(command_controller));
}

async fn command_controller(
    req: web::Json<CommandRequest>,
    ctx: web::Data<ChimeContext>,
) -> Result<HttpResponse, ChimeError> {
    let reply = dispatch(req.into_inner(), &ctx).await?;
    Ok(HttpResponse::Ok().json(reply))
}

/// Routes a raw command body to its use case and renders the reply
pub async fn dispatch(req: CommandRequest, ctx: &ChimeContext) -> Result<CommandReply, ChimeError> {
    let body = req.body.trim();
    let (verb, args) = split_verb(body);

    match verb.to_lowercase().as_str() {
        "remindme" | "remind" | "r" => {
            create_reminder(ctx, &req, args, Some(req.sender.clone()), false).await
        }
        "remindroom" | "rr" => create_reminder(ctx, &req, args, None, false).await,
        "alarmme" | "alarm" | "a" => {
            create_reminder(ctx, &req, args, Some(req.sender.clone()), true).await
        }
        "alarmroom" | "ar" => create_reminder(ctx, &req, args, None, true).await,
        "listreminders" | "listalarms" | "list" | "lr" | "la" | "l" => {
            let usecase = ListRemindersUseCase {
                room_id: req.room_id.clone(),
            };
            let reminders = execute(usecase, ctx).await?;
            Ok(CommandReply::listing(reminders))
        }
        "delreminder" | "deletereminder" | "removereminder" | "cancelreminder" | "delalarm"
        | "deletealarm" | "removealarm" | "cancelalarm" | "cancel" | "rm" | "cr" | "ca" | "d"
        | "c" => {
            if args.is_empty() {
                return Err(ChimeError::SyntaxError(
                    "expected the text of the reminder to cancel".to_string(),
                ));
            }
            let usecase = CancelReminderUseCase {
                room_id: req.room_id.clone(),
                text: args.to_string(),
            };
            let reminder = execute(usecase, ctx).await?;
            Ok(CommandReply::cancelled(&reminder))
        }
        "silence" | "s" => {
            let text = if args.is_empty() {
                None
            } else {
                Some(args.to_string())
            };
            let usecase = SilenceAlarmUseCase {
                room_id: req.room_id.clone(),
                text,
            };
            match execute(usecase, ctx).await? {
                SilenceResult::Silenced { reminder } => Ok(CommandReply::silenced(&reminder)),
                SilenceResult::KnownButNotFiring { text } => {
                    Ok(CommandReply::alarm_not_firing(&text))
                }
                SilenceResult::NothingFiring => Ok(CommandReply::nothing_firing()),
            }
        }
        _ => Err(ChimeError::UnknownCommand(verb.to_string())),
    }
}

fn split_verb(body: &str) -> (&str, &str) {
    match body.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (body, ""),
    }
}

async fn create_reminder(
    ctx: &ChimeContext,
    req: &CommandRequest,
    args: &str,
    target_user: Option<String>,
    is_alarm: bool,
) -> Result<CommandReply, ChimeError> {
    let usecase = CreateReminderUseCase {
        room_id: req.room_id.clone(),
        body: args.to_string(),
        target_user,
        is_alarm,
    };
    let reminder = execute(usecase, ctx).await?;
    let next_run = reminder
        .trigger
        .next_occurrence(reminder.timezone, ctx.sys.now());
    Ok(CommandReply::created(&reminder, &req.sender, next_run))
}
