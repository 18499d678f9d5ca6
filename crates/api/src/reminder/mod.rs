pub mod cancel_reminder;
pub mod create_reminder;
pub mod fire_reminder;
pub mod list_reminders;
pub mod restore_reminders;
