use std::collections::BTreeMap;
use std::sync::Mutex;

use chime_domain::{Reminder, ReminderKey, Trigger, TriggerKind};
use chrono::{DateTime, Utc};

use crate::scheduler::{FiredJob, JobId, JobPurpose, JobScheduler};

/// A reminder together with the job keeping it alive
#[derive(Debug, Clone)]
struct ActiveReminder {
    reminder: Reminder,
    job: JobId,
}

/// Escalation state of an alarm that is currently ringing
#[derive(Debug, Clone)]
struct FiringAlarm {
    escalation_job: JobId,
}

#[derive(Default)]
struct RegistryState {
    reminders: BTreeMap<ReminderKey, ActiveReminder>,
    firing: BTreeMap<ReminderKey, FiringAlarm>,
}

/// The live reminder table of the engine.
///
/// All of the mutable state lives behind one lock: the reminder entries and
/// the set of currently firing alarms. Every entry has exactly one armed
/// trigger job, every firing alarm exactly one escalation job. Scheduler
/// calls are made while holding the lock, which is safe because arming and
/// cancelling never block; the ordering is always registry before scheduler.
pub struct Registry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, PartialEq)]
pub struct DuplicateKey;

/// What the engine should do about a fired job
#[derive(Debug)]
pub enum FireAction {
    /// The event refers to a job that was cancelled or replaced while the
    /// event was in flight; drop it
    Stale,
    /// Notify the room; the reminder stays armed (recurring trigger)
    Notify { reminder: Reminder },
    /// Notify the room and delete the durable record (finished one-shot)
    NotifyAndComplete { reminder: Reminder },
    /// An alarm became due (or rang again on a recurring trigger); notify
    AlarmFiring { reminder: Reminder },
    /// A firing alarm re-notifies until silenced
    EscalationTick { reminder: Reminder },
}

/// Result of silencing a named alarm
#[derive(Debug)]
pub enum SilenceOutcome {
    /// The escalation loop was stopped. `completed` is set when the alarm
    /// was a fired one-shot, which is fully over once silenced and should
    /// be deleted from the store.
    Silenced { reminder: Reminder, completed: bool },
    /// The text names a known reminder that is not ringing right now
    KnownButNotFiring,
    /// The text names nothing in this room
    Unknown,
}

/// A room reminder as presented by a listing
#[derive(Debug, Clone)]
pub struct RoomReminder {
    pub reminder: Reminder,
    pub next_run: Option<DateTime<Utc>>,
    pub firing: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Arms and registers a new reminder. Fails when the room already has a
    /// reminder with the same normalized text.
    pub fn create(&self, reminder: Reminder, scheduler: &JobScheduler) -> Result<JobId, DuplicateKey> {
        let mut state = self.state.lock().unwrap();
        let key = reminder.key();
        if state.reminders.contains_key(&key) {
            return Err(DuplicateKey);
        }
        let job = scheduler.arm(&key, &reminder.trigger, reminder.timezone, JobPurpose::Trigger);
        state.reminders.insert(key, ActiveReminder { reminder, job });
        Ok(job)
    }

    /// Like [`create`](Self::create) but duplicates are skipped instead of
    /// being an error, which is what a startup reload wants
    pub fn restore(&self, reminder: Reminder, scheduler: &JobScheduler) -> Option<JobId> {
        self.create(reminder, scheduler).ok()
    }

    pub fn find(&self, key: &ReminderKey) -> Option<Reminder> {
        let state = self.state.lock().unwrap();
        state.reminders.get(key).map(|active| active.reminder.clone())
    }

    /// The job currently armed for a reminder
    pub fn job_for(&self, key: &ReminderKey) -> Option<JobId> {
        let state = self.state.lock().unwrap();
        state.reminders.get(key).map(|active| active.job)
    }

    pub fn is_firing(&self, key: &ReminderKey) -> bool {
        self.state.lock().unwrap().firing.contains_key(key)
    }

    pub fn reminder_count(&self) -> usize {
        self.state.lock().unwrap().reminders.len()
    }

    /// All reminders of a room in key order, with their next run times
    pub fn list_room(
        &self,
        room_id: &str,
        scheduler: &JobScheduler,
        now: DateTime<Utc>,
    ) -> Vec<RoomReminder> {
        let state = self.state.lock().unwrap();
        state
            .reminders
            .values()
            .filter(|active| active.reminder.room_id == room_id)
            .map(|active| RoomReminder {
                reminder: active.reminder.clone(),
                next_run: scheduler.next_run_time(active.job, now),
                firing: state.firing.contains_key(&active.reminder.key()),
            })
            .collect()
    }

    /// Removes a reminder and stops its jobs, the escalation one included
    /// when it happens to be ringing
    pub fn cancel(&self, key: &ReminderKey, scheduler: &JobScheduler) -> Option<Reminder> {
        let mut state = self.state.lock().unwrap();
        let active = state.reminders.remove(key)?;
        scheduler.cancel(active.job);
        if let Some(alarm) = state.firing.remove(key) {
            scheduler.cancel(alarm.escalation_job);
        }
        Some(active.reminder)
    }

    /// Applies a fired-job event to the table and says what to do about it.
    ///
    /// Events whose job no longer matches the registered one are reported
    /// as [`FireAction::Stale`]: the job was cancelled, or the reminder was
    /// cancelled and re-created, while the event sat in the queue.
    pub fn on_job_fired(
        &self,
        fired: &FiredJob,
        now: DateTime<Utc>,
        scheduler: &JobScheduler,
    ) -> FireAction {
        let mut state = self.state.lock().unwrap();
        match fired.purpose {
            JobPurpose::Trigger => {
                let active = match state.reminders.get(&fired.key) {
                    Some(active) if active.job == fired.job => active.clone(),
                    _ => return FireAction::Stale,
                };
                if active.reminder.is_alarm {
                    if !state.firing.contains_key(&fired.key) {
                        let escalation = Trigger::escalation(now);
                        let escalation_job = scheduler.arm(
                            &fired.key,
                            &escalation,
                            active.reminder.timezone,
                            JobPurpose::Escalation,
                        );
                        state
                            .firing
                            .insert(fired.key.clone(), FiringAlarm { escalation_job });
                    }
                    // a one-shot alarm keeps its entry while ringing so that
                    // listing and silencing still see it
                    FireAction::AlarmFiring {
                        reminder: active.reminder,
                    }
                } else if active.reminder.trigger.kind() == TriggerKind::OneShot {
                    state.reminders.remove(&fired.key);
                    // normally the job has already unregistered itself,
                    // cancelling is a no-op then
                    scheduler.cancel(active.job);
                    FireAction::NotifyAndComplete {
                        reminder: active.reminder,
                    }
                } else {
                    FireAction::Notify {
                        reminder: active.reminder,
                    }
                }
            }
            JobPurpose::Escalation => {
                match state.firing.get(&fired.key) {
                    Some(alarm) if alarm.escalation_job == fired.job => {}
                    _ => return FireAction::Stale,
                }
                match state.reminders.get(&fired.key) {
                    Some(active) => FireAction::EscalationTick {
                        reminder: active.reminder.clone(),
                    },
                    // a firing entry without an owner should not exist; drop
                    // the stray loop so it cannot ring forever
                    None => {
                        if let Some(alarm) = state.firing.remove(&fired.key) {
                            scheduler.cancel(alarm.escalation_job);
                        }
                        FireAction::Stale
                    }
                }
            }
        }
    }

    /// Silences the alarm with the given text
    pub fn silence_by_text(
        &self,
        room_id: &str,
        text: &str,
        scheduler: &JobScheduler,
    ) -> SilenceOutcome {
        let key = ReminderKey::new(room_id, text);
        let mut state = self.state.lock().unwrap();
        if state.firing.contains_key(&key) {
            return Self::silence_entry(&mut state, &key, scheduler);
        }
        if state.reminders.contains_key(&key) {
            SilenceOutcome::KnownButNotFiring
        } else {
            SilenceOutcome::Unknown
        }
    }

    /// Silences some firing alarm of the room, in key order so repeated
    /// calls work through them deterministically. `None` when nothing in
    /// the room is ringing.
    pub fn silence_first(
        &self,
        room_id: &str,
        scheduler: &JobScheduler,
    ) -> Option<(Reminder, bool)> {
        let mut state = self.state.lock().unwrap();
        let key = state
            .firing
            .keys()
            .find(|key| key.room_id == room_id)
            .cloned()?;
        match Self::silence_entry(&mut state, &key, scheduler) {
            SilenceOutcome::Silenced {
                reminder,
                completed,
            } => Some((reminder, completed)),
            _ => None,
        }
    }

    fn silence_entry(
        state: &mut RegistryState,
        key: &ReminderKey,
        scheduler: &JobScheduler,
    ) -> SilenceOutcome {
        let alarm = match state.firing.remove(key) {
            Some(alarm) => alarm,
            None => return SilenceOutcome::Unknown,
        };
        scheduler.cancel(alarm.escalation_job);
        let active = match state.reminders.get(key).cloned() {
            Some(active) => active,
            // self-heal a stray firing entry
            None => return SilenceOutcome::Unknown,
        };
        // a fired one-shot has nothing left to arm; silencing finishes it
        let completed = active.reminder.trigger.kind() == TriggerKind::OneShot;
        if completed {
            state.reminders.remove(key);
            scheduler.cancel(active.job);
        }
        SilenceOutcome::Silenced {
            reminder: active.reminder,
            completed,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn far_future() -> DateTime<Utc> {
        Utc.ymd(2035, 1, 1).and_hms(12, 0, 0)
    }

    fn one_shot(room_id: &str, text: &str, is_alarm: bool) -> Reminder {
        Reminder {
            room_id: room_id.to_string(),
            text: text.to_string(),
            timezone: chrono_tz::UTC,
            trigger: Trigger::OneShot(far_future()),
            target_user: Some("@alice:example.org".to_string()),
            is_alarm,
        }
    }

    fn interval(room_id: &str, text: &str, is_alarm: bool) -> Reminder {
        Reminder {
            room_id: room_id.to_string(),
            text: text.to_string(),
            timezone: chrono_tz::UTC,
            trigger: Trigger::Every {
                start: far_future(),
                period: Duration::weeks(1),
            },
            target_user: None,
            is_alarm,
        }
    }

    fn fired(job: JobId, key: &ReminderKey, purpose: JobPurpose) -> FiredJob {
        FiredJob {
            job,
            key: key.clone(),
            purpose,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_texts_case_insensitively() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        registry
            .create(one_shot("!r:x.org", "Buy milk", false), &scheduler)
            .unwrap();
        assert_eq!(
            registry.create(one_shot("!r:x.org", "BUY MILK", false), &scheduler),
            Err(DuplicateKey)
        );
        // same text in another room is fine
        assert!(registry
            .create(one_shot("!other:x.org", "buy milk", false), &scheduler)
            .is_ok());
        assert_eq!(registry.reminder_count(), 2);
        assert_eq!(scheduler.job_count(), 2);
    }

    #[tokio::test]
    async fn cancel_removes_the_entry_and_its_job() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = one_shot("!r:x.org", "Standup", false);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();

        let cancelled = registry.cancel(&key, &scheduler).unwrap();
        assert_eq!(cancelled.text, "Standup");
        assert!(!scheduler.contains(job));
        assert!(registry.cancel(&key, &scheduler).is_none());
    }

    #[tokio::test]
    async fn fired_one_shot_notifies_and_completes() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = one_shot("!r:x.org", "Standup", false);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();

        match registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), far_future(), &scheduler)
        {
            FireAction::NotifyAndComplete { reminder } => assert_eq!(reminder.text, "Standup"),
            other => panic!("expected notify-and-complete, got {:?}", other),
        }
        assert_eq!(registry.reminder_count(), 0);
    }

    #[tokio::test]
    async fn fired_interval_notifies_and_stays() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = interval("!r:x.org", "Weekly report", false);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();

        match registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), far_future(), &scheduler)
        {
            FireAction::Notify { .. } => {}
            other => panic!("expected notify, got {:?}", other),
        }
        assert_eq!(registry.reminder_count(), 1);
        assert!(!registry.is_firing(&key));
    }

    #[tokio::test]
    async fn fired_event_with_an_unknown_job_is_stale() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = one_shot("!r:x.org", "Standup", false);
        let key = reminder.key();
        registry.create(reminder, &scheduler).unwrap();

        // an event from a job that was since replaced
        let other_job = scheduler.arm(
            &key,
            &Trigger::OneShot(far_future()),
            chrono_tz::UTC,
            JobPurpose::Trigger,
        );
        match registry.on_job_fired(
            &fired(other_job, &key, JobPurpose::Trigger),
            far_future(),
            &scheduler,
        ) {
            FireAction::Stale => {}
            other => panic!("expected stale, got {:?}", other),
        }
        assert_eq!(registry.reminder_count(), 1);
    }

    #[tokio::test]
    async fn fired_alarm_arms_exactly_one_escalation_loop() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = one_shot("!r:x.org", "WAKE UP", true);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();
        let now = far_future();

        match registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), now, &scheduler) {
            FireAction::AlarmFiring { reminder } => assert_eq!(reminder.text, "WAKE UP"),
            other => panic!("expected alarm-firing, got {:?}", other),
        }
        assert!(registry.is_firing(&key));
        // the entry survives so listing and silencing can still find it
        assert_eq!(registry.reminder_count(), 1);
        let escalation_job = registry.state.lock().unwrap().firing[&key].escalation_job;
        assert!(scheduler.contains(escalation_job));

        // a repeated firing must not arm a second loop
        match registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), now, &scheduler) {
            FireAction::AlarmFiring { .. } => {}
            other => panic!("expected alarm-firing, got {:?}", other),
        }
        assert_eq!(
            registry.state.lock().unwrap().firing[&key].escalation_job,
            escalation_job
        );
    }

    #[tokio::test]
    async fn escalation_ticks_renotify_until_silenced() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = one_shot("!r:x.org", "WAKE UP", true);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();
        let now = far_future();
        registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), now, &scheduler);
        let escalation_job = registry.state.lock().unwrap().firing[&key].escalation_job;

        match registry.on_job_fired(
            &fired(escalation_job, &key, JobPurpose::Escalation),
            now + Duration::minutes(5),
            &scheduler,
        ) {
            FireAction::EscalationTick { reminder } => assert_eq!(reminder.text, "WAKE UP"),
            other => panic!("expected an escalation tick, got {:?}", other),
        }

        match registry.silence_by_text("!r:x.org", "wake up", &scheduler) {
            SilenceOutcome::Silenced {
                reminder,
                completed,
            } => {
                assert_eq!(reminder.text, "WAKE UP");
                // a fired one-shot alarm is over once silenced
                assert!(completed);
            }
            other => panic!("expected silenced, got {:?}", other),
        }
        assert!(!registry.is_firing(&key));
        assert_eq!(registry.reminder_count(), 0);
        assert!(!scheduler.contains(escalation_job));

        // a tick that was already in flight when the alarm was silenced
        match registry.on_job_fired(
            &fired(escalation_job, &key, JobPurpose::Escalation),
            now + Duration::minutes(10),
            &scheduler,
        ) {
            FireAction::Stale => {}
            other => panic!("expected stale, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silencing_a_recurring_alarm_keeps_it_armed() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = interval("!r:x.org", "Backup check", true);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();
        registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), far_future(), &scheduler);
        assert!(registry.is_firing(&key));

        match registry.silence_by_text("!r:x.org", "Backup check", &scheduler) {
            SilenceOutcome::Silenced { completed, .. } => assert!(!completed),
            other => panic!("expected silenced, got {:?}", other),
        }
        assert!(!registry.is_firing(&key));
        // still registered and still armed for the next occurrence
        assert_eq!(registry.reminder_count(), 1);
        assert!(scheduler.contains(job));
    }

    #[tokio::test]
    async fn silence_distinguishes_known_idle_and_unknown_texts() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        registry
            .create(one_shot("!r:x.org", "WAKE UP", true), &scheduler)
            .unwrap();

        match registry.silence_by_text("!r:x.org", "wake up", &scheduler) {
            SilenceOutcome::KnownButNotFiring => {}
            other => panic!("expected known-but-not-firing, got {:?}", other),
        }
        match registry.silence_by_text("!r:x.org", "no such alarm", &scheduler) {
            SilenceOutcome::Unknown => {}
            other => panic!("expected unknown, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silence_first_works_through_alarms_in_key_order() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();
        let now = far_future();

        for text in &["Alpha", "Beta"] {
            let reminder = one_shot("!r:x.org", text, true);
            let key = reminder.key();
            let job = registry.create(reminder, &scheduler).unwrap();
            registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), now, &scheduler);
        }
        // another room's alarm must not be touched
        let other = one_shot("!other:x.org", "Gamma", true);
        let other_key = other.key();
        let other_job = registry.create(other, &scheduler).unwrap();
        registry.on_job_fired(&fired(other_job, &other_key, JobPurpose::Trigger), now, &scheduler);

        let (first, _) = registry.silence_first("!r:x.org", &scheduler).unwrap();
        assert_eq!(first.text, "Alpha");
        let (second, _) = registry.silence_first("!r:x.org", &scheduler).unwrap();
        assert_eq!(second.text, "Beta");
        assert!(registry.silence_first("!r:x.org", &scheduler).is_none());
        assert!(registry.is_firing(&other_key));
    }

    #[tokio::test]
    async fn cancel_also_stops_a_ringing_alarm() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = interval("!r:x.org", "Backup check", true);
        let key = reminder.key();
        let job = registry.create(reminder, &scheduler).unwrap();
        registry.on_job_fired(&fired(job, &key, JobPurpose::Trigger), far_future(), &scheduler);
        assert!(registry.is_firing(&key));

        registry.cancel(&key, &scheduler).unwrap();
        assert!(!registry.is_firing(&key));
        assert_eq!(scheduler.job_count(), 0);
    }

    #[tokio::test]
    async fn listing_reports_next_runs_and_firing_state() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();
        let now = Utc.ymd(2030, 1, 1).and_hms(0, 0, 0);

        let reminder = interval("!r:x.org", "Weekly report", false);
        registry.create(reminder, &scheduler).unwrap();
        registry
            .create(one_shot("!r:x.org", "One off", false), &scheduler)
            .unwrap();
        registry
            .create(one_shot("!elsewhere:x.org", "Other room", false), &scheduler)
            .unwrap();

        let listed = registry.list_room("!r:x.org", &scheduler, now);
        assert_eq!(listed.len(), 2);
        for entry in &listed {
            assert_eq!(entry.next_run, Some(far_future()));
            assert!(!entry.firing);
        }
    }

    #[tokio::test]
    async fn restore_skips_duplicates() {
        let registry = Registry::new();
        let scheduler = JobScheduler::new();

        let reminder = one_shot("!r:x.org", "Standup", false);
        assert!(registry.restore(reminder.clone(), &scheduler).is_some());
        assert!(registry.restore(reminder, &scheduler).is_none());
        assert_eq!(registry.reminder_count(), 1);
    }
}
