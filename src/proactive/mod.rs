//! Proactive agent
//!
//! Decides when to reach out to a user and delivers the message: digests,
//! habit nudges, context alerts, memory reminders and wake-up calls. The
//! [`ProactiveScheduler`] drives it on a fixed interval.

mod dedup;
mod digest;
mod scheduler;
mod suggest;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::{Map, Value};

pub use dedup::DedupPolicy;
pub use digest::{
    ALL_CLEAR_DIGEST, FALLBACK_DIGEST, calendar_conflict_alert, conflict_resolution_prompt,
    evening_digest, habit_check_message, morning_digest, overdue_reminder_alert,
    overdue_reminder_summary, urgent_email_alert, urgent_email_summary,
};
pub use scheduler::{ProactiveScheduler, SchedulerHandle};
pub use suggest::{
    DEFAULT_DUE_WINDOW_HOURS, Priority, Suggestion, SuggestionKind, context_suggestions,
    habit_suggestions, rank_suggestions,
};

use crate::Result;
use crate::channels::OutboundChannel;
use crate::config::ProactiveConfig;
use crate::context::{ContextAggregator, UserContext};
use crate::db::{
    DbPool, MemoryType, ProactiveTask, SignalRepo, TaskKind, TaskRepo, TaskStatus, User,
    UserRepo,
};
use crate::habits::HabitEngine;
use crate::memory::{MemoryStore, NewMemory, reminder_message};

/// Signal names recorded in `proactive_signals`
pub mod signal {
    pub const MORNING_DIGEST: &str = "morning_digest";
    pub const EVENING_DIGEST: &str = "evening_digest";
    pub const HABIT_CHECK: &str = "habit_check";
    pub const URGENT_EMAIL: &str = "urgent_email";
    pub const CALENDAR_CONFLICT: &str = "calendar_conflict";
    pub const OVERDUE_REMINDERS: &str = "overdue_reminders";
    pub const HABIT_ANALYSIS: &str = "habit_analysis";
}

const PROACTIVE_IMPORTANCE: f64 = 0.5;

/// Suggestions listed in one habit check
const DIGEST_HABIT_LIMIT: usize = 3;

const DEFAULT_WAKEUP_MESSAGE: &str = "Good morning! Time to wake up.";

/// Something the user asked the agent to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProactiveAction {
    MorningDigest,
    /// Schedule a wake-up call, by default at 07:00 UTC tomorrow
    ScheduleWakeup {
        at: Option<DateTime<Utc>>,
        message: Option<String>,
    },
    SummarizeEmails,
    ResolveConflicts,
    ExecuteHabit {
        habit_id: String,
    },
    CheckReminders,
}

impl ProactiveAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MorningDigest => "morning_digest",
            Self::ScheduleWakeup { .. } => "schedule_wakeup",
            Self::SummarizeEmails => "summarize_emails",
            Self::ResolveConflicts => "resolve_conflicts",
            Self::ExecuteHabit { .. } => "execute_habit",
            Self::CheckReminders => "check_reminders",
        }
    }
}

/// Result of [`ProactiveAgent::execute_action`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Totals for one scheduler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub users: usize,
    pub messages_sent: usize,
    pub tasks_processed: usize,
    pub habits_analyzed: usize,
}

/// Proactive messaging service
#[derive(Clone)]
pub struct ProactiveAgent {
    users: UserRepo,
    memories: MemoryStore,
    habits: HabitEngine,
    context: ContextAggregator,
    tasks: TaskRepo,
    signals: SignalRepo,
    channel: Arc<dyn OutboundChannel>,
    config: ProactiveConfig,
}

impl ProactiveAgent {
    #[must_use]
    pub fn new(
        pool: &DbPool,
        memories: MemoryStore,
        habits: HabitEngine,
        context: ContextAggregator,
        channel: Arc<dyn OutboundChannel>,
        config: ProactiveConfig,
    ) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            memories,
            habits,
            context,
            tasks: TaskRepo::new(pool.clone()),
            signals: SignalRepo::new(pool.clone()),
            channel,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ProactiveConfig {
        &self.config
    }

    /// Users the scheduler should visit
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn active_users(&self) -> Result<Vec<User>> {
        self.users.list_active()
    }

    /// Ranked habit and context suggestions for a user
    ///
    /// # Errors
    ///
    /// Returns error if the habit store fails
    pub async fn suggest(&self, user_id: &str, limit: usize) -> Result<Vec<Suggestion>> {
        let habits = self.habits.list(user_id)?;
        let mut suggestions = habit_suggestions(&habits, Utc::now(), self.config.due_soon_hours);

        match self.context.get_full_context(user_id, false).await {
            Ok(context) => suggestions.extend(context_suggestions(&context)),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "context unavailable for suggestions");
            }
        }

        Ok(rank_suggestions(suggestions, limit))
    }

    /// Morning digest text, or a static greeting if context is unavailable
    pub async fn morning_digest(&self, user_id: &str) -> String {
        match self.context.get_full_context(user_id, false).await {
            Ok(context) => morning_digest(&context),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "falling back to static digest");
                FALLBACK_DIGEST.to_string()
            }
        }
    }

    /// Evening digest previewing tomorrow
    pub async fn evening_digest(&self, user_id: &str) -> String {
        evening_digest(&self.context.tomorrow_preview(user_id).await)
    }

    /// Deliver one proactive message and record it
    ///
    /// A failed send is logged and returns `false` without recording the
    /// signal, so the next cycle tries again.
    ///
    /// # Errors
    ///
    /// Returns error if the delivered message cannot be recorded
    pub async fn send_proactive_message(
        &self,
        user: &User,
        message: &str,
        signal: &str,
        priority: Priority,
    ) -> Result<bool> {
        if let Err(e) = self.channel.send_sms(&user.phone_number, message).await {
            tracing::warn!(
                user_id = %user.id,
                signal,
                channel = self.channel.name(),
                error = %e,
                "proactive message failed"
            );
            return Ok(false);
        }

        let mut context_data = Map::new();
        context_data.insert("signal".to_string(), Value::String(signal.to_string()));
        context_data.insert(
            "priority".to_string(),
            Value::String(priority.as_str().to_string()),
        );
        self.memories
            .store(
                NewMemory::new(&user.id, MemoryType::ProactiveAction, message)
                    .with_importance(PROACTIVE_IMPORTANCE)
                    .with_context(context_data)
                    .without_reminder(),
            )
            .await?;
        self.signals.record(&user.id, signal, &Utc::now())?;

        tracing::debug!(user_id = %user.id, signal, %priority, "proactive message sent");
        Ok(true)
    }

    /// Evaluate every signal for one user; returns messages sent
    ///
    /// # Errors
    ///
    /// Returns error if a store fails
    pub async fn run_user_cycle(&self, user: &User, now: DateTime<Utc>) -> Result<usize> {
        let prefs = &user.preferences;
        if !prefs.proactive_mode {
            return Ok(0);
        }

        let context = match self.context.get_full_context(&user.id, false).await {
            Ok(context) => Some(context),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "context unavailable this cycle");
                None
            }
        };

        let mut sent = 0;

        if prefs.morning_digest
            && self.digest_due(user, signal::MORNING_DIGEST, prefs.morning_digest_time, now)?
        {
            let message = context
                .as_deref()
                .map_or_else(|| FALLBACK_DIGEST.to_string(), morning_digest);
            sent += usize::from(
                self.send_proactive_message(user, &message, signal::MORNING_DIGEST, Priority::Medium)
                    .await?,
            );
        }

        if prefs.evening_digest
            && self.digest_due(user, signal::EVENING_DIGEST, prefs.evening_digest_time, now)?
        {
            let message = self.evening_digest(&user.id).await;
            sent += usize::from(
                self.send_proactive_message(user, &message, signal::EVENING_DIGEST, Priority::Low)
                    .await?,
            );
        }

        if prefs.habit_reminders && self.signal_allowed(user, signal::HABIT_CHECK, now)? {
            if let Some(message) = self.habit_check(&user.id, now)? {
                sent += usize::from(
                    self.send_proactive_message(user, &message, signal::HABIT_CHECK, Priority::Medium)
                        .await?,
                );
            }
        }

        if let Some(context) = context.as_deref() {
            sent += self.context_signals(user, context, now).await?;
        }

        Ok(sent)
    }

    /// Run habit analysis for a user if the interval has elapsed
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn analyze_habits_if_due(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let last = self.signals.last_sent(user_id, signal::HABIT_ANALYSIS)?;
        if !self.habits.analysis_due(last, now) {
            return Ok(false);
        }

        self.habits.analyze(user_id)?;
        self.signals.record(user_id, signal::HABIT_ANALYSIS, &now)?;
        Ok(true)
    }

    /// Deliver due memory reminders and wake-up calls; returns tasks delivered
    ///
    /// Reminders for forgotten memories, unknown users or disabled
    /// preferences are completed without sending. A failed delivery is
    /// retried on later cycles until the task runs out of attempts.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub async fn process_due_tasks(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.tasks.due(&now, self.config.task_batch)?;
        let mut delivered = 0;

        for task in due {
            let Some(user) = self.users.find(&task.user_id)?.filter(|u| u.active) else {
                tracing::debug!(task_id = %task.id, "dropping task for inactive user");
                self.tasks.complete(&task.id)?;
                continue;
            };

            if !self.task_wanted(&user, &task)? {
                self.tasks.complete(&task.id)?;
                continue;
            }

            let outcome = match &task.kind {
                TaskKind::MemoryReminder {
                    content, urgency, ..
                } => {
                    self.channel
                        .send_sms(&user.phone_number, &reminder_message(content, *urgency))
                        .await
                }
                TaskKind::WakeupCall { message } => {
                    self.channel.place_call(&user.phone_number, message).await
                }
            };

            match outcome {
                Ok(()) => {
                    self.tasks.complete(&task.id)?;
                    delivered += 1;
                    tracing::debug!(user_id = %user.id, task_id = %task.id, "task delivered");
                }
                Err(e) => {
                    let status = self.tasks.record_failure(&task.id, &e.to_string())?;
                    tracing::warn!(
                        user_id = %user.id,
                        task_id = %task.id,
                        retry = status == TaskStatus::Pending,
                        error = %e,
                        "task delivery failed"
                    );
                }
            }
        }

        Ok(delivered)
    }

    /// Schedule a wake-up call; false if the user is unknown or opted out
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn schedule_wakeup_call(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool> {
        let Some(user) = self.users.find(user_id)? else {
            return Ok(false);
        };
        if !user.preferences.wake_up_calls {
            return Ok(false);
        }

        let task = ProactiveTask::new(
            user_id,
            TaskKind::WakeupCall {
                message: message.to_string(),
            },
            at,
            Priority::High,
        );
        self.tasks.schedule(&task)?;

        tracing::info!(user_id = %user_id, scheduled_for = %at, "wake-up call scheduled");
        Ok(true)
    }

    /// Carry out a user-requested action and record the result
    ///
    /// # Errors
    ///
    /// Returns error if a store fails
    pub async fn execute_action(
        &self,
        user_id: &str,
        action: ProactiveAction,
    ) -> Result<ActionOutcome> {
        let outcome = match &action {
            ProactiveAction::MorningDigest => ActionOutcome::ok(self.morning_digest(user_id).await),
            ProactiveAction::ScheduleWakeup { at, message } => {
                let at = at.unwrap_or_else(|| default_wakeup_time(Utc::now()));
                let message = message.as_deref().unwrap_or(DEFAULT_WAKEUP_MESSAGE);
                if self.schedule_wakeup_call(user_id, at, message)? {
                    ActionOutcome::ok(format!(
                        "Wake-up call scheduled for {} tomorrow!",
                        at.format("%I:%M %p")
                    ))
                } else {
                    ActionOutcome::failed(
                        "Failed to schedule wake-up call. Check your preferences.",
                    )
                }
            }
            ProactiveAction::SummarizeEmails => {
                let context = self.context.get_full_context(user_id, false).await?;
                ActionOutcome::ok(urgent_email_summary(&context))
            }
            ProactiveAction::ResolveConflicts => {
                let context = self.context.get_full_context(user_id, false).await?;
                ActionOutcome::ok(conflict_resolution_prompt(&context))
            }
            ProactiveAction::ExecuteHabit { habit_id } => {
                let habit = self.habits.get(user_id, habit_id)?;
                match habit {
                    Some(habit) if self.habits.mark_executed(user_id, habit_id).await? => {
                        ActionOutcome::ok(format!("✅ Executed your habit: {}", habit.action()))
                    }
                    _ => ActionOutcome::failed("Habit not found."),
                }
            }
            ProactiveAction::CheckReminders => {
                let context = self.context.get_full_context(user_id, false).await?;
                ActionOutcome::ok(overdue_reminder_summary(&context))
            }
        };

        let mut context_data = Map::new();
        context_data.insert(
            "action".to_string(),
            Value::String(action.as_str().to_string()),
        );
        context_data.insert("success".to_string(), Value::Bool(outcome.success));
        self.memories
            .store(
                NewMemory::new(
                    user_id,
                    MemoryType::ProactiveAction,
                    format!("{}: {}", action.as_str(), outcome.message),
                )
                .with_importance(PROACTIVE_IMPORTANCE)
                .with_context(context_data)
                .without_reminder(),
            )
            .await?;

        tracing::info!(
            user_id = %user_id,
            action = action.as_str(),
            success = outcome.success,
            "action executed"
        );
        Ok(outcome)
    }

    async fn context_signals(
        &self,
        user: &User,
        context: &UserContext,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let prefs = &user.preferences;
        let candidates: [(bool, usize, &str, fn(usize) -> String, Priority); 3] = [
            (
                prefs.urgent_email_alerts,
                context.email.urgent_count,
                signal::URGENT_EMAIL,
                urgent_email_alert,
                Priority::High,
            ),
            (
                prefs.calendar_alerts,
                context.calendar.conflict_count,
                signal::CALENDAR_CONFLICT,
                calendar_conflict_alert,
                Priority::High,
            ),
            (
                prefs.reminder_alerts,
                context.reminders.overdue_count,
                signal::OVERDUE_REMINDERS,
                overdue_reminder_alert,
                Priority::Medium,
            ),
        ];

        let mut sent = 0;
        for (enabled, count, name, render, priority) in candidates {
            if !enabled || count == 0 || !self.signal_allowed(user, name, now)? {
                continue;
            }
            sent += usize::from(
                self.send_proactive_message(user, &render(count), name, priority)
                    .await?,
            );
        }
        Ok(sent)
    }

    fn habit_check(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let habits = self.habits.list(user_id)?;
        let confident: Vec<Suggestion> =
            habit_suggestions(&habits, now, self.config.due_soon_hours)
                .into_iter()
                .filter(|s| s.confidence >= self.config.habit_threshold)
                .collect();
        Ok(habit_check_message(&rank_suggestions(
            confident,
            DIGEST_HABIT_LIMIT,
        )))
    }

    fn signal_allowed(&self, user: &User, signal: &str, now: DateTime<Utc>) -> Result<bool> {
        let last = self.signals.last_sent(&user.id, signal)?;
        Ok(self.config.dedup.allows(last, now))
    }

    /// Digests go out once per day, inside the window after their time
    fn digest_due(
        &self,
        user: &User,
        signal: &str,
        at: NaiveTime,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let window = Duration::from_std(self.config.digest_window)
            .unwrap_or_else(|_| Duration::hours(2));
        if !in_digest_window(now, at, window) {
            return Ok(false);
        }
        let last = self.signals.last_sent(&user.id, signal)?;
        Ok(DedupPolicy::Daily.allows(last, now))
    }

    fn task_wanted(&self, user: &User, task: &ProactiveTask) -> Result<bool> {
        match &task.kind {
            TaskKind::MemoryReminder { memory_id, .. } => Ok(user.preferences.reminder_alerts
                && self.memories.get(&user.id, memory_id)?.is_some()),
            TaskKind::WakeupCall { .. } => Ok(user.preferences.wake_up_calls),
        }
    }
}

impl std::fmt::Debug for ProactiveAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProactiveAgent")
            .field("channel", &self.channel.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn in_digest_window(now: DateTime<Utc>, at: NaiveTime, window: Duration) -> bool {
    let scheduled = now.date_naive().and_time(at).and_utc();
    now >= scheduled && now - scheduled < window
}

/// 07:00 UTC on the day after `now`
fn default_wakeup_time(now: DateTime<Utc>) -> DateTime<Utc> {
    let seven = NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN);
    (now.date_naive() + Duration::days(1)).and_time(seven).and_utc()
}
