//! Priority alerts derived from a context snapshot

use super::{CalendarStatus, EmailStatus, HabitStatus, ReminderStatus};
use crate::proactive::Priority;

/// What an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    UrgentEmail,
    CalendarConflict,
    OverdueReminder,
    HabitDue,
}

impl AlertKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UrgentEmail => "urgent_email",
            Self::CalendarConflict => "calendar_conflict",
            Self::OverdueReminder => "overdue_reminder",
            Self::HabitDue => "habit_due",
        }
    }
}

/// An item that needs the user's attention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityAlert {
    pub kind: AlertKind,
    pub priority: Priority,
    pub message: String,
}

/// Apply the fixed alert rules
#[must_use]
pub fn priority_alerts(
    email: &EmailStatus,
    calendar: &CalendarStatus,
    reminders: &ReminderStatus,
    habits: &HabitStatus,
) -> Vec<PriorityAlert> {
    let mut alerts = Vec::new();

    if email.urgent_count > 0 {
        alerts.push(PriorityAlert {
            kind: AlertKind::UrgentEmail,
            priority: Priority::High,
            message: format!("You have {} urgent emails", email.urgent_count),
        });
    }

    if calendar.conflict_count > 0 {
        alerts.push(PriorityAlert {
            kind: AlertKind::CalendarConflict,
            priority: Priority::High,
            message: format!(
                "Calendar conflict detected: {} overlapping events",
                calendar.conflict_count
            ),
        });
    }

    if reminders.overdue_count > 0 {
        alerts.push(PriorityAlert {
            kind: AlertKind::OverdueReminder,
            priority: Priority::Medium,
            message: format!("You have {} overdue reminders", reminders.overdue_count),
        });
    }

    if habits.due_soon_count > 0 {
        alerts.push(PriorityAlert {
            kind: AlertKind::HabitDue,
            priority: Priority::Medium,
            message: format!("{} habits due soon", habits.due_soon_count),
        });
    }

    alerts
}
