//! Message templates: digests, signal alerts and action replies

use std::fmt::Write as _;

use crate::context::{TomorrowPreview, UserContext};

use super::Suggestion;

/// Sent when a digest cannot be built
pub const FALLBACK_DIGEST: &str = "Good morning! Ready to help you today.";

/// Morning digest when there is nothing to report
pub const ALL_CLEAR_DIGEST: &str = "Good morning! All clear, ready for a great day!";

/// Habit suggestions listed in the morning digest
const DIGEST_HABITS: usize = 2;

/// Items listed per section of the evening digest and action replies
const LIST_ITEMS: usize = 3;

/// Morning digest from a context snapshot
#[must_use]
pub fn morning_digest(context: &UserContext) -> String {
    let mut parts = Vec::new();

    let email = &context.email;
    if email.total_unread > 0 {
        parts.push(format!("📧 {} unread emails", email.total_unread));
        if email.urgent_count > 0 {
            parts.push(format!("🚨 {} urgent", email.urgent_count));
        }
    }

    let calendar = &context.calendar;
    if calendar.today_count > 0 {
        parts.push(format!("📅 {} events today", calendar.today_count));
        if let Some(next) = &calendar.next_event {
            parts.push(format!(
                "⏰ Next: {} at {}",
                next.title,
                next.start.format("%I:%M %p")
            ));
        }
    }

    if context.reminders.active_count > 0 {
        parts.push(format!(
            "⏰ {} active reminders",
            context.reminders.active_count
        ));
    }

    for suggestion in context.habits.suggestions.iter().take(DIGEST_HABITS) {
        parts.push(format!("🔄 {}", suggestion.message));
    }

    if parts.is_empty() {
        ALL_CLEAR_DIGEST.to_string()
    } else {
        format!("Good morning! {}.", parts.join(" | "))
    }
}

/// Evening digest previewing tomorrow
#[must_use]
pub fn evening_digest(preview: &TomorrowPreview) -> String {
    let mut message = String::from("🌙 Evening Digest - Tomorrow's Preview:\n\n");

    if !preview.reminders.is_empty() {
        message.push_str("⏰ Tomorrow's Reminders:\n");
        for (i, reminder) in preview.reminders.iter().take(LIST_ITEMS).enumerate() {
            let _ = writeln!(
                message,
                "{}) {} at {}",
                i + 1,
                reminder.title,
                reminder.due_at.format("%I:%M %p")
            );
        }
        message.push('\n');
    }

    if !preview.events.is_empty() {
        message.push_str("📅 Tomorrow's Events:\n");
        for (i, event) in preview.events.iter().take(LIST_ITEMS).enumerate() {
            let _ = writeln!(
                message,
                "{}) {} at {}",
                i + 1,
                event.title,
                event.start.format("%I:%M %p")
            );
        }
        message.push('\n');
    }

    if preview.reminders.is_empty() && preview.events.is_empty() {
        message.push_str("✨ No scheduled items for tomorrow!");
    } else {
        message.push_str("💬 Reply with:\n");
        message.push_str("• 'snooze #2 1h' to delay reminder #2\n");
        message.push_str("• 'move #1 to 2pm' to reschedule event #1\n");
        message.push_str("• 'cancel #3' to cancel item #3");
    }

    message
}

/// Top habit suggestions as one message, if there are any
#[must_use]
pub fn habit_check_message(suggestions: &[Suggestion]) -> Option<String> {
    if suggestions.is_empty() {
        return None;
    }

    let lines: Vec<&str> = suggestions
        .iter()
        .take(LIST_ITEMS)
        .map(|s| s.message.as_str())
        .collect();
    Some(format!("🔄 Habit suggestions:\n{}", lines.join("\n")))
}

#[must_use]
pub fn urgent_email_alert(count: usize) -> String {
    format!("🚨 You have {count} urgent emails! Want me to summarize them?")
}

#[must_use]
pub fn calendar_conflict_alert(count: usize) -> String {
    format!("📅 Calendar conflict detected! You have {count} overlapping events. Need help resolving?")
}

#[must_use]
pub fn overdue_reminder_alert(count: usize) -> String {
    format!("⏰ You have {count} overdue reminders.")
}

/// Reply listing the most urgent emails
#[must_use]
pub fn urgent_email_summary(context: &UserContext) -> String {
    let email = &context.email;
    if email.urgent_count == 0 {
        return "No urgent emails to summarize.".to_string();
    }

    let mut parts = vec![format!("You have {} urgent emails:", email.urgent_count)];
    parts.extend(
        email
            .recent_urgent
            .iter()
            .take(LIST_ITEMS)
            .map(|m| format!("• From {}: {}", m.sender, m.subject)),
    );
    if email.urgent_count > LIST_ITEMS {
        parts.push(format!(
            "And {} more urgent emails",
            email.urgent_count - LIST_ITEMS
        ));
    }
    parts.join(" ")
}

/// Reply offering help with calendar conflicts
#[must_use]
pub fn conflict_resolution_prompt(context: &UserContext) -> String {
    match context.calendar.conflict_count {
        0 => "No calendar conflicts to resolve.".to_string(),
        n => format!(
            "Found {n} calendar conflicts. I can help you reschedule them. Which one should we tackle first?"
        ),
    }
}

/// Reply listing overdue reminders
#[must_use]
pub fn overdue_reminder_summary(context: &UserContext) -> String {
    let reminders = &context.reminders;
    if reminders.overdue_count == 0 {
        return "No overdue reminders to check.".to_string();
    }

    let mut parts = vec![format!(
        "You have {} overdue reminders:",
        reminders.overdue_count
    )];
    parts.extend(
        reminders
            .overdue
            .iter()
            .take(LIST_ITEMS)
            .map(|r| format!("• {}", r.title)),
    );
    if reminders.overdue_count > LIST_ITEMS {
        parts.push(format!(
            "And {} more overdue reminders",
            reminders.overdue_count - LIST_ITEMS
        ));
    }
    parts.join(" ")
}
