//! Context aggregator integration tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use pluto::config::ProactiveConfig;
use pluto::context::{AlertKind, CalendarEvent, ReminderItem, detect_conflicts};
use pluto::db::MemoryType;
use pluto::proactive::{ALL_CLEAR_DIGEST, Priority, morning_digest};
use pluto::{ContextSources, RecallQuery};
use serde_json::json;

mod common;
use common::{FailingSource, StaticSources, services, urgent_email};

fn event(id: &str, start_mins: i64, end_mins: i64) -> CalendarEvent {
    let now = Utc::now();
    CalendarEvent {
        id: id.to_string(),
        title: format!("Event {id}"),
        start: now + Duration::minutes(start_mins),
        end: now + Duration::minutes(end_mins),
    }
}

fn reminder(id: &str, due_mins: i64) -> ReminderItem {
    ReminderItem {
        id: id.to_string(),
        title: format!("Reminder {id}"),
        due_at: Utc::now() + Duration::minutes(due_mins),
    }
}

#[test]
fn half_overlapping_events_conflict_once() {
    let conflicts = detect_conflicts(&[event("a", 60, 120), event("b", 90, 150)]);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].earlier.id, "a");
    assert_eq!(conflicts[0].later.id, "b");
}

#[tokio::test]
async fn sources_become_statuses_and_alerts() {
    let sources = StaticSources {
        emails: vec![urgent_email("m1", "Contract deadline")],
        events: vec![event("a", 60, 120), event("b", 90, 150)],
        reminders: vec![reminder("r1", -30), reminder("r2", 60)],
    };
    let svc = services(sources.into_sources(), ProactiveConfig::default());

    let context = svc.context.get_full_context("user-1", false).await.unwrap();

    assert_eq!(context.email.total_unread, 1);
    assert_eq!(context.email.urgent_count, 1);
    assert_eq!(context.calendar.upcoming_count, 2);
    assert_eq!(context.calendar.conflict_count, 1);
    assert_eq!(context.calendar.next_event.as_ref().unwrap().id, "a");
    assert_eq!(context.reminders.active_count, 2);
    assert_eq!(context.reminders.overdue_count, 1);
    assert_eq!(context.reminders.upcoming_count, 1);

    let kinds: Vec<AlertKind> = context.alerts.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AlertKind::UrgentEmail,
            AlertKind::CalendarConflict,
            AlertKind::OverdueReminder
        ]
    );
    assert_eq!(context.alerts_at(Priority::High).count(), 2);
}

#[tokio::test]
async fn failing_sources_degrade_to_empty_statuses() {
    let failing = Arc::new(FailingSource);
    let sources = ContextSources {
        email: failing.clone(),
        calendar: failing.clone(),
        reminders: failing,
    };
    let svc = services(sources, ProactiveConfig::default());

    let context = svc.context.get_full_context("user-1", false).await.unwrap();
    assert_eq!(context.email.total_unread, 0);
    assert_eq!(context.calendar.upcoming_count, 0);
    assert_eq!(context.reminders.active_count, 0);
    assert!(context.alerts.is_empty());
    assert_eq!(morning_digest(&context), ALL_CLEAR_DIGEST);
}

#[tokio::test]
async fn cache_hit_skips_rebuild_and_snapshot() {
    let svc = services(StaticSources::default().into_sources(), ProactiveConfig::default());
    let snapshots = RecallQuery::of_type(MemoryType::ContextSnapshot, 1, 10);

    let first = svc.context.get_full_context("user-1", false).await.unwrap();
    let second = svc.context.get_full_context("user-1", false).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let stored = svc.memories.recall("user-1", &snapshots).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "Context: All clear, no urgent items");

    let refreshed = svc.context.get_full_context("user-1", true).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &refreshed));
    let stored = svc.memories.recall("user-1", &snapshots).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn pushed_update_invalidates_and_raises_alert() {
    let svc = services(StaticSources::default().into_sources(), ProactiveConfig::default());
    let before = svc.context.get_full_context("user-1", false).await.unwrap();

    let update_id = svc
        .context
        .update_stream(
            "user-1",
            "email",
            json!({"is_important": true, "subject": "Server down"}),
            0.8,
        )
        .await
        .unwrap();

    let update = svc.memories.get("user-1", &update_id).unwrap().unwrap();
    assert_eq!(update.memory_type, MemoryType::context_update("email"));

    let alerts = svc
        .memories
        .recall("user-1", &RecallQuery::of_type(MemoryType::ProactiveAlert, 1, 10))
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].content, "Urgent email alert: Server down");
    assert_eq!(alerts[0].context_str("alert_type"), Some("urgent_email"));

    let after = svc.context.get_full_context("user-1", false).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));

    let changes = svc.context.detect_changes("user-1", 1).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].memory_id, update_id);
    assert!((changes[0].significance - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn routine_update_raises_no_alert() {
    let svc = services(StaticSources::default().into_sources(), ProactiveConfig::default());
    svc.context
        .update_stream("user-1", "calendar", json!({"title": "Standup"}), 0.3)
        .await
        .unwrap();

    let alerts = svc
        .memories
        .recall("user-1", &RecallQuery::of_type(MemoryType::ProactiveAlert, 1, 10))
        .await
        .unwrap();
    assert!(alerts.is_empty());
    assert!(svc.context.detect_changes("user-1", 1).unwrap().is_empty());
}

#[tokio::test]
async fn daily_summary_lists_counts() {
    let sources = StaticSources {
        emails: vec![urgent_email("m1", "Invoice")],
        events: Vec::new(),
        reminders: vec![reminder("r1", 30)],
    };
    let svc = services(sources.into_sources(), ProactiveConfig::default());

    let summary = svc.context.daily_summary("user-1").await.unwrap();
    assert_eq!(
        summary,
        "Daily Summary: 📧 1 unread emails | 🚨 1 urgent | ⏰ 1 active reminders"
    );

    let empty = services(StaticSources::default().into_sources(), ProactiveConfig::default());
    assert_eq!(
        empty.context.daily_summary("user-1").await.unwrap(),
        "Daily Summary: All clear, have a great day!"
    );
}

#[tokio::test]
async fn morning_digest_reports_mail() {
    let mut emails = vec![urgent_email("m1", "Offer letter")];
    for i in 0..2 {
        let mut routine = urgent_email(&format!("n{i}"), "Newsletter");
        routine.is_important = false;
        emails.push(routine);
    }
    let sources = StaticSources {
        emails,
        ..StaticSources::default()
    };
    let svc = services(sources.into_sources(), ProactiveConfig::default());

    let digest = svc.agent.morning_digest("user-1").await;
    assert!(digest.starts_with("Good morning! "));
    assert!(digest.contains("📧 3 unread emails"));
    assert!(digest.contains("🚨 1 urgent"));
}
