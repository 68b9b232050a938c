//! Habit detection integration tests

use chrono::{Duration, NaiveTime, TimeZone, Timelike, Utc};
use pluto::config::{HabitConfig, MemoryConfig};
use pluto::db::{Memory, MemoryRepo, MemoryType};
use pluto::habits::{PatternData, PatternType, detect_habits};
use pluto::{DbPool, HabitEngine, MemoryStore};

mod common;
use common::setup_test_db;

fn engine(pool: &DbPool) -> HabitEngine {
    let memories = MemoryStore::new(pool.clone(), MemoryConfig::default());
    HabitEngine::new(pool.clone(), memories, HabitConfig::default())
}

fn wake_up_window() -> Vec<Memory> {
    (0..4)
        .map(|day| {
            let created = Utc.with_ymd_and_hms(2024, 3, 4 + day, 6, 55, 0).unwrap();
            Memory::new("user-1", MemoryType::Habit, "wake at 7am").with_created_at(created)
        })
        .collect()
}

#[test]
fn repeated_wake_up_is_time_habit() {
    let detected = detect_habits(&wake_up_window());

    let time = detected
        .iter()
        .find_map(|d| match &d.pattern {
            PatternData::TimeBased(p) => Some((p, d.confidence)),
            _ => None,
        })
        .expect("time habit");
    let (pattern, confidence) = time;

    let seven = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
    let drift = (pattern.avg_time - seven).num_minutes().abs();
    assert!(drift <= 1, "avg time {} too far from 07:00", pattern.avg_time);
    assert!(confidence >= 0.4);
    assert_eq!(pattern.occurrences, 4);
}

#[test]
fn regular_email_checks_are_frequency_habit() {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
    let window: Vec<Memory> = (0..6)
        .map(|i| {
            let jitter = Duration::minutes(if i % 2 == 0 { 3 } else { -3 });
            Memory::new("user-1", MemoryType::from("email_check"), "checked inbox")
                .with_created_at(start + Duration::hours(2 * i) + jitter)
        })
        .collect();

    let detected = detect_habits(&window);
    let (pattern, confidence) = detected
        .iter()
        .find_map(|d| match &d.pattern {
            PatternData::FrequencyBased(p) => Some((p, d.confidence)),
            _ => None,
        })
        .expect("frequency habit");

    assert!((pattern.frequency_hours - 2.0).abs() < 0.2);
    assert!(confidence > 0.6);
}

#[test]
fn too_few_occurrences_yield_nothing() {
    let window: Vec<Memory> = wake_up_window().into_iter().take(2).collect();
    let detected = detect_habits(&window);
    assert!(
        detected
            .iter()
            .all(|d| d.pattern.pattern_type() != PatternType::TimeBased)
    );
}

#[tokio::test]
async fn analysis_persists_and_execution_reinforces() {
    let pool = setup_test_db();
    let repo = MemoryRepo::new(pool.clone());
    let start = Utc::now() - Duration::days(5);
    for day in 0..4 {
        let created = (start + Duration::days(day))
            .with_hour(6)
            .and_then(|t| t.with_minute(50))
            .unwrap();
        repo.add(&Memory::new("user-1", MemoryType::Habit, "wake at 7am").with_created_at(created))
            .unwrap();
    }

    let engine = engine(&pool);
    let report = engine.analyze("user-1").unwrap();
    assert_eq!(report.memories_scanned, 4);
    assert!(report.created >= 1);

    let habit = engine
        .list("user-1")
        .unwrap()
        .into_iter()
        .find(|h| h.pattern_type() == PatternType::TimeBased)
        .expect("time habit stored");
    let predicted = habit.next_predicted.expect("prediction");
    assert_eq!((predicted.hour(), predicted.minute()), (7, 0));

    let mut previous = habit.confidence;
    for _ in 0..15 {
        assert!(engine.mark_executed("user-1", &habit.id).await.unwrap());
        let current = engine.get("user-1", &habit.id).unwrap().unwrap().confidence;
        assert!(current >= previous);
        assert!(current <= 0.95 + f64::EPSILON);
        previous = current;
    }

    let executed = engine.get("user-1", &habit.id).unwrap().unwrap();
    assert!(executed.observation_count >= 4 + 15);
}

#[tokio::test]
async fn unknown_habit_is_not_executed() {
    let pool = setup_test_db();
    let engine = engine(&pool);
    assert!(!engine.mark_executed("user-1", "habit_missing").await.unwrap());
}

#[tokio::test]
async fn reanalysis_keeps_one_habit_per_type() {
    let pool = setup_test_db();
    let repo = MemoryRepo::new(pool.clone());
    let start = Utc::now() - Duration::hours(20);
    for i in 0..8 {
        repo.add(
            &Memory::new("user-1", MemoryType::from("email_check"), "checked inbox")
                .with_created_at(start + Duration::hours(2 * i)),
        )
        .unwrap();
    }

    let engine = engine(&pool);
    engine.analyze("user-1").unwrap();
    let first = engine.list("user-1").unwrap();
    engine.analyze("user-1").unwrap();
    let second = engine.list("user-1").unwrap();

    assert_eq!(first.len(), second.len());
    let frequency: Vec<_> = second
        .iter()
        .filter(|h| h.pattern_type() == PatternType::FrequencyBased)
        .collect();
    assert_eq!(frequency.len(), 1);
}

#[test]
fn bookkeeping_records_never_become_habits() {
    let pool = setup_test_db();
    let repo = MemoryRepo::new(pool.clone());
    let start = Utc::now() - Duration::hours(2);
    for i in 0..6 {
        repo.add(
            &Memory::new("user-1", MemoryType::ContextSnapshot, "Context: All clear, no urgent items")
                .with_created_at(start + Duration::minutes(5 * i)),
        )
        .unwrap();
    }

    let engine = engine(&pool);
    let report = engine.analyze("user-1").unwrap();
    assert_eq!(report.memories_scanned, 0);
    assert!(engine.list("user-1").unwrap().is_empty());
}
