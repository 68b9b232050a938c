//! Pluto - proactive personal assistant core
//!
//! This library provides the pipeline behind Pluto's unsolicited messages:
//! - Memory store with semantic recall and relationship edges
//! - Habit detection from memory history
//! - Context aggregation over email, calendar and reminders
//! - Proactive scheduling of digests, nudges and alerts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          Context sources (email, calendar, ...)     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Memory Store  │  Habit Engine  │  Context Aggr.   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Proactive Agent + Scheduler                  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Outbound channel (SMS, voice)            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod habits;
pub mod memory;
pub mod proactive;

pub use channels::{LogChannel, OutboundChannel, TwilioChannel};
pub use config::Config;
pub use context::{ContextAggregator, ContextSources, UserContext};
pub use db::DbPool;
pub use error::{Error, Result};
pub use habits::HabitEngine;
pub use memory::{MemoryStore, NewMemory, RecallQuery};
pub use proactive::{ProactiveAgent, ProactiveScheduler, SchedulerHandle};
