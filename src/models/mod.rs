// src/models/mod.rs

//! Domain models for the pagewatch application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod allowlist;
mod config;
mod file;
mod tracked;

// Re-export all public types
pub use allowlist::AllowList;
pub use config::{Config, DeliveryConfig, ExtractorConfig, HttpConfig, SchedulerConfig};
pub use file::{FileKind, FileRef};
pub use tracked::{OwnerRecord, ScheduleEntry, TrackedUrl, schedule_id};
