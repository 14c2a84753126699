//! Check cycle pipeline: diffing, delivery and orchestration.
//!
//! - `diff_files`: file-set difference against the stored state
//! - `DeliveryPipeline`: download, forward and clean up new files
//! - `UpdateDetector`: one fetch → fingerprint → diff → deliver cycle

pub mod delivery;
pub mod detector;
pub mod diff;

pub use delivery::{DeliveryPipeline, DeliveryResult, build_manifest};
pub use detector::{CheckOutcome, UpdateDetector};
pub use diff::{DiffResult, diff_files};
