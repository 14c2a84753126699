//! Timer-driven schedule dispatching.
//!
//! A central tick loop scans the persisted schedule entries and fires
//! due check cycles as spawned tasks, bounded by a semaphore so a slow
//! site never blocks dispatch of unrelated entries. Quiet hours and
//! interval due-ness combine into the single `should_fire_now`
//! predicate; a suppressed fire advances the schedule without running.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{Config, ScheduleEntry, SchedulerConfig};
use crate::pipeline::UpdateDetector;
use crate::storage::TrackingStore;

/// What a schedule entry should do at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// Not due yet
    Wait,
    /// Due, within grace
    Fire,
    /// Due and late beyond the grace window; all missed intervals
    /// collapse into this one run
    FireCoalesced,
    /// Due, but the quiet-hours window blocks execution; the schedule
    /// still advances
    Suppressed,
}

/// Single predicate combining interval due-ness and the quiet-hours
/// window.
pub fn should_fire_now(
    now: DateTime<Utc>,
    entry: &ScheduleEntry,
    config: &SchedulerConfig,
) -> FireDecision {
    if now < entry.next_run_at {
        return FireDecision::Wait;
    }
    if entry.night_mode && !within_active_hours(now, config) {
        return FireDecision::Suppressed;
    }
    if entry.is_misfire(now) {
        FireDecision::FireCoalesced
    } else {
        FireDecision::Fire
    }
}

/// Whether the local hour in the reference timezone is inside the
/// allowed window.
fn within_active_hours(now: DateTime<Utc>, config: &SchedulerConfig) -> bool {
    let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let hour = now.with_timezone(&offset).hour();
    hour >= config.active_start_hour && hour <= config.active_end_hour
}

/// Central dispatcher firing check cycles for due schedule entries.
pub struct Scheduler {
    config: Arc<Config>,
    store: Arc<dyn TrackingStore>,
    detector: Arc<UpdateDetector>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn TrackingStore>,
        detector: Arc<UpdateDetector>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.scheduler.max_concurrent_checks.max(1)));
        Self {
            config,
            store,
            detector,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            permits,
        }
    }

    /// Run the dispatch loop until the process stops.
    pub async fn run(&self) -> Result<()> {
        let entries = self.store.load_schedules().await?;
        log::info!("Scheduler resuming {} schedule entr(ies)", entries.len());

        let mut ticker = tokio::time::interval(StdDuration::from_secs(
            self.config.scheduler.tick_secs.max(1),
        ));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                log::error!("Scheduler tick failed: {e}");
            }
        }
    }

    /// One dispatch pass over the persisted schedule entries. Returns
    /// the handles of the fired check cycles so callers that need
    /// completion (tests, shutdown) can join them; the run loop drops
    /// them and lets the cycles detach.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();

        for entry in self.store.load_schedules().await? {
            match should_fire_now(now, &entry, &self.config.scheduler) {
                FireDecision::Wait => {}
                FireDecision::Suppressed => {
                    log::debug!(
                        "Quiet hours: suppressing {} (next run {})",
                        entry.schedule_id,
                        entry.next_run_at
                    );
                    self.store.upsert_schedule(entry.advanced(now)).await?;
                }
                decision @ (FireDecision::Fire | FireDecision::FireCoalesced) => {
                    if decision == FireDecision::FireCoalesced {
                        log::warn!(
                            "Schedule {} missed its window at {}; coalescing into one run",
                            entry.schedule_id,
                            entry.next_run_at
                        );
                    }

                    // Advance first: a skipped or failed run must not
                    // refire every tick.
                    self.store.upsert_schedule(entry.advanced(now)).await?;

                    let mut in_flight = self.in_flight.lock().await;
                    if !in_flight.insert(entry.schedule_id.clone()) {
                        log::debug!(
                            "Schedule {} still running; skipping this fire",
                            entry.schedule_id
                        );
                        continue;
                    }
                    drop(in_flight);

                    handles.push(self.spawn_check(entry));
                }
            }
        }

        Ok(handles)
    }

    fn spawn_check(&self, entry: ScheduleEntry) -> JoinHandle<()> {
        let detector = Arc::clone(&self.detector);
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            match detector.run_check(&entry.owner_id, &entry.url).await {
                Ok(outcome) => {
                    log::debug!("Check {} for {}: {:?}", entry.schedule_id, entry.url, outcome);
                }
                Err(AppError::Tracking(message)) => {
                    // The URL was untracked under us; drop the stale entry.
                    log::info!("Removing stale schedule {}: {message}", entry.schedule_id);
                    if let Err(e) = store.remove_schedule(&entry.schedule_id).await {
                        log::warn!("Failed to remove stale schedule: {e}");
                    }
                }
                Err(e) => {
                    log::error!("Check {} for {} failed: {e}", entry.schedule_id, entry.url);
                }
            }

            drop(permit);
            in_flight.lock().await.remove(&entry.schedule_id);
        })
    }
}
