//! Workout sync coordinator.
//!
//! Decides between serving the cached dataset and fetching from the workout
//! source, and publishes every state change on a watch channel.
//!
//! ## Lifecycle
//!
//! - **No credential**: stays idle without data; nothing is fetched.
//! - **Mount, fresh non-empty cache**: idle with the cached data, no network
//!   call.
//! - **Mount, stale, empty or missing cache**: syncing while still showing
//!   whatever was cached, then idle with the new data
//!   (stale-while-revalidate).
//! - **Manual sync**: always refetches, regardless of freshness.
//! - **Failure**: errored, keeping the last good dataset on display.
//!
//! Each fetch takes a ticket when it starts. A completion is applied only if
//! no later-started fetch has already been applied, so an older sync that
//! finishes last cannot overwrite newer data in the cache slot.

use crate::hevy::{fetch_all_workouts, WorkoutSource};
use crate::store::CacheSlot;
use crate::transform::transform;
use crate::{CacheEntry, Error, Result, SimplifiedWorkout};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coarse coordinator status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Errored,
}

/// What subscribers see: status plus the dataset currently on display
#[derive(Clone, Debug, PartialEq)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub workouts: Option<Arc<Vec<SimplifiedWorkout>>>,
    /// When the displayed dataset was written to the cache
    pub synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncSnapshot {
    fn idle_empty() -> Self {
        Self {
            status: SyncStatus::Idle,
            workouts: None,
            synced_at: None,
            last_error: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.workouts.is_some()
    }

    /// Initial load with nothing to show yet
    pub fn is_loading(&self) -> bool {
        self.status == SyncStatus::Syncing && !self.has_data()
    }

    /// Displayed workouts, empty when there is no data
    pub fn workouts(&self) -> &[SimplifiedWorkout] {
        self.workouts.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Tunables for the coordinator
#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub page_size: u32,
    pub freshness: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            freshness: Duration::hours(24),
        }
    }
}

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    applied: u64,
    in_flight: usize,
}

/// Coordinates cache reads, remote fetches and subscriber notification
/// for one credential
pub struct SyncCoordinator {
    source: Option<Arc<dyn WorkoutSource>>,
    cache: CacheSlot<CacheEntry>,
    options: SyncOptions,
    state: watch::Sender<SyncSnapshot>,
    tickets: Mutex<Tickets>,
}

impl SyncCoordinator {
    /// Build a coordinator; `source` is `None` when no credential is set
    pub fn new(
        source: Option<Arc<dyn WorkoutSource>>,
        cache: CacheSlot<CacheEntry>,
        options: SyncOptions,
    ) -> Self {
        let (state, _) = watch::channel(SyncSnapshot::idle_empty());
        Self {
            source,
            cache,
            options,
            state,
            tickets: Mutex::new(Tickets::default()),
        }
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    pub fn has_credential(&self) -> bool {
        self.source.is_some()
    }

    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initial load: serve a fresh cache, otherwise revalidate in place
    ///
    /// Returns the fetch error, if a fetch was needed and failed; the state
    /// reflects it either way.
    pub async fn mount(&self) -> Result<()> {
        let Some(source) = self.source.clone() else {
            debug!("No workout source credential, staying idle");
            self.state.send_replace(SyncSnapshot::idle_empty());
            return Ok(());
        };

        // An empty dataset counts as nothing cached
        let cached = self.cache.read().filter(|e| !e.workouts.is_empty());
        let now = Utc::now();

        if let Some(entry) = &cached {
            if entry.is_fresh(now, self.options.freshness) {
                info!(
                    "Serving {} cached workouts ({} minutes old)",
                    entry.workouts.len(),
                    entry.age(now).num_minutes()
                );
                self.state.send_replace(SyncSnapshot {
                    status: SyncStatus::Idle,
                    workouts: Some(Arc::new(entry.workouts.clone())),
                    synced_at: Some(entry.timestamp),
                    last_error: None,
                });
                return Ok(());
            }
            info!(
                "Cached workouts are stale ({} hours old), refreshing",
                entry.age(now).num_hours()
            );
        } else {
            info!("No cached workouts, fetching");
        }

        let ticket = self.begin();
        self.state.send_replace(SyncSnapshot {
            status: SyncStatus::Syncing,
            workouts: cached.as_ref().map(|e| Arc::new(e.workouts.clone())),
            synced_at: cached.as_ref().map(|e| e.timestamp),
            last_error: None,
        });

        let result = self.fetch(source.as_ref()).await;
        self.finish(ticket, result).map(|_| ())
    }

    /// Forced resync, bypassing freshness
    ///
    /// Returns the freshly fetched workouts on success.
    pub async fn sync(&self) -> Result<Arc<Vec<SimplifiedWorkout>>> {
        let Some(source) = self.source.clone() else {
            return Err(Error::Auth("No Hevy API key configured".into()));
        };

        let ticket = self.begin();
        self.state.send_modify(|snapshot| {
            snapshot.status = SyncStatus::Syncing;
            snapshot.last_error = None;
        });

        let result = self.fetch(source.as_ref()).await;
        self.finish(ticket, result)
    }

    async fn fetch(&self, source: &dyn WorkoutSource) -> Result<Vec<SimplifiedWorkout>> {
        let raw = fetch_all_workouts(source, self.options.page_size).await?;
        Ok(transform(&raw))
    }

    fn begin(&self) -> u64 {
        let mut tickets = self.tickets();
        tickets.next += 1;
        tickets.in_flight += 1;
        tickets.next
    }

    /// Apply a completed fetch unless a later-started one already landed
    fn finish(
        &self,
        ticket: u64,
        result: Result<Vec<SimplifiedWorkout>>,
    ) -> Result<Arc<Vec<SimplifiedWorkout>>> {
        let mut tickets = self.tickets();
        tickets.in_flight = tickets.in_flight.saturating_sub(1);
        let superseded = ticket < tickets.applied;
        let still_running = tickets.in_flight > 0;
        let status_after = if still_running {
            SyncStatus::Syncing
        } else {
            SyncStatus::Idle
        };

        match result {
            Ok(workouts) => {
                let workouts = Arc::new(workouts);
                if superseded {
                    warn!(
                        "Discarding sync #{} result, sync #{} already applied",
                        ticket, tickets.applied
                    );
                    drop(tickets);
                    self.state.send_modify(|s| s.status = status_after);
                    return Ok(workouts);
                }
                tickets.applied = ticket;
                drop(tickets);

                let now = Utc::now();
                let entry = CacheEntry::new(now, workouts.as_ref().clone());
                if let Err(e) = self.cache.write(&entry) {
                    warn!("Failed to write workout cache: {}", e);
                }

                info!("Sync #{} complete: {} workouts", ticket, workouts.len());
                self.state.send_replace(SyncSnapshot {
                    status: status_after,
                    workouts: Some(Arc::clone(&workouts)),
                    synced_at: Some(now),
                    last_error: None,
                });
                Ok(workouts)
            }
            Err(e) => {
                drop(tickets);
                warn!("Sync #{} failed: {}", ticket, e);
                if superseded {
                    self.state.send_modify(|s| s.status = status_after);
                } else {
                    let message = e.to_string();
                    self.state.send_modify(|s| {
                        s.status = if still_running {
                            SyncStatus::Syncing
                        } else {
                            SyncStatus::Errored
                        };
                        s.last_error = Some(message);
                    });
                }
                Err(e)
            }
        }
    }
}
