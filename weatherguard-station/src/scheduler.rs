//! Periodic scheduler driving the poll loop
//!
//! ## Timing
//!
//! ```text
//! interval ──tick──▶ spawn_blocking(read) ──timeout──▶ PollLoop::apply
//!     │                    │
//!     │               try_lock(driver)
//!     │                    └─ held by a late read ──▶ busy
//!     └─ missed ticks are skipped, never bunched
//! ```
//!
//! Each tick is awaited before the next one is taken, so the poll loop
//! never sees overlapping ticks. A read that overruns its budget is
//! reported as a timeout; it keeps the driver locked until it returns,
//! and ticks in the meantime report the driver as busy.

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use weatherguard_core::time::{SystemTime, TimeSource};
use weatherguard_core::{
    DriverError, PollLoop, PollState, Reading, SensorDriver, StationError, TickReport,
};

/// Counters over one [`Scheduler::run`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks taken
    pub ticks: u64,
    /// Values handed to the sinks
    pub publishes: u64,
    /// Ticks whose read failed
    pub unavailable: u64,
    /// Sink calls that failed
    pub sink_failures: u64,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        match report {
            TickReport::Sampled { published, sink_failures, .. } => {
                self.publishes += published.len() as u64;
                self.sink_failures += *sink_failures as u64;
            }
            TickReport::Unavailable(_) => self.unavailable += 1,
            TickReport::Idle => {}
        }
    }
}

/// Owns the poll loop and the driver and runs them on a timer
pub struct Scheduler<D, C: TimeSource = SystemTime> {
    poll: PollLoop<C>,
    driver: Arc<Mutex<D>>,
    poll_interval: Duration,
    read_timeout: Duration,
}

impl<D, C> Scheduler<D, C>
where
    D: SensorDriver + Send + 'static,
    C: TimeSource,
{
    /// Scheduler reading `driver` every `poll_interval`
    pub fn new(poll: PollLoop<C>, driver: D, poll_interval: Duration, read_timeout: Duration) -> Self {
        Self {
            poll,
            driver: Arc::new(Mutex::new(driver)),
            poll_interval,
            read_timeout,
        }
    }

    /// Initialise the driver on `interface_path`
    pub fn start(&mut self, interface_path: &str) -> Result<(), StationError> {
        let mut driver = self.driver.lock().unwrap_or_else(|e| e.into_inner());
        self.poll.start(&mut *driver, interface_path)
    }

    /// Read once under the timeout and apply the result
    pub async fn tick(&mut self) -> TickReport {
        if self.poll.state() != PollState::Running {
            return TickReport::Idle;
        }
        let read = read_with_timeout(self.driver.clone(), self.read_timeout).await;
        self.poll.apply(read)
    }

    /// Tick on the interval until `shutdown` turns true or its sender is
    /// dropped
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary, StationError> {
        if self.poll.state() != PollState::Running {
            return Err(StationError::NotRunning);
        }

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = RunSummary::default();

        log::info!(
            "Polling every {:?}, read timeout {:?}",
            self.poll_interval,
            self.read_timeout
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    summary.record(&report);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!(
            "Stopped after {} ticks: {} publishes, {} failed reads, {} sink failures",
            summary.ticks,
            summary.publishes,
            summary.unavailable,
            summary.sink_failures
        );
        Ok(summary)
    }

    /// The poll loop
    pub fn poll(&self) -> &PollLoop<C> {
        &self.poll
    }
}

async fn read_with_timeout<D>(driver: Arc<Mutex<D>>, limit: Duration) -> Result<Reading, DriverError>
where
    D: SensorDriver + Send + 'static,
{
    let read = tokio::task::spawn_blocking(move || read_locked(&driver));

    match time::timeout(limit, read).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(DriverError::new(
            DriverError::DRIVER,
            format!("sensor read aborted: {}", join),
        )),
        Err(_) => {
            log::warn!("Sensor read exceeded {:?}", limit);
            Err(DriverError::timeout())
        }
    }
}

fn read_locked<D: SensorDriver>(driver: &Mutex<D>) -> Result<Reading, DriverError> {
    match driver.try_lock() {
        Ok(mut driver) => driver.read(),
        Err(TryLockError::WouldBlock) => Err(DriverError::busy()),
        // Recover the driver after a read that panicked
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().read(),
    }
}
