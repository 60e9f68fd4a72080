//! Poll loop: acquisition, recording and sink fan-out
//!
//! ## Overview
//!
//! The poll loop owns the three measurement channels and the sinks. Each
//! tick it reads the driver once, records the three values into their
//! channels independently and hands every resulting publish to the sinks.
//!
//! ```text
//!            ┌──────────────┐
//! driver ──▶ │   PollLoop   │──▶ accessory (always)
//!  read()    │ ┌──────────┐ │──▶ history   (optional)
//!            │ │ pressure │ │──▶ transport (optional, when connected)
//!            │ │ temp     │ │
//!            │ │ humidity │ │
//!            │ └──────────┘ │
//!            └──────────────┘
//! ```
//!
//! ## States
//!
//! - **Idle**: before a successful `start()`. Ticks are no-ops.
//! - **Running**: after the driver's `init()` succeeded.
//!
//! An init failure leaves the loop idle for good; there is no automatic
//! retry.
//!
//! ## Failure Isolation
//!
//! A failed or non-finite read touches no channel. The accessory sink is
//! told every quantity is unavailable and the tick ends. Sink failures are
//! logged and counted but never reach channel state.
//!
//! ## Example
//!
//! ```rust
//! use weatherguard_core::{
//!     AccessoryStateSink, PollLoop, Quantity, Reading, SensorState, TickReport,
//! };
//!
//! struct Ignore;
//! impl AccessoryStateSink for Ignore {
//!     fn update(&mut self, _: Quantity, _: SensorState) {}
//! }
//!
//! let mut poll = PollLoop::builder(Ignore).build();
//! # struct Fake;
//! # impl weatherguard_core::SensorDriver for Fake {
//! #     fn init(&mut self, _: &str) -> Result<(), weatherguard_core::DriverError> { Ok(()) }
//! #     fn read(&mut self) -> Result<Reading, weatherguard_core::DriverError> {
//! #         Ok(Reading::new(101_325.0, 20.0, 50.0))
//! #     }
//! # }
//! let mut driver = Fake;
//! poll.start(&mut driver, "/dev/i2c-3").unwrap();
//!
//! for _ in 0..30 {
//!     poll.tick(&mut driver);
//! }
//! assert_eq!(poll.current(Quantity::Pressure), Some(1013.25));
//! ```

use core::num::NonZeroU32;

use heapless::Vec;

use crate::{
    channel::{MeasurementChannel, PublishedValue},
    constants::DEFAULT_PUBLISH_PERIOD,
    driver::{Reading, SensorDriver},
    errors::{DriverError, StationError},
    quantity::Quantity,
    sinks::{AccessoryStateSink, HistoryEntry, HistorySink, SensorState, Topics, TransportSink},
    time::{unix_seconds, SystemTime, TimeSource},
};

/// Lifecycle state of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Driver not initialised yet, or init failed
    Idle,
    /// Periodic ticks are processed
    Running,
}

/// Transport sink together with the topics it publishes on
struct TransportBinding {
    sink: Box<dyn TransportSink + Send>,
    topics: Topics,
}

impl TransportBinding {
    fn new(sink: impl TransportSink + Send + 'static, topics: Topics) -> Self {
        Self {
            sink: Box::new(sink),
            topics,
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// Loop not running; nothing was read or recorded
    Idle,
    /// Reading recorded into all three channels
    Sampled {
        /// Values published this tick, at most one per quantity
        published: Vec<PublishedValue, 3>,
        /// History or transport calls that returned an error
        sink_failures: usize,
        /// Transport publishes skipped because it was disconnected
        transport_skipped: usize,
    },
    /// Read failed; no channel was touched
    Unavailable(DriverError),
}

impl TickReport {
    /// Values published this tick
    pub fn published(&self) -> &[PublishedValue] {
        match self {
            TickReport::Sampled { published, .. } => published.as_slice(),
            _ => &[],
        }
    }

    /// Check if this tick's read failed
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TickReport::Unavailable(_))
    }
}

/// Periodic sampler owning the three channels and all sinks
pub struct PollLoop<C: TimeSource = SystemTime> {
    state: PollState,
    channels: [MeasurementChannel; 3],
    clock: C,
    accessory: Box<dyn AccessoryStateSink + Send>,
    history: Option<Box<dyn HistorySink + Send>>,
    transport: Option<TransportBinding>,
}

impl PollLoop<SystemTime> {
    /// Start building a loop around the mandatory accessory sink
    pub fn builder(accessory: impl AccessoryStateSink + Send + 'static) -> PollLoopBuilder<SystemTime> {
        PollLoopBuilder::new(accessory)
    }
}

impl<C: TimeSource> PollLoop<C> {
    /// Initialise the driver and enter `Running`
    pub fn start<D>(&mut self, driver: &mut D, interface_path: &str) -> Result<(), StationError>
    where
        D: SensorDriver + ?Sized,
    {
        if self.state == PollState::Running {
            return Err(StationError::AlreadyRunning);
        }

        match driver.init(interface_path) {
            Ok(()) => {
                log::info!("Sensor initialised on {}", interface_path);
                self.state = PollState::Running;
                Ok(())
            }
            Err(e) => {
                log::error!("Could not initialise sensor on {}: {}", interface_path, e);
                Err(StationError::DriverInit(e))
            }
        }
    }

    /// Read the driver once and process the result
    pub fn tick<D>(&mut self, driver: &mut D) -> TickReport
    where
        D: SensorDriver + ?Sized,
    {
        if self.state != PollState::Running {
            return TickReport::Idle;
        }

        let read = driver.read();
        self.apply(read)
    }

    /// Process one read result
    ///
    /// Separate from [`tick`](Self::tick) so a scheduler can perform the
    /// read elsewhere (off-thread, under a timeout) and keep channel
    /// mutation on the loop's owner.
    pub fn apply(&mut self, read: Result<Reading, DriverError>) -> TickReport {
        if self.state != PollState::Running {
            return TickReport::Idle;
        }

        let reading = match read.and_then(|r| r.validate().map(|()| r)) {
            Ok(reading) => reading,
            Err(e) => {
                log::error!("Sensor read failed: {}", e);
                for quantity in Quantity::ALL {
                    self.accessory.update(quantity, SensorState::Unavailable(e.clone()));
                }
                return TickReport::Unavailable(e);
            }
        };

        log::debug!(
            "Read: pressure {}Pa, temperature {}°C, humidity {}%",
            reading.pressure,
            reading.temperature,
            reading.humidity
        );

        let now = self.clock.now();
        let mut sink_failures = 0;
        let mut transport_skipped = 0;

        let published: Vec<PublishedValue, 3> = Quantity::ALL
            .into_iter()
            .filter_map(|quantity| {
                let value = self.channels[quantity.index()].record(reading.get(quantity), now)?;
                let (failed, skipped) = self.fan_out(&value);
                sink_failures += failed;
                transport_skipped += skipped;
                Some(value)
            })
            .collect();

        TickReport::Sampled {
            published,
            sink_failures,
            transport_skipped,
        }
    }

    /// Hand one publish to every sink, returning (failures, skipped)
    fn fan_out(&mut self, value: &PublishedValue) -> (usize, usize) {
        let quantity = value.quantity;
        let mut failures = 0;
        let mut skipped = 0;

        log::info!("{}: {} {}", quantity, value.value, quantity.unit());

        self.accessory.update(quantity, SensorState::Value(value.value));

        if let Some(history) = self.history.as_mut() {
            let entry = HistoryEntry::single(unix_seconds(value.timestamp), quantity, value.value);
            if let Err(e) = history.add_entry(&entry) {
                log::warn!("History entry for {} not written: {}", quantity, e);
                failures += 1;
            }
        }

        if let Some(transport) = self.transport.as_mut() {
            let topic = transport.topics.topic(quantity);
            if !transport.sink.is_connected() {
                log::warn!("Transport not connected, {} not published to {}", quantity, topic);
                skipped += 1;
            } else if let Err(e) = transport.sink.publish(topic, value.value) {
                log::warn!("Publishing {} to {} failed: {}", quantity, topic, e);
                failures += 1;
            }
        }

        (failures, skipped)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Read-only view of one channel
    pub fn channel(&self, quantity: Quantity) -> &MeasurementChannel {
        &self.channels[quantity.index()]
    }

    /// Last published value of one quantity
    pub fn current(&self, quantity: Quantity) -> Option<f64> {
        self.channel(quantity).current()
    }

    /// Check if a history sink is attached
    pub fn has_history(&self) -> bool {
        self.history.is_some()
    }

    /// Check if a transport sink is attached
    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }
}

/// Builder for [`PollLoop`]
///
/// Optional sinks are attached once here; the loop never re-checks enable
/// flags.
pub struct PollLoopBuilder<C: TimeSource> {
    clock: C,
    period: NonZeroU32,
    accessory: Box<dyn AccessoryStateSink + Send>,
    history: Option<Box<dyn HistorySink + Send>>,
    transport: Option<TransportBinding>,
}

impl PollLoopBuilder<SystemTime> {
    /// Builder with the system clock and default publish period
    pub fn new(accessory: impl AccessoryStateSink + Send + 'static) -> Self {
        Self {
            clock: SystemTime,
            period: NonZeroU32::new(DEFAULT_PUBLISH_PERIOD).unwrap_or(NonZeroU32::MIN),
            accessory: Box::new(accessory),
            history: None,
            transport: None,
        }
    }
}

impl<C: TimeSource> PollLoopBuilder<C> {
    /// Replace the clock used to stamp published values
    pub fn clock<T: TimeSource>(self, clock: T) -> PollLoopBuilder<T> {
        PollLoopBuilder {
            clock,
            period: self.period,
            accessory: self.accessory,
            history: self.history,
            transport: self.transport,
        }
    }

    /// Samples between publishes, shared by all three channels
    pub fn publish_period(mut self, period: NonZeroU32) -> Self {
        self.period = period;
        self
    }

    /// Attach a history sink
    pub fn history(mut self, sink: impl HistorySink + Send + 'static) -> Self {
        self.history = Some(Box::new(sink));
        self
    }

    /// Attach a transport sink publishing on `topics`
    pub fn transport(mut self, sink: impl TransportSink + Send + 'static, topics: Topics) -> Self {
        self.transport = Some(TransportBinding::new(sink, topics));
        self
    }

    /// Build an idle loop
    pub fn build(self) -> PollLoop<C> {
        let period = self.period;
        PollLoop {
            state: PollState::Idle,
            channels: Quantity::ALL.map(|q| MeasurementChannel::with_period(q, period)),
            clock: self.clock,
            accessory: self.accessory,
            history: self.history,
            transport: self.transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedTime;

    struct NullAccessory;

    impl AccessoryStateSink for NullAccessory {
        fn update(&mut self, _: Quantity, _: SensorState) {}
    }

    struct FailingInit;

    impl SensorDriver for FailingInit {
        fn init(&mut self, _: &str) -> Result<(), DriverError> {
            Err(DriverError::new(DriverError::DEVICE, "no chip"))
        }

        fn read(&mut self) -> Result<Reading, DriverError> {
            panic!("read on a driver that never initialised");
        }
    }

    struct Steady;

    impl SensorDriver for Steady {
        fn init(&mut self, _: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn read(&mut self) -> Result<Reading, DriverError> {
            Ok(Reading::new(100_000.0, 20.0, 50.0))
        }
    }

    fn poll() -> PollLoop<FixedTime> {
        PollLoop::builder(NullAccessory).clock(FixedTime::new(0)).build()
    }

    #[test]
    fn starts_idle() {
        let poll = poll();
        assert_eq!(poll.state(), PollState::Idle);
        assert!(!poll.has_history());
        assert!(!poll.has_transport());
    }

    #[test]
    fn init_failure_stays_idle() {
        let mut poll = poll();
        let mut driver = FailingInit;

        let err = poll.start(&mut driver, "/dev/i2c-9").unwrap_err();

        assert!(matches!(err, StationError::DriverInit(ref e) if e.code == DriverError::DEVICE));
        assert_eq!(poll.state(), PollState::Idle);
        // Idle ticks never reach the driver
        assert_eq!(poll.tick(&mut driver), TickReport::Idle);
    }

    #[test]
    fn start_twice_rejected() {
        let mut poll = poll();
        let mut driver = Steady;

        poll.start(&mut driver, "/dev/i2c-3").unwrap();
        assert_eq!(poll.start(&mut driver, "/dev/i2c-3"), Err(StationError::AlreadyRunning));
        assert_eq!(poll.state(), PollState::Running);
    }

    #[test]
    fn apply_while_idle_is_ignored() {
        let mut poll = poll();
        let report = poll.apply(Ok(Reading::new(1.0, 2.0, 3.0)));

        assert_eq!(report, TickReport::Idle);
        assert!(poll.channel(Quantity::Pressure).window().is_empty());
    }

    #[test]
    fn thirty_ticks_publish_all_three() {
        let mut poll = poll();
        let mut driver = Steady;
        poll.start(&mut driver, "/dev/i2c-3").unwrap();

        for _ in 0..29 {
            assert!(poll.tick(&mut driver).published().is_empty());
        }
        let report = poll.tick(&mut driver);

        let quantities: std::vec::Vec<Quantity> =
            report.published().iter().map(|p| p.quantity).collect();
        assert_eq!(quantities, Quantity::ALL.to_vec());
        assert!(report.published().iter().all(|p| p.timestamp == 0));
        assert_eq!(poll.current(Quantity::Pressure), Some(1000.0));
        assert_eq!(poll.current(Quantity::Temperature), Some(20.0));
        assert_eq!(poll.current(Quantity::Humidity), Some(50.0));
    }

    #[test]
    fn custom_period_applies_to_every_channel() {
        let mut poll = PollLoop::builder(NullAccessory)
            .publish_period(NonZeroU32::new(60).unwrap())
            .build();

        for quantity in Quantity::ALL {
            assert_eq!(poll.channel(quantity).gate().period(), 60);
        }

        let mut driver = Steady;
        poll.start(&mut driver, "/dev/i2c-3").unwrap();
        for _ in 0..30 {
            poll.tick(&mut driver);
        }
        assert!(poll.current(Quantity::Temperature).is_none());
    }
}
