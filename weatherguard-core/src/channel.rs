//! Per-quantity sampling channel
//!
//! A channel owns one [`SampleWindow`] and one [`PublishGate`] and is the
//! only thing allowed to mutate them. Every accepted reading goes through
//! [`MeasurementChannel::record`]; on the gate's Nth tick the window mean is
//! converted to the published unit and becomes the channel's current
//! value.
//!
//! ## Cadence
//!
//! With the default window of 30 and a gate period of 30, the first
//! publish happens on the 30th reading and reflects a full window. Later
//! publishes happen every 30 readings, each over the last 30 readings. At a
//! 5 s poll that is one value every 2.5 minutes, trading latency for noise
//! rejection and a bounded sink call rate.

use core::num::NonZeroU32;

use crate::{
    constants::WINDOW_CAPACITY,
    gate::PublishGate,
    quantity::Quantity,
    time::Timestamp,
    window::SampleWindow,
};

/// A smoothed value ready for the sinks
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublishedValue {
    /// Which quantity this is
    pub quantity: Quantity,
    /// Window mean after the unit transform
    pub value: f64,
    /// Time of the reading that triggered the publish, in ms
    pub timestamp: Timestamp,
}

/// Window, gate and current value for one quantity
#[derive(Debug, Clone)]
pub struct MeasurementChannel<const N: usize = WINDOW_CAPACITY> {
    quantity: Quantity,
    window: SampleWindow<N>,
    gate: PublishGate,
    current: Option<f64>,
}

impl<const N: usize> MeasurementChannel<N> {
    /// Channel whose gate period equals the window capacity
    pub fn new(quantity: Quantity) -> Self {
        let period = NonZeroU32::new(N as u32).unwrap_or(NonZeroU32::MIN);
        Self::with_period(quantity, period)
    }

    /// Channel with an explicit gate period
    ///
    /// A period shorter than `N` cannot publish before the window is full;
    /// gate fires that happen earlier are dropped.
    pub fn with_period(quantity: Quantity, period: NonZeroU32) -> Self {
        Self {
            quantity,
            window: SampleWindow::new(),
            gate: PublishGate::new(period),
            current: None,
        }
    }

    /// Accept one raw reading, returning a value when a publish is due
    pub fn record(&mut self, raw: f64, at: Timestamp) -> Option<PublishedValue> {
        self.window.push(raw);

        if !self.gate.tick() {
            return None;
        }

        if !self.window.is_full() {
            log::debug!(
                "{}: publish skipped, window holds {}/{} samples",
                self.quantity,
                self.window.len(),
                N
            );
            return None;
        }

        let value = self.quantity.transform(self.window.mean()?);
        self.current = Some(value);

        Some(PublishedValue {
            quantity: self.quantity,
            value,
            timestamp: at,
        })
    }

    /// Last published value, `None` before the first publish
    pub fn current(&self) -> Option<f64> {
        self.current
    }

    /// Quantity measured by this channel
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Read-only view of the sample window
    pub fn window(&self) -> &SampleWindow<N> {
        &self.window
    }

    /// Read-only view of the publish gate
    pub fn gate(&self) -> &PublishGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<const N: usize>(
        channel: &mut MeasurementChannel<N>,
        readings: &[f64],
    ) -> Vec<Option<PublishedValue>> {
        readings
            .iter()
            .enumerate()
            .map(|(i, r)| channel.record(*r, i as Timestamp * 5_000))
            .collect()
    }

    #[test]
    fn no_current_value_before_first_publish() {
        let mut channel: MeasurementChannel = MeasurementChannel::new(Quantity::Temperature);

        for _ in 0..29 {
            assert!(channel.record(20.0, 0).is_none());
            assert!(channel.current().is_none());
        }
    }

    #[test]
    fn spike_on_thirtieth_reading() {
        let mut channel: MeasurementChannel = MeasurementChannel::new(Quantity::Temperature);

        let mut readings = vec![20.0; 29];
        readings.push(50.0);
        let results = feed(&mut channel, &readings);

        assert!(results[..29].iter().all(Option::is_none));
        let published = results[29].expect("publish on call 30");
        assert_eq!(published.quantity, Quantity::Temperature);
        assert!((published.value - 21.0).abs() < 1e-12);
        assert_eq!(published.timestamp, 29 * 5_000);
        assert_eq!(channel.current(), Some(published.value));
    }

    #[test]
    fn pressure_transformed_after_average() {
        let mut channel: MeasurementChannel = MeasurementChannel::new(Quantity::Pressure);

        let results = feed(&mut channel, &[101_325.0; 30]);

        assert_eq!(results[29].map(|p| p.value), Some(1013.25));
    }

    #[test]
    fn one_publish_per_period() {
        let mut channel: MeasurementChannel = MeasurementChannel::new(Quantity::Humidity);

        let readings: Vec<f64> = (0..90).map(|i| 40.0 + (i % 7) as f64).collect();
        let published: Vec<usize> = feed(&mut channel, &readings)
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|_| i))
            .collect();

        assert_eq!(published, vec![29, 59, 89]);
    }

    #[test]
    fn later_publishes_cover_last_window() {
        let mut channel: MeasurementChannel = MeasurementChannel::new(Quantity::Humidity);

        let mut readings = vec![10.0; 30];
        readings.extend(std::iter::repeat(40.0).take(30));
        let results = feed(&mut channel, &readings);

        assert_eq!(results[29].map(|p| p.value), Some(10.0));
        assert_eq!(results[59].map(|p| p.value), Some(40.0));
        assert_eq!(channel.current(), Some(40.0));
    }

    #[test]
    fn short_period_waits_for_full_window() {
        let period = NonZeroU32::new(2).unwrap();
        let mut channel = MeasurementChannel::<4>::with_period(Quantity::Temperature, period);

        let results = feed(&mut channel, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        // Fires at 2 (window half full, dropped), 4 and 6
        assert!(results[1].is_none());
        assert_eq!(results[3].map(|p| p.value), Some(2.5));
        assert_eq!(results[5].map(|p| p.value), Some(4.5));
    }

    #[test]
    fn long_period_publishes_less_often() {
        let period = NonZeroU32::new(6).unwrap();
        let mut channel = MeasurementChannel::<3>::with_period(Quantity::Temperature, period);

        let results = feed(&mut channel, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(results.iter().filter(|p| p.is_some()).count(), 1);
        assert_eq!(results[5].map(|p| p.value), Some(5.0));
    }
}
