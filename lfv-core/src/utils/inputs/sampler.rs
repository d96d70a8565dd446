//! Analog sampling sequence over the single shared converter.
//!
//! One conversion is in flight at a time. The completion interrupt stores the
//! result for the channel that was converted, picks the next channel and
//! re-triggers. A failed read is not retried; readers keep seeing the previous
//! value. A failed start leaves the sampler idle until [`Sampler::begin`] is
//! called again.

use crate::utils::{
    config::{SamplerConfig, SamplingMode},
    hw::Converter,
    state::{Channel, SharedState, CHANNEL_COUNT},
};

/// Highest value a 10-bit conversion can return.
pub const ADC_MAX: u16 = 1023;

#[derive(Debug, Clone)]
pub struct Sampler {
    mode: SamplingMode,
    enabled: [bool; CHANNEL_COUNT],
    current: Channel,
    in_flight: bool,
    active: bool,
}

impl Sampler {
    pub fn new(cfg: &SamplerConfig) -> Self {
        let first = match cfg.mode {
            SamplingMode::LegacyPair => Channel::SensorLeft,
            SamplingMode::RoundRobin => Channel::ALL
                .iter()
                .copied()
                .find(|ch| cfg.enabled[ch.index()])
                .unwrap_or(Channel::SensorLeft),
        };
        let active = cfg.mode == SamplingMode::LegacyPair || cfg.enabled.iter().any(|&on| on);
        if !active {
            tracing::warn!("no analog channel enabled, sampling disabled");
        }
        Self {
            mode: cfg.mode,
            enabled: cfg.enabled,
            current: first,
            in_flight: false,
            active,
        }
    }

    /// False when no channel is selected for sampling at all.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Channel currently selected on the multiplexer.
    pub fn current(&self) -> Channel {
        self.current
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Channel to convert after `channel`.
    pub fn next_channel(
        &self,
        channel: Channel,
    ) -> Channel {
        match self.mode {
            SamplingMode::LegacyPair => match channel {
                Channel::SensorLeft => Channel::SensorRight,
                _ => Channel::SensorLeft,
            },
            SamplingMode::RoundRobin => (1..=CHANNEL_COUNT)
                .map(|step| (channel.index() + step) % CHANNEL_COUNT)
                .find(|&i| self.enabled[i])
                .and_then(Channel::from_index)
                .unwrap_or(channel),
        }
    }

    /// Select `channel` and trigger one conversion.
    ///
    /// Ignored while a conversion is already running.
    pub fn start<C: Converter>(
        &mut self,
        adc: &mut C,
        channel: Channel,
    ) -> Result<(), C::Error> {
        if self.in_flight {
            tracing::warn!(?channel, current = ?self.current, "conversion already in flight");
            return Ok(());
        }
        self.current = channel;
        adc.start(channel)?;
        self.in_flight = true;
        Ok(())
    }

    /// Kick off (or resume) the sequence at the current channel. No-op while
    /// inactive.
    pub fn begin<C: Converter>(
        &mut self,
        adc: &mut C,
    ) -> Result<(), C::Error> {
        if !self.active {
            return Ok(());
        }
        let first = self.current;
        self.start(adc, first)
    }

    /// Conversion-complete handler. Returns the channel now being converted.
    pub fn on_complete<C: Converter>(
        &mut self,
        adc: &mut C,
        shared: &SharedState,
    ) -> Result<Channel, C::Error> {
        let converted = self.current;
        self.in_flight = false;

        match adc.read() {
            Ok(raw) => shared.store_reading(converted, raw.min(ADC_MAX) as i16),
            Err(e) => tracing::warn!(channel = ?converted, ?e, "conversion failed, keeping last value"),
        }

        let next = self.next_channel(converted);
        self.start(adc, next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;
    use crate::utils::controllers::params::PersistentParameters;

    /// Converter returning `100 * (channel + 1)` for each conversion.
    #[derive(Default)]
    struct FakeAdc {
        selected: Option<Channel>,
        started: Vec<Channel>,
        fail_next_read: bool,
    }

    impl Converter for FakeAdc {
        type Error = ();

        fn start(
            &mut self,
            channel: Channel,
        ) -> Result<(), ()> {
            self.selected = Some(channel);
            self.started.push(channel);
            Ok(())
        }

        fn read(&mut self) -> Result<u16, ()> {
            if core::mem::take(&mut self.fail_next_read) {
                return Err(());
            }
            let ch = self.selected.ok_or(())?;
            Ok(100 * (ch as u16 + 1))
        }
    }

    fn shared() -> SharedState {
        SharedState::new(PersistentParameters::BOOT_DEFAULTS)
    }

    #[test]
    fn round_robin_visits_every_channel() {
        let shared = shared();
        let mut adc = FakeAdc::default();
        let mut s = Sampler::new(&SamplerConfig::default());
        s.begin(&mut adc).unwrap();
        for _ in 0..8 {
            s.on_complete(&mut adc, &shared).unwrap();
        }
        assert_eq!(
            &adc.started[..5],
            &[
                Channel::SensorLeft,
                Channel::SensorRight,
                Channel::BattLogic,
                Channel::BattDrive,
                Channel::SensorLeft
            ]
        );
        let r = shared.readings();
        assert_eq!(r.get(Channel::SensorLeft), 100);
        assert_eq!(r.get(Channel::SensorRight), 200);
        assert_eq!(r.get(Channel::BattLogic), 300);
        assert_eq!(r.get(Channel::BattDrive), 400);
    }

    #[test]
    fn disabled_channels_are_skipped() {
        let cfg = SamplerConfig {
            enabled: [false, true, false, true],
            ..SamplerConfig::default()
        };
        let s = Sampler::new(&cfg);
        assert_eq!(s.current(), Channel::SensorRight);
        assert_eq!(s.next_channel(Channel::SensorRight), Channel::BattDrive);
        assert_eq!(s.next_channel(Channel::BattDrive), Channel::SensorRight);
    }

    #[test]
    fn legacy_pair_never_touches_batteries() {
        let shared = shared();
        let mut adc = FakeAdc::default();
        let cfg = SamplerConfig {
            mode: SamplingMode::LegacyPair,
            ..SamplerConfig::default()
        };
        let mut s = Sampler::new(&cfg);
        s.begin(&mut adc).unwrap();
        for _ in 0..10 {
            s.on_complete(&mut adc, &shared).unwrap();
        }
        assert!(adc
            .started
            .iter()
            .all(|c| matches!(c, Channel::SensorLeft | Channel::SensorRight)));
        let r = shared.readings();
        assert_eq!(r.get(Channel::BattLogic), 0);
        assert_eq!(r.get(Channel::BattDrive), 0);
        assert_eq!(r.get(Channel::SensorRight), 200);
    }

    #[test]
    fn failed_read_keeps_previous_value_and_moves_on() {
        let shared = shared();
        shared.store_reading(Channel::SensorLeft, 512);
        let mut adc = FakeAdc {
            fail_next_read: true,
            ..FakeAdc::default()
        };
        let mut s = Sampler::new(&SamplerConfig::default());
        s.begin(&mut adc).unwrap();
        let next = s.on_complete(&mut adc, &shared).unwrap();
        assert_eq!(shared.readings().get(Channel::SensorLeft), 512);
        assert_eq!(next, Channel::SensorRight);
        assert!(s.in_flight());
    }

    #[test]
    fn nothing_enabled_never_converts() {
        let mut adc = FakeAdc::default();
        let cfg = SamplerConfig {
            enabled: [false; CHANNEL_COUNT],
            ..SamplerConfig::default()
        };
        let mut s = Sampler::new(&cfg);
        assert!(!s.is_active());
        s.begin(&mut adc).unwrap();
        assert!(adc.started.is_empty());
        assert!(!s.in_flight());
    }

    #[test]
    fn second_start_is_ignored_while_in_flight() {
        let mut adc = FakeAdc::default();
        let mut s = Sampler::new(&SamplerConfig::default());
        s.begin(&mut adc).unwrap();
        s.start(&mut adc, Channel::BattDrive).unwrap();
        assert_eq!(adc.started, [Channel::SensorLeft]);
        assert_eq!(s.current(), Channel::SensorLeft);
    }
}
