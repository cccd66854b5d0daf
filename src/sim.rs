//! Sim module: an in-process host and the loop that drives a chip through it.
//!
//! `SimHost` implements [`Host`] with a 0-5 V analog subsystem by default:
//! reads and writes are clamped to the configured rails, and reads can be
//! quantized to an ADC resolution. `Simulation` owns a host and a chip and
//! delivers timer expiries to the chip in chronological order.

use crate::chip::Chip;
use crate::error::{ChipError, ChipResult, HostError};
use crate::host::{AttrId, Host, PinId, PinMode, TimerId};
use crate::invariant_ppt::{assert_invariant, CONFIG_RAILS_ORDERED, TIMER_ARMED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Lowest voltage an analog pin can carry.
    pub rail_low: f32,
    /// Highest voltage an analog pin can carry.
    pub rail_high: f32,
    /// ADC resolution for reads; `None` samples exactly.
    pub adc_bits: Option<u8>,
    /// Attribute values set by the user, overriding chip defaults.
    pub attrs: BTreeMap<String, f32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rail_low: 0.0,
            rail_high: 5.0,
            adc_bits: None,
            attrs: BTreeMap::new(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> ChipResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> ChipResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        debug!("Loaded simulator config from {}", path.as_ref().display());
        Self::from_json(&json)
    }

    /// Override an attribute's initial value.
    pub fn with_attr(mut self, name: &str, value: f32) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    /// Reject non-finite or unordered rails and out-of-range ADC resolutions.
    pub fn validate(&self) -> ChipResult<()> {
        if !self.rail_low.is_finite() || !self.rail_high.is_finite() {
            return Err(ChipError::InvalidConfig(format!(
                "rails must be finite (got {} .. {})",
                self.rail_low, self.rail_high
            )));
        }
        if !(self.rail_low < self.rail_high) {
            return Err(ChipError::InvalidConfig(format!(
                "rails must satisfy low < high (got {} .. {})",
                self.rail_low, self.rail_high
            )));
        }
        if let Some(bits) = self.adc_bits {
            if !(1..=24).contains(&bits) {
                return Err(ChipError::InvalidConfig(format!(
                    "adc_bits must be within 1..=24 (got {})",
                    bits
                )));
            }
        }
        Ok(())
    }

    /// Limit a voltage to the rails. NaN lands on the low rail.
    pub fn clamp(&self, volts: f32) -> f32 {
        volts.max(self.rail_low).min(self.rail_high)
    }

    fn sample(&self, volts: f32) -> f32 {
        let clamped = self.clamp(volts);
        match self.adc_bits {
            Some(bits) => {
                let steps = ((1u32 << bits) - 1) as f32;
                let span = self.rail_high - self.rail_low;
                let code = ((clamped - self.rail_low) / span * steps).round();
                self.rail_low + code / steps * span
            }
            None => clamped,
        }
    }
}

#[derive(Debug, Clone)]
struct PinSlot {
    name: String,
    mode: PinMode,
    level: f32,
}

#[derive(Debug, Clone)]
struct AttrSlot {
    name: String,
    value: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct TimerSlot {
    period_us: u32,
    repeat: bool,
    next_due: Option<u64>,
}

/// In-process simulator host.
#[derive(Debug, Clone)]
pub struct SimHost {
    config: SimConfig,
    pins: Vec<PinSlot>,
    attrs: Vec<AttrSlot>,
    timers: Vec<TimerSlot>,
    now_us: u64,
}

impl SimHost {
    /// An empty host; `config` is used as given, without validation.
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            pins: Vec::new(),
            attrs: Vec::new(),
            timers: Vec::new(),
            now_us: 0,
        }
    }

    /// Settings this host was created with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulated time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// Handle of a registered pin.
    pub fn pin(&self, name: &str) -> Option<PinId> {
        self.pins
            .iter()
            .position(|p| p.name == name)
            .map(|i| PinId(i as u32))
    }

    /// Registered pin names, in registration order.
    pub fn pin_names(&self) -> impl Iterator<Item = &str> {
        self.pins.iter().map(|p| p.name.as_str())
    }

    /// Mode a pin was registered with.
    pub fn pin_mode(&self, pin: PinId) -> Option<PinMode> {
        self.pins.get(pin.0 as usize).map(|p| p.mode)
    }

    /// Level currently on a pin, by name.
    pub fn voltage(&self, name: &str) -> Option<f32> {
        self.pins.iter().find(|p| p.name == name).map(|p| p.level)
    }

    /// Level currently on a pin.
    pub fn pin_voltage(&self, pin: PinId) -> Option<f32> {
        self.pins.get(pin.0 as usize).map(|p| p.level)
    }

    /// Apply an external voltage to a pin, by name.
    pub fn drive(&mut self, name: &str, volts: f32) {
        match self.pin(name) {
            Some(pin) => self.drive_pin(pin, volts),
            None => warn!("Cannot drive unknown pin '{}'", name),
        }
    }

    /// Apply an external voltage to a pin.
    pub fn drive_pin(&mut self, pin: PinId, volts: f32) {
        match self.pins.get_mut(pin.0 as usize) {
            Some(slot) => slot.level = volts,
            None => warn!("Cannot drive unknown pin {:?}", pin),
        }
    }

    /// Handle of a registered attribute.
    pub fn attr(&self, name: &str) -> Option<AttrId> {
        self.attrs
            .iter()
            .position(|a| a.name == name)
            .map(|i| AttrId(i as u32))
    }

    /// Registered attribute names, in registration order.
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|a| a.name.as_str())
    }

    /// Current value of an attribute, by name.
    pub fn attr_value(&self, name: &str) -> Option<f32> {
        self.attrs.iter().find(|a| a.name == name).map(|a| a.value)
    }

    /// Edit an attribute the way a user would from the part's property panel.
    pub fn set_attr(&mut self, name: &str, value: f32) {
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(slot) => {
                debug!("Attribute '{}' set to {}", name, value);
                slot.value = value;
            }
            None => warn!("Cannot set unknown attribute '{}'", name),
        }
    }

    /// `(period_us, repeat)` of an armed timer; `None` if idle or unknown.
    pub fn timer_period(&self, timer: TimerId) -> Option<(u32, bool)> {
        self.timers
            .get(timer.0 as usize)
            .filter(|t| t.next_due.is_some())
            .map(|t| (t.period_us, t.repeat))
    }

    /// Number of timers allocated, armed or not.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Config attribute overrides no registered attribute consumed.
    pub fn unused_overrides(&self) -> impl Iterator<Item = &str> {
        self.config
            .attrs
            .keys()
            .map(String::as_str)
            .filter(|name| self.attr(name).is_none())
    }

    /// Earliest armed expiry at or before `until_us`. Ties go to the lower timer id.
    fn next_expiry(&self, until_us: u64) -> Option<(u64, TimerId)> {
        self.timers
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.next_due.map(|due| (due, TimerId(i as u32))))
            .filter(|&(due, _)| due <= until_us)
            .min()
    }

    /// Advance the clock to the next expiry no later than `until_us` and rearm or
    /// disarm that timer.
    fn expire_next(&mut self, until_us: u64) -> Option<TimerId> {
        let (due, timer) = self.next_expiry(until_us)?;
        self.now_us = due;
        let slot = &mut self.timers[timer.0 as usize];
        slot.next_due = if slot.repeat {
            Some(due + u64::from(slot.period_us))
        } else {
            None
        };
        Some(timer)
    }

    fn advance_to(&mut self, now_us: u64) {
        self.now_us = self.now_us.max(now_us);
    }

    fn timer_slot(&mut self, timer: TimerId) -> Result<&mut TimerSlot, HostError> {
        self.timers
            .get_mut(timer.0 as usize)
            .ok_or(HostError::UnknownTimer(timer))
    }
}

impl Host for SimHost {
    fn pin_init(&mut self, name: &str, mode: PinMode) -> Result<PinId, HostError> {
        if self.pin(name).is_some() {
            return Err(HostError::DuplicatePin(name.to_string()));
        }
        let id = PinId(self.pins.len() as u32);
        self.pins.push(PinSlot {
            name: name.to_string(),
            mode,
            level: 0.0,
        });
        debug!("Pin '{}' registered as {:?} ({:?})", name, id, mode);
        Ok(id)
    }

    fn pin_adc_read(&self, pin: PinId) -> f32 {
        match self.pins.get(pin.0 as usize) {
            Some(slot) => self.config.sample(slot.level),
            None => {
                warn!("ADC read from unknown pin {:?}", pin);
                self.config.rail_low
            }
        }
    }

    fn pin_dac_write(&mut self, pin: PinId, voltage: f32) {
        let clamped = self.config.clamp(voltage);
        match self.pins.get_mut(pin.0 as usize) {
            Some(slot) if slot.mode == PinMode::Analog => slot.level = clamped,
            Some(slot) => warn!(
                "DAC write to non-analog pin '{}' ({:?}) ignored",
                slot.name, slot.mode
            ),
            None => warn!("DAC write to unknown pin {:?} ignored", pin),
        }
    }

    fn attr_init_float(&mut self, name: &str, default: f32) -> Result<AttrId, HostError> {
        if self.attr(name).is_some() {
            return Err(HostError::DuplicateAttr(name.to_string()));
        }
        let value = self.config.attrs.get(name).copied().unwrap_or(default);
        let id = AttrId(self.attrs.len() as u32);
        self.attrs.push(AttrSlot {
            name: name.to_string(),
            value,
        });
        debug!("Attribute '{}' registered as {:?} = {}", name, id, value);
        Ok(id)
    }

    fn attr_read_float(&self, attr: AttrId) -> f32 {
        match self.attrs.get(attr.0 as usize) {
            Some(slot) => slot.value,
            None => {
                warn!("Read from unknown attribute {:?}", attr);
                0.0
            }
        }
    }

    fn timer_init(&mut self) -> Result<TimerId, HostError> {
        let id = TimerId(self.timers.len() as u32);
        self.timers.push(TimerSlot::default());
        Ok(id)
    }

    fn timer_start(
        &mut self,
        timer: TimerId,
        period_us: u32,
        repeat: bool,
    ) -> Result<(), HostError> {
        if period_us == 0 {
            return Err(HostError::InvalidPeriod(period_us));
        }
        let now = self.now_us;
        let slot = self.timer_slot(timer)?;
        slot.period_us = period_us;
        slot.repeat = repeat;
        slot.next_due = Some(now + u64::from(period_us));
        debug!(
            "Timer {:?} started: period {} us, repeat {}",
            timer, period_us, repeat
        );
        Ok(())
    }

    fn timer_stop(&mut self, timer: TimerId) -> Result<(), HostError> {
        self.timer_slot(timer)?.next_due = None;
        debug!("Timer {:?} stopped", timer);
        Ok(())
    }
}

/// A chip loaded into a [`SimHost`], driven by simulated time.
#[derive(Debug)]
pub struct Simulation<C: Chip> {
    host: SimHost,
    chip: C,
    deliveries: u64,
}

impl<C: Chip> Simulation<C> {
    /// Validate the config, create a host and load the chip into it.
    pub fn boot(config: SimConfig) -> ChipResult<Self> {
        config.validate()?;
        assert_invariant(
            CONFIG_RAILS_ORDERED,
            config.rail_low < config.rail_high,
            "Rails are strictly ordered",
            Some("Simulation::boot"),
        );
        let mut host = SimHost::new(config);
        let chip = C::init(&mut host)?;
        assert_invariant(
            TIMER_ARMED,
            host.timers.is_empty() || host.timers.iter().any(|t| t.next_due.is_some()),
            "Chip armed one of the timers it allocated",
            Some("Simulation::boot"),
        );
        for name in host.unused_overrides() {
            warn!("Config override '{}' matches no attribute of the chip", name);
        }
        info!(
            "Simulation booted: {} pins, {} attributes, {} timers",
            host.pins.len(),
            host.attrs.len(),
            host.timers.len()
        );
        Ok(Self {
            host,
            chip,
            deliveries: 0,
        })
    }

    /// The host the chip is loaded into.
    pub fn host(&self) -> &SimHost {
        &self.host
    }

    /// Mutable host access for driving inputs and editing attributes between ticks.
    pub fn host_mut(&mut self) -> &mut SimHost {
        &mut self.host
    }

    /// The loaded chip.
    pub fn chip(&self) -> &C {
        &self.chip
    }

    /// Simulated time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.host.now_us
    }

    /// Timer expiries delivered since boot.
    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    /// When the next armed timer is due, if any.
    pub fn next_tick_us(&self) -> Option<u64> {
        self.host.next_expiry(u64::MAX).map(|(due, _)| due)
    }

    /// Deliver the next pending timer expiry, however far away it is.
    ///
    /// Returns `None` when no timer is armed.
    pub fn step(&mut self) -> Option<TimerId> {
        let timer = self.host.expire_next(u64::MAX)?;
        self.deliver(timer);
        Some(timer)
    }

    /// Deliver the next pending expiry if it is due no later than `until_us`.
    ///
    /// Returns `None`, leaving the clock untouched, when nothing is due by then.
    pub fn step_until(&mut self, until_us: u64) -> Option<TimerId> {
        let timer = self.host.expire_next(until_us)?;
        self.deliver(timer);
        Some(timer)
    }

    /// Deliver up to `n` expiries; returns how many were delivered.
    pub fn run_ticks(&mut self, n: usize) -> usize {
        (0..n).take_while(|_| self.step().is_some()).count()
    }

    /// Run for `duration_us` of simulated time, delivering every expiry that
    /// falls inside the window. Returns how many were delivered.
    pub fn run_for(&mut self, duration_us: u64) -> u64 {
        let end = self.host.now_us.saturating_add(duration_us);
        let mut delivered = 0;
        while self.step_until(end).is_some() {
            delivered += 1;
        }
        self.host.advance_to(end);
        delivered
    }

    fn deliver(&mut self, timer: TimerId) {
        trace!("t={} us: delivering {:?}", self.host.now_us, timer);
        self.chip.on_timer(&mut self.host, timer);
        self.deliveries += 1;
    }
}
