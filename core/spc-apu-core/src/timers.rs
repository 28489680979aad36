//! Hardware timers T0/T1 (8 kHz) and T2 (64 kHz), driven by CPU-cycle
//! accumulation rather than by a separate clock domain so they stay exactly
//! in phase with the instruction stream.
//!
//! The nominal SPC700 clock runs at just over 1.024 MHz (derived from the
//! DSP's fixed 32 kHz sample clock: 32 CPU cycles per DSP tick). At that
//! clock, an 8 kHz tick is every 128 CPU cycles and a 64 kHz tick is every
//! 16 CPU cycles, which is exactly the ratio this module pins.

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode)]
pub struct Timer<const CPU_CYCLES_PER_TICK: u8> {
    enabled: bool,
    cycle_divider: u8,
    target: u16,
    stage: u16,
    counter: u8,
}

impl<const CPU_CYCLES_PER_TICK: u8> Timer<CPU_CYCLES_PER_TICK> {
    #[must_use]
    pub fn new() -> Self {
        Self { enabled: false, cycle_divider: CPU_CYCLES_PER_TICK, target: 256, stage: 0, counter: 0 }
    }

    /// Advances the timer by one CPU cycle. A no-op while disabled, matching
    /// hardware: a disabled timer does not silently accumulate stage ticks
    /// that would otherwise fire immediately the moment it is re-enabled.
    pub fn tick_cpu_cycle(&mut self) {
        if !self.enabled {
            return;
        }

        self.cycle_divider -= 1;
        if self.cycle_divider == 0 {
            self.cycle_divider = CPU_CYCLES_PER_TICK;
            self.clock();
        }
    }

    fn clock(&mut self) {
        self.stage += 1;
        if self.stage >= self.target {
            self.stage = 0;
            self.counter = self.counter.wrapping_add(1) & 0x0F;
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.cycle_divider = CPU_CYCLES_PER_TICK;
            self.stage = 0;
            self.counter = 0;
        }
        self.enabled = enabled;
    }

    #[must_use]
    pub fn divider(&self) -> u8 {
        if self.target == 256 { 0 } else { self.target as u8 }
    }

    pub fn set_divider(&mut self, divider: u8) {
        self.target = if divider == 0 { 256 } else { u16::from(divider) };
    }

    /// Reads the 4-bit output counter and clears it, per hardware.
    pub fn read_counter(&mut self) -> u8 {
        let counter = self.counter;
        self.counter = 0;
        counter
    }
}

impl<const CPU_CYCLES_PER_TICK: u8> Default for Timer<CPU_CYCLES_PER_TICK> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SlowTimer = Timer<128>;
pub type FastTimer = Timer<16>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_timer_counts_at_default_divider() {
        let mut timer = FastTimer::new();
        timer.set_enabled(true);
        for _ in 0..(16 * 256) {
            timer.tick_cpu_cycle();
        }
        assert_eq!(timer.read_counter(), 1);
    }

    #[test]
    fn read_counter_clears_on_read() {
        let mut timer = SlowTimer::new();
        timer.set_enabled(true);
        timer.set_divider(1);
        for _ in 0..128 {
            timer.tick_cpu_cycle();
        }
        assert_eq!(timer.read_counter(), 1);
        assert_eq!(timer.read_counter(), 0);
    }

    #[test]
    fn disabled_timer_does_not_advance() {
        let mut timer = SlowTimer::new();
        timer.set_divider(1);
        for _ in 0..1000 {
            timer.tick_cpu_cycle();
        }
        assert_eq!(timer.read_counter(), 0);
    }

    #[test]
    fn counter_wraps_at_16() {
        let mut timer = SlowTimer::new();
        timer.set_enabled(true);
        timer.set_divider(1);
        for _ in 0..(128 * 16) {
            timer.tick_cpu_cycle();
        }
        assert_eq!(timer.read_counter(), 0);
    }
}
