//! Sample-rate conversion from the DSP's fixed 32 kHz tick rate to an
//! arbitrary host output rate, using 4-point cubic Hermite interpolation.

use std::collections::VecDeque;

// Scale frequencies up to better handle ratios that don't reduce cleanly,
// and to keep all of the counter arithmetic in fixed-point integers rather
// than accumulating floating-point error over a long-running stream.
const SCALING_FACTOR: u64 = 1_000_000_000;

#[must_use]
pub fn interpolate_cubic_hermite_4p([ym1, y0, y1, y2]: [f64; 4], x: f64) -> f64 {
    let c0 = y0;
    let c1 = 0.5 * (y1 - ym1);
    let c2 = ym1 - 2.5 * y0 + 2.0 * y1 - 0.5 * y2;
    let c3 = 0.5 * (y2 - ym1) + 1.5 * (y0 - y1);

    ((c3 * x + c2) * x + c1) * x + c0
}

fn scale_frequency(frequency: f64) -> u64 {
    (frequency * SCALING_FACTOR as f64).round() as u64
}

/// Resamples a fixed-rate stereo source stream to an adjustable output rate.
/// The source frequency is fixed at construction (the DSP always ticks at
/// exactly 32 kHz); only the output frequency is ever changed at runtime.
#[derive(Debug, Clone)]
pub struct CubicResampler {
    scaled_source_frequency: u64,
    scaled_output_frequency: u64,
    cycle_counter_product: u64,
    // Fractional position between the two center taps, scaled by SCALING_FACTOR.
    scaled_x_counter: u64,
    history_l: [f64; 4],
    history_r: [f64; 4],
    output_queue: VecDeque<(f32, f32)>,
}

impl CubicResampler {
    #[must_use]
    pub fn new(source_frequency: f64, output_frequency: u64) -> Self {
        Self {
            scaled_source_frequency: scale_frequency(source_frequency),
            scaled_output_frequency: output_frequency * SCALING_FACTOR,
            cycle_counter_product: 0,
            scaled_x_counter: 0,
            history_l: [0.0; 4],
            history_r: [0.0; 4],
            output_queue: VecDeque::with_capacity(64),
        }
    }

    pub fn update_output_frequency(&mut self, output_frequency: u64) {
        self.scaled_output_frequency = output_frequency * SCALING_FACTOR;
    }

    /// Feeds one 32 kHz source sample in. May push zero or more resampled
    /// output frames into the internal queue.
    pub fn collect_sample(&mut self, sample_l: f64, sample_r: f64) {
        self.history_l.copy_within(1..4, 0);
        self.history_r.copy_within(1..4, 0);
        self.history_l[3] = sample_l;
        self.history_r[3] = sample_r;

        self.cycle_counter_product += self.scaled_output_frequency;

        while self.cycle_counter_product >= self.scaled_source_frequency {
            self.cycle_counter_product -= self.scaled_source_frequency;

            let x = self.scaled_x_counter as f64 / SCALING_FACTOR as f64;
            let out_l = interpolate_cubic_hermite_4p(self.history_l, x);
            let out_r = interpolate_cubic_hermite_4p(self.history_r, x);
            self.output_queue.push_back((out_l as f32, out_r as f32));

            self.scaled_x_counter += self.scaled_source_frequency;
            self.scaled_x_counter %= self.scaled_output_frequency.max(1);
        }
    }

    #[must_use]
    pub fn output_buffer_len(&self) -> usize {
        self.output_queue.len()
    }

    pub fn output_buffer_pop_front(&mut self) -> Option<(f32, f32)> {
        self.output_queue.pop_front()
    }

    pub fn clear(&mut self) {
        self.output_queue.clear();
        self.cycle_counter_product = 0;
        self.scaled_x_counter = 0;
        self.history_l = [0.0; 4];
        self.history_r = [0.0; 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_at_equal_rates_is_near_identity() {
        let mut resampler = CubicResampler::new(32_000.0, 32_000);
        for i in 0..8 {
            resampler.collect_sample(f64::from(i), -f64::from(i));
        }
        assert!(resampler.output_buffer_len() >= 4);
    }

    #[test]
    fn upsampling_produces_more_output_than_input() {
        let mut resampler = CubicResampler::new(32_000.0, 44_100);
        for _ in 0..320 {
            resampler.collect_sample(1.0, -1.0);
        }
        assert!(resampler.output_buffer_len() > 320);
    }

    #[test]
    fn downsampling_produces_less_output_than_input() {
        let mut resampler = CubicResampler::new(32_000.0, 8_000);
        for _ in 0..320 {
            resampler.collect_sample(1.0, -1.0);
        }
        assert!(resampler.output_buffer_len() < 320);
    }
}
