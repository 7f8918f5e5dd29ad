//! Resonant low-pass biquad for the oscillator bank.

use std::f64::consts::PI;

/// A 2nd-order low-pass IIR filter.
///
/// Direct Form II Transposed, coefficients from the Audio EQ Cookbook
/// (Robert Bristow-Johnson). Cutoff and Q can change while the filter is
/// running; coefficients are recomputed lazily on the next sample.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    frequency: f64,
    q: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
    dirty: bool,
}

impl LowpassFilter {
    pub fn new(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let mut f = LowpassFilter {
            frequency: 1000.0,
            q: 1.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
            dirty: true,
        };
        f.set_frequency(frequency);
        f.set_q(q);
        f.update_coefficients();
        f
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    /// Set the cutoff. Values at or above Nyquist are pulled just below it.
    pub fn set_frequency(&mut self, freq: f64) {
        let nyquist = self.sample_rate * 0.5;
        self.frequency = freq.clamp(1.0, nyquist * 0.99);
        self.dirty = true;
    }

    pub fn set_q(&mut self, q: f64) {
        self.q = q.max(1e-4);
        self.dirty = true;
    }

    fn update_coefficients(&mut self) {
        let w0 = 2.0 * PI * self.frequency / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * self.q);

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b0 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
        self.dirty = false;
    }

    /// Process a single sample.
    pub fn process(&mut self, input: f64) -> f64 {
        if self.dirty {
            self.update_coefficients();
        }

        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}
