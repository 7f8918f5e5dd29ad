//! Read-only analysis tap on the master output, for visualization.

use std::fmt;
use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Keeps the most recent `fft_size` mono output samples.
pub struct Analyser {
    ring: Vec<f32>,
    write_pos: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.ring.len())
            .finish()
    }
}

impl Analyser {
    /// `fft_size` is rounded up to a power of two (minimum 32).
    pub fn new(fft_size: usize) -> Self {
        let size = fft_size.max(32).next_power_of_two();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        Analyser {
            ring: vec![0.0; size],
            write_pos: 0,
            fft,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.ring.len()
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.ring.len() / 2
    }

    /// Feed one output sample.
    #[inline]
    pub(crate) fn push(&mut self, sample: f32) {
        self.ring[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.ring.len();
    }

    /// Copy the latest samples, oldest first, into `out`. If `out` is
    /// shorter than the window, the most recent samples are kept.
    pub fn time_domain_data(&self, out: &mut [f32]) {
        let size = self.ring.len();
        let n = out.len().min(size);
        let start = (self.write_pos + size - n) % size;
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            *slot = self.ring[(start + i) % size];
        }
    }

    /// Time-domain data as unsigned bytes: 128 is silence, 0 and 255 are
    /// full scale.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        let mut floats = vec![0.0_f32; out.len().min(self.ring.len())];
        self.time_domain_data(&mut floats);
        for (byte, &s) in out.iter_mut().zip(&floats) {
            *byte = (128.0 + s * 128.0).clamp(0.0, 255.0) as u8;
        }
    }

    /// Magnitude spectrum in decibels over a Blackman window. Fills up to
    /// `frequency_bin_count()` bins.
    pub fn frequency_data(&self, out: &mut [f32]) {
        let size = self.ring.len();
        let mut window = vec![0.0_f32; size];
        self.time_domain_data(&mut window);

        let mut spectrum: Vec<Complex<f32>> = window
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let x = i as f64 / size as f64;
                let w = 0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos();
                Complex::new(s * w as f32, 0.0)
            })
            .collect();
        self.fft.process(&mut spectrum);

        for (slot, bin) in out.iter_mut().zip(&spectrum[..size / 2]) {
            let magnitude = bin.norm() / size as f32;
            *slot = 20.0 * magnitude.max(1e-12).log10();
        }
    }
}
