//! Echo effect — stereo feedback delay line.
//!
//! Topology: input → delay → wet → output, with the delay output also fed
//! through a feedback gain back into the delay input. Enabling and
//! disabling only moves the wet level; the delay line keeps running so
//! parameter changes made while disabled still apply.

use crate::config::EchoConfig;

#[derive(Debug, Clone)]
pub struct Echo {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,

    delay_samples: usize,
    delay_ms: f64,
    feedback: f64,
    wet: f64,
    enabled: bool,
    config: EchoConfig,
}

impl Echo {
    /// Create a disabled echo at the minimum delay with no feedback.
    pub fn new(sample_rate: f64, config: EchoConfig) -> Self {
        let buffer_size = (sample_rate * config.max_delay_seconds) as usize + 1;
        let mut echo = Echo {
            buffer_l: vec![0.0; buffer_size],
            buffer_r: vec![0.0; buffer_size],
            write_pos: 0,
            sample_rate,
            delay_samples: 0,
            delay_ms: 0.0,
            feedback: 0.0,
            wet: 0.0,
            enabled: false,
            config,
        };
        echo.set_delay_ms(echo.config.delay_ms.min);
        echo.set_feedback(echo.config.feedback.min);
        echo
    }

    /// Set the delay time in milliseconds, clamped to the configured range.
    pub fn set_delay_ms(&mut self, ms: f64) {
        self.delay_ms = self.config.delay_ms.clamp(ms);
        let samples = (self.delay_ms / 1000.0 * self.sample_rate).round() as usize;
        self.delay_samples = samples.clamp(1, self.buffer_l.len() - 1);
    }

    /// Set the feedback gain, clamped to the configured range.
    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = self.config.feedback.clamp(feedback);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.wet = if enabled { self.config.wet_level } else { 0.0 };
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn feedback(&self) -> f64 {
        self.feedback
    }

    pub fn wet_level(&self) -> f64 {
        self.wet
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Process one stereo frame and return the wet output.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let buffer_len = self.buffer_l.len();
        let read_pos = (self.write_pos + buffer_len - self.delay_samples) % buffer_len;

        let delayed_l = self.buffer_l[read_pos];
        let delayed_r = self.buffer_r[read_pos];

        let feedback = self.feedback as f32;
        self.buffer_l[self.write_pos] = left + delayed_l * feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * feedback;
        self.write_pos = (self.write_pos + 1) % buffer_len;

        let wet = self.wet as f32;
        (delayed_l * wet, delayed_r * wet)
    }

    /// Clear the delay line.
    pub fn clear(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(sample_rate: f64) -> Echo {
        Echo::new(sample_rate, EchoConfig::default())
    }

    #[test]
    fn starts_disabled_at_minimum() {
        let e = echo(44100.0);
        assert!(!e.is_enabled());
        assert_eq!(e.wet_level(), 0.0);
        assert_eq!(e.delay_ms(), 150.0);
        assert_eq!(e.feedback(), 0.0);
    }

    #[test]
    fn clamps_out_of_range_input() {
        let mut e = echo(44100.0);
        e.set_feedback(1.5);
        assert_eq!(e.feedback(), 0.9);
        e.set_feedback(-0.2);
        assert_eq!(e.feedback(), 0.0);
        e.set_delay_ms(0.0);
        assert_eq!(e.delay_ms(), 150.0);
        e.set_delay_ms(5000.0);
        assert_eq!(e.delay_ms(), 600.0);
        e.set_delay_ms(320.0);
        assert_eq!(e.delay_ms(), 320.0);
    }

    #[test]
    fn enable_toggles_wet_level() {
        let mut e = echo(44100.0);
        e.set_enabled(true);
        assert_eq!(e.wet_level(), 0.5);
        e.set_enabled(false);
        assert_eq!(e.wet_level(), 0.0);
    }

    #[test]
    fn disabled_echo_is_silent() {
        let mut e = echo(1000.0);
        e.process(1.0, 1.0);
        for _ in 0..1000 {
            let (l, r) = e.process(0.0, 0.0);
            assert_eq!((l, r), (0.0, 0.0));
        }
    }

    #[test]
    fn repeats_decay_by_feedback() {
        // 1 kHz rate and 200 ms delay: repeats every 200 samples.
        let mut e = echo(1000.0);
        e.set_enabled(true);
        e.set_delay_ms(200.0);
        e.set_feedback(0.5);

        let mut out = Vec::new();
        out.push(e.process(1.0, 1.0).0);
        for _ in 0..600 {
            out.push(e.process(0.0, 0.0).0);
        }
        assert!((out[200] - 0.5).abs() < 1e-6);
        assert!((out[400] - 0.25).abs() < 1e-6);
        assert!((out[600] - 0.125).abs() < 1e-6);
        assert!(out[199].abs() < 1e-9 && out[201].abs() < 1e-9);
    }

    #[test]
    fn disabled_line_keeps_running() {
        // Audio sent while disabled is still audible after enabling.
        let mut e = echo(1000.0);
        e.set_delay_ms(200.0);
        e.process(1.0, 1.0);
        for _ in 0..100 {
            e.process(0.0, 0.0);
        }
        e.set_enabled(true);
        let mut heard = 0.0_f32;
        for _ in 0..150 {
            heard = heard.max(e.process(0.0, 0.0).0);
        }
        assert!((heard - 0.5).abs() < 1e-6);
    }
}
