//! Engine configuration.
//!
//! All tunable constants of the engine live here. The defaults reproduce the
//! factory behavior of the instrument; a JSON document can override any
//! subset of them.

use serde::{Deserialize, Serialize};

use crate::bank::VolumeLevel;
use crate::error::EngineError;

/// An inclusive parameter range used for clamping setter input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    /// True when `min <= max` and neither bound is NaN.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }

    /// Clamp `value` into the range. NaN maps to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

/// Linear gain of each volume switch position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeGains {
    pub off: f64,
    pub low: f64,
    pub high: f64,
}

impl Default for VolumeGains {
    fn default() -> Self {
        VolumeGains {
            off: 0.0,
            low: 0.3,
            high: 1.0,
        }
    }
}

impl VolumeGains {
    pub fn gain(&self, level: VolumeLevel) -> f64 {
        match level {
            VolumeLevel::Off => self.off,
            VolumeLevel::Low => self.low,
            VolumeLevel::High => self.high,
        }
    }
}

/// Echo effect bounds and levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EchoConfig {
    /// Delay time range in milliseconds.
    pub delay_ms: Range,
    /// Feedback gain range.
    pub feedback: Range,
    /// Length of the delay line in seconds.
    pub max_delay_seconds: f64,
    /// Wet level while enabled.
    pub wet_level: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        EchoConfig {
            delay_ms: Range::new(150.0, 600.0),
            feedback: Range::new(0.0, 0.9),
            max_delay_seconds: 1.0,
            wet_level: 0.5,
        }
    }
}

/// Reverb effect bounds and levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbConfig {
    pub decay: Range,
    pub density: Range,
    pub gain: Range,
    /// Wet level while enabled.
    pub wet_level: f64,
    /// Impulse length in seconds is `decay / decay_divisor * length_scale`.
    pub decay_divisor: f64,
    pub length_scale: f64,
    /// Spacing of the early-reflection taps in seconds.
    pub reflection_spacing: f64,
    /// Impulse amplitude is `gain / gain_divisor * output_scale`.
    pub gain_divisor: f64,
    pub output_scale: f64,
    /// Fixed RNG seed for the impulse noise. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        ReverbConfig {
            decay: Range::new(1.0, 50.0),
            density: Range::new(1.0, 25.0),
            gain: Range::new(1.0, 15.0),
            wet_level: 0.4,
            decay_divisor: 50.0,
            length_scale: 3.0,
            reflection_spacing: 0.02,
            gain_divisor: 15.0,
            output_scale: 0.3,
            seed: None,
        }
    }
}

/// Oscillator bank bounds and envelope timing margins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthConfig {
    pub filter_cutoff: Range,
    pub filter_q: Range,
    pub attack: Range,
    pub release: Range,
    pub length: Range,
    /// Oscillator stop time after the release ramp ends, in seconds.
    pub stop_margin: f64,
    /// Voice cleanup time after the release ramp ends, in seconds.
    pub cleanup_margin: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            filter_cutoff: Range::new(200.0, 8000.0),
            filter_q: Range::new(0.1, 20.0),
            attack: Range::new(0.01, 0.5),
            release: Range::new(0.1, 2.0),
            length: Range::new(0.5, 2.0),
            stop_margin: 0.01,
            cleanup_margin: 0.1,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Output channel count. Only stereo is supported.
    pub channels: u16,
    /// Master gain before the first `set_master_volume` call.
    pub initial_master_gain: f64,
    /// Highest master volume level; gain is `level / master_volume_max`.
    pub master_volume_max: f64,
    /// Gains of the off/low/high bank volume switch.
    pub volume_gains: VolumeGains,
    /// Allowed sample bank playback rate multipliers.
    pub pitch: Range,
    /// Seconds of crossfade applied to the tail of looping P-bank samples.
    pub crossfade_seconds: f64,
    /// Dry level of the master bus.
    pub dry_level: f64,
    /// Shared wet level for echo and reverb returns.
    pub wet_level: f64,
    /// Saturate the master bus with tanh instead of hard limiting at ±1.
    pub soft_clip: bool,
    /// Partition size of the reverb convolver (power of two).
    pub convolution_block: usize,
    /// FFT size of the analysis tap (power of two).
    pub analyser_fft_size: usize,
    pub echo: EchoConfig,
    pub reverb: ReverbConfig,
    pub synth: SynthConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            channels: 2,
            initial_master_gain: 0.5,
            master_volume_max: 11.0,
            volume_gains: VolumeGains::default(),
            pitch: Range::new(0.5, 2.0),
            crossfade_seconds: 0.15,
            dry_level: 1.0,
            wet_level: 0.5,
            soft_clip: false,
            convolution_block: 512,
            analyser_fft_size: 2048,
            echo: EchoConfig::default(),
            reverb: ReverbConfig::default(),
            synth: SynthConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with the default constants at the given sample rate.
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        EngineConfig {
            sample_rate,
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON document. Missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject configurations the output stage cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels != 2 {
            return Err(EngineError::InvalidChannelCount(self.channels));
        }
        if !self.master_volume_max.is_finite() || self.master_volume_max <= 0.0 {
            return Err(EngineError::InvalidMasterVolumeMax(self.master_volume_max));
        }
        for (name, range) in self.ranges() {
            if !range.is_ordered() {
                return Err(EngineError::InvalidRange {
                    name,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        let seconds = self.echo.max_delay_seconds;
        let longest_ms = self.echo.delay_ms.max;
        if !seconds.is_finite() || seconds * 1000.0 < longest_ms || seconds * self.sample_rate < 1.0 {
            return Err(EngineError::EchoLineTooShort { seconds, longest_ms });
        }
        Ok(())
    }

    /// Every clamping range, by name.
    fn ranges(&self) -> [(&'static str, Range); 11] {
        [
            ("pitch", self.pitch),
            ("echo.delayMs", self.echo.delay_ms),
            ("echo.feedback", self.echo.feedback),
            ("reverb.decay", self.reverb.decay),
            ("reverb.density", self.reverb.density),
            ("reverb.gain", self.reverb.gain),
            ("synth.filterCutoff", self.synth.filter_cutoff),
            ("synth.filterQ", self.synth.filter_q),
            ("synth.attack", self.synth.attack),
            ("synth.release", self.synth.release),
            ("synth.length", self.synth.length),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_clamps() {
        let r = Range::new(0.0, 0.9);
        assert_eq!(r.clamp(1.5), 0.9);
        assert_eq!(r.clamp(-1.0), 0.0);
        assert_eq!(r.clamp(0.4), 0.4);
        assert_eq!(r.clamp(f64::NAN), 0.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "sampleRate": 48000, "reverb": { "seed": 7 } }"#)
            .unwrap();
        assert_eq!(cfg.sample_rate, 48000.0);
        assert_eq!(cfg.reverb.seed, Some(7));
        assert_eq!(cfg.reverb.wet_level, 0.4);
        assert_eq!(cfg.echo.feedback.max, 0.9);
        assert_eq!(cfg.master_volume_max, 11.0);
    }

    #[test]
    fn invalid_sample_rate_rejected() {
        let cfg = EngineConfig::with_sample_rate(0.0);
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidSampleRate(_))));

        let cfg = EngineConfig::with_sample_rate(f64::NAN);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn mono_output_rejected() {
        let cfg = EngineConfig {
            channels: 1,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidChannelCount(1))));
    }

    #[test]
    fn volume_switch_gains() {
        let gains = EngineConfig::default().volume_gains;
        assert_eq!(gains.gain(VolumeLevel::Off), 0.0);
        assert_eq!(gains.gain(VolumeLevel::Low), 0.3);
        assert_eq!(gains.gain(VolumeLevel::High), 1.0);

        let cfg = EngineConfig::from_json(r#"{ "volumeGains": { "low": 0.5 } }"#).unwrap();
        assert_eq!(cfg.volume_gains.gain(VolumeLevel::Low), 0.5);
        assert_eq!(cfg.volume_gains.gain(VolumeLevel::High), 1.0);
    }

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::with_sample_rate(8000.0).validate().is_ok());
    }

    #[test]
    fn inverted_range_rejected() {
        let cfg = EngineConfig::from_json(r#"{ "pitch": { "min": 2.0, "max": 0.5 } }"#).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidRange { name: "pitch", .. })
        ));

        let cfg = EngineConfig::from_json(r#"{ "synth": { "release": { "min": 3.0, "max": 1.0 } } }"#)
            .unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidRange { name: "synth.release", .. })
        ));
    }

    #[test]
    fn zero_master_volume_max_rejected() {
        let cfg = EngineConfig::from_json(r#"{ "masterVolumeMax": 0.0 }"#).unwrap();
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidMasterVolumeMax(_))));

        let cfg = EngineConfig::from_json(r#"{ "masterVolumeMax": -11.0 }"#).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn echo_line_must_hold_longest_delay() {
        let cfg = EngineConfig::from_json(r#"{ "echo": { "maxDelaySeconds": 0.0 } }"#).unwrap();
        assert!(matches!(cfg.validate(), Err(EngineError::EchoLineTooShort { .. })));

        // 0.5 s cannot hold the 600 ms maximum delay.
        let cfg = EngineConfig::from_json(r#"{ "echo": { "maxDelaySeconds": 0.5 } }"#).unwrap();
        assert!(matches!(cfg.validate(), Err(EngineError::EchoLineTooShort { .. })));

        let cfg = EngineConfig::from_json(r#"{ "echo": { "maxDelaySeconds": 0.6 } }"#).unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(EngineError::Config(_))
        ));
    }
}
