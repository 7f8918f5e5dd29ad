pub mod bank;
#[cfg(feature = "catalog")]
pub mod catalog;
pub mod config;
pub mod dsp;
pub mod error;
pub mod loader;
pub mod preset;

use std::fmt::Display;

use wasm_bindgen::prelude::*;

use crate::bank::{BankId, SampleKey, SampleVariant, VolumeLevel};
use crate::config::EngineConfig;
use crate::dsp::engine::AudioEngine;
use crate::dsp::oscillator::Waveform;
use crate::dsp::sampler::SampleBuffer;
use crate::error::EngineError;
use crate::loader::MemorySource;
use crate::preset::{Preset, builtin_presets};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the bitsynth-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_err(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Decode interleaved samples handed over from JS.
fn staged_buffer(samples: &[f32], channels: usize, sample_rate: u32) -> Result<SampleBuffer, EngineError> {
    if sample_rate == 0 {
        return Err(EngineError::InvalidSampleRate(0.0));
    }
    Ok(SampleBuffer::from_interleaved_f32(samples, channels.max(1), sample_rate))
}

/// WASM-exposed instrument. The page owns one of these and drives it from
/// its input handlers and an AudioWorklet.
#[wasm_bindgen]
pub struct WebSynth {
    engine: AudioEngine,
    pending: MemorySource,
}

#[wasm_bindgen]
impl WebSynth {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64) -> Result<WebSynth, JsValue> {
        let engine = AudioEngine::new(EngineConfig::with_sample_rate(sample_rate)).map_err(js_err)?;
        Ok(WebSynth {
            engine,
            pending: MemorySource::new(),
        })
    }

    /// Stage a decoded sample for the next `initialize`.
    pub fn add_sample(
        &mut self,
        bank: &str,
        note: usize,
        looping: bool,
        samples: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<(), JsValue> {
        let bank: BankId = bank.parse().map_err(js_err)?;
        let variant = if looping {
            SampleVariant::Loop
        } else {
            SampleVariant::OneShot
        };
        let buffer = staged_buffer(samples, channels, sample_rate).map_err(js_err)?;
        self.pending.insert(SampleKey::new(bank, note, variant), buffer);
        Ok(())
    }

    /// Load every staged sample. Returns the number of buffers in use.
    pub fn initialize(&mut self) -> usize {
        let source = std::mem::take(&mut self.pending);
        self.engine.load_samples(&source, |_| {});
        self.engine.samples().len()
    }

    pub fn play_note(&mut self, note: usize) {
        self.engine.play_note(note);
    }

    pub fn stop_note(&mut self, note: usize) {
        self.engine.stop_note(note);
    }

    pub fn set_master_volume(&mut self, level: f64) {
        self.engine.set_master_volume(level);
    }

    pub fn set_sound_bank_volume(&mut self, bank: &str, level: &str) -> Result<(), JsValue> {
        let bank: BankId = bank.parse().map_err(js_err)?;
        let level: VolumeLevel = level.parse().map_err(js_err)?;
        self.engine.set_sound_bank_volume(bank, level);
        Ok(())
    }

    pub fn set_sound_bank_pitch(&mut self, bank: &str, pitch: f64) -> Result<(), JsValue> {
        let bank: BankId = bank.parse().map_err(js_err)?;
        self.engine.set_sound_bank_pitch(bank, pitch);
        Ok(())
    }

    pub fn set_sound_bank_loop(&mut self, bank: &str, looping: bool) -> Result<(), JsValue> {
        let bank: BankId = bank.parse().map_err(js_err)?;
        self.engine.set_sound_bank_loop(bank, looping);
        Ok(())
    }

    pub fn set_synth_bank_volume(&mut self, level: &str) -> Result<(), JsValue> {
        self.engine
            .set_synth_bank_volume(level.parse().map_err(js_err)?);
        Ok(())
    }

    pub fn set_synth_bank_loop(&mut self, looping: bool) {
        self.engine.set_synth_bank_loop(looping);
    }

    pub fn set_synth_bank_waveform(&mut self, waveform: &str) -> Result<(), JsValue> {
        let waveform: Waveform = waveform.parse().map_err(js_err)?;
        self.engine.set_synth_bank_waveform(waveform);
        Ok(())
    }

    pub fn set_synth_bank_filter_cutoff(&mut self, cutoff: f64) {
        self.engine.set_synth_bank_filter_cutoff(cutoff);
    }

    pub fn set_synth_bank_filter_resonance(&mut self, q: f64) {
        self.engine.set_synth_bank_filter_resonance(q);
    }

    pub fn set_synth_bank_attack(&mut self, attack: f64) {
        self.engine.set_synth_bank_attack(attack);
    }

    pub fn set_synth_bank_release(&mut self, release: f64) {
        self.engine.set_synth_bank_release(release);
    }

    pub fn set_synth_bank_length(&mut self, length: f64) {
        self.engine.set_synth_bank_length(length);
    }

    pub fn set_echo_enabled(&mut self, enabled: bool) {
        self.engine.set_echo_enabled(enabled);
    }

    pub fn set_echo_delay(&mut self, delay_ms: f64) {
        self.engine.set_echo_delay(delay_ms);
    }

    pub fn set_echo_feedback(&mut self, feedback: f64) {
        self.engine.set_echo_feedback(feedback);
    }

    pub fn set_reverb_enabled(&mut self, enabled: bool) {
        self.engine.set_reverb_enabled(enabled);
    }

    pub fn set_reverb_params(&mut self, decay: f64, density: f64, gain: f64) {
        self.engine.set_reverb_params(decay, density, gain);
    }

    /// Apply a factory preset by menu position.
    pub fn apply_preset(&mut self, index: usize) -> Result<(), JsValue> {
        let preset = builtin_presets()
            .into_iter()
            .nth(index)
            .ok_or_else(|| js_err(format!("No preset at index {index}")))?;
        self.engine.apply_preset(&preset);
        Ok(())
    }

    /// Apply a preset saved as JSON.
    pub fn apply_preset_json(&mut self, json: &str) -> Result<(), JsValue> {
        let preset = Preset::from_json(json).map_err(js_err)?;
        self.engine.apply_preset(&preset);
        Ok(())
    }

    pub fn preset_names(&self) -> Result<JsValue, JsValue> {
        let names: Vec<String> = builtin_presets().into_iter().map(|p| p.name).collect();
        serde_wasm_bindgen::to_value(&names).map_err(js_err)
    }

    /// Current controls as a preset object.
    pub fn current_settings(&self, name: &str) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.engine.current_settings(name)).map_err(js_err)
    }

    /// Render one AudioWorklet quantum.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.engine.render(left, right);
    }

    /// Oscilloscope data: the latest `fft_size` samples as bytes.
    pub fn time_domain_data(&self) -> Vec<u8> {
        let mut out = vec![0; self.engine.analyser().fft_size()];
        self.engine.analyser().byte_time_domain_data(&mut out);
        out
    }

    /// Spectrum in dB.
    pub fn frequency_data(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.engine.analyser().frequency_bin_count()];
        self.engine.analyser().frequency_data(&mut out);
        out
    }

    pub fn active_voice_count(&self) -> usize {
        self.engine.active_voice_count()
    }

    pub fn dispose(&mut self) {
        self.engine.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_samples_play() {
        let mut synth = WebSynth::new(8000.0).unwrap();
        let stereo: Vec<f32> = (0..800).flat_map(|i| [(i % 7) as f32 * 0.1, 0.0]).collect();
        synth.add_sample("P1", 3, false, &stereo, 2, 8000).unwrap();
        synth.add_sample("p1", 3, true, &stereo, 2, 8000).unwrap();
        assert_eq!(synth.initialize(), 2);

        synth.play_note(3);
        assert_eq!(synth.active_voice_count(), 1);

        let mut left = [0.0_f32; 128];
        let mut right = [0.0_f32; 128];
        synth.process(&mut left, &mut right);
        assert!(left.iter().any(|&s| s != 0.0));
        assert!(right.iter().all(|&s| s == 0.0));
        assert_eq!(synth.time_domain_data().len(), 2048);

        synth.stop_note(3);
        synth.dispose();
        assert_eq!(synth.active_voice_count(), 0);
    }

    #[test]
    fn zero_rate_sample_rejected() {
        assert!(matches!(
            staged_buffer(&[0.5; 10], 1, 0),
            Err(EngineError::InvalidSampleRate(_))
        ));
        let buffer = staged_buffer(&[0.5; 10], 2, 8000).unwrap();
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn presets_by_index() {
        let mut synth = WebSynth::new(8000.0).unwrap();
        synth.apply_preset(8).unwrap();
        assert_eq!(synth.engine.synth_bank_volume(), VolumeLevel::High);
        assert!(synth.engine.reverb().is_enabled());
    }
}
