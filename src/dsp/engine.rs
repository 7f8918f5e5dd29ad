//! Audio Engine — the live keyboard instrument.
//!
//! The engine owns every bank's parameters, all sounding voices, the two
//! send effects and the output clock. Control calls (notes and setters) only
//! touch small per-bank or per-voice state and schedule automation; all
//! sample-by-sample work happens in [`AudioEngine::render`].
//!
//! Signal flow per frame:
//!
//! ```text
//! sample voice ─ voice gain ─┐
//!                            ├─ bank gain ─┐
//! synth voice ─ filter ─ env ┴─ synth gain ┴─ master ─┬─ dry ────────┐
//!                                                     ├─ echo ───┐   ├─ out
//!                                                     └─ reverb ─┴ wet
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::bank::{BankId, NOTE_COUNT, SampleVariant, VolumeLevel};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::loader::{self, LoadEvent, SampleSource, SampleStore};
use crate::preset::{
    EchoSettings, EffectsSettings, Preset, ReverbSettings, SoundBankSettings, SoundBanks,
    SynthSettings,
};

use super::analyser::Analyser;
use super::context::{AudioContext, ContextState};
use super::echo::Echo;
use super::mixer::MasterBus;
use super::oscillator::Waveform;
use super::reverb::Reverb;
use super::voice::{RingOut, SampleVoice, SynthPatch, SynthVoice};

/// Live parameters of one sample bank.
#[derive(Debug, Clone, Copy)]
struct SampleBank {
    volume: VolumeLevel,
    pitch: f64,
    looping: bool,
}

impl SampleBank {
    fn new(volume: VolumeLevel) -> Self {
        SampleBank {
            volume,
            pitch: 1.0,
            looping: false,
        }
    }
}

fn patch_from_settings(s: &SynthSettings) -> SynthPatch {
    SynthPatch {
        waveform: s.waveform,
        filter_cutoff: s.filter_cutoff,
        filter_q: s.filter_q,
        attack: s.attack,
        release: s.release,
        length: s.length,
        looping: s.looping,
    }
}

/// The polyphonic instrument.
#[derive(Debug)]
pub struct AudioEngine {
    config: EngineConfig,
    context: AudioContext,
    samples: SampleStore,

    banks: [SampleBank; 4],
    synth_volume: VolumeLevel,
    synth: SynthPatch,
    master_gain: f64,

    /// Sample voices started by the latest unmatched note-on, per note.
    sample_voices: HashMap<usize, Vec<SampleVoice>>,
    /// One-shot tails of released looping voices.
    ring_outs: Vec<RingOut>,
    /// Synth voices per note: sustaining, or one-shots awaiting cleanup.
    synth_voices: HashMap<usize, Vec<SynthVoice>>,
    /// Synth voices released by `stop_note`, kept until their cleanup time.
    releasing_synth: Vec<SynthVoice>,

    echo: Echo,
    reverb: Reverb,
    bus: MasterBus,
    analyser: Analyser,
}

impl AudioEngine {
    /// Build the output graph with no samples loaded.
    ///
    /// Fails only when the configuration cannot drive an output device.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let sample_rate = config.sample_rate;
        let banks = BankId::ALL.map(|bank| {
            SampleBank::new(if bank == BankId::P1 {
                VolumeLevel::High
            } else {
                VolumeLevel::Off
            })
        });
        let defaults = SynthSettings::default();

        let engine = AudioEngine {
            context: AudioContext::new(sample_rate),
            samples: SampleStore::default(),
            banks,
            synth_volume: defaults.volume,
            synth: patch_from_settings(&defaults),
            master_gain: config.initial_master_gain,
            sample_voices: HashMap::new(),
            ring_outs: Vec::new(),
            synth_voices: HashMap::new(),
            releasing_synth: Vec::new(),
            echo: Echo::new(sample_rate, config.echo.clone()),
            reverb: Reverb::new(sample_rate, config.convolution_block, config.reverb.clone()),
            bus: MasterBus::new(config.dry_level, config.wet_level, config.soft_clip),
            analyser: Analyser::new(config.analyser_fft_size),
            config,
        };

        info!(sample_rate, "Audio engine created");
        Ok(engine)
    }

    /// Build the engine and load every sample from `source`.
    pub fn initialize<S, F>(config: EngineConfig, source: &S, observer: F) -> Result<Self, EngineError>
    where
        S: SampleSource + ?Sized,
        F: FnMut(LoadEvent),
    {
        let mut engine = Self::new(config)?;
        engine.load_samples(source, observer);
        Ok(engine)
    }

    /// Replace the sample store with a fresh load from `source`.
    pub fn load_samples<S, F>(&mut self, source: &S, observer: F)
    where
        S: SampleSource + ?Sized,
        F: FnMut(LoadEvent),
    {
        self.samples =
            loader::load_samples_with_crossfade(source, self.config.crossfade_seconds, observer);
    }

    /// Use an already loaded sample store.
    pub fn set_samples(&mut self, samples: SampleStore) {
        self.samples = samples;
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Notes ───────────────────────────────────────────────

    /// Start `note` on every audible bank, resuming the output if needed.
    ///
    /// A bank without a buffer for this note is skipped. Out-of-range notes
    /// and notes played after `dispose` are ignored.
    pub fn play_note(&mut self, note: usize) {
        if note >= NOTE_COUNT {
            debug!(note, "Ignoring out-of-range note");
            return;
        }
        if self.context.state() == ContextState::Closed {
            debug!(note, "Ignoring note on a disposed engine");
            return;
        }
        self.context.resume();

        let now = self.context.current_time();
        let sample_rate = self.context.sample_rate();

        for bank in BankId::ALL {
            let state = self.banks[bank.index()];
            if self.config.volume_gains.gain(state.volume) == 0.0 {
                continue;
            }

            let loop_buffer = if state.looping {
                self.samples.get(bank, note, SampleVariant::Loop)
            } else {
                None
            };
            let (buffer, looping) = match loop_buffer {
                Some(buffer) => (Arc::clone(buffer), true),
                None => match self.samples.get(bank, note, SampleVariant::OneShot) {
                    Some(buffer) => (Arc::clone(buffer), false),
                    None => {
                        debug!(%bank, note, "No sample, skipping bank");
                        continue;
                    }
                },
            };

            let voice = SampleVoice::start(buffer, bank, note, state.pitch, looping, now, sample_rate);
            self.sample_voices.entry(note).or_default().push(voice);
        }

        if self.config.volume_gains.gain(self.synth_volume) > 0.0 {
            let voice = SynthVoice::start(
                note,
                &self.synth,
                now,
                self.config.synth.stop_margin,
                self.config.synth.cleanup_margin,
                sample_rate,
            );
            self.synth_voices.entry(note).or_default().push(voice);
        }
    }

    /// Release every voice started for `note`.
    ///
    /// Sample voices stop at once; looping ones hand their gain stage to a
    /// one-shot ring-out. Synth voices ramp from their current level to zero
    /// over the release time and are dropped after it. A note with no
    /// voices is a no-op.
    pub fn stop_note(&mut self, note: usize) {
        let sample_rate = self.context.sample_rate();

        if let Some(voices) = self.sample_voices.remove(&note) {
            for voice in voices {
                let bank = voice.bank();
                let looping = voice.is_looping();
                let gain = voice.stop();
                if !looping {
                    continue;
                }
                match self.samples.get(bank, note, SampleVariant::OneShot) {
                    Some(buffer) => {
                        let pitch = self.banks[bank.index()].pitch;
                        self.ring_outs.push(RingOut::new(
                            Arc::clone(buffer),
                            gain,
                            bank,
                            note,
                            pitch,
                            sample_rate,
                        ));
                    }
                    None => trace!(%bank, note, "No ring-out sample"),
                }
            }
        }

        if let Some(voices) = self.synth_voices.remove(&note) {
            let now = self.context.current_time();
            for mut voice in voices {
                voice.release(
                    now,
                    self.synth.release,
                    self.config.synth.stop_margin,
                    self.config.synth.cleanup_margin,
                );
                self.releasing_synth.push(voice);
            }
        }
    }

    // ── Master and sample banks ─────────────────────────────

    /// Set the master volume on the 0..=11 dial.
    pub fn set_master_volume(&mut self, level: f64) {
        let max = self.config.master_volume_max;
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, max) };
        self.master_gain = level / max;
    }

    pub fn master_gain(&self) -> f64 {
        self.master_gain
    }

    /// Applies to the shared bank gain, so sounding voices follow at once.
    pub fn set_sound_bank_volume(&mut self, bank: BankId, volume: VolumeLevel) {
        self.banks[bank.index()].volume = volume;
    }

    pub fn sound_bank_volume(&self, bank: BankId) -> VolumeLevel {
        self.banks[bank.index()].volume
    }

    /// Playback rate for voices started from now on. Clamped to the
    /// configured pitch range.
    pub fn set_sound_bank_pitch(&mut self, bank: BankId, pitch: f64) {
        self.banks[bank.index()].pitch = self.config.pitch.clamp(pitch);
    }

    pub fn sound_bank_pitch(&self, bank: BankId) -> f64 {
        self.banks[bank.index()].pitch
    }

    pub fn set_sound_bank_loop(&mut self, bank: BankId, looping: bool) {
        self.banks[bank.index()].looping = looping;
    }

    pub fn sound_bank_loop(&self, bank: BankId) -> bool {
        self.banks[bank.index()].looping
    }

    // ── Synth bank ──────────────────────────────────────────

    pub fn set_synth_bank_volume(&mut self, volume: VolumeLevel) {
        self.synth_volume = volume;
    }

    pub fn synth_bank_volume(&self) -> VolumeLevel {
        self.synth_volume
    }

    pub fn set_synth_bank_loop(&mut self, looping: bool) {
        self.synth.looping = looping;
    }

    pub fn set_synth_bank_waveform(&mut self, waveform: Waveform) {
        self.synth.waveform = waveform;
    }

    /// Also retunes the filter of every sounding synth voice.
    pub fn set_synth_bank_filter_cutoff(&mut self, cutoff: f64) {
        let cutoff = self.config.synth.filter_cutoff.clamp(cutoff);
        self.synth.filter_cutoff = cutoff;
        for voice in self.live_synth_voices_mut() {
            voice.filter_mut().set_frequency(cutoff);
        }
    }

    /// Also applies to every sounding synth voice.
    pub fn set_synth_bank_filter_resonance(&mut self, q: f64) {
        let q = self.config.synth.filter_q.clamp(q);
        self.synth.filter_q = q;
        for voice in self.live_synth_voices_mut() {
            voice.filter_mut().set_q(q);
        }
    }

    pub fn set_synth_bank_attack(&mut self, attack: f64) {
        self.synth.attack = self.config.synth.attack.clamp(attack);
    }

    pub fn set_synth_bank_release(&mut self, release: f64) {
        self.synth.release = self.config.synth.release.clamp(release);
    }

    /// Hold time of one-shot synth notes.
    pub fn set_synth_bank_length(&mut self, length: f64) {
        self.synth.length = self.config.synth.length.clamp(length);
    }

    /// Current oscillator bank parameters.
    pub fn synth_patch(&self) -> &SynthPatch {
        &self.synth
    }

    fn live_synth_voices_mut(&mut self) -> impl Iterator<Item = &mut SynthVoice> {
        self.synth_voices
            .values_mut()
            .flat_map(|voices| voices.iter_mut())
            .chain(self.releasing_synth.iter_mut())
    }

    // ── Effects ─────────────────────────────────────────────

    pub fn set_echo_enabled(&mut self, enabled: bool) {
        self.echo.set_enabled(enabled);
    }

    pub fn set_echo_delay(&mut self, delay_ms: f64) {
        self.echo.set_delay_ms(delay_ms);
    }

    pub fn set_echo_feedback(&mut self, feedback: f64) {
        self.echo.set_feedback(feedback);
    }

    pub fn set_reverb_enabled(&mut self, enabled: bool) {
        self.reverb.set_enabled(enabled);
    }

    /// Clamp the parameters and regenerate the impulse response.
    pub fn set_reverb_params(&mut self, decay: f64, density: f64, gain: f64) {
        self.reverb.set_params(decay, density, gain);
    }

    // ── Presets ─────────────────────────────────────────────

    /// Push every value of `preset` through the setters.
    pub fn apply_preset(&mut self, preset: &Preset) {
        for bank in BankId::ALL {
            let s = preset.sound_banks.get(bank);
            self.set_sound_bank_volume(bank, s.volume);
            self.set_sound_bank_loop(bank, s.looping);
            self.set_sound_bank_pitch(bank, s.pitch);
        }

        let synth = &preset.synth_bank;
        self.set_synth_bank_volume(synth.volume);
        self.set_synth_bank_loop(synth.looping);
        self.set_synth_bank_waveform(synth.waveform);
        self.set_synth_bank_filter_cutoff(synth.filter_cutoff);
        self.set_synth_bank_filter_resonance(synth.filter_q);
        self.set_synth_bank_attack(synth.attack);
        self.set_synth_bank_release(synth.release);
        self.set_synth_bank_length(synth.length);

        let echo = &preset.effects.echo;
        self.set_echo_enabled(echo.enabled);
        self.set_echo_delay(echo.delay);
        self.set_echo_feedback(echo.feedback);

        let reverb = &preset.effects.reverb;
        self.set_reverb_enabled(reverb.enabled);
        self.set_reverb_params(reverb.decay_time, reverb.density, reverb.gain);

        info!(preset = %preset.name, "Preset applied");
    }

    /// Snapshot the current controls as a preset.
    pub fn current_settings(&self, name: &str) -> Preset {
        let mut sound_banks = SoundBanks::default();
        for bank in BankId::ALL {
            let b = &self.banks[bank.index()];
            *sound_banks.get_mut(bank) = SoundBankSettings::new(b.volume, b.looping, b.pitch);
        }
        let reverb = self.reverb.params();

        Preset {
            name: name.to_string(),
            sound_banks,
            synth_bank: SynthSettings {
                volume: self.synth_volume,
                looping: self.synth.looping,
                waveform: self.synth.waveform,
                filter_cutoff: self.synth.filter_cutoff,
                filter_q: self.synth.filter_q,
                attack: self.synth.attack,
                release: self.synth.release,
                length: self.synth.length,
            },
            effects: EffectsSettings {
                echo: EchoSettings {
                    enabled: self.echo.is_enabled(),
                    delay: self.echo.delay_ms(),
                    feedback: self.echo.feedback(),
                },
                reverb: ReverbSettings {
                    enabled: self.reverb.is_enabled(),
                    decay_time: reverb.decay,
                    density: reverb.density,
                    gain: reverb.gain,
                },
            },
        }
    }

    // ── Rendering ───────────────────────────────────────────

    /// Render the next block of stereo output.
    ///
    /// Renders `min(left.len(), right.len())` frames; any excess in the
    /// longer slice is zeroed. While the output is suspended or disposed
    /// the block is silent and the clock does not move.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if !self.context.is_running() {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }
        left[frames..].fill(0.0);
        right[frames..].fill(0.0);

        let gains = self.config.volume_gains;
        let bank_gains = self.banks.map(|b| gains.gain(b.volume) as f32);
        let synth_gain = gains.gain(self.synth_volume);
        let master = self.master_gain as f32;

        for (out_l, out_r) in left.iter_mut().zip(right.iter_mut()) {
            let time = self.context.current_time();

            let mut bank_sums = [(0.0_f32, 0.0_f32); 4];
            for voice in self.sample_voices.values_mut().flatten() {
                let (l, r) = voice.next_frame(time);
                let sum = &mut bank_sums[voice.bank().index()];
                sum.0 += l;
                sum.1 += r;
            }
            for tail in &mut self.ring_outs {
                let (l, r) = tail.next_frame(time);
                let sum = &mut bank_sums[tail.bank().index()];
                sum.0 += l;
                sum.1 += r;
            }

            let mut synth = 0.0;
            for voice in self.synth_voices.values_mut().flatten() {
                synth += voice.next_sample(time);
            }
            for voice in &mut self.releasing_synth {
                synth += voice.next_sample(time);
            }

            let synth = (synth * synth_gain) as f32;
            let (mut dry_l, mut dry_r) = (synth, synth);
            for (sum, gain) in bank_sums.iter().zip(bank_gains) {
                dry_l += sum.0 * gain;
                dry_r += sum.1 * gain;
            }
            dry_l *= master;
            dry_r *= master;

            let echo = self.echo.process(dry_l, dry_r);
            let reverb = self.reverb.process(dry_l, dry_r);
            let (l, r) = self.bus.mix((dry_l, dry_r), echo, reverb);

            *out_l = l;
            *out_r = r;
            self.analyser.push(0.5 * (l + r));
            self.context.tick();
        }

        self.retire_voices();
    }

    /// Drop voices whose playback ended or whose cleanup time passed.
    fn retire_voices(&mut self) {
        let now = self.context.current_time();

        self.sample_voices.retain(|&note, voices| {
            voices.retain(|v| {
                if v.is_finished() {
                    trace!(bank = %v.bank(), note, "Sample voice finished");
                    false
                } else {
                    true
                }
            });
            !voices.is_empty()
        });
        self.ring_outs.retain(|tail| !tail.is_finished());

        self.synth_voices.retain(|&note, voices| {
            voices.retain(|v| {
                if v.is_expired(now) {
                    trace!(note, "Synth voice expired");
                    false
                } else {
                    true
                }
            });
            !voices.is_empty()
        });
        self.releasing_synth.retain(|v| !v.is_expired(now));
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Pause the output clock. Notes resume it.
    pub fn suspend(&mut self) {
        self.context.suspend();
    }

    pub fn resume(&mut self) {
        self.context.resume();
    }

    /// Stop every voice and close the output. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        let voices = self.active_voice_count();
        for voice in self.sample_voices.drain().flat_map(|(_, v)| v) {
            voice.stop();
        }
        self.ring_outs.clear();
        self.synth_voices.clear();
        self.releasing_synth.clear();
        self.echo.clear();

        if self.context.state() != ContextState::Closed {
            self.context.close();
            info!(voices, "Audio engine disposed");
        }
    }

    // ── Inspection ──────────────────────────────────────────

    /// Sample voices registered under `note`.
    pub fn sample_voices(&self, note: usize) -> &[SampleVoice] {
        self.sample_voices.get(&note).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Synth voices registered under `note` (not yet released).
    pub fn synth_voices(&self, note: usize) -> &[SynthVoice] {
        self.synth_voices.get(&note).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn releasing_synth_voices(&self) -> &[SynthVoice] {
        &self.releasing_synth
    }

    pub fn ring_outs(&self) -> &[RingOut] {
        &self.ring_outs
    }

    /// Every voice still producing (or about to produce) sound.
    pub fn active_voice_count(&self) -> usize {
        self.sample_voices.values().map(Vec::len).sum::<usize>()
            + self.ring_outs.len()
            + self.synth_voices.values().map(Vec::len).sum::<usize>()
            + self.releasing_synth.len()
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    pub fn echo(&self) -> &Echo {
        &self.echo
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::SampleKey;
    use crate::dsp::sampler::SampleBuffer;
    use crate::loader::MemorySource;
    use crate::preset::find_builtin;

    const SR: f64 = 8000.0;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::with_sample_rate(SR);
        config.reverb.seed = Some(1);
        config
    }

    fn tone(len: usize) -> SampleBuffer {
        let data = (0..len).map(|i| if i % 8 < 4 { 0.5 } else { -0.5 }).collect();
        SampleBuffer::mono(data, SR as u32)
    }

    fn engine_with(keys: &[(BankId, usize, SampleVariant, usize)]) -> AudioEngine {
        let mut source = MemorySource::new();
        for &(bank, note, variant, len) in keys {
            source.insert(SampleKey::new(bank, note, variant), tone(len));
        }
        AudioEngine::initialize(config(), &source, |_| {}).unwrap()
    }

    fn render_seconds(engine: &mut AudioEngine, seconds: f64) -> Vec<f32> {
        let frames = (seconds * SR) as usize;
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        for (l, r) in left.chunks_mut(128).zip(right.chunks_mut(128)) {
            engine.render(l, r);
        }
        left
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0_f32, |m, &s| m.max(s.abs()))
    }

    #[test]
    fn invalid_config_is_fatal() {
        let err = AudioEngine::new(EngineConfig::with_sample_rate(-1.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSampleRate(_)));
    }

    #[test]
    fn defaults() {
        let e = AudioEngine::new(config()).unwrap();
        assert_eq!(e.master_gain(), 0.5);
        assert_eq!(e.sound_bank_volume(BankId::P1), VolumeLevel::High);
        assert_eq!(e.sound_bank_volume(BankId::W2), VolumeLevel::Off);
        assert_eq!(e.synth_bank_volume(), VolumeLevel::Off);
        assert!(e.synth_patch().looping);
        assert_eq!(e.synth_patch().waveform, Waveform::Sawtooth);
        assert_eq!(e.context().state(), ContextState::Suspended);
        assert!(!e.echo().is_enabled());
        assert!(!e.reverb().is_enabled());
    }

    #[test]
    fn play_note_resumes_and_starts_bank_voice() {
        let mut e = engine_with(&[(BankId::P1, 5, SampleVariant::OneShot, 4000)]);
        e.set_sound_bank_pitch(BankId::P1, 1.5);
        e.play_note(5);
        assert!(e.context().is_running());

        let voices = e.sample_voices(5);
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].bank(), BankId::P1);
        assert_eq!(voices[0].playback_rate(), 1.5);
        assert!(!voices[0].is_looping());
    }

    #[test]
    fn silent_and_missing_banks_are_skipped() {
        let mut e = engine_with(&[
            (BankId::P1, 0, SampleVariant::OneShot, 100),
            (BankId::W1, 0, SampleVariant::OneShot, 100),
        ]);
        e.set_sound_bank_volume(BankId::P2, VolumeLevel::High);
        e.play_note(0);
        // W1 is off; P2 has no buffer.
        assert_eq!(e.sample_voices(0).len(), 1);

        e.play_note(1);
        assert!(e.sample_voices(1).is_empty());
    }

    #[test]
    fn out_of_range_note_is_ignored() {
        let mut e = engine_with(&[]);
        e.set_synth_bank_volume(VolumeLevel::High);
        e.play_note(NOTE_COUNT);
        e.stop_note(NOTE_COUNT + 10);
        assert_eq!(e.active_voice_count(), 0);
        assert_eq!(e.context().state(), ContextState::Suspended);
    }

    #[test]
    fn loop_flag_picks_loop_buffer_with_fallback() {
        let mut e = engine_with(&[
            (BankId::P1, 2, SampleVariant::OneShot, 100),
            (BankId::P1, 2, SampleVariant::Loop, 3000),
            (BankId::P1, 3, SampleVariant::OneShot, 100),
        ]);
        e.set_sound_bank_loop(BankId::P1, true);
        e.play_note(2);
        e.play_note(3);
        assert!(e.sample_voices(2)[0].is_looping());
        assert!(!e.sample_voices(3)[0].is_looping());
    }

    #[test]
    fn one_shot_voices_retire_naturally() {
        let mut e = engine_with(&[(BankId::P1, 4, SampleVariant::OneShot, 400)]);
        e.play_note(4);
        render_seconds(&mut e, 0.04);
        assert_eq!(e.sample_voices(4).len(), 1);
        render_seconds(&mut e, 0.04);
        assert!(e.sample_voices(4).is_empty());
        assert_eq!(e.active_voice_count(), 0);
    }

    #[test]
    fn stop_note_rings_out_looping_voice_at_current_pitch() {
        let mut e = engine_with(&[
            (BankId::W1, 7, SampleVariant::OneShot, 800),
            (BankId::W1, 7, SampleVariant::Loop, 800),
        ]);
        e.set_sound_bank_volume(BankId::P1, VolumeLevel::Off);
        e.set_sound_bank_volume(BankId::W1, VolumeLevel::Low);
        e.set_sound_bank_loop(BankId::W1, true);
        e.play_note(7);
        render_seconds(&mut e, 0.5);
        // The loop outlives its buffer.
        assert_eq!(e.sample_voices(7).len(), 1);

        e.set_sound_bank_pitch(BankId::W1, 2.0);
        e.stop_note(7);
        assert!(e.sample_voices(7).is_empty());
        assert_eq!(e.ring_outs().len(), 1);
        assert_eq!(e.ring_outs()[0].bank(), BankId::W1);

        // 800 frames at double speed: gone within 0.06 s.
        render_seconds(&mut e, 0.06);
        assert!(e.ring_outs().is_empty());
    }

    #[test]
    fn looping_voice_without_one_shot_stops_dead() {
        let mut e = engine_with(&[(BankId::P1, 1, SampleVariant::Loop, 900)]);
        e.set_sound_bank_loop(BankId::P1, true);
        e.play_note(1);
        e.stop_note(1);
        assert!(e.ring_outs().is_empty());
        assert_eq!(e.active_voice_count(), 0);
    }

    #[test]
    fn stop_note_is_idempotent() {
        let mut e = engine_with(&[(BankId::P1, 0, SampleVariant::OneShot, 100)]);
        e.stop_note(0);
        e.play_note(0);
        e.stop_note(0);
        e.stop_note(0);
        assert!(e.sample_voices(0).is_empty());
    }

    #[test]
    fn pitch_change_only_affects_new_voices() {
        let mut e = engine_with(&[(BankId::P1, 0, SampleVariant::OneShot, 8000)]);
        e.play_note(0);
        e.set_sound_bank_pitch(BankId::P1, 0.5);
        e.play_note(0);
        let rates: Vec<f64> = e.sample_voices(0).iter().map(|v| v.playback_rate()).collect();
        assert_eq!(rates, [1.0, 0.5]);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut e = engine_with(&[]);
        e.set_sound_bank_pitch(BankId::P2, 8.0);
        assert_eq!(e.sound_bank_pitch(BankId::P2), 2.0);
        e.set_sound_bank_pitch(BankId::P2, 0.1);
        assert_eq!(e.sound_bank_pitch(BankId::P2), 0.5);
    }

    #[test]
    fn master_volume_maps_to_gain() {
        let mut e = engine_with(&[]);
        e.set_master_volume(11.0);
        assert_eq!(e.master_gain(), 1.0);
        e.set_master_volume(0.0);
        assert_eq!(e.master_gain(), 0.0);
        e.set_master_volume(5.5);
        assert!((e.master_gain() - 0.5).abs() < 1e-12);
        e.set_master_volume(40.0);
        assert_eq!(e.master_gain(), 1.0);
    }

    #[test]
    fn synth_release_moves_voice_out_of_note_collection() {
        let mut e = engine_with(&[]);
        e.set_synth_bank_volume(VolumeLevel::High);
        e.set_synth_bank_release(0.2);
        e.play_note(0);
        assert_eq!(e.synth_voices(0).len(), 1);
        render_seconds(&mut e, 0.1);

        e.stop_note(0);
        assert!(e.synth_voices(0).is_empty());
        assert_eq!(e.releasing_synth_voices().len(), 1);

        // Cleanup at release + 0.1 s.
        render_seconds(&mut e, 0.25);
        assert_eq!(e.releasing_synth_voices().len(), 1);
        render_seconds(&mut e, 0.1);
        assert!(e.releasing_synth_voices().is_empty());
    }

    #[test]
    fn one_shot_synth_voice_cleans_itself_up() {
        let mut e = engine_with(&[]);
        e.set_sound_bank_volume(BankId::P1, VolumeLevel::Off);
        e.set_synth_bank_volume(VolumeLevel::Low);
        e.set_synth_bank_loop(false);
        e.set_synth_bank_length(0.5);
        e.set_synth_bank_release(0.1);
        e.play_note(12);

        let audio = render_seconds(&mut e, 0.4);
        assert!(peak(&audio) > 0.01);
        assert_eq!(e.synth_voices(12).len(), 1);

        // length 0.5 + release 0.1 + cleanup 0.1
        render_seconds(&mut e, 0.35);
        assert!(e.synth_voices(12).is_empty());
    }

    #[test]
    fn filter_changes_reach_sounding_voices() {
        let mut e = engine_with(&[]);
        e.set_synth_bank_volume(VolumeLevel::High);
        e.play_note(0);
        e.play_note(1);
        e.stop_note(1);

        e.set_synth_bank_filter_cutoff(900.0);
        e.set_synth_bank_filter_resonance(4.0);
        assert_eq!(e.synth_voices(0)[0].filter().frequency(), 900.0);
        assert_eq!(e.releasing_synth_voices()[0].filter().frequency(), 900.0);
        assert_eq!(e.synth_voices(0)[0].filter().q(), 4.0);

        e.set_synth_bank_filter_cutoff(50_000.0);
        assert_eq!(e.synth_patch().filter_cutoff, 8000.0);
    }

    #[test]
    fn suspended_engine_renders_silence_without_moving_clock() {
        let mut e = engine_with(&[(BankId::P1, 0, SampleVariant::OneShot, 4000)]);
        e.play_note(0);
        render_seconds(&mut e, 0.05);
        let frame = e.context().current_frame();
        assert_eq!(frame, 400);

        e.suspend();
        let audio = render_seconds(&mut e, 0.05);
        assert_eq!(peak(&audio), 0.0);
        assert_eq!(e.context().current_frame(), frame);
    }

    #[test]
    fn bank_volume_scales_output_live() {
        let mut e = engine_with(&[(BankId::P1, 0, SampleVariant::OneShot, 8000)]);
        e.set_master_volume(11.0);
        e.play_note(0);
        let loud = peak(&render_seconds(&mut e, 0.05));
        e.set_sound_bank_volume(BankId::P1, VolumeLevel::Off);
        let silent = peak(&render_seconds(&mut e, 0.05));
        assert!(loud > 0.3, "loud={loud}");
        assert_eq!(silent, 0.0);
        // The voice is still registered, just muted.
        assert_eq!(e.sample_voices(0).len(), 1);
    }

    #[test]
    fn analyser_sees_output() {
        let mut e = engine_with(&[(BankId::P1, 0, SampleVariant::OneShot, 8000)]);
        e.play_note(0);
        render_seconds(&mut e, 0.3);
        let mut bytes = vec![0_u8; 256];
        e.analyser().byte_time_domain_data(&mut bytes);
        assert!(bytes.iter().any(|&b| b != 128));
    }

    #[test]
    fn dispose_is_final_and_repeatable() {
        let mut e = engine_with(&[(BankId::P1, 0, SampleVariant::OneShot, 4000)]);
        e.set_synth_bank_volume(VolumeLevel::High);
        e.play_note(0);
        e.play_note(1);
        e.stop_note(1);
        e.dispose();
        assert_eq!(e.active_voice_count(), 0);
        assert_eq!(e.context().state(), ContextState::Closed);

        e.dispose();
        e.play_note(0);
        assert_eq!(e.active_voice_count(), 0);
        let audio = render_seconds(&mut e, 0.01);
        assert_eq!(peak(&audio), 0.0);
    }

    #[test]
    fn preset_values_go_through_clamping_setters() {
        let mut e = engine_with(&[]);
        let preset = find_builtin("All You Need Is Kill").unwrap();
        e.apply_preset(&preset);

        assert_eq!(e.sound_bank_volume(BankId::P1), VolumeLevel::Low);
        assert_eq!(e.sound_bank_pitch(BankId::P1), 2.0);
        assert_eq!(e.sound_bank_volume(BankId::W2), VolumeLevel::High);
        assert_eq!(e.synth_patch().waveform, Waveform::Sine);
        assert!(!e.synth_patch().looping);
        assert!(e.echo().is_enabled());
        assert_eq!(e.echo().delay_ms(), 150.0);
        assert_eq!(e.echo().feedback(), 0.8);
        assert!(!e.reverb().is_enabled());
    }

    #[test]
    fn current_settings_reflect_applied_preset() {
        let mut e = engine_with(&[]);
        let preset = find_builtin("Happy Accident").unwrap();
        e.apply_preset(&preset);
        assert_eq!(e.current_settings("Happy Accident"), preset);
    }
}
