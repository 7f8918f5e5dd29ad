//! Voices — transient sounding instances of a bank.
//!
//! A [`SampleVoice`] is one buffer playback routed through its own gain
//! stage into a bank. A [`SynthVoice`] is an oscillator, a low-pass filter
//! and an envelope gain. Neither owns any shared state; the engine decides
//! when each one is retired.

use std::sync::Arc;

use crate::bank::{BankId, note_frequency};

use super::automation::AudioParam;
use super::filter::LowpassFilter;
use super::oscillator::{Oscillator, Waveform};
use super::sampler::{BufferSource, SampleBuffer};

/// One playing instance of a sample buffer.
#[derive(Debug, Clone)]
pub struct SampleVoice {
    source: BufferSource,
    gain: AudioParam,
    bank: BankId,
    note: usize,
    looping: bool,
    start_time: f64,
}

impl SampleVoice {
    pub fn start(
        buffer: Arc<SampleBuffer>,
        bank: BankId,
        note: usize,
        playback_rate: f64,
        looping: bool,
        start_time: f64,
        output_rate: f64,
    ) -> Self {
        SampleVoice {
            source: BufferSource::new(buffer, playback_rate, looping, output_rate),
            gain: AudioParam::new(1.0),
            bank,
            note,
            looping,
            start_time,
        }
    }

    pub fn bank(&self) -> BankId {
        self.bank
    }

    pub fn note(&self) -> usize {
        self.note
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn playback_rate(&self) -> f64 {
        self.source.playback_rate()
    }

    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }

    pub fn gain_mut(&mut self) -> &mut AudioParam {
        &mut self.gain
    }

    /// True once a one-shot reached the end of its buffer (or was stopped).
    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }

    /// Next stereo frame after the voice gain stage.
    pub fn next_frame(&mut self, time: f64) -> (f32, f32) {
        let (l, r) = self.source.next_frame();
        let g = self.gain.advance(time) as f32;
        (l * g, r * g)
    }

    /// Halt the source and hand back the gain stage so a ring-out can
    /// continue through it.
    pub fn stop(mut self) -> AudioParam {
        self.source.stop();
        self.gain
    }
}

/// A one-shot tail played after a looping voice is released. It reuses the
/// released voice's gain stage so any fade already applied carries over.
#[derive(Debug, Clone)]
pub struct RingOut {
    source: BufferSource,
    gain: AudioParam,
    bank: BankId,
    note: usize,
}

impl RingOut {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        gain: AudioParam,
        bank: BankId,
        note: usize,
        playback_rate: f64,
        output_rate: f64,
    ) -> Self {
        RingOut {
            source: BufferSource::new(buffer, playback_rate, false, output_rate),
            gain,
            bank,
            note,
        }
    }

    pub fn bank(&self) -> BankId {
        self.bank
    }

    pub fn note(&self) -> usize {
        self.note
    }

    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }

    pub fn next_frame(&mut self, time: f64) -> (f32, f32) {
        let (l, r) = self.source.next_frame();
        let g = self.gain.advance(time) as f32;
        (l * g, r * g)
    }
}

/// Oscillator-bank parameters captured when a synth voice starts.
#[derive(Debug, Clone, Copy)]
pub struct SynthPatch {
    pub waveform: Waveform,
    pub filter_cutoff: f64,
    pub filter_q: f64,
    pub attack: f64,
    pub release: f64,
    /// Hold time before the automatic release, for one-shot voices.
    pub length: f64,
    pub looping: bool,
}

/// One playing oscillator: oscillator → low-pass → envelope gain.
#[derive(Debug, Clone)]
pub struct SynthVoice {
    oscillator: Oscillator,
    filter: LowpassFilter,
    envelope: AudioParam,
    note: usize,
    start_time: f64,
    /// Oscillator stops producing output at this time.
    stop_time: Option<f64>,
    /// The voice may be dropped after this time.
    cleanup_time: Option<f64>,
}

impl SynthVoice {
    /// Start a voice for `note` at `now`.
    ///
    /// The envelope ramps 0→1 over the attack. One-shot patches also
    /// schedule a hold until `now + length`, a release ramp to zero, the
    /// oscillator stop and the cleanup deadline.
    pub fn start(
        note: usize,
        patch: &SynthPatch,
        now: f64,
        stop_margin: f64,
        cleanup_margin: f64,
        sample_rate: f64,
    ) -> Self {
        let oscillator = Oscillator::new(patch.waveform, note_frequency(note), sample_rate);
        let filter = LowpassFilter::new(patch.filter_cutoff, patch.filter_q, sample_rate);

        let mut envelope = AudioParam::new(0.0);
        envelope.set_value_at_time(0.0, now);
        envelope.linear_ramp_to_value_at_time(1.0, now + patch.attack);

        let mut voice = SynthVoice {
            oscillator,
            filter,
            envelope,
            note,
            start_time: now,
            stop_time: None,
            cleanup_time: None,
        };

        if !patch.looping {
            let sustain_end = now + patch.length;
            voice.envelope.set_value_at_time(1.0, sustain_end);
            voice
                .envelope
                .linear_ramp_to_value_at_time(0.0, sustain_end + patch.release);
            voice.stop_time = Some(sustain_end + patch.release + stop_margin);
            voice.cleanup_time = Some(sustain_end + patch.release + cleanup_margin);
        }

        voice
    }

    /// Drive the envelope from its current level to zero over `release`
    /// seconds starting at `now`, then stop and schedule cleanup.
    pub fn release(&mut self, now: f64, release: f64, stop_margin: f64, cleanup_margin: f64) {
        let current = self.envelope.value_at(now);
        self.envelope.cancel_scheduled_values(now);
        self.envelope.set_value_at_time(current, now);
        self.envelope.linear_ramp_to_value_at_time(0.0, now + release);
        self.stop_time = Some(now + release + stop_margin);
        self.cleanup_time = Some(now + release + cleanup_margin);
    }

    pub fn note(&self) -> usize {
        self.note
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn frequency(&self) -> f64 {
        self.oscillator.frequency
    }

    pub fn waveform(&self) -> Waveform {
        self.oscillator.waveform
    }

    pub fn envelope(&self) -> &AudioParam {
        &self.envelope
    }

    pub fn filter(&self) -> &LowpassFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut LowpassFilter {
        &mut self.filter
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn cleanup_time(&self) -> Option<f64> {
        self.cleanup_time
    }

    /// Whether the cleanup deadline has passed at `time`.
    pub fn is_expired(&self, time: f64) -> bool {
        self.cleanup_time.is_some_and(|t| time >= t)
    }

    /// Next mono sample.
    pub fn next_sample(&mut self, time: f64) -> f64 {
        let env = self.envelope.advance(time);
        if self.stop_time.is_some_and(|t| time >= t) {
            return 0.0;
        }
        let osc = self.oscillator.next_sample();
        self.filter.process(osc) * env
    }
}
