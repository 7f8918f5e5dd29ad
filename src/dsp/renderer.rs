//! Offline renderer — plays a timed performance through an engine and
//! exports it as WAV.

use serde::{Deserialize, Serialize};

use super::engine::AudioEngine;

/// What happens at a performance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "note", rename_all = "camelCase")]
pub enum PerformanceAction {
    NoteOn(usize),
    NoteOff(usize),
}

/// A key press or release at `time` seconds from the start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEvent {
    pub time: f64,
    pub action: PerformanceAction,
}

impl PerformanceEvent {
    pub fn note_on(time: f64, note: usize) -> Self {
        PerformanceEvent {
            time,
            action: PerformanceAction::NoteOn(note),
        }
    }

    pub fn note_off(time: f64, note: usize) -> Self {
        PerformanceEvent {
            time,
            action: PerformanceAction::NoteOff(note),
        }
    }
}

/// Render `duration` seconds of `events` through `engine`.
///
/// Events are applied at the first frame at or after their time; events
/// past the end are dropped. Returns the left and right channels.
pub fn render_performance(
    engine: &mut AudioEngine,
    events: &[PerformanceEvent],
    duration: f64,
) -> (Vec<f32>, Vec<f32>) {
    let sample_rate = engine.context().sample_rate();
    let total = (duration.max(0.0) * sample_rate).round() as usize;
    let block_size = 128;

    let mut events = events.to_vec();
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    let mut pending = events.into_iter().peekable();

    let mut left = vec![0.0_f32; total];
    let mut right = vec![0.0_f32; total];

    engine.resume();
    let mut pos = 0;
    while pos < total {
        while let Some(event) = pending.next_if(|e| (e.time * sample_rate).ceil() as usize <= pos) {
            match event.action {
                PerformanceAction::NoteOn(note) => engine.play_note(note),
                PerformanceAction::NoteOff(note) => engine.stop_note(note),
            }
        }

        // Render up to the next event or the end of the block.
        let next_event = pending
            .peek()
            .map(|e| (e.time * sample_rate).ceil() as usize)
            .unwrap_or(total);
        let end = (pos + block_size).min(total).min(next_event.max(pos + 1));
        engine.render(&mut left[pos..end], &mut right[pos..end]);
        pos = end;
    }

    (left, right)
}

/// Render a performance straight to WAV bytes.
pub fn render_wav(engine: &mut AudioEngine, events: &[PerformanceEvent], duration: f64) -> Vec<u8> {
    let (left, right) = render_performance(engine, events, duration);
    let sample_rate = engine.context().sample_rate().round() as u32;
    encode_wav(&interleave_i16(&left, &right), sample_rate, 2)
}

/// Interleave two float channels into 16-bit PCM frames.
pub fn interleave_i16(left: &[f32], right: &[f32]) -> Vec<i16> {
    left.iter()
        .zip(right)
        .flat_map(|(&l, &r)| [to_i16(l), to_i16(r)])
        .collect()
}

fn to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}
