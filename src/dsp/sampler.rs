//! Sample buffers and buffer playback.
//!
//! A [`SampleBuffer`] is immutable decoded PCM shared between voices. A
//! [`BufferSource`] plays one buffer at a fixed rate with linear
//! interpolation, optionally looping the whole buffer.

use std::sync::Arc;

/// Decoded multi-channel PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// One vector per channel, all the same length.
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build from planar channel data. Channels are truncated to the
    /// shortest one.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(len);
        }
        SampleBuffer {
            channels,
            sample_rate,
        }
    }

    pub fn mono(data: Vec<f32>, sample_rate: u32) -> Self {
        SampleBuffer::new(vec![data], sample_rate)
    }

    /// Create from interleaved 16-bit signed PCM.
    pub fn from_interleaved_i16(pcm: &[i16], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mut planar = vec![Vec::with_capacity(pcm.len() / channels); channels];
        for frame in pcm.chunks_exact(channels) {
            for (ch, &s) in frame.iter().enumerate() {
                planar[ch].push(s as f32 / 32768.0);
            }
        }
        SampleBuffer::new(planar, sample_rate)
    }

    /// Create from interleaved f32 samples.
    pub fn from_interleaved_f32(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, &s) in frame.iter().enumerate() {
                planar[ch].push(s);
            }
        }
        SampleBuffer::new(planar, sample_rate)
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Read a stereo frame at a fractional position with linear
    /// interpolation. Mono buffers are duplicated to both sides. With
    /// `wrap`, the frame after the last one is the first one.
    pub fn read_stereo(&self, position: f64, wrap: bool) -> (f32, f32) {
        let len = self.len();
        if len == 0 || position < 0.0 {
            return (0.0, 0.0);
        }
        let idx = position as usize;
        if idx >= len {
            return (0.0, 0.0);
        }
        let next = if idx + 1 < len {
            Some(idx + 1)
        } else if wrap {
            Some(0)
        } else {
            None
        };
        let frac = (position - idx as f64) as f32;
        let read = |ch: &[f32]| match next {
            Some(n) => ch[idx] * (1.0 - frac) + ch[n] * frac,
            None => ch[idx],
        };
        let left = read(self.channels[0].as_slice());
        let right = match self.channels.get(1) {
            Some(ch) => read(ch.as_slice()),
            None => left,
        };
        (left, right)
    }
}

/// Playback of a shared buffer: the equivalent of a one-use buffer source
/// node.
#[derive(Debug, Clone)]
pub struct BufferSource {
    buffer: Arc<SampleBuffer>,
    position: f64,
    /// Frames advanced per output frame (playback rate × rate ratio).
    step: f64,
    playback_rate: f64,
    looping: bool,
    finished: bool,
}

impl BufferSource {
    /// Start playback of `buffer` at `playback_rate` into a context running
    /// at `output_rate`.
    pub fn new(buffer: Arc<SampleBuffer>, playback_rate: f64, looping: bool, output_rate: f64) -> Self {
        let step = playback_rate * buffer.sample_rate() as f64 / output_rate;
        let finished = buffer.is_empty() || !(step.is_finite() && step > 0.0);
        BufferSource {
            buffer,
            position: 0.0,
            step,
            playback_rate,
            looping,
            finished,
        }
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Set once playback ended naturally or `stop` was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Halt playback. Stopping a finished source is a no-op.
    pub fn stop(&mut self) {
        self.finished = true;
    }

    /// Produce the next stereo frame.
    pub fn next_frame(&mut self) -> (f32, f32) {
        if self.finished {
            return (0.0, 0.0);
        }
        let frame = self.buffer.read_stereo(self.position, self.looping);
        self.position += self.step;

        let len = self.buffer.len() as f64;
        if self.position >= len {
            if self.looping {
                self.position %= len;
            } else {
                self.finished = true;
            }
        }
        frame
    }
}
