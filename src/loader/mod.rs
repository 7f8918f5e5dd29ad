//! Sample loading and loop preprocessing.
//!
//! Every key of every bank has a one-shot recording and a loop recording.
//! A [`SampleSource`] produces decoded buffers; [`load_samples`] walks the
//! full key set in a fixed order, reports progress, crossfades the loop
//! tails of the P banks, and returns an immutable [`SampleStore`]. A sample
//! that is missing or fails to decode is simply absent from the store.

#[cfg(feature = "assets")]
mod dir;

#[cfg(feature = "assets")]
pub use dir::DirSource;

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bank::{BankId, NOTE_COUNT, SampleKey, SampleVariant};
use crate::dsp::sampler::SampleBuffer;
use crate::error::LoadError;

/// Something that can fetch and decode sample buffers.
pub trait SampleSource {
    /// `Ok(None)` means the sample does not exist; `Err` means it exists but
    /// could not be read. Both leave the key without a buffer.
    fn fetch(&self, key: &SampleKey) -> Result<Option<SampleBuffer>, LoadError>;
}

/// Progress notifications emitted while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    /// Loading of a bank's samples has begun.
    BankStarted { bank: BankId },
    /// One more sample has been attempted.
    Progress { loaded: usize, total: usize },
}

/// Number of sample fetches a full load performs.
pub const TOTAL_SAMPLES: usize = BankId::ALL.len() * NOTE_COUNT * 2;

/// In-memory sample source, keyed by bank, note and variant.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    buffers: HashMap<SampleKey, SampleBuffer>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SampleKey, buffer: SampleBuffer) {
        self.buffers.insert(key, buffer);
    }

    pub fn with(mut self, key: SampleKey, buffer: SampleBuffer) -> Self {
        self.insert(key, buffer);
        self
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl SampleSource for MemorySource {
    fn fetch(&self, key: &SampleKey) -> Result<Option<SampleBuffer>, LoadError> {
        Ok(self.buffers.get(key).cloned())
    }
}

/// Immutable decoded samples, shared read-only by every voice.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    buffers: HashMap<SampleKey, Arc<SampleBuffer>>,
}

impl SampleStore {
    pub fn get(&self, bank: BankId, note: usize, variant: SampleVariant) -> Option<&Arc<SampleBuffer>> {
        self.buffers.get(&SampleKey::new(bank, note, variant))
    }

    pub fn contains(&self, key: &SampleKey) -> bool {
        self.buffers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Load every sample from `source` in bank, note, variant order.
///
/// `observer` sees a `BankStarted` event before each bank and a `Progress`
/// event after every fetch attempt, successful or not.
pub fn load_samples<S, F>(source: &S, observer: F) -> SampleStore
where
    S: SampleSource + ?Sized,
    F: FnMut(LoadEvent),
{
    load_samples_with_crossfade(source, CROSSFADE_SECONDS, observer)
}

/// [`load_samples`] with an explicit loop crossfade length in seconds.
pub fn load_samples_with_crossfade<S, F>(
    source: &S,
    crossfade_seconds: f64,
    mut observer: F,
) -> SampleStore
where
    S: SampleSource + ?Sized,
    F: FnMut(LoadEvent),
{
    let mut buffers = HashMap::new();
    let mut loaded = 0;

    for bank in BankId::ALL {
        observer(LoadEvent::BankStarted { bank });
        for note in 0..NOTE_COUNT {
            for variant in [SampleVariant::OneShot, SampleVariant::Loop] {
                let key = SampleKey::new(bank, note, variant);
                match source.fetch(&key) {
                    Ok(Some(buffer)) if !buffer.is_empty() && buffer.sample_rate() > 0 => {
                        let buffer = if variant == SampleVariant::Loop && bank.crossfades_loops() {
                            crossfade_loop(&buffer, crossfade_seconds)
                        } else {
                            buffer
                        };
                        buffers.insert(key, Arc::new(buffer));
                    }
                    Ok(Some(_)) => warn!(?key, "Ignoring sample with no frames or a zero sample rate"),
                    Ok(None) => debug!(?key, "No sample for key"),
                    Err(e) => warn!(?key, error = %e, "Failed to load sample"),
                }
                loaded += 1;
                observer(LoadEvent::Progress {
                    loaded,
                    total: TOTAL_SAMPLES,
                });
            }
        }
    }

    info!(loaded = buffers.len(), total = TOTAL_SAMPLES, "Sample load complete");
    SampleStore { buffers }
}

/// Longest loop crossfade, in seconds.
pub const CROSSFADE_SECONDS: f64 = 0.15;

/// Equal-power crossfade of a loop buffer's tail into its head.
///
/// With `fade = min(floor(rate * max_seconds), floor(len / 3))`, the last
/// `fade` frames of each channel become
/// `src[len - fade + i] * cos(t π/2) + src[i] * sin(t π/2)` for
/// `t = i / fade`. Everything else is copied unchanged, so the loop seam
/// wraps from the blended tail straight into the untouched head.
pub fn crossfade_loop(buffer: &SampleBuffer, max_seconds: f64) -> SampleBuffer {
    let len = buffer.len();
    let fade = ((buffer.sample_rate() as f64 * max_seconds).floor() as usize).min(len / 3);

    let channels = buffer
        .channels()
        .iter()
        .map(|src| {
            let mut dst = src.clone();
            for i in 0..fade {
                let t = i as f64 / fade as f64;
                let (fade_out, fade_in) = equal_power_gains(t);
                let tail = len - fade + i;
                dst[tail] = (src[tail] as f64 * fade_out + src[i] as f64 * fade_in) as f32;
            }
            dst
        })
        .collect();

    SampleBuffer::new(channels, buffer.sample_rate())
}

/// `(fade_out, fade_in)` gains at position `t` in [0, 1]; their squares
/// always sum to one.
pub fn equal_power_gains(t: f64) -> (f64, f64) {
    ((t * FRAC_PI_2).cos(), (t * FRAC_PI_2).sin())
}
