//! Reverb effect — convolution with a procedurally generated impulse.
//!
//! The impulse response is exponentially decaying noise plus a number of
//! early-reflection taps set by the density parameter. It is regenerated
//! whenever the parameters change. Each output channel convolves its input
//! channel with its own independently generated impulse channel.
//!
//! Convolution is uniformly partitioned and runs in the frequency domain
//! (overlap-save), so long impulses stay affordable per sample. The price
//! is one partition of latency.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::ReverbConfig;

/// User-facing reverb parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Decay amount (1..=50 by default); sets the impulse length.
    pub decay: f64,
    /// Density (1..=25 by default); sets the number of early reflections.
    pub density: f64,
    /// Gain (1..=15 by default); scales the impulse.
    pub gain: f64,
}

/// A stereo impulse response.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: [Vec<f32>; 2],
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }
}

/// Impulse length in samples for a decay value. Depends on nothing else.
pub fn impulse_length(sample_rate: f64, decay: f64, config: &ReverbConfig) -> usize {
    (sample_rate * (decay / config.decay_divisor) * config.length_scale).floor() as usize
}

/// Synthesize a stereo impulse response.
///
/// For sample `i` of `length`, the envelope is `exp(-3 i / length)`; the
/// sample is uniform noise in [-1, 1) times the envelope, plus one extra
/// noise term of weight `envelope * 0.5 / r` for each reflection tap `r`
/// whose offset `floor(sample_rate * spacing * r)` lies before `i`. The
/// result is scaled by `gain / gain_divisor * output_scale`.
pub fn generate_impulse_response<R: Rng>(
    sample_rate: f64,
    params: &ReverbParams,
    config: &ReverbConfig,
    rng: &mut R,
) -> ImpulseResponse {
    let length = impulse_length(sample_rate, params.decay, config);
    let reflection_count = (params.density * 4.0).floor() as usize;
    let tap_offsets: Vec<usize> = (1..=reflection_count)
        .map(|r| (sample_rate * config.reflection_spacing * r as f64).floor() as usize)
        .collect();
    let scale = params.gain / config.gain_divisor * config.output_scale;

    let mut generate = || {
        let mut data = Vec::with_capacity(length);
        for i in 0..length {
            let envelope = (-3.0 * i as f64 / length as f64).exp();
            let mut sample = rng.gen_range(-1.0..1.0) * envelope;
            for (r, &offset) in tap_offsets.iter().enumerate() {
                if i > offset {
                    sample += rng.gen_range(-1.0..1.0) * envelope * 0.5 / (r + 1) as f64;
                }
            }
            data.push((sample * scale) as f32);
        }
        data
    };

    let left = generate();
    let right = generate();
    ImpulseResponse {
        channels: [left, right],
    }
}

/// Uniformly partitioned overlap-save convolver for one channel.
struct Convolver {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Spectra of the impulse partitions.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of past input windows.
    history: Vec<Vec<Complex<f32>>>,
    history_pos: usize,
    /// Last two input blocks.
    window: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
    spectrum: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    fn new(kernel: &[f32], block: usize, fft: Arc<dyn Fft<f32>>, ifft: Arc<dyn Fft<f32>>) -> Self {
        let size = block * 2;
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let partitions: Vec<Vec<Complex<f32>>> = kernel
            .chunks(block)
            .map(|part| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); size];
                for (bin, &s) in spectrum.iter_mut().zip(part) {
                    *bin = Complex::new(s, 0.0);
                }
                fft.process_with_scratch(&mut spectrum, &mut scratch);
                spectrum
            })
            .collect();
        let history = vec![vec![Complex::new(0.0, 0.0); size]; partitions.len()];

        Convolver {
            block,
            fft,
            ifft,
            partitions,
            history,
            history_pos: 0,
            window: vec![0.0; size],
            output: vec![0.0; block],
            pos: 0,
            spectrum: vec![Complex::new(0.0, 0.0); size],
            accum: vec![Complex::new(0.0, 0.0); size],
            scratch,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let out = self.output[self.pos];
        self.window[self.block + self.pos] = input;
        self.pos += 1;
        if self.pos == self.block {
            self.pos = 0;
            self.process_block();
        }
        out
    }

    fn process_block(&mut self) {
        let count = self.partitions.len();
        if count == 0 {
            self.output.fill(0.0);
            self.window.copy_within(self.block.., 0);
            return;
        }

        for (bin, &s) in self.spectrum.iter_mut().zip(&self.window) {
            *bin = Complex::new(s, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        self.history_pos = (self.history_pos + 1) % count;
        self.history[self.history_pos].copy_from_slice(&self.spectrum);

        self.accum.fill(Complex::new(0.0, 0.0));
        for (p, kernel) in self.partitions.iter().enumerate() {
            let past = &self.history[(self.history_pos + count - p) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(past).zip(kernel) {
                *acc += x * h;
            }
        }
        self.ifft.process_with_scratch(&mut self.accum, &mut self.scratch);

        let norm = 1.0 / (self.block * 2) as f32;
        for (out, bin) in self.output.iter_mut().zip(&self.accum[self.block..]) {
            *out = bin.re * norm;
        }
        self.window.copy_within(self.block.., 0);
    }
}

/// Stereo convolution reverb with a mix-level on/off switch.
pub struct Reverb {
    sample_rate: f64,
    config: ReverbConfig,
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    rng: StdRng,

    params: ReverbParams,
    impulse: ImpulseResponse,
    convolvers: [Convolver; 2],
    wet: f64,
    enabled: bool,
}

impl fmt::Debug for Reverb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reverb")
            .field("params", &self.params)
            .field("impulse_len", &self.impulse.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Reverb {
    /// Create a disabled reverb with the minimum parameters.
    ///
    /// `block` is the convolution partition size; it is rounded up to a
    /// power of two.
    pub fn new(sample_rate: f64, block: usize, config: ReverbConfig) -> Self {
        let block = block.max(16).next_power_of_two();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(block * 2);
        let ifft = planner.plan_fft_inverse(block * 2);
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let params = ReverbParams {
            decay: config.decay.min,
            density: config.density.min,
            gain: config.gain.min,
        };
        let impulse = generate_impulse_response(sample_rate, &params, &config, &mut rng);
        let convolvers = [
            Convolver::new(impulse.channel(0), block, fft.clone(), ifft.clone()),
            Convolver::new(impulse.channel(1), block, fft.clone(), ifft.clone()),
        ];

        Reverb {
            sample_rate,
            config,
            block,
            fft,
            ifft,
            rng,
            params,
            impulse,
            convolvers,
            wet: 0.0,
            enabled: false,
        }
    }

    /// Clamp and apply new parameters, regenerating the impulse response.
    pub fn set_params(&mut self, decay: f64, density: f64, gain: f64) {
        self.params = ReverbParams {
            decay: self.config.decay.clamp(decay),
            density: self.config.density.clamp(density),
            gain: self.config.gain.clamp(gain),
        };
        self.impulse =
            generate_impulse_response(self.sample_rate, &self.params, &self.config, &mut self.rng);
        self.convolvers = [
            Convolver::new(self.impulse.channel(0), self.block, self.fft.clone(), self.ifft.clone()),
            Convolver::new(self.impulse.channel(1), self.block, self.fft.clone(), self.ifft.clone()),
        ];
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.wet = if enabled { self.config.wet_level } else { 0.0 };
    }

    pub fn params(&self) -> ReverbParams {
        self.params
    }

    pub fn impulse_response(&self) -> &ImpulseResponse {
        &self.impulse
    }

    pub fn wet_level(&self) -> f64 {
        self.wet
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Processing latency in frames.
    pub fn latency(&self) -> usize {
        self.block
    }

    /// Process one stereo frame and return the wet output.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let l = self.convolvers[0].process(left);
        let r = self.convolvers[1].process(right);
        let wet = self.wet as f32;
        (l * wet, r * wet)
    }
}
