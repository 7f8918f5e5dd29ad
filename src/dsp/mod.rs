//! DSP Engine — Pure Rust audio synthesis and processing.
//!
//! Everything that runs per sample lives here. The same code drives the
//! live instrument (via an AudioWorklet + WASM) and offline rendering.

pub mod analyser;
pub mod automation;
pub mod context;
pub mod echo;
pub mod engine;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod renderer;
pub mod reverb;
pub mod sampler;
pub mod voice;
