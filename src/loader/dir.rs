//! Samples read from a directory of `<bank>-<note>[-loop].{ogg,wav,mp3}`
//! files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

use crate::bank::SampleKey;
use crate::dsp::sampler::SampleBuffer;
use crate::error::LoadError;

use super::SampleSource;

/// File-system sample source. Ogg Vorbis is tried first, then WAV, then MP3.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SampleSource for DirSource {
    fn fetch(&self, key: &SampleKey) -> Result<Option<SampleBuffer>, LoadError> {
        let Some(stem) = key.file_stem() else {
            return Ok(None);
        };

        let ogg = self.dir.join(format!("{stem}.ogg"));
        if ogg.is_file() {
            trace!(path = %ogg.display(), "Decoding Ogg");
            return decode_ogg(&ogg).map(Some);
        }
        let wav = self.dir.join(format!("{stem}.wav"));
        if wav.is_file() {
            trace!(path = %wav.display(), "Decoding WAV");
            return decode_wav(&wav).map(Some);
        }
        let mp3 = self.dir.join(format!("{stem}.mp3"));
        if mp3.is_file() {
            trace!(path = %mp3.display(), "Decoding MP3");
            return decode_mp3(&mp3).map(Some);
        }
        Ok(None)
    }
}

fn decode_error(path: &Path, reason: impl ToString) -> LoadError {
    LoadError::Decode {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Decode an Ogg Vorbis file.
pub fn decode_ogg(path: &Path) -> Result<SampleBuffer, LoadError> {
    decode_with_symphonia(path)
}

fn symphonia_error(path: &Path, e: SymphoniaError) -> LoadError {
    match e {
        SymphoniaError::IoError(e) => LoadError::Io(e),
        SymphoniaError::Unsupported(what) => {
            LoadError::UnsupportedFormat(format!("{}: {what}", path.display()))
        }
        e => decode_error(path, e),
    }
}

/// Decode the first audio track of any container symphonia can probe.
/// The first decoded packet fixes the channel count; corrupt packets are
/// skipped.
fn decode_with_symphonia(path: &Path) -> Result<SampleBuffer, LoadError> {
    let mss = MediaSourceStream::new(Box::new(File::open(path)?), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| symphonia_error(path, e))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::UnsupportedFormat(format!("{}: no audio track", path.display())))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| symphonia_error(path, e))?;

    let mut pcm = Vec::new();
    let mut format: Option<(usize, u32)> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            // Some demuxers report a truncated final page this way.
            Err(SymphoniaError::DecodeError(_)) if format.is_some() => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(symphonia_error(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!(path = %path.display(), reason, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(symphonia_error(path, e)),
        };

        let spec = *decoded.spec();
        let (channels, _) = *format.get_or_insert((spec.channels.count().max(1), spec.rate));
        if spec.channels.count() != channels || decoded.frames() == 0 {
            continue;
        }
        let mut interleaved = PcmBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        pcm.extend_from_slice(interleaved.samples());
    }

    let (channels, sample_rate) = format.ok_or_else(|| decode_error(path, "no audio packets"))?;
    Ok(SampleBuffer::from_interleaved_f32(&pcm, channels, sample_rate))
}

/// Decode a PCM or float WAV file.
pub fn decode_wav(path: &Path) -> Result<SampleBuffer, LoadError> {
    let mut reader = hound::WavReader::open(path).map_err(|e| decode_error(path, e))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_error(path, e))?,
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_error(path, e))?
        }
    };

    Ok(SampleBuffer::from_interleaved_f32(
        &samples,
        spec.channels.max(1) as usize,
        spec.sample_rate,
    ))
}

/// Decode an MP3 file. The first frame fixes the channel count and rate.
pub fn decode_mp3(path: &Path) -> Result<SampleBuffer, LoadError> {
    let mut decoder = minimp3::Decoder::new(File::open(path)?);
    let mut pcm = Vec::new();
    let mut format: Option<(usize, u32)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let (channels, _) =
                    *format.get_or_insert((frame.channels.max(1), frame.sample_rate.max(1) as u32));
                if frame.channels == channels {
                    pcm.extend_from_slice(&frame.data);
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(minimp3::Error::Io(e)) => return Err(e.into()),
            Err(e) => return Err(decode_error(path, format!("{e:?}"))),
        }
    }

    let (channels, sample_rate) = format.ok_or_else(|| decode_error(path, "no MP3 frames"))?;
    Ok(SampleBuffer::from_interleaved_i16(&pcm, channels, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{BankId, SampleVariant};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bitsynth-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_wav(path: &Path, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames * channels as usize {
            writer.write_sample(if i % 2 == 0 { 16384_i16 } else { -16384 }).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_wav_by_key() {
        let dir = temp_dir("wav");
        write_wav(&dir.join("w2-2c-loop.wav"), 2, 300);

        let source = DirSource::new(&dir);
        let key = SampleKey::new(BankId::W2, 7, SampleVariant::Loop);
        let buffer = source.fetch(&key).unwrap().unwrap();
        assert_eq!(buffer.len(), 300);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 22050);
        assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((buffer.channel(1)[0] + 0.5).abs() < 1e-6);

        let other = SampleKey::new(BankId::W2, 7, SampleVariant::OneShot);
        assert!(source.fetch(&other).unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn symphonia_decodes_first_track() {
        let dir = temp_dir("symphonia");
        let path = dir.join("tone.wav");
        write_wav(&path, 2, 1000);

        let buffer = decode_with_symphonia(&path).unwrap();
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 22050);
        assert!((buffer.channel(0)[10] - 0.5).abs() < 1e-4);
        assert!((buffer.channel(1)[10] + 0.5).abs() < 1e-4);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn ogg_is_preferred_over_wav() {
        let dir = temp_dir("ogg");
        std::fs::write(dir.join("p1-1f.ogg"), b"OggS not really a vorbis stream").unwrap();
        write_wav(&dir.join("p1-1f.wav"), 1, 100);
        let source = DirSource::new(&dir);
        let key = SampleKey::new(BankId::P1, 0, SampleVariant::OneShot);
        // The valid WAV next to it is not used as a fallback.
        assert!(source.fetch(&key).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_wav_is_decode_error() {
        let dir = temp_dir("corrupt");
        std::fs::write(dir.join("p2-1f.wav"), b"not a wav").unwrap();
        let source = DirSource::new(&dir);
        let key = SampleKey::new(BankId::P2, 0, SampleVariant::OneShot);
        assert!(matches!(source.fetch(&key), Err(LoadError::Decode { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }
}
