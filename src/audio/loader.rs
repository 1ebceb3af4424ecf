//! Audio file decoding using Symphonia.
//!
//! Anything Symphonia can probe (WAV, MP3, FLAC, AAC/M4A, Ogg Vorbis) is
//! decoded to interleaved f32 samples.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use thiserror::Error;

/// Errors raised while turning an audio file into samples or features.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported or corrupt audio: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("No audio track found in file")]
    NoAudioTrack,

    #[error("Unknown sample rate")]
    UnknownSampleRate,

    #[error("Audio file contains no samples")]
    Empty,
}

/// Decoded audio.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved, in -1.0..1.0.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl AudioData {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Samples per channel.
    pub fn num_frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n,
        }
    }

    /// Average all channels into one.
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let scale = 1.0 / self.channels as f32;
        self.samples
            .chunks_exact(self.channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    }
}

/// Open `path` and let Symphonia pick a demuxer, using the extension as a hint.
fn probe(path: &Path) -> Result<Box<dyn FormatReader>, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(probed.format)
}

/// Pull every packet of `track_id` through `decoder`.
///
/// Returns the interleaved samples and the channel count reported by the
/// first decoded buffer.
fn decode_packets(
    format: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<(Vec<f32>, Option<usize>), AudioError> {
    let mut samples = Vec::new();
    let mut channels = None;
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A single corrupt packet is skipped, not fatal.
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let buf = buffer.get_or_insert_with(|| {
            let spec = *decoded.spec();
            channels = Some(spec.channels.count());
            SampleBuffer::new(decoded.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    Ok((samples, channels))
}

/// Decode an audio file.
///
/// Fails with [`AudioError::Empty`] when the container decodes but yields no
/// samples, so callers never build a feature track from nothing.
///
/// ```no_run
/// use particle_visualizer::audio::load_audio;
/// use std::path::Path;
///
/// let audio = load_audio(Path::new("song.mp3")).unwrap();
/// println!("{:.2}s at {}Hz", audio.duration(), audio.sample_rate);
/// ```
pub fn load_audio(path: &Path) -> Result<AudioData, AudioError> {
    let mut format = probe(path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .filter(|&sr| sr > 0)
        .ok_or(AudioError::UnknownSampleRate)?;
    let declared_channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let (samples, decoded_channels) = decode_packets(format.as_mut(), decoder.as_mut(), track_id)?;

    let channels = decoded_channels.or(declared_channels).unwrap_or(0);
    if samples.is_empty() || channels == 0 {
        return Err(AudioError::Empty);
    }

    log::debug!(
        "Decoded {}: {} samples, {} Hz, {} channel(s)",
        path.display(),
        samples.len(),
        sample_rate,
        channels
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_data_duration() {
        let audio = AudioData {
            samples: vec![0.0; 44100 * 2],
            sample_rate: 44100,
            channels: 2,
        };
        assert!((audio.duration() - 1.0).abs() < 0.001);
        assert_eq!(audio.num_frames(), 44100);
    }

    #[test]
    fn test_audio_data_to_mono() {
        let audio = AudioData {
            samples: vec![0.5, -0.5, 1.0, 0.0],
            sample_rate: 44100,
            channels: 2,
        };
        let mono = audio.to_mono();
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_audio(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Io(_)));
    }
}
