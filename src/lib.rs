//! # wakegen
//!
//! Synthetic wake-word dataset generation. A pretrained multi-speaker
//! text-to-speech model speaks one fixed phrase over and over; every take is
//! varied with speed, pitch and a crude emotion effect, and only takes whose
//! duration lands inside a configured window are kept as WAV files.
//!
//! ## Features
//!
//! - **Audio transforms**: sample-dropping speed change, resample-based pitch
//!   shift, gain/tremolo emotion simulation
//! - **Seeded sampling**: reproducible (speaker, emotion, speed, pitch) draws
//! - **Batch loop**: keeps generating until the target number of valid clips
//!   exists, with running statistics
//! - **VITS engine** (feature `vits`): multi-speaker VITS ONNX models via ONNX
//!   Runtime and espeak-ng
//!
//! ## Quick Start
//!
//! ```ignore
//! use wakegen::{config::GeneratorConfigBuilder, generator::DatasetGenerator};
//! use wakegen::engines::vits::VitsEngine;
//!
//! let engine = VitsEngine::load("models/vctk".as_ref(), Default::default())?;
//! let config = GeneratorConfigBuilder::default()
//!     .target_samples(50usize)
//!     .output_dir("out")
//!     .build()?;
//!
//! let mut generator = DatasetGenerator::new(config, engine)?;
//! let report = generator.generate_dataset()?;
//! println!("{} valid clips", report.stats.valid_samples);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod config;
pub mod engines;
pub mod generator;
pub mod sampler;

use std::path::Path;

/// Sample rate every accepted clip is processed and written at.
pub const SAMPLE_RATE: u32 = 22050;

/// Mono audio produced by a [`Synthesizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Raw audio samples as f32 values in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate of the audio
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Write the audio to a mono 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        write_pcm16(path, &self.samples, self.sample_rate)
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Write `samples` as a mono 16-bit PCM WAV file, clamping to full scale.
pub fn write_pcm16(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(scaled)?;
    }
    writer.finalize()?;
    Ok(())
}

/// The one capability the dataset generator needs from a TTS model.
///
/// Implementations are free to be slow and blocking; the generator calls them
/// sequentially and never retries a failed request.
pub trait Synthesizer {
    /// Synthesize `text`, optionally with a specific voice.
    ///
    /// `speaker` is one of the identifiers returned by [`list_speakers`](Self::list_speakers),
    /// or `None` for the model's default voice.
    fn synthesize(
        &mut self,
        text: &str,
        speaker: Option<&str>,
    ) -> Result<Waveform, Box<dyn std::error::Error>>;

    /// Voices this model can speak with. Empty for single-speaker models.
    fn list_speakers(&self) -> Vec<String>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn synthesize(
        &mut self,
        text: &str,
        speaker: Option<&str>,
    ) -> Result<Waveform, Box<dyn std::error::Error>> {
        (**self).synthesize(text, speaker)
    }

    fn list_speakers(&self) -> Vec<String> {
        (**self).list_speakers()
    }
}
