use std::path::{Path, PathBuf};

use crate::audio::resample;
use crate::config::Device;
use crate::{Synthesizer, Waveform, SAMPLE_RATE};

use super::model::{cuda_available, VitsError, VitsModel};
use super::phonemizer::{phonemes_to_ids, Espeak};

/// Parameters for configuring VITS model loading.
#[derive(Debug, Clone, Default)]
pub struct VitsModelParams {
    /// Execution device. CUDA failures surface as errors; see
    /// [`load_with_fallback`](crate::config::load_with_fallback).
    pub device: Device,
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// espeak-ng binary. `None` uses `espeak-ng` from PATH.
    pub espeak_bin: Option<PathBuf>,
    /// espeak-ng data directory. `None` uses the system default.
    pub espeak_data: Option<PathBuf>,
}

/// Multi-speaker VITS text-to-speech engine.
///
/// Output is always delivered at [`SAMPLE_RATE`]; models trained at another
/// rate are resampled.
///
/// ```rust,no_run
/// use wakegen::engines::vits::VitsEngine;
/// use wakegen::Synthesizer;
/// use std::path::Path;
///
/// let mut engine = VitsEngine::load(Path::new("models/vctk"), Default::default())?;
/// let speakers = engine.list_speakers();
/// let wav = engine.synthesize("Hello Airi", speakers.first().map(String::as_str))?;
/// println!("{:.2}s", wav.duration_secs());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct VitsEngine {
    model: VitsModel,
    espeak: Espeak,
    device: Device,
}

impl VitsEngine {
    pub fn load(model_dir: &Path, params: VitsModelParams) -> Result<Self, VitsError> {
        let model = VitsModel::load(model_dir, params.device, params.num_threads)?;
        let espeak = Espeak {
            bin_path: params.espeak_bin,
            data_path: params.espeak_data,
            voice: model.config().espeak.voice.clone(),
        };

        Ok(Self {
            model,
            espeak,
            device: params.device,
        })
    }

    /// Whether a CUDA device is usable by ONNX Runtime.
    pub fn accelerator_available() -> bool {
        cuda_available()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Native rate of the loaded model, before resampling.
    pub fn model_sample_rate(&self) -> u32 {
        self.model.sample_rate()
    }

    fn synthesize_samples(
        &mut self,
        text: &str,
        speaker: Option<&str>,
    ) -> Result<Vec<f32>, VitsError> {
        let speaker_id = self.model.speaker_id(speaker)?;
        let phonemes = self.espeak.phonemize(text)?;
        log::debug!("Phonemes for {text:?}: {phonemes}");

        let ids = phonemes_to_ids(&phonemes, self.model.phoneme_ids());
        let samples = self.model.infer(&ids, speaker_id)?;
        if samples.is_empty() {
            return Err(VitsError::EmptyOutput);
        }

        let native_rate = self.model.sample_rate();
        if native_rate == SAMPLE_RATE {
            return Ok(samples);
        }
        let target_len =
            (samples.len() as f64 * SAMPLE_RATE as f64 / native_rate as f64).round() as usize;
        Ok(resample(&samples, target_len))
    }
}

impl Synthesizer for VitsEngine {
    fn synthesize(
        &mut self,
        text: &str,
        speaker: Option<&str>,
    ) -> Result<Waveform, Box<dyn std::error::Error>> {
        let samples = self.synthesize_samples(text, speaker)?;
        Ok(Waveform::new(samples, SAMPLE_RATE))
    }

    fn list_speakers(&self) -> Vec<String> {
        self.model
            .config()
            .speakers()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}
