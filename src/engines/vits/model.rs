use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider};
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::config::{InferenceConfig, ModelConfig};
use crate::config::Device;

#[derive(thiserror::Error, Debug)]
pub enum VitsError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Speaker '{0}' not found. Call list_speakers() to see available speakers.")]
    SpeakerNotFound(String),
    #[error("Invalid model config: {0}")]
    Config(String),
    #[error("Model produced no audio")]
    EmptyOutput,
}

/// Loaded VITS ONNX session plus its model description.
pub struct VitsModel {
    session: Session,
    config: ModelConfig,
    phoneme_ids: HashMap<char, Vec<i64>>,
    speaker_ids: HashMap<String, i64>,
}

impl VitsModel {
    /// Load a VITS export from a directory.
    ///
    /// The directory must contain:
    /// - An `.onnx` file
    /// - Its description, either `<model>.onnx.json` or `config.json`
    pub fn load(
        model_dir: &Path,
        device: Device,
        num_threads: Option<usize>,
    ) -> Result<Self, VitsError> {
        let onnx_path = find_onnx_file(model_dir)?;
        let config_path = find_config_file(model_dir, &onnx_path)?;
        log::info!(
            "Loading VITS model from {} on {device}",
            onnx_path.display()
        );

        let config = ModelConfig::load(&config_path)?;
        let session = init_session(&onnx_path, device, num_threads)?;

        let phoneme_ids = config.phoneme_ids();
        let speaker_ids = config.speakers().into_iter().collect();
        log::info!(
            "Model: {} Hz, {} speakers, espeak voice '{}'",
            config.audio.sample_rate,
            config.num_speakers,
            config.espeak.voice
        );

        Ok(Self {
            session,
            config,
            phoneme_ids,
            speaker_ids,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.audio.sample_rate
    }

    pub fn phoneme_ids(&self) -> &HashMap<char, Vec<i64>> {
        &self.phoneme_ids
    }

    /// Resolve the `sid` input for a request.
    ///
    /// Single-speaker models take no `sid`; multi-speaker models fall back to
    /// speaker 0 when no name is given.
    pub fn speaker_id(&self, speaker: Option<&str>) -> Result<Option<i64>, VitsError> {
        if !self.config.is_multi_speaker() {
            return Ok(None);
        }
        match speaker {
            Some(name) => self
                .speaker_ids
                .get(name)
                .copied()
                .map(Some)
                .ok_or_else(|| VitsError::SpeakerNotFound(name.to_string())),
            None => Ok(Some(0)),
        }
    }

    /// Run the network on a full id sequence (BOS/EOS/padding included).
    pub fn infer(&mut self, ids: &[i64], speaker_id: Option<i64>) -> Result<Vec<f32>, VitsError> {
        let InferenceConfig {
            noise_scale,
            length_scale,
            noise_w,
        } = self.config.inference;

        let input = Array2::from_shape_vec((1, ids.len()), ids.to_vec())?;
        let input_lengths = ndarray::arr1(&[ids.len() as i64]);
        let scales = ndarray::arr1(&[noise_scale, length_scale, noise_w]);

        let output = match speaker_id {
            Some(sid) => {
                let sid = ndarray::arr1(&[sid]);
                let inputs = inputs![
                    "input" => TensorRef::from_array_view(input.view())?,
                    "input_lengths" => TensorRef::from_array_view(input_lengths.view())?,
                    "scales" => TensorRef::from_array_view(scales.view())?,
                    "sid" => TensorRef::from_array_view(sid.view())?,
                ];
                self.session.run(inputs)?
            }
            None => {
                let inputs = inputs![
                    "input" => TensorRef::from_array_view(input.view())?,
                    "input_lengths" => TensorRef::from_array_view(input_lengths.view())?,
                    "scales" => TensorRef::from_array_view(scales.view())?,
                ];
                self.session.run(inputs)?
            }
        };

        // output shape is [1, 1, samples]
        let (_, audio) = output.iter().next().ok_or(VitsError::EmptyOutput)?;
        let audio = audio.try_extract_array::<f32>()?;

        Ok(audio.iter().copied().collect())
    }
}

/// Whether ONNX Runtime can use CUDA on this machine.
pub fn cuda_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            log::debug!("CUDA availability check failed: {e}");
            false
        }
    }
}

fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, VitsError> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(model_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("onnx"))
        .collect();
    candidates.sort();

    if candidates.len() > 1 {
        log::warn!(
            "Found {} .onnx files in {}, using the first",
            candidates.len(),
            model_dir.display()
        );
    }

    candidates.into_iter().next().ok_or_else(|| {
        VitsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No .onnx file found in {}", model_dir.display()),
        ))
    })
}

/// Prefers `<model>.onnx.json` next to the model, then `config.json`.
fn find_config_file(model_dir: &Path, onnx_path: &Path) -> Result<PathBuf, VitsError> {
    let mut sidecar = onnx_path.as_os_str().to_owned();
    sidecar.push(".json");
    let sidecar = PathBuf::from(sidecar);
    if sidecar.exists() {
        return Ok(sidecar);
    }

    let config = model_dir.join("config.json");
    if config.exists() {
        return Ok(config);
    }

    Err(VitsError::Config(format!(
        "Neither {} nor {} exists",
        sidecar.display(),
        config.display()
    )))
}

/// Build a session on `device`. CUDA registration failures are errors so the
/// caller can fall back to the CPU explicitly.
fn init_session(
    onnx_path: &Path,
    device: Device,
    num_threads: Option<usize>,
) -> Result<Session, VitsError> {
    let providers = match device {
        Device::Cuda => vec![CUDAExecutionProvider::default().build().error_on_failure()],
        Device::Cpu => vec![CPUExecutionProvider::default().build()],
    };

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder.with_intra_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_sidecar_config_first() {
        let dir = tempfile::tempdir().unwrap();
        let onnx = dir.path().join("en_GB-vctk-medium.onnx");
        std::fs::write(&onnx, b"").unwrap();
        std::fs::write(dir.path().join("en_GB-vctk-medium.onnx.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();

        assert_eq!(find_onnx_file(dir.path()).unwrap(), onnx);
        assert_eq!(
            find_config_file(dir.path(), &onnx).unwrap(),
            dir.path().join("en_GB-vctk-medium.onnx.json")
        );
    }

    #[test]
    fn falls_back_to_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let onnx = dir.path().join("model.onnx");
        std::fs::write(&onnx, b"").unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();

        assert_eq!(
            find_config_file(dir.path(), &onnx).unwrap(),
            dir.path().join("config.json")
        );
    }

    #[test]
    fn missing_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match find_onnx_file(dir.path()) {
            Err(VitsError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }
}
