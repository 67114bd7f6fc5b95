use std::fmt;
use std::path::PathBuf;

use derive_builder::Builder;

/// Compute device the synthesis model runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    /// Pick the device to try first.
    ///
    /// `accelerator_available` is only consulted when the CPU is not forced.
    pub fn select(force_cpu: bool, accelerator_available: impl FnOnce() -> bool) -> Self {
        if force_cpu || !accelerator_available() {
            Device::Cpu
        } else {
            Device::Cuda
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `load` on `device`, retrying once on the CPU if an accelerated device
/// fails.
///
/// Returns the loaded value together with the device it actually ended up on.
/// A CPU failure is returned as is.
pub fn load_with_fallback<T, E, F>(device: Device, mut load: F) -> Result<(T, Device), E>
where
    F: FnMut(Device) -> Result<T, E>,
    E: fmt::Display,
{
    match load(device) {
        Ok(loaded) => Ok((loaded, device)),
        Err(e) if device != Device::Cpu => {
            log::warn!("Error loading model on {device}: {e}");
            log::warn!("Falling back to CPU...");
            load(Device::Cpu).map(|loaded| (loaded, Device::Cpu))
        }
        Err(e) => Err(e),
    }
}

/// Immutable settings for one dataset generation run.
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct GeneratorConfig {
    /// Number of valid clips to produce.
    pub target_samples: usize,
    /// Shortest accepted clip, in seconds.
    pub min_duration: f64,
    /// Longest accepted clip, in seconds.
    pub max_duration: f64,
    /// Upper bound on attempts per batch.
    pub batch_size: usize,
    #[builder(setter(into))]
    pub output_dir: PathBuf,
    /// Phrase handed to the synthesizer.
    #[builder(setter(into))]
    pub wake_word: String,
    pub random_seed: u64,
    /// Device the synthesizer was loaded on. Informational only.
    pub device: Device,
    /// Stop with an error after this many batches. `None` keeps going until
    /// the target is met.
    #[builder(setter(into, strip_option))]
    pub max_epochs: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target_samples: 600,
            min_duration: 1.0,
            max_duration: 1.3,
            batch_size: 20,
            output_dir: PathBuf::from("/app/output"),
            wake_word: "Hello Airi".to_string(),
            random_seed: 42,
            device: Device::Cpu,
            max_epochs: None,
        }
    }
}

impl GeneratorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let defaults = GeneratorConfig::default();
        let min = self.min_duration.unwrap_or(defaults.min_duration);
        let max = self.max_duration.unwrap_or(defaults.max_duration);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 {
            return Err(format!("invalid duration window {min}s - {max}s"));
        }
        if min > max {
            return Err(format!(
                "min_duration ({min}s) must not exceed max_duration ({max}s)"
            ));
        }
        if self.batch_size == Some(0) {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.max_epochs == Some(Some(0)) {
            return Err("max_epochs must be at least 1 when set".to_string());
        }
        Ok(())
    }
}
