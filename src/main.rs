use std::path::PathBuf;

use std::convert::Infallible;

use clap::{ArgAction, Parser};

use wakegen::config::{
    load_with_fallback, Device, GeneratorConfig, GeneratorConfigBuilder,
    GeneratorConfigBuilderError,
};
use wakegen::engines::vits::{VitsEngine, VitsModelParams};
use wakegen::generator::DatasetGenerator;

/// Generate a synthetic wake-word dataset with a multi-speaker VITS model.
///
/// Every option can also be set through the environment variable shown.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of valid clips to produce
    #[arg(long, env = "TARGET_SAMPLES", default_value_t = 600)]
    target_samples: usize,

    /// Shortest accepted clip, in seconds
    #[arg(long, env = "MIN_DURATION", default_value_t = 1.0)]
    min_duration: f64,

    /// Longest accepted clip, in seconds
    #[arg(long, env = "MAX_DURATION", default_value_t = 1.3)]
    max_duration: f64,

    /// Attempts per batch
    #[arg(long, env = "BATCH_SIZE", default_value_t = 20)]
    batch_size: usize,

    /// Directory the WAV files are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = "/app/output")]
    output_dir: PathBuf,

    /// Phrase to synthesize
    #[arg(long, env = "WAKE_WORD", default_value = "Hello Airi")]
    wake_word: String,

    /// Seed for speaker/emotion/speed/pitch sampling
    #[arg(long, env = "RANDOM_SEED", default_value_t = 42)]
    random_seed: u64,

    /// Skip the GPU even when one is available (FORCE_CPU must be "true")
    #[arg(long, env = "FORCE_CPU", action = ArgAction::SetTrue, value_parser = parse_force_cpu)]
    force_cpu: bool,

    /// Directory holding the VITS `.onnx` model and its JSON config
    #[arg(long, env = "MODEL_DIR", default_value = "/app/models/vctk")]
    model_dir: PathBuf,

    /// Give up after this many batches (default: never)
    #[arg(long, env = "MAX_EPOCHS")]
    max_epochs: Option<u64>,

    /// ONNX Runtime intra-op threads (default: all cores)
    #[arg(long, env = "NUM_THREADS")]
    num_threads: Option<usize>,
}

/// Only a case-insensitive "true" enables the flag; anything else is false.
fn parse_force_cpu(value: &str) -> Result<bool, Infallible> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

impl Args {
    fn generator_config(
        &self,
        device: Device,
    ) -> Result<GeneratorConfig, GeneratorConfigBuilderError> {
        let mut builder = GeneratorConfigBuilder::default();
        builder
            .target_samples(self.target_samples)
            .min_duration(self.min_duration)
            .max_duration(self.max_duration)
            .batch_size(self.batch_size)
            .output_dir(self.output_dir.clone())
            .wake_word(self.wake_word.clone())
            .random_seed(self.random_seed)
            .device(device);
        if let Some(max_epochs) = self.max_epochs {
            builder.max_epochs(max_epochs);
        }
        builder.build()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let device = Device::select(args.force_cpu, VitsEngine::accelerator_available);
    log::info!("Initializing VITS synthesizer...");
    log::info!("Device: {}", device.as_str().to_uppercase());
    match device {
        Device::Cpu => log::warn!("Running on CPU - This will be slower."),
        Device::Cuda => log::info!("GPU detected - Fast generation enabled!"),
    }

    log::info!("Loading TTS model from {}...", args.model_dir.display());
    let (engine, _) = load_with_fallback(device, |device| {
        VitsEngine::load(
            &args.model_dir,
            VitsModelParams {
                device,
                num_threads: args.num_threads,
                ..Default::default()
            },
        )
    })?;
    log::info!(
        "Model loaded on {} ({} Hz native)",
        engine.device().as_str().to_uppercase(),
        engine.model_sample_rate()
    );

    let config = args.generator_config(engine.device())?;
    let mut generator = DatasetGenerator::new(config, engine)?;
    log::info!("Writing samples to {}", generator.config().output_dir.display());
    generator.generate_dataset()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["wakegen"]).unwrap();
        assert_eq!(args.target_samples, 600);
        assert_eq!(args.min_duration, 1.0);
        assert_eq!(args.max_duration, 1.3);
        assert_eq!(args.batch_size, 20);
        assert_eq!(args.output_dir, PathBuf::from("/app/output"));
        assert_eq!(args.wake_word, "Hello Airi");
        assert_eq!(args.random_seed, 42);
        assert!(!args.force_cpu);
        assert_eq!(args.max_epochs, None);
    }

    #[test]
    fn flags_map_onto_generator_config() {
        let args = Args::try_parse_from([
            "wakegen",
            "--target-samples",
            "5",
            "--batch-size",
            "2",
            "--min-duration",
            "0.9",
            "--output-dir",
            "/tmp/airi",
            "--wake-word",
            "Hey Airi",
            "--max-epochs",
            "10",
            "--force-cpu",
        ])
        .unwrap();
        assert!(args.force_cpu);

        let config = args.generator_config(Device::Cpu).unwrap();
        assert_eq!(config.target_samples, 5);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.min_duration, 0.9);
        assert_eq!(config.max_duration, 1.3);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/airi"));
        assert_eq!(config.wake_word, "Hey Airi");
        assert_eq!(config.max_epochs, Some(10));
    }

    #[test]
    fn force_cpu_accepts_only_true() {
        for value in ["true", "TRUE", "True", " true "] {
            assert_eq!(parse_force_cpu(value), Ok(true), "{value:?}");
        }
        for value in ["false", "1", "yes", "on", ""] {
            assert_eq!(parse_force_cpu(value), Ok(false), "{value:?}");
        }
    }

    #[test]
    fn inverted_window_is_rejected() {
        let args = Args::try_parse_from([
            "wakegen",
            "--min-duration",
            "2.0",
            "--max-duration",
            "1.0",
        ])
        .unwrap();
        assert!(args.generator_config(Device::Cpu).is_err());
    }
}
