use std::fs;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::audio::{add_emotion_simulation, change_pitch, change_speed};
use crate::config::{Device, GeneratorConfig};
use crate::sampler::{ConfigSampler, SampleConfig};
use crate::{write_pcm16, Synthesizer, SAMPLE_RATE};

/// Prefix of every generated file name.
pub const FILE_PREFIX: &str = "airi";

const BANNER_WIDTH: usize = 60;

#[derive(thiserror::Error, Debug)]
pub enum GeneratorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error("Synthesizer returned {found} Hz audio, expected {expected} Hz")]
    UnexpectedSampleRate { found: u32, expected: u32 },
    #[error(
        "Gave up after {epochs} epochs with {valid}/{target} valid samples; \
         the duration window may be too narrow for this model"
    )]
    EpochLimitReached {
        epochs: u64,
        valid: usize,
        target: usize,
    },
}

/// What happened to one attempted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Written to disk.
    Accepted { duration: f64 },
    /// Duration fell outside the configured window.
    Rejected { duration: f64 },
    /// Synthesis, processing or writing failed.
    Failed,
}

impl SampleOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SampleOutcome::Accepted { .. })
    }
}

/// Running counters for a generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub total_generated: usize,
    pub valid_samples: usize,
    pub rejected_samples: usize,
}

impl GenerationStats {
    /// Fraction of attempts that produced a valid sample, 0.0 before any
    /// attempt.
    pub fn success_rate(&self) -> f64 {
        if self.total_generated == 0 {
            0.0
        } else {
            self.valid_samples as f64 / self.total_generated as f64
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub stats: GenerationStats,
    pub epochs: u64,
    pub elapsed: Duration,
}

impl GenerationReport {
    pub fn avg_time_per_sample(&self) -> Duration {
        match u32::try_from(self.stats.valid_samples) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.elapsed / n,
        }
    }
}

/// Build the file name for one sample.
///
/// Speaker ids are cut to 10 characters and emotions to 4, so names stay
/// short; the in-batch `index` keeps names unique within one millisecond.
pub fn sample_filename(timestamp_ms: u128, index: usize, sample: &SampleConfig) -> String {
    let speaker: String = match &sample.speaker {
        Some(speaker) => speaker.chars().take(10).collect(),
        None => "nospeaker".to_string(),
    };
    let emotion: String = sample.emotion.as_str().chars().take(4).collect();
    format!(
        "{FILE_PREFIX}_{timestamp_ms}_{index}_{speaker}_{emotion}_spd{:.1}_pit{:+}.wav",
        sample.speed, sample.pitch_shift
    )
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Drives a [`Synthesizer`] until enough valid wake-word clips exist.
pub struct DatasetGenerator<S> {
    config: GeneratorConfig,
    synthesizer: S,
    sampler: ConfigSampler,
    stats: GenerationStats,
}

impl<S: Synthesizer> DatasetGenerator<S> {
    /// Create the output directory and seed the sampler with the
    /// synthesizer's speaker list.
    pub fn new(config: GeneratorConfig, synthesizer: S) -> Result<Self, GeneratorError> {
        fs::create_dir_all(&config.output_dir)?;

        let speakers = synthesizer.list_speakers();
        log::info!("Available speakers: {}", speakers.len());
        let sampler = ConfigSampler::new(speakers, config.random_seed);

        Ok(Self {
            config,
            synthesizer,
            sampler,
            stats: GenerationStats::default(),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats
    }

    pub fn speakers(&self) -> &[String] {
        self.sampler.speakers()
    }

    pub fn generate_sample_config(&mut self) -> SampleConfig {
        self.sampler.draw()
    }

    /// Synthesize, transform and (if its duration fits) write one sample.
    ///
    /// Never fails: errors are logged, any partial file at `output_path` is
    /// removed and the attempt is reported as [`SampleOutcome::Failed`].
    pub fn generate_single_audio(
        &mut self,
        text: &str,
        sample: &SampleConfig,
        output_path: &Path,
    ) -> SampleOutcome {
        match self.try_generate_single_audio(text, sample, output_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Error generating audio: {e}");
                if output_path.exists() {
                    if let Err(e) = fs::remove_file(output_path) {
                        log::warn!(
                            "Could not remove partial file {}: {e}",
                            output_path.display()
                        );
                    }
                }
                SampleOutcome::Failed
            }
        }
    }

    fn try_generate_single_audio(
        &mut self,
        text: &str,
        sample: &SampleConfig,
        output_path: &Path,
    ) -> Result<SampleOutcome, GeneratorError> {
        let waveform = self
            .synthesizer
            .synthesize(text, sample.speaker.as_deref())
            .map_err(|e| GeneratorError::Synthesis(e.to_string()))?;
        if waveform.sample_rate != SAMPLE_RATE {
            return Err(GeneratorError::UnexpectedSampleRate {
                found: waveform.sample_rate,
                expected: SAMPLE_RATE,
            });
        }

        // speed first: it changes the sample count the duration check sees
        let audio = change_speed(waveform.samples, sample.speed);
        let audio = change_pitch(audio, SAMPLE_RATE, sample.pitch_shift);
        let audio = add_emotion_simulation(audio, sample.emotion);

        let duration = audio.len() as f64 / SAMPLE_RATE as f64;
        if !(self.config.min_duration..=self.config.max_duration).contains(&duration) {
            return Ok(SampleOutcome::Rejected { duration });
        }

        write_pcm16(output_path, &audio, SAMPLE_RATE)?;
        Ok(SampleOutcome::Accepted { duration })
    }

    /// Attempt `batch_size` samples and fold the results into the running
    /// stats. Returns the number of valid samples produced.
    pub fn generate_batch(&mut self, batch_num: u64, batch_size: usize) -> usize {
        log::info!("{}", "=".repeat(BANNER_WIDTH));
        log::info!("BATCH {batch_num}: Generating {batch_size} samples...");
        log::info!("{}", "=".repeat(BANNER_WIDTH));

        let mut batch_valid = 0;
        let mut batch_rejected = 0;
        let text = self.config.wake_word.clone();

        for i in 0..batch_size {
            let sample = self.generate_sample_config();
            let filename = sample_filename(epoch_millis(), i, &sample);
            let output_path = self.config.output_dir.join(filename);

            match self.generate_single_audio(&text, &sample, &output_path) {
                SampleOutcome::Accepted { duration } => {
                    batch_valid += 1;
                    log::info!(
                        "  + Sample {}: speaker={} emotion={} speed={:.1} pitch={:+} ({duration:.2}s)",
                        i + 1,
                        sample
                            .speaker
                            .as_deref()
                            .map(|s| s.chars().take(15).collect::<String>())
                            .unwrap_or_else(|| "none".to_string()),
                        sample.emotion,
                        sample.speed,
                        sample.pitch_shift,
                    );
                }
                SampleOutcome::Rejected { duration } => {
                    batch_rejected += 1;
                    log::info!("  - Sample {}: Duration out of range (rejected)", i + 1);
                    log::debug!(
                        "    {duration:.3}s outside {}s - {}s",
                        self.config.min_duration,
                        self.config.max_duration
                    );
                }
                SampleOutcome::Failed => {
                    batch_rejected += 1;
                    log::info!("  - Sample {}: Generation failed (rejected)", i + 1);
                }
            }
        }

        self.stats.valid_samples += batch_valid;
        self.stats.rejected_samples += batch_rejected;
        self.stats.total_generated += batch_size;

        log::info!("Batch {batch_num} Complete:");
        log::info!("  Valid: {batch_valid}, Rejected: {batch_rejected}");
        log::info!(
            "  Total Valid So Far: {}/{}",
            self.stats.valid_samples,
            self.config.target_samples
        );

        batch_valid
    }

    /// Generate batches until `target_samples` valid clips have been written.
    ///
    /// Without `max_epochs` this keeps going for as long as it takes.
    pub fn generate_dataset(&mut self) -> Result<GenerationReport, GeneratorError> {
        self.log_banner();

        let target = self.config.target_samples;
        let mut epoch = 0u64;
        let start = Instant::now();

        while self.stats.valid_samples < target {
            if let Some(max_epochs) = self.config.max_epochs {
                if epoch >= max_epochs {
                    return Err(GeneratorError::EpochLimitReached {
                        epochs: epoch,
                        valid: self.stats.valid_samples,
                        target,
                    });
                }
            }
            epoch += 1;

            let remaining = target - self.stats.valid_samples;
            let batch_size = self.config.batch_size.min(remaining);

            log::info!("--- EPOCH {epoch} ---");
            log::info!("Remaining samples needed: {remaining}");

            self.generate_batch(epoch, batch_size);
        }

        let report = GenerationReport {
            stats: self.stats,
            epochs: epoch,
            elapsed: start.elapsed(),
        };
        self.log_summary(&report);
        Ok(report)
    }

    fn log_banner(&self) {
        let rule = "=".repeat(BANNER_WIDTH);
        log::info!("{rule}");
        log::info!("WAKE WORD DATASET GENERATOR");
        log::info!("{rule}");
        log::info!("Target Samples: {}", self.config.target_samples);
        log::info!("Text: '{}'", self.config.wake_word);
        log::info!(
            "Duration Range: {}s - {}s",
            self.config.min_duration,
            self.config.max_duration
        );
        log::info!("Output Directory: {}", self.config.output_dir.display());
        log::info!("Batch Size: {}", self.config.batch_size);
        log::info!("Device: {}", self.config.device.as_str().to_uppercase());
        log::info!("Available Speakers: {}", self.speakers().len());
        if let Some(max_epochs) = self.config.max_epochs {
            log::info!("Max Epochs: {max_epochs}");
        }
        log::info!("{rule}");

        match self.config.device {
            Device::Cpu => log::info!("CPU Mode: Estimated time ~2-5 hours for 600 samples"),
            Device::Cuda => log::info!("GPU Mode: Estimated time ~15-30 minutes for 600 samples"),
        }
    }

    fn log_summary(&self, report: &GenerationReport) {
        let rule = "=".repeat(BANNER_WIDTH);
        let output_dir = fs::canonicalize(&self.config.output_dir)
            .unwrap_or_else(|_| self.config.output_dir.clone());

        log::info!("{rule}");
        log::info!("DATASET GENERATION COMPLETE!");
        log::info!("{rule}");
        log::info!("Total Valid Samples: {}", report.stats.valid_samples);
        log::info!("Total Rejected: {}", report.stats.rejected_samples);
        log::info!("Total Generated: {}", report.stats.total_generated);
        log::info!("Success Rate: {:.1}%", report.stats.success_rate() * 100.0);
        log::info!("Time Elapsed: {:.1}s", report.elapsed.as_secs_f64());
        log::info!(
            "Avg Time per Sample: {:.2}s",
            report.avg_time_per_sample().as_secs_f64()
        );
        log::info!("Output Directory: {}", output_dir.display());
        log::info!("{rule}");
    }
}
