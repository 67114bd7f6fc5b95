use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::model::VitsError;

/// Beginning-of-utterance, end-of-utterance and padding symbols.
pub const BOS: char = '^';
pub const EOS: char = '$';
pub const PAD: char = '_';

/// Model description shipped next to a VITS ONNX export.
///
/// Only the fields synthesis needs are read; unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub audio: AudioConfig,
    #[serde(default)]
    pub espeak: EspeakVoice,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default = "default_num_speakers")]
    pub num_speakers: usize,
    #[serde(default)]
    pub speaker_id_map: HashMap<String, i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakVoice {
    pub voice: String,
}

impl Default for EspeakVoice {
    fn default() -> Self {
        Self {
            voice: "en-us".to_string(),
        }
    }
}

/// Noise and length scales fed to the model's `scales` input.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    #[serde(default = "default_length_scale")]
    pub length_scale: f32,
    #[serde(default = "default_noise_w")]
    pub noise_w: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            noise_scale: default_noise_scale(),
            length_scale: default_length_scale(),
            noise_w: default_noise_w(),
        }
    }
}

fn default_num_speakers() -> usize {
    1
}

fn default_noise_scale() -> f32 {
    0.667
}

fn default_length_scale() -> f32 {
    1.0
}

fn default_noise_w() -> f32 {
    0.8
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self, VitsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, VitsError> {
        let config: ModelConfig = serde_json::from_str(content)
            .map_err(|e| VitsError::Config(format!("Failed to parse JSON: {e}")))?;

        for symbol in [BOS, EOS, PAD] {
            if !config.phoneme_id_map.contains_key(&symbol.to_string()) {
                return Err(VitsError::Config(format!(
                    "phoneme_id_map is missing the {symbol:?} symbol"
                )));
            }
        }
        Ok(config)
    }

    /// Phoneme map keyed by character. Multi-character keys cannot come out
    /// of the phonemizer and are dropped.
    pub fn phoneme_ids(&self) -> HashMap<char, Vec<i64>> {
        let mut map = HashMap::with_capacity(self.phoneme_id_map.len());
        for (key, ids) in &self.phoneme_id_map {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => {
                    map.insert(ch, ids.clone());
                }
                _ => log::debug!("Skipping multi-character phoneme key {key:?}"),
            }
        }
        map
    }

    /// Speaker names ordered by their model id.
    ///
    /// Models that declare several speakers without naming them get their
    /// numeric ids as names.
    pub fn speakers(&self) -> Vec<(String, i64)> {
        let unnamed = self.speaker_id_map.is_empty() && self.num_speakers > 1;
        let mut speakers: Vec<(String, i64)> = if unnamed {
            (0..self.num_speakers as i64)
                .map(|id| (id.to_string(), id))
                .collect()
        } else {
            self.speaker_id_map
                .iter()
                .map(|(name, &id)| (name.clone(), id))
                .collect()
        };
        speakers.sort_by_key(|(_, id)| *id);
        speakers
    }

    pub fn is_multi_speaker(&self) -> bool {
        self.num_speakers > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VCTK_LIKE: &str = r#"{
        "audio": {"sample_rate": 22050, "quality": "medium"},
        "espeak": {"voice": "en-gb-x-rp"},
        "inference": {"noise_scale": 0.5, "length_scale": 1.1, "noise_w": 0.7},
        "phoneme_type": "espeak",
        "phoneme_id_map": {"_": [0], "^": [1], "$": [2], " ": [3], "h": [20], "ə": [59], "ˈ": [120], "tʃ": [200]},
        "num_symbols": 256,
        "num_speakers": 3,
        "speaker_id_map": {"p240": 2, "p239": 0, "p236": 1}
    }"#;

    #[test]
    fn parses_multi_speaker_config() {
        let config = ModelConfig::from_json(VCTK_LIKE).unwrap();
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.espeak.voice, "en-gb-x-rp");
        assert_eq!(config.inference.length_scale, 1.1);
        assert!(config.is_multi_speaker());

        let names: Vec<String> = config.speakers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["p239", "p236", "p240"]);
    }

    #[test]
    fn drops_multi_char_phoneme_keys() {
        let config = ModelConfig::from_json(VCTK_LIKE).unwrap();
        let ids = config.phoneme_ids();
        assert_eq!(ids.get(&'ə'), Some(&vec![59]));
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn single_speaker_defaults() {
        let config = ModelConfig::from_json(
            r#"{"audio": {"sample_rate": 16000}, "phoneme_id_map": {"_": [0], "^": [1], "$": [2]}}"#,
        )
        .unwrap();
        assert!(!config.is_multi_speaker());
        assert!(config.speakers().is_empty());
        assert_eq!(config.espeak.voice, "en-us");
        assert_eq!(config.inference.noise_scale, 0.667);
    }

    #[test]
    fn unnamed_speakers_use_ids() {
        let config = ModelConfig::from_json(
            r#"{"audio": {"sample_rate": 22050}, "num_speakers": 2,
                "phoneme_id_map": {"_": [0], "^": [1], "$": [2]}}"#,
        )
        .unwrap();
        assert_eq!(
            config.speakers(),
            vec![("0".to_string(), 0), ("1".to_string(), 1)]
        );
    }

    #[test]
    fn requires_control_symbols() {
        let err = ModelConfig::from_json(
            r#"{"audio": {"sample_rate": 22050}, "phoneme_id_map": {"_": [0]}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'^'"));
    }
}
