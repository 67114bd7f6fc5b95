use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Speed multipliers a sample may be rendered at.
pub const SPEED_CHOICES: [f64; 5] = [0.8, 0.9, 1.0, 1.1, 1.2];

/// Pitch offsets in semitones.
pub const PITCH_SHIFT_CHOICES: [i32; 7] = [-3, -2, -1, 0, 1, 2, 3];

/// Affect simulated on top of the neutral synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Calm,
    Excited,
}

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Calm,
        Emotion::Excited,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Calm => "calm",
            Emotion::Excited => "excited",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One randomly drawn rendering recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub speaker: Option<String>,
    pub emotion: Emotion,
    pub speed: f64,
    pub pitch_shift: i32,
}

/// Draws [`SampleConfig`]s from a seeded generator.
///
/// Every field is picked independently and uniformly; consecutive draws may
/// repeat.
pub struct ConfigSampler {
    rng: StdRng,
    speakers: Vec<String>,
}

impl ConfigSampler {
    pub fn new(speakers: Vec<String>, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            speakers,
        }
    }

    pub fn speakers(&self) -> &[String] {
        &self.speakers
    }

    pub fn draw(&mut self) -> SampleConfig {
        let speaker = self.speakers.choose(&mut self.rng).cloned();
        let emotion = Emotion::ALL[self.rng.gen_range(0..Emotion::ALL.len())];
        let speed = SPEED_CHOICES[self.rng.gen_range(0..SPEED_CHOICES.len())];
        let pitch_shift = PITCH_SHIFT_CHOICES[self.rng.gen_range(0..PITCH_SHIFT_CHOICES.len())];

        SampleConfig {
            speaker,
            emotion,
            speed,
            pitch_shift,
        }
    }
}
