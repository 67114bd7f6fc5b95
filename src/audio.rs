//! Post-synthesis audio transforms.
//!
//! All functions take ownership of the signal and hand back the transformed
//! one; identity settings return the input buffer untouched.

use std::f64::consts::PI;

use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

use crate::sampler::Emotion;
use crate::SAMPLE_RATE;

/// Peak level every clip is normalized to after emotion simulation.
pub const NORMALIZED_PEAK: f32 = 0.95;

/// Tremolo rate (Hz) and depth used for [`Emotion::Fearful`].
const TREMOLO_HZ: f64 = 5.0;
const TREMOLO_DEPTH: f64 = 0.1;

/// Time-stretch by dropping or repeating samples.
///
/// Picks sample `round(i * speed)` for every `i` with `i * speed < len`, so
/// the output holds roughly `len / speed` samples. No anti-aliasing filter is
/// applied. A speed of exactly 1.0 (or a non-positive or non-finite one) is
/// a no-op.
pub fn change_speed(audio: Vec<f32>, speed: f64) -> Vec<f32> {
    if speed == 1.0 || speed <= 0.0 || !speed.is_finite() {
        return audio;
    }

    let len = audio.len();
    (0usize..)
        .map(|i| i as f64 * speed)
        .take_while(|&pos| pos < len as f64)
        .map(|pos| pos.round_ties_even() as usize)
        .filter(|&idx| idx < len)
        .map(|idx| audio[idx])
        .collect()
}

/// Shift pitch by `n_steps` semitones while keeping the duration.
///
/// The signal is resampled down to `len / 2^(n_steps/12)` samples and then
/// back up to its original length.
pub fn change_pitch(audio: Vec<f32>, _sample_rate: u32, n_steps: i32) -> Vec<f32> {
    if n_steps == 0 || audio.is_empty() {
        return audio;
    }

    let ratio = 2f64.powf(n_steps as f64 / 12.0);
    let shifted_len = (audio.len() as f64 / ratio) as usize;
    if shifted_len == 0 {
        return audio;
    }

    let shifted = resample(&audio, shifted_len);
    resample(&shifted, audio.len())
}

/// Apply a crude emotional colouring, then peak-normalize to
/// [`NORMALIZED_PEAK`].
///
/// A silent signal comes back unchanged.
pub fn add_emotion_simulation(mut audio: Vec<f32>, emotion: Emotion) -> Vec<f32> {
    match emotion {
        Emotion::Happy | Emotion::Excited => scale(&mut audio, 1.1),
        Emotion::Sad | Emotion::Calm => scale(&mut audio, 0.9),
        Emotion::Angry => scale(&mut audio, 1.2),
        Emotion::Fearful => {
            for (i, sample) in audio.iter_mut().enumerate() {
                let phase = 2.0 * PI * TREMOLO_HZ * i as f64 / SAMPLE_RATE as f64;
                *sample *= (1.0 + TREMOLO_DEPTH * phase.sin()) as f32;
            }
        }
        Emotion::Neutral | Emotion::Surprised | Emotion::Disgusted => {}
    }

    let peak = peak_amplitude(&audio) as f64;
    if peak > 0.0 {
        // in f64: NORMALIZED_PEAK / peak overflows f32 for subnormal peaks
        for sample in audio.iter_mut() {
            *sample = (*sample as f64 / peak * NORMALIZED_PEAK as f64) as f32;
        }
    }
    audio
}

/// Largest absolute sample value, 0.0 for an empty signal.
pub fn peak_amplitude(audio: &[f32]) -> f32 {
    audio.iter().fold(0.0f32, |peak, &s| peak.max(s.abs()))
}

fn scale(audio: &mut [f32], gain: f32) {
    for sample in audio.iter_mut() {
        *sample *= gain;
    }
}

/// Resample a real signal to exactly `num` samples using the Fourier method.
///
/// The spectrum is truncated (downsampling) or zero-padded (upsampling); for
/// an even-length overlap the Nyquist bin is folded or split so the result
/// stays real. The signal is assumed periodic, as with any FFT resampler.
pub fn resample(audio: &[f32], num: usize) -> Vec<f32> {
    let n = audio.len();
    if n == num {
        return audio.to_vec();
    }
    if n == 0 || num == 0 {
        return vec![0.0; num];
    }

    let mut planner = FftPlanner::<f32>::new();

    let mut spectrum: Vec<Complex32> = audio.iter().map(|&x| Complex32::new(x, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let overlap = n.min(num);
    let positive = overlap / 2 + 1;
    let mut out = vec![Complex32::new(0.0, 0.0); num];
    out[..positive].copy_from_slice(&spectrum[..positive]);
    for j in 1..=(overlap - positive) {
        out[num - j] = spectrum[n - j];
    }

    if overlap % 2 == 0 {
        let nyquist = overlap / 2;
        if num < n {
            out[nyquist] = spectrum[nyquist] + spectrum[n - nyquist];
        } else {
            let half = spectrum[nyquist] * 0.5;
            out[nyquist] = half;
            out[num - nyquist] = half.conj();
        }
    }

    planner.plan_fft_inverse(num).process(&mut out);

    let norm = n as f32;
    out.iter().map(|c| c.re / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (0.5 * (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin()) as f32)
            .collect()
    }

    fn zero_crossings(audio: &[f32]) -> usize {
        audio
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn speed_one_is_identity() {
        let audio = sine(220.0, 1000);
        assert_eq!(change_speed(audio.clone(), 1.0), audio);
    }

    #[test]
    fn speed_scales_length() {
        for &len in &[1000usize, 22050, 25357] {
            for &speed in &[0.8, 0.9, 1.1, 1.2, 1.5] {
                let out = change_speed(vec![0.1; len], speed);
                let expected = len as f64 / speed;
                assert!(
                    (out.len() as f64 - expected).abs() <= 1.0,
                    "len {len} speed {speed}: got {} expected {expected}",
                    out.len()
                );
            }
        }
    }

    #[test]
    fn speed_picks_rounded_indices() {
        let audio: Vec<f32> = (0..10).map(|i| i as f32).collect();
        // positions 0, 1.5, 3, 4.5, 6, 7.5, 9 round half-to-even
        assert_eq!(
            change_speed(audio, 1.5),
            vec![0.0, 2.0, 3.0, 4.0, 6.0, 8.0, 9.0]
        );
    }

    #[test]
    fn slowing_down_repeats_samples() {
        let audio: Vec<f32> = (0..4).map(|i| i as f32).collect();
        // positions 0, 0.5, 1, 1.5, 2, 2.5, 3, 3.5 -> last rounds to 4 and is dropped
        assert_eq!(
            change_speed(audio, 0.5),
            vec![0.0, 0.0, 1.0, 2.0, 2.0, 2.0, 3.0]
        );
    }

    #[test]
    fn pitch_zero_is_identity() {
        let audio = sine(440.0, 2048);
        assert_eq!(change_pitch(audio.clone(), SAMPLE_RATE, 0), audio);
    }

    #[test]
    fn pitch_keeps_length() {
        let audio = sine(300.0, 25357);
        for steps in [-3, -2, -1, 1, 2, 3] {
            let out = change_pitch(audio.clone(), SAMPLE_RATE, steps);
            assert_eq!(out.len(), audio.len(), "steps {steps}");
        }
    }

    #[test]
    fn resample_preserves_dc() {
        let audio = vec![0.25f32; 1000];
        for num in [500, 999, 1001, 2000] {
            let out = resample(&audio, num);
            assert_eq!(out.len(), num);
            assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-4), "num {num}");
        }
    }

    #[test]
    fn resample_keeps_cycle_count() {
        // 20 whole cycles in 2000 samples stay 20 cycles after resampling
        let audio: Vec<f32> = (0..2000)
            .map(|i| (2.0 * PI * 20.0 * i as f64 / 2000.0).sin() as f32)
            .collect();
        let crossings = zero_crossings(&audio);
        for num in [1000, 1500, 3000] {
            let out = resample(&audio, num);
            let diff = zero_crossings(&out) as i64 - crossings as i64;
            assert!(diff.abs() <= 2, "num {num}: {diff}");
        }
    }

    #[test]
    fn pitch_keeps_periodic_low_tones() {
        // whole cycles survive both resampling legs
        let audio = sine(200.0, 22050);
        let out = change_pitch(audio.clone(), SAMPLE_RATE, 3);
        let max_diff = audio
            .iter()
            .zip(&out)
            .fold(0.0f32, |m, (a, b)| m.max((a - b).abs()));
        assert!(max_diff < 1e-3, "{max_diff}");
    }

    #[test]
    fn pitch_up_drops_content_above_reduced_band() {
        let audio = sine(10_000.0, 22050);
        let out = change_pitch(audio, SAMPLE_RATE, 3);
        assert!(peak_amplitude(&out) < 1e-3);
    }

    #[test]
    fn emotion_normalizes_peak() {
        let audio = sine(200.0, 4000);
        for emotion in Emotion::ALL {
            let out = add_emotion_simulation(audio.clone(), emotion);
            let peak = peak_amplitude(&out);
            assert!(peak <= NORMALIZED_PEAK + 1e-6, "{emotion:?}: {peak}");
            assert!((peak - NORMALIZED_PEAK).abs() < 1e-4, "{emotion:?}: {peak}");
        }
    }

    #[test]
    fn emotion_leaves_silence_alone() {
        let silent = vec![0.0f32; 512];
        for emotion in Emotion::ALL {
            assert_eq!(add_emotion_simulation(silent.clone(), emotion), silent);
        }
    }

    #[test]
    fn emotion_output_nonzero_for_nonzero_input() {
        let mut audio = vec![0.0f32; 512];
        audio[100] = 0.01;
        for emotion in Emotion::ALL {
            let out = add_emotion_simulation(audio.clone(), emotion);
            assert!(out.iter().any(|&s| s != 0.0), "{emotion:?}");
        }
    }

    #[test]
    fn emotion_normalizes_subnormal_peak() {
        let mut audio = vec![0.0f32; 8];
        audio[3] = 1e-39;
        for emotion in Emotion::ALL {
            let out = add_emotion_simulation(audio.clone(), emotion);
            assert!(out.iter().all(|s| s.is_finite()), "{emotion:?}: {out:?}");
            let peak = peak_amplitude(&out);
            assert!(peak <= NORMALIZED_PEAK + 1e-6, "{emotion:?}: {peak}");
            assert!((peak - NORMALIZED_PEAK).abs() < 1e-4, "{emotion:?}: {peak}");
            assert_eq!(out[0], 0.0);
        }
    }

    #[test]
    fn fearful_adds_tremolo() {
        let flat = vec![0.5f32; SAMPLE_RATE as usize / 5];
        let out = add_emotion_simulation(flat, Emotion::Fearful);
        let max = peak_amplitude(&out);
        let min = out.iter().fold(f32::MAX, |m, &s| m.min(s));
        assert!((max - NORMALIZED_PEAK).abs() < 1e-4);
        assert!(min < max * 0.85);
    }
}
