use crate::domain::MusicalityLevel;

const FRAME_LEN: usize = 1024;
/// Candidate tonal/harmonic bins probed with a Goertzel filter — low and
/// lower-mid frequencies where sustained background music tends to carry
/// energy (spec.md §4.4 step 1: "spectral-centroid stability").
const TONAL_PROBE_HZ: [f64; 2] = [110.0, 220.0];

/// Evaluates a single Goertzel bin's magnitude for one frame without
/// requiring a full FFT — cheap enough to run per frame, and avoids pulling
/// in an FFT dependency the rest of the stack doesn't otherwise need.
fn goertzel_magnitude(frame: &[f64], sample_rate: f64, target_hz: f64) -> f64 {
    let n = frame.len() as f64;
    let k = (0.5 + n * target_hz / sample_rate).floor();
    let w = 2.0 * std::f64::consts::PI * k / n;
    let coeff = 2.0 * w.cos();
    let (mut q1, mut q2) = (0.0_f64, 0.0_f64);
    for &x in frame {
        let q0 = coeff * q1 - q2 + x;
        q2 = q1;
        q1 = q0;
    }
    (q1 * q1 + q2 * q2 - q1 * q2 * coeff).sqrt()
}

fn zero_crossing_rate(frame: &[i16]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame.windows(2).filter(|w| (w[0] >= 0) != (w[1] >= 0)).count();
    crossings as f64 / (frame.len() - 1) as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Spectral pre-judgment (spec.md §4.4 step 1): analyzes raw PCM samples on
/// CPU and returns a musicality level plus a `should_separate` hint. Low
/// zero-crossing-rate variance combined with a stable tonal-bin magnitude
/// across frames indicates sustained harmonic background (music); high,
/// noisy variance indicates speech-dominated or silent audio.
pub fn analyze(samples: &[i16], sample_rate: u32, light_threshold: f64, heavy_threshold: f64) -> (MusicalityLevel, bool) {
    if samples.len() < FRAME_LEN * 2 {
        return (MusicalityLevel::None, false);
    }

    let frames: Vec<&[i16]> = samples.chunks(FRAME_LEN).filter(|f| f.len() == FRAME_LEN).collect();
    if frames.is_empty() {
        return (MusicalityLevel::None, false);
    }

    let zcrs: Vec<f64> = frames.iter().map(|f| zero_crossing_rate(f)).collect();
    let zcr_variance = variance(&zcrs);
    // Normalize: ZCR variance above ~0.01 is "noisy/unstable", treat as 1.0.
    let zcr_instability = (zcr_variance / 0.01).min(1.0);

    let float_frames: Vec<Vec<f64>> =
        frames.iter().map(|f| f.iter().map(|&s| s as f64 / i16::MAX as f64).collect()).collect();
    let tonal_energy: Vec<f64> = float_frames
        .iter()
        .map(|frame| {
            TONAL_PROBE_HZ.iter().map(|&hz| goertzel_magnitude(frame, sample_rate as f64, hz)).sum::<f64>()
        })
        .collect();
    let mean_energy = tonal_energy.iter().sum::<f64>() / tonal_energy.len() as f64;
    let energy_variance = variance(&tonal_energy);
    let relative_instability = if mean_energy > f64::EPSILON {
        (energy_variance.sqrt() / mean_energy).min(1.0)
    } else {
        1.0
    };

    // High stability (low relative variance) + low ZCR instability => likely
    // sustained tonal background; score climbs toward 1.0 for "heavy".
    let stability_score = (1.0 - relative_instability).clamp(0.0, 1.0);
    let zcr_score = (1.0 - zcr_instability).clamp(0.0, 1.0);
    let has_energy = mean_energy > 0.02;
    let score = if has_energy { 0.6 * stability_score + 0.4 * zcr_score } else { 0.0 };

    let level = if score >= heavy_threshold {
        MusicalityLevel::Heavy
    } else if score >= light_threshold {
        MusicalityLevel::Light
    } else {
        MusicalityLevel::None
    };
    let should_separate = level != MusicalityLevel::None;
    (level, should_separate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(len: usize) -> Vec<i16> {
        vec![0; len]
    }

    fn tone(len: usize, sample_rate: u32, hz: f64) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                ((2.0 * std::f64::consts::PI * hz * t).sin() * 20000.0) as i16
            })
            .collect()
    }

    #[test]
    fn silence_is_classified_as_no_musicality() {
        let samples = silence(FRAME_LEN * 8);
        let (level, should_separate) = analyze(&samples, 16_000, 0.35, 0.65);
        assert_eq!(level, MusicalityLevel::None);
        assert!(!should_separate);
    }

    #[test]
    fn sustained_tone_is_classified_as_musicality() {
        let samples = tone(FRAME_LEN * 8, 16_000, 110.0);
        let (level, should_separate) = analyze(&samples, 16_000, 0.35, 0.65);
        assert_ne!(level, MusicalityLevel::None);
        assert!(should_separate);
    }

    #[test]
    fn too_short_audio_is_classified_as_none() {
        let samples = silence(10);
        let (level, _) = analyze(&samples, 16_000, 0.35, 0.65);
        assert_eq!(level, MusicalityLevel::None);
    }
}
