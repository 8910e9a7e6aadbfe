//! Tempo quantizer: derives reverb pre-delays and dynamics release times
//! from a track's tempo.
//!
//! Every value is picked from a family of note durations (straight, dotted,
//! triplet and their successive halvings) so that the effect timings land
//! on musical subdivisions of the beat.

use serde::{Deserialize, Serialize};

use crate::error::{MixError, Result};

/// Tempos at or above this are assumed to be double-time detections
const HALF_TIME_THRESHOLD: f64 = 100.0;

/// Number of halvings appended to a note family's seed triad
const HALVING_STEPS: usize = 15;

// ============================================================================
// Tempo
// ============================================================================

/// A validated tempo in beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate(f64);

impl TempoEstimate {
    pub fn new(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(MixError::InvalidTempo(bpm));
        }
        Ok(Self(bpm))
    }

    /// Build from a beat tracker's raw output, dropping the fractional part
    pub fn from_detected(raw_bpm: f64) -> Result<Self> {
        Self::new(raw_bpm.trunc())
    }

    pub fn bpm(&self) -> f64 {
        self.0
    }

    /// Tempo after the half-time correction
    pub fn corrected_bpm(&self) -> f64 {
        corrected_bpm(self.0)
    }

    /// Milliseconds per (corrected) beat
    pub fn basic_time(&self) -> f64 {
        60_000.0 / self.corrected_bpm()
    }
}

fn corrected_bpm(bpm: f64) -> f64 {
    if bpm >= HALF_TIME_THRESHOLD { bpm / 2.0 } else { bpm }
}

/// Milliseconds per beat for `bpm`, halving fast tempos first.
///
/// # Example
/// ```
/// use autospark_core::compute_basic_time;
/// assert_eq!(compute_basic_time(120.0).unwrap(), 1000.0);
/// assert_eq!(compute_basic_time(80.0).unwrap(), 750.0);
/// ```
pub fn compute_basic_time(bpm: f64) -> Result<f64> {
    Ok(TempoEstimate::new(bpm)?.basic_time())
}

// ============================================================================
// Note families
// ============================================================================

/// How the seed of a note family is derived from the basic time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteMode {
    /// seed = basic_time * rate
    Multiply,
    /// seed = basic_time / rate
    Divide,
}

/// Generate the candidate durations (ms) for one seed note value.
///
/// The list starts as `[seed, seed * 1.5, seed * 2/3]` and then grows by
/// halving whatever element sits at the visiting index, including elements
/// appended earlier in the same pass. Exactly 15 halvings are appended, so
/// the result always holds 18 values, sorted ascending.
pub fn build_note_family(basic_time: f64, rate: f64, mode: NoteMode) -> Vec<f64> {
    let seed = match mode {
        NoteMode::Multiply => basic_time * rate,
        NoteMode::Divide => basic_time / rate,
    };
    let dotted = seed * 1.5;
    let triplet = seed * 2.0 / 3.0;

    let mut family = Vec::with_capacity(3 + HALVING_STEPS);
    family.extend([seed, dotted, triplet]);

    // Index walk over a growing vector: appended halvings get halved again
    let mut index = 0;
    let mut appended = 0;
    while index < family.len() {
        let half = family[index] / 2.0;
        family.push(half);
        appended += 1;
        if appended >= HALVING_STEPS {
            break;
        }
        index += 1;
    }

    family.sort_by(|a, b| a.total_cmp(b));
    family
}

/// Round to a fixed number of decimal places (half away from zero)
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// ============================================================================
// Band selection
// ============================================================================

/// Selection rule for picking one value out of a note family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBand {
    /// Preferred duration (ms)
    pub target: f64,
    /// If every candidate is at or above this, fall back to `target`
    pub range_threshold: f64,
    /// Double whatever value is chosen
    pub double_mode: bool,
}

impl TimeBand {
    pub const fn new(target: f64, range_threshold: f64, double_mode: bool) -> Self {
        Self { target, range_threshold, double_mode }
    }

    pub fn select(&self, candidates: &[f64]) -> f64 {
        select_time(candidates, self.target, self.range_threshold, self.double_mode)
    }
}

/// Pick the candidate closest to `target`, or `target` itself when every
/// candidate is at or above `range_threshold`. Ties keep the first candidate
/// seen. An empty candidate list falls back to `target`.
pub fn select_time(candidates: &[f64], target: f64, range_threshold: f64, double_mode: bool) -> f64 {
    let factor = if double_mode { 2.0 } else { 1.0 };

    if candidates.iter().all(|&c| c >= range_threshold) {
        return target * factor;
    }

    let mut closest = target;
    let mut min_diff = f64::INFINITY;
    for &candidate in candidates {
        let diff = (candidate - target).abs();
        if diff < min_diff {
            min_diff = diff;
            closest = candidate;
        }
    }
    closest * factor
}

// ============================================================================
// Pre-delay and release sets
// ============================================================================

/// Reverb pre-delays (ms) for the four simulated spaces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreDelaySet {
    pub room_er: f64,
    pub room_lr: f64,
    pub plate: f64,
    pub hall: f64,
}

/// Dynamics release times (ms)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSet {
    pub fast: f64,
    pub medium: f64,
    pub slow: f64,
    pub limiter: f64,
}

const PRE_DELAY_BANDS: [TimeBand; 4] = [
    TimeBand::new(0.6, 1.0, true),
    TimeBand::new(2.0, 4.0, true),
    TimeBand::new(10.0, 20.0, true),
    TimeBand::new(20.0, 40.0, true),
];

const RELEASE_BANDS: [TimeBand; 4] = [
    TimeBand::new(100.0, 200.0, false),
    TimeBand::new(350.0, 500.0, false),
    TimeBand::new(500.0, 1000.0, false),
    TimeBand::new(450.0, 800.0, false),
];

/// Pre-delays from 1/8-beat note values, rounded to 0.01 ms
pub fn derive_pre_delay(basic_time: f64) -> PreDelaySet {
    let candidates: Vec<f64> = build_note_family(basic_time, 8.0, NoteMode::Divide)
        .into_iter()
        .map(|t| round_to(t, 2))
        .collect();
    let [room_er, room_lr, plate, hall] = PRE_DELAY_BANDS.map(|band| band.select(&candidates));
    PreDelaySet { room_er, room_lr, plate, hall }
}

/// Releases from two-beat note values, rounded to 0.1 ms
pub fn derive_release(basic_time: f64) -> ReleaseSet {
    let candidates: Vec<f64> = build_note_family(basic_time, 2.0, NoteMode::Multiply)
        .into_iter()
        .map(|t| round_to(t, 1))
        .collect();
    let [fast, medium, slow, limiter] = RELEASE_BANDS.map(|band| band.select(&candidates));
    ReleaseSet { fast, medium, slow, limiter }
}

/// All tempo-derived timing for one track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingProfile {
    pub tempo: TempoEstimate,
    /// Milliseconds per corrected beat
    pub basic_time: f64,
    pub pre_delay: PreDelaySet,
    pub release: ReleaseSet,
}

impl TimingProfile {
    pub fn new(tempo: TempoEstimate) -> Self {
        let basic_time = tempo.basic_time();
        Self {
            tempo,
            basic_time,
            pre_delay: derive_pre_delay(basic_time),
            release: derive_release(basic_time),
        }
    }

    pub fn from_bpm(bpm: f64) -> Result<Self> {
        Ok(Self::new(TempoEstimate::new(bpm)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_basic_time_half_time_correction() {
        assert_eq!(compute_basic_time(120.0).unwrap(), 1000.0);
        assert_eq!(compute_basic_time(100.0).unwrap(), 1200.0);
        assert_eq!(compute_basic_time(99.0).unwrap(), 60_000.0 / 99.0);
        assert_eq!(compute_basic_time(128.0).unwrap(), 937.5);
    }

    #[test]
    fn test_basic_time_rejects_bad_tempo() {
        assert!(matches!(compute_basic_time(0.0), Err(MixError::InvalidTempo(_))));
        assert!(matches!(compute_basic_time(-90.0), Err(MixError::InvalidTempo(_))));
        assert!(compute_basic_time(f64::NAN).is_err());
        assert!(compute_basic_time(f64::INFINITY).is_err());
    }

    #[test]
    fn test_basic_time_decreases_with_corrected_bpm() {
        let mut last = f64::INFINITY;
        for corrected in 30..100 {
            let bt = compute_basic_time(corrected as f64).unwrap();
            assert!(bt < last, "basic time should fall as tempo rises ({corrected} BPM)");
            last = bt;
        }
    }

    #[test]
    fn test_detected_tempo_is_truncated() {
        let tempo = TempoEstimate::from_detected(129.2).unwrap();
        assert_eq!(tempo.bpm(), 129.0);
        assert_eq!(tempo.corrected_bpm(), 64.5);
        assert!(TempoEstimate::from_detected(0.7).is_err());
    }

    #[test]
    fn test_note_family_has_eighteen_sorted_values() {
        for &(bt, rate, mode) in &[
            (1000.0, 8.0, NoteMode::Divide),
            (1000.0, 2.0, NoteMode::Multiply),
            (937.5, 8.0, NoteMode::Divide),
            (1333.3, 2.0, NoteMode::Multiply),
        ] {
            let family = build_note_family(bt, rate, mode);
            assert_eq!(family.len(), 18);
            assert!(family.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_note_family_contains_seed_triad() {
        let family = build_note_family(1000.0, 8.0, NoteMode::Divide);
        let seed = 125.0;
        for expected in [seed, seed * 1.5, seed * 2.0 / 3.0] {
            assert!(family.iter().any(|&v| approx(v, expected)), "missing {expected}");
        }
    }

    #[test]
    fn test_note_family_halves_appended_values() {
        // Visiting index 3 halves the first appended value (seed / 2),
        // so seed / 4 must be present even though only the triad is seeded.
        let family = build_note_family(1000.0, 2.0, NoteMode::Multiply);
        assert!(family.iter().any(|&v| approx(v, 500.0)));
        assert!(family.iter().any(|&v| approx(v, 250.0)));
        // 15th halving is of index 14, i.e. (2000 * 2/3) / 32
        assert!(family.iter().any(|&v| approx(v, 2000.0 * 2.0 / 3.0 / 32.0)));
        // index 15 is never visited
        assert!(!family.iter().any(|&v| approx(v, 2000.0 / 64.0)));
    }

    #[test]
    fn test_select_time_falls_back_when_all_too_slow() {
        let candidates = [5.0, 10.0, 20.0];
        assert_eq!(select_time(&candidates, 0.6, 1.0, true), 1.2);
        assert_eq!(select_time(&candidates, 0.6, 1.0, false), 0.6);
        assert_eq!(select_time(&candidates, 3.0, 5.0, false), 3.0);
    }

    #[test]
    fn test_select_time_picks_nearest_candidate() {
        let candidates = [2.6, 5.21, 10.42, 20.83];
        assert_eq!(select_time(&candidates, 10.0, 20.0, true), 20.84);
        assert_eq!(select_time(&candidates, 10.0, 20.0, false), 10.42);
        let chosen = select_time(&candidates, 6.0, 20.0, false);
        assert!(candidates.contains(&chosen));
        assert!(candidates.iter().all(|c| (c - 6.0).abs() >= (chosen - 6.0).abs()));
    }

    #[test]
    fn test_select_time_first_seen_wins_ties() {
        let candidates = [90.0, 110.0];
        assert_eq!(select_time(&candidates, 100.0, 200.0, false), 90.0);
    }

    #[test]
    fn test_select_time_empty_falls_back() {
        assert_eq!(select_time(&[], 20.0, 40.0, true), 40.0);
    }

    #[test]
    fn test_profile_at_120_bpm() {
        let profile = TimingProfile::from_bpm(120.0).unwrap();
        assert_eq!(profile.basic_time, 1000.0);

        let pd = profile.pre_delay;
        assert!(approx(pd.room_er, 1.2));
        assert!(approx(pd.room_lr, 5.2));
        assert!(approx(pd.plate, 20.84));
        assert!(approx(pd.hall, 41.66));
        for v in [pd.room_er, pd.room_lr, pd.plate, pd.hall] {
            assert!(v > 0.0 && v < 100.0, "pre-delay {v} out of range");
        }

        let rel = profile.release;
        assert!(approx(rel.fast, 93.8));
        assert!(approx(rel.medium, 333.3));
        assert!(approx(rel.slow, 500.0));
        assert!(approx(rel.limiter, 500.0));
        for v in [rel.fast, rel.medium, rel.slow, rel.limiter] {
            assert!((19.0..=2000.0).contains(&v), "release {v} out of range");
        }
    }

    #[test]
    fn test_profile_at_128_bpm() {
        let profile = TimingProfile::from_bpm(128.0).unwrap();
        assert_eq!(profile.basic_time, 937.5);
        assert_eq!(profile.tempo.corrected_bpm(), 64.0);
        let rel = profile.release;
        for v in [rel.fast, rel.medium, rel.slow, rel.limiter] {
            assert!((19.0..=2000.0).contains(&v));
        }
    }
}
