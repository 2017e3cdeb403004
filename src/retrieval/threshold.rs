//! Adaptive similarity-threshold computation.
//!
//! The effective threshold tightens when the score distribution is wide and
//! contains high-quality matches, loosens when all scores are middling and
//! tight, and always lands inside `[T_min, T_high]`.

use crate::config::ThresholdConfig;

/// Compute the effective threshold from the caller's base threshold and all
/// observed semantic scores.
pub fn effective_threshold(base: f32, scores: &[f32], config: &ThresholdConfig) -> f32 {
    let t_min = config.min_similarity_threshold;
    let t_med = config.medium_similarity_threshold;
    let t_high = config.high_similarity_threshold;

    if !config.adaptive_threshold {
        return base.clamp(t_min, t_high);
    }

    let mut threshold = base;

    if scores.len() >= 2 {
        let max = scores.iter().copied().fold(f32::MIN, f32::max);
        let min = scores.iter().copied().fold(f32::MAX, f32::min);
        let range = max - min;
        let mean = scores.iter().sum::<f32>() / scores.len() as f32;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / scores.len() as f32;
        let std_dev = variance.sqrt();

        if range > 0.4 && max > t_high {
            // Wide spread with genuinely good options: be selective.
            threshold = threshold.max(mean + std_dev * 0.5);
        } else if range < 0.2 {
            // Tight spread: be lenient so middling clusters still surface.
            threshold = threshold.min(mean - std_dev * 0.5);
        }
    }

    if let Some(max) = scores.iter().copied().reduce(f32::max) {
        if max > t_high {
            threshold = threshold.max(t_med);
        }
        if max < t_min {
            threshold = threshold.min(t_min);
        }
    }

    threshold.clamp(t_min, t_high)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ThresholdConfig {
        ThresholdConfig {
            min_similarity_threshold: 0.2,
            medium_similarity_threshold: 0.5,
            high_similarity_threshold: 0.8,
            adaptive_threshold: true,
            min_results_required: 1,
        }
    }

    #[test]
    fn tightens_on_wide_high_quality_distribution() {
        let scores = [0.92, 0.85, 0.80, 0.30, 0.25];
        let threshold = effective_threshold(0.3, &scores, &config());

        // mean = 0.624, population sigma ~ 0.288 -> mean + sigma/2 ~ 0.768
        assert!((threshold - 0.768).abs() < 0.005, "got {}", threshold);
        // Exactly the three top candidates survive this threshold.
        let survivors = scores.iter().filter(|s| **s >= threshold).count();
        assert_eq!(survivors, 3);
    }

    #[test]
    fn loosens_on_tight_distribution() {
        let scores = [0.45, 0.42, 0.40, 0.38];
        let threshold = effective_threshold(0.5, &scores, &config());
        assert!(threshold < 0.5);
        assert!(threshold >= 0.2);
    }

    #[test]
    fn high_max_raises_floor_to_medium() {
        let scores = [0.85, 0.83];
        let threshold = effective_threshold(0.1, &scores, &config());
        assert!(threshold >= 0.5);
    }

    #[test]
    fn weak_pool_drops_to_minimum() {
        let scores = [0.15, 0.12, 0.10];
        let threshold = effective_threshold(0.4, &scores, &config());
        assert_eq!(threshold, 0.2);
    }

    #[test]
    fn always_within_bounds() {
        let cases: [(f32, &[f32]); 4] = [
            (0.9, &[0.95, 0.1]),
            (0.0, &[]),
            (1.0, &[0.5]),
            (0.3, &[0.92, 0.85, 0.80, 0.30, 0.25]),
        ];
        for (base, scores) in cases {
            let threshold = effective_threshold(base, scores, &config());
            assert!((0.2..=0.8).contains(&threshold), "{} out of bounds", threshold);
        }
    }

    #[test]
    fn non_adaptive_clamps_base_only() {
        let mut config = config();
        config.adaptive_threshold = false;
        assert_eq!(effective_threshold(0.9, &[0.1, 0.2], &config), 0.8);
        assert_eq!(effective_threshold(0.45, &[0.95, 0.1], &config), 0.45);
    }

    #[test]
    fn single_score_skips_distribution_rules() {
        let threshold = effective_threshold(0.3, &[0.9], &config());
        // Only the max-based floor applies: raised to T_med.
        assert_eq!(threshold, 0.5);
    }
}
