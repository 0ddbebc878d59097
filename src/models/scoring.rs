//! Score post-processing: softmax, argmax and ranking

/// Denominators at or below this are treated as zero
pub const SCORE_EPSILON: f32 = 1e-10;

/// Numerically stable softmax, in place.
///
/// The maximum is seeded with `scores[0]` and updated with a strict `>`, so a
/// NaN anywhere in the vector poisons every output. If the exponential sum is
/// at or below [`SCORE_EPSILON`] the scores are left untouched.
pub fn softmax_in_place(scores: &mut [f32]) {
    let Some(&first) = scores.first() else {
        return;
    };

    let mut max = first;
    for &s in &scores[1..] {
        if s > max {
            max = s;
        }
    }

    let mut exp_sum = 0.0f32;
    for &s in scores.iter() {
        exp_sum += (s - max).exp();
    }

    if exp_sum <= SCORE_EPSILON {
        return;
    }

    for s in scores.iter_mut() {
        *s = (*s - max).exp() / exp_sum;
    }
}

/// Index of the highest score. The first index wins ties, and a NaN at
/// index 0 is never displaced.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = match scores.first() {
        Some(&s) => s,
        None => return 0,
    };

    for (idx, &s) in scores.iter().enumerate().skip(1) {
        if s > best_score {
            best_score = s;
            best = idx;
        }
    }

    best
}

/// Up to `k` class indices ordered by descending score. Ties keep ascending
/// index order; NaN scores rank last.
pub fn ranked(scores: &[f32], k: usize) -> Vec<usize> {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(scores[b]).total_cmp(&key(scores[a])));
    order.truncate(k);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_softmax_sums_to_one() {
        let mut scores = [1.0f32, 2.0, 3.0, -4.0];
        softmax_in_place(&mut scores);

        assert_abs_diff_eq!(scores.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(scores[2] > scores[1] && scores[1] > scores[0] && scores[0] > scores[3]);
    }

    #[test]
    fn test_softmax_uniform_on_zeros() {
        let mut scores = [0.0f32; 4];
        softmax_in_place(&mut scores);

        for s in scores {
            assert_abs_diff_eq!(s, 0.25, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_softmax_large_values_stay_finite() {
        let mut scores = [1000.0f32, 1001.0];
        softmax_in_place(&mut scores);

        assert!(scores.iter().all(|s| s.is_finite()));
        assert_abs_diff_eq!(scores[0] + scores[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_nan_poisons_all() {
        let mut scores = [0.5f32, f32::NAN, 0.1];
        softmax_in_place(&mut scores);
        assert!(scores.iter().all(|s| s.is_nan()));
    }

    #[test]
    fn test_softmax_empty() {
        let mut scores: [f32; 0] = [];
        softmax_in_place(&mut scores);
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4, 0.1]), 1);
        assert_eq!(argmax(&[0.3, 0.3]), 0);
        assert_eq!(argmax(&[0.1, 0.2, 0.7]), 2);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_argmax_nan_keeps_index_zero() {
        assert_eq!(argmax(&[f32::NAN, f32::NAN, f32::NAN]), 0);
        assert_eq!(argmax(&[f32::NAN, 5.0, 1.0]), 0);
    }

    #[test]
    fn test_ranked() {
        let scores = [0.1f32, 0.5, 0.2, 0.5, f32::NAN];

        assert_eq!(ranked(&scores, 3), vec![1, 3, 2]);
        assert_eq!(ranked(&scores, 10), vec![1, 3, 2, 0, 4]);
        assert!(ranked(&scores, 0).is_empty());
    }
}
