//! Humanization engine — pure timing and ordering functions.
//!
//! No state, no I/O. Callers inject the RNG, so tests drive everything with
//! a seeded `StdRng`.

use rand::Rng;

/// Draw an inter-message delay from a normal distribution clipped to
/// `[min_ms, max_ms]`.
///
/// A uniform draw produces a flat, robotic cadence; a Gaussian centered on
/// the midpoint clusters delays around a typical value while still honoring
/// the configured bounds. Sigma is `(max - min) / 6`, putting ~99.7% of raw
/// samples in range before clipping (clip rather than reject, so one draw
/// always terminates).
pub fn calculate_delay_with<R: Rng + ?Sized>(rng: &mut R, min_ms: u64, max_ms: u64) -> u64 {
    if min_ms >= max_ms {
        return min_ms;
    }
    let mean = (min_ms + max_ms) as f64 / 2.0;
    let sigma = (max_ms - min_ms) as f64 / 6.0;

    // Box-Muller transform: two uniform samples -> one standard normal.
    let u1: f64 = 1.0 - rng.gen::<f64>(); // (0, 1], keeps ln() finite
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();

    let sample = mean + z * sigma;
    sample.clamp(min_ms as f64, max_ms as f64).round() as u64
}

/// As [`calculate_delay_with`], using the thread-local RNG.
pub fn calculate_delay(min_ms: u64, max_ms: u64) -> u64 {
    calculate_delay_with(&mut rand::thread_rng(), min_ms, max_ms)
}

/// Unbiased Fisher-Yates shuffle, in place.
pub fn shuffle_targets_with<R: Rng + ?Sized, T>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// As [`shuffle_targets_with`], using the thread-local RNG.
pub fn shuffle_targets<T>(items: &mut [T]) {
    shuffle_targets_with(&mut rand::thread_rng(), items);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_delay_always_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5_000 {
            let d = calculate_delay_with(&mut rng, 1_000, 2_000);
            assert!((1_000..=2_000).contains(&d), "delay {d} out of bounds");
        }
    }

    #[test]
    fn test_delay_mean_near_midpoint() {
        // Rules out a uniform-only or constant implementation: the sample
        // mean must sit closer to the midpoint than to either bound.
        let mut rng = StdRng::seed_from_u64(42);
        let (min, max) = (1_000u64, 3_000u64);
        let n = 2_000;
        let sum: u64 = (0..n).map(|_| calculate_delay_with(&mut rng, min, max)).sum();
        let mean = sum as f64 / n as f64;
        let midpoint = (min + max) as f64 / 2.0;
        assert!((mean - midpoint).abs() < (mean - min as f64).abs());
        assert!((mean - midpoint).abs() < (mean - max as f64).abs());
        // Midpoint clustering: most samples inside the central half.
        let mut rng = StdRng::seed_from_u64(43);
        let central = (0..n)
            .map(|_| calculate_delay_with(&mut rng, min, max))
            .filter(|d| (1_500..=2_500).contains(d))
            .count();
        assert!(central as f64 / n as f64 > 0.8);
    }

    #[test]
    fn test_delay_degenerate_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(calculate_delay_with(&mut rng, 500, 500), 500);
        assert_eq!(calculate_delay_with(&mut rng, 0, 0), 0);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(99);
        let original: Vec<u32> = (0..50).collect();
        let mut shuffled = original.clone();
        shuffle_targets_with(&mut rng, &mut shuffled);

        assert_eq!(shuffled.len(), original.len());
        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
        // 50 elements: staying in order is astronomically unlikely.
        assert_ne!(shuffled, original);
    }

    #[test]
    fn test_shuffle_handles_tiny_lists() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut empty: Vec<u32> = vec![];
        shuffle_targets_with(&mut rng, &mut empty);
        assert!(empty.is_empty());

        let mut one = vec![42];
        shuffle_targets_with(&mut rng, &mut one);
        assert_eq!(one, vec![42]);
    }

    #[test]
    fn test_shuffle_seeded_is_deterministic() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b: Vec<u32> = (0..20).collect();
        shuffle_targets_with(&mut StdRng::seed_from_u64(11), &mut a);
        shuffle_targets_with(&mut StdRng::seed_from_u64(11), &mut b);
        assert_eq!(a, b);
    }
}
