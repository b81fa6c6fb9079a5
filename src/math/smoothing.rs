//! Circular Gaussian smoothing for closed curves.
//!
//! A contour polygon is a closed curve, so its coordinate sequences are smoothed
//! with periodic ("wrap") boundaries: the neighbors of the first point are the last
//! points and vice versa. The kernel is truncated at `4σ`.

/// Kernel truncation, in units of sigma.
const TRUNCATE: f64 = 4.0;

/// A kernel spanning this many periods folds into a flat one.
const FLAT_PERIODS: usize = 8;

fn kernel_radius(sigma: f64) -> f64 {
    (TRUNCATE * sigma + 0.5).floor()
}

/// Normalized Gaussian kernel of radius `round(TRUNCATE * sigma)`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = kernel_radius(sigma) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let x = k as f64 - radius as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Kernel weights folded onto the offsets `0..n` of a periodic sequence, or `None`
/// when the kernel is wide enough to be flat.
fn wrapped_kernel(sigma: f64, n: usize) -> Option<Vec<f64>> {
    if kernel_radius(sigma) >= FLAT_PERIODS.saturating_mul(n) as f64 {
        return None;
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let n_i = n as isize;
    let mut folded = vec![0.0; n];
    for (k, w) in kernel.iter().enumerate() {
        folded[(k as isize - radius).rem_euclid(n_i) as usize] += w;
    }
    Some(folded)
}

/// Smooth `values` with a wrap-around Gaussian filter.
///
/// `sigma <= 0` (or a non-finite sigma) returns the input unchanged. Very wide
/// kernels return the mean everywhere.
pub fn gaussian_filter_wrap(values: &[f64], sigma: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 || !(sigma.is_finite() && sigma > 0.0) {
        return values.to_vec();
    }

    let Some(weights) = wrapped_kernel(sigma, n) else {
        let mean = values.iter().sum::<f64>() / n as f64;
        return vec![mean; n];
    };
    (0..n)
        .map(|i| {
            weights
                .iter()
                .enumerate()
                .map(|(offset, w)| w * values[(i + offset) % n])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sigma_is_a_no_op() {
        let v = vec![1.0, 5.0, -2.0, 3.5];
        assert_eq!(gaussian_filter_wrap(&v, 0.0), v);
    }

    #[test]
    fn constant_sequence_is_preserved() {
        let v = vec![2.5; 7];
        for s in gaussian_filter_wrap(&v, 1.3) {
            assert!((s - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn smoothing_wraps_around_the_ends() {
        // A spike at the last index must leak into the first index.
        let mut v = vec![0.0; 10];
        v[9] = 1.0;
        let s = gaussian_filter_wrap(&v, 1.0);
        assert!(s[0] > 0.0);
        assert!((s[0] - s[8]).abs() < 1e-12, "kernel is symmetric around the spike");
        let total: f64 = s.iter().sum();
        assert!((total - 1.0).abs() < 1e-12, "filter preserves the sum");
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(2.0);
        assert_eq!(k.len(), 2 * 8 + 1);
        let sum: f64 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((k[0] - k[k.len() - 1]).abs() < 1e-15);
    }

    #[test]
    fn huge_sigma_flattens_to_the_mean() {
        let v = [1.0, 2.0, 3.0, 4.0];
        for sigma in [1e300, 1e9, f64::MAX] {
            assert_eq!(gaussian_filter_wrap(&v, sigma), vec![2.5; 4], "sigma = {sigma}");
        }
    }

    #[test]
    fn kernel_wider_than_the_sequence_folds_onto_it() {
        let v = [1.0, 2.0, 3.0, 4.0, 0.0];
        let s = gaussian_filter_wrap(&v, 3.0);
        assert_eq!(s.len(), v.len());
        let total: f64 = s.iter().sum();
        assert!((total - 10.0).abs() < 1e-12, "filter preserves the sum");
        assert!(s.iter().all(|x| (x - 2.0).abs() < 0.1), "{s:?}");

        let weights = wrapped_kernel(3.0, 5).unwrap();
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((weights[1] - weights[4]).abs() < 1e-15);
    }
}
