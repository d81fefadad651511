//! Squared Euclidean distance kernels
//!
//! Every index in this crate ranks candidates by L2² (no square root), the
//! same quantity reported back to clients as the result distance.
//!
//! | Platform     | Path                                  |
//! |--------------|---------------------------------------|
//! | aarch64      | NEON, 4 lanes per step                |
//! | x86_64       | AVX2+FMA when detected at runtime     |
//! | other        | scalar loop (auto-vectorized by LLVM) |

#[cfg(target_arch = "aarch64")]
#[inline(always)]
unsafe fn l2_squared_neon(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::aarch64::*;

    let lanes = a.len() / 4;
    let mut acc = vdupq_n_f32(0.0);
    for i in 0..lanes {
        let va = vld1q_f32(a.as_ptr().add(i * 4));
        let vb = vld1q_f32(b.as_ptr().add(i * 4));
        let diff = vsubq_f32(va, vb);
        acc = vfmaq_f32(acc, diff, diff);
    }

    vaddvq_f32(acc) + l2_squared_scalar(&a[lanes * 4..], &b[lanes * 4..])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[inline]
unsafe fn l2_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let lanes = a.len() / 8;
    let mut acc = _mm256_setzero_ps();
    for i in 0..lanes {
        let va = _mm256_loadu_ps(a.as_ptr().add(i * 8));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i * 8));
        let diff = _mm256_sub_ps(va, vb);
        acc = _mm256_fmadd_ps(diff, diff, acc);
    }

    // 8 -> 4 -> 2 -> 1
    let folded = _mm_add_ps(_mm256_castps256_ps128(acc), _mm256_extractf128_ps(acc, 1));
    let pairs = _mm_add_ps(folded, _mm_movehdup_ps(folded));
    let total = _mm_add_ss(pairs, _mm_movehl_ps(pairs, pairs));

    _mm_cvtss_f32(total) + l2_squared_scalar(&a[lanes * 8..], &b[lanes * 8..])
}

#[inline(always)]
fn l2_squared_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Squared L2 distance `||a - b||²`.
#[inline(always)]
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector length mismatch");

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { l2_squared_neon(a, b) };
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { l2_squared_avx2(a, b) };
        }
    }

    #[allow(unreachable_code)]
    l2_squared_scalar(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_l2_basic() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];

        // 4 * 16
        assert!((l2_distance_squared(&a, &b) - 64.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_identical_is_zero() {
        let a = [0.25f32; 19];
        assert_eq!(l2_distance_squared(&a, &a), 0.0);
    }

    #[test]
    fn test_simd_matches_scalar_with_tail() {
        let mut rng = StdRng::seed_from_u64(7);
        for dim in [1, 3, 8, 13, 64, 131] {
            let a: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>() - 0.5).collect();
            let b: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>() - 0.5).collect();

            let fast = l2_distance_squared(&a, &b);
            let slow = l2_squared_scalar(&a, &b);
            assert!(
                (fast - slow).abs() < 1e-4,
                "dim {}: simd {} vs scalar {}",
                dim,
                fast,
                slow
            );
        }
    }
}
