//! Shared stride-arithmetic helpers used by L1 BLAS-1, L2 kernels, L3
//! apply, and the L4/L5 GEMM/Conv families.
//!
//! For a negative stride, `start_offset` computes the physical offset of
//! logical index 0 the way reference BLAS handles negative increments:
//! `start = -stride * (n - 1)`, so logical index 0 sits at the highest
//! physical offset and increasing the logical index walks backward through
//! memory while the computed physical index stays non-negative.

#[inline]
pub(crate) fn start_offset(stride: isize, n: usize) -> isize {
    if stride < 0 {
        -stride * (n as isize - 1)
    } else {
        0
    }
}

#[inline]
pub(crate) fn pos(i: usize, start: isize, stride: isize) -> usize {
    (start + i as isize * stride) as usize
}

/// Advances `k` offset registers by `step * stride` for each of the given
/// per-operand strides. Used by iterative tile loops that prefer an
/// explicit offset walk over recursive leading-axis decomposition.
pub fn advance_offsets(offsets: &mut [usize], strides: &[isize], step: isize) {
    debug_assert_eq!(offsets.len(), strides.len());
    for (off, &s) in offsets.iter_mut().zip(strides.iter()) {
        *off = (*off as isize + step * s) as usize;
    }
}
