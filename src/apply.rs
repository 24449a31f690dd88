//! L3 — N-D strided apply engine.
//!
//! One entry point per arity, each following the same four-step algorithm:
//!
//! 1. `n = size(shape)`; empty shape or `n == 0` returns immediately.
//! 2. Any operand whose stride slice is empty gets the caller's stack
//!    scratch filled with canonical strides for `shape`.
//! 3. If every operand is contiguous for `shape`, reslice each buffer to
//!    exactly `n` and run one flat loop.
//! 4. Otherwise dispatch on rank: 1 and 2 go straight to the [`crate::kernel2`]
//!    vector/matrix kernels; rank >= 3 peels the leading axis and recurses.
//!
//! Operand shapes are assumed equal (no broadcasting) and are not checked;
//! only the empty/zero-size cases are defensive, per the calling
//! convention used throughout this crate.

use crate::kernel2;
use crate::shape::{self, MAX_DIMS};
use num_traits::Num;

/// `dst[idx] = op(x[idx])` over every logical index of `shape`.
///
/// `strides_dst`/`strides_x` may be empty, meaning "derive canonical
/// strides for `shape`".
pub fn apply_unary<T, F>(
    dst: &mut [T],
    x: &[T],
    shape: &[usize],
    strides_dst: &[isize],
    strides_x: &[isize],
    mut op: F,
) where
    T: Copy + Num,
    F: FnMut(T) -> T,
{
    let n = shape::size(shape);
    if shape.is_empty() || n == 0 {
        return;
    }

    let mut buf_d = [0isize; MAX_DIMS];
    let mut buf_x = [0isize; MAX_DIMS];
    let sd = shape::ensure_strides(&mut buf_d, strides_dst, shape);
    let sx = shape::ensure_strides(&mut buf_x, strides_x, shape);

    if shape::is_contiguous(sd, shape) && shape::is_contiguous(sx, shape) {
        let x = &x[..n];
        let dst = &mut dst[..n];
        for i in 0..n {
            dst[i] = op(x[i]);
        }
        return;
    }

    match shape.len() {
        1 => kernel2::unary_vec(dst, x, shape[0], sd[0], sx[0], op),
        2 => kernel2::unary_mat(dst, x, shape[0], shape[1], sd[0], sd[1], sx[0], sx[1], op),
        _ => {
            let n0 = shape[0];
            for i0 in 0..n0 {
                let doff = (i0 as isize * sd[0]) as usize;
                let xoff = (i0 as isize * sx[0]) as usize;
                apply_unary(&mut dst[doff..], &x[xoff..], &shape[1..], &sd[1..], &sx[1..], &mut op);
            }
        }
    }
}

/// `dst[idx] = op(x[idx], scalar)` over every logical index of `shape`.
pub fn apply_unary_scalar<T, S, F>(
    dst: &mut [T],
    x: &[T],
    shape: &[usize],
    strides_dst: &[isize],
    strides_x: &[isize],
    scalar: S,
    mut op: F,
) where
    T: Copy + Num,
    S: Copy,
    F: FnMut(T, S) -> T,
{
    let n = shape::size(shape);
    if shape.is_empty() || n == 0 {
        return;
    }

    let mut buf_d = [0isize; MAX_DIMS];
    let mut buf_x = [0isize; MAX_DIMS];
    let sd = shape::ensure_strides(&mut buf_d, strides_dst, shape);
    let sx = shape::ensure_strides(&mut buf_x, strides_x, shape);

    if shape::is_contiguous(sd, shape) && shape::is_contiguous(sx, shape) {
        let x = &x[..n];
        let dst = &mut dst[..n];
        for i in 0..n {
            dst[i] = op(x[i], scalar);
        }
        return;
    }

    match shape.len() {
        1 => kernel2::unary_scalar_vec(dst, x, shape[0], sd[0], sx[0], scalar, op),
        2 => kernel2::unary_scalar_mat(
            dst, x, shape[0], shape[1], sd[0], sd[1], sx[0], sx[1], scalar, op,
        ),
        _ => {
            let n0 = shape[0];
            for i0 in 0..n0 {
                let doff = (i0 as isize * sd[0]) as usize;
                let xoff = (i0 as isize * sx[0]) as usize;
                apply_unary_scalar(
                    &mut dst[doff..],
                    &x[xoff..],
                    &shape[1..],
                    &sd[1..],
                    &sx[1..],
                    scalar,
                    &mut op,
                );
            }
        }
    }
}

/// `dst[idx] = op(a[idx], b[idx])` over every logical index of `shape`.
pub fn apply_binary<T, F>(
    dst: &mut [T],
    a: &[T],
    b: &[T],
    shape: &[usize],
    strides_dst: &[isize],
    strides_a: &[isize],
    strides_b: &[isize],
    mut op: F,
) where
    T: Copy + Num,
    F: FnMut(T, T) -> T,
{
    let n = shape::size(shape);
    if shape.is_empty() || n == 0 {
        return;
    }

    let mut buf_d = [0isize; MAX_DIMS];
    let mut buf_a = [0isize; MAX_DIMS];
    let mut buf_b = [0isize; MAX_DIMS];
    let sd = shape::ensure_strides(&mut buf_d, strides_dst, shape);
    let sa = shape::ensure_strides(&mut buf_a, strides_a, shape);
    let sb = shape::ensure_strides(&mut buf_b, strides_b, shape);

    if shape::is_contiguous(sd, shape) && shape::is_contiguous(sa, shape) && shape::is_contiguous(sb, shape) {
        let a = &a[..n];
        let b = &b[..n];
        let dst = &mut dst[..n];
        for i in 0..n {
            dst[i] = op(a[i], b[i]);
        }
        return;
    }

    match shape.len() {
        1 => kernel2::binary_vec(dst, a, b, shape[0], sd[0], sa[0], sb[0], op),
        2 => kernel2::binary_mat(
            dst, a, b, shape[0], shape[1], sd[0], sd[1], sa[0], sa[1], sb[0], sb[1], op,
        ),
        _ => {
            let n0 = shape[0];
            for i0 in 0..n0 {
                let doff = (i0 as isize * sd[0]) as usize;
                let aoff = (i0 as isize * sa[0]) as usize;
                let boff = (i0 as isize * sb[0]) as usize;
                apply_binary(
                    &mut dst[doff..],
                    &a[aoff..],
                    &b[boff..],
                    &shape[1..],
                    &sd[1..],
                    &sa[1..],
                    &sb[1..],
                    &mut op,
                );
            }
        }
    }
}

/// `dst[idx] = op(a[idx], b[idx], scalar)` over every logical index of `shape`.
#[allow(clippy::too_many_arguments)]
pub fn apply_binary_scalar<T, S, F>(
    dst: &mut [T],
    a: &[T],
    b: &[T],
    shape: &[usize],
    strides_dst: &[isize],
    strides_a: &[isize],
    strides_b: &[isize],
    scalar: S,
    mut op: F,
) where
    T: Copy + Num,
    S: Copy,
    F: FnMut(T, T, S) -> T,
{
    let n = shape::size(shape);
    if shape.is_empty() || n == 0 {
        return;
    }

    let mut buf_d = [0isize; MAX_DIMS];
    let mut buf_a = [0isize; MAX_DIMS];
    let mut buf_b = [0isize; MAX_DIMS];
    let sd = shape::ensure_strides(&mut buf_d, strides_dst, shape);
    let sa = shape::ensure_strides(&mut buf_a, strides_a, shape);
    let sb = shape::ensure_strides(&mut buf_b, strides_b, shape);

    if shape::is_contiguous(sd, shape) && shape::is_contiguous(sa, shape) && shape::is_contiguous(sb, shape) {
        let a = &a[..n];
        let b = &b[..n];
        let dst = &mut dst[..n];
        for i in 0..n {
            dst[i] = op(a[i], b[i], scalar);
        }
        return;
    }

    match shape.len() {
        1 => kernel2::binary_scalar_vec(dst, a, b, shape[0], sd[0], sa[0], sb[0], scalar, op),
        2 => kernel2::binary_scalar_mat(
            dst, a, b, shape[0], shape[1], sd[0], sd[1], sa[0], sa[1], sb[0], sb[1], scalar, op,
        ),
        _ => {
            let n0 = shape[0];
            for i0 in 0..n0 {
                let doff = (i0 as isize * sd[0]) as usize;
                let aoff = (i0 as isize * sa[0]) as usize;
                let boff = (i0 as isize * sb[0]) as usize;
                apply_binary_scalar(
                    &mut dst[doff..],
                    &a[aoff..],
                    &b[boff..],
                    &shape[1..],
                    &sd[1..],
                    &sa[1..],
                    &sb[1..],
                    scalar,
                    &mut op,
                );
            }
        }
    }
}

/// `dst[idx] = op(a[idx], b[idx], c[idx])` over every logical index of `shape`.
#[allow(clippy::too_many_arguments)]
pub fn apply_ternary<T, F>(
    dst: &mut [T],
    a: &[T],
    b: &[T],
    c: &[T],
    shape: &[usize],
    strides_dst: &[isize],
    strides_a: &[isize],
    strides_b: &[isize],
    strides_c: &[isize],
    mut op: F,
) where
    T: Copy + Num,
    F: FnMut(T, T, T) -> T,
{
    let n = shape::size(shape);
    if shape.is_empty() || n == 0 {
        return;
    }

    let mut buf_d = [0isize; MAX_DIMS];
    let mut buf_a = [0isize; MAX_DIMS];
    let mut buf_b = [0isize; MAX_DIMS];
    let mut buf_c = [0isize; MAX_DIMS];
    let sd = shape::ensure_strides(&mut buf_d, strides_dst, shape);
    let sa = shape::ensure_strides(&mut buf_a, strides_a, shape);
    let sb = shape::ensure_strides(&mut buf_b, strides_b, shape);
    let sc = shape::ensure_strides(&mut buf_c, strides_c, shape);

    if shape::is_contiguous(sd, shape)
        && shape::is_contiguous(sa, shape)
        && shape::is_contiguous(sb, shape)
        && shape::is_contiguous(sc, shape)
    {
        let a = &a[..n];
        let b = &b[..n];
        let c = &c[..n];
        let dst = &mut dst[..n];
        for i in 0..n {
            dst[i] = op(a[i], b[i], c[i]);
        }
        return;
    }

    match shape.len() {
        1 => kernel2::ternary_vec(dst, a, b, c, shape[0], sd[0], sa[0], sb[0], sc[0], op),
        2 => kernel2::ternary_mat(
            dst, a, b, c, shape[0], shape[1], sd[0], sd[1], sa[0], sa[1], sb[0], sb[1], sc[0],
            sc[1], op,
        ),
        _ => {
            let n0 = shape[0];
            for i0 in 0..n0 {
                let doff = (i0 as isize * sd[0]) as usize;
                let aoff = (i0 as isize * sa[0]) as usize;
                let boff = (i0 as isize * sb[0]) as usize;
                let coff = (i0 as isize * sc[0]) as usize;
                apply_ternary(
                    &mut dst[doff..],
                    &a[aoff..],
                    &b[boff..],
                    &c[coff..],
                    &shape[1..],
                    &sd[1..],
                    &sa[1..],
                    &sb[1..],
                    &sc[1..],
                    &mut op,
                );
            }
        }
    }
}

/// `dst[idx] = op(a[idx], b[idx], c[idx], scalar)` over every logical index of `shape`.
#[allow(clippy::too_many_arguments)]
pub fn apply_ternary_scalar<T, S, F>(
    dst: &mut [T],
    a: &[T],
    b: &[T],
    c: &[T],
    shape: &[usize],
    strides_dst: &[isize],
    strides_a: &[isize],
    strides_b: &[isize],
    strides_c: &[isize],
    scalar: S,
    mut op: F,
) where
    T: Copy + Num,
    S: Copy,
    F: FnMut(T, T, T, S) -> T,
{
    let n = shape::size(shape);
    if shape.is_empty() || n == 0 {
        return;
    }

    let mut buf_d = [0isize; MAX_DIMS];
    let mut buf_a = [0isize; MAX_DIMS];
    let mut buf_b = [0isize; MAX_DIMS];
    let mut buf_c = [0isize; MAX_DIMS];
    let sd = shape::ensure_strides(&mut buf_d, strides_dst, shape);
    let sa = shape::ensure_strides(&mut buf_a, strides_a, shape);
    let sb = shape::ensure_strides(&mut buf_b, strides_b, shape);
    let sc = shape::ensure_strides(&mut buf_c, strides_c, shape);

    if shape::is_contiguous(sd, shape)
        && shape::is_contiguous(sa, shape)
        && shape::is_contiguous(sb, shape)
        && shape::is_contiguous(sc, shape)
    {
        let a = &a[..n];
        let b = &b[..n];
        let c = &c[..n];
        let dst = &mut dst[..n];
        for i in 0..n {
            dst[i] = op(a[i], b[i], c[i], scalar);
        }
        return;
    }

    match shape.len() {
        1 => kernel2::ternary_scalar_vec(dst, a, b, c, shape[0], sd[0], sa[0], sb[0], sc[0], scalar, op),
        2 => kernel2::ternary_scalar_mat(
            dst, a, b, c, shape[0], shape[1], sd[0], sd[1], sa[0], sa[1], sb[0], sb[1], sc[0],
            sc[1], scalar, op,
        ),
        _ => {
            let n0 = shape[0];
            for i0 in 0..n0 {
                let doff = (i0 as isize * sd[0]) as usize;
                let aoff = (i0 as isize * sa[0]) as usize;
                let boff = (i0 as isize * sb[0]) as usize;
                let coff = (i0 as isize * sc[0]) as usize;
                apply_ternary_scalar(
                    &mut dst[doff..],
                    &a[aoff..],
                    &b[boff..],
                    &c[coff..],
                    &shape[1..],
                    &sd[1..],
                    &sa[1..],
                    &sb[1..],
                    &sc[1..],
                    scalar,
                    &mut op,
                );
            }
        }
    }
}
