//! L4 — 2-D convolution over fp32, built on [`crate::gemm`].
//!
//! `conv2d` lowers to im2col followed by a single GEMM call against the
//! reshaped weight matrix; the im2col buffer is the one heap allocation
//! permitted on an otherwise allocation-free hot path. `conv2d_transposed`
//! instead scatters each input value directly into the output without ever
//! materializing a patch matrix.

use crate::gemm::gemm;

/// Direct (forward) convolution: input `[batch, in_c, in_h, in_w]`,
/// weights `[out_c, in_c, kh, kw]`, optional per-output-channel `bias`,
/// output `[batch, out_c, out_h, out_w]` where
/// `out_h = (in_h + 2*ph - kh)/sh + 1` (and likewise for `out_w`).
///
/// Allocates one scratch im2col matrix of size
/// `batch*out_h*out_w * in_c*kh*kw`. See [`conv2d_with_scratch`] for a
/// caller-supplied-buffer variant.
#[allow(clippy::too_many_arguments)]
pub fn conv2d(
    output: &mut [f32],
    input: &[f32],
    weights: &[f32],
    bias: Option<&[f32]>,
    batch: usize,
    in_c: usize,
    out_c: usize,
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
) {
    let cols = in_c * kh * kw;
    let rows = batch * out_h * out_w;
    let mut scratch = vec![0.0f32; rows * cols];
    conv2d_with_scratch(
        output, input, weights, bias, batch, in_c, out_c, in_h, in_w, out_h, out_w, kh, kw, sh,
        sw, ph, pw, &mut scratch,
    );
}

/// Same contract as [`conv2d`], but the im2col matrix is the caller's
/// `scratch` buffer (must have length `batch*out_h*out_w * in_c*kh*kw`).
/// No allocation.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_with_scratch(
    output: &mut [f32],
    input: &[f32],
    weights: &[f32],
    bias: Option<&[f32]>,
    batch: usize,
    in_c: usize,
    out_c: usize,
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
    scratch: &mut [f32],
) {
    if batch == 0 || in_c == 0 || out_c == 0 || out_h == 0 || out_w == 0 {
        return;
    }

    let cols = in_c * kh * kw;
    im2col(
        scratch, input, batch, in_c, in_h, in_w, out_h, out_w, kh, kw, sh, sw, ph, pw,
    );

    let rows = batch * out_h * out_w;
    // weights are already [out_c, in_c*kh*kw] row-major; GEMM against the
    // transposed weight matrix is avoided by computing
    // patches[rows, cols] . weights^T[cols, out_c] one output channel row
    // at a time via a [rows, out_c] result, then scattering into the
    // [batch, out_c, out_h, out_w] output layout.
    let mut gemm_out = vec![0.0f32; rows * out_c];
    gemm_nt(&mut gemm_out, scratch, weights, rows, cols, out_c);

    for b in 0..batch {
        for oc in 0..out_c {
            let bias_val = bias.map(|bv| bv[oc]).unwrap_or(0.0);
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let row = (b * out_h + oy) * out_w + ox;
                    let out_idx = ((b * out_c + oc) * out_h + oy) * out_w + ox;
                    output[out_idx] = gemm_out[row * out_c + oc] + bias_val;
                }
            }
        }
    }
}

/// `C[i,j] <- Σ_l A[i,l] * B[j,l]`, i.e. GEMM against the transpose of `B`
/// without materializing it. Used to multiply im2col patches against a
/// `[out_c, cols]` weight matrix directly.
fn gemm_nt(c: &mut [f32], a: &[f32], b: &[f32], m: usize, k: usize, n: usize) {
    for i in 0..m {
        let arow = &a[i * k..i * k + k];
        let crow = &mut c[i * n..i * n + n];
        for (j, cv) in crow.iter_mut().enumerate() {
            let brow = &b[j * k..j * k + k];
            let mut acc = 0.0f32;
            for l in 0..k {
                acc += arow[l] * brow[l];
            }
            *cv = acc;
        }
    }
}

/// Unfolds `input [batch, in_c, in_h, in_w]` into `dst
/// [batch*out_h*out_w, in_c*kh*kw]`, row-major, with row element order
/// `for c in 0..in_c: for ky in 0..kh: for kx in 0..kw`. Out-of-range
/// source pixels (from padding) are written as `0.0`.
#[allow(clippy::too_many_arguments)]
fn im2col(
    dst: &mut [f32],
    input: &[f32],
    batch: usize,
    in_c: usize,
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
) {
    let cols = in_c * kh * kw;
    for b in 0..batch {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let row = (b * out_h + oy) * out_w + ox;
                let drow = &mut dst[row * cols..row * cols + cols];
                let mut idx = 0;
                for c in 0..in_c {
                    for ky in 0..kh {
                        let iy = oy as isize * sh as isize + ky as isize - ph as isize;
                        for kx in 0..kw {
                            let ix = ox as isize * sw as isize + kx as isize - pw as isize;
                            drow[idx] = if iy >= 0 && (iy as usize) < in_h && ix >= 0 && (ix as usize) < in_w {
                                let in_idx = ((b * in_c + c) * in_h + iy as usize) * in_w + ix as usize;
                                input[in_idx]
                            } else {
                                0.0
                            };
                            idx += 1;
                        }
                    }
                }
            }
        }
    }
}

/// Transposed (fractionally-strided) convolution: weights laid out
/// `[in_c, out_c, kh, kw]`. For each input value, scatter-adds its
/// contribution into every in-bounds output position it touches. `output`
/// must be pre-zeroed by the caller.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_transposed(
    output: &mut [f32],
    input: &[f32],
    weights: &[f32],
    bias: Option<&[f32]>,
    batch: usize,
    in_c: usize,
    out_c: usize,
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
) {
    if batch == 0 || in_c == 0 || out_c == 0 || in_h == 0 || in_w == 0 {
        return;
    }

    for b in 0..batch {
        for ic in 0..in_c {
            for iy in 0..in_h {
                for ix in 0..in_w {
                    let in_idx = ((b * in_c + ic) * in_h + iy) * in_w + ix;
                    let v = input[in_idx];
                    if v == 0.0 {
                        continue;
                    }
                    for oc in 0..out_c {
                        for ky in 0..kh {
                            let oy = iy as isize * sh as isize + ky as isize - ph as isize;
                            if oy < 0 || oy as usize >= out_h {
                                continue;
                            }
                            for kx in 0..kw {
                                let ox = ix as isize * sw as isize + kx as isize - pw as isize;
                                if ox < 0 || ox as usize >= out_w {
                                    continue;
                                }
                                let w_idx = ((ic * out_c + oc) * kh + ky) * kw + kx;
                                let out_idx =
                                    ((b * out_c + oc) * out_h + oy as usize) * out_w + ox as usize;
                                output[out_idx] += v * weights[w_idx];
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(bv) = bias {
        for b in 0..batch {
            for oc in 0..out_c {
                let bias_val = bv[oc];
                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let out_idx = ((b * out_c + oc) * out_h + oy) * out_w + ox;
                        output[out_idx] += bias_val;
                    }
                }
            }
        }
    }
}
