//! L5 — quantized (4-bit-in-byte) BLAS and Conv2D.
//!
//! Storage is *unpacked*: each logical 4-bit value occupies a full `u8` in
//! `[0, 15]`, chosen so the same address arithmetic used throughout this
//! crate applies unchanged. Dequantization is asymmetric: `real = scale *
//! (q - zero_point)`; symmetric quantization is the special case
//! `zero_point == 8`. All quantized kernels clamp silently to `[0, 15]`
//! rather than fail; `m*k*n == 0` is always a no-op.

/// How out-of-range source pixels are represented in the quantized im2col
/// / transposed-conv padding path.
///
/// The source material is ambiguous here: im2col unconditionally stores
/// the byte `0`, while transposed conv initializes its output to `z_c`.
/// Both conventions are real and downstream callers may depend on either,
/// so the choice is a runtime parameter rather than a hard-coded policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Q4PadMode {
    /// Pad with the stored byte `0`. Dequantizes to `-z_a * s_a`, which is
    /// only "true zero" when `z_a == 0`.
    StoredZero,
    /// Pad with the stored byte equal to the operand's own zero-point, so
    /// the padded region dequantizes to exactly `0.0`.
    DequantZero,
}

#[inline]
fn clamp_q4(v: i32) -> u8 {
    v.clamp(0, 15) as u8
}

#[inline]
fn pad_byte(mode: Q4PadMode, zero_point: u8) -> u8 {
    match mode {
        Q4PadMode::StoredZero => 0,
        Q4PadMode::DequantZero => zero_point,
    }
}

/// `y[i] <- x[i]` over quantized buffers; a plain strided copy, kept
/// distinct from [`crate::blas1::copy`] because the element type differs.
pub fn copy_q4(y: &mut [u8], x: &[u8], n: usize) {
    y[..n].copy_from_slice(&x[..n]);
}

/// `C <- round(s_a*s_b/s_c * Σ_l (A[i,l]-z_a)*(B[l,j]-z_b)) + z_c`, clamped
/// to `[0, 15]` and stored as `u8`. Row-major, `lda >= k`, `ldb >= n`,
/// `ldc >= n`. `m*k*n == 0` is a no-op.
#[allow(clippy::too_many_arguments)]
pub fn gemm_q4(
    c: &mut [u8],
    a: &[u8],
    b: &[u8],
    m: usize,
    k: usize,
    n: usize,
    lda: usize,
    ldb: usize,
    ldc: usize,
    s_a: f32,
    s_b: f32,
    s_c: f32,
    z_a: i32,
    z_b: i32,
    z_c: i32,
) {
    if m == 0 || k == 0 || n == 0 {
        return;
    }

    let mut accum = vec![0i32; m * n];
    gemm_q4_accum_into(&mut accum, a, b, m, k, n, lda, ldb, n, z_a, z_b);

    let scale = s_a * s_b / s_c;
    for i in 0..m {
        let crow = &mut c[i * ldc..i * ldc + n];
        let arow = &accum[i * n..i * n + n];
        for j in 0..n {
            let requant = (arow[j] as f32 * scale).round() as i32 + z_c;
            crow[j] = clamp_q4(requant);
        }
    }
}

/// Same contract as [`gemm_q4`] but writes the raw `i32` accumulator
/// (post zero-point correction, pre-requantization) rather than a
/// requantized `u8`. Used by layers that fuse bias addition before a
/// later quantization step.
#[allow(clippy::too_many_arguments)]
pub fn gemm_q4_accum(
    c: &mut [i32],
    a: &[u8],
    b: &[u8],
    m: usize,
    k: usize,
    n: usize,
    lda: usize,
    ldb: usize,
    ldc: usize,
    z_a: i32,
    z_b: i32,
) {
    if m == 0 || k == 0 || n == 0 {
        return;
    }
    gemm_q4_accum_into(c, a, b, m, k, n, lda, ldb, ldc, z_a, z_b);
}

fn gemm_q4_accum_into(
    c: &mut [i32],
    a: &[u8],
    b: &[u8],
    m: usize,
    k: usize,
    n: usize,
    lda: usize,
    ldb: usize,
    ldc: usize,
    z_a: i32,
    z_b: i32,
) {
    // Column sums of B (length n) and row sums of A (length m), each
    // computed once and reused across the m*n output elements.
    let mut col_sum_b = vec![0i32; n];
    for l in 0..k {
        let brow = &b[l * ldb..l * ldb + n];
        for j in 0..n {
            col_sum_b[j] += brow[j] as i32;
        }
    }

    for i in 0..m {
        let arow = &a[i * lda..i * lda + k];
        let mut row_sum_a = 0i32;
        for &v in arow {
            row_sum_a += v as i32;
        }

        let crow = &mut c[i * ldc..i * ldc + n];
        for v in crow.iter_mut() {
            *v = 0;
        }

        for l in 0..k {
            let alpha = arow[l] as i32;
            let brow = &b[l * ldb..l * ldb + n];
            for j in 0..n {
                crow[j] += alpha * brow[j] as i32;
            }
        }

        for j in 0..n {
            crow[j] = crow[j] - z_a * col_sum_b[j] - z_b * row_sum_a + z_a * z_b * k as i32;
        }
    }
}

/// Batched quantized GEMM: `batch` independent `gemm_q4` calls over
/// contiguously laid out `[batch, m, k]` / `[batch, k, n]` / `[batch, m,
/// n]` operands.
#[allow(clippy::too_many_arguments)]
pub fn gemm_batched_q4(
    c: &mut [u8],
    a: &[u8],
    b: &[u8],
    batch: usize,
    m: usize,
    k: usize,
    n: usize,
    s_a: f32,
    s_b: f32,
    s_c: f32,
    z_a: i32,
    z_b: i32,
    z_c: i32,
) {
    let a_stride = m * k;
    let b_stride = k * n;
    let c_stride = m * n;
    for batch_idx in 0..batch {
        let a_slice = &a[batch_idx * a_stride..(batch_idx + 1) * a_stride];
        let b_slice = &b[batch_idx * b_stride..(batch_idx + 1) * b_stride];
        let c_slice = &mut c[batch_idx * c_stride..(batch_idx + 1) * c_stride];
        gemm_q4(
            c_slice, a_slice, b_slice, m, k, n, k, n, n, s_a, s_b, s_c, z_a, z_b, z_c,
        );
    }
}

/// Quantized im2col: identical layout contract to the fp32 [`crate::conv`]
/// version, but out-of-range source pixels are written per `pad_mode`
/// rather than unconditionally as `0`.
#[allow(clippy::too_many_arguments)]
fn im2col_q4(
    dst: &mut [u8],
    input: &[u8],
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
    z_a: u8,
    pad_mode: Q4PadMode,
) {
    let cols = in_c * kh * kw;
    let pad = pad_byte(pad_mode, z_a);
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
                                pad
                            };
                            idx += 1;
                        }
                    }
                }
            }
        }
    }
}

/// col2im for the quantized accumulator path: scatter-adds patch-matrix
/// rows back into `[batch, in_c, in_h, in_w]`, saturating each destination
/// element at `[0, 15]` on every add.
#[allow(clippy::too_many_arguments)]
pub fn col2im_q4(
    dst: &mut [u8],
    patches: &[u8],
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
                let prow = &patches[row * cols..row * cols + cols];
                let mut idx = 0;
                for c in 0..in_c {
                    for ky in 0..kh {
                        let iy = oy as isize * sh as isize + ky as isize - ph as isize;
                        for kx in 0..kw {
                            let ix = ox as isize * sw as isize + kx as isize - pw as isize;
                            if iy >= 0 && (iy as usize) < in_h && ix >= 0 && (ix as usize) < in_w {
                                let in_idx =
                                    ((b * in_c + c) * in_h + iy as usize) * in_w + ix as usize;
                                let sum = dst[in_idx] as i32 + prow[idx] as i32;
                                dst[in_idx] = clamp_q4(sum);
                            }
                            idx += 1;
                        }
                    }
                }
            }
        }
    }
}

/// Quantized direct convolution: im2col (per `pad_mode`), `gemm_q4_accum`,
/// optional `i32` bias add, then requantize-and-clamp to `u8`. Weight
/// layout `[out_c, in_c, kh, kw]`.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_q4(
    output: &mut [u8],
    input: &[u8],
    weights: &[u8],
    bias: Option<&[i32]>,
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
    s_a: f32,
    s_b: f32,
    s_c: f32,
    z_a: i32,
    z_b: i32,
    z_c: i32,
    pad_mode: Q4PadMode,
) {
    if batch == 0 || in_c == 0 || out_c == 0 || out_h == 0 || out_w == 0 {
        return;
    }

    let cols = in_c * kh * kw;
    let rows = batch * out_h * out_w;
    let mut patches = vec![0u8; rows * cols];
    im2col_q4(
        &mut patches, input, batch, in_c, in_h, in_w, out_h, out_w, kh, kw, sh, sw, ph, pw,
        z_a as u8, pad_mode,
    );

    let mut accum = vec![0i32; rows * out_c];
    gemm_q4_accum_nt(&mut accum, &patches, weights, rows, cols, out_c, z_a, z_b);

    let scale = s_a * s_b / s_c;
    for b in 0..batch {
        for oc in 0..out_c {
            let bias_val = bias.map(|bv| bv[oc]).unwrap_or(0);
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let row = (b * out_h + oy) * out_w + ox;
                    let out_idx = ((b * out_c + oc) * out_h + oy) * out_w + ox;
                    let sum = accum[row * out_c + oc] + bias_val;
                    let requant = (sum as f32 * scale).round() as i32 + z_c;
                    output[out_idx] = clamp_q4(requant);
                }
            }
        }
    }
}

/// `gemm_q4_accum` variant where `b` is `[n, k]` (already in
/// `[out_c, in_c*kh*kw]` weight layout) and the product computed is
/// `A . B^T`, avoiding a weight transpose.
fn gemm_q4_accum_nt(
    c: &mut [i32],
    a: &[u8],
    b: &[u8],
    m: usize,
    k: usize,
    n: usize,
    z_a: i32,
    z_b: i32,
) {
    let mut row_sum_b = vec![0i32; n];
    for j in 0..n {
        let brow = &b[j * k..j * k + k];
        row_sum_b[j] = brow.iter().map(|&v| v as i32).sum();
    }

    for i in 0..m {
        let arow = &a[i * k..i * k + k];
        let row_sum_a: i32 = arow.iter().map(|&v| v as i32).sum();
        let crow = &mut c[i * n..i * n + n];
        for (j, cv) in crow.iter_mut().enumerate() {
            let brow = &b[j * k..j * k + k];
            let mut acc = 0i32;
            for l in 0..k {
                acc += arow[l] as i32 * brow[l] as i32;
            }
            *cv = acc - z_a * row_sum_b[j] - z_b * row_sum_a + z_a * z_b * k as i32;
        }
    }
}

/// Quantized transposed convolution: direct scatter, all intermediate
/// arithmetic in `i32`, requantized once at the end. Weight layout
/// `[in_c, out_c, kh, kw]`.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_transposed_q4(
    output: &mut [u8],
    input: &[u8],
    weights: &[u8],
    bias: Option<&[i32]>,
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
    s_a: f32,
    s_b: f32,
    s_c: f32,
    z_a: i32,
    z_b: i32,
    z_c: i32,
) {
    if batch == 0 || in_c == 0 || out_c == 0 || in_h == 0 || in_w == 0 {
        return;
    }

    let mut accum = vec![0i32; batch * out_c * out_h * out_w];

    for b in 0..batch {
        for ic in 0..in_c {
            for iy in 0..in_h {
                for ix in 0..in_w {
                    let in_idx = ((b * in_c + ic) * in_h + iy) * in_w + ix;
                    let av = input[in_idx] as i32;
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
                                let wv = weights[w_idx] as i32;
                                // (a - z_a) * (w - z_b) = a*w - z_a*w - z_b*a + z_a*z_b
                                let term = av * wv - z_a * wv - z_b * av + z_a * z_b;
                                let out_idx = ((b * out_c + oc) * out_h + oy as usize) * out_w
                                    + ox as usize;
                                accum[out_idx] += term;
                            }
                        }
                    }
                }
            }
        }
    }

    let scale = s_a * s_b / s_c;
    for b in 0..batch {
        for oc in 0..out_c {
            let bias_val = bias.map(|bv| bv[oc]).unwrap_or(0);
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let out_idx = ((b * out_c + oc) * out_h + oy) * out_w + ox;
                    let sum = accum[out_idx] + bias_val;
                    let requant = (sum as f32 * scale).round() as i32 + z_c;
                    output[out_idx] = clamp_q4(requant);
                }
            }
        }
    }
}
