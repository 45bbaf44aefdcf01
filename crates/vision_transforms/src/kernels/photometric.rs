//! Photometric kernels.
//!
//! Every adjustment is written once against a `[..., C, H, W]` array and a
//! value bound (1 for float data, 255 for 8-bit data), then registered for
//! plain arrays, images, videos and rasters by [`register_adjustment`].

use super::util::{channels, from_images, raster_to_tensor, tensor_to_raster_as, to_images, RasterDepth};
use crate::datapoints::{ColorSpace, DType, Image, Tensor, Video};
use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;
use crate::params::Params;
use anyhow::{bail, ensure, Result};
use image::DynamicImage;
use ndarray::{s, Array2, Array4, ArrayView3, ArrayViewMut2, Axis, Zip};

/// `f(payload, params, bound)`
type Adjustment = fn(&Tensor, &Params, f32) -> Result<Tensor>;

pub(crate) fn register(b: &mut DispatcherBuilder) -> VisionResult<()> {
    register_adjustment(b, "adjust_brightness", adjust_brightness)?;
    register_adjustment(b, "adjust_contrast", adjust_contrast)?;
    register_adjustment(b, "adjust_saturation", adjust_saturation)?;
    register_adjustment(b, "adjust_hue", adjust_hue)?;
    register_adjustment(b, "adjust_sharpness", adjust_sharpness)?;
    register_adjustment(b, "posterize", posterize)?;
    register_adjustment(b, "solarize", solarize)?;
    register_adjustment(b, "autocontrast", autocontrast)?;
    register_adjustment(b, "equalize", equalize)?;
    register_adjustment(b, "invert", invert)?;
    register_adjustment(b, "rgb_to_grayscale", rgb_to_grayscale)?;
    register_adjustment(b, "gaussian_blur", gaussian_blur)?;
    register_adjustment(b, "permute_channels", permute_channels)?;

    b.register("normalize", |t: Tensor, p: &Params| normalize(&t, p))?
        .register("normalize", normalize_image)?
        .register("normalize", normalize_video)?;
    Ok(())
}

/// 8-bit payloads stay on the integer grid.
fn finish(t: Tensor, dtype: DType) -> Tensor {
    match dtype {
        DType::U8 => t.mapv(|v| v.round().clamp(0.0, 255.0)).into_shared(),
        DType::F32 => t,
    }
}

fn register_adjustment(
    b: &mut DispatcherBuilder,
    op: &'static str,
    f: Adjustment,
) -> VisionResult<()> {
    b.register(op, move |t: Tensor, p: &Params| f(&t, p, 1.0))?
        .register(op, move |image: Image, p: &Params| {
            let dtype = image.dtype();
            let out = finish(f(image.data(), p, dtype.max_value())?, dtype);
            let color_space = match image.color_space() {
                Some(_) if channels(&out)? != image.num_channels() => {
                    ColorSpace::from_num_channels(channels(&out)?)
                }
                other => other,
            };
            Ok(Image::from_parts(out, color_space, dtype)?)
        })?
        .register(op, move |video: Video, p: &Params| {
            let dtype = video.dtype();
            let out = finish(f(video.data(), p, dtype.max_value())?, dtype);
            Ok(video.wrap_like(out)?)
        })?
        .register(op, move |img: DynamicImage, p: &Params| {
            let depth = RasterDepth::of(&img);
            let out = f(&raster_to_tensor(&img)?, p, depth.bound())?;
            tensor_to_raster_as(&out, depth.bound(), depth)
        })?;
    Ok(())
}

fn blend(a: f32, b: f32, ratio: f32, bound: f32) -> f32 {
    (ratio * a + (1.0 - ratio) * b).clamp(0.0, bound)
}

fn factor(params: &Params) -> Result<f32> {
    let factor = params.float("factor")?;
    ensure!(factor >= 0.0, "factor must be non-negative (got {})", factor);
    Ok(factor as f32)
}

/// Luma plane of a `[C, H, W]` image with 1 or 3 channels.
fn luma(image: ArrayView3<f32>) -> Result<Array2<f32>> {
    match image.dim().0 {
        1 => Ok(image.index_axis(Axis(0), 0).to_owned()),
        3 => {
            let mut gray = image.index_axis(Axis(0), 0).mapv(|r| 0.2989 * r);
            gray.scaled_add(0.587, &image.index_axis(Axis(0), 1));
            gray.scaled_add(0.114, &image.index_axis(Axis(0), 2));
            Ok(gray)
        }
        c => bail!("expected 1 or 3 channels, got {c}"),
    }
}

fn for_each_plane(images: &mut Array4<f32>, mut f: impl FnMut(ArrayViewMut2<f32>)) {
    for mut image in images.outer_iter_mut() {
        for plane in image.outer_iter_mut() {
            f(plane);
        }
    }
}

pub fn adjust_brightness(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let factor = factor(params)?;
    Ok(t.mapv(|v| (v * factor).clamp(0.0, bound)).into_shared())
}

pub fn adjust_contrast(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let factor = factor(params)?;
    let (lead, mut images) = to_images(t)?;
    for mut image in images.outer_iter_mut() {
        let mean = luma(image.view())?.mean().unwrap_or(0.0);
        image.mapv_inplace(|v| blend(v, mean, factor, bound));
    }
    from_images(&lead, images)
}

pub fn adjust_saturation(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let factor = factor(params)?;
    if channels(t)? == 1 {
        return Ok(t.clone());
    }
    let (lead, mut images) = to_images(t)?;
    for mut image in images.outer_iter_mut() {
        let gray = luma(image.view())?;
        for mut channel in image.outer_iter_mut() {
            Zip::from(&mut channel)
                .and(&gray)
                .for_each(|v, &g| *v = blend(*v, g, factor, bound));
        }
    }
    from_images(&lead, images)
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let eqc = maxc == minc;
    let cr = maxc - minc;
    let s = cr / if eqc { 1.0 } else { maxc };
    let divisor = if eqc { 1.0 } else { cr };
    let rc = (maxc - r) / divisor;
    let gc = (maxc - g) / divisor;
    let bc = (maxc - b) / divisor;
    let h = if maxc == r {
        bc - gc
    } else if maxc == g {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0 + 1.0).rem_euclid(1.0), s, maxc)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = (v * (1.0 - s)).clamp(0.0, 1.0);
    let q = (v * (1.0 - s * f)).clamp(0.0, 1.0);
    let t = (v * (1.0 - s * (1.0 - f))).clamp(0.0, 1.0);
    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

pub fn adjust_hue(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let shift = params.float("factor")? as f32;
    ensure!(
        (-0.5..=0.5).contains(&shift),
        "hue factor must be in [-0.5, 0.5] (got {})",
        shift
    );
    match channels(t)? {
        1 => return Ok(t.clone()),
        3 => {}
        c => bail!("hue adjustment expects 1 or 3 channels, got {c}"),
    }
    let (lead, mut images) = to_images(t)?;
    for mut image in images.outer_iter_mut() {
        let (mut r, mut rest) = image.view_mut().split_at(Axis(0), 1);
        let (mut g, mut b) = rest.view_mut().split_at(Axis(0), 1);
        Zip::from(&mut r).and(&mut g).and(&mut b).for_each(|r, g, b| {
            let (h, s, v) = rgb_to_hsv(*r / bound, *g / bound, *b / bound);
            let (nr, ng, nb) = hsv_to_rgb((h + shift).rem_euclid(1.0), s, v);
            (*r, *g, *b) = (nr * bound, ng * bound, nb * bound);
        });
    }
    from_images(&lead, images)
}

pub fn adjust_sharpness(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let factor = factor(params)?;
    let (lead, mut images) = to_images(t)?;
    let (_, _, h, w) = images.dim();
    if h <= 2 || w <= 2 {
        return Ok(t.clone());
    }
    for mut image in images.outer_iter_mut() {
        for mut plane in image.outer_iter_mut() {
            let original = plane.to_owned();
            // 3x3 smoothing kernel, centre weight 5, total weight 13; borders untouched.
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    let window = original.slice(s![y - 1..y + 2, x - 1..x + 2]);
                    let mut blurred = (window.sum() + 4.0 * original[[y, x]]) / 13.0;
                    if bound > 1.0 {
                        blurred = blurred.round();
                    }
                    plane[[y, x]] = blend(original[[y, x]], blurred, factor, bound);
                }
            }
        }
    }
    from_images(&lead, images)
}

pub fn posterize(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let bits = params.int("bits")?;
    ensure!((0..=8).contains(&bits), "posterize bits must be in [0, 8] (got {})", bits);
    let out = if bound > 1.0 {
        let mask = !(((1u16 << (8 - bits)) - 1) as u8);
        let scale = 255.0 / bound;
        t.mapv(|v| ((v * scale).round().clamp(0.0, 255.0) as u8 & mask) as f32 / scale)
    } else {
        let levels = (1u32 << bits) as f32;
        t.mapv(|v| (v * levels).floor().clamp(0.0, levels - 1.0) / levels)
    };
    Ok(out.into_shared())
}

pub fn solarize(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let threshold = params.float("threshold")? as f32;
    ensure!(
        threshold <= bound,
        "solarize threshold {} exceeds the value range [0, {}]",
        threshold,
        bound
    );
    Ok(t.mapv(|v| if v >= threshold { bound - v } else { v })
        .into_shared())
}

pub fn autocontrast(t: &Tensor, _: &Params, bound: f32) -> Result<Tensor> {
    let (lead, mut images) = to_images(t)?;
    for_each_plane(&mut images, |mut plane| {
        let min = plane.iter().copied().fold(f32::INFINITY, f32::min);
        let max = plane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max > min {
            let scale = bound / (max - min);
            plane.mapv_inplace(|v| ((v - min) * scale).clamp(0.0, bound));
        }
    });
    from_images(&lead, images)
}

/// Histogram equalisation on the 8-bit grid.
pub fn equalize(t: &Tensor, _: &Params, bound: f32) -> Result<Tensor> {
    let (lead, mut images) = to_images(t)?;
    let scale = 255.0 / bound;
    for_each_plane(&mut images, |mut plane| {
        let bins: Vec<usize> = plane
            .iter()
            .map(|v| (v * scale).round().clamp(0.0, 255.0) as usize)
            .collect();
        let mut hist = [0usize; 256];
        for &bin in &bins {
            hist[bin] += 1;
        }
        let last_nonzero = hist.iter().rev().find(|&&n| n > 0).copied().unwrap_or(0);
        let step = (bins.len() - last_nonzero) / 255;
        if step == 0 {
            return;
        }
        let mut lut = [0f32; 256];
        let mut cumulative = 0usize;
        for (i, count) in hist.iter().enumerate().take(255) {
            cumulative += count;
            lut[i + 1] = ((cumulative + step / 2) / step).min(255) as f32;
        }
        for (v, bin) in plane.iter_mut().zip(bins) {
            *v = lut[bin] / scale;
        }
    });
    from_images(&lead, images)
}

pub fn invert(t: &Tensor, _: &Params, bound: f32) -> Result<Tensor> {
    Ok(t.mapv(|v| bound - v).into_shared())
}

pub fn rgb_to_grayscale(t: &Tensor, params: &Params, _: f32) -> Result<Tensor> {
    let out_channels = params.opt_int("num_output_channels")?.unwrap_or(1);
    ensure!(
        out_channels == 1 || out_channels == 3,
        "num_output_channels must be 1 or 3 (got {})",
        out_channels
    );
    let (lead, images) = to_images(t)?;
    let (b, _, h, w) = images.dim();
    let mut out = Array4::<f32>::zeros((b, out_channels as usize, h, w));
    for (image, mut target) in images.outer_iter().zip(out.outer_iter_mut()) {
        let gray = luma(image)?;
        for mut channel in target.outer_iter_mut() {
            channel.assign(&gray);
        }
    }
    from_images(&lead, out)
}

/// `out[..., i, :, :] = t[..., permutation[i], :, :]`
pub fn permute_channels(t: &Tensor, params: &Params, _: f32) -> Result<Tensor> {
    let c = channels(t)?;
    let permutation: Vec<usize> = params
        .floats("permutation")?
        .into_iter()
        .map(|v| v as usize)
        .collect();
    let mut seen = permutation.clone();
    seen.sort_unstable();
    ensure!(
        seen == (0..c).collect::<Vec<_>>(),
        "permutation {:?} does not reorder {} channels",
        permutation,
        c
    );
    let (lead, images) = to_images(t)?;
    from_images(&lead, images.select(Axis(1), &permutation))
}

// ============================================================================
// Gaussian blur
// ============================================================================

/// Normalised 1D Gaussian taps for an odd `size`.
fn gaussian_taps(size: usize, sigma: f64) -> Vec<f32> {
    let half = (size as f64 - 1.0) / 2.0;
    let taps: Vec<f64> = (0..size)
        .map(|i| {
            let x = (i as f64 - half) / sigma;
            (-0.5 * x * x).exp()
        })
        .collect();
    let total: f64 = taps.iter().sum();
    taps.into_iter().map(|v| (v / total) as f32).collect()
}

/// Mirror index without repeating the edge sample (`dcb|abcd|cba`).
fn reflect(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    (if m < len as isize { m } else { period - m }) as usize
}

fn convolve_rows(plane: &Array2<f32>, taps: &[f32]) -> Array2<f32> {
    let (h, w) = plane.dim();
    let half = (taps.len() / 2) as isize;
    Array2::from_shape_fn((h, w), |(y, x)| {
        taps.iter()
            .enumerate()
            .map(|(k, tap)| tap * plane[[y, reflect(x as isize + k as isize - half, w)]])
            .sum()
    })
}

/// Separable blur with reflected borders; `kernel_size` is `(height, width)`
/// and `sigma` is `[sigma_x, sigma_y]`.
pub fn gaussian_blur(t: &Tensor, params: &Params, bound: f32) -> Result<Tensor> {
    let (kh, kw) = params.size("kernel_size")?;
    ensure!(
        kh % 2 == 1 && kw % 2 == 1,
        "kernel size must be odd and positive (got {}x{})",
        kh,
        kw
    );
    let sigma = params.floats("sigma")?;
    let (sx, sy) = match sigma[..] {
        [s] => (s, s),
        [sx, sy] => (sx, sy),
        ref other => bail!("sigma needs 1 or 2 values, got {}", other.len()),
    };
    ensure!(sx > 0.0 && sy > 0.0, "sigma must be positive (got [{}, {}])", sx, sy);

    let (along_x, along_y) = (gaussian_taps(kw, sx), gaussian_taps(kh, sy));
    let (lead, mut images) = to_images(t)?;
    for_each_plane(&mut images, |mut plane| {
        let horizontal = convolve_rows(&plane.to_owned(), &along_x);
        let vertical = convolve_rows(&horizontal.reversed_axes().as_standard_layout().to_owned(), &along_y);
        let mut blurred = vertical.reversed_axes();
        if bound > 1.0 {
            blurred.mapv_inplace(f32::round);
        }
        plane.assign(&blurred);
    });
    from_images(&lead, images)
}

// ============================================================================
// Normalize
// ============================================================================

fn broadcast_stats(values: Vec<f64>, name: &str, c: usize) -> Result<Vec<f32>> {
    match values.len() {
        1 => Ok(vec![values[0] as f32; c]),
        n if n == c => Ok(values.into_iter().map(|v| v as f32).collect()),
        n => bail!(
            "Channel count mismatch: input has {} channels but normalization {} has {}",
            c,
            name,
            n
        ),
    }
}

/// `output[..., c, h, w] = (input[..., c, h, w] - mean[c]) / std[c]`
pub fn normalize(t: &Tensor, params: &Params) -> Result<Tensor> {
    let c = channels(t)?;
    let mean = broadcast_stats(params.floats("mean")?, "mean", c)?;
    let std = broadcast_stats(params.floats("std")?, "std", c)?;
    ensure!(
        std.iter().all(|s| *s != 0.0),
        "std evaluated to zero, leading to division by zero"
    );
    let (lead, mut images) = to_images(t)?;
    for mut image in images.outer_iter_mut() {
        for (ch, mut plane) in image.outer_iter_mut().enumerate() {
            let (m, s) = (mean[ch], std[ch]);
            plane.mapv_inplace(|v| (v - m) / s);
        }
    }
    from_images(&lead, images)
}

fn ensure_float(dtype: DType) -> Result<()> {
    ensure!(
        dtype == DType::F32,
        "normalize expects float values; convert the dtype first"
    );
    Ok(())
}

pub fn normalize_image(image: Image, params: &Params) -> Result<Image> {
    ensure_float(image.dtype())?;
    Ok(image.wrap_like(normalize(image.data(), params)?)?)
}

pub fn normalize_video(video: Video, params: &Params) -> Result<Video> {
    ensure_float(video.dtype())?;
    Ok(video.wrap_like(normalize(video.data(), params)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::tensor;

    fn values(t: &Tensor) -> Vec<f32> {
        t.iter().copied().collect()
    }

    fn factor(f: f64) -> Params {
        Params::new().with("factor", f)
    }

    #[test]
    fn test_brightness_clamps_to_bound() -> Result<()> {
        let t = tensor(&[1, 1, 2], vec![0.4, 0.8])?;
        assert_eq!(values(&adjust_brightness(&t, &factor(2.0), 1.0)?), vec![0.8, 1.0]);
        Ok(())
    }

    #[test]
    fn test_contrast_zero_gives_mean() -> Result<()> {
        let t = tensor(&[1, 1, 2], vec![0.2, 0.6])?;
        let out = values(&adjust_contrast(&t, &factor(0.0), 1.0)?);
        assert!(out.iter().all(|v| (v - 0.4).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_saturation_zero_gives_gray() -> Result<()> {
        let t = tensor(&[3, 1, 1], vec![1.0, 0.0, 0.0])?;
        let out = values(&adjust_saturation(&t, &factor(0.0), 1.0)?);
        assert!(out.iter().all(|v| (v - 0.2989).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_hue_shift_rotates_primaries() -> Result<()> {
        let red = tensor(&[3, 1, 1], vec![1.0, 0.0, 0.0])?;
        let out = values(&adjust_hue(&red, &factor(1.0 / 3.0), 1.0)?);
        let expected = [0.0, 1.0, 0.0];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{:?}", out);
        }
        assert!(adjust_hue(&red, &factor(0.7), 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_posterize_and_solarize_on_8bit_grid() -> Result<()> {
        let t = tensor(&[1, 1, 3], vec![255.0, 130.0, 7.0])?;
        let out = posterize(&t, &Params::new().with("bits", 1i64), 255.0)?;
        assert_eq!(values(&out), vec![128.0, 128.0, 0.0]);

        let out = solarize(&t, &Params::new().with("threshold", 128.0), 255.0)?;
        assert_eq!(values(&out), vec![0.0, 125.0, 7.0]);
        Ok(())
    }

    #[test]
    fn test_autocontrast_stretches_each_channel() -> Result<()> {
        let t = tensor(&[1, 1, 3], vec![0.25, 0.5, 0.75])?;
        let out = autocontrast(&t, &Params::new(), 1.0)?;
        assert_eq!(values(&out), vec![0.0, 0.5, 1.0]);
        Ok(())
    }

    #[test]
    fn test_equalize_spreads_histogram() -> Result<()> {
        let data: Vec<f32> = (0..1024).map(|v| (v % 64) as f32).collect();
        let t = tensor(&[1, 32, 32], data)?;
        let out = equalize(&t, &Params::new(), 255.0)?;
        let max = out.iter().copied().fold(0.0, f32::max);
        assert!(max > 200.0, "max after equalize was {max}");

        let flat = tensor(&[1, 2, 2], vec![9.0; 4])?;
        assert_eq!(values(&equalize(&flat, &Params::new(), 255.0)?), vec![9.0; 4]);
        Ok(())
    }

    #[test]
    fn test_grayscale_channel_counts() -> Result<()> {
        let t = tensor(&[3, 1, 1], vec![1.0, 1.0, 1.0])?;
        let one = rgb_to_grayscale(&t, &Params::new(), 1.0)?;
        assert_eq!(one.shape(), &[1, 1, 1]);
        let three = rgb_to_grayscale(&t, &Params::new().with("num_output_channels", 3i64), 1.0)?;
        assert_eq!(three.shape(), &[3, 1, 1]);
        let rgba = tensor(&[4, 1, 1], vec![1.0; 4])?;
        assert!(rgb_to_grayscale(&rgba, &Params::new(), 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_normalize() -> Result<()> {
        let t = tensor(&[3, 4, 4], vec![1.0; 48])?;
        let params = Params::new().with("mean", vec![1.0; 3]).with("std", vec![1.0; 3]);
        let out = normalize(&t, &params)?;
        assert!(out.iter().all(|v| v.abs() < 1e-5));

        let bad = Params::new().with("mean", vec![0.5; 2]).with("std", vec![1.0; 2]);
        assert!(normalize(&t, &bad).is_err());

        let u8_image = Image::new(t)?.with_dtype(DType::U8);
        assert!(normalize_image(u8_image, &params).is_err());
        Ok(())
    }

    #[test]
    fn test_gaussian_blur_spreads_an_impulse() -> Result<()> {
        let mut data = vec![0.0; 25];
        data[12] = 1.0;
        let t = tensor(&[1, 5, 5], data)?;
        let params = Params::new().with("kernel_size", (3usize, 3usize)).with("sigma", vec![1.0]);
        let out = gaussian_blur(&t, &params, 1.0)?;

        let total: f32 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(out[[0, 2, 2]] < 1.0 && out[[0, 2, 1]] > 0.0);
        assert_eq!(out[[0, 2, 1]], out[[0, 2, 3]]);
        assert_eq!(out[[0, 1, 2]], out[[0, 3, 2]]);
        assert_eq!(out[[0, 0, 0]], 0.0);

        let flat = tensor(&[1, 2, 2], vec![0.5; 4])?;
        let wide = Params::new().with("kernel_size", (5usize, 5usize)).with("sigma", vec![2.0, 0.5]);
        assert!(gaussian_blur(&flat, &wide, 1.0)?.iter().all(|v| (v - 0.5).abs() < 1e-6));

        let even = Params::new().with("kernel_size", (2usize, 3usize)).with("sigma", vec![1.0]);
        assert!(gaussian_blur(&t, &even, 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_16bit_raster_adjusts_at_full_depth() -> Result<()> {
        use crate::datapoints::Value;
        use crate::dispatch::registry;
        use image::{ImageBuffer, Luma};

        let gray = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(2, 1, vec![1000, 40000])
            .ok_or_else(|| anyhow::anyhow!("buffer size"))?;
        let out = registry().dispatch("adjust_brightness", Value::Raster(DynamicImage::ImageLuma16(gray)), &factor(2.0))?;
        let Value::Raster(img) = out else {
            bail!("expected a raster");
        };
        let img = img.as_luma16().ok_or_else(|| anyhow::anyhow!("expected a 16-bit raster"))?;
        assert_eq!(img.as_raw(), &vec![2000, 65535]);
        Ok(())
    }

    #[test]
    fn test_permute_channels_reorders_planes() -> Result<()> {
        let t = tensor(&[3, 1, 1], vec![1.0, 2.0, 3.0])?;
        let params = Params::new().with("permutation", vec![2.0, 0.0, 1.0]);
        assert_eq!(values(&permute_channels(&t, &params, 1.0)?), vec![3.0, 1.0, 2.0]);

        let repeated = Params::new().with("permutation", vec![0.0, 0.0, 1.0]);
        assert!(permute_channels(&t, &repeated, 1.0).is_err());
        Ok(())
    }
}
