//! Per-image map tensors and resampling.
//!
//! All maps are `(H, W[, C])` tensors in row-major order. Normal maps come
//! out of the estimator as RGB values in `[0, 1]` and are remapped to XYZ
//! components in `[-1, 1]` when the fitting batch is built; kappa maps are
//! per-pixel concentration values convertible to an angular uncertainty.

use ndarray::{Array2, Array3};

use footfit_core::Real;

/// Per-pixel surface normals, `(H, W, 3)`, RGB-encoded in `[0, 1]`.
pub type NormalMap = Array3<f32>;

/// Per-pixel concentration (kappa) values, `(H, W)`.
pub type KappaMap = Array2<f32>;

/// Binary foreground mask, `(H, W)`, values 0.0 or 1.0.
pub type SilhouetteMask = Array2<f32>;

/// Convert a concentration value to an angular uncertainty in degrees.
///
/// `alpha = 2κ/(κ²+1) + e^{-κπ}·π / (1 + e^{-κπ})`, in radians; κ = 0 maps
/// to 90° (no information), large κ approaches 0°.
pub fn kappa_to_alpha_deg(kappa: f32) -> f32 {
    let kappa = Real::from(kappa);
    let exp_term = (-kappa * std::f64::consts::PI).exp();
    let alpha = (2.0 * kappa) / (kappa * kappa + 1.0)
        + (exp_term * std::f64::consts::PI) / (1.0 + exp_term);
    alpha.to_degrees() as f32
}

/// Threshold a kappa map into a confident-normal mask: pixels whose angular
/// uncertainty is below `max_alpha_deg` become foreground.
pub fn silhouette_from_kappa(kappa: &KappaMap, max_alpha_deg: f32) -> SilhouetteMask {
    kappa.mapv(|k| {
        if kappa_to_alpha_deg(k) < max_alpha_deg {
            1.0
        } else {
            0.0
        }
    })
}

/// Remap an RGB-encoded normal map to XYZ components in `[-1, 1]`.
pub fn normal_rgb_to_xyz(normal: &NormalMap) -> NormalMap {
    normal.mapv(|v| v * 2.0 - 1.0)
}

fn sample_bilinear(get: impl Fn(usize, usize) -> f32, h: usize, w: usize, y: f32, x: f32) -> f32 {
    let y = y.clamp(0.0, (h - 1) as f32);
    let x = x.clamp(0.0, (w - 1) as f32);
    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = y - y0 as f32;
    let fx = x - x0 as f32;

    let top = get(y0, x0) * (1.0 - fx) + get(y0, x1) * fx;
    let bottom = get(y1, x0) * (1.0 - fx) + get(y1, x1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Bilinear resize of a single-channel map to `(out_h, out_w)`.
pub fn resize_bilinear2(src: &Array2<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (h, w) = src.dim();
    let sy = h as f32 / out_h as f32;
    let sx = w as f32 / out_w as f32;
    Array2::from_shape_fn((out_h, out_w), |(i, j)| {
        let y = (i as f32 + 0.5) * sy - 0.5;
        let x = (j as f32 + 0.5) * sx - 0.5;
        sample_bilinear(|r, c| src[(r, c)], h, w, y, x)
    })
}

/// Bilinear resize of a multi-channel map to `(out_h, out_w, C)`.
pub fn resize_bilinear3(src: &Array3<f32>, out_h: usize, out_w: usize) -> Array3<f32> {
    let (h, w, channels) = src.dim();
    let sy = h as f32 / out_h as f32;
    let sx = w as f32 / out_w as f32;
    Array3::from_shape_fn((out_h, out_w, channels), |(i, j, c)| {
        let y = (i as f32 + 0.5) * sy - 0.5;
        let x = (j as f32 + 0.5) * sx - 0.5;
        sample_bilinear(|r, k| src[(r, k, c)], h, w, y, x)
    })
}

/// Re-binarize a resampled mask: interpolated values above 0.5 are
/// foreground.
pub fn binarize(mask: &Array2<f32>) -> SilhouetteMask {
    mask.mapv(|v| if v > 0.5 { 1.0 } else { 0.0 })
}
