//! Axis ticks at integer multiples of a parameter error from its best-fit value.

use crate::cost::format_general;

/// More ticks than this means `sigma` is negligible against the view.
const MAX_TICKS: f64 = 1000.0;

/// Tick positions `center + k·sigma` for every integer `k` with the tick inside
/// (or on the truncation boundary of) `[vmin, vmax]`.
///
/// The multiples are truncated towards zero, so a view that does not reach a full
/// `sigma` away from `center` still gets a tick at `center`. No ticks are placed
/// when there would be more than [`MAX_TICKS`].
pub fn sigma_ticks(center: f64, sigma: f64, vmin: f64, vmax: f64) -> Vec<f64> {
    if !(sigma.is_finite() && sigma > 0.0) || !vmin.is_finite() || !vmax.is_finite() {
        return Vec::new();
    }
    let n_dn = ((vmin - center) / sigma).trunc();
    let n_up = ((vmax - center) / sigma).trunc();
    if !(n_up - n_dn < MAX_TICKS) {
        return Vec::new();
    }
    let (n_dn, n_up) = (n_dn as i64, n_up as i64);
    (n_dn..=n_up).map(|k| k as f64 * sigma + center).collect()
}

/// Label of a tick at `x`: its distance from `center` in units of `sigma`, e.g. `-2σ`.
pub fn sigma_tick_label(x: f64, center: f64, sigma: f64) -> String {
    format!("{}σ", format_general((x - center) / sigma, 2))
}
