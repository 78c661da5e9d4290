//! Web-Mercator slippy-map tile math.

use std::f64::consts::PI;

/// Highest zoom level served by common tile providers.
pub const MAX_ZOOM: u8 = 19;

/// Zoom used when the caller does not ask for one.
pub const DEFAULT_ZOOM: u8 = 10;

/// Converts a coordinate to tile indices at the given zoom level.
///
/// With `n = 2^zoom` tiles per axis:
/// `x = floor((lon + 180) / 360 * n)` and
/// `y = floor((1 - asinh(tan(lat)) / π) / 2 * n)`.
/// Indices are clamped to `0..n` so the antimeridian and latitudes past the
/// Mercator limit still land on a real tile.
#[must_use]
pub fn tile_indices(latitude: f64, longitude: f64, zoom: u8) -> (u32, u32) {
    let n = f64::from(1u32 << zoom.min(MAX_ZOOM));
    let x = ((longitude + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - latitude.to_radians().tan().asinh() / PI) / 2.0 * n).floor();
    (clamp_index(x, n), clamp_index(y, n))
}

fn clamp_index(value: f64, n: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, n - 1.0) as u32
}

/// Substitutes `{z}`, `{x}` and `{y}` into a tile URL template.
#[must_use]
pub fn fill_template(template: &str, zoom: u8, x: u32, y: u32) -> String {
    template
        .replace("{z}", &zoom.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}
