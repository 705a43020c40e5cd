//! Colors and color math
//!
//! [`ColorValue`] is an sRGB triple with named adjustment methods. The
//! perceptual adjustments go through HSLuv so that "darken by 10" looks the
//! same across hues. The conversions are pure functions over `[f64; 3]`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorValue {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorValue {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xrrggbb` → color; out-of-range integers are rejected
    pub fn from_hex_int(n: i64) -> Option<Self> {
        if !(0..=0xff_ffff).contains(&n) {
            return None;
        }
        Some(Self::new((n >> 16) as u8, (n >> 8) as u8, n as u8))
    }

    pub fn to_hex_int(self) -> i64 {
        (i64::from(self.r) << 16) | (i64::from(self.g) << 8) | i64::from(self.b)
    }

    /// Lowercase `#rrggbb`
    pub fn to_hex_string(self) -> String {
        format!("#{:06x}", self.to_hex_int())
    }

    /// From HSL with hue in degrees, saturation and lightness in 0..1
    pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
        Self::from_unit_rgb(hsl_to_rgb([h, s, l]))
    }

    /// From HSLuv with hue in degrees, saturation and lightness in 0..1
    pub fn from_hsluv(h: f64, s: f64, l: f64) -> Self {
        Self::from_unit_rgb(hsluv_to_rgb([h, s * 100.0, l * 100.0]))
    }

    pub fn from_unit_rgb(rgb: [f64; 3]) -> Self {
        let [r, g, b] = rgb.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8);
        Self::new(r, g, b)
    }

    pub fn to_unit_rgb(self) -> [f64; 3] {
        [self.r, self.g, self.b].map(|c| f64::from(c) / 255.0)
    }

    /// `[hue 0..360, saturation 0..100, lightness 0..100]`
    pub fn to_hsluv(self) -> [f64; 3] {
        rgb_to_hsluv(self.to_unit_rgb())
    }

    fn with_hsluv(f: impl FnOnce([f64; 3]) -> [f64; 3], color: Self) -> Self {
        Self::from_unit_rgb(hsluv_to_rgb(f(color.to_hsluv())))
    }

    pub fn darken(self, amount: f64) -> Self {
        Self::with_hsluv(|[h, s, l]| [h, s, (l - amount).max(0.0)], self)
    }

    pub fn lighten(self, amount: f64) -> Self {
        Self::with_hsluv(|[h, s, l]| [h, s, (l + amount).min(100.0)], self)
    }

    pub fn saturate(self, amount: f64) -> Self {
        Self::with_hsluv(|[h, s, l]| [h, (s + amount).min(100.0), l], self)
    }

    pub fn desaturate(self, amount: f64) -> Self {
        Self::with_hsluv(|[h, s, l]| [h, (s - amount).max(0.0), l], self)
    }

    pub fn spin(self, degrees: f64) -> Self {
        Self::with_hsluv(|[h, s, l]| [(h + degrees).rem_euclid(360.0), s, l], self)
    }

    pub fn greyscale(self) -> Self {
        Self::with_hsluv(|[h, _, l]| [h, 0.0, l], self)
    }

    /// Blend in HSLuv. `weight` is the percentage of `self` (0..100); hue
    /// travels the short way round the wheel.
    pub fn mix(self, other: ColorValue, weight: f64) -> Self {
        let p = weight / 100.0;
        let [h1, s1, l1] = self.to_hsluv();
        let [h2, s2, l2] = other.to_hsluv();

        let mut h_diff = h2 - h1;
        if h_diff > 180.0 {
            h_diff -= 360.0;
        }
        if h_diff < -180.0 {
            h_diff += 360.0;
        }
        let h = (h1 + h_diff * (1.0 - p)).rem_euclid(360.0);
        let s = s1 * p + s2 * (1.0 - p);
        let l = l1 * p + l2 * (1.0 - p);
        Self::from_unit_rgb(hsluv_to_rgb([h, s, l]))
    }

    /// Per-channel sRGB blend; `weight` is the percentage of `self`
    pub fn rgb_mix(self, other: ColorValue, weight: f64) -> Self {
        let p = weight / 100.0;
        let blend = |a: u8, b: u8| (f64::from(a) * p + f64::from(b) * (1.0 - p)).round() as u8;
        Self::new(
            blend(self.r, other.r),
            blend(self.g, other.g),
            blend(self.b, other.b),
        )
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

// ============ HSL ============

/// HSL (hue degrees, s/l 0..1) → sRGB 0..1
pub fn hsl_to_rgb([h, s, l]: [f64; 3]) -> [f64; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let (r1, g1, b1) = if h_prime < 1.0 {
        (c, x, 0.0)
    } else if h_prime < 2.0 {
        (x, c, 0.0)
    } else if h_prime < 3.0 {
        (0.0, c, x)
    } else if h_prime < 4.0 {
        (0.0, x, c)
    } else if h_prime < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };
    let m = l - c / 2.0;
    [r1 + m, g1 + m, b1 + m]
}

/// sRGB 0..1 → HSL (hue degrees, s/l 0..1)
pub fn rgb_to_hsl([r, g, b]: [f64; 3]) -> [f64; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return [0.0, 0.0, l];
    }
    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let h = if max == r {
        60.0 * ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    [h, s, l]
}

// ============ HSLuv ============

const M: [[f64; 3]; 3] = [
    [3.240969941904521, -1.537383177570093, -0.498610760293],
    [-0.96924363628087, 1.87596750150772, 0.041555057407175],
    [0.055630079696993, -0.20397695888897, 1.056971514242878],
];

const M_INV: [[f64; 3]; 3] = [
    [0.41239079926595, 0.35758433938387, 0.18048078840183],
    [0.21263900587151, 0.71516867876775, 0.072192315360733],
    [0.019330818715591, 0.11919477979462, 0.95053215224966],
];

const REF_U: f64 = 0.19783000664283;
const REF_V: f64 = 0.46831999493879;
const KAPPA: f64 = 903.2962962;
const EPSILON: f64 = 0.0088564516;

/// HSLuv (hue degrees, s/l 0..100) → sRGB 0..1
pub fn hsluv_to_rgb(hsl: [f64; 3]) -> [f64; 3] {
    xyz_to_rgb(luv_to_xyz(lch_to_luv(hsluv_to_lch(hsl))))
}

/// sRGB 0..1 → HSLuv (hue degrees, s/l 0..100)
pub fn rgb_to_hsluv(rgb: [f64; 3]) -> [f64; 3] {
    lch_to_hsluv(luv_to_lch(xyz_to_luv(rgb_to_xyz(rgb))))
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn from_linear(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn to_linear(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn xyz_to_rgb(xyz: [f64; 3]) -> [f64; 3] {
    M.map(|row| from_linear(dot(&row, &xyz)))
}

fn rgb_to_xyz(rgb: [f64; 3]) -> [f64; 3] {
    let linear = rgb.map(to_linear);
    M_INV.map(|row| dot(&row, &linear))
}

fn y_to_l(y: f64) -> f64 {
    if y <= EPSILON {
        y * KAPPA
    } else {
        116.0 * y.cbrt() - 16.0
    }
}

fn l_to_y(l: f64) -> f64 {
    if l <= 8.0 {
        l / KAPPA
    } else {
        ((l + 16.0) / 116.0).powi(3)
    }
}

fn xyz_to_luv([x, y, z]: [f64; 3]) -> [f64; 3] {
    let divider = x + 15.0 * y + 3.0 * z;
    let l = y_to_l(y);
    if l == 0.0 || divider == 0.0 {
        return [0.0, 0.0, 0.0];
    }
    let var_u = 4.0 * x / divider;
    let var_v = 9.0 * y / divider;
    [l, 13.0 * l * (var_u - REF_U), 13.0 * l * (var_v - REF_V)]
}

fn luv_to_xyz([l, u, v]: [f64; 3]) -> [f64; 3] {
    if l == 0.0 {
        return [0.0, 0.0, 0.0];
    }
    let var_u = u / (13.0 * l) + REF_U;
    let var_v = v / (13.0 * l) + REF_V;
    let y = l_to_y(l);
    let x = -(9.0 * y * var_u) / ((var_u - 4.0) * var_v - var_u * var_v);
    let z = (9.0 * y - 15.0 * var_v * y - var_v * x) / (3.0 * var_v);
    [x, y, z]
}

fn luv_to_lch([l, u, v]: [f64; 3]) -> [f64; 3] {
    let c = (u * u + v * v).sqrt();
    let h = if c < 1e-8 {
        0.0
    } else {
        v.atan2(u).to_degrees().rem_euclid(360.0)
    };
    [l, c, h]
}

fn lch_to_luv([l, c, h]: [f64; 3]) -> [f64; 3] {
    let rad = h.to_radians();
    [l, rad.cos() * c, rad.sin() * c]
}

/// Lines bounding the sRGB gamut in the chroma plane at lightness `l`
fn gamut_bounds(l: f64) -> [(f64, f64); 6] {
    let sub1 = (l + 16.0).powi(3) / 1_560_896.0;
    let sub2 = if sub1 > EPSILON { sub1 } else { l / KAPPA };
    let mut out = [(0.0, 0.0); 6];
    for (c, [m1, m2, m3]) in M.iter().enumerate() {
        for t in 0..2 {
            let t = f64::from(t);
            let top1 = (284_517.0 * m1 - 94_839.0 * m3) * sub2;
            let top2 = (838_422.0 * m3 + 769_860.0 * m2 + 731_718.0 * m1) * l * sub2
                - 769_860.0 * t * l;
            let bottom = (632_260.0 * m3 - 126_452.0 * m2) * sub2 + 126_452.0 * t;
            out[c * 2 + t as usize] = (top1 / bottom, top2 / bottom);
        }
    }
    out
}

fn max_chroma(l: f64, h: f64) -> f64 {
    let theta = h.to_radians();
    gamut_bounds(l)
        .iter()
        .filter_map(|(slope, intercept)| {
            let len = intercept / (theta.sin() - slope * theta.cos());
            (len >= 0.0).then_some(len)
        })
        .fold(f64::MAX, f64::min)
}

fn hsluv_to_lch([h, s, l]: [f64; 3]) -> [f64; 3] {
    if l > 99.999_999_9 {
        return [100.0, 0.0, h];
    }
    if l < 1e-8 {
        return [0.0, 0.0, h];
    }
    [l, max_chroma(l, h) / 100.0 * s, h]
}

fn lch_to_hsluv([l, c, h]: [f64; 3]) -> [f64; 3] {
    if l > 99.999_999_9 {
        return [h, 0.0, 100.0];
    }
    if l < 1e-8 {
        return [h, 0.0, 0.0];
    }
    [h, c / max_chroma(l, h) * 100.0, l]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: ColorValue, b: ColorValue) -> bool {
        a.r.abs_diff(b.r) <= 1 && a.g.abs_diff(b.g) <= 1 && a.b.abs_diff(b.b) <= 1
    }

    #[test]
    fn hex_round_trip() {
        let c = ColorValue::from_hex_int(0x888888).unwrap();
        assert_eq!(c, ColorValue::new(0x88, 0x88, 0x88));
        assert_eq!(c.to_hex_string(), "#888888");
        assert_eq!(c.to_hex_int(), 0x888888);
        assert!(ColorValue::from_hex_int(-1).is_none());
        assert!(ColorValue::from_hex_int(0x1_000_000).is_none());
    }

    #[test]
    fn hsluv_extremes() {
        let [_, _, l] = rgb_to_hsluv([1.0, 1.0, 1.0]);
        assert!((l - 100.0).abs() < 1e-6);
        let [_, _, l] = rgb_to_hsluv([0.0, 0.0, 0.0]);
        assert!(l.abs() < 1e-6);
    }

    #[test]
    fn hsluv_round_trip_is_stable() {
        for c in [
            ColorValue::new(200, 30, 40),
            ColorValue::new(12, 180, 90),
            ColorValue::new(40, 60, 220),
            ColorValue::new(128, 128, 128),
        ] {
            let back = ColorValue::from_unit_rgb(hsluv_to_rgb(c.to_hsluv()));
            assert!(close(c, back), "{c} came back as {back}");
        }
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(ColorValue::from_hsl(0.0, 1.0, 0.5), ColorValue::new(255, 0, 0));
        assert_eq!(ColorValue::from_hsl(120.0, 1.0, 0.5), ColorValue::new(0, 255, 0));
        assert_eq!(ColorValue::from_hsl(240.0, 1.0, 0.5), ColorValue::new(0, 0, 255));
        let [h, s, l] = rgb_to_hsl([1.0, 0.0, 0.0]);
        assert_eq!((h, s, l), (0.0, 1.0, 0.5));
    }

    #[test]
    fn darken_and_lighten_move_lightness() {
        let c = ColorValue::new(100, 150, 200);
        let [_, _, l] = c.to_hsluv();
        let [_, _, darker] = c.darken(10.0).to_hsluv();
        let [_, _, lighter] = c.lighten(10.0).to_hsluv();
        assert!(darker < l);
        assert!(lighter > l);
        assert_eq!(c.darken(200.0), ColorValue::new(0, 0, 0));
    }

    #[test]
    fn greyscale_has_no_saturation() {
        let g = ColorValue::new(200, 60, 30).greyscale();
        assert!(g.r.abs_diff(g.g) <= 1 && g.g.abs_diff(g.b) <= 1);
    }

    #[test]
    fn mix_endpoints() {
        let a = ColorValue::new(200, 30, 40);
        let b = ColorValue::new(40, 60, 220);
        assert!(close(a.mix(b, 100.0), a));
        assert!(close(a.mix(b, 0.0), b));
        assert_eq!(a.rgb_mix(b, 50.0), ColorValue::new(120, 45, 130));
    }

    #[test]
    fn spin_full_turn_is_identity() {
        let c = ColorValue::new(12, 180, 90);
        assert!(close(c.spin(360.0), c));
    }
}
