//! Choropleth color mapping

use crate::{MapError, Result, ValueRange};
use std::fmt;
use std::str::FromStr;

/// 8-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = MapError;

    /// Parse `#rrggbb` or `#rgb` (leading `#` optional)
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || MapError::InvalidColor(s.to_string());
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        match hex.len() {
            6 => Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            3 => {
                let short = |i: usize| channel(i..i + 1).map(|v| v * 17);
                Ok(Rgb::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

/// Preferred fill for features without an aggregated value
///
/// A neutral gray, kept off the default ramp. Ramps that pass near it get a
/// different fallback from [`Palette::fallback`].
pub const NEUTRAL_FALLBACK: Rgb = Rgb::new(0xcc, 0xcc, 0xcc);

/// Minimum RGB distance between a fallback and the ramp it stands beside
const FALLBACK_CLEARANCE: f64 = 40.0;

/// Tried in order when the preferred fallback is too close to the ramp
const FALLBACK_CANDIDATES: [Rgb; 8] = [
    Rgb::new(0x99, 0x99, 0x99),
    Rgb::new(0x66, 0x66, 0x66),
    Rgb::new(0x9e, 0xca, 0xe1),
    Rgb::new(0xc2, 0xa5, 0xcf),
    Rgb::new(0xa6, 0xdb, 0xa0),
    Rgb::new(0xfd, 0xb8, 0x63),
    Rgb::new(0xe6, 0xe6, 0xe6),
    Rgb::new(0x33, 0x33, 0x33),
];

/// Two-color ramp from the lowest to the highest value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Palette {
    pub low: Rgb,
    pub high: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            low: Rgb::new(0xff, 0xff, 0xcc),
            high: Rgb::new(0xbd, 0x00, 0x26),
        }
    }
}

impl Palette {
    pub fn new(low: Rgb, high: Rgb) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn colors(&self) -> [Rgb; 2] {
        [self.low, self.high]
    }

    /// Color of `value` within `range`
    #[inline]
    pub fn color_for(&self, value: f64, range: ValueRange) -> Rgb {
        color_for(value, range.min, range.max, self.colors())
    }

    /// Euclidean RGB distance from `color` to the low-high segment
    pub fn distance_to(&self, color: Rgb) -> f64 {
        let channels = |c: Rgb| [c.r as f64, c.g as f64, c.b as f64];
        let (low, high, point) = (channels(self.low), channels(self.high), channels(color));

        let dir: [f64; 3] = std::array::from_fn(|i| high[i] - low[i]);
        let len2: f64 = dir.iter().map(|d| d * d).sum();
        let t = if len2 == 0.0 {
            0.0
        } else {
            ((0..3).map(|i| (point[i] - low[i]) * dir[i]).sum::<f64>() / len2).clamp(0.0, 1.0)
        };
        (0..3)
            .map(|i| point[i] - (low[i] + dir[i] * t))
            .map(|d| d * d)
            .sum::<f64>()
            .sqrt()
    }

    /// "No data" fill for this ramp
    ///
    /// `preferred` when it stays clear of every interpolated color, else the first
    /// clear candidate, else whichever candidate lies farthest from the ramp.
    pub fn fallback(&self, preferred: Rgb) -> Rgb {
        let mut options = std::iter::once(preferred).chain(FALLBACK_CANDIDATES);
        if let Some(clear) = options.find(|c| self.distance_to(*c) >= FALLBACK_CLEARANCE) {
            return clear;
        }
        std::iter::once(preferred)
            .chain(FALLBACK_CANDIDATES)
            .max_by(|a, b| self.distance_to(*a).total_cmp(&self.distance_to(*b)))
            .unwrap_or(preferred)
    }
}

/// Linearly interpolate between the two palette colors
///
/// The position is clamped to `[0, 1]`; a zero-width range maps everything to the
/// midpoint color.
pub fn color_for(value: f64, min: f64, max: f64, palette: [Rgb; 2]) -> Rgb {
    let t = if max == min {
        0.5
    } else {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    };
    let t = if t.is_nan() { 0.5 } else { t };

    let [c1, c2] = palette;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgb::new(lerp(c1.r, c2.r), lerp(c1.g, c2.g), lerp(c1.b, c2.b))
}

/// One legend entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendStop {
    pub value: f64,
    pub color: Rgb,
}

/// `count` evenly spaced legend entries from `range.min` to `range.max`
pub fn legend_stops(range: ValueRange, palette: &Palette, count: usize) -> Vec<LegendStop> {
    if count < 2 || range.max == range.min {
        return vec![LegendStop {
            value: range.min,
            color: palette.color_for(range.min, range),
        }];
    }
    (0..count)
        .map(|i| {
            let value = range.min + (range.max - range.min) * i as f64 / (count - 1) as f64;
            LegendStop {
                value,
                color: palette.color_for(value, range),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb = Rgb::new(0, 0, 0);
    const WHITE: Rgb = Rgb::new(255, 255, 255);

    #[test]
    fn test_midpoint_is_gray() {
        assert_eq!(color_for(5.0, 0.0, 10.0, [BLACK, WHITE]), Rgb::new(128, 128, 128));
    }

    #[test]
    fn test_degenerate_range_is_midpoint() {
        let color = color_for(42.0, 5.0, 5.0, [BLACK, WHITE]);
        assert_eq!(color, Rgb::new(128, 128, 128));
        assert_eq!(color_for(5.0, 5.0, 5.0, [BLACK, WHITE]), color);
    }

    #[test]
    fn test_clamped_to_palette_ends() {
        assert_eq!(color_for(-100.0, 0.0, 10.0, [BLACK, WHITE]), BLACK);
        assert_eq!(color_for(0.0, 0.0, 10.0, [BLACK, WHITE]), BLACK);
        assert_eq!(color_for(10.0, 0.0, 10.0, [BLACK, WHITE]), WHITE);
        assert_eq!(color_for(1e9, 0.0, 10.0, [BLACK, WHITE]), WHITE);
    }

    #[test]
    fn test_per_channel_interpolation() {
        let low = Rgb::new(0, 100, 200);
        let high = Rgb::new(100, 100, 0);
        assert_eq!(color_for(0.25, 0.0, 1.0, [low, high]), Rgb::new(25, 100, 150));
    }

    #[test]
    fn test_fallback_is_off_default_ramp() {
        let palette = Palette::default();
        let range = ValueRange { min: 0.0, max: 1000.0 };
        for i in 0..=1000 {
            assert_ne!(palette.color_for(i as f64, range), NEUTRAL_FALLBACK);
        }
    }

    #[test]
    fn test_fallback_kept_when_clear_of_ramp() {
        assert_eq!(Palette::default().fallback(NEUTRAL_FALLBACK), NEUTRAL_FALLBACK);
        let red_blue = Palette::new(Rgb::new(255, 0, 0), Rgb::new(0, 0, 255));
        assert_eq!(red_blue.fallback(NEUTRAL_FALLBACK), NEUTRAL_FALLBACK);
    }

    #[test]
    fn test_fallback_moves_off_gray_ramp() {
        let palette = Palette::new(BLACK, WHITE);
        let range = ValueRange { min: 0.0, max: 100.0 };
        assert_eq!(palette.color_for(80.0, range), NEUTRAL_FALLBACK);

        let fallback = palette.fallback(NEUTRAL_FALLBACK);
        assert_ne!(fallback, NEUTRAL_FALLBACK);
        assert!(palette.distance_to(fallback) >= FALLBACK_CLEARANCE);
    }

    #[test]
    fn test_fallback_differs_from_every_ramp_color() {
        let palettes = [
            Palette::default(),
            Palette::new(BLACK, WHITE),
            Palette::new(WHITE, BLACK),
            Palette::new(NEUTRAL_FALLBACK, NEUTRAL_FALLBACK),
            Palette::new(Rgb::new(0x99, 0x99, 0x99), Rgb::new(0x9e, 0xca, 0xe1)),
            Palette::new(Rgb::new(0xc2, 0xa5, 0xcf), Rgb::new(0xa6, 0xdb, 0xa0)),
            Palette::new(Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)),
        ];
        let range = ValueRange { min: 0.0, max: 1000.0 };
        for palette in palettes {
            let fallback = palette.fallback(NEUTRAL_FALLBACK);
            for i in 0..=1000 {
                assert_ne!(
                    palette.color_for(i as f64, range),
                    fallback,
                    "{} -> {} at {i}",
                    palette.low,
                    palette.high
                );
            }
        }
    }

    #[test]
    fn test_distance_to_ramp() {
        let palette = Palette::new(BLACK, WHITE);
        assert!(palette.distance_to(Rgb::new(7, 7, 7)) < 1e-9);
        let red = palette.distance_to(Rgb::new(255, 0, 0));
        assert!((red - (2.0f64 / 3.0).sqrt() * 255.0).abs() < 1e-9);

        // Beyond the ends the distance is to the nearest endpoint
        let short = Palette::new(BLACK, Rgb::new(10, 0, 0));
        assert!((short.distance_to(Rgb::new(13, 4, 0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!("#bd0026".parse::<Rgb>().unwrap(), Rgb::new(0xbd, 0x00, 0x26));
        assert_eq!("ffffcc".parse::<Rgb>().unwrap(), Rgb::new(0xff, 0xff, 0xcc));
        assert_eq!("#fff".parse::<Rgb>().unwrap(), WHITE);
        assert!("#ggg000".parse::<Rgb>().is_err());
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#ééé".parse::<Rgb>().is_err());
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102ff");
    }

    #[test]
    fn test_legend_stops() {
        let palette = Palette::new(BLACK, WHITE);
        let stops = legend_stops(ValueRange { min: 0.0, max: 100.0 }, &palette, 5);
        assert_eq!(stops.len(), 5);
        assert_eq!(stops[0].color, BLACK);
        assert_eq!(stops[2].value, 50.0);
        assert_eq!(stops[4].color, WHITE);

        let single = legend_stops(ValueRange { min: 3.0, max: 3.0 }, &palette, 5);
        assert_eq!(single.len(), 1);
    }
}
