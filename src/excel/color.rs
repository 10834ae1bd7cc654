//! Theme color and tint resolution

use serde::{Deserialize, Serialize};

/// Default Office theme: light 1, dark 1, light 2, dark 2, accents 1-6,
/// hyperlink, followed hyperlink
const DEFAULT_THEME: [&str; 12] = [
    "#FFFFFF", "#000000", "#E7E6E6", "#44546A", "#4472C4", "#ED7D31", "#A5A5A5", "#FFC000",
    "#5B9BD5", "#70AD47", "#0563C1", "#954F72",
];

/// A color as a workbook declares it: explicit ARGB/RGB hex, or a theme
/// index with an optional tint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorDescriptor {
    pub argb: Option<String>,
    pub rgb: Option<String>,
    pub theme: Option<i64>,
    pub tint: Option<f64>,
}

impl ColorDescriptor {
    pub fn argb(hex: impl Into<String>) -> Self {
        Self {
            argb: Some(hex.into()),
            ..Default::default()
        }
    }

    pub fn theme(index: i64, tint: Option<f64>) -> Self {
        Self {
            theme: Some(index),
            tint,
            ..Default::default()
        }
    }
}

/// What a color is used for; decides the fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    Font,
    Fill,
    Border,
}

impl ColorRole {
    pub fn default_hex(self) -> &'static str {
        match self {
            ColorRole::Font | ColorRole::Border => "#000000",
            ColorRole::Fill => "#FFFFFF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn parse(hex: &str) -> Option<Rgb> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let hex = match hex.len() {
            8 => &hex[2..],
            6 => hex,
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    fn tinted(self, tint: f64) -> Rgb {
        Rgb(
            apply_tint(self.0, tint),
            apply_tint(self.1, tint),
            apply_tint(self.2, tint),
        )
    }
}

/// Lighten (`tint > 0`) or darken (`tint < 0`) one channel
pub fn apply_tint(channel: u8, tint: f64) -> u8 {
    let c = f64::from(channel);
    let adjusted = if tint < 0.0 {
        c * (1.0 + tint)
    } else if tint > 0.0 {
        c + (255.0 - c) * tint
    } else {
        c
    };
    adjusted.round().clamp(0.0, 255.0) as u8
}

/// Resolves color descriptors against one theme palette. Build once per
/// decode and pass by reference.
#[derive(Debug, Clone)]
pub struct ColorResolver {
    palette: Vec<Rgb>,
}

impl Default for ColorResolver {
    fn default() -> Self {
        Self {
            palette: DEFAULT_THEME.iter().filter_map(|hex| Rgb::parse(hex)).collect(),
        }
    }
}

impl ColorResolver {
    /// Resolve to `#RRGGBB`, falling back to the role default
    pub fn resolve(&self, descriptor: &ColorDescriptor, role: ColorRole) -> String {
        self.try_resolve(descriptor)
            .unwrap_or_else(|| role.default_hex().to_string())
    }

    /// Resolve to `#RRGGBB`; `None` when the descriptor is empty or malformed
    pub fn try_resolve(&self, descriptor: &ColorDescriptor) -> Option<String> {
        if let Some(argb) = &descriptor.argb {
            return Rgb::parse(argb).map(Rgb::hex);
        }
        if let Some(rgb) = &descriptor.rgb {
            return Rgb::parse(rgb).map(Rgb::hex);
        }
        let index = usize::try_from(descriptor.theme?).ok()?;
        let base = *self.palette.get(index)?;
        let tint = descriptor.tint.unwrap_or(0.0);
        if !tint.is_finite() {
            return None;
        }
        Some(base.tinted(tint).hex())
    }

    /// Theme palette as hex strings
    pub fn palette(&self) -> Vec<String> {
        self.palette.iter().map(|c| c.hex()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_tint_identity_and_bounds() {
        for c in 0..=255u8 {
            assert_eq!(apply_tint(c, 0.0), c);
            let mut previous = 0u8;
            for step in -10..=10 {
                let tinted = apply_tint(c, step as f64 / 10.0);
                assert!(tinted >= previous);
                previous = tinted;
            }
        }
        assert_eq!(apply_tint(200, -1.0), 0);
        assert_eq!(apply_tint(10, 1.0), 255);
        assert_eq!(apply_tint(100, -0.5), 50);
        assert_eq!(apply_tint(100, 0.5), 178);
        assert_eq!(apply_tint(100, 3.0), 255);
        assert_eq!(apply_tint(100, -3.0), 0);
    }

    #[test]
    fn test_explicit_hex() {
        let colors = ColorResolver::default();
        assert_eq!(
            colors.resolve(&ColorDescriptor::argb("FFff0000"), ColorRole::Font),
            "#FF0000"
        );
        let rgb = ColorDescriptor {
            rgb: Some("#00ff00".to_string()),
            ..Default::default()
        };
        assert_eq!(colors.resolve(&rgb, ColorRole::Fill), "#00FF00");
    }

    #[test]
    fn test_theme_and_tint() {
        let colors = ColorResolver::default();
        assert_eq!(
            colors.resolve(&ColorDescriptor::theme(4, None), ColorRole::Fill),
            "#4472C4"
        );
        // accent 1 lightened 40%
        assert_eq!(
            colors.resolve(&ColorDescriptor::theme(4, Some(0.4)), ColorRole::Fill),
            "#8FAADC"
        );
        // light 1 darkened 15%
        assert_eq!(
            colors.resolve(&ColorDescriptor::theme(0, Some(-0.15)), ColorRole::Fill),
            "#D9D9D9"
        );
    }

    #[test]
    fn test_malformed_falls_back_per_role() {
        let colors = ColorResolver::default();
        let bad = ColorDescriptor::argb("not-a-color");
        assert_eq!(colors.resolve(&bad, ColorRole::Font), "#000000");
        assert_eq!(colors.resolve(&bad, ColorRole::Border), "#000000");
        assert_eq!(colors.resolve(&bad, ColorRole::Fill), "#FFFFFF");
        assert_eq!(
            colors.resolve(&ColorDescriptor::theme(12, None), ColorRole::Fill),
            "#FFFFFF"
        );
        assert_eq!(
            colors.resolve(&ColorDescriptor::theme(-1, None), ColorRole::Font),
            "#000000"
        );
        assert_eq!(colors.try_resolve(&ColorDescriptor::default()), None);
    }

    #[test]
    fn test_palette_has_twelve_entries() {
        let palette = ColorResolver::default().palette();
        assert_eq!(palette.len(), 12);
        assert_eq!(palette[0], "#FFFFFF");
        assert_eq!(palette[1], "#000000");
    }
}
