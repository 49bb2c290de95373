// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering options for a print job.
//
// Callers send loosely typed JSON; anything unrecognised falls back to the
// documented default rather than failing the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest accepted custom scale factor (1000%).
pub const MAX_SCALE_FACTOR: f64 = 10.0;

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Parse a caller-supplied value; unknown or missing values give
    /// `Portrait`.
    pub fn parse_lenient(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str).map(normalise).as_deref() {
            Some("landscape") => Self::Landscape,
            _ => Self::Portrait,
        }
    }

    /// IPP `orientation-requested` enum value (RFC 8011 §5.2.10).
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Portrait => 3,
            Self::Landscape => 4,
        }
    }
}

/// Colour rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Monochrome,
    Color,
}

impl ColorMode {
    /// Parse a caller-supplied value; unknown or missing values give
    /// `Monochrome`.
    pub fn parse_lenient(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str).map(normalise).as_deref() {
            Some("color" | "colour") => Self::Color,
            _ => Self::Monochrome,
        }
    }

    /// IPP `print-color-mode` keyword (PWG 5100.13).
    pub fn ipp_keyword(&self) -> &'static str {
        match self {
            Self::Monochrome => "monochrome",
            Self::Color => "color",
        }
    }
}

/// Page scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Shrink or grow the content to the printable area.
    #[default]
    Fit,
    /// Print at 100%.
    Actual,
    /// Explicit factor, `1.0` being 100%.
    Custom(f64),
}

impl Scale {
    /// Parse `"fit"`, `"actual"`, a number (`1.5`), a numeric string
    /// (`"1.5"`), or a percentage (`"150%"`).  Anything else, including a
    /// factor outside `(0, MAX_SCALE_FACTOR]`, gives `Fit`.
    pub fn parse_lenient(value: Option<&Value>) -> Self {
        let factor = match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => match normalise(s).as_str() {
                "fit" => return Self::Fit,
                "actual" => return Self::Actual,
                other => parse_factor(other),
            },
            _ => None,
        };

        match factor {
            Some(f) if f.is_finite() && f > 0.0 && f <= MAX_SCALE_FACTOR => Self::Custom(f),
            _ => Self::Fit,
        }
    }

    /// IPP `print-scaling` keyword (PWG 5100.16).
    ///
    /// Custom factors print unscaled at the IPP level; the factor itself is
    /// only carried by drivers with a scaling channel.
    pub fn ipp_keyword(&self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Actual | Self::Custom(_) => "none",
        }
    }

    /// Factor as an integer percentage, for spoolers that take `scaling=N`.
    pub fn percent(&self) -> Option<u32> {
        match self {
            Self::Custom(f) => Some((f * 100.0).round() as u32),
            Self::Actual => Some(100),
            Self::Fit => None,
        }
    }
}

fn parse_factor(raw: &str) -> Option<f64> {
    match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
        None => raw.parse::<f64>().ok(),
    }
}

fn normalise(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// All rendering options for one job.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOptions {
    pub orientation: Orientation,
    pub color_mode: ColorMode,
    pub scale: Scale,
}

impl PrintOptions {
    /// Build options from the raw request fields.
    pub fn from_request(
        orientation: Option<&Value>,
        color_mode: Option<&Value>,
        scale: Option<&Value>,
    ) -> Self {
        Self {
            orientation: Orientation::parse_lenient(orientation),
            color_mode: ColorMode::parse_lenient(color_mode),
            scale: Scale::parse_lenient(scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_portrait_monochrome_fit() {
        let opts = PrintOptions::from_request(None, None, None);
        assert_eq!(opts.orientation, Orientation::Portrait);
        assert_eq!(opts.color_mode, ColorMode::Monochrome);
        assert_eq!(opts.scale, Scale::Fit);
        assert_eq!(opts, PrintOptions::default());
    }

    #[test]
    fn recognised_values_are_case_insensitive() {
        let opts = PrintOptions::from_request(
            Some(&json!("Landscape")),
            Some(&json!(" COLOUR ")),
            Some(&json!("Actual")),
        );
        assert_eq!(opts.orientation, Orientation::Landscape);
        assert_eq!(opts.color_mode, ColorMode::Color);
        assert_eq!(opts.scale, Scale::Actual);
    }

    #[test]
    fn unrecognised_values_fall_back() {
        let opts = PrintOptions::from_request(
            Some(&json!("sideways")),
            Some(&json!(true)),
            Some(&json!({"zoom": 2})),
        );
        assert_eq!(opts, PrintOptions::default());
    }

    #[test]
    fn custom_scale_forms() {
        assert_eq!(Scale::parse_lenient(Some(&json!(1.5))), Scale::Custom(1.5));
        assert_eq!(Scale::parse_lenient(Some(&json!("0.5"))), Scale::Custom(0.5));
        assert_eq!(Scale::parse_lenient(Some(&json!("150%"))), Scale::Custom(1.5));
    }

    #[test]
    fn out_of_range_scale_is_fit() {
        assert_eq!(Scale::parse_lenient(Some(&json!(0))), Scale::Fit);
        assert_eq!(Scale::parse_lenient(Some(&json!(-2.0))), Scale::Fit);
        assert_eq!(Scale::parse_lenient(Some(&json!(11))), Scale::Fit);
        assert_eq!(Scale::parse_lenient(Some(&json!("huge"))), Scale::Fit);
    }

    #[test]
    fn ipp_mappings() {
        assert_eq!(Orientation::Landscape.ipp_enum_value(), 4);
        assert_eq!(ColorMode::Monochrome.ipp_keyword(), "monochrome");
        assert_eq!(Scale::Fit.ipp_keyword(), "fit");
        assert_eq!(Scale::Custom(2.0).ipp_keyword(), "none");
        assert_eq!(Scale::Custom(1.25).percent(), Some(125));
    }
}
