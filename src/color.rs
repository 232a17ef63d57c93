use std::str::FromStr;

use palette::{Mix, Srgb};

use crate::error::{AnalysisError, Result};

/// 8-bit sRGB colour as written to output files.
pub type Rgb8 = Srgb<u8>;

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// Parse `#rrggbb` or `rrggbb`.
pub fn parse_hex(text: &str) -> Result<Rgb8> {
    Rgb8::from_str(text.trim())
        .map_err(|e| AnalysisError::Config(format!("invalid colour '{text}': {e}")))
}

/// Format as `#rrggbb`.
pub fn to_hex(color: Rgb8) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

// ---------------------------------------------------------------------------
// Heat colour mapping: intensity → colour
// ---------------------------------------------------------------------------

/// Colour endpoints of the density heatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatColors {
    /// Colour at intensity 0.
    pub low: Rgb8,
    /// Colour at intensity 1.
    pub high: Rgb8,
    /// Colour of points that are not part of any cluster.
    pub below: Rgb8,
}

impl Default for HeatColors {
    fn default() -> Self {
        HeatColors {
            low: Rgb8::new(255, 255, 255),
            high: Rgb8::new(255, 0, 0),
            below: Rgb8::new(128, 128, 128),
        }
    }
}

impl HeatColors {
    pub fn from_hex(low: &str, high: &str, below: &str) -> Result<Self> {
        Ok(HeatColors {
            low: parse_hex(low)?,
            high: parse_hex(high)?,
            below: parse_hex(below)?,
        })
    }

    /// Linear blend between `low` and `high`; `None` is the below-threshold
    /// sentinel. Intensities outside `[0, 1]` are clamped.
    pub fn color_for(&self, intensity: Option<f64>) -> Rgb8 {
        match intensity {
            None => self.below,
            Some(t) => {
                let t = t.clamp(0.0, 1.0) as f32;
                let low: Srgb<f32> = self.low.into_format();
                let high: Srgb<f32> = self.high.into_format();
                low.mix(high, t).into_format()
            }
        }
    }
}
