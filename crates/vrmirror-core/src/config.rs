use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SettingsError;
use crate::geometry::CropParams;
use crate::types::{AspectPolicy, Eye};

/// `aspect_ratio` value meaning "keep the native ratio".
pub const ASPECT_NATIVE: f64 = -1.0;
/// `aspect_ratio` value meaning "use `custom_aspect_width:custom_aspect_height`".
pub const ASPECT_CUSTOM: f64 = 0.0;

pub const CUSTOM_ASPECT_RANGE: RangeInclusive<u32> = 1..=100;
pub const SCALE_FACTOR_RANGE: RangeInclusive<f64> = 1.0..=5.0;
pub const OFFSET_RANGE: RangeInclusive<i32> = -10_000..=10_000;

/// Per-source capture settings, as stored by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    #[serde(alias = "rightEye")]
    pub righteye: bool,
    /// -1 native, 0 custom, anything else a fixed width/height ratio.
    #[serde(alias = "aspectRatio")]
    pub aspect_ratio: f64,
    #[serde(alias = "customAspectWidth")]
    pub custom_aspect_width: u32,
    #[serde(alias = "customAspectHeight")]
    pub custom_aspect_height: u32,
    #[serde(alias = "scaleFactor")]
    pub scale_factor: f64,
    #[serde(alias = "xOffset")]
    pub x_offset: i32,
    #[serde(alias = "yOffset")]
    pub y_offset: i32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            righteye: true,
            aspect_ratio: ASPECT_NATIVE,
            custom_aspect_width: 16,
            custom_aspect_height: 9,
            scale_factor: 1.0,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl CaptureSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        let clean = settings.clone().sanitized();
        if clean != settings {
            debug!("Capture settings clamped into range: {:?}", clean);
        }
        Ok(clean)
    }

    /// Clamp every value into the range the properties page allows.
    pub fn sanitized(mut self) -> Self {
        self.custom_aspect_width = self
            .custom_aspect_width
            .clamp(*CUSTOM_ASPECT_RANGE.start(), *CUSTOM_ASPECT_RANGE.end());
        self.custom_aspect_height = self
            .custom_aspect_height
            .clamp(*CUSTOM_ASPECT_RANGE.start(), *CUSTOM_ASPECT_RANGE.end());
        self.scale_factor = if self.scale_factor.is_nan() {
            1.0
        } else {
            self.scale_factor.clamp(*SCALE_FACTOR_RANGE.start(), *SCALE_FACTOR_RANGE.end())
        };
        self.x_offset = self.x_offset.clamp(*OFFSET_RANGE.start(), *OFFSET_RANGE.end());
        self.y_offset = self.y_offset.clamp(*OFFSET_RANGE.start(), *OFFSET_RANGE.end());
        if !self.aspect_ratio.is_finite() {
            self.aspect_ratio = ASPECT_NATIVE;
        }
        self
    }

    pub fn eye(&self) -> Eye {
        Eye::from_right_flag(self.righteye)
    }

    pub fn aspect_policy(&self) -> AspectPolicy {
        if !self.aspect_ratio.is_finite() || self.aspect_ratio < 0.0 {
            AspectPolicy::Native
        } else if self.aspect_ratio == ASPECT_CUSTOM {
            AspectPolicy::Custom {
                width: self.custom_aspect_width,
                height: self.custom_aspect_height,
            }
        } else {
            AspectPolicy::Fixed(self.aspect_ratio)
        }
    }

    pub fn crop_params(&self) -> CropParams {
        CropParams {
            eye: self.eye(),
            scale_factor: self.scale_factor,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
            aspect: self.aspect_policy(),
        }
    }
}

/// Retry pacing for acquisition attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum gap between opportunistic retries from the tick path.
    pub tick_dwell: Duration,
    /// Minimum gap between retries scheduled from the render path.
    pub background_dwell: Duration,
    /// Minimum gap between operator-triggered resets.
    pub reset_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tick_dwell: Duration::from_millis(8),
            background_dwell: Duration::from_millis(500),
            reset_cooldown: Duration::from_secs(2),
        }
    }
}
