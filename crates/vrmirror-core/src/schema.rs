//! Descriptors for the host properties page.
//!
//! The host renders its own UI; this only tells it which options exist, their
//! ranges and presets, and which ones are visible for the current settings.

use serde::Serialize;

use crate::config::{
    CaptureSettings, ASPECT_CUSTOM, ASPECT_NATIVE, CUSTOM_ASPECT_RANGE, OFFSET_RANGE,
    SCALE_FACTOR_RANGE,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptionKind {
    Bool,
    FloatList { presets: Vec<(&'static str, f64)> },
    Int { min: i64, max: i64, step: i64 },
    FloatSlider { min: f64, max: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: OptionKind,
    pub visible: bool,
}

/// Whether the custom ratio inputs apply to `settings`.
pub fn custom_aspect_visible(settings: &CaptureSettings) -> bool {
    settings.aspect_ratio == ASPECT_CUSTOM
}

/// Every recognized option, with visibility resolved against `settings`.
pub fn settings_schema(settings: &CaptureSettings) -> Vec<OptionDescriptor> {
    let custom = custom_aspect_visible(settings);
    let int = |min: i64, max: i64| OptionKind::Int { min, max, step: 1 };

    vec![
        OptionDescriptor { key: "righteye", label: "Right Eye", kind: OptionKind::Bool, visible: true },
        OptionDescriptor {
            key: "aspect_ratio",
            label: "Aspect Ratio",
            kind: OptionKind::FloatList {
                presets: vec![
                    ("Native", ASPECT_NATIVE),
                    ("16:9", 16.0 / 9.0),
                    ("4:3", 4.0 / 3.0),
                    ("Custom", ASPECT_CUSTOM),
                ],
            },
            visible: true,
        },
        OptionDescriptor {
            key: "custom_aspect_width",
            label: "Ratio Width",
            kind: int(*CUSTOM_ASPECT_RANGE.start() as i64, *CUSTOM_ASPECT_RANGE.end() as i64),
            visible: custom,
        },
        OptionDescriptor {
            key: "custom_aspect_height",
            label: "Ratio Height",
            kind: int(*CUSTOM_ASPECT_RANGE.start() as i64, *CUSTOM_ASPECT_RANGE.end() as i64),
            visible: custom,
        },
        OptionDescriptor {
            key: "scale_factor",
            label: "Zoom",
            kind: OptionKind::FloatSlider {
                min: *SCALE_FACTOR_RANGE.start(),
                max: *SCALE_FACTOR_RANGE.end(),
                step: 0.01,
            },
            visible: true,
        },
        OptionDescriptor {
            key: "x_offset",
            label: "Horizontal Offset",
            kind: int(*OFFSET_RANGE.start() as i64, *OFFSET_RANGE.end() as i64),
            visible: true,
        },
        OptionDescriptor {
            key: "y_offset",
            label: "Vertical Offset",
            kind: int(*OFFSET_RANGE.start() as i64, *OFFSET_RANGE.end() as i64),
            visible: true,
        },
    ]
}
