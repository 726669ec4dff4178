use serde::{Deserialize, Serialize};

use crate::errors::AcquireError;

// MARK: - Eye

/// Compositor eye that feeds the mirror texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn from_right_flag(right_eye: bool) -> Self {
        if right_eye { Self::Right } else { Self::Left }
    }
}

impl std::fmt::Display for Eye {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

// MARK: - AspectPolicy

/// Ratio used when a custom aspect has a zero side.
pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;

/// Rule for cropping the captured image to a width:height ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AspectPolicy {
    /// Keep whatever ratio the scaled mirror texture has.
    Native,
    /// Crop to a fixed ratio (width / height).
    Fixed(f64),
    /// Crop to `width:height`.
    Custom { width: u32, height: u32 },
}

impl AspectPolicy {
    /// Target width/height ratio, `None` for [`AspectPolicy::Native`].
    pub fn target_ratio(&self) -> Option<f64> {
        match *self {
            Self::Native => None,
            Self::Fixed(ratio) if ratio.is_finite() && ratio > 0.0 => Some(ratio),
            Self::Fixed(_) => Some(DEFAULT_ASPECT_RATIO),
            Self::Custom { width, height } if width > 0 && height > 0 => {
                Some(width as f64 / height as f64)
            }
            Self::Custom { .. } => Some(DEFAULT_ASPECT_RATIO),
        }
    }
}

impl Default for AspectPolicy {
    fn default() -> Self {
        Self::Native
    }
}

// MARK: - TextureSize

/// Pixel dimensions of a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for TextureSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - CropRect

/// Sub-region of the mirror texture, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn size(&self) -> TextureSize {
        TextureSize::new(self.width, self.height)
    }

    /// True when the rectangle lies entirely inside a texture of `size`.
    pub fn fits_within(&self, size: TextureSize) -> bool {
        self.width <= size.width
            && self.height <= size.height
            && self.right() <= size.width
            && self.bottom() <= size.height
    }
}

// MARK: - Geometry

/// Crop rectangle plus the full mirror texture it was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub crop: CropRect,
    pub device: TextureSize,
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}×{}+{}+{} of {}",
            self.crop.width, self.crop.height, self.crop.x, self.crop.y, self.device
        )
    }
}

// MARK: - LifecycleState

/// Acquisition state of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Acquiring,
    Ready,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

// MARK: - SessionStatus

/// Point-in-time view of a session, for status displays and logs.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Idle,
    Acquiring,
    Capturing { geometry: Geometry },
    /// Last attempt failed; the session is uninitialized and will be retried.
    Failed { error: AcquireError },
}

impl SessionStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Acquiring => "Acquiring…",
            Self::Capturing { .. } => "Capturing",
            Self::Failed { .. } => "Waiting for VR runtime",
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }
}
