//! Pixel rectangle math shared by both drivers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen-space window rectangle as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Pixels shaved off each edge of a window before capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Default for Margins {
    fn default() -> Self {
        use crate::constants::defaults::*;
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            right: MARGIN_RIGHT,
            bottom: MARGIN_BOTTOM,
        }
    }
}

impl Margins {
    /// Parses `left,top,right,bottom`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<i32> = s
            .split(|c| c == ',' || c == ':' || c == ' ')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse())
            .collect::<Result<_, _>>()
            .ok()?;

        match parts[..] {
            [left, top, right, bottom] => Some(Self {
                left,
                top,
                right,
                bottom,
            }),
            _ => None,
        }
    }
}

/// Screen area handed to the screenshot backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<Bounds> for Region {
    fn from(b: Bounds) -> Self {
        Self {
            left: b.left,
            top: b.top,
            width: b.width.max(0) as u32,
            height: b.height.max(0) as u32,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "left={}, top={}, width={}, height={}",
            self.left, self.top, self.width, self.height
        )
    }
}

/// Shrinks window bounds by the given margins. A margin pair larger than
/// the window collapses that axis to zero instead of going negative.
pub fn crop_bbox(bounds: Bounds, margins: &Margins) -> Region {
    let l = bounds.left + margins.left;
    let t = bounds.top + margins.top;
    let r = bounds.left + bounds.width - margins.right;
    let b = bounds.top + bounds.height - margins.bottom;

    Region {
        left: l,
        top: t,
        width: (r - l).max(0) as u32,
        height: (b - t).max(0) as u32,
    }
}

/// Crop box in image pixels as `(left, top, right, bottom)`.
pub type CropBox = (u32, u32, u32, u32);

/// Clamps a requested crop rectangle to an image. `w`/`h` of `None` extend
/// to the right/bottom edge. Returns `None` for a zero-area result.
pub fn compute_crop_box(
    img_w: u32,
    img_h: u32,
    x: i64,
    y: i64,
    w: Option<i64>,
    h: Option<i64>,
) -> Option<CropBox> {
    let (iw, ih) = (img_w as i64, img_h as i64);
    let left = x.clamp(0, iw);
    let top = y.clamp(0, ih);
    let right = match w {
        None => iw,
        Some(w) => (left + w.max(0)).clamp(0, iw),
    };
    let bottom = match h {
        None => ih,
        Some(h) => (top + h.max(0)).clamp(0, ih),
    };

    if right - left <= 0 || bottom - top <= 0 {
        return None;
    }
    Some((left as u32, top as u32, right as u32, bottom as u32))
}
