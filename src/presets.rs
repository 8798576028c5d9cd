//! Named crop rectangles for the merge step.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::CropSettings;

/// Crop rectangle in image pixels. `None` width/height runs to the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub w: Option<i64>,
    pub h: Option<i64>,
}

impl CropRect {
    /// Enables cropping in `settings` with this rectangle.
    pub fn apply_to(&self, settings: &mut CropSettings) {
        settings.enabled = true;
        settings.x = self.x;
        settings.y = self.y;
        settings.w = self.w;
        settings.h = self.h;
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(f, "{},{},{},{}", self.x, self.y, size(self.w), size(self.h))
    }
}

/// Parses `x,y,width,height`; width/height may be `-` (to the edge).
pub fn parse_crop_rect(crop_str: &str) -> Option<CropRect> {
    let parts: Vec<&str> = crop_str
        .split(|c| c == ',' || c == ':' || c == ' ')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let size = |s: &str| -> Option<Option<i64>> {
        match s {
            "-" | "*" => Some(None),
            n => n.parse().ok().filter(|v: &i64| *v > 0).map(Some),
        }
    };

    match parts[..] {
        [x, y, w, h] => Some(CropRect {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
            w: size(w)?,
            h: size(h)?,
        }),
        _ => None,
    }
}

pub fn get_preset_file_path() -> Result<std::path::PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Could not find home directory"))?;
    Ok(std::path::PathBuf::from(home).join(".bookshot-presets.json"))
}

pub fn load_presets() -> Result<BTreeMap<String, String>> {
    let preset_file = get_preset_file_path()?;

    if !preset_file.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(&preset_file)?;
    let presets: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
        anyhow::anyhow!("Invalid presets file {}: {}", preset_file.display(), e)
    })?;

    Ok(presets)
}

pub fn save_presets(presets: &BTreeMap<String, String>) -> Result<()> {
    let preset_file = get_preset_file_path()?;
    let content = serde_json::to_string_pretty(presets)?;
    std::fs::write(&preset_file, content)?;
    Ok(())
}

pub fn get_builtin_presets() -> BTreeMap<String, String> {
    let mut presets = BTreeMap::new();

    presets.insert("full".to_string(), "0,0,-,-".to_string());
    // Kindle for PC, maximized on a 1440p display
    presets.insert("kindle-pc".to_string(), "495,311,1006,1421".to_string());
    // Shave a thin border left by window shadows
    presets.insert("trim-4".to_string(), "4,4,-,-".to_string());

    presets
}

pub fn get_all_presets() -> Result<BTreeMap<String, String>> {
    let mut all_presets = get_builtin_presets();
    let custom_presets = load_presets()?;

    // Custom presets override built-in ones
    all_presets.extend(custom_presets);

    Ok(all_presets)
}

/// Looks up a preset by name and parses it.
pub fn resolve_preset(name: &str) -> Result<CropRect> {
    let all_presets = get_all_presets()?;
    let value = all_presets.get(name).ok_or_else(|| {
        anyhow::anyhow!(
            "Preset '{}' not found. Use `bookshot presets list` to see available presets.",
            name
        )
    })?;
    parse_crop_rect(value)
        .ok_or_else(|| anyhow::anyhow!("Preset '{}' has an invalid crop: {}", name, value))
}
