//! JSON configuration for both drivers.
//!
//! Every field is optional in the file; missing fields take the defaults from
//! [`crate::constants`]. Command-line flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{defaults, merge};
use crate::error::MergeError;
use crate::keys::NextKey;
use crate::region::Margins;

/// Reads a config file, or returns the defaults when no path is given.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub window_title: String,
    pub output_dir: PathBuf,
    pub start_index: u32,
    pub pages: u32,
    /// Seconds to wait after each page turn.
    pub delay_after_flip: f64,
    pub hotkey_next: String,
    pub crop_margins: Option<Margins>,
    pub capture_first_page: bool,
    pub countdown_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_title: defaults::WINDOW_TITLE.to_string(),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            start_index: defaults::START_INDEX,
            pages: defaults::PAGES,
            delay_after_flip: defaults::DELAY_AFTER_FLIP_SECS,
            hotkey_next: defaults::HOTKEY_NEXT.to_string(),
            crop_margins: Some(Margins::default()),
            capture_first_page: true,
            countdown_secs: defaults::COUNTDOWN_SECS,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pages == 0 {
            anyhow::bail!("pages must be > 0");
        }
        if self.start_index.checked_add(self.pages).is_none() {
            anyhow::bail!(
                "start_index {} plus pages {} exceeds the largest page number {}",
                self.start_index,
                self.pages,
                u32::MAX
            );
        }
        if Duration::try_from_secs_f64(self.delay_after_flip).is_err() {
            anyhow::bail!(
                "delay_after_flip must be a non-negative number of seconds, got {}",
                self.delay_after_flip
            );
        }
        self.next_key()?;
        Ok(())
    }

    pub fn next_key(&self) -> Result<NextKey> {
        self.hotkey_next.parse()
    }

    pub fn flip_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_after_flip).unwrap_or_default()
    }

    /// One past the last page index this session will write.
    pub fn end_index(&self) -> u32 {
        self.start_index.saturating_add(self.pages)
    }
}

/// Inclusive, 1-based page range. Serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, i64)", into = "(i64, i64)")]
pub struct ChapterRange {
    pub start: i64,
    pub end: i64,
}

impl ChapterRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.start <= 0 || self.end <= 0 || self.start > self.end {
            return Err(MergeError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Parses `start-end` or `start:end`.
    pub fn parse(s: &str) -> Option<Self> {
        let (a, b) = s.split_once(['-', ':'])?;
        Some(Self::new(a.trim().parse().ok()?, b.trim().parse().ok()?))
    }
}

impl From<(i64, i64)> for ChapterRange {
    fn from((start, end): (i64, i64)) -> Self {
        Self { start, end }
    }
}

impl From<ChapterRange> for (i64, i64) {
    fn from(r: ChapterRange) -> Self {
        (r.start, r.end)
    }
}

impl fmt::Display for ChapterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Encoding for intermediate cropped images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TempFormat {
    #[default]
    Png,
    Jpeg,
}

impl TempFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TempFormat::Png => "png",
            TempFormat::Jpeg => "jpg",
        }
    }
}

impl From<String> for TempFormat {
    /// Unknown names fall back to PNG.
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "JPEG" | "JPG" => TempFormat::Jpeg,
            _ => TempFormat::Png,
        }
    }
}

impl From<TempFormat> for String {
    fn from(f: TempFormat) -> Self {
        match f {
            TempFormat::Png => "PNG".to_string(),
            TempFormat::Jpeg => "JPEG".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CropSettings {
    pub enabled: bool,
    pub x: i64,
    pub y: i64,
    pub w: Option<i64>,
    pub h: Option<i64>,
    pub temp_format: TempFormat,
    pub debug_preview_count: usize,
    /// Parent of the crop temp dir; the system temp dir when unset.
    pub temp_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    pub crop: bool,
    pub chapters: bool,
    pub merge_chapters: bool,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            crop: true,
            chapters: true,
            merge_chapters: true,
        }
    }
}

impl ProgressSettings {
    pub fn disabled() -> Self {
        Self {
            crop: false,
            chapters: false,
            merge_chapters: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub image_dir: PathBuf,
    pub pdf_output_dir: PathBuf,
    pub chapter_ranges: Vec<ChapterRange>,
    pub chapters_name: String,
    pub final_all: String,
    pub final_from_chapters: String,
    pub crop: CropSettings,
    pub progress: ProgressSettings,
    pub dry_run: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from(merge::IMAGE_DIR),
            pdf_output_dir: PathBuf::from(merge::PDF_OUTPUT_DIR),
            chapter_ranges: Vec::new(),
            chapters_name: merge::CHAPTERS_NAME.to_string(),
            final_all: merge::FINAL_ALL.to_string(),
            final_from_chapters: merge::FINAL_FROM_CHAPTERS.to_string(),
            crop: CropSettings::default(),
            progress: ProgressSettings::default(),
            dry_run: false,
        }
    }
}

impl MergeConfig {
    /// Checks every chapter range before any file is written.
    pub fn validate(&self) -> Result<(), MergeError> {
        self.chapter_ranges
            .iter()
            .try_for_each(ChapterRange::validate)
    }
}
