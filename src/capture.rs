//! Capture driver: find the reader window, then turn pages and save a
//! screenshot of each one.

use anyhow::{Context, Result};
use image::RgbaImage;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::constants::timing::{COUNTDOWN_STEP_MS, MANUAL_FOCUS_WAIT_MS};
use crate::desktop::{DesktopBackend, primary_screen_bounds};
use crate::keys::NextKey;
use crate::region::{Region, crop_bbox};
use crate::window::{find_window_bbox, focus_window};

/// What the capture loop needs from the desktop.
pub trait CaptureBackend {
    fn grab(&mut self, region: Region) -> Result<RgbaImage>;

    fn press(&mut self, key: NextKey) -> Result<()>;

    /// Waits up to `delay`. Returns `true` when the operator asked to stop.
    fn wait(&mut self, delay: Duration) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed,
    Aborted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub outcome: CaptureOutcome,
    pub saved: u32,
    /// First index not written; pass as `start_index` to continue.
    pub next_index: u32,
}

pub fn page_filename(output_dir: &Path, index: u32) -> PathBuf {
    output_dir.join(format!("page_{:03}.png", index))
}

fn save_page<B: CaptureBackend>(
    backend: &mut B,
    region: Region,
    output_dir: &Path,
    index: u32,
) -> Result<()> {
    let image = backend.grab(region)?;
    let path = page_filename(output_dir, index);
    image
        .save(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    info!("[SAVE] {}", path.display());
    Ok(())
}

/// Returns `Ok(true)` when stopped by the operator.
fn capture_loop<B: CaptureBackend>(
    config: &CaptureConfig,
    key: NextKey,
    region: Region,
    backend: &mut B,
    page_idx: &mut u32,
) -> Result<bool> {
    let end = config.end_index();

    if config.capture_first_page {
        save_page(backend, region, &config.output_dir, *page_idx)?;
        *page_idx += 1;
    }

    while *page_idx < end {
        backend.press(key)?;
        if backend.wait(config.flip_delay())? {
            return Ok(true);
        }
        save_page(backend, region, &config.output_dir, *page_idx)?;
        *page_idx += 1;
    }

    Ok(false)
}

/// Runs the page loop. Any error stops the session; pages already written
/// stay on disk and the summary says where to resume.
pub fn capture_pages<B: CaptureBackend>(
    config: &CaptureConfig,
    key: NextKey,
    region: Region,
    backend: &mut B,
) -> CaptureSummary {
    let mut page_idx = config.start_index;
    let result = config
        .validate()
        .and_then(|()| capture_loop(config, key, region, backend, &mut page_idx));

    let outcome = match result {
        Ok(false) => CaptureOutcome::Completed,
        Ok(true) => CaptureOutcome::Aborted,
        Err(e) => CaptureOutcome::Failed(format!("{:#}", e)),
    };

    CaptureSummary {
        outcome,
        saved: page_idx - config.start_index,
        next_index: page_idx,
    }
}

fn report(summary: &CaptureSummary) {
    match &summary.outcome {
        CaptureOutcome::Completed => {
            info!("[DONE] Capture finished: {} page(s) saved.", summary.saved)
        }
        CaptureOutcome::Aborted => info!(
            "[ABORT] Stopped by user after {} page(s). Resume with --start-index {}",
            summary.saved, summary.next_index
        ),
        CaptureOutcome::Failed(msg) => {
            error!("{}", msg);
            info!(
                "[HINT] Try a longer --delay, make sure the window is not covered, or adjust the crop margins. Resume with --start-index {}",
                summary.next_index
            );
        }
    }
}

fn resolve_region(config: &CaptureConfig) -> Result<Region> {
    info!("[INFO] Looking for window: '{}' ...", config.window_title);
    let bounds = match find_window_bbox(&config.window_title) {
        Ok(Some(bounds)) => bounds,
        Ok(None) => {
            warn!("Window not found, capturing the whole primary screen instead.");
            primary_screen_bounds()?
        }
        Err(e) => {
            warn!("{:#}; capturing the whole primary screen instead.", e);
            primary_screen_bounds()?
        }
    };

    if !focus_window(&config.window_title) {
        warn!("Could not focus the window. Bring it to the front manually.");
        thread::sleep(Duration::from_millis(MANUAL_FOCUS_WAIT_MS));
    }

    Ok(match &config.crop_margins {
        Some(margins) => crop_bbox(bounds, margins),
        None => Region::from(bounds),
    })
}

fn countdown(secs: u64) {
    if secs == 0 {
        return;
    }
    info!(
        "[INFO] Starting in {} seconds, move the mouse out of the way. To stop, press Q or Esc (then Enter) in this terminal.",
        secs
    );
    for s in (1..=secs).rev() {
        info!("  {} ...", s);
        thread::sleep(Duration::from_millis(COUNTDOWN_STEP_MS));
    }
}

pub fn run_capture(config: &CaptureConfig) -> Result<CaptureSummary> {
    config.validate()?;
    let key = config.next_key()?;

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let region = resolve_region(config)?;
    info!("[INFO] Capture region: {}", region);
    if region.is_empty() {
        anyhow::bail!("Capture region is empty; reduce the crop margins");
    }

    let mut backend = DesktopBackend::new()?;
    countdown(config.countdown_secs);

    let summary = capture_pages(config, key, region, &mut backend);
    backend.drain_events();
    report(&summary);
    Ok(summary)
}
