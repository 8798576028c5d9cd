//! Real desktop backend: screenshots, synthetic key presses and the
//! operator's stop key.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, poll, read};
use enigo::{Direction, Enigo, Keyboard, Settings};
use image::RgbaImage;
use std::time::{Duration, Instant};

use crate::capture::CaptureBackend;
use crate::keys::NextKey;
use crate::region::{Bounds, Region};

/// Rectangle of the primary screen, used when no window matches.
pub fn primary_screen_bounds() -> Result<Bounds> {
    let screens = screenshots::Screen::all()
        .map_err(|e| anyhow::anyhow!("Failed to get screens: {}", e))?;

    let screen = screens
        .iter()
        .find(|s| s.display_info.is_primary)
        .or_else(|| screens.first())
        .ok_or_else(|| anyhow::anyhow!("No screen found"))?;

    let info = &screen.display_info;
    Ok(Bounds {
        left: info.x,
        top: info.y,
        width: info.width as i32,
        height: info.height as i32,
    })
}

pub struct DesktopBackend {
    enigo: Enigo,
}

impl DesktopBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            enigo: Enigo::new(&Settings::default())?,
        })
    }

    /// Discards key events typed during the session.
    pub fn drain_events(&self) {
        while poll(Duration::from_millis(0)).unwrap_or(false) {
            let _ = read();
        }
    }
}

impl CaptureBackend for DesktopBackend {
    fn grab(&mut self, region: Region) -> Result<RgbaImage> {
        let screen = screenshots::Screen::from_point(region.left, region.top)
            .map_err(|e| anyhow::anyhow!("No screen contains ({}, {}): {}", region.left, region.top, e))?;
        let info = &screen.display_info;

        let captured = screen
            .capture_area(
                region.left - info.x,
                region.top - info.y,
                region.width,
                region.height,
            )
            .map_err(|e| anyhow::anyhow!("Failed to capture screen: {}", e))?;

        // screenshots is built on image 0.24; move the raw buffer across.
        let (width, height) = (captured.width(), captured.height());
        RgbaImage::from_raw(width, height, captured.into_raw())
            .ok_or_else(|| anyhow::anyhow!("Screenshot buffer does not match {}x{}", width, height))
    }

    fn press(&mut self, key: NextKey) -> Result<()> {
        self.enigo.key(key.to_enigo(), Direction::Click)?;
        Ok(())
    }

    fn wait(&mut self, delay: Duration) -> Result<bool> {
        let deadline = Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !poll(remaining)? {
                return Ok(false);
            }
            if let Event::Key(KeyEvent {
                code: KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc,
                ..
            }) = read()?
            {
                return Ok(true);
            }
        }
    }
}
