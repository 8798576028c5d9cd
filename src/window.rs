//! Locating and focusing the reader window by title.

use anyhow::Result;
use log::{debug, warn};
use std::thread;
use std::time::Duration;
use xcap::Window;

use crate::constants::timing::WINDOW_SETTLE_MS;
use crate::region::Bounds;

/// Case-insensitive substring match that ignores blank titles.
pub fn title_matches(title: &str, keyword: &str) -> bool {
    !title.trim().is_empty() && title.to_lowercase().contains(&keyword.to_lowercase())
}

fn matching_windows(keyword: &str) -> Result<Vec<(Window, String)>> {
    let windows = Window::all().map_err(|e| anyhow::anyhow!("Failed to list windows: {}", e))?;

    Ok(windows
        .into_iter()
        .filter_map(|w| {
            let title = w.title().ok()?;
            title_matches(&title, keyword).then_some((w, title))
        })
        .collect())
}

fn settle() {
    thread::sleep(Duration::from_millis(WINDOW_SETTLE_MS));
}

fn window_bounds(window: &Window) -> Result<Bounds> {
    let err = |e: xcap::XCapError| anyhow::anyhow!("Failed to read window geometry: {}", e);
    Ok(Bounds {
        left: window.x().map_err(err)?,
        top: window.y().map_err(err)?,
        width: window.width().map_err(err)? as i32,
        height: window.height().map_err(err)? as i32,
    })
}

/// Restores (if minimized) and raises a window.
fn bring_to_front(window: &Window, title: &str) -> Result<()> {
    if window.is_minimized().unwrap_or(false) {
        platform::restore(window, title)?;
        settle();
    }
    platform::activate(window, title)?;
    settle();
    Ok(())
}

/// Picks the first candidate that both reports its geometry and can be
/// raised. Candidates that fail either step are skipped.
///
/// When every readable candidate refuses to be raised, the bounds of the
/// first readable one are returned; the caller's focus step then asks the
/// operator to bring the window forward.
fn pick_window<C>(
    candidates: &[C],
    name: impl Fn(&C) -> &str,
    bounds: impl Fn(&C) -> Result<Bounds>,
    mut raise: impl FnMut(&C) -> Result<()>,
) -> Option<Bounds> {
    let mut fallback = None;

    for candidate in candidates {
        let title = name(candidate);
        let rect = match bounds(candidate) {
            Ok(rect) => rect,
            Err(e) => {
                debug!("Skipping window '{}': {}", title, e);
                continue;
            }
        };
        if let Err(e) = raise(candidate) {
            debug!("Could not raise window '{}': {}", title, e);
            fallback.get_or_insert(rect);
            continue;
        }
        debug!("Matched window '{}' at {:?}", title, rect);
        return Some(rect);
    }

    if let Some(rect) = fallback {
        warn!("No matching window could be raised; using the first match at {:?}", rect);
    }
    fallback
}

/// Finds the first window whose title contains `title_keyword` and that can
/// be brought forward, and returns its screen rectangle.
pub fn find_window_bbox(title_keyword: &str) -> Result<Option<Bounds>> {
    let candidates = matching_windows(title_keyword)?;
    Ok(pick_window(
        &candidates,
        |(_, title)| title.as_str(),
        |(window, _)| window_bounds(window),
        |(window, title)| bring_to_front(window, title),
    ))
}

/// Brings the first matching window to the foreground.
pub fn focus_window(title_keyword: &str) -> bool {
    let windows = match matching_windows(title_keyword) {
        Ok(windows) => windows,
        Err(e) => {
            warn!("{}", e);
            return false;
        }
    };
    let Some((window, title)) = windows.into_iter().next() else {
        return false;
    };
    match bring_to_front(&window, &title) {
        Ok(()) => true,
        Err(e) => {
            debug!("Focus failed for '{}': {}", title, e);
            false
        }
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use anyhow::Result;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{SW_RESTORE, SetForegroundWindow, ShowWindow};
    use xcap::Window;

    fn hwnd(window: &Window) -> Result<HWND> {
        let id = window
            .id()
            .map_err(|e| anyhow::anyhow!("Failed to get window handle: {}", e))?;
        Ok(HWND(id as usize as *mut std::ffi::c_void))
    }

    pub fn restore(window: &Window, _title: &str) -> Result<()> {
        let hwnd = hwnd(window)?;
        unsafe {
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }
        Ok(())
    }

    pub fn activate(window: &Window, _title: &str) -> Result<()> {
        let hwnd = hwnd(window)?;
        if unsafe { SetForegroundWindow(hwnd) }.as_bool() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("SetForegroundWindow was refused"))
        }
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use anyhow::Result;
    use xcap::Window;

    fn quote(s: &str) -> String {
        s.replace('\\', "\\\\").replace('"', "\\\"")
    }

    fn app_name(window: &Window) -> Result<String> {
        window
            .app_name()
            .map_err(|e| anyhow::anyhow!("Failed to get application name: {}", e))
    }

    fn osascript(script: &str) -> Result<()> {
        let output = std::process::Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output()?;

        if output.status.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    pub fn restore(window: &Window, title: &str) -> Result<()> {
        let script = format!(
            r#"
tell application "System Events"
    tell process "{}"
        set value of attribute "AXMinimized" of (first window whose name is "{}") to false
    end tell
end tell
"#,
            quote(&app_name(window)?),
            quote(title)
        );
        osascript(&script)
    }

    pub fn activate(window: &Window, _title: &str) -> Result<()> {
        let script = format!(r#"tell application "{}" to activate"#, quote(&app_name(window)?));
        osascript(&script)
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
mod platform {
    use anyhow::Result;
    use xcap::Window;

    pub fn restore(_window: &Window, _title: &str) -> Result<()> {
        Err(anyhow::anyhow!("Restoring windows is not supported on this platform"))
    }

    pub fn activate(_window: &Window, _title: &str) -> Result<()> {
        Err(anyhow::anyhow!("Activating windows is not supported on this platform"))
    }
}
