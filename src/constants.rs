// Capture configuration defaults
pub mod defaults {
    pub const WINDOW_TITLE: &str = "Kindle";
    pub const OUTPUT_DIR: &str = "outputs";
    pub const START_INDEX: u32 = 1;
    pub const PAGES: u32 = 1;
    pub const DELAY_AFTER_FLIP_SECS: f64 = 0.5;
    pub const HOTKEY_NEXT: &str = "right";
    pub const COUNTDOWN_SECS: u64 = 3;

    pub const MARGIN_LEFT: i32 = 8;
    pub const MARGIN_TOP: i32 = 80;
    pub const MARGIN_RIGHT: i32 = 8;
    pub const MARGIN_BOTTOM: i32 = 20;
}

// Merge configuration defaults
pub mod merge {
    pub const IMAGE_DIR: &str = "outputs";
    pub const PDF_OUTPUT_DIR: &str = "pdf_out";
    pub const CHAPTERS_NAME: &str = "chapter";
    pub const FINAL_ALL: &str = "book_all_images.pdf";
    pub const FINAL_FROM_CHAPTERS: &str = "book_from_chapters.pdf";

    pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg"];
    pub const TEMP_DIR_PREFIX: &str = "merge_crop_";
    pub const JPEG_QUALITY: u8 = 95;

    /// Pixels are laid out at 96 dpi when no resolution is known.
    pub const POINTS_PER_PIXEL: f32 = 72.0 / 96.0;
}

// Capture timing constants
pub mod timing {
    pub const WINDOW_SETTLE_MS: u64 = 200;
    pub const MANUAL_FOCUS_WAIT_MS: u64 = 1000;
    pub const COUNTDOWN_STEP_MS: u64 = 1000;
}
