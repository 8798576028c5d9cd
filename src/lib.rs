pub mod capture;
pub mod config;
pub mod constants;
pub mod crop;
pub mod desktop;
pub mod error;
pub mod images;
pub mod keys;
pub mod merge;
pub mod pdf;
pub mod presets;
pub mod progress;
pub mod region;
pub mod window;

pub use capture::{CaptureOutcome, CaptureSummary, run_capture};
pub use config::{CaptureConfig, ChapterRange, MergeConfig};
pub use error::MergeError;
pub use merge::{MergeReport, run_merge};
