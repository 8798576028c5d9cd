use std::path::PathBuf;

/// Errors from the merge pipeline that callers may want to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Image dir not found: {}", .0.display())]
    ImageDirNotFound(PathBuf),

    #[error("No images found in {} (accepted: {accepted})", .dir.display())]
    NoImages { dir: PathBuf, accepted: String },

    #[error("Invalid range ({start}, {end}). Pages are 1-based and require start<=end.")]
    InvalidRange { start: i64, end: i64 },

    #[error("No images to write.")]
    NoImagesToWrite,

    #[error("No pages to write in merged PDF.")]
    NoPagesToMerge,
}
