//! Listing page images in reading order.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::constants::merge::IMAGE_EXTS;
use crate::error::MergeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Text(String),
    /// Digit run with leading zeros stripped, so any length compares.
    Num(String),
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Num(a), KeyPart::Num(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            (KeyPart::Num(_), KeyPart::Text(_)) => Ordering::Less,
            (KeyPart::Text(_), KeyPart::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key where `page_2.png` comes before `page_10.png`.
///
/// The name is split into alternating text and digit runs, always starting
/// with a (possibly empty) text run so keys line up position by position.
pub fn natural_key(s: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = s.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            parts.push(KeyPart::Text(std::mem::take(&mut text).to_lowercase()));
            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                chars.next();
            }
            let trimmed = digits.trim_start_matches('0');
            parts.push(KeyPart::Num(trimmed.to_string()));
        } else {
            text.push(c);
            chars.next();
        }
    }
    parts.push(KeyPart::Text(text.to_lowercase()));
    parts
}

fn is_page_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Page images in `image_dir`, naturally sorted by file name.
pub fn list_images_sorted(image_dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    if !image_dir.is_dir() {
        return Err(MergeError::ImageDirNotFound(image_dir.to_path_buf()));
    }

    let mut files: Vec<(Vec<KeyPart>, PathBuf)> = std::fs::read_dir(image_dir)
        .map_err(|_| MergeError::ImageDirNotFound(image_dir.to_path_buf()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_page_image(p))
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            Some((natural_key(&name), p))
        })
        .collect();

    files.sort_by(|a, b| a.0.cmp(&b.0));

    if files.is_empty() {
        return Err(MergeError::NoImages {
            dir: image_dir.to_path_buf(),
            accepted: IMAGE_EXTS
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    Ok(files.into_iter().map(|(_, p)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        v.sort_by_key(|s| natural_key(s));
        v
    }

    #[test]
    fn numbers_sort_numerically() {
        assert_eq!(
            sorted(&["page_10.png", "page_2.png", "page_1.png"]),
            vec!["page_1.png", "page_2.png", "page_10.png"]
        );
    }

    #[test]
    fn text_is_case_insensitive() {
        assert_eq!(sorted(&["B1.png", "a2.png"]), vec!["a2.png", "B1.png"]);
    }

    #[test]
    fn leading_zeros_and_long_runs() {
        assert!(natural_key("p007") == natural_key("p7"));
        assert!(natural_key("p99999999999999999999999") > natural_key("p100"));
    }

    #[test]
    fn listing_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["page_10.png", "page_2.JPG", "page_1.jpeg", "notes.txt", "page_3.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = list_images_sorted(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page_1.jpeg", "page_2.JPG", "page_10.png"]);
    }

    #[test]
    fn missing_or_empty_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            list_images_sorted(&dir.path().join("nope")),
            Err(MergeError::ImageDirNotFound(_))
        ));
        assert!(matches!(
            list_images_sorted(dir.path()),
            Err(MergeError::NoImages { .. })
        ));
    }
}
