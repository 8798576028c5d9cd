//! Uniform crop applied to every page before packing.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use log::{error, info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{CropSettings, TempFormat};
use crate::constants::merge::{JPEG_QUALITY, TEMP_DIR_PREFIX};
use crate::progress::Progress;
use crate::region::compute_crop_box;

/// Images ready for packing. When cropping ran, `paths` point into
/// `temp_dir`, which is removed when this value is dropped.
pub struct PreparedImages {
    pub paths: Vec<PathBuf>,
    temp_dir: Option<TempDir>,
}

impl PreparedImages {
    pub fn originals(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            temp_dir: None,
        }
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(|d| d.path())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn open_upright_rgb(src: &Path) -> Result<RgbImage> {
    let mut decoder = ImageReader::open(src)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img.to_rgb8())
}

fn save_temp(image: &RgbImage, out_path: &Path, format: TempFormat) -> Result<()> {
    let file = BufWriter::new(
        File::create(out_path).with_context(|| format!("Failed to create {}", out_path.display()))?,
    );
    match format {
        TempFormat::Jpeg => image.write_with_encoder(JpegEncoder::new_with_quality(file, JPEG_QUALITY))?,
        TempFormat::Png => image.write_with_encoder(PngEncoder::new_with_quality(
            file,
            CompressionType::Best,
            FilterType::Adaptive,
        ))?,
    }
    Ok(())
}

fn crop_one(src: &Path, idx: usize, crop: &CropSettings, out_dir: &Path) -> Result<PathBuf> {
    let img = open_upright_rgb(src)?;
    let (w, h) = img.dimensions();
    let name = file_name(src);
    let bbox = compute_crop_box(w, h, crop.x, crop.y, crop.w, crop.h);

    if idx <= crop.debug_preview_count {
        info!(
            "[CROP][DBG] {} img=({}x{}) cfg=(x={},y={},w={:?},h={:?}) -> box={:?}",
            name, w, h, crop.x, crop.y, crop.w, crop.h, bbox
        );
    }

    let cropped = match bbox {
        None => {
            warn!("[CROP] Invalid crop for {}; using full image.", name);
            img
        }
        Some(b) => {
            if b == (0, 0, w, h) {
                warn!(
                    "[CROP] Crop equals full image for {} (box={:?}). Adjust x/y/w/h if unintended.",
                    name, b
                );
            }
            let (left, top, right, bottom) = b;
            image::imageops::crop_imm(&img, left, top, right - left, bottom - top).to_image()
        }
    };

    let out_path = out_dir.join(format!("crop_{:04}.{}", idx, crop.temp_format.extension()));
    save_temp(&cropped, &out_path, crop.temp_format)?;
    Ok(out_path)
}

/// Crops every image into a fresh temp dir when cropping is enabled.
///
/// A page that fails to crop keeps its original file so the book stays
/// complete. Dry runs only log what would happen.
pub fn prepare_images_with_optional_crop(
    images: &[PathBuf],
    crop: &CropSettings,
    show_progress: bool,
    dry_run: bool,
) -> Result<PreparedImages> {
    if !crop.enabled {
        return Ok(PreparedImages::originals(images.to_vec()));
    }

    if dry_run {
        info!(
            "[CROP] (dry-run) Would crop all images with: x={} y={} w={:?} h={:?} temp_format={}",
            crop.x,
            crop.y,
            crop.w,
            crop.h,
            String::from(crop.temp_format)
        );
        return Ok(PreparedImages::originals(images.to_vec()));
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_DIR_PREFIX);
    let temp_dir = match &crop.temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .context("Failed to create temp dir for cropped images")?;

    let mut prepared = Vec::with_capacity(images.len());
    let mut progress = Progress::new("[CROP] cropping images", "img", images.len(), show_progress);

    for (i, src) in images.iter().enumerate() {
        match crop_one(src, i + 1, crop, temp_dir.path()) {
            Ok(out) => prepared.push(out),
            Err(e) => {
                error!("[CROP] {}: {:#} (using original)", src.display(), e);
                prepared.push(src.clone());
            }
        }
        progress.tick();
    }

    Ok(PreparedImages {
        paths: prepared,
        temp_dir: Some(temp_dir),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_page(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([200, 10, 10])).save(&path).unwrap();
        path
    }

    fn crop(x: i64, y: i64, w: Option<i64>, h: Option<i64>) -> CropSettings {
        CropSettings {
            enabled: true,
            x,
            y,
            w,
            h,
            ..CropSettings::default()
        }
    }

    #[test]
    fn disabled_crop_returns_originals() {
        let images = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let prepared =
            prepare_images_with_optional_crop(&images, &CropSettings::default(), false, false).unwrap();
        assert_eq!(prepared.paths, images);
        assert!(prepared.temp_dir().is_none());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let images = vec![PathBuf::from("missing.png")];
        let prepared =
            prepare_images_with_optional_crop(&images, &crop(1, 1, None, None), false, true).unwrap();
        assert_eq!(prepared.paths, images);
        assert!(prepared.temp_dir().is_none());
    }

    #[test]
    fn crops_into_temp_dir_and_cleans_up() {
        let src = TempDir::new().unwrap();
        let images = vec![
            write_page(src.path(), "page_001.png", 40, 30),
            write_page(src.path(), "page_002.png", 40, 30),
        ];

        let prepared =
            prepare_images_with_optional_crop(&images, &crop(5, 10, Some(20), None), false, false)
                .unwrap();
        let temp = prepared.temp_dir().unwrap().to_path_buf();
        assert!(
            temp.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(TEMP_DIR_PREFIX)
        );
        assert_eq!(prepared.paths[0], temp.join("crop_0001.png"));
        assert_eq!(prepared.paths[1], temp.join("crop_0002.png"));

        let img = image::open(&prepared.paths[0]).unwrap();
        assert_eq!((img.width(), img.height()), (20, 20));

        drop(prepared);
        assert!(!temp.exists());
    }

    /// Baseline JPEG of `w`x`h` carrying an EXIF block with the given
    /// Orientation tag, spliced in right after SOI.
    fn write_jpeg_with_orientation(dir: &Path, name: &str, w: u32, h: u32, orientation: u8) -> PathBuf {
        let mut encoded = Vec::new();
        RgbImage::from_pixel(w, h, Rgb([30, 60, 90]))
            .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, 90))
            .unwrap();

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II*\0");
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        // Orientation: tag 0x0112, SHORT, count 1, value inline.
        tiff.extend_from_slice(&0x0112u16.to_le_bytes());
        tiff.extend_from_slice(&3u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&[orientation, 0, 0, 0]);
        tiff.extend_from_slice(&0u32.to_le_bytes());

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);
        let len = (app1.len() + 2) as u16;

        let mut bytes = encoded[..2].to_vec();
        bytes.extend_from_slice(&[0xFF, 0xE1]);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&app1);
        bytes.extend_from_slice(&encoded[2..]);

        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn exif_rotation_is_applied_before_cropping() {
        let src = TempDir::new().unwrap();
        let rotated = write_jpeg_with_orientation(src.path(), "rotated.jpg", 40, 20, 6);
        let upright = write_jpeg_with_orientation(src.path(), "upright.jpg", 40, 20, 1);

        let prepared = prepare_images_with_optional_crop(
            &[rotated, upright],
            &crop(0, 0, None, None),
            false,
            false,
        )
        .unwrap();

        let img = image::open(&prepared.paths[0]).unwrap();
        assert_eq!((img.width(), img.height()), (20, 40));
        let img = image::open(&prepared.paths[1]).unwrap();
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[test]
    fn temp_dir_is_created_under_the_configured_root() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let images = vec![write_page(src.path(), "p1.png", 8, 8)];
        let settings = CropSettings {
            temp_root: Some(root.path().to_path_buf()),
            ..crop(0, 0, None, None)
        };

        let prepared = prepare_images_with_optional_crop(&images, &settings, false, false).unwrap();
        assert!(prepared.temp_dir().unwrap().starts_with(root.path()));

        drop(prepared);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn jpeg_temp_format_uses_jpg_extension() {
        let src = TempDir::new().unwrap();
        let images = vec![write_page(src.path(), "p1.png", 16, 16)];
        let settings = CropSettings {
            temp_format: TempFormat::Jpeg,
            ..crop(0, 0, Some(8), Some(8))
        };

        let prepared = prepare_images_with_optional_crop(&images, &settings, false, false).unwrap();
        assert!(prepared.paths[0].ends_with("crop_0001.jpg"));
        let img = image::open(&prepared.paths[0]).unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[test]
    fn invalid_box_keeps_full_image() {
        let src = TempDir::new().unwrap();
        let images = vec![write_page(src.path(), "p1.png", 16, 12)];

        let prepared =
            prepare_images_with_optional_crop(&images, &crop(100, 0, None, None), false, false)
                .unwrap();
        let img = image::open(&prepared.paths[0]).unwrap();
        assert_eq!((img.width(), img.height()), (16, 12));
    }

    #[test]
    fn unreadable_image_falls_back_to_original() {
        let src = TempDir::new().unwrap();
        let broken = src.path().join("broken.png");
        std::fs::write(&broken, b"not an image").unwrap();
        let images = vec![broken.clone(), write_page(src.path(), "ok.png", 10, 10)];

        let prepared =
            prepare_images_with_optional_crop(&images, &crop(0, 0, Some(5), Some(5)), false, false)
                .unwrap();
        assert_eq!(prepared.paths[0], broken);
        assert!(prepared.paths[1].ends_with("crop_0002.png"));
    }
}
