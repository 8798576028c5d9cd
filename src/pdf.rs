//! Writing image-per-page PDFs and concatenating PDFs with lopdf.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use log::{info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};

use crate::constants::merge::POINTS_PER_PIXEL;
use crate::error::MergeError;
use crate::progress::Progress;

const IMAGE_NAME: &str = "Im0";

/// Number of colour components declared in a JPEG's frame header, or `None`
/// when no start-of-frame segment precedes the scan data.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        while *bytes.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos)?;
        pos += 1;
        match marker {
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => continue,
            0xDA | 0xD9 => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                // length(2) precision(1) height(2) width(2) components(1)
                return bytes.get(pos + 7).copied();
            }
            _ => {
                let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
                pos += len;
            }
        }
    }
}

/// Colour space for embedding JPEG bytes unchanged. Only one- and
/// three-component frames map onto a PDF device space; CMYK and YCCK
/// frames are decoded and re-stored instead.
fn dct_color_space(bytes: &[u8]) -> Option<&'static str> {
    match jpeg_components(bytes)? {
        1 => Some("DeviceGray"),
        3 => Some("DeviceRGB"),
        _ => None,
    }
}

/// Pixel data in a form a PDF image XObject can carry.
struct PageImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    /// `Some("DCTDecode")` when JPEG bytes are embedded as-is.
    filter: Option<&'static str>,
    data: Vec<u8>,
}

impl PageImage {
    fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let format = image::guess_format(&bytes)
            .with_context(|| format!("Unknown image format: {}", path.display()))?;
        let img = image::load_from_memory_with_format(&bytes, format)
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        let (width, height) = (img.width(), img.height());

        if format == ImageFormat::Jpeg {
            if let Some(color_space) = dct_color_space(&bytes) {
                return Ok(Self {
                    width,
                    height,
                    color_space,
                    filter: Some("DCTDecode"),
                    data: bytes,
                });
            }
        }

        // Alpha is dropped: pages are opaque.
        Ok(match img {
            DynamicImage::ImageLuma8(gray) => Self {
                width,
                height,
                color_space: "DeviceGray",
                filter: None,
                data: gray.into_raw(),
            },
            other => Self {
                width,
                height,
                color_space: "DeviceRGB",
                filter: None,
                data: other.to_rgb8().into_raw(),
            },
        })
    }

    fn page_size(&self) -> (f32, f32) {
        (
            self.width as f32 * POINTS_PER_PIXEL,
            self.height as f32 * POINTS_PER_PIXEL,
        )
    }

    fn into_stream(self) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space,
            "BitsPerComponent" => 8,
        };
        let compress = match self.filter {
            Some(filter) => {
                dict.set("Filter", filter);
                false
            }
            None => true,
        };
        let mut stream = Stream::new(dict, self.data);
        stream.allows_compression = compress;
        stream
    }
}

fn add_image_page(doc: &mut Document, pages_id: ObjectId, path: &Path) -> Result<ObjectId> {
    let image = PageImage::load(path)?;
    let (w, h) = image.page_size();
    let image_id = doc.add_object(image.into_stream());

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    w.into(),
                    0.into(),
                    0.into(),
                    h.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let media_box: Vec<Object> = vec![0.into(), 0.into(), w.into(), h.into()];

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => media_box,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_NAME => image_id,
            },
        },
        "Contents" => content_id,
    }))
}

fn finish_document(doc: &mut Document, pages_id: ObjectId, kids: Vec<ObjectId>) {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}

/// One page per image, in order, each page sized to its image.
pub fn images_to_document(images: &[PathBuf]) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids = images
        .iter()
        .map(|path| add_image_page(&mut doc, pages_id, path))
        .collect::<Result<Vec<_>>>()?;

    finish_document(&mut doc, pages_id, kids);
    doc.compress();
    Ok(doc)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

pub fn save_images_to_pdf(images: &[PathBuf], pdf_path: &Path, dry_run: bool) -> Result<()> {
    if images.is_empty() {
        return Err(MergeError::NoImagesToWrite.into());
    }
    info!("[WRITE] {}  ({} images)", pdf_path.display(), images.len());
    if dry_run {
        return Ok(());
    }

    ensure_parent(pdf_path)?;
    let mut doc = images_to_document(images)?;
    doc.save(pdf_path)
        .with_context(|| format!("Failed to write {}", pdf_path.display()))?;
    Ok(())
}

/// Attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(id) = parent {
        let node = doc.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn is_type(obj: &Object, name: &[u8]) -> bool {
    obj.as_dict()
        .and_then(|d| d.get(b"Type"))
        .and_then(Object::as_name)
        .map(|n| n == name)
        .unwrap_or(false)
}

/// Moves every page of `source` into `target`, in order, re-parented under
/// `pages_id`. Returns the new page ids.
fn append_pages(
    target: &mut Document,
    mut source: Document,
    pages_id: ObjectId,
) -> Result<Vec<ObjectId>> {
    source.renumber_objects_with(target.max_id + 1);

    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    let mut pages = Vec::with_capacity(page_ids.len());
    for &id in &page_ids {
        let mut page = source.get_dictionary(id)?.clone();
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = inherited(&source, &page, key) {
                    page.set(*key, value);
                }
            }
        }
        page.set("Parent", pages_id);
        pages.push((id, page));
    }

    for (id, object) in source.objects {
        if is_type(&object, b"Catalog") || is_type(&object, b"Pages") {
            continue;
        }
        if is_type(&object, b"Outlines") || is_type(&object, b"Outline") {
            continue;
        }
        target.objects.insert(id, object);
    }
    for (id, page) in pages {
        target.objects.insert(id, Object::Dictionary(page));
    }
    if let Some(&(last, _)) = target.objects.keys().next_back() {
        target.max_id = target.max_id.max(last);
    }

    Ok(page_ids)
}

/// Concatenates the pages of existing PDFs, in the given order. Missing
/// files are skipped with a warning.
pub fn merge_pdfs(
    pdf_paths: &[PathBuf],
    out_path: &Path,
    show_progress: bool,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        info!(
            "[MERGE] (dry-run) -> {}  (chapters: {})",
            out_path.display(),
            pdf_paths.len()
        );
        return Ok(());
    }

    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut kids = Vec::new();

    let mut progress = Progress::new("[MERGE] chapters", "pdf", pdf_paths.len(), show_progress);
    for path in pdf_paths {
        progress.tick();
        if !path.exists() {
            warn!("PDF not found, skip: {}", path.display());
            continue;
        }
        let source = Document::load(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        kids.extend(append_pages(&mut merged, source, pages_id)?);
    }
    drop(progress);

    if kids.is_empty() {
        return Err(MergeError::NoPagesToMerge.into());
    }
    info!(
        "[MERGE] -> {}  (chapters: {}, pages: {})",
        out_path.display(),
        pdf_paths.len(),
        kids.len()
    );

    finish_document(&mut merged, pages_id, kids);
    ensure_parent(out_path)?;
    merged
        .save(out_path)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn page_count(path: &Path) -> usize {
        Document::load(path).unwrap().get_pages().len()
    }

    fn media_box(doc: &Document, page: ObjectId) -> Vec<f32> {
        doc.get_dictionary(page)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn empty_image_list_is_rejected() {
        let err = save_images_to_pdf(&[], Path::new("x.pdf"), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::NoImagesToWrite)
        ));
    }

    #[test]
    fn writes_one_page_per_image_sized_at_96_dpi() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("a.png");
        RgbaImage::from_pixel(96, 192, Rgba([1, 2, 3, 128])).save(&png).unwrap();
        let jpg = dir.path().join("b.jpg");
        RgbImage::from_pixel(48, 48, Rgb([9, 9, 9])).save(&jpg).unwrap();

        let out = dir.path().join("nested").join("book.pdf");
        save_images_to_pdf(&[png, jpg], &out, false).unwrap();

        let doc = Document::load(&out).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(media_box(&doc, pages[0]), vec![0.0, 0.0, 72.0, 144.0]);
        assert_eq!(media_box(&doc, pages[1]), vec![0.0, 0.0, 36.0, 36.0]);
    }

    fn image_xobject(doc: &Document, page: ObjectId) -> &Stream {
        let id = doc
            .get_dictionary(page)
            .unwrap()
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"XObject"))
            .and_then(Object::as_dict)
            .and_then(|x| x.get(IMAGE_NAME.as_bytes()))
            .and_then(Object::as_reference)
            .unwrap();
        doc.get_object(id).and_then(Object::as_stream).unwrap()
    }

    #[test]
    fn jpeg_pages_embed_the_file_bytes() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.path().join("page.jpg");
        RgbImage::from_fn(32, 16, |x, y| Rgb([(x * 8) as u8, (y * 16) as u8, 128]))
            .save(&jpg)
            .unwrap();

        let out = dir.path().join("book.pdf");
        save_images_to_pdf(&[jpg.clone()], &out, false).unwrap();

        let doc = Document::load(&out).unwrap();
        let page = doc.get_pages()[&1];
        let stream = image_xobject(&doc, page);
        assert_eq!(
            stream.dict.get(b"Filter").and_then(Object::as_name).unwrap(),
            &b"DCTDecode"[..]
        );
        assert_eq!(
            stream.dict.get(b"ColorSpace").and_then(Object::as_name).unwrap(),
            &b"DeviceRGB"[..]
        );
        assert_eq!(stream.content, std::fs::read(&jpg).unwrap());
    }

    #[test]
    fn only_gray_and_rgb_jpegs_pass_through() {
        let dir = TempDir::new().unwrap();
        let gray = dir.path().join("gray.jpg");
        GrayImage::from_pixel(8, 8, Luma([90])).save(&gray).unwrap();
        let rgb = dir.path().join("rgb.jpg");
        RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])).save(&rgb).unwrap();

        assert_eq!(dct_color_space(&std::fs::read(&gray).unwrap()), Some("DeviceGray"));
        assert_eq!(dct_color_space(&std::fs::read(&rgb).unwrap()), Some("DeviceRGB"));

        // SOI, an APP14 segment, then a four-component baseline frame header.
        let mut cmyk = vec![0xFF, 0xD8, 0xFF, 0xEE, 0x00, 0x04, 0x00, 0x00];
        cmyk.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x10, 0x00, 0x10, 0x04]);
        for id in 1..=4u8 {
            cmyk.extend_from_slice(&[id, 0x11, 0x00]);
        }
        assert_eq!(jpeg_components(&cmyk), Some(4));
        assert_eq!(dct_color_space(&cmyk), None);

        assert_eq!(jpeg_components(b"\x89PNG"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF, 0xDA, 0x00]), None);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("book.pdf");
        save_images_to_pdf(&[PathBuf::from("missing.png")], &out, true).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn merge_concatenates_in_order_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let mut images = Vec::new();
        for (i, w) in [10u32, 20, 30].iter().enumerate() {
            let p = dir.path().join(format!("p{}.png", i));
            RgbImage::from_pixel(*w, 10, Rgb([0, 0, 0])).save(&p).unwrap();
            images.push(p);
        }
        let first = dir.path().join("c1.pdf");
        let second = dir.path().join("c2.pdf");
        save_images_to_pdf(&images[..2], &first, false).unwrap();
        save_images_to_pdf(&images[2..], &second, false).unwrap();

        let out = dir.path().join("all.pdf");
        let missing = dir.path().join("nope.pdf");
        merge_pdfs(&[second.clone(), missing, first.clone()], &out, false, false).unwrap();

        assert_eq!(page_count(&out), 3);
        let doc = Document::load(&out).unwrap();
        let widths: Vec<f32> = doc
            .get_pages()
            .into_values()
            .map(|id| media_box(&doc, id)[2])
            .collect();
        assert_eq!(widths, vec![22.5, 7.5, 15.0]);
    }

    #[test]
    fn merge_without_pages_fails() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("all.pdf");
        let err = merge_pdfs(&[dir.path().join("none.pdf")], &out, false, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::NoPagesToMerge)
        ));
        assert!(!out.exists());
    }
}
