//! Merge driver: page images -> chapter PDFs -> whole-book PDFs.

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::{ChapterRange, MergeConfig};
use crate::crop::prepare_images_with_optional_crop;
use crate::error::MergeError;
use crate::images::list_images_sorted;
use crate::pdf::{merge_pdfs, save_images_to_pdf};
use crate::progress::Progress;

/// Inclusive 1-based slice of `images`. Ranges past the end are truncated;
/// a range starting past the end selects nothing.
pub fn select_pages<T>(images: &[T], start: i64, end: i64) -> Result<&[T], MergeError> {
    ChapterRange::new(start, end).validate()?;
    let len = images.len() as i64;
    if start > len {
        return Ok(&[]);
    }
    let end = end.min(len);
    Ok(&images[(start - 1) as usize..end as usize])
}

pub fn pretty_range_name(start: i64, end: i64) -> String {
    format!("p{:03}-p{:03}", start, end)
}

pub fn chapter_filename(chapters_name: &str, idx: usize, range: ChapterRange) -> String {
    format!(
        "{}_{:02}_{}.pdf",
        chapters_name,
        idx,
        pretty_range_name(range.start, range.end)
    )
}

/// Files written (or, in a dry run, planned) by [`run_merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub image_count: usize,
    pub chapter_pdfs: Vec<PathBuf>,
    pub final_all: PathBuf,
    pub final_from_chapters: Option<PathBuf>,
}

fn write_chapters(
    config: &MergeConfig,
    prepared: &[PathBuf],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut chapter_pdfs = Vec::new();
    let mut progress = Progress::new(
        "[PDF] chapters",
        "ch",
        config.chapter_ranges.len(),
        config.progress.chapters,
    );

    for (i, range) in config.chapter_ranges.iter().enumerate() {
        let idx = i + 1;
        let selected = select_pages(prepared, range.start, range.end)?;
        if selected.is_empty() {
            warn!("Range {} selects no images; skip.", range);
            progress.tick();
            continue;
        }

        let chapter_pdf = out_dir.join(chapter_filename(&config.chapters_name, idx, *range));
        info!(
            "[CHAPTER] #{}: pages {} -> {} ({} images)",
            idx,
            range,
            chapter_pdf.display(),
            selected.len()
        );
        save_images_to_pdf(selected, &chapter_pdf, config.dry_run)?;
        chapter_pdfs.push(chapter_pdf);
        progress.tick();
    }

    Ok(chapter_pdfs)
}

/// Runs the whole merge. Any temp dir made for cropped images is removed
/// before this returns, on success or failure.
pub fn run_merge(config: &MergeConfig) -> Result<MergeReport> {
    config.validate()?;

    let images = list_images_sorted(&config.image_dir)?;
    info!(
        "[INFO] Found {} image(s) in {}",
        images.len(),
        config.image_dir.display()
    );

    let out_dir = &config.pdf_output_dir;
    if !config.dry_run {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    }

    let prepared = prepare_images_with_optional_crop(
        &images,
        &config.crop,
        config.progress.crop,
        config.dry_run,
    )?;

    let chapter_pdfs = write_chapters(config, &prepared.paths, out_dir)?;
    if chapter_pdfs.is_empty() {
        warn!("No chapter PDFs created (ranges may have been empty/out of bounds).");
    }

    let final_all = out_dir.join(&config.final_all);
    info!(
        "[FINAL] All images -> {} ({} images)",
        final_all.display(),
        prepared.paths.len()
    );
    save_images_to_pdf(&prepared.paths, &final_all, config.dry_run)?;

    let final_from_chapters = if chapter_pdfs.is_empty() {
        None
    } else {
        let path = out_dir.join(&config.final_from_chapters);
        info!(
            "[FINAL] Merge chapters (order same as ranges) -> {}",
            path.display()
        );
        merge_pdfs(
            &chapter_pdfs,
            &path,
            config.progress.merge_chapters,
            config.dry_run,
        )?;
        Some(path)
    };

    info!("[DONE] merge completed.");
    Ok(MergeReport {
        image_count: images.len(),
        chapter_pdfs,
        final_all,
        final_from_chapters,
    })
}
