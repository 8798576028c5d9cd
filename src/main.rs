use anyhow::Result;
use bookshot::capture::{CaptureOutcome, run_capture};
use bookshot::config::{CaptureConfig, ChapterRange, MergeConfig, ProgressSettings, TempFormat, load_or_default};
use bookshot::merge::run_merge;
use bookshot::presets;
use bookshot::region::Margins;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::io::Write;
use std::path::PathBuf;

const STOP_KEY_HELP: &str = "\
Stopping early:
  Press Q or Esc in the terminal running bookshot, not in the reader window.
  The terminal stays in line mode, so most terminals also need Enter.
  Pages already saved stay on disk; rerun with --start-index to continue.";

#[derive(Parser, Debug)]
#[command(name = "bookshot")]
#[command(about = "Capture reader pages as images and pack them into PDFs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn pages in a reader window and save a screenshot of each
    #[command(after_help = STOP_KEY_HELP)]
    Capture(CaptureArgs),
    /// Crop saved pages and pack them into chapter and book PDFs
    Merge(MergeArgs),
    /// List or save named crop rectangles
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
    /// Print the default configuration as JSON
    PrintConfig { which: ConfigKind },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConfigKind {
    Capture,
    Merge,
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    /// List built-in and custom presets
    List,
    /// Save a preset: 'name:x,y,width,height' (width/height may be '-')
    Save { preset: String },
}

#[derive(clap::Args, Debug)]
struct CaptureArgs {
    #[arg(short, long, help = "JSON config file")]
    config: Option<PathBuf>,

    #[arg(short = 'w', long, help = "Substring of the window title (case-insensitive)")]
    window_title: Option<String>,

    #[arg(short, long, help = "Directory for page images")]
    output_dir: Option<PathBuf>,

    #[arg(short = 'n', long, help = "Number of pages to capture")]
    pages: Option<u32>,

    #[arg(short = 's', long, help = "Number of the first saved page")]
    start_index: Option<u32>,

    #[arg(short, long, help = "Seconds to wait after each page turn")]
    delay: Option<f64>,

    #[arg(
        short,
        long,
        help = "Next-page key: right, left, up, down, pagedown, pageup, space, enter, home, end, tab or one character"
    )]
    key: Option<String>,

    #[arg(long, conflicts_with = "no_margins", help = "Window margins as 'left,top,right,bottom'")]
    margins: Option<String>,

    #[arg(long, help = "Capture the whole window without margins")]
    no_margins: bool,

    #[arg(long, help = "Turn the page before the first capture")]
    skip_first_page: bool,

    #[arg(long, help = "Seconds of countdown before capturing")]
    countdown: Option<u64>,
}

impl CaptureArgs {
    fn into_config(self) -> Result<CaptureConfig> {
        let mut config: CaptureConfig = load_or_default(self.config.as_deref())?;

        if let Some(title) = self.window_title {
            config.window_title = title;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(pages) = self.pages {
            config.pages = pages;
        }
        if let Some(start) = self.start_index {
            config.start_index = start;
        }
        if let Some(delay) = self.delay {
            config.delay_after_flip = delay;
        }
        if let Some(key) = self.key {
            config.hotkey_next = key;
        }
        if let Some(margins) = &self.margins {
            let parsed = Margins::parse(margins).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid margins: {}\nUse: left,top,right,bottom (e.g., '8,80,8,20')",
                    margins
                )
            })?;
            config.crop_margins = Some(parsed);
        }
        if self.no_margins {
            config.crop_margins = None;
        }
        if self.skip_first_page {
            config.capture_first_page = false;
        }
        if let Some(countdown) = self.countdown {
            config.countdown_secs = countdown;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TempFormatArg {
    Png,
    Jpeg,
}

#[derive(clap::Args, Debug)]
struct MergeArgs {
    #[arg(short, long, help = "JSON config file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Directory of page images")]
    image_dir: Option<PathBuf>,

    #[arg(short, long, help = "Directory for the PDFs")]
    pdf_output_dir: Option<PathBuf>,

    #[arg(
        long = "chapter",
        value_name = "START-END",
        help = "Inclusive 1-based page range, repeatable; replaces ranges from the config file"
    )]
    chapters: Vec<String>,

    #[arg(long, help = "File name prefix for chapter PDFs")]
    chapters_name: Option<String>,

    #[arg(long, help = "File name of the PDF with every image")]
    final_all: Option<String>,

    #[arg(long, help = "File name of the PDF concatenated from chapters")]
    final_from_chapters: Option<String>,

    #[arg(
        long,
        conflicts_with = "crop_preset",
        help = "Crop every image to 'x,y,width,height' (width/height may be '-')"
    )]
    crop: Option<String>,

    #[arg(long, help = "Crop with a named preset (see `presets list`)")]
    crop_preset: Option<String>,

    #[arg(long, conflicts_with_all = ["crop", "crop_preset"], help = "Disable cropping")]
    no_crop: bool,

    #[arg(long, value_enum, help = "Format of intermediate cropped images")]
    temp_format: Option<TempFormatArg>,

    #[arg(long, help = "Log crop geometry for the first N images")]
    debug_preview: Option<usize>,

    #[arg(long, help = "Hide progress counters")]
    no_progress: bool,

    #[arg(long, help = "Only log what would be written")]
    dry_run: bool,
}

impl MergeArgs {
    fn into_config(self) -> Result<MergeConfig> {
        let mut config: MergeConfig = load_or_default(self.config.as_deref())?;

        if let Some(dir) = self.image_dir {
            config.image_dir = dir;
        }
        if let Some(dir) = self.pdf_output_dir {
            config.pdf_output_dir = dir;
        }
        if !self.chapters.is_empty() {
            config.chapter_ranges = self
                .chapters
                .iter()
                .map(|s| {
                    ChapterRange::parse(s).ok_or_else(|| {
                        anyhow::anyhow!("Invalid chapter range '{}'. Use START-END, e.g. 9-14", s)
                    })
                })
                .collect::<Result<_>>()?;
        }
        if let Some(name) = self.chapters_name {
            config.chapters_name = name;
        }
        if let Some(name) = self.final_all {
            config.final_all = name;
        }
        if let Some(name) = self.final_from_chapters {
            config.final_from_chapters = name;
        }

        if let Some(crop) = &self.crop {
            let rect = presets::parse_crop_rect(crop).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid crop region format: {}\nUse: x,y,width,height (e.g., '495,311,1006,1421')",
                    crop
                )
            })?;
            rect.apply_to(&mut config.crop);
        }
        if let Some(name) = &self.crop_preset {
            let rect = presets::resolve_preset(name)?;
            info!("Using preset '{}': {}", name, rect);
            rect.apply_to(&mut config.crop);
        }
        if self.no_crop {
            config.crop.enabled = false;
        }
        if let Some(format) = self.temp_format {
            config.crop.temp_format = match format {
                TempFormatArg::Png => TempFormat::Png,
                TempFormatArg::Jpeg => TempFormat::Jpeg,
            };
        }
        if let Some(n) = self.debug_preview {
            config.crop.debug_preview_count = n;
        }
        if self.no_progress {
            config.progress = ProgressSettings::disabled();
        }
        if self.dry_run {
            config.dry_run = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn list_presets() -> Result<()> {
    println!("\nAVAILABLE CROP PRESETS");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let builtin = presets::get_builtin_presets();
    let custom = presets::load_presets()?;
    let preset_file = presets::get_preset_file_path()?;

    println!("\nBuilt-in presets:");
    for (name, value) in builtin.iter() {
        if !custom.contains_key(name) {
            println!("  {} = {}", name, value);
        }
    }

    if !custom.is_empty() {
        println!("\nCustom presets:");
        for (name, value) in custom.iter() {
            println!("  {} = {}", name, value);
        }
        println!("\nCustom presets file: {}", preset_file.display());
    } else {
        println!("\nCustom presets: (none)");
        println!("   Save presets with: bookshot presets save name:x,y,w,h");
        println!("   File will be created at: {}", preset_file.display());
    }

    println!("\nUsage:");
    println!("   bookshot merge --crop-preset <name>");
    println!();

    Ok(())
}

fn save_preset_from_string(preset_str: &str) -> Result<()> {
    let Some((name, value)) = preset_str.split_once(':') else {
        return Err(anyhow::anyhow!(
            "Invalid preset format. Use: name:x,y,width,height\nExample: bookshot presets save mybook:495,311,1006,1421"
        ));
    };
    let (name, value) = (name.trim(), value.trim());

    if name.is_empty() {
        return Err(anyhow::anyhow!("Preset name must not be empty"));
    }
    let Some(rect) = presets::parse_crop_rect(value) else {
        return Err(anyhow::anyhow!(
            "Invalid crop region format: {}\nUse: x,y,width,height (e.g., '495,311,1006,1421')",
            value
        ));
    };

    let mut preset_map = presets::load_presets()?;
    preset_map.insert(name.to_string(), rect.to_string());
    presets::save_presets(&preset_map)?;

    println!("Preset '{}' saved: {}", name, rect);
    println!("\nUse with: bookshot merge --crop-preset {}", name);

    Ok(())
}

fn print_config(which: ConfigKind) -> Result<()> {
    let json = match which {
        ConfigKind::Capture => serde_json::to_string_pretty(&CaptureConfig::default())?,
        ConfigKind::Merge => serde_json::to_string_pretty(&MergeConfig::default())?,
    };
    println!("{}", json);
    Ok(())
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "[{}] {}", level, record.args()),
        })
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    match args.command {
        Command::Capture(capture_args) => {
            let config = capture_args.into_config()?;
            let summary = run_capture(&config)?;
            if let CaptureOutcome::Failed(msg) = summary.outcome {
                return Err(anyhow::anyhow!("Capture stopped early: {}", msg));
            }
        }
        Command::Merge(merge_args) => {
            let config = merge_args.into_config()?;
            run_merge(&config)?;
        }
        Command::Presets { action } => match action {
            PresetAction::List => list_presets()?,
            PresetAction::Save { preset } => save_preset_from_string(&preset)?,
        },
        Command::PrintConfig { which } => print_config(which)?,
    }

    Ok(())
}
