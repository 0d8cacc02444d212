use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{builder::PossibleValue, Args, ValueEnum};
use image::{
    imageops::{self, FilterType},
    AnimationDecoder as _, Frame, ImageResult, RgbaImage,
};
use strum::{EnumIter, VariantArray};

use crate::{
    image_util::{self, ImageBufferExt as _},
    prompt,
};

/// Output prefix matching the osu!mania stage overlay element the frames are meant for.
static DEFAULT_PREFIX: &str = "mania-stage-bottom";

static DEFAULT_WIDTH: u32 = 1980;
static DEFAULT_HEIGHT: u32 = 1080;
static DEFAULT_SCALE: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("{0}")]
    ImgUtilError(#[from] image_util::ImgUtilError),

    #[error("{0}: file does not exist")]
    SourceNotFound(PathBuf),

    #[error("{0}: not a gif file")]
    NotAGif(PathBuf),

    #[error("output path is not a directory")]
    OutputPathNotDir,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// The gif file to explode into frames.
    pub gif: PathBuf,

    /// Width of the transparent canvas in pixels.
    /// Prompted for interactively when not given.
    #[clap(short = 'W', long, verbatim_doc_comment)]
    pub width: Option<u32>,

    /// Height of the transparent canvas in pixels.
    /// Prompted for interactively when not given.
    #[clap(short = 'H', long, verbatim_doc_comment)]
    pub height: Option<u32>,

    /// Scale factor to resize each frame by.
    /// Values < 1.0 will shrink the frames. Values > 1.0 will enlarge them.
    #[clap(short, long, verbatim_doc_comment)]
    pub scale: Option<f64>,

    /// X position of the frames on the canvas.
    #[clap(short = 'x', long, allow_negative_numbers = true)]
    pub x_position: Option<i64>,

    /// Y position of the frames on the canvas.
    #[clap(short = 'y', long, allow_negative_numbers = true)]
    pub y_position: Option<i64>,

    /// The scaling filter to use when scaling frames.
    #[clap(long, default_value_t = ScaleFilter::Lanczos3)]
    pub scale_filter: ScaleFilter,

    /// Prefix for the output frame files.
    #[clap(short, long, default_value_t = String::from(DEFAULT_PREFIX))]
    pub prefix: String,

    /// Allow lossy compression for the output images.
    /// This is using pngquant / imagequant internally.
    #[clap(long, action, verbatim_doc_comment)]
    pub lossy: bool,

    /// Do not wait for a final enter before exiting.
    #[clap(long, action)]
    pub no_pause: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, VariantArray)]
pub enum ScaleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl std::fmt::Display for ScaleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Triangle => write!(f, "triangle"),
            Self::CatmullRom => write!(f, "catmull-rom"),
            Self::Gaussian => write!(f, "gaussian"),
            Self::Lanczos3 => write!(f, "lanczos3"),
        }
    }
}

impl From<ScaleFilter> for FilterType {
    fn from(value: ScaleFilter) -> Self {
        match value {
            ScaleFilter::Nearest => Self::Nearest,
            ScaleFilter::Triangle => Self::Triangle,
            ScaleFilter::CatmullRom => Self::CatmullRom,
            ScaleFilter::Gaussian => Self::Gaussian,
            ScaleFilter::Lanczos3 => Self::Lanczos3,
        }
    }
}

impl ValueEnum for ScaleFilter {
    fn value_variants<'a>() -> &'a [Self] {
        Self::VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(PossibleValue::new(match self {
            Self::Nearest => "nearest",
            Self::Triangle => "triangle",
            Self::CatmullRom => "catmull-rom",
            Self::Gaussian => "gaussian",
            Self::Lanczos3 => "lanczos3",
        }))
    }
}

/// Canvas settings for a run, resolved once before the frame loop.
#[derive(Debug, Clone, Copy)]
struct CanvasConfig {
    width: u32,
    height: u32,
    scale: f64,
    /// Explicit placement. `None` aligns the frames with the bottom-left corner of the canvas.
    position: Option<(i64, i64)>,
}

impl CanvasConfig {
    fn resolve(args: &ExportArgs) -> Self {
        let width = checked_dimension(
            args.width.unwrap_or_else(|| {
                prompt::read_or_default("transparent background width (px)", DEFAULT_WIDTH)
            }),
            "background width",
            DEFAULT_WIDTH,
        );

        let height = checked_dimension(
            args.height.unwrap_or_else(|| {
                prompt::read_or_default("transparent background height (px)", DEFAULT_HEIGHT)
            }),
            "background height",
            DEFAULT_HEIGHT,
        );

        let mut scale = args
            .scale
            .unwrap_or_else(|| prompt::read_or_default("scale factor", DEFAULT_SCALE));
        if scale <= 0.0 || scale.is_nan() {
            warn!("scale factor must be greater than 0, using default {DEFAULT_SCALE}");
            scale = DEFAULT_SCALE;
        }

        let x = args
            .x_position
            .unwrap_or_else(|| prompt::read_or_default("x position (px)", 0));
        let y = args
            .y_position
            .unwrap_or_else(|| prompt::read_or_default("y position (px)", i64::from(height) - 1));

        Self {
            width,
            height,
            scale,
            position: Some((x, y)),
        }
    }
}

fn checked_dimension(value: u32, label: &str, default: u32) -> u32 {
    if value == 0 {
        warn!("{label} must be greater than 0, using default {default}");
        return default;
    }

    value
}

pub fn export_frames(args: &ExportArgs) -> Result<(), ExportError> {
    if !args.gif.is_file() {
        return Err(ExportError::SourceNotFound(args.gif.clone()));
    }

    let is_gif = args
        .gif
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
    if !is_gif {
        return Err(ExportError::NotAGif(args.gif.clone()));
    }

    let config = CanvasConfig::resolve(args);

    let source = args.gif.canonicalize()?;
    #[allow(clippy::unwrap_used)]
    let stem = source.file_stem().unwrap().to_string_lossy();
    let out_dir = source.with_file_name(format!("{stem}_frames"));

    fs::create_dir_all(&out_dir)?;
    if !out_dir.is_dir() {
        return Err(ExportError::OutputPathNotDir);
    }

    debug!(
        "canvas {}x{}, scale {}, position {:?}, output {}",
        config.width,
        config.height,
        config.scale,
        config.position,
        out_dir.display()
    );

    let decoder = image_util::open_gif(&source)?;
    let count = write_frames(decoder.into_frames(), args, &config, &out_dir)?;

    if count == 0 {
        warn!("{}: no frames found", source.display());
    } else {
        info!("completed {count} frames -> {}", out_dir.display());
    }

    Ok(())
}

fn write_frames<I>(
    frames: I,
    args: &ExportArgs,
    config: &CanvasConfig,
    out_dir: &Path,
) -> Result<u32, ExportError>
where
    I: Iterator<Item = ImageResult<Frame>>,
{
    let mut scale = config.scale;
    let mut position = config.position;
    let mut count: u32 = 0;

    for frame in frames {
        let source = frame?.into_buffer();
        let (src_width, src_height) = source.dimensions();

        let (fitted, width, height) =
            fit_to_canvas(scale, src_width, src_height, config.width, config.height);
        // the reduced factor carries over to all later frames
        scale = fitted;

        if width > config.width {
            warn!(
                "frame {count}: {width}px wide after the height fit, wider than the {}px canvas; the frame will be cropped",
                config.width
            );
        }

        let scaled = imageops::resize(&source, width, height, args.scale_filter.into());

        // frame 0 settles the default placement; the clamped value is what later frames reuse
        let (x, y) = clamped_position(position, width, height, config.width, config.height);
        position = Some((x, y));

        trace!("frame {count}: {src_width}x{src_height} -> {width}x{height} at ({x}, {y})");

        let mut canvas = RgbaImage::new(config.width, config.height);
        imageops::overlay(&mut canvas, &scaled, x, y);

        let out = out_dir.join(format!("{}-{count}.png", args.prefix));
        canvas.save_optimized_png(&out, args.lossy)?;
        info!("saved {}", out.display());

        count += 1;
    }

    Ok(count)
}

/// Computes the scaled frame size for the current factor, reducing the factor
/// per axis when the result would not fit the canvas.
///
/// The returned factor replaces the caller's, so a reduction sticks for every
/// following frame. The height correction recomputes the width from the new
/// factor without re-checking it against the canvas; a source much wider than
/// the canvas aspect can therefore still come out too wide, which the caller
/// flags and composites cropped.
fn fit_to_canvas(
    scale: f64,
    src_width: u32,
    src_height: u32,
    canvas_width: u32,
    canvas_height: u32,
) -> (f64, u32, u32) {
    let mut scale = scale;
    let mut width = (f64::from(src_width) * scale) as u32;
    let mut height = (f64::from(src_height) * scale) as u32;

    if width > canvas_width {
        scale = f64::from(canvas_width) / f64::from(src_width);
        width = canvas_width;
        height = (f64::from(src_height) * scale) as u32;
    }

    if height > canvas_height {
        scale = f64::from(canvas_height) / f64::from(src_height);
        height = canvas_height;
        width = (f64::from(src_width) * scale) as u32;
    }

    (scale, width, height)
}

/// Resolves the placement for one frame: bottom-left when no position is set,
/// then clamped so the frame's far edges stay inside the canvas. There is no
/// lower clamp; negative offsets are kept and clipped by the compositor.
fn clamped_position(
    position: Option<(i64, i64)>,
    width: u32,
    height: u32,
    canvas_width: u32,
    canvas_height: u32,
) -> (i64, i64) {
    let (x, y) = position.unwrap_or((0, i64::from(canvas_height) - i64::from(height)));

    (
        x.min(i64::from(canvas_width) - i64::from(width)),
        y.min(i64::from(canvas_height) - i64::from(height)),
    )
}
