// ============================================================================
// RetroPix CLI — headless pixel-art conversion via command-line arguments
// ============================================================================
//
// Usage examples:
//   RetroPix -i photo.jpg                         (writes photo_pixelated.jpg)
//   RetroPix -i photo.jpg -o out.png --palette neon --pixel-size 6
//   RetroPix -i "my scan.png" --max-dimension 4000 --color-shift 80 -v
//   RetroPix --list-palettes
//
// No GUI is opened in CLI mode. Everything runs synchronously on the current
// thread; the pixel stages still fan out over rayon internally.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::GenericImageView;

use crate::config::{COLOR_SHIFT, CONTRAST, DEFAULT_JPEG_QUALITY, EXPOSURE, OUTPUT_MAX_DIMENSION, PIXEL_SIZE, SATURATION};
use crate::error::EditorError;
use crate::io;
use crate::logger::Level;
use crate::ops::{Palette, downscale_to_fit};
use crate::pipeline::{self, Params};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// RetroPix headless converter.
///
/// Turn a photo into palette-limited pixel art without opening the window.
#[derive(Parser, Debug)]
#[command(
    name = "RetroPix",
    about = "RetroPix headless pixel-art converter",
    long_about = "Adjust exposure, contrast and saturation, pixelate, then map every\n\
                  pixel to a fixed retro palette, without opening the GUI.\n\
                  Reads JPEG, PNG, BMP and GIF; writes by output extension.\n\n\
                  Example:\n  \
                  RetroPix -i photo.jpg -o out.png --palette vaporwave --pixel-size 8"
)]
pub struct CliArgs {
    /// Input image.
    #[arg(short, long, value_name = "FILE", required_unless_present = "list_palettes")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to `<stem>_pixelated.<ext>` next to the input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Mosaic block size in pixels (2–40).
    #[arg(long, default_value_t = PIXEL_SIZE.default, value_name = "PX")]
    pub pixel_size: u32,

    /// Palette rotation control (0–100).
    #[arg(long, default_value_t = COLOR_SHIFT.default, value_name = "0-100")]
    pub color_shift: u32,

    /// Brightness factor (0.5–1.5, 1.0 = unchanged).
    #[arg(long, default_value_t = EXPOSURE.default)]
    pub exposure: f32,

    /// Contrast factor (0.5–2.0).
    #[arg(long, default_value_t = CONTRAST.default)]
    pub contrast: f32,

    /// Saturation factor (0.0–2.0, 0 = grayscale).
    #[arg(long, default_value_t = SATURATION.default)]
    pub saturation: f32,

    /// Palette name; see --list-palettes.
    #[arg(short, long, default_value = "retro", value_name = "NAME")]
    pub palette: String,

    /// Larger output side in pixels; bigger inputs are downscaled first.
    #[arg(long, default_value_t = OUTPUT_MAX_DIMENSION, value_name = "PX")]
    pub max_dimension: u32,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, value_name = "1-100")]
    pub quality: u8,

    /// Print timing information and mirror the log to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the available palettes and exit.
    #[arg(long)]
    pub list_palettes: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().skip(1).any(|a| Self::is_cli_flag(&a))
    }

    fn is_cli_flag(arg: &str) -> bool {
        arg == "--input" || arg == "-i" || arg.starts_with("--input=") || arg == "--list-palettes"
    }

    /// Headless runs log warnings and errors only, unless `--verbose`.
    pub fn log_level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Warn }
    }

    /// Control values from the flags. Out-of-range numbers are clamped, an
    /// unknown palette name is an error.
    pub fn params(&self) -> Result<Params, EditorError> {
        let palette: Palette = self.palette.parse()?;
        Ok(Params {
            pixel_size: self.pixel_size,
            color_shift: self.color_shift,
            exposure: self.exposure,
            contrast: self.contrast,
            saturation: self.saturation,
            palette,
        }
        .clamped())
    }

    /// `-o` when given, otherwise the default export name beside the input.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        match &self.output {
            Some(p) => p.clone(),
            None => input.with_file_name(io::export_file_name(input)),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the conversion and return an OS exit code.
/// `0` = written, `1` = any failure.
pub fn run(args: CliArgs) -> ExitCode {
    crate::logger::set_min_level(args.log_level());
    crate::logger::echo_to_stderr(args.verbose);

    if args.list_palettes {
        for palette in Palette::all() {
            let swatches: Vec<String> = palette
                .colors()
                .iter()
                .map(|[r, g, b]| format!("#{:02x}{:02x}{:02x}", r, g, b))
                .collect();
            println!("{:<10} {}", palette.key(), swatches.join(" "));
        }
        return ExitCode::SUCCESS;
    }

    let Some(input) = args.input.clone() else {
        eprintln!("error: --input is required");
        return ExitCode::FAILURE;
    };

    let params = match args.params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("       available: {}", palette_names().join(", "));
            return ExitCode::FAILURE;
        }
    };

    let output = args.output_path(&input);
    let start = Instant::now();
    match run_one(&input, &output, &params, args.max_dimension, args.quality) {
        Ok((w, h)) => {
            if args.verbose {
                println!(
                    "{} → {} ({}x{}, {:.0}ms)",
                    input.display(),
                    output.display(),
                    w,
                    h,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            } else {
                println!("{}", output.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn palette_names() -> Vec<&'static str> {
    Palette::all().iter().map(|p| p.key()).collect()
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Load → cap → process → save. Returns the written dimensions.
pub fn run_one(
    input: &Path,
    output: &Path,
    params: &Params,
    max_dimension: u32,
    quality: u8,
) -> Result<(u32, u32), EditorError> {
    // -- Step 1: Load ----------------------------------------------------
    let source = io::load_image(input)?;

    // -- Step 2: Cap size and process ------------------------------------
    let capped = downscale_to_fit(&source, max_dimension.max(1));
    let rendered = pipeline::process(Some(&capped), params)?;

    // -- Step 3: Save ----------------------------------------------------
    io::save_image(&rendered, output, quality)?;
    Ok(capped.dimensions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("RetroPix").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_controls() {
        let args = parse(&["-i", "photo.jpg"]);
        assert_eq!(args.params().unwrap(), Params::default());
        assert_eq!(args.max_dimension, OUTPUT_MAX_DIMENSION);
        assert_eq!(args.output_path(Path::new("dir/my photo.jpg")), PathBuf::from("dir/my_photo_pixelated.jpg"));
    }

    #[test]
    fn input_required_unless_listing() {
        assert!(CliArgs::try_parse_from(["RetroPix"]).is_err());
        assert!(CliArgs::try_parse_from(["RetroPix", "--list-palettes"]).is_ok());
    }

    #[test]
    fn unknown_palette_is_rejected() {
        let args = parse(&["-i", "a.png", "--palette", "sepia"]);
        assert!(matches!(args.params(), Err(EditorError::UnknownPalette(_))));
    }

    #[test]
    fn flags_are_clamped() {
        let args = parse(&["-i", "a.png", "--pixel-size", "1", "--exposure", "4", "--palette", "NEON"]);
        let p = args.params().unwrap();
        assert_eq!(p.pixel_size, PIXEL_SIZE.min);
        assert_eq!(p.exposure, EXPOSURE.max);
        assert_eq!(p.palette, Palette::Neon);
    }

    #[test]
    fn verbose_lowers_the_log_threshold() {
        assert_eq!(parse(&["-i", "a.png"]).log_level(), Level::Warn);
        assert_eq!(parse(&["-i", "a.png", "-v"]).log_level(), Level::Info);
    }

    #[test]
    fn cli_flag_detection() {
        assert!(CliArgs::is_cli_flag("-i"));
        assert!(CliArgs::is_cli_flag("--input=x.png"));
        assert!(CliArgs::is_cli_flag("--list-palettes"));
        assert!(!CliArgs::is_cli_flag("--inputs"));
    }

    #[test]
    fn run_one_writes_capped_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.bmp");
        let img = RgbImage::from_fn(300, 100, |x, y| Rgb([x as u8, y as u8, 50]));
        io::save_image(&img, &input, 90).unwrap();

        let params = Params { palette: Palette::Autumn, ..Params::default() };
        assert_eq!(run_one(&input, &output, &params, 150, 90).unwrap(), (150, 50));
        let written = io::load_image(&output).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (150, 50));
        assert!(written.pixels().all(|p| Palette::Autumn.colors().contains(&p.0)));
    }

    #[test]
    fn run_one_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_one(&dir.path().join("nope.png"), &dir.path().join("o.png"), &Params::default(), 100, 90)
            .unwrap_err();
        assert!(matches!(err, EditorError::Load { .. }));
    }
}
