// ============================================================================
// PALETTE QUANTIZATION — map every pixel to its nearest palette color
// ============================================================================
//
// Palettes are a closed set with compile-time color tables. The "color shift"
// control rotates the table before matching; because matching is a stable
// argmin over squared RGB distance, rotation only changes which entry wins a
// tie. No dithering, no perceptual color space.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use rayon::prelude::*;

use crate::error::EditorError;

/// The fixed set of retro palettes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Palette {
    #[default]
    Retro,
    Cyberpunk,
    Vaporwave,
    Mono,
    Neon,
    Pastel,
    Autumn,
    Sunset,
}

const RETRO: [[u8; 3]; 5] = [
    [60, 35, 80],
    [100, 60, 120],
    [200, 80, 100],
    [255, 170, 80],
    [255, 240, 120],
];
const CYBERPUNK: [[u8; 3]; 5] = [
    [10, 10, 40],
    [30, 60, 120],
    [0, 220, 220],
    [255, 50, 120],
    [255, 240, 0],
];
const VAPORWAVE: [[u8; 3]; 5] = [
    [100, 20, 100],
    [180, 50, 190],
    [0, 205, 205],
    [255, 120, 180],
    [180, 230, 255],
];
const MONO: [[u8; 3]; 5] = [
    [20, 20, 20],
    [80, 80, 80],
    [150, 150, 150],
    [220, 220, 220],
    [250, 250, 250],
];
const NEON: [[u8; 3]; 5] = [
    [10, 10, 30],
    [30, 0, 80],
    [255, 0, 180],
    [0, 255, 160],
    [0, 240, 255],
];
const PASTEL: [[u8; 3]; 5] = [
    [240, 210, 210],
    [210, 240, 220],
    [210, 220, 240],
    [240, 230, 210],
    [225, 210, 240],
];
const AUTUMN: [[u8; 3]; 5] = [
    [40, 20, 10],
    [120, 60, 20],
    [210, 110, 40],
    [230, 180, 80],
    [180, 120, 100],
];
const SUNSET: [[u8; 3]; 5] = [
    [20, 20, 50],
    [80, 30, 90],
    [180, 60, 80],
    [240, 120, 50],
    [255, 210, 100],
];

impl Palette {
    pub fn all() -> &'static [Palette] {
        &[
            Palette::Retro,
            Palette::Cyberpunk,
            Palette::Vaporwave,
            Palette::Mono,
            Palette::Neon,
            Palette::Pastel,
            Palette::Autumn,
            Palette::Sunset,
        ]
    }

    /// Stable lowercase key, used on the command line and in the settings file.
    pub fn key(&self) -> &'static str {
        match self {
            Palette::Retro => "retro",
            Palette::Cyberpunk => "cyberpunk",
            Palette::Vaporwave => "vaporwave",
            Palette::Mono => "mono",
            Palette::Neon => "neon",
            Palette::Pastel => "pastel",
            Palette::Autumn => "autumn",
            Palette::Sunset => "sunset",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Palette::Retro => "Retro",
            Palette::Cyberpunk => "Cyberpunk",
            Palette::Vaporwave => "Vaporwave",
            Palette::Mono => "Mono",
            Palette::Neon => "Neon",
            Palette::Pastel => "Pastel",
            Palette::Autumn => "Autumn",
            Palette::Sunset => "Sunset",
        }
    }

    pub fn colors(&self) -> &'static [[u8; 3]] {
        match self {
            Palette::Retro => &RETRO,
            Palette::Cyberpunk => &CYBERPUNK,
            Palette::Vaporwave => &VAPORWAVE,
            Palette::Mono => &MONO,
            Palette::Neon => &NEON,
            Palette::Pastel => &PASTEL,
            Palette::Autumn => &AUTUMN,
            Palette::Sunset => &SUNSET,
        }
    }

    /// Color table after applying the shift control (see [`rotation_for_shift`]).
    pub fn rotated(&self, shift_amount: u32) -> Vec<[u8; 3]> {
        let mut colors = self.colors().to_vec();
        let n = colors.len();
        if n > 0 {
            colors.rotate_right(rotation_for_shift(shift_amount) % n);
        }
        colors
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Palette {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Palette::all()
            .iter()
            .copied()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| EditorError::UnknownPalette(s.to_string()))
    }
}

/// Number of positions the palette is rotated for a 0–100 shift control:
/// `floor(shift * 3 / 100)`, and 0 when the control is 0.
pub fn rotation_for_shift(shift_amount: u32) -> usize {
    if shift_amount == 0 {
        return 0;
    }
    (shift_amount as u64 * 3 / 100) as usize
}

/// Index of the nearest color by squared RGB distance; first entry wins ties.
#[inline]
pub fn nearest_color_index(pixel: [u8; 3], colors: &[[u8; 3]]) -> usize {
    let mut best_idx = 0usize;
    let mut best_dist = u32::MAX;
    for (i, c) in colors.iter().enumerate() {
        let dr = pixel[0] as i32 - c[0] as i32;
        let dg = pixel[1] as i32 - c[1] as i32;
        let db = pixel[2] as i32 - c[2] as i32;
        let d = (dr * dr + dg * dg + db * db) as u32;
        if d < best_dist {
            best_dist = d;
            best_idx = i;
        }
    }
    best_idx
}

/// Replace every pixel with its nearest color from `colors`.
/// An empty table returns the image unchanged.
pub fn quantize_with_colors(img: &RgbImage, colors: &[[u8; 3]]) -> RgbImage {
    let w = img.width() as usize;
    let h = img.height() as usize;
    if w == 0 || h == 0 || colors.is_empty() {
        return img.clone();
    }

    let src_raw = img.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for (px_out, px_in) in row_out.chunks_exact_mut(3).zip(row_in.chunks_exact(3)) {
                let idx = nearest_color_index([px_in[0], px_in[1], px_in[2]], colors);
                px_out.copy_from_slice(&colors[idx]);
            }
        });

    RgbImage::from_raw(img.width(), img.height(), dst_raw).unwrap_or_else(|| img.clone())
}

/// Quantize against a palette rotated by the shift control.
pub fn quantize(img: &RgbImage, palette: Palette, shift_amount: u32) -> RgbImage {
    quantize_with_colors(img, &palette.rotated(shift_amount))
}

/// String-keyed entry point. Unknown names fail before any pixel is touched.
pub fn quantize_named(img: &RgbImage, name: &str, shift_amount: u32) -> Result<RgbImage, EditorError> {
    let palette: Palette = name.parse()?;
    Ok(quantize(img, palette, shift_amount))
}
