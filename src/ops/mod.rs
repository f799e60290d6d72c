// ============================================================================
// PIXEL OPERATIONS — the stages the pipeline composes
// ============================================================================

pub mod adjustments;
pub mod effects;
pub mod palette;
pub mod transform;

pub use adjustments::{adjust_contrast, adjust_exposure, adjust_saturation};
pub use effects::pixelate;
pub use palette::{Palette, quantize, quantize_named};
pub use transform::{centered_offset, downscale_to_fit, fit_to_display};
