// ============================================================================
// CONFIGURATION — control ranges, timing constants, persisted settings
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::ops::Palette;
use crate::pipeline::Params;

/// Larger side of the downscaled copy the live preview works on.
pub const PREVIEW_MAX_DIMENSION: u32 = 1200;
/// Larger side cap for exported images.
pub const OUTPUT_MAX_DIMENSION: u32 = 2000;
/// Quiet period after the last control change before a preview run starts.
pub const DEBOUNCE: Duration = Duration::from_millis(300);
/// How often the UI polls the scheduler.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Slider bounds and default for one control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlRange<T> {
    pub min: T,
    pub max: T,
    pub step: T,
    pub default: T,
}

impl ControlRange<u32> {
    pub fn clamp(&self, v: u32) -> u32 {
        v.clamp(self.min, self.max)
    }
}

impl ControlRange<f32> {
    /// Clamp into range; NaN falls back to the default.
    pub fn clamp(&self, v: f32) -> f32 {
        if v.is_nan() {
            self.default
        } else {
            v.clamp(self.min, self.max)
        }
    }
}

pub const PIXEL_SIZE: ControlRange<u32> = ControlRange { min: 2, max: 40, step: 1, default: 10 };
pub const COLOR_SHIFT: ControlRange<u32> = ControlRange { min: 0, max: 100, step: 1, default: 50 };
pub const EXPOSURE: ControlRange<f32> = ControlRange { min: 0.5, max: 1.5, step: 0.1, default: 1.0 };
pub const CONTRAST: ControlRange<f32> = ControlRange { min: 0.5, max: 2.0, step: 0.1, default: 1.2 };
pub const SATURATION: ControlRange<f32> = ControlRange { min: 0.0, max: 2.0, step: 0.1, default: 1.4 };

// ============================================================================
// PERSISTED SETTINGS
// ============================================================================

/// User settings stored between sessions as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Control values at the end of the last session.
    pub params: Params,
    /// Directory of the last opened image, used as the dialog start folder.
    pub last_dir: Option<PathBuf>,
    pub preview_max_dimension: u32,
    pub output_max_dimension: u32,
    pub debounce_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            params: Params::default(),
            last_dir: None,
            preview_max_dimension: PREVIEW_MAX_DIMENSION,
            output_max_dimension: OUTPUT_MAX_DIMENSION,
            debounce_ms: DEBOUNCE.as_millis() as u64,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/retropix/retropix_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\RetroPix\retropix_settings.cfg
    /// On macOS:   ~/Library/Application Support/RetroPix/retropix_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("retropix");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("retropix_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("RetroPix");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("retropix_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("RetroPix");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("retropix_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("retropix_settings.cfg")))
        }
    }

    /// Debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn to_config_string(&self) -> String {
        let p = &self.params;
        let mut content = format!(
            "pixel_size={}\n\
             color_shift={}\n\
             exposure={}\n\
             contrast={}\n\
             saturation={}\n\
             palette={}\n\
             preview_max_dimension={}\n\
             output_max_dimension={}\n\
             debounce_ms={}\n\
             jpeg_quality={}\n",
            p.pixel_size,
            p.color_shift,
            p.exposure,
            p.contrast,
            p.saturation,
            p.palette.key(),
            self.preview_max_dimension,
            self.output_max_dimension,
            self.debounce_ms,
            self.jpeg_quality,
        );
        if let Some(dir) = &self.last_dir {
            content.push_str(&format!("last_dir={}\n", dir.display()));
        }
        content
    }

    /// Parse `key=value` lines. Unknown keys and bad values are skipped, and
    /// every value is clamped into its valid range.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "pixel_size" => {
                    if let Ok(v) = val.parse() { s.params.pixel_size = v; }
                }
                "color_shift" => {
                    if let Ok(v) = val.parse() { s.params.color_shift = v; }
                }
                "exposure" => {
                    if let Ok(v) = val.parse() { s.params.exposure = v; }
                }
                "contrast" => {
                    if let Ok(v) = val.parse() { s.params.contrast = v; }
                }
                "saturation" => {
                    if let Ok(v) = val.parse() { s.params.saturation = v; }
                }
                "palette" => {
                    if let Ok(v) = val.parse::<Palette>() { s.params.palette = v; }
                }
                "preview_max_dimension" => {
                    if let Ok(v) = val.parse::<u32>() { s.preview_max_dimension = v.clamp(64, 8192); }
                }
                "output_max_dimension" => {
                    if let Ok(v) = val.parse::<u32>() { s.output_max_dimension = v.clamp(64, 16384); }
                }
                "debounce_ms" => {
                    if let Ok(v) = val.parse::<u64>() { s.debounce_ms = v.min(5_000); }
                }
                "jpeg_quality" => {
                    if let Ok(v) = val.parse::<u8>() { s.jpeg_quality = v.clamp(1, 100); }
                }
                "last_dir" if !val.is_empty() => {
                    s.last_dir = Some(PathBuf::from(val));
                }
                _ => {}
            }
        }
        s.params = s.params.clamped();
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Could not write settings {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}
