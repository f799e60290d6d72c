use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;
use egui::{Color32, ColorImage, TextureHandle, TextureOptions};

use crate::config::{COLOR_SHIFT, CONTRAST, EXPOSURE, EditorSettings, PIXEL_SIZE, SATURATION, TICK_INTERVAL};
use crate::editor::Editor;
use crate::io::{self, SaveFormat};
use crate::ops::{Palette, centered_offset, fit_to_display};
use crate::pipeline::Params;
use crate::scheduler::RayonRunner;

const CONTROL_PANEL_WIDTH: f32 = 240.0;

// ============================================================================
// DISPLAY CACHE — preview shrunk to the central area, uploaded once
// ============================================================================

struct PreviewTexture {
    texture: TextureHandle,
    /// Run id and area the texture was built for.
    run: u64,
    area: [u32; 2],
    size: [u32; 2],
}

pub struct RetroPixApp {
    editor: Editor,
    /// Widget-bound copy of the control values.
    controls: Params,
    preview: Option<PreviewTexture>,
}

impl RetroPixApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = EditorSettings::load();
        let mut editor = Editor::new(settings, Arc::new(RayonRunner));

        let ctx = cc.egui_ctx.clone();
        editor.set_waker(Arc::new(move || ctx.request_repaint()));

        crate::log_info!("Window ready");
        Self {
            controls: editor.params(),
            editor,
            preview: None,
        }
    }

    // ========================================================================
    // FILE DIALOGS
    // ========================================================================

    fn open_dialog(&mut self) {
        let mut dialog = rfd::FileDialog::new()
            .set_title("Open Image")
            .add_filter("Images", io::OPEN_EXTENSIONS);
        if let Some(dir) = &self.editor.settings().last_dir {
            dialog = dialog.set_directory(dir);
        }
        if let Some(path) = dialog.pick_file() {
            self.editor.open_image(path);
        }
    }

    fn save_dialog(&mut self) {
        if !self.editor.has_image() || self.editor.is_busy() {
            return;
        }
        let mut dialog = rfd::FileDialog::new().set_title("Save Image");
        if let Some(name) = self.editor.default_export_name() {
            dialog = dialog.set_file_name(name);
        }
        if let Some(dir) = self.editor.source_path().and_then(|p| p.parent()) {
            dialog = dialog.set_directory(dir);
        }
        for format in SaveFormat::all() {
            dialog = dialog.add_filter(format.label(), format.extensions());
        }
        if let Some(path) = dialog.save_file() {
            self.editor.save_image(path);
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn controls_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui.button("Open Image…").clicked() {
                self.open_dialog();
            }
            let can_save = self.editor.has_image() && !self.editor.is_busy();
            if ui.add_enabled(can_save, egui::Button::new("Save Image…")).clicked() {
                self.save_dialog();
            }
        });
        ui.separator();

        let c = &mut self.controls;
        ui.label("Pixel size");
        ui.add(egui::Slider::new(&mut c.pixel_size, PIXEL_SIZE.min..=PIXEL_SIZE.max).suffix(" px"));
        ui.label("Color shift");
        ui.add(egui::Slider::new(&mut c.color_shift, COLOR_SHIFT.min..=COLOR_SHIFT.max));
        ui.label("Exposure");
        ui.add(
            egui::Slider::new(&mut c.exposure, EXPOSURE.min..=EXPOSURE.max)
                .step_by(EXPOSURE.step as f64)
                .max_decimals(1),
        );
        ui.label("Contrast");
        ui.add(
            egui::Slider::new(&mut c.contrast, CONTRAST.min..=CONTRAST.max)
                .step_by(CONTRAST.step as f64)
                .max_decimals(1),
        );
        ui.label("Saturation");
        ui.add(
            egui::Slider::new(&mut c.saturation, SATURATION.min..=SATURATION.max)
                .step_by(SATURATION.step as f64)
                .max_decimals(1),
        );

        ui.separator();
        ui.label("Palette");
        for palette in Palette::all() {
            ui.horizontal(|ui| {
                ui.radio_value(&mut c.palette, *palette, palette.label());
                palette_swatch(ui, *palette);
            });
        }

        ui.separator();
        if ui.button("Reset").clicked() {
            *c = Params::default();
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.editor.is_busy() {
                ui.spinner();
            }
            ui.label(self.editor.status());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let (Some(path), Some((w, h))) =
                    (self.editor.source_path(), self.editor.original_dimensions())
                {
                    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    ui.label(format!("{}  {}×{}", name, w, h));
                }
            });
        });
    }

    fn preview_area(&mut self, ui: &mut egui::Ui) {
        let area = ui.available_rect_before_wrap();
        let area_px = [area.width().max(1.0) as u32, area.height().max(1.0) as u32];

        let Some(result) = self.editor.result().cloned() else {
            self.preview = None;
            let hint = if self.editor.has_image() { "" } else { "Open an image to start" };
            ui.centered_and_justified(|ui| ui.weak(hint));
            return;
        };

        let run = self.editor.result_run();
        let stale = self
            .preview
            .as_ref()
            .is_none_or(|p| p.run != run || p.area != area_px);
        if stale {
            let fitted = fit_to_display(&result, area_px[0], area_px[1]);
            let (w, h) = fitted.dimensions();
            let image = ColorImage::from_rgb([w as usize, h as usize], fitted.as_raw());
            let texture = ui.ctx().load_texture("retropix_preview", image, TextureOptions::NEAREST);
            self.preview = Some(PreviewTexture { texture, run, area: area_px, size: [w, h] });
        }

        if let Some(p) = &self.preview {
            let (ox, oy) = centered_offset((area_px[0], area_px[1]), (p.size[0], p.size[1]));
            let rect = egui::Rect::from_min_size(
                area.min + egui::vec2(ox as f32, oy as f32),
                egui::vec2(p.size[0] as f32, p.size[1] as f32),
            );
            ui.painter().image(
                p.texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
    }
}

fn palette_swatch(ui: &mut egui::Ui, palette: Palette) {
    let size = egui::vec2(10.0, 10.0);
    for [r, g, b] in palette.colors() {
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        ui.painter().rect_filled(rect, 1.0, Color32::from_rgb(*r, *g, *b));
    }
}

impl eframe::App for RetroPixApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // --- Shortcuts and drag-and-drop ---
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::O)) {
            self.open_dialog();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::S)) {
            self.save_dialog();
        }
        let dropped: Option<PathBuf> =
            ctx.input(|i| i.raw.dropped_files.iter().find_map(|f| f.path.clone()));
        if let Some(path) = dropped {
            self.editor.open_image(path);
        }

        // --- Poll background work ---
        self.editor.update(now);
        if self.editor.take_settings_dirty() {
            self.editor.settings().save();
        }

        // --- Panels ---
        egui::SidePanel::left("controls")
            .resizable(false)
            .exact_width(CONTROL_PANEL_WIDTH)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.controls_panel(ui));
            });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.status_bar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::from_gray(24)))
            .show(ctx, |ui| self.preview_area(ui));

        // Controls edited this frame feed the debounce timer.
        if self.controls != self.editor.params() {
            self.editor.set_params(self.controls, now);
            self.controls = self.editor.params();
        }

        if self.editor.needs_polling() {
            ctx.request_repaint_after(TICK_INTERVAL);
        }
    }
}
