// ============================================================================
// EDITOR SESSION — image slots, controls, status line, background jobs
// ============================================================================
//
// Everything the window shows lives here, owned by the UI thread. Workers
// only ever see cloned `Arc` snapshots and report back over channels that
// `update()` drains once per frame.
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Instant;

use image::{DynamicImage, GenericImageView, RgbImage};

use crate::config::EditorSettings;
use crate::error::EditorError;
use crate::io;
use crate::ops::downscale_to_fit;
use crate::pipeline::{self, Params};
use crate::scheduler::{
    JobRunner, PreviewScheduler, SchedulerState, TaskSlot, Waker, run_guarded,
};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_LOADING: &str = "Loading image...";
pub const STATUS_PROCESSING: &str = "Processing image...";
pub const STATUS_EXPORTING: &str = "Processing full resolution image...";

/// Result of a load or save job.
enum IoResult {
    ImageLoaded {
        path: PathBuf,
        original: Arc<DynamicImage>,
        preview: Arc<DynamicImage>,
    },
    LoadFailed(EditorError),
    Saved(PathBuf),
    SaveFailed(EditorError),
}

pub struct Editor {
    settings: EditorSettings,
    settings_dirty: bool,
    /// Control values as of the last `take_settings_dirty`.
    persisted_params: Params,
    params: Params,

    /// Full-resolution decode of the last opened file.
    original: Option<Arc<DynamicImage>>,
    /// Bounded copy the live preview runs on.
    preview_source: Option<Arc<DynamicImage>>,
    source_path: Option<PathBuf>,
    /// Last published preview and the run that produced it.
    result: Option<Arc<RgbImage>>,
    result_run: u64,
    status: String,

    slot: TaskSlot,
    scheduler: PreviewScheduler,
    runner: Arc<dyn JobRunner>,
    io_sender: mpsc::Sender<IoResult>,
    io_receiver: mpsc::Receiver<IoResult>,
    waker: Option<Waker>,
}

impl Editor {
    pub fn new(settings: EditorSettings, runner: Arc<dyn JobRunner>) -> Self {
        let (io_sender, io_receiver) = mpsc::channel();
        let params = settings.params.clamped();
        Self {
            scheduler: PreviewScheduler::new(settings.debounce()),
            settings,
            settings_dirty: false,
            persisted_params: params,
            params,
            original: None,
            preview_source: None,
            source_path: None,
            result: None,
            result_run: 0,
            status: STATUS_READY.to_string(),
            slot: TaskSlot::new(),
            runner,
            io_sender,
            io_receiver,
            waker: None,
        }
    }

    /// Hook called by workers after they deliver a result.
    pub fn set_waker(&mut self, waker: Waker) {
        self.scheduler.set_waker(Arc::clone(&waker));
        self.waker = Some(waker);
    }

    // ---- accessors ------------------------------------------------------

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn result(&self) -> Option<&Arc<RgbImage>> {
        self.result.as_ref()
    }

    /// Run id of the displayed preview; changes whenever a new one is published.
    pub fn result_run(&self) -> u64 {
        self.result_run
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn original_dimensions(&self) -> Option<(u32, u32)> {
        self.original.as_ref().map(|img| img.dimensions())
    }

    pub fn has_image(&self) -> bool {
        self.original.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// True while anything is waiting on a timer or a worker.
    pub fn needs_polling(&self) -> bool {
        self.is_busy() || self.scheduler.state() != SchedulerState::Idle
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Returns true once after each change worth persisting: a load, a
    /// save, or a preview published with new control values.
    pub fn take_settings_dirty(&mut self) -> bool {
        let dirty = std::mem::take(&mut self.settings_dirty);
        if dirty {
            self.persisted_params = self.settings.params;
        }
        dirty
    }

    /// `<stem>_pixelated.<ext>` for the current source.
    pub fn default_export_name(&self) -> Option<String> {
        self.source_path.as_deref().map(io::export_file_name)
    }

    // ---- commands -------------------------------------------------------

    /// Record new control values. Returns false when nothing changed.
    pub fn set_params(&mut self, params: Params, now: Instant) -> bool {
        let params = params.clamped();
        if params == self.params {
            return false;
        }
        self.params = params;
        self.settings.params = params;
        self.scheduler.notify_change(params, now);
        true
    }

    /// Start decoding `path` in the background. Dropped while another job runs.
    pub fn open_image(&mut self, path: PathBuf) -> bool {
        let Some(guard) = self.slot.try_acquire() else {
            crate::log_warn!("Open ignored, busy: {}", path.display());
            return false;
        };
        crate::log_info!("Opening {}", path.display());
        self.status = STATUS_LOADING.to_string();

        let preview_max = self.settings.preview_max_dimension;
        let sender = self.io_sender.clone();
        let waker = self.waker.clone();
        self.runner.spawn(Box::new(move || {
            let loaded = run_guarded("Load", || {
                let original = io::load_image(&path)?;
                let preview = downscale_to_fit(&original, preview_max);
                Ok((original, preview))
            });
            drop(guard);
            let msg = match loaded {
                Ok((original, preview)) => IoResult::ImageLoaded {
                    path,
                    original: Arc::new(original),
                    preview: Arc::new(preview),
                },
                Err(e) => IoResult::LoadFailed(e),
            };
            let _ = sender.send(msg);
            if let Some(wake) = waker {
                wake();
            }
        }));
        true
    }

    /// Render the original at export size and write it to `path`.
    /// A no-op, status untouched, without an image or while busy.
    pub fn save_image(&mut self, path: PathBuf) -> bool {
        let Some(original) = self.original.clone() else {
            return false;
        };
        let Some(guard) = self.slot.try_acquire() else {
            crate::log_warn!("Save ignored, busy: {}", path.display());
            return false;
        };
        crate::log_info!("Exporting to {}", path.display());
        self.status = STATUS_EXPORTING.to_string();

        let params = self.params;
        let max_dim = self.settings.output_max_dimension;
        let quality = self.settings.jpeg_quality;
        let sender = self.io_sender.clone();
        let waker = self.waker.clone();
        self.runner.spawn(Box::new(move || {
            let saved = run_guarded("Export", || {
                let export_source = downscale_to_fit(&original, max_dim);
                let rendered = pipeline::process(Some(&export_source), &params)?;
                io::save_image(&rendered, &path, quality)
            });
            drop(guard);
            let msg = match saved {
                Ok(()) => IoResult::Saved(path),
                Err(e) => IoResult::SaveFailed(e),
            };
            let _ = sender.send(msg);
            if let Some(wake) = waker {
                wake();
            }
        }));
        true
    }

    /// Per-frame pump: finished I/O, the debounce check, then finished
    /// previews. Returns true when anything visible changed.
    pub fn update(&mut self, now: Instant) -> bool {
        let mut changed = false;

        while let Ok(msg) = self.io_receiver.try_recv() {
            changed = true;
            self.handle_io(msg, now);
        }

        let source = self.preview_source.clone();
        let runner = Arc::clone(&self.runner);
        if self
            .scheduler
            .tick(now, source.as_ref(), &self.slot, runner.as_ref())
            .is_some()
        {
            changed = true;
            self.status = STATUS_PROCESSING.to_string();
        }

        // finished runs, including one an inline runner completed just above
        if let Some(outcome) = self.scheduler.poll() {
            changed = true;
            match outcome.result {
                Ok(img) => {
                    crate::log_info!(
                        "Preview #{} ready in {:.0}ms",
                        outcome.run_id,
                        outcome.elapsed.as_secs_f64() * 1000.0
                    );
                    self.result = Some(Arc::new(img));
                    self.result_run = outcome.run_id;
                    self.status = STATUS_READY.to_string();
                    if outcome.params != self.persisted_params {
                        self.settings_dirty = true;
                    }
                }
                Err(e) => {
                    crate::log_err!("Preview #{} failed: {}", outcome.run_id, e);
                    self.status = e.to_string();
                }
            }
        }

        changed
    }

    fn handle_io(&mut self, msg: IoResult, now: Instant) {
        match msg {
            IoResult::ImageLoaded { path, original, preview } => {
                let (w, h) = original.dimensions();
                let (pw, ph) = preview.dimensions();
                crate::log_info!("Loaded {} ({}x{}, preview {}x{})", path.display(), w, h, pw, ph);
                self.original = Some(original);
                self.preview_source = Some(preview);
                self.result = None;
                self.settings.last_dir = path.parent().map(Path::to_path_buf);
                self.settings_dirty = true;
                self.source_path = Some(path);
                // results computed from the previous image must never show up
                self.scheduler.invalidate();
                self.scheduler.notify_change(self.params, now);
                self.status = STATUS_PROCESSING.to_string();
            }
            IoResult::LoadFailed(e) => {
                crate::log_err!("{}", e);
                self.status = e.to_string();
            }
            IoResult::Saved(path) => {
                crate::log_info!("Saved {}", path.display());
                let name = path.file_name().unwrap_or(path.as_os_str());
                self.status = format!("Saved to {}", name.to_string_lossy());
                self.settings_dirty = true;
            }
            IoResult::SaveFailed(e) => {
                crate::log_err!("{}", e);
                self.status = e.to_string();
            }
        }
    }
}
