//! RetroPix: turn photos into palette-limited pixel art.
//!
//! The pixel stages live in [`ops`], composed in a fixed order by
//! [`pipeline::process`]. [`editor::Editor`] owns an editing session and
//! drives the debounced [`scheduler::PreviewScheduler`]; the eframe window in
//! [`app`] and the headless [`cli`] are thin front-ends over it.

pub mod logger;

pub mod app;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod pipeline;
pub mod scheduler;

pub use editor::Editor;
pub use error::EditorError;
pub use ops::Palette;
pub use pipeline::{Params, process};
