//! NANozILLA Reactor - AI image colorization and restyling
//!
//! Validates an uploaded image and a free-text style prompt, spell-corrects
//! the prompt, normalizes the image and forwards both to a hosted image model
//! through a retrying, rate-limited client. Single images are processed
//! inline; batches run in the background with per-job progress tracking.

pub mod ai;
pub mod app;
pub mod batch;
pub mod config;
pub mod error;
pub mod generator;
pub mod image;
pub mod models;
pub mod server;
pub mod spelling;
pub mod validation;

pub use error::{Error, Result};
