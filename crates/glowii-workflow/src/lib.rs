//! Glowii enhancement workflow
//!
//! Drives one product photo through upload, remote enhancement, option selection and
//! finalization, with the watermark compositor, download and similar-product search available
//! once an option is chosen.

pub mod decode;
pub mod files;
pub mod opener;
pub mod progress;
pub mod workflow;

pub use files::UploadCache;
pub use opener::{LinkOpener, LoggingOpener};
pub use progress::{Outcome, Progress};
pub use workflow::{SelectedFile, Workflow};
