//! Glowii Core Library
//!
//! This crate provides the domain models, error types, configuration, validation and
//! notification primitives shared by all Glowii client components.

pub mod config;
pub mod error;
pub mod models;
pub mod notification;
pub mod validation;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{AppError, AppResult, ErrorKind, ErrorMetadata, LogLevel};
pub use models::{
    Background, Dimensions, EnhancementOption, EnhancementSettings, ImageData, ProcessingStep,
    ServiceMode, Session, Stage,
};
pub use notification::{
    Notification, NotificationLevel, Notifier, RecordingNotifier, TracingNotifier,
};
pub use validation::{MediaValidator, ValidationError, MAX_UPLOAD_BYTES};
