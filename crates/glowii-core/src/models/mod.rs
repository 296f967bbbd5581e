//! Domain models for one enhancement session

pub mod image;
pub mod session;
pub mod settings;

pub use image::{Dimensions, EnhancementOption, ImageData};
pub use session::{ProcessingStep, Session, Stage};
pub use settings::{Background, EnhancementSettings, ServiceMode};
