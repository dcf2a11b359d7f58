pub mod config;
pub mod controller;
pub mod error;
pub mod generation;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod script;
pub mod stages;
pub mod state;

pub use config::Config;
pub use controller::WizardController;
pub use error::{GenerationError, HandlerError};
