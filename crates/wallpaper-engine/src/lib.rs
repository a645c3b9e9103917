pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod prompts;
pub mod share;

pub use api::{GeminiClient, ImageApi};
pub use config::ApiConfig;
pub use coordinator::{
    BusyState, Coordinator, Dispatch, ErrorKind, IgnoreReason, Notice, SessionState,
};
pub use error::ApiError;
pub use prompts::AssistantTask;
pub use share::{ShareError, ShareOutcome, SharePayload, ShareTarget};
