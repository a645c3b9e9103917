pub mod chat;
pub mod events;
pub mod history;
pub mod image_uri;
pub mod preferences;
pub mod settings;
pub mod store;
