pub mod document;
pub mod loader;
pub mod secret;
pub mod types;

pub use document::{DocumentError, OpaqueDocument};
pub use loader::ConfigError;
pub use secret::SecretString;
pub use types::{ProjectFile, Settings, StackConfig};
