pub mod bootstrap;
pub mod error;
pub mod settings;
pub mod util;

// Re-exports
pub use ::tracing::{self, debug, error, info, metadata, trace, warn};
pub use util::*;
