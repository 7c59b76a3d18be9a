//! SmartLens command line
//!
//! Indexes an image folder and answers free-text searches against it,
//! driving the blocking `smartlens-index` library from a Tokio runtime.

pub mod error;
pub mod render;
pub mod session;

pub use error::{CliError, CliResult};
pub use render::OutputFormat;
pub use session::{FoundImage, LensSession, ProviderKind, SessionStats};
