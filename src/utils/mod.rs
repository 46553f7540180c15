pub mod errors;
pub mod logging;

pub use errors::{SandboxError, SandboxResult};
