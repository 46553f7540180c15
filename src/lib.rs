//! Lightweight throwaway Linux sandboxes: a private rootfs under a tmpfs,
//! a child cloned into its own namespaces, and per-sandbox memory/CPU
//! limits. The `sandbox` binary is the whole external surface, next to an
//! append-only registry file that management frontends read.

pub mod child;
pub mod cli;
pub mod config;
pub mod launcher;
pub mod lifecycle;
pub mod limits;
pub mod net;
pub mod paths;
pub mod preflight;
pub mod registry;
pub mod rootfs;
pub mod sys;
pub mod utils;

pub use config::{SandboxConfig, SandboxDescriptor};
pub use utils::errors::{SandboxError, SandboxResult};
