use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("invalid invocation: {0}")]
    Config(String),

    #[error("{0} requires root privileges")]
    Privilege(&'static str),

    #[error("environment check failed: {0}")]
    Env(String),

    #[error("{op} {detail}: {source}")]
    Syscall {
        op: &'static str,
        detail: String,
        #[source]
        source: nix::Error,
    },

    #[error("malformed registry line: {0:?}")]
    Registry(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// Wrap a failed syscall together with the object it touched.
    pub fn syscall(op: &'static str, detail: impl Into<String>, source: nix::Error) -> Self {
        Self::Syscall {
            op,
            detail: detail.into(),
            source,
        }
    }
}

pub type SandboxResult<T> = Result<T, SandboxError>;
