//! CLI argument types - shared between binary and tests.

use clap::{ArgGroup, Parser};

use crate::config::SandboxConfig;
use crate::utils::errors::{SandboxError, SandboxResult};

#[derive(Parser, Debug)]
#[command(name = "sandbox")]
#[command(about = "Create, enter and destroy lightweight Linux sandboxes")]
#[command(version)]
#[command(group(ArgGroup::new("action").required(true).args(["create", "enter", "delete"])))]
pub struct Cli {
    /// Create a sandbox and run a shell inside it
    #[arg(short = 'c')]
    pub create: bool,

    /// Re-enter the sandbox, looking its parameters up by name
    #[arg(short = 'e')]
    pub enter: bool,

    /// Unmount and remove the sandbox root
    #[arg(short = 'd')]
    pub delete: bool,

    /// Memory limit in megabytes
    #[arg(short = 'm', value_name = "MB", default_value_t = 1024)]
    pub memory: u64,

    /// Number of CPU cores the sandbox may use (0 = unrestricted)
    #[arg(short = 'p', value_name = "CORES", default_value_t = 0)]
    pub cpu_cores: u32,

    /// Give the sandbox host networking (shares host user+net namespaces, requires root)
    #[arg(short = 'n')]
    pub network: bool,

    /// Sandbox name recorded in the registry
    #[arg(short = 's', value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Enter,
    Delete,
}

impl Cli {
    /// The one action selected by `-c`/`-e`/`-d`; clap enforces exclusivity.
    pub fn action(&self) -> Action {
        if self.create {
            Action::Create
        } else if self.enter {
            Action::Enter
        } else {
            Action::Delete
        }
    }

    pub fn config(&self) -> SandboxConfig {
        SandboxConfig {
            memory_mb: self.memory,
            cpu_cores: self.cpu_cores,
            network: self.network,
        }
    }

    /// Value checks that clap's grammar cannot express.
    pub fn validate(&self) -> SandboxResult<()> {
        if self.memory == 0 {
            return Err(SandboxError::Config(
                "memory limit (-m) must be a positive number of megabytes".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_graphic()) {
                return Err(SandboxError::Config(format!(
                    "sandbox name {name:?} must be a non-empty printable token"
                )));
            }
        }
        Ok(())
    }
}
