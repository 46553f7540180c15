//! Sandbox parameter types and the registry line codec.

use crate::utils::errors::{SandboxError, SandboxResult};

/// Limits and isolation choices for one launch. Plain copyable data: it is
/// handed to the clone callback by value and must not carry any handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Memory cap in megabytes.
    pub memory_mb: u64,
    /// Number of CPU cores the sandbox may use; 0 means unrestricted.
    pub cpu_cores: u32,
    /// Share the host user and network namespaces (requires root).
    pub network: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_mb: 1024,
            cpu_cores: 0,
            network: false,
        }
    }
}

/// Config used by `enter` when the name is missing from the registry.
pub const ENTER_FALLBACK: SandboxConfig = SandboxConfig {
    memory_mb: 100,
    cpu_cores: 0,
    network: false,
};

/// One registry record: the parameters a sandbox was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxDescriptor {
    pub name: String,
    pub config: SandboxConfig,
    /// Wall-clock creation time, whole seconds since the epoch.
    pub created_at: i64,
}

impl SandboxDescriptor {
    /// Serialize as a registry line: `<name> <mb> <cores> <net:0|1> <epoch>`.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.name,
            self.config.memory_mb,
            self.config.cpu_cores,
            u8::from(self.config.network),
            self.created_at
        )
    }

    /// Parse a registry line. Tolerates arbitrary whitespace between fields;
    /// anything other than exactly five fields is malformed.
    pub fn from_line(line: &str) -> SandboxResult<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let &[name, memory, cores, network, created] = fields.as_slice() else {
            return Err(SandboxError::Registry(line.to_string()));
        };
        let malformed = || SandboxError::Registry(line.to_string());

        Ok(Self {
            name: name.to_string(),
            config: SandboxConfig {
                memory_mb: memory.parse().map_err(|_| malformed())?,
                cpu_cores: cores.parse().map_err(|_| malformed())?,
                network: network.parse::<i64>().map_err(|_| malformed())? != 0,
            },
            created_at: created.parse().map_err(|_| malformed())?,
        })
    }
}
