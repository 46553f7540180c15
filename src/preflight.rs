//! Host environment checks run before any action.

use std::fs;
use std::path::Path;

use nix::unistd::{access, AccessFlags, Uid};
use tracing::warn;

use crate::child;
use crate::utils::errors::{SandboxError, SandboxResult};

const USERNS_SYSCTL: &str = "/proc/sys/kernel/unprivileged_userns_clone";

/// Namespaces the engine relies on, paired with their `/proc/self/ns` names.
const REQUIRED_NAMESPACES: [(&str, &str); 5] = [
    ("mount", "mnt"),
    ("pid", "pid"),
    ("uts", "uts"),
    ("user", "user"),
    ("net", "net"),
];

/// Level of kernel namespace support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceSupport {
    /// Everything the engine uses is available.
    Full,
    /// Only the named namespaces are available.
    Partial(Vec<String>),
    /// No namespace support at all.
    None,
}

/// Advisory checks warn; only a missing `/tmp` (or disabled user namespaces
/// for a non-root caller) blocks.
pub fn check() -> SandboxResult<()> {
    check_namespaces();
    check_userns()?;
    check_shells();
    check_tmp()?;
    Ok(())
}

/// Non-invasive probe of `/proc/self/ns`.
pub fn namespace_support() -> NamespaceSupport {
    let ns_dir = Path::new("/proc/self/ns");
    if !ns_dir.exists() {
        return NamespaceSupport::None;
    }

    let available = REQUIRED_NAMESPACES
        .iter()
        .filter(|(_, entry)| ns_dir.join(entry).exists())
        .map(|(name, _)| name.to_string())
        .collect();
    classify(available)
}

fn classify(available: Vec<String>) -> NamespaceSupport {
    if available.is_empty() {
        NamespaceSupport::None
    } else if available.len() == REQUIRED_NAMESPACES.len() {
        NamespaceSupport::Full
    } else {
        NamespaceSupport::Partial(available)
    }
}

fn check_namespaces() {
    match namespace_support() {
        NamespaceSupport::Full => {}
        NamespaceSupport::Partial(available) => {
            warn!("kernel exposes only some namespaces ({available:?}); isolation will be incomplete");
        }
        NamespaceSupport::None => {
            warn!("kernel exposes no namespace support; launches will fail");
        }
    }
}

/// Debian-style kernels gate unprivileged user namespaces behind a sysctl.
/// Root can proceed regardless; anyone else cannot create the isolated
/// flavor without it.
fn check_userns() -> SandboxResult<()> {
    let Ok(value) = fs::read_to_string(USERNS_SYSCTL) else {
        // sysctl absent: the kernel has no such gate
        return Ok(());
    };
    if value.trim() != "0" {
        return Ok(());
    }

    warn!("unprivileged user namespaces are disabled");
    warn!("run: sudo sysctl -w kernel.unprivileged_userns_clone=1 (or run as root)");
    if Uid::effective().is_root() {
        Ok(())
    } else {
        Err(SandboxError::Env(
            "unprivileged user namespaces are disabled on this kernel".to_string(),
        ))
    }
}

fn check_shells() {
    let found = child::SHELL_PROBE.iter().any(|s| Path::new(s).exists());
    if !found {
        warn!("no shell found on the host (busybox, bash, sh, dash, zsh)");
        warn!("install one with: sudo apt install busybox-static (or bash)");
    }
}

fn check_tmp() -> SandboxResult<()> {
    access("/tmp", AccessFlags::W_OK)
        .map_err(|_| SandboxError::Env("/tmp is not writable".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_is_writable_here() {
        // test environments always have a writable /tmp; the check must pass
        assert!(check_tmp().is_ok());
    }

    #[test]
    fn classify_covers_all_levels() {
        assert_eq!(classify(vec![]), NamespaceSupport::None);

        let all: Vec<String> = REQUIRED_NAMESPACES
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(classify(all), NamespaceSupport::Full);

        let some = vec!["mount".to_string(), "pid".to_string()];
        assert_eq!(
            classify(some.clone()),
            NamespaceSupport::Partial(some)
        );
    }

    #[test]
    fn modern_test_kernels_expose_namespaces() {
        // /proc/self/ns has been present since Linux 3.8
        assert_ne!(namespace_support(), NamespaceSupport::None);
    }
}
