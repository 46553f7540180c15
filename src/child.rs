//! The child side of a launch: everything between `clone` returning zero and
//! the shell taking over.
//!
//! The child must not touch namespace-dependent syscalls before the parent
//! signals that the UID/GID maps are installed; until then its credentials
//! in a new user namespace are `nobody` and mounts fail with EPERM.

use std::env;
use std::fs::{self, File};
use std::io::Read;
use std::os::fd::OwnedFd;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nix::mount::MsFlags;
use nix::unistd::gethostname;
use tracing::warn;

use crate::config::SandboxConfig;
use crate::limits;
use crate::rootfs;
use crate::sys;
use crate::utils::errors::{SandboxError, SandboxResult};

/// Probe order for the shell to exec; first executable wins.
pub const SHELL_PROBE: &[&str] = &[
    "/bin/busybox",
    "/bin/bash",
    "/bin/sh",
    "/bin/dash",
    "/bin/zsh",
    "/usr/bin/bash",
    "/usr/bin/sh",
];

const SKELETON: &[&str] = &["/bin", "/proc", "/sys", "/tmp", "/dev", "/etc", "/run"];

pub fn run(root: &Path, config: &SandboxConfig, sync: Option<OwnedFd>) -> SandboxResult<()> {
    // Block until the parent has written the uid/gid maps.
    if let Some(fd) = sync {
        let mut pipe = File::from(fd);
        let mut byte = [0u8; 1];
        pipe.read_exact(&mut byte)?;
    }

    sys::enter_root(root)?;

    for dir in SKELETON {
        let _ = sys::mkdir_p(Path::new(dir), 0o755);
    }

    sys::mount("proc", Path::new("/proc"), "proc", MsFlags::empty(), None)?;
    mount_sys(config);
    populate_dev()?;

    limits::apply(config);

    seed_etc();
    prepare_env();

    exec_shell()
}

/// Isolated sandboxes get a namespace-local sysfs. Networked sandboxes keep
/// the host-bound /sys established before the clone; mounting sysfs on top
/// would mask it with an incomplete namespace view.
fn mount_sys(config: &SandboxConfig) {
    if config.network {
        if !Path::new("/sys/devices").exists() {
            warn!("/sys/devices not visible; package managers may fail");
        }
    } else if let Err(e) = sys::mount("sysfs", Path::new("/sys"), "sysfs", MsFlags::empty(), None) {
        warn!("could not mount /sys: {e}");
    }
}

fn populate_dev() -> SandboxResult<()> {
    sys::mount("tmpfs", Path::new("/dev"), "tmpfs", MsFlags::empty(), None)?;

    // node creation is best-effort; a shell survives a missing /dev/random
    let nodes: &[(&str, u64, u64, u32)] = &[
        ("/dev/null", 1, 3, 0o666),
        ("/dev/zero", 1, 5, 0o666),
        ("/dev/random", 1, 8, 0o666),
        ("/dev/urandom", 1, 9, 0o666),
        ("/dev/tty", 5, 0, 0o666),
    ];
    for &(path, major, minor, mode) in nodes {
        let _ = sys::mknod_chr(Path::new(path), major, minor, mode);
    }

    if let Err(e) = rootfs::mount_devpts(Path::new("/dev/pts")) {
        warn!("could not mount /dev/pts: {e}");
    }
    let _ = sys::mknod_chr(Path::new("/dev/ptmx"), 5, 2, 0o666);
    let _ = sys::mknod_chr(Path::new("/dev/console"), 5, 1, 0o600);

    let _ = sys::symlink_force("/proc/self/fd", Path::new("/dev/fd"));
    let _ = sys::symlink_force("/proc/self/fd/0", Path::new("/dev/stdin"));
    let _ = sys::symlink_force("/proc/self/fd/1", Path::new("/dev/stdout"));
    let _ = sys::symlink_force("/proc/self/fd/2", Path::new("/dev/stderr"));

    Ok(())
}

fn seed_etc() {
    let _ = sys::write_file(
        Path::new("/etc/resolv.conf"),
        "nameserver 8.8.8.8\nnameserver 8.8.4.4\n",
    );

    let hostname = gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "sandbox".to_string());
    let _ = sys::write_file(Path::new("/etc/hostname"), &format!("{hostname}\n"));
    let _ = sys::write_file(
        Path::new("/etc/hosts"),
        &format!(
            "127.0.0.1 localhost\n127.0.0.1 {hostname}\n::1 localhost ip6-localhost ip6-loopback\n"
        ),
    );
}

fn prepare_env() {
    if env::var_os("TERM").is_none() {
        env::set_var("TERM", "xterm");
    }
    env::set_var("TERMINFO", "/usr/share/terminfo");
    env::set_var("PATH", "/bin:/usr/bin:/sbin:/usr/sbin");
    env::set_var("HOME", "/");
    env::set_var("USER", "root");
    env::set_var("SHELL", "/bin/sh");
}

fn exec_shell() -> SandboxResult<()> {
    for candidate in SHELL_PROBE {
        let path = Path::new(candidate);
        if !is_executable(path) {
            continue;
        }
        let result = if candidate.contains("busybox") {
            sys::exec(path, &["busybox", "sh"])
        } else {
            sys::exec(path, &["sh"])
        };
        if let Err(e) = result {
            warn!("could not exec {candidate}: {e}");
        }
    }
    Err(SandboxError::Env(
        "no usable shell in sandbox (tried busybox, bash, sh, dash, zsh)".to_string(),
    ))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o100 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_probe_prefers_busybox() {
        assert_eq!(SHELL_PROBE[0], "/bin/busybox");
        assert!(SHELL_PROBE.contains(&"/bin/sh"));
    }

    #[test]
    fn nonexistent_path_is_not_executable() {
        assert!(!is_executable(Path::new("/nonexistent/shell")));
    }

    #[test]
    fn directories_are_not_executable_candidates() {
        assert!(!is_executable(Path::new("/tmp")));
    }
}
