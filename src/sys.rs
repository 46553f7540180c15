//! Thin typed wrappers over the syscalls the engine is built from.
//!
//! Semantic primitives only: no buffering, no retries. Every failure carries
//! the operation name and the object it touched so callers can surface it
//! unchanged at the CLI boundary.

use std::convert::Infallible;
use std::env;
use std::ffi::CString;
use std::fs::{self, DirBuilder, Permissions};
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{chroot, symlink, DirBuilderExt, PermissionsExt};
use std::path::Path;

use nix::mount::{self, MntFlags, MsFlags};
use nix::sched::{self, CloneCb, CloneFlags, CpuSet};
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, Pid};

use crate::utils::errors::{SandboxError, SandboxResult};

/// Stack handed to the cloned child; 1 MiB matches what the shells need.
pub const CHILD_STACK_SIZE: usize = 1024 * 1024;

pub fn pipe() -> SandboxResult<(OwnedFd, OwnedFd)> {
    unistd::pipe().map_err(|e| SandboxError::syscall("pipe", "sync channel", e))
}

/// Clone a child into `flags` namespaces and run `cb` there. Without
/// CLONE_VM the child gets its own copy of the address space, so the heap
/// stack buffer only has to outlive this call in the parent.
pub fn spawn_child(cb: CloneCb<'_>, flags: CloneFlags) -> SandboxResult<Pid> {
    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    unsafe { sched::clone(cb, &mut stack, flags, Some(libc::SIGCHLD)) }
        .map_err(|e| SandboxError::syscall("clone", format!("{flags:?}"), e))
}

/// Block until the child exits and map its status to an exit code.
pub fn wait_child(pid: Pid) -> SandboxResult<i32> {
    let status = waitpid(pid, None)
        .map_err(|e| SandboxError::syscall("waitpid", pid.to_string(), e))?;
    match status {
        WaitStatus::Exited(_, code) => Ok(code),
        WaitStatus::Signaled(_, signal, _) => Ok(128 + signal as i32),
        _ => Ok(1),
    }
}

pub fn mount(
    source: &str,
    target: &Path,
    fstype: &str,
    flags: MsFlags,
    data: Option<&str>,
) -> SandboxResult<()> {
    mount::mount(Some(source), target, Some(fstype), flags, data)
        .map_err(|e| SandboxError::syscall("mount", target.display().to_string(), e))
}

pub fn bind_mount(source: &Path, target: &Path, recursive: bool) -> SandboxResult<()> {
    let mut flags = MsFlags::MS_BIND;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    mount::mount(Some(source), target, None::<&str>, flags, None::<&str>)
        .map_err(|e| SandboxError::syscall("bind mount", target.display().to_string(), e))
}

pub fn unmount_detach(target: &Path) -> SandboxResult<()> {
    mount::umount2(target, MntFlags::MNT_DETACH)
        .map_err(|e| SandboxError::syscall("umount", target.display().to_string(), e))
}

/// `chroot` + `chdir("/")`.
pub fn enter_root(root: &Path) -> SandboxResult<()> {
    chroot(root)?;
    env::set_current_dir("/")?;
    Ok(())
}

/// Recursive mkdir; forces `mode` on the leaf regardless of umask.
pub fn mkdir_p(path: &Path, mode: u32) -> SandboxResult<()> {
    DirBuilder::new().recursive(true).mode(mode).create(path)?;
    fs::set_permissions(path, Permissions::from_mode(mode))?;
    Ok(())
}

pub fn mknod_chr(path: &Path, major: u64, minor: u64, mode: u32) -> SandboxResult<()> {
    mknod(
        path,
        SFlag::S_IFCHR,
        Mode::from_bits_truncate(mode),
        makedev(major, minor),
    )
    .map_err(|e| SandboxError::syscall("mknod", path.display().to_string(), e))
}

/// Symlink, replacing whatever is already at `link`.
pub fn symlink_force(target: &str, link: &Path) -> SandboxResult<()> {
    let _ = fs::remove_file(link);
    symlink(target, link)?;
    Ok(())
}

pub fn write_file(path: &Path, contents: &str) -> SandboxResult<()> {
    fs::write(path, contents)?;
    Ok(())
}

pub fn set_rlimit_as(soft: u64, hard: u64) -> SandboxResult<()> {
    setrlimit(Resource::RLIMIT_AS, soft, hard)
        .map_err(|e| SandboxError::syscall("setrlimit", "RLIMIT_AS", e))
}

pub fn set_cpu_affinity(set: &CpuSet) -> SandboxResult<()> {
    sched::sched_setaffinity(Pid::from_raw(0), set)
        .map_err(|e| SandboxError::syscall("sched_setaffinity", "self", e))
}

pub fn online_cpus() -> u32 {
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if count < 1 {
        1
    } else {
        count as u32
    }
}

/// Replace the current image with `path`; only returns on failure.
pub fn exec(path: &Path, argv: &[&str]) -> SandboxResult<Infallible> {
    let program = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| SandboxError::Env(format!("exec path contains NUL: {}", path.display())))?;
    let argv: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(*a))
        .collect::<Result<_, _>>()
        .map_err(|_| SandboxError::Env("exec argument contains NUL".to_string()))?;
    unistd::execv(&program, &argv)
        .map_err(|e| SandboxError::syscall("execv", path.display().to_string(), e))
}
