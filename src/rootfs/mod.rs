//! Rootfs construction.
//!
//! A build is a declarative list of [`Ingredient`]s consumed by a small
//! interpreter. Failing to mount the tmpfs root is fatal; every individual
//! ingredient is best-effort, because a heterogeneous host may lack some of
//! the source paths and the shell usually still boots without them.

pub mod deps;
pub mod isolated;
pub mod network;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::mount::MsFlags;
use tracing::{debug, info, warn};

use crate::sys;
use crate::utils::errors::{SandboxError, SandboxResult};

pub use deps::{host_tracer, DependencyTracer, ElfTracer, LddTracer};

/// Mount options for the pseudo-terminal filesystem; gid 5 is the
/// conventional `tty` group.
pub const DEVPTS_OPTIONS: &str = "gid=5,mode=620,ptmxmode=666";

/// One declarative step of a rootfs build. Paths are absolute host paths;
/// the interpreter mirrors them under the sandbox root.
#[derive(Debug, Clone, Copy)]
pub enum Ingredient {
    /// Directory inside the sandbox, created with `mode`.
    Dir { path: &'static str, mode: u32 },
    /// Copy one host file to the mirrored path, following symlinks.
    CopyFile { host: &'static str },
    /// Copy a host binary plus every shared library it references.
    CopyTraced { binary: &'static str },
    /// Copy the contents of a host directory tree into `dest`.
    CopyTree {
        host: &'static str,
        dest: &'static str,
    },
    /// Bind-mount a host directory at the mirrored path.
    BindDir { host: &'static str },
    /// Bind-mount a single host file at the mirrored path.
    BindFile { host: &'static str },
    /// Recursive bind of a host directory (submounts included).
    RbindDir { host: &'static str },
    /// Character device node.
    ChrDev {
        path: &'static str,
        major: u64,
        minor: u64,
        mode: u32,
    },
    /// devpts on `/dev/pts`, falling back to an optionless mount.
    Devpts,
    /// Symlink inside the sandbox, replacing any existing file.
    Symlink {
        target: &'static str,
        link: &'static str,
    },
    /// Write a config file inside the sandbox.
    Seed {
        path: &'static str,
        contents: &'static str,
    },
}

/// Mount a fresh tmpfs on the sandbox root. Failure here is fatal: nothing
/// else can proceed without the private mount.
pub fn mount_root(root: &Path) -> SandboxResult<()> {
    sys::mkdir_p(root, 0o755)?;
    sys::mount("tmpfs", root, "tmpfs", MsFlags::empty(), None)
}

/// Mount the tmpfs root for `enter`, accepting that it may already be there
/// from the original `create`.
pub fn mount_root_reuse(root: &Path) {
    if let Err(e) = sys::mkdir_p(root, 0o755) {
        warn!("could not create sandbox root: {e}");
        return;
    }
    match sys::mount("tmpfs", root, "tmpfs", MsFlags::empty(), None) {
        Ok(()) => {}
        Err(SandboxError::Syscall {
            source: Errno::EBUSY,
            ..
        }) => debug!("sandbox root already mounted"),
        Err(e) => warn!("could not remount sandbox root: {e}"),
    }
}

/// Both variants want busybox staged early; one static binary is often
/// enough to get a shell even when the rest of the build finds nothing.
pub fn stage_busybox(root: &Path) {
    if sys::mkdir_p(&root.join("bin"), 0o755).is_err() {
        return;
    }
    if let Err(e) = fs::copy("/bin/busybox", root.join("bin/busybox")) {
        debug!("busybox not staged: {e}");
    }
}

/// Run a plan against the sandbox root. Individual failures are logged and
/// skipped.
pub fn build(root: &Path, plan: &[Ingredient], tracer: &dyn DependencyTracer) {
    let mut applied = 0usize;
    let mut skipped = 0usize;
    for ingredient in plan {
        match apply(root, ingredient, tracer) {
            Ok(()) => applied += 1,
            Err(e) => {
                skipped += 1;
                debug!("skipping {ingredient:?}: {e}");
            }
        }
    }
    info!("rootfs build: {applied} ingredients applied, {skipped} skipped");
}

/// Host-absolute path mirrored under the sandbox root.
fn in_root(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

fn apply(root: &Path, ingredient: &Ingredient, tracer: &dyn DependencyTracer) -> SandboxResult<()> {
    match *ingredient {
        Ingredient::Dir { path, mode } => sys::mkdir_p(&in_root(root, path), mode),
        Ingredient::CopyFile { host } => copy_mirrored(root, Path::new(host)),
        Ingredient::CopyTraced { binary } => {
            copy_mirrored(root, Path::new(binary))?;
            for library in tracer.trace(Path::new(binary)) {
                if let Err(e) = copy_mirrored(root, &library) {
                    debug!("dependency {} not copied: {e}", library.display());
                }
            }
            Ok(())
        }
        Ingredient::CopyTree { host, dest } => {
            if !Path::new(host).is_dir() {
                return Err(missing(host));
            }
            let target = in_root(root, dest);
            sys::mkdir_p(&target, 0o755)?;
            copy_tree_contents(Path::new(host), &target);
            Ok(())
        }
        Ingredient::BindDir { host } => {
            if !Path::new(host).is_dir() {
                return Err(missing(host));
            }
            let target = in_root(root, host);
            sys::mkdir_p(&target, 0o755)?;
            sys::bind_mount(Path::new(host), &target, false)
        }
        Ingredient::BindFile { host } => {
            if !Path::new(host).is_file() {
                return Err(missing(host));
            }
            let target = in_root(root, host);
            ensure_file(&target)?;
            sys::bind_mount(Path::new(host), &target, false)
        }
        Ingredient::RbindDir { host } => {
            if !Path::new(host).is_dir() {
                return Err(missing(host));
            }
            let target = in_root(root, host);
            sys::mkdir_p(&target, 0o755)?;
            sys::bind_mount(Path::new(host), &target, true)
        }
        Ingredient::ChrDev {
            path,
            major,
            minor,
            mode,
        } => match sys::mknod_chr(&in_root(root, path), major, minor, mode) {
            // already present from a previous enter
            Err(SandboxError::Syscall {
                source: Errno::EEXIST,
                ..
            }) => Ok(()),
            other => other,
        },
        Ingredient::Devpts => mount_devpts(&in_root(root, "/dev/pts")),
        Ingredient::Symlink { target, link } => sys::symlink_force(target, &in_root(root, link)),
        Ingredient::Seed { path, contents } => {
            let target = in_root(root, path);
            if let Some(parent) = target.parent() {
                sys::mkdir_p(parent, 0o755)?;
            }
            sys::write_file(&target, contents)
        }
    }
}

/// devpts with the standard options; some kernels reject them, so retry
/// bare before giving up. A previous mount is fine.
pub fn mount_devpts(target: &Path) -> SandboxResult<()> {
    sys::mkdir_p(target, 0o755)?;
    let first = sys::mount(
        "devpts",
        target,
        "devpts",
        MsFlags::empty(),
        Some(DEVPTS_OPTIONS),
    );
    match first {
        Ok(()) => Ok(()),
        Err(SandboxError::Syscall {
            source: Errno::EBUSY,
            ..
        }) => Ok(()),
        Err(_) => sys::mount("devpts", target, "devpts", MsFlags::empty(), None),
    }
}

fn missing(host: &str) -> SandboxError {
    SandboxError::Env(format!("host path {host} not present"))
}

fn copy_mirrored(root: &Path, host: &Path) -> SandboxResult<()> {
    let target = root.join(
        host.strip_prefix("/")
            .map_err(|_| SandboxError::Env(format!("not an absolute path: {}", host.display())))?,
    );
    if let Some(parent) = target.parent() {
        sys::mkdir_p(parent, 0o755)?;
    }
    fs::copy(host, &target)?;
    Ok(())
}

fn ensure_file(path: &Path) -> SandboxResult<()> {
    if let Some(parent) = path.parent() {
        sys::mkdir_p(parent, 0o755)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

/// Copy the contents of `src` into `dst`, dereferencing symlinks; errors on
/// individual entries are skipped.
fn copy_tree_contents(src: &Path, dst: &Path) {
    let Ok(entries) = fs::read_dir(src) else {
        return;
    };
    for entry in entries.flatten() {
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let Ok(metadata) = fs::metadata(&from) else {
            continue;
        };
        if metadata.is_dir() {
            if fs::create_dir_all(&to).is_ok() {
                copy_tree_contents(&from, &to);
            }
        } else if let Err(e) = fs::copy(&from, &to) {
            debug!("tree copy {} failed: {e}", from.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn in_root_mirrors_absolute_paths() {
        let root = Path::new("/tmp/sandbox_root");
        assert_eq!(
            in_root(root, "/usr/bin/env"),
            PathBuf::from("/tmp/sandbox_root/usr/bin/env")
        );
        assert_eq!(in_root(root, "/"), PathBuf::from("/tmp/sandbox_root"));
    }

    #[test]
    fn ensure_file_creates_parents_and_keeps_contents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("etc/resolv.conf");

        ensure_file(&target).unwrap();
        assert!(target.is_file());

        // bind targets must not be truncated when they already exist
        fs::write(&target, b"nameserver 8.8.8.8\n").unwrap();
        ensure_file(&target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"nameserver 8.8.8.8\n");
    }

    #[test]
    fn copy_mirrored_rejects_relative_paths() {
        let dir = TempDir::new().unwrap();
        assert!(copy_mirrored(dir.path(), Path::new("relative/file")).is_err());
    }

    #[test]
    fn tree_copy_dereferences_symlinks() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("real"), b"contents").unwrap();
        std::os::unix::fs::symlink(src.path().join("real"), src.path().join("alias")).unwrap();

        copy_tree_contents(src.path(), dst.path());

        // the alias lands as a regular file with the pointee's bytes
        let alias = dst.path().join("alias");
        assert!(alias.is_file());
        assert!(!fs::symlink_metadata(&alias).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&alias).unwrap(), b"contents");
    }
}
