//! Build plan for isolated sandboxes (`network=false`): everything the shell
//! needs is copied into the private tmpfs, nothing from the host is shared.
//!
//! The source lists carry Debian/Ubuntu x86_64 spellings; on other hosts the
//! best-effort interpreter simply skips what it cannot find and the traced
//! utility copies pick up whatever the local linker reports.

use super::Ingredient;

pub const SKELETON_DIRS: &[&str] = &[
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/lib",
    "/lib64",
    "/lib/x86_64-linux-gnu",
    "/usr/lib",
    "/usr/lib/x86_64-linux-gnu",
    "/etc",
    "/tmp",
    "/var",
    "/var/tmp",
    "/proc",
    "/sys",
    "/dev",
];

/// Dynamic loader spellings; usually exactly one exists.
pub const LOADER_CANDIDATES: &[&str] = &[
    "/lib64/ld-linux-x86-64.so.2",
    "/lib/ld-linux.so.2",
    "/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2",
    "/lib/ld-linux-x86-64.so.2",
];

/// Curated runtime libraries: C runtime, name resolution, terminal handling
/// and the transitive needs of coreutils (selinux, pcre, cap/attr/acl).
pub const CORE_LIBS: &[&str] = &[
    "/lib/x86_64-linux-gnu/libc.so.6",
    "/lib/x86_64-linux-gnu/libm.so.6",
    "/lib/x86_64-linux-gnu/libpthread.so.0",
    "/lib/x86_64-linux-gnu/libdl.so.2",
    "/lib/x86_64-linux-gnu/librt.so.1",
    "/lib/x86_64-linux-gnu/libresolv.so.2",
    "/lib/x86_64-linux-gnu/libnss_files.so.2",
    "/lib/x86_64-linux-gnu/libnss_dns.so.2",
    "/lib/x86_64-linux-gnu/libtinfo.so.6",
    "/lib/x86_64-linux-gnu/libncurses.so.6",
    "/lib/x86_64-linux-gnu/libncursesw.so.6",
    "/usr/lib/x86_64-linux-gnu/libtinfo.so.6",
    "/usr/lib/x86_64-linux-gnu/libncurses.so.6",
    "/usr/lib/x86_64-linux-gnu/libncursesw.so.6",
    "/lib/x86_64-linux-gnu/libselinux.so.1",
    "/usr/lib/x86_64-linux-gnu/libselinux.so.1",
    "/lib/x86_64-linux-gnu/libpcre.so.3",
    "/lib/x86_64-linux-gnu/libpcre2-8.so.0",
    "/usr/lib/x86_64-linux-gnu/libpcre.so.3",
    "/usr/lib/x86_64-linux-gnu/libpcre2-8.so.0",
    "/lib/x86_64-linux-gnu/libcap.so.2",
    "/lib/x86_64-linux-gnu/libattr.so.1",
    "/lib/x86_64-linux-gnu/libacl.so.1",
    "/lib/x86_64-linux-gnu/libgcc_s.so.1",
    "/lib64/libc.so.6",
    "/lib64/libm.so.6",
    "/lib64/libpthread.so.0",
    "/lib64/libdl.so.2",
    "/lib64/libtinfo.so.6",
    "/lib64/libselinux.so.1",
    "/lib64/libpcre.so.3",
    "/lib64/libpcre2-8.so.0",
];

/// Shells copied with their traced dependencies.
pub const SHELL_SOURCES: &[&str] = &[
    "/bin/busybox",
    "/bin/sh",
    "/bin/bash",
    "/bin/dash",
    "/bin/zsh",
    "/usr/bin/sh",
    "/usr/bin/bash",
    "/usr/bin/dash",
    "/usr/bin/zsh",
];

/// Utilities copied with their traced dependencies: file tools, terminal
/// control, editors, text processing, user and process tools.
pub const UTILITIES: &[&str] = &[
    "/bin/ls",
    "/bin/cat",
    "/bin/echo",
    "/bin/pwd",
    "/bin/mkdir",
    "/bin/rm",
    "/bin/cp",
    "/bin/mv",
    "/bin/touch",
    "/bin/chmod",
    "/bin/chown",
    "/bin/ln",
    "/bin/readlink",
    "/bin/date",
    "/bin/sleep",
    "/bin/dd",
    "/bin/df",
    "/bin/du",
    "/bin/uname",
    "/bin/hostname",
    "/usr/bin/clear",
    "/usr/bin/reset",
    "/usr/bin/tput",
    "/usr/bin/tset",
    "/bin/stty",
    "/usr/bin/nano",
    "/bin/nano",
    "/usr/bin/vim",
    "/usr/bin/vi",
    "/bin/vi",
    "/usr/bin/vim.basic",
    "/usr/bin/vim.tiny",
    "/usr/bin/less",
    "/usr/bin/more",
    "/bin/more",
    "/usr/bin/editor",
    "/usr/bin/grep",
    "/bin/grep",
    "/usr/bin/egrep",
    "/usr/bin/fgrep",
    "/usr/bin/sed",
    "/bin/sed",
    "/usr/bin/head",
    "/usr/bin/tail",
    "/usr/bin/wc",
    "/usr/bin/sort",
    "/usr/bin/cut",
    "/usr/bin/tr",
    "/usr/bin/awk",
    "/usr/bin/gawk",
    "/usr/bin/xargs",
    "/usr/bin/find",
    "/bin/find",
    "/usr/bin/file",
    "/usr/bin/stat",
    "/usr/bin/env",
    "/usr/bin/id",
    "/usr/bin/whoami",
    "/usr/bin/groups",
    "/usr/bin/which",
    "/usr/bin/dirname",
    "/usr/bin/basename",
    "/usr/bin/realpath",
    "/usr/bin/readlink",
    "/bin/ps",
    "/usr/bin/ps",
    "/bin/kill",
    "/usr/bin/kill",
    "/usr/bin/pgrep",
    "/usr/bin/pkill",
];

/// Terminfo databases, merged into the one location `/etc/profile` exports.
pub const TERMINFO_SOURCES: &[&str] = &["/usr/share/terminfo", "/lib/terminfo", "/etc/terminfo"];

pub const PROFILE: &str = "export TERM=${TERM:-xterm}\n\
export TERMINFO=/usr/share/terminfo\n\
export PATH=/bin:/usr/bin:/sbin:/usr/sbin\n\
export VIMRUNTIME=/usr/share/vim/vim*\n";

pub fn plan() -> Vec<Ingredient> {
    let mut plan = Vec::new();

    for &path in SKELETON_DIRS {
        plan.push(Ingredient::Dir { path, mode: 0o755 });
    }
    for &host in LOADER_CANDIDATES {
        plan.push(Ingredient::CopyFile { host });
    }
    for &host in CORE_LIBS {
        plan.push(Ingredient::CopyFile { host });
    }
    // lets the loader resolve libraries without running ldconfig inside
    plan.push(Ingredient::CopyFile {
        host: "/etc/ld.so.cache",
    });

    for &binary in SHELL_SOURCES {
        plan.push(Ingredient::CopyTraced { binary });
    }
    for &binary in UTILITIES {
        plan.push(Ingredient::CopyTraced { binary });
    }

    for &host in TERMINFO_SOURCES {
        plan.push(Ingredient::CopyTree {
            host,
            dest: "/usr/share/terminfo",
        });
    }
    plan.push(Ingredient::CopyTree {
        host: "/usr/share/vim",
        dest: "/usr/share/vim",
    });
    plan.push(Ingredient::CopyTree {
        host: "/etc/vim",
        dest: "/etc/vim",
    });

    plan.push(Ingredient::CopyFile { host: "/etc/passwd" });
    plan.push(Ingredient::CopyFile { host: "/etc/group" });
    plan.push(Ingredient::Seed {
        path: "/etc/profile",
        contents: PROFILE,
    });

    plan
}
