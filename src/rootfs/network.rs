//! Build plan for networked sandboxes (`network=true`): the host's toolchain
//! is bind-mounted into the tmpfs instead of copied, which keeps apt/dpkg,
//! sudo and TLS working inside. Requires the privileged launch path.

use super::Ingredient;

/// Host directories bind-mounted whole. `/sys` is handled separately (it
/// must be the first mount, recursively, or tools reading the CPU table
/// inside the sandbox fail).
pub const BIND_DIRS: &[&str] = &[
    "/bin",
    "/usr/bin",
    "/usr/sbin",
    "/lib",
    "/lib64",
    "/usr/lib",
    "/usr/libexec",
    "/usr/lib/sudo",
    "/usr/libexec/sudo",
    "/sbin",
];

/// Single files bound so the host can update them underneath.
pub const BIND_FILES: &[&str] = &[
    "/etc/resolv.conf",
    "/etc/ld.so.cache",
    "/etc/ld.so.conf",
    "/etc/sudoers",
    "/etc/nsswitch.conf",
    "/etc/login.defs",
    "/etc/passwd",
    "/etc/group",
    "/etc/shadow",
    "/etc/hostname",
    "/etc/hosts",
];

/// Configuration trees for the linker, PAM, TLS and the terminal.
pub const CONFIG_BIND_DIRS: &[&str] = &[
    "/etc/ld.so.conf.d",
    "/etc/pam.d",
    "/etc/security",
    "/etc/ssl",
    "/etc/ca-certificates",
    "/usr/share/ca-certificates",
    "/usr/share/terminfo",
    "/lib/terminfo",
    "/usr/share/vim",
    "/etc/vim",
    "/etc/alternatives",
    "/usr/share/locale",
    "/run",
];

/// Everything apt and dpkg need: config, state, caches, templates, logs.
pub const PACKAGING_BIND_DIRS: &[&str] = &[
    "/etc/apt",
    "/var/lib/apt",
    "/var/cache/apt",
    "/var/lib/dpkg",
    "/var/cache/debconf",
    "/usr/share/debconf",
    "/usr/share/dpkg",
    "/var/log/apt",
    "/usr/share/perl",
    "/usr/share/perl5",
];

/// Base device nodes; `full` is needed by dpkg's disk probing.
pub const DEVICE_NODES: &[(&str, u64, u64, u32)] = &[
    ("/dev/null", 1, 3, 0o666),
    ("/dev/zero", 1, 5, 0o666),
    ("/dev/random", 1, 8, 0o666),
    ("/dev/urandom", 1, 9, 0o666),
    ("/dev/tty", 5, 0, 0o666),
    ("/dev/full", 1, 7, 0o666),
];

pub const ENVIRONMENT: &str = "DEBIAN_FRONTEND=noninteractive\n\
DEBCONF_NONINTERACTIVE_SEEN=true\n\
PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin\n";

pub fn plan() -> Vec<Ingredient> {
    let mut plan = Vec::new();

    // /sys first: a recursive bind of the host view
    plan.push(Ingredient::RbindDir { host: "/sys" });

    for &host in BIND_DIRS {
        plan.push(Ingredient::BindDir { host });
    }
    for &host in BIND_FILES {
        plan.push(Ingredient::BindFile { host });
    }
    for &host in CONFIG_BIND_DIRS {
        plan.push(Ingredient::BindDir { host });
    }
    for &host in PACKAGING_BIND_DIRS {
        plan.push(Ingredient::BindDir { host });
    }
    plan.push(Ingredient::BindFile {
        host: "/var/log/dpkg.log",
    });

    // sudo keeps per-user state under /var; private, not shared with host
    plan.push(Ingredient::Dir {
        path: "/var/run/sudo",
        mode: 0o700,
    });
    plan.push(Ingredient::Dir {
        path: "/var/lib/sudo",
        mode: 0o700,
    });

    plan.push(Ingredient::Dir {
        path: "/dev",
        mode: 0o755,
    });
    for &(path, major, minor, mode) in DEVICE_NODES {
        plan.push(Ingredient::ChrDev {
            path,
            major,
            minor,
            mode,
        });
    }
    plan.push(Ingredient::Devpts);
    plan.push(Ingredient::Symlink {
        target: "pts/ptmx",
        link: "/dev/ptmx",
    });

    plan.push(Ingredient::Dir {
        path: "/tmp",
        mode: 0o1777,
    });
    plan.push(Ingredient::Seed {
        path: "/etc/environment",
        contents: ENVIRONMENT,
    });

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rootfs::Ingredient;

    #[test]
    fn sys_is_the_first_mount_and_recursive() {
        let plan = plan();
        assert!(matches!(plan[0], Ingredient::RbindDir { host: "/sys" }));
        assert_eq!(
            plan.iter()
                .filter(|i| matches!(i, Ingredient::RbindDir { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn binds_cover_toolchain_and_packaging() {
        let plan = plan();
        let dirs: Vec<&str> = plan
            .iter()
            .filter_map(|i| match i {
                Ingredient::BindDir { host } => Some(*host),
                _ => None,
            })
            .collect();
        for host in ["/bin", "/usr/lib", "/etc/apt", "/var/lib/dpkg", "/run"] {
            assert!(dirs.contains(&host), "missing bind for {host}");
        }
    }

    #[test]
    fn device_nodes_and_devpts_present() {
        let plan = plan();
        let nodes = plan
            .iter()
            .filter(|i| matches!(i, Ingredient::ChrDev { .. }))
            .count();
        assert_eq!(nodes, DEVICE_NODES.len());
        assert!(plan.iter().any(|i| matches!(i, Ingredient::Devpts)));
        assert!(plan.iter().any(|i| matches!(
            i,
            Ingredient::Symlink {
                target: "pts/ptmx",
                link: "/dev/ptmx"
            }
        )));
    }

    #[test]
    fn environment_seed_is_noninteractive() {
        assert!(ENVIRONMENT.contains("DEBIAN_FRONTEND=noninteractive"));
        assert!(ENVIRONMENT.contains("PATH="));
    }

    #[test]
    fn tmp_is_sticky() {
        let plan = plan();
        assert!(plan.iter().any(|i| matches!(
            i,
            Ingredient::Dir {
                path: "/tmp",
                mode: 0o1777
            }
        )));
    }
}
