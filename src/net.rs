//! Host-side network plumbing for networked sandboxes. Privileged, and the
//! one place where shelling out is the natural interface.
//!
//! None of these mutations are idempotent or reverted: repeated launches add
//! duplicate firewall rules, and `delete` leaves everything in place.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use nix::unistd::Uid;
use tracing::{info, warn};

use crate::utils::errors::{SandboxError, SandboxResult};

/// The three NAT/FORWARD rules, as iptables argument vectors.
pub const NAT_RULES: [&[&str]; 3] = [
    &[
        "--table", "nat", "-A", "POSTROUTING", "-o", "eth0", "-j", "MASQUERADE",
    ],
    &[
        "-A",
        "FORWARD",
        "-i",
        "eth0",
        "-o",
        "eth0",
        "-m",
        "state",
        "--state",
        "RELATED,ESTABLISHED",
        "-j",
        "ACCEPT",
    ],
    &["-A", "FORWARD", "-i", "eth0", "-o", "eth0", "-j", "ACCEPT"],
];

pub const IP_FORWARD_SYSCTL: &str = "net.ipv4.ip_forward=1";

/// Packages installed on the host so the bound toolchain is complete.
pub const HOST_PACKAGES: &[&str] = &[
    "iptables",
    "net-tools",
    "dnsutils",
    "sudo",
    "iproute2",
    "curl",
    "wget",
];

const RESOLV_CONF: &str = "/etc/resolv.conf";

#[derive(Debug, Default)]
pub struct NetworkPlumber;

impl NetworkPlumber {
    pub fn new() -> Self {
        Self
    }

    /// iptables and sysctl writes need an effective UID of 0.
    pub fn require_root(&self) -> SandboxResult<()> {
        if Uid::effective().is_root() {
            Ok(())
        } else {
            Err(SandboxError::Privilege("networked sandboxes (iptables/sysctl)"))
        }
    }

    /// Everything the host needs before a networked launch. Individual steps
    /// are best-effort; the preceding root check is the only gate.
    pub fn prepare(&self) {
        self.ensure_dns();
        self.enable_ip_forward();
        self.install_nat_rules();
        self.install_host_packages();
    }

    /// Seed a default resolver when the host has none configured.
    pub fn ensure_dns(&self) {
        if resolv_conf_present(Path::new(RESOLV_CONF)) {
            return;
        }
        match fs::write(RESOLV_CONF, "nameserver 8.8.8.8\n") {
            Ok(()) => info!("wrote default DNS to {RESOLV_CONF}"),
            Err(e) => warn!("could not write {RESOLV_CONF}: {e}"),
        }
    }

    pub fn enable_ip_forward(&self) {
        if !self.run_quiet("sysctl", &["-w", IP_FORWARD_SYSCTL]) {
            warn!("failed to enable ip_forward");
        } else {
            info!("enabled ip_forward");
        }
    }

    pub fn install_nat_rules(&self) {
        if which::which("iptables").is_err() {
            warn!("iptables not found; NAT rules not installed");
            return;
        }
        for rule in NAT_RULES {
            if !self.run("iptables", rule) {
                warn!("failed to apply NAT rule: iptables {}", rule.join(" "));
            }
        }
    }

    /// Best-effort apt install of the tools the bound rootfs expects.
    pub fn install_host_packages(&self) {
        if which::which("apt-get").is_err() {
            warn!("apt-get not found; skipping host package install");
            return;
        }
        let updated = self.run("apt-get", &["update"]);
        let installed = updated && {
            let mut args = vec!["install", "-y"];
            args.extend_from_slice(HOST_PACKAGES);
            self.run("apt-get", &args)
        };
        if installed {
            info!("host package install succeeded");
        } else {
            warn!("host package install failed");
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> bool {
        Command::new(program)
            .args(args)
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run_quiet(&self, program: &str, args: &[&str]) -> bool {
        Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// True when the path exists and is non-empty.
pub fn resolv_conf_present(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
