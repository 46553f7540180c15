//! Shared-library dependency tracing.
//!
//! Copying a binary into the sandbox is useless without the libraries it is
//! linked against, so the builder asks a tracer which shared objects a
//! binary references and mirrors them too. Two implementations exist: one
//! queries the platform dynamic linker through `ldd`, one parses DT_NEEDED
//! entries out of the ELF dynamic section and resolves them against the
//! linker search path. [`host_tracer`] picks whichever the host supports.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;

use elf::endian::AnyEndian;
use elf::ElfStream;
use tracing::debug;

pub trait DependencyTracer {
    /// Absolute paths of the shared objects `binary` references. Empty on
    /// any failure; the builder is best-effort either way.
    fn trace(&self, binary: &Path) -> Vec<PathBuf>;
}

/// The best tracer this host supports: `ldd` when present (it answers with
/// the linker's own resolution), otherwise direct ELF parsing.
pub fn host_tracer() -> Box<dyn DependencyTracer> {
    if which::which("ldd").is_ok() {
        Box::new(LddTracer::new())
    } else {
        debug!("ldd not found, tracing dependencies from ELF headers");
        Box::new(ElfTracer::new())
    }
}

#[derive(Debug, Default)]
pub struct LddTracer;

impl LddTracer {
    pub fn new() -> Self {
        Self
    }
}

impl DependencyTracer for LddTracer {
    fn trace(&self, binary: &Path) -> Vec<PathBuf> {
        let Ok(ldd) = which::which("ldd") else {
            return Vec::new();
        };
        let Ok(output) = Command::new(ldd).arg(binary).output() else {
            return Vec::new();
        };
        if !output.status.success() {
            return Vec::new();
        }
        parse_ldd_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Every absolute path mentioned in `ldd` output, deduplicated in order.
/// Covers both the `libc.so.6 => /lib/... (0x...)` and the bare
/// `/lib64/ld-linux-x86-64.so.2 (0x...)` line shapes.
pub fn parse_ldd_output(output: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for token in output.split_whitespace() {
        if !token.starts_with('/') {
            continue;
        }
        let path = PathBuf::from(token);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Directories the dynamic linker searches, in order: whatever
/// `/etc/ld.so.conf.d` names, then the classic defaults.
fn linker_search_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut push = |p: PathBuf| {
        if !paths.contains(&p) {
            paths.push(p);
        }
    };

    if let Ok(entries) = fs::read_dir("/etc/ld.so.conf.d") {
        for entry in entries.flatten() {
            let Ok(contents) = fs::read_to_string(entry.path()) else {
                continue;
            };
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('/') {
                    push(PathBuf::from(line));
                }
            }
        }
    }

    for dir in [
        "/lib/x86_64-linux-gnu",
        "/usr/lib/x86_64-linux-gnu",
        "/lib64",
        "/lib",
        "/usr/lib",
    ] {
        push(PathBuf::from(dir));
    }
    paths
}

/// Dependency tracer that reads DT_NEEDED entries straight from the ELF
/// dynamic section and walks them transitively. It does not report the
/// program interpreter; the build plans copy the loader explicitly.
#[derive(Debug)]
pub struct ElfTracer {
    search_paths: Vec<PathBuf>,
}

impl ElfTracer {
    pub fn new() -> Self {
        Self {
            search_paths: linker_search_paths(),
        }
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// DT_NEEDED sonames of one object, unresolved.
    fn needed(&self, object: &Path) -> Vec<String> {
        match read_needed(object) {
            Ok(needed) => needed,
            Err(e) => {
                debug!("no ELF dependencies for {}: {e}", object.display());
                Vec::new()
            }
        }
    }

    fn resolve(&self, soname: &str) -> Option<PathBuf> {
        // an soname with a slash is already a path
        if soname.contains('/') {
            let path = PathBuf::from(soname);
            return path.is_file().then_some(path);
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(soname))
            .find(|candidate| candidate.is_file())
    }
}

impl DependencyTracer for ElfTracer {
    fn trace(&self, binary: &Path) -> Vec<PathBuf> {
        let mut resolved: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: Vec<String> = self.needed(binary);

        while let Some(soname) = queue.pop() {
            if !seen.insert(soname.clone()) {
                continue;
            }
            let Some(path) = self.resolve(&soname) else {
                debug!("unresolved shared object {soname}");
                continue;
            };
            // transitive closure: libraries have dependencies too
            queue.extend(self.needed(&path));
            if !resolved.contains(&path) {
                resolved.push(path);
            }
        }
        resolved
    }
}

fn read_needed(object: &Path) -> Result<Vec<String>, elf::ParseError> {
    let file = File::open(object)?;
    let mut elf = ElfStream::<AnyEndian, _>::open_stream(file)?;

    let Some(dynamic) = elf.dynamic()? else {
        return Ok(Vec::new());
    };
    let offsets: Vec<usize> = dynamic
        .iter()
        .filter(|d| d.d_tag == elf::abi::DT_NEEDED)
        .map(|d| d.d_val() as usize)
        .collect();
    if offsets.is_empty() {
        return Ok(Vec::new());
    }

    let Some(shdr) = elf.section_header_by_name(".dynstr")? else {
        return Ok(Vec::new());
    };
    let shdr = *shdr;
    let strtab = elf.section_data_as_strtab(&shdr)?;

    let mut needed = Vec::new();
    for offset in offsets {
        if let Ok(name) = strtab.get(offset) {
            needed.push(name.to_string());
        }
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    const LDD_OUTPUT: &str = "\
\tlinux-vdso.so.1 (0x00007ffd2a5f2000)
\tlibtinfo.so.6 => /lib/x86_64-linux-gnu/libtinfo.so.6 (0x00007f2a8e000000)
\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f2a8dc00000)
\t/lib64/ld-linux-x86-64.so.2 (0x00007f2a8e1c9000)
";

    #[test]
    fn extracts_resolved_and_loader_paths() {
        let paths = parse_ldd_output(LDD_OUTPUT);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/lib/x86_64-linux-gnu/libtinfo.so.6"),
                PathBuf::from("/lib/x86_64-linux-gnu/libc.so.6"),
                PathBuf::from("/lib64/ld-linux-x86-64.so.2"),
            ]
        );
    }

    #[test]
    fn ignores_unresolved_and_vdso_entries() {
        let paths = parse_ldd_output("\tlinux-vdso.so.1 (0x1)\n\tlibmissing.so => not found\n");
        assert!(paths.is_empty());
    }

    #[test]
    fn deduplicates_repeated_libraries() {
        let output = "\ta => /lib/libc.so.6 (0x1)\n\tb => /lib/libc.so.6 (0x2)\n";
        assert_eq!(parse_ldd_output(output), vec![PathBuf::from("/lib/libc.so.6")]);
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(parse_ldd_output("").is_empty());
    }

    #[test]
    fn resolve_walks_the_search_path_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("libdemo.so.1"), b"so").unwrap();

        let tracer = ElfTracer::with_search_paths(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(
            tracer.resolve("libdemo.so.1"),
            Some(second.path().join("libdemo.so.1"))
        );
        assert_eq!(tracer.resolve("libabsent.so"), None);
    }

    #[test]
    fn resolve_accepts_full_paths() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("libhere.so");
        fs::write(&lib, b"so").unwrap();

        let tracer = ElfTracer::with_search_paths(vec![]);
        assert_eq!(
            tracer.resolve(lib.to_str().unwrap()),
            Some(lib.clone())
        );
    }

    #[test]
    fn non_elf_input_yields_no_dependencies() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("notelf");
        fs::write(&text, b"just text").unwrap();

        let tracer = ElfTracer::with_search_paths(vec![]);
        assert!(tracer.trace(&text).is_empty());
    }

    #[test]
    fn tracing_our_own_executable_reports_absolute_paths() {
        // a dynamically linked test binary reports its libraries; a static
        // one reports none. Either way every path must be absolute.
        let exe = env::current_exe().unwrap();
        let tracer = ElfTracer::new();
        for path in tracer.trace(&exe) {
            assert!(path.is_absolute());
            assert!(path.is_file());
        }
    }

    #[test]
    fn host_tracer_always_picks_something() {
        let _ = host_tracer();
    }
}
