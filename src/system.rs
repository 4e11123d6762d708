//! Host metrics collection from the /proc filesystem.
//!
//! This module provides functions to read CPU identity and tick counters,
//! boot time, memory and page-fault counters from /proc, plus the kernel
//! version and hostname reported by the host's own tools.
//!
//! Every reader is pure with respect to the invocation record: values are
//! returned, never written. A source that does not exist yields `Ok(None)`
//! or empty values because production sandboxes commonly restrict some of
//! them; only content that exists but cannot be parsed is an error.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::SourceError;

/// Sentinel returned in place of command output when a command fails.
pub const COMMAND_ERROR: &str = "ERROR";

static CPU_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^model name\s*:(.*)$").expect("valid cpu type regex"));
static CPU_MODEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^model\s*:(.*)$").expect("valid cpu model regex"));
static CPU_ARM_MODEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Model\s*:(.*)$").expect("valid arm model regex"));
static CPU_CORES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^cpu cores\s*:(.*)$").expect("valid cpu cores regex"));

/// Locations of the OS sources read by the inspector.
#[derive(Debug, Clone)]
pub struct HostSources {
    /// Root of the proc filesystem (`/proc` on a real host).
    pub proc_root: PathBuf,
    /// cgroup descriptor read to identify the Lambda sandbox VM.
    pub cgroup_path: PathBuf,
    /// Hypervisor UUID file read on IBM Cloud Functions hosts.
    pub hypervisor_uuid_path: PathBuf,
}

impl Default for HostSources {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            cgroup_path: PathBuf::from("/proc/self/cgroup"),
            hypervisor_uuid_path: PathBuf::from("/sys/hypervisor/uuid"),
        }
    }
}

/// CPU identity as reported by /proc/cpuinfo. Fields are empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuIdentity {
    pub cpu_type: String,
    pub model: String,
    pub core_count: String,
    /// `x86` when entries carry a `model name`, `arm64` otherwise.
    pub architecture: String,
}

/// Aggregate CPU tick counters and context switches from /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub user: u64,
    pub nice: u64,
    pub kernel: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub context_switches: u64,
}

impl CpuSnapshot {
    /// Counter values in attribute order: the eight tick fields, then context switches.
    pub fn values(&self) -> [u64; 9] {
        [
            self.user,
            self.nice,
            self.kernel,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.context_switches,
        ]
    }
}

/// Total and free memory from /proc/meminfo, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub free_kb: u64,
}

/// Page fault counters from /proc/vmstat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub page_faults: u64,
    pub major_page_faults: u64,
}

impl MemorySnapshot {
    pub fn values(&self) -> [u64; 2] {
        [self.page_faults, self.major_page_faults]
    }
}

/// Kernel version and hostname; either may be [`COMMAND_ERROR`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    pub version: String,
    pub hostname: String,
}

impl HostSources {
    /// Sources rooted at `proc_root`, with the cgroup descriptor beneath it.
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        let proc_root = proc_root.into();
        Self {
            cgroup_path: proc_root.join("self").join("cgroup"),
            proc_root,
            ..Self::default()
        }
    }

    fn proc_file(&self, name: &str) -> PathBuf {
        self.proc_root.join(name)
    }

    /// Reads CPU type, model, core count and architecture from cpuinfo. Never fails.
    pub fn read_cpu_identity(&self) -> CpuIdentity {
        let path = self.proc_file("cpuinfo");
        match read_optional(&path) {
            Ok(Some(content)) => parse_cpuinfo(&content),
            Ok(None) => CpuIdentity::default(),
            Err(e) => {
                debug!("{}", e);
                CpuIdentity::default()
            }
        }
    }

    /// Reads the aggregate CPU tick counters and context switches from stat.
    pub fn read_cpu_counters(&self) -> Result<Option<CpuSnapshot>, SourceError> {
        let path = self.proc_file("stat");
        read_optional(&path)?
            .map(|content| parse_cpu_counters(&content, &path))
            .transpose()
    }

    /// Reads the boot time (seconds since epoch) from stat.
    pub fn read_boot_time(&self) -> Result<Option<u64>, SourceError> {
        let path = self.proc_file("stat");
        match read_optional(&path)? {
            Some(content) => parse_boot_time(&content, &path),
            None => Ok(None),
        }
    }

    /// Reads total and free memory from meminfo.
    pub fn read_memory_counters(&self) -> Result<Option<MemoryInfo>, SourceError> {
        let path = self.proc_file("meminfo");
        read_optional(&path)?
            .map(|content| parse_meminfo(&content, &path))
            .transpose()
    }

    /// Reads minor and major page fault counters from vmstat.
    pub fn read_page_faults(&self) -> Result<Option<MemorySnapshot>, SourceError> {
        let path = self.proc_file("vmstat");
        read_optional(&path)?
            .map(|content| parse_vmstat(&content, &path))
            .transpose()
    }

    /// Queries the kernel version (`uname -a`) and hostname.
    pub fn read_kernel_info(&self) -> KernelInfo {
        KernelInfo {
            version: run_command("uname", &["-a"]).trim().to_string(),
            hostname: run_command("hostname", &[]).trim().to_string(),
        }
    }

    /// Returns the cgroup descriptor text, or [`COMMAND_ERROR`].
    pub fn read_cgroup_descriptor(&self) -> String {
        let path = self.cgroup_path.to_string_lossy();
        run_command("cat", &[path.as_ref()])
    }

    /// Reads the hypervisor UUID if the host exposes one.
    pub fn read_hypervisor_uuid(&self) -> Option<String> {
        let content = fs::read_to_string(&self.hypervisor_uuid_path).ok()?;
        let uuid = content.trim();
        (!uuid.is_empty()).then(|| uuid.to_string())
    }
}

/// Reads a whole source file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>, SourceError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Source {} not present", path.display());
            Ok(None)
        }
        Err(e) => Err(SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn first_capture(re: &Regex, content: &str) -> String {
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn last_capture(re: &Regex, content: &str) -> String {
    re.captures_iter(content)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Parses CPU identity from cpuinfo content. The first processor entry wins.
///
/// ARM kernels print no `model name`; there the model comes from the `Model`
/// line of the trailing hardware block and the architecture reads `arm64`.
/// Without a `cpu cores` line the core count is the number of processor entries.
pub fn parse_cpuinfo(content: &str) -> CpuIdentity {
    let processors = content
        .lines()
        .filter(|line| line.split(':').next().map(str::trim) == Some("processor"))
        .count();

    let cpu_type = first_capture(&CPU_TYPE_RE, content);
    let (model, architecture) = if !cpu_type.is_empty() {
        (first_capture(&CPU_MODEL_RE, content), "x86")
    } else if processors > 0 {
        (last_capture(&CPU_ARM_MODEL_RE, content), "arm64")
    } else {
        (String::new(), "")
    };

    let mut core_count = first_capture(&CPU_CORES_RE, content);
    if core_count.is_empty() && processors > 0 {
        core_count = processors.to_string();
    }

    CpuIdentity {
        cpu_type,
        model,
        core_count,
        architecture: architecture.to_string(),
    }
}

fn parse_counter(value: &str, field: &str, path: &Path) -> Result<u64, SourceError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| SourceError::malformed(path, format!("Failed to parse {}: {}", field, e)))
}

/// Parses the aggregate `cpu` line and the `ctxt` line of /proc/stat.
///
/// Format: "cpu  user nice system idle iowait irq softirq steal guest guest_nice".
/// Kernels older than 2.6.11 have no steal column; it reads as 0 there.
pub fn parse_cpu_counters(content: &str, path: &Path) -> Result<CpuSnapshot, SourceError> {
    let mut lines = content.lines();
    let first = lines
        .next()
        .ok_or_else(|| SourceError::malformed(path, "empty file"))?;

    let parts: Vec<&str> = first.split_whitespace().collect();
    if parts.first() != Some(&"cpu") {
        return Err(SourceError::malformed(
            path,
            format!("expected aggregate cpu line, got '{}'", first),
        ));
    }
    if parts.len() < 8 {
        return Err(SourceError::malformed(
            path,
            format!("expected at least 7 cpu fields, got {}", parts.len() - 1),
        ));
    }

    let user = parse_counter(parts[1], "user", path)?;
    let nice = parse_counter(parts[2], "nice", path)?;
    let kernel = parse_counter(parts[3], "system", path)?;
    let idle = parse_counter(parts[4], "idle", path)?;
    let iowait = parse_counter(parts[5], "iowait", path)?;
    let irq = parse_counter(parts[6], "irq", path)?;
    let softirq = parse_counter(parts[7], "softirq", path)?;
    let steal = match parts.get(8) {
        Some(v) => parse_counter(v, "steal", path)?,
        None => 0,
    };

    let mut context_switches = None;
    for line in lines {
        if let Some(value) = line.strip_prefix("ctxt ") {
            context_switches = Some(parse_counter(value, "ctxt", path)?);
            break;
        }
    }
    let context_switches =
        context_switches.ok_or_else(|| SourceError::malformed(path, "no ctxt line"))?;

    Ok(CpuSnapshot {
        user,
        nice,
        kernel,
        idle,
        iowait,
        irq,
        softirq,
        steal,
        context_switches,
    })
}

/// Extracts the `btime` value from /proc/stat content, if present.
pub fn parse_boot_time(content: &str, path: &Path) -> Result<Option<u64>, SourceError> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .map(|value| parse_counter(value, "btime", path))
        .transpose()
}

/// Parses a "Label:   1234 kB" value.
fn parse_kb_field(content: &str, label: &str, path: &Path) -> Result<u64, SourceError> {
    let line = content
        .lines()
        .find_map(|l| l.strip_prefix(label))
        .ok_or_else(|| SourceError::malformed(path, format!("no {} line", label)))?;
    let value = line
        .split_whitespace()
        .next()
        .ok_or_else(|| SourceError::malformed(path, format!("empty {} line", label)))?;
    parse_counter(value, label, path)
}

/// Parses MemTotal and MemFree from /proc/meminfo content.
pub fn parse_meminfo(content: &str, path: &Path) -> Result<MemoryInfo, SourceError> {
    Ok(MemoryInfo {
        total_kb: parse_kb_field(content, "MemTotal:", path)?,
        free_kb: parse_kb_field(content, "MemFree:", path)?,
    })
}

/// Parses pgfault and pgmajfault from /proc/vmstat content.
pub fn parse_vmstat(content: &str, path: &Path) -> Result<MemorySnapshot, SourceError> {
    let mut page_faults = None;
    let mut major_page_faults = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("pgfault"), Some(v)) => page_faults = Some(parse_counter(v, "pgfault", path)?),
            (Some("pgmajfault"), Some(v)) => {
                major_page_faults = Some(parse_counter(v, "pgmajfault", path)?)
            }
            _ => {}
        }

        if page_faults.is_some() && major_page_faults.is_some() {
            break;
        }
    }

    match (page_faults, major_page_faults) {
        (Some(page_faults), Some(major_page_faults)) => Ok(MemorySnapshot {
            page_faults,
            major_page_faults,
        }),
        _ => Err(SourceError::malformed(
            path,
            "missing pgfault or pgmajfault counter",
        )),
    }
}

/// Runs a command and returns its captured stdout.
///
/// Spawn failures and non-zero exit statuses both yield [`COMMAND_ERROR`];
/// partial output is never returned.
pub fn run_command(program: &str, args: &[&str]) -> String {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).into_owned()
        }
        Ok(output) => {
            debug!("{} {:?} exited with {}", program, args, output.status);
            COMMAND_ERROR.to_string()
        }
        Err(e) => {
            debug!("Failed to run {} {:?}: {}", program, args, e);
            COMMAND_ERROR.to_string()
        }
    }
}
