//! The per-invocation attribute store and snapshot/delta engine.
//!
//! An [`Inspector`] is created at function entry and owned by the handler
//! for the rest of the invocation. Each inspection category (CPU, memory,
//! container, platform, linux) may be snapshotted exactly once; the CPU and
//! memory categories can later be re-read to record after-minus-before deltas.
//!
//! No method returns an error or panics on bad input. Every failure is
//! logged and written to the record as a named error attribute, so the
//! instrumentation can never take the user's function down with it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use faas_inspector::{Inspector, Response};
//!
//! let mut inspector = Inspector::new();
//! inspector.inspect_all();
//!
//! inspector.add_attribute("message", "Hello Fred!");
//! inspector.consume_response(&Response::new("Hello from a response object!"));
//!
//! inspector.inspect_all_deltas();
//! let record = inspector.finish();
//! println!("{}", serde_json::to_string(&record).unwrap());
//! ```

use chrono::Utc;
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::attributes::{AttributeRecord, AttributeValue};
use crate::config::InspectorConfig;
use crate::container;
use crate::error::IdentityError;
use crate::platform::{self, Environment, Platform, PlatformIdentity};
use crate::recommend;
use crate::response::ReadableFields;
use crate::system::{CpuSnapshot, HostSources, MemorySnapshot};

/// Invocations served by this process; warm containers reuse the process.
static INVOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Epoch milliseconds at which the first inspector in this process was created.
static INITIALIZATION_TIME: Lazy<i64> = Lazy::new(now_epoch_ms);

/// Attribute names of the CPU counters, in [`CpuSnapshot::values`] order.
pub const CPU_COUNTER_KEYS: [&str; 9] = [
    "cpuUsr",
    "cpuNice",
    "cpuKrn",
    "cpuIdle",
    "cpuIowait",
    "cpuIrq",
    "cpuSoftIrq",
    "vmcpusteal",
    "contextSwitches",
];

/// Attribute names of the memory counters, in [`MemorySnapshot::values`] order.
pub const MEMORY_COUNTER_KEYS: [&str; 2] = ["pageFaults", "majorPageFaults"];

pub const CPU_DELTA_ERROR: &str = "CPUDeltaError";
pub const MEMORY_DELTA_ERROR: &str = "MemoryDeltaError";
pub const CONTAINER_IDENTITY_ERROR: &str = "ContainerIdentityError";
pub const CONSUME_RESPONSE_ERROR: &str = "ConsumeResponseError";
pub const RECOMMEND_CONFIGURATION_ERROR: &str = "RecommendConfigurationError";

/// Snapshot categories. Each moves from not-inspected to inspected once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Cpu,
    Memory,
    Container,
    Platform,
    Linux,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cpu,
        Category::Memory,
        Category::Container,
        Category::Platform,
        Category::Linux,
    ];

    fn bit(self) -> u8 {
        match self {
            Category::Cpu => 1 << 0,
            Category::Memory => 1 << 1,
            Category::Container => 1 << 2,
            Category::Platform => 1 << 3,
            Category::Linux => 1 << 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Cpu => "CPU",
            Category::Memory => "Memory",
            Category::Container => "Container",
            Category::Platform => "Platform",
            Category::Linux => "Linux",
        }
    }

    /// Attribute written when the category is re-inspected or its source is malformed.
    pub fn error_key(self) -> &'static str {
        match self {
            Category::Cpu => "CPUError",
            Category::Memory => "MemoryError",
            Category::Container => "ContainerError",
            Category::Platform => "PlatformError",
            Category::Linux => "LinuxError",
        }
    }
}

/// Set of categories already inspected in this invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InspectionState(u8);

impl InspectionState {
    pub fn is_inspected(&self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    /// Marks `category` inspected. Returns false if it already was.
    fn mark(&mut self, category: Category) -> bool {
        if self.is_inspected(category) {
            return false;
        }
        self.0 |= category.bit();
        true
    }

    pub fn all_inspected(&self) -> bool {
        Category::ALL.iter().all(|c| self.is_inspected(*c))
    }

    pub fn inspected(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(move |c| self.is_inspected(*c))
    }
}

/// Collects host and runtime attributes for one function invocation.
pub struct Inspector {
    record: AttributeRecord,
    state: InspectionState,
    start: Instant,
    start_epoch_ms: i64,
    sources: HostSources,
    container_id_path: PathBuf,
    env: Environment,
    cpu_snapshot: Option<CpuSnapshot>,
    memory_snapshot: Option<MemorySnapshot>,
    platform: Option<PlatformIdentity>,
    /// User plus kernel ticks between the CPU snapshot and the delta read.
    cpu_busy_delta: Option<i64>,
    user_runtime_ms: Option<i64>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    /// Starts an invocation with the default configuration and the process environment.
    pub fn new() -> Self {
        Self::with_config(&InspectorConfig::default())
    }

    /// Starts an invocation and stamps the bootstrap attributes.
    pub fn with_config(config: &InspectorConfig) -> Self {
        let initialization_time = *INITIALIZATION_TIME;
        let invocations = INVOCATIONS.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();
        let start_epoch_ms = now_epoch_ms();

        let mut record = AttributeRecord::new();
        record.insert("version", config.schema_version);
        record.insert("lang", config.lang.as_str());
        record.insert("startTime", start_epoch_ms);
        record.insert("invocations", invocations);
        record.insert("initializationTime", initialization_time);

        Self {
            record,
            state: InspectionState::default(),
            start,
            start_epoch_ms,
            sources: config.host_sources(),
            container_id_path: config.container_id_path.clone(),
            env: Environment::from_process(),
            cpu_snapshot: None,
            memory_snapshot: None,
            platform: None,
            cpu_busy_delta: None,
            user_runtime_ms: None,
        }
    }

    /// Replaces the environment used for platform detection.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn state(&self) -> InspectionState {
        self.state
    }

    pub fn record(&self) -> &AttributeRecord {
        &self.record
    }

    pub fn start_epoch_ms(&self) -> i64 {
        self.start_epoch_ms
    }

    fn record_error(&mut self, key: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", key, message);
        self.record.insert(key, message);
    }

    /// Guards a snapshot: returns false, and records the rejection, on a repeat call.
    fn begin(&mut self, category: Category) -> bool {
        if self.state.mark(category) {
            return true;
        }
        self.record_error(
            category.error_key(),
            format!("{} already inspected!", category.label()),
        );
        false
    }

    fn elapsed_ms(&self) -> i64 {
        millis(self.start.elapsed())
    }

    /// Records the container id, whether this invocation created it, and the
    /// host boot time (`uuid`, `newcontainer`, `vmuptime`).
    pub fn inspect_container(&mut self) {
        if !self.begin(Category::Container) {
            return;
        }

        match container::ensure(&self.container_id_path) {
            Ok(identity) => {
                self.record.insert("uuid", identity.uuid);
                self.record.insert("newcontainer", identity.is_new);
            }
            Err(e) => {
                let attempted_create = matches!(e, IdentityError::Write { .. });
                self.record.insert("uuid", "");
                self.record.insert("newcontainer", attempted_create);
                self.record_error(CONTAINER_IDENTITY_ERROR, e.to_string());
            }
        }

        match self.sources.read_boot_time() {
            Ok(Some(boot_time)) => {
                self.record.insert("vmuptime", boot_time);
            }
            Ok(None) => debug!("Boot time not available, skipping vmuptime"),
            Err(e) => self.record_error(Category::Container.error_key(), e.to_string()),
        }
    }

    /// Records the hosting platform and its provider-scoped fields.
    pub fn inspect_platform(&mut self) {
        if !self.begin(Category::Platform) {
            return;
        }

        let mut identity = platform::detect(&self.env);
        platform::resolve_vm_id(&mut identity, &self.sources);
        debug!("Detected platform: {}", identity.platform);

        self.record
            .insert("platform", identity.platform.display_name());
        for (key, value) in identity.fields() {
            self.record.insert(key, value);
        }
        self.platform = Some(identity);
    }

    /// Records the kernel version and hostname (`linuxVersion`, `hostname`).
    pub fn inspect_linux(&mut self) {
        if !self.begin(Category::Linux) {
            return;
        }

        let kernel = self.sources.read_kernel_info();
        self.record.insert("linuxVersion", kernel.version);
        self.record.insert("hostname", kernel.hostname);
    }

    /// Records total/free memory and snapshots the page fault counters.
    pub fn inspect_memory(&mut self) {
        if !self.begin(Category::Memory) {
            return;
        }

        let mut errors = Vec::new();

        match self.sources.read_memory_counters() {
            Ok(Some(info)) => {
                self.record.insert("totalMemory", info.total_kb);
                self.record.insert("freeMemory", info.free_kb);
            }
            Ok(None) => debug!("meminfo not available, skipping memory totals"),
            Err(e) => errors.push(e.to_string()),
        }

        match self.sources.read_page_faults() {
            Ok(Some(snapshot)) => {
                for (key, value) in MEMORY_COUNTER_KEYS.iter().zip(snapshot.values()) {
                    self.record.insert(*key, value);
                }
                self.memory_snapshot = Some(snapshot);
            }
            Ok(None) => debug!("vmstat not available, skipping page faults"),
            Err(e) => errors.push(e.to_string()),
        }

        if !errors.is_empty() {
            self.record_error(Category::Memory.error_key(), errors.join("; "));
        }
    }

    /// Records CPU identity and snapshots the tick and context switch counters.
    pub fn inspect_cpu(&mut self) {
        if !self.begin(Category::Cpu) {
            return;
        }

        let identity = self.sources.read_cpu_identity();
        self.record.insert("cpuType", identity.cpu_type);
        self.record.insert("cpuModel", identity.model);
        self.record.insert("cpuCores", identity.core_count);
        self.record.insert("architecture", identity.architecture);

        match self.sources.read_cpu_counters() {
            Ok(Some(snapshot)) => {
                for (key, value) in CPU_COUNTER_KEYS.iter().zip(snapshot.values()) {
                    self.record.insert(*key, value);
                }
                self.cpu_snapshot = Some(snapshot);
            }
            Ok(None) => debug!("stat not available, skipping CPU counters"),
            Err(e) => self.record_error(Category::Cpu.error_key(), e.to_string()),
        }
    }

    /// Runs every inspection in a fixed order, then stamps `frameworkRuntime`.
    pub fn inspect_all(&mut self) {
        self.inspect_container();
        self.inspect_platform();
        self.inspect_linux();
        self.inspect_memory();
        self.inspect_cpu();
        self.add_timestamp("frameworkRuntime");
    }

    /// Records `<counter>Delta` for each CPU counter against the snapshot.
    pub fn delta_cpu(&mut self) {
        if !self.state.is_inspected(Category::Cpu) {
            self.record_error(CPU_DELTA_ERROR, "CPU not inspected before collecting deltas!");
            return;
        }
        let Some(before) = self.cpu_snapshot else {
            self.record_error(CPU_DELTA_ERROR, "No CPU snapshot to compare against");
            return;
        };

        match self.sources.read_cpu_counters() {
            Ok(Some(after)) => {
                self.write_deltas(&CPU_COUNTER_KEYS, &after.values(), &before.values());
                self.cpu_busy_delta = Some(
                    counter_delta(after.user, before.user)
                        + counter_delta(after.kernel, before.kernel),
                );
            }
            Ok(None) => self.record_error(CPU_DELTA_ERROR, "stat no longer available"),
            Err(e) => self.record_error(CPU_DELTA_ERROR, e.to_string()),
        }
    }

    /// Records `pageFaultsDelta` and `majorPageFaultsDelta` against the snapshot.
    pub fn delta_memory(&mut self) {
        if !self.state.is_inspected(Category::Memory) {
            self.record_error(
                MEMORY_DELTA_ERROR,
                "Memory not inspected before collecting deltas!",
            );
            return;
        }
        let Some(before) = self.memory_snapshot else {
            self.record_error(MEMORY_DELTA_ERROR, "No memory snapshot to compare against");
            return;
        };

        match self.sources.read_page_faults() {
            Ok(Some(after)) => {
                self.write_deltas(&MEMORY_COUNTER_KEYS, &after.values(), &before.values())
            }
            Ok(None) => self.record_error(MEMORY_DELTA_ERROR, "vmstat no longer available"),
            Err(e) => self.record_error(MEMORY_DELTA_ERROR, e.to_string()),
        }
    }

    fn write_deltas(&mut self, keys: &[&str], after: &[u64], before: &[u64]) {
        for ((key, a), b) in keys.iter().zip(after).zip(before) {
            self.record
                .insert(format!("{}Delta", key), counter_delta(*a, *b));
        }
    }

    /// Stamps `userRuntime` when `frameworkRuntime` is known, collects the CPU
    /// and memory deltas, recommends a configuration, then stamps
    /// `frameworkRuntimeDeltas`.
    pub fn inspect_all_deltas(&mut self) {
        if let Some(framework) = self
            .record
            .get("frameworkRuntime")
            .and_then(AttributeValue::as_i64)
        {
            let user_runtime = self.elapsed_ms() - framework;
            self.record.insert("userRuntime", user_runtime);
            self.user_runtime_ms = Some(user_runtime);
        }

        let deltas_start = Instant::now();
        self.delta_cpu();
        self.delta_memory();
        self.recommend_configuration();
        self.record
            .insert("frameworkRuntimeDeltas", millis(deltas_start.elapsed()));
    }

    /// Records `availableCPUs`, `utilizedCPUs` and `recommendedMemory` on AWS
    /// Lambda. Needs the platform and the CPU deltas; other platforms get
    /// nothing.
    pub fn recommend_configuration(&mut self) {
        let target = self
            .platform
            .as_ref()
            .map(|identity| (identity.platform, identity.function_memory.clone()));
        let (Some((platform, function_memory)), Some(busy_ticks)) = (target, self.cpu_busy_delta)
        else {
            self.record_error(
                RECOMMEND_CONFIGURATION_ERROR,
                "CPU, CPU Delta, and Platform must be inspected before recommending a configuration!",
            );
            return;
        };
        if platform != Platform::AwsLambda {
            return;
        }

        let result = recommend::recommend(
            function_memory.as_deref(),
            busy_ticks,
            self.user_runtime_ms.unwrap_or(0),
        );
        match result {
            Ok(rec) => {
                self.record.insert("availableCPUs", rec.available_cpus);
                self.record.insert("utilizedCPUs", rec.utilized_cpus);
                self.record
                    .insert("recommendedMemory", rec.recommended_memory_mb);
            }
            Err(e) => self.record_error(
                RECOMMEND_CONFIGURATION_ERROR,
                format!("Unable to recommend a configuration. {}", e),
            ),
        }
    }

    /// Writes a custom attribute, overwriting any previous value.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.record.insert(key, value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.record.get(key)
    }

    /// Stores the milliseconds elapsed since the invocation started.
    pub fn add_timestamp(&mut self, key: impl Into<String>) {
        let elapsed = self.elapsed_ms();
        self.record.insert(key, elapsed);
    }

    /// Stores the milliseconds elapsed since `since_epoch_ms`.
    pub fn add_timestamp_since(&mut self, key: impl Into<String>, since_epoch_ms: i64) {
        self.record.insert(key, now_epoch_ms() - since_epoch_ms);
    }

    /// Copies every readable field of `result` into the record.
    ///
    /// If the fields cannot be read, nothing is merged and a
    /// `ConsumeResponseError` attribute is written instead.
    pub fn consume_response<R: ReadableFields + ?Sized>(&mut self, result: &R) {
        match result.readable_fields() {
            Ok(fields) => {
                for (key, value) in fields {
                    self.record.insert(key, value);
                }
            }
            Err(e) => self.record_error(
                CONSUME_RESPONSE_ERROR,
                format!("There was an error consuming the response object: {}", e),
            ),
        }
    }

    /// Stamps `runtime` and `endTime` and returns a copy of the record.
    ///
    /// Every call re-stamps both values, so a later call overwrites the
    /// runtime reported by an earlier one.
    pub fn finish(&mut self) -> AttributeRecord {
        self.add_timestamp("runtime");
        self.record.insert("endTime", now_epoch_ms());
        self.record.clone()
    }

    /// Merges `result` and then finishes.
    pub fn finish_with<R: ReadableFields + ?Sized>(&mut self, result: &R) -> AttributeRecord {
        self.consume_response(result);
        self.finish()
    }

    /// Consumes the inspector, returning the record as it stands.
    pub fn into_record(self) -> AttributeRecord {
        self.record
    }
}

fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Signed difference of two counter reads. Exact while the true difference
/// fits in an i64; a counter that reset reads as negative.
fn counter_delta(after: u64, before: u64) -> i64 {
    after.wrapping_sub(before) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_delta_signed() {
        assert_eq!(counter_delta(150, 100), 50);
        assert_eq!(counter_delta(100, 100), 0);
        assert_eq!(counter_delta(100, 150), -50);
        assert_eq!(counter_delta(0, u64::from(u32::MAX)), -(u32::MAX as i64));
    }

    #[test]
    fn test_inspection_state_transitions_once() {
        let mut state = InspectionState::default();
        assert!(!state.is_inspected(Category::Cpu));
        assert!(state.mark(Category::Cpu));
        assert!(!state.mark(Category::Cpu));
        assert!(state.is_inspected(Category::Cpu));
        assert_eq!(state.inspected().collect::<Vec<_>>(), vec![Category::Cpu]);
        assert!(!state.all_inspected());

        for category in Category::ALL {
            state.mark(category);
        }
        assert!(state.all_inspected());
    }

    #[test]
    fn test_error_keys_are_distinct() {
        let mut keys: Vec<&str> = Category::ALL.iter().map(|c| c.error_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Category::ALL.len());
    }
}
