//! FaaS platform detection from the process environment.
//!
//! Each supported provider sets a marker variable in every function's
//! environment. Markers are checked in a fixed priority order and the first
//! match decides the platform; provider-scoped fields are then copied
//! verbatim from their own variables.

use std::collections::HashMap;
use std::fmt;

use crate::system::{HostSources, COMMAND_ERROR};

/// Marker preceding the Lambda sandbox VM id in the cgroup descriptor.
const SANDBOX_MARKER: &str = "sandbox-root";
/// Length of the VM id following the marker and its separator.
const SANDBOX_VM_ID_LEN: usize = 6;

/// Read-only view of the process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot of the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    fn get_owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }
}

/// Hosting platforms recognised by [`detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    AwsLambda,
    GoogleCloudFunctions,
    IbmCloudFunctions,
    AzureFunctions,
    Unknown,
}

impl Platform {
    /// Name written to the `platform` attribute.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::AwsLambda => "AWS Lambda",
            Platform::GoogleCloudFunctions => "Google Cloud Functions",
            Platform::IbmCloudFunctions => "IBM Cloud Functions",
            Platform::AzureFunctions => "Azure Functions",
            Platform::Unknown => "Unknown Platform",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Detected platform plus the provider-scoped fields that were available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformIdentity {
    pub platform: Platform,
    pub container_id: Option<String>,
    pub function_name: Option<String>,
    pub function_memory: Option<String>,
    pub function_region: Option<String>,
    pub vm_id: Option<String>,
}

impl PlatformIdentity {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            container_id: None,
            function_name: None,
            function_memory: None,
            function_region: None,
            vm_id: None,
        }
    }

    /// Attribute name/value pairs for the provider fields that are set.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("containerID", &self.container_id),
            ("functionName", &self.function_name),
            ("functionMemory", &self.function_memory),
            ("functionRegion", &self.function_region),
            ("vmID", &self.vm_id),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

/// Classifies the host platform from marker variables. Pure: the same
/// environment always yields the same identity. The VM id is left unset;
/// see [`resolve_vm_id`].
pub fn detect(env: &Environment) -> PlatformIdentity {
    if let Some(stream) = env.get_owned("AWS_LAMBDA_LOG_STREAM_NAME") {
        return PlatformIdentity {
            container_id: Some(stream),
            function_name: env.get_owned("AWS_LAMBDA_FUNCTION_NAME"),
            function_memory: env.get_owned("AWS_LAMBDA_FUNCTION_MEMORY_SIZE"),
            function_region: env.get_owned("AWS_REGION"),
            ..PlatformIdentity::new(Platform::AwsLambda)
        };
    }

    if let Some(name) = env.get_owned("X_GOOGLE_FUNCTION_NAME") {
        return PlatformIdentity {
            function_name: Some(name),
            function_memory: env.get_owned("X_GOOGLE_FUNCTION_MEMORY_MB"),
            function_region: env.get_owned("X_GOOGLE_FUNCTION_REGION"),
            ..PlatformIdentity::new(Platform::GoogleCloudFunctions)
        };
    }

    if let Some(action) = env.get_owned("__OW_ACTION_NAME") {
        return PlatformIdentity {
            function_name: Some(action),
            function_region: env.get_owned("__OW_API_HOST"),
            ..PlatformIdentity::new(Platform::IbmCloudFunctions)
        };
    }

    if let Some(container) = env.get_owned("CONTAINER_NAME") {
        return PlatformIdentity {
            container_id: Some(container),
            function_name: env.get_owned("WEBSITE_SITE_NAME"),
            function_region: env.get_owned("Location"),
            ..PlatformIdentity::new(Platform::AzureFunctions)
        };
    }

    PlatformIdentity::new(Platform::Unknown)
}

/// Fills in the VM id for platforms that expose one outside the environment.
///
/// Lambda: read from the cgroup descriptor. IBM: read from the hypervisor
/// UUID file. A missing marker or file leaves the field unset; no retry.
pub fn resolve_vm_id(identity: &mut PlatformIdentity, sources: &HostSources) {
    identity.vm_id = match identity.platform {
        Platform::AwsLambda => {
            let descriptor = sources.read_cgroup_descriptor();
            if descriptor == COMMAND_ERROR {
                None
            } else {
                parse_sandbox_vm_id(&descriptor)
            }
        }
        Platform::IbmCloudFunctions => sources.read_hypervisor_uuid(),
        _ => None,
    };
}

/// Extracts the fixed-width VM id that follows `sandbox-root` and one
/// separator character in a cgroup descriptor.
pub fn parse_sandbox_vm_id(descriptor: &str) -> Option<String> {
    let start = descriptor.find(SANDBOX_MARKER)? + SANDBOX_MARKER.len() + 1;
    descriptor
        .get(start..start + SANDBOX_VM_ID_LEN)
        .map(str::to_string)
}
