//! Invoke command implementation.
//!
//! Fabricates a single function invocation on the local host and prints the
//! record a deployed handler would return.

use anyhow::{Context, Result};
use faas_inspector::{Inspector, InspectorConfig, Response};
use tracing::info;

use crate::cli::RecordFormat;

/// Runs the hello function under a full inspection and prints the record.
pub fn command_invoke(name: &str, format: RecordFormat, config: &InspectorConfig) -> Result<()> {
    info!("Starting local invocation for name={:?}", name);

    let mut inspector = Inspector::with_config(config);
    inspector.inspect_all();

    inspector.add_attribute(
        "message",
        format!(
            "Hello {}! This is a custom attribute added as output from the inspector!",
            name
        ),
    );

    let mut response = Response::default();
    response.set_value(format!("Hello {}! This is from a response object!", name));
    inspector.consume_response(&response);

    inspector.inspect_all_deltas();
    let record = inspector.finish();

    let output = match format {
        RecordFormat::Json => {
            serde_json::to_string_pretty(&record).context("Failed to serialize record as JSON")?
        }
        RecordFormat::Yaml => {
            serde_yaml::to_string(&record).context("Failed to serialize record as YAML")?
        }
    };
    println!("{output}");

    info!("Invocation finished with {} attributes", record.len());
    Ok(())
}
