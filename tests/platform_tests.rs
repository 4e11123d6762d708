//! Integration tests for platform detection.

use faas_inspector::platform::{detect, resolve_vm_id};
use faas_inspector::{Environment, HostSources, Platform};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_empty_environment_is_unknown() {
    let identity = detect(&Environment::default());

    assert_eq!(identity.platform, Platform::Unknown);
    assert_eq!(identity.platform.to_string(), "Unknown Platform");
    assert!(identity.fields().is_empty());
}

#[test]
fn test_aws_marker_only() {
    let env = Environment::from_pairs([("AWS_LAMBDA_LOG_STREAM_NAME", "xyz")]);
    let identity = detect(&env);

    assert_eq!(identity.platform, Platform::AwsLambda);
    assert_eq!(identity.fields(), vec![("containerID", "xyz")]);
}

#[test]
fn test_provider_fields_are_copied_verbatim() {
    let env = Environment::from_pairs([
        ("X_GOOGLE_FUNCTION_NAME", "hello"),
        ("X_GOOGLE_FUNCTION_MEMORY_MB", "256"),
        ("X_GOOGLE_FUNCTION_REGION", "europe-west1"),
        // Belongs to another provider and must not leak into the record
        ("WEBSITE_SITE_NAME", "azure-app"),
    ]);
    let identity = detect(&env);

    assert_eq!(identity.platform, Platform::GoogleCloudFunctions);
    assert_eq!(
        identity.fields(),
        vec![
            ("functionName", "hello"),
            ("functionMemory", "256"),
            ("functionRegion", "europe-west1"),
        ]
    );
}

#[test]
fn test_marker_priority_order() {
    let all_markers = [
        ("AWS_LAMBDA_LOG_STREAM_NAME", "stream"),
        ("X_GOOGLE_FUNCTION_NAME", "gcf"),
        ("__OW_ACTION_NAME", "/ns/action"),
        ("CONTAINER_NAME", "azure"),
    ];

    let expected = [
        Platform::AwsLambda,
        Platform::GoogleCloudFunctions,
        Platform::IbmCloudFunctions,
        Platform::AzureFunctions,
    ];

    for (skip, platform) in expected.into_iter().enumerate() {
        let env = Environment::from_pairs(all_markers.iter().skip(skip).copied());
        assert_eq!(detect(&env).platform, platform);
    }
}

#[test]
fn test_detection_is_pure() {
    let env = Environment::from_pairs([
        ("__OW_ACTION_NAME", "/guest/hello"),
        ("__OW_API_HOST", "https://us-south.functions.cloud.ibm.com"),
    ]);

    assert_eq!(detect(&env), detect(&env));
}

#[test]
fn test_ibm_vm_id_from_hypervisor_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let uuid_path = dir.path().join("uuid");
    fs::write(&uuid_path, "ec2f1c7a-0000-4000-8000-123456789abc\n").unwrap();
    let sources = HostSources {
        hypervisor_uuid_path: uuid_path,
        ..HostSources::with_proc_root(dir.path())
    };

    let mut identity = detect(&Environment::from_pairs([("__OW_ACTION_NAME", "a")]));
    resolve_vm_id(&mut identity, &sources);

    assert_eq!(
        identity.vm_id.as_deref(),
        Some("ec2f1c7a-0000-4000-8000-123456789abc")
    );
}

#[test]
fn test_vm_id_absent_without_source() {
    let dir = tempdir().expect("Failed to create temp dir");
    let sources = HostSources::with_proc_root(dir.path());

    let mut identity = detect(&Environment::from_pairs([("AWS_LAMBDA_LOG_STREAM_NAME", "s")]));
    resolve_vm_id(&mut identity, &sources);

    assert_eq!(identity.vm_id, None);
}
