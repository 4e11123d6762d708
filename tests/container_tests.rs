//! Integration tests for the persisted container identity.

use faas_inspector::container::ensure;
use faas_inspector::IdentityError;
use std::fs;
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn test_first_call_creates_second_reuses() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("container-id");

    let cold = ensure(&path).expect("first ensure");
    assert!(cold.is_new);
    assert!(Uuid::parse_str(&cold.uuid).is_ok());
    assert_eq!(fs::read_to_string(&path).unwrap(), cold.uuid);

    let warm = ensure(&path).expect("second ensure");
    assert!(!warm.is_new);
    assert_eq!(warm.uuid, cold.uuid);
}

#[test]
fn test_existing_file_is_left_untouched() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("container-id");
    fs::write(&path, "stamped-by-another-runtime\nsecond line\n").unwrap();

    let identity = ensure(&path).expect("existing id");

    assert_eq!(identity.uuid, "stamped-by-another-runtime");
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "stamped-by-another-runtime\nsecond line\n"
    );
}

#[test]
fn test_missing_directory_is_a_write_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("absent").join("container-id");

    assert!(matches!(ensure(&path), Err(IdentityError::Write { .. })));
}
