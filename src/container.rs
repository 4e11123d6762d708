//! Durable identity for the current execution environment.
//!
//! Platforms keep containers warm between invocations, and anything written
//! to local disk survives with them. The first invocation in a container
//! writes a random UUID to a well-known file; later invocations read it back.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use crate::error::IdentityError;

/// Default location of the persisted container id.
pub const DEFAULT_CONTAINER_ID_PATH: &str = "/tmp/container-id";

/// Container id plus whether this invocation created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIdentity {
    pub uuid: String,
    pub is_new: bool,
}

/// Reads the container id at `path`, creating it if it does not exist.
///
/// Creation is exclusive: if another process creates the file between the
/// existence check and the write, this call fails instead of overwriting it.
/// There is no retry.
pub fn ensure(path: &Path) -> Result<ContainerIdentity, IdentityError> {
    if path.is_file() {
        let uuid = read_existing(path)?;
        debug!("Reusing container id {} from {}", uuid, path.display());
        return Ok(ContainerIdentity {
            uuid,
            is_new: false,
        });
    }

    let uuid = Uuid::new_v4().to_string();
    write_new(path, &uuid)?;
    debug!("Stamped new container id {} at {}", uuid, path.display());
    Ok(ContainerIdentity { uuid, is_new: true })
}

fn read_existing(path: &Path) -> Result<String, IdentityError> {
    let content = fs::read_to_string(path).map_err(|e| IdentityError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    match content.lines().next() {
        Some(line) if !line.trim().is_empty() => Ok(line.to_string()),
        _ => Err(IdentityError::Empty(path.to_path_buf())),
    }
}

fn write_new(path: &Path, uuid: &str) -> Result<(), IdentityError> {
    let to_error = |e: std::io::Error| IdentityError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                if path.is_dir() {
                    debug!("{} is a directory, not a container id file", path.display());
                } else {
                    debug!("Lost container id race on {}", path.display());
                }
            }
            to_error(e)
        })?;

    file.write_all(uuid.as_bytes()).map_err(to_error)
}
