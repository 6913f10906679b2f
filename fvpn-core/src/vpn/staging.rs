//! Per-attempt credential staging
//!
//! Renders an ephemeral openfortivpn config file containing the resolved
//! credentials for one gateway attempt, and guarantees its secure
//! disposal (zero-overwrite, fsync, unlink) exactly once.

use crate::error::StagingError;
use crate::types::{Credentials, GatewayTarget};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// A staged config artifact owned by one connection attempt
///
/// The file is readable only by the invoking user (mode 0600) and is
/// erased when `dispose` is called or the value is dropped, whichever
/// comes first.
#[derive(Debug)]
pub struct StagedConfig {
    path: PathBuf,
    disposed: bool,
}

impl StagedConfig {
    /// Render and write the config for one gateway attempt
    ///
    /// The attempt ordinal is part of the file name so concurrent or
    /// rapid back-to-back attempts never collide.
    pub fn stage(
        staging_dir: &Path,
        target: &GatewayTarget,
        credentials: &Credentials,
        attempt: usize,
    ) -> Result<Self, StagingError> {
        fs::create_dir_all(staging_dir).map_err(StagingError::NoWritableLocation)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let path = staging_dir.join(format!(
            "fvpn_{}_{}_{}.conf",
            std::process::id(),
            attempt,
            nanos
        ));

        let mut contents = format!(
            "host = {}\nport = {}\nusername = {}\npassword = {}\n",
            target.host,
            target.port,
            credentials.username,
            credentials.expose_password()
        );
        if let Some(cert) = credentials.trusted_cert.as_deref() {
            let cert = cert.trim();
            if !cert.is_empty() {
                contents.push_str(&format!("trusted-cert = {}\n", cert));
            }
        }
        if let Some(otp) = credentials.expose_otp() {
            contents.push_str(&format!("otp = {}\n", otp));
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;

        Ok(Self {
            path,
            disposed: false,
        })
    }

    /// Path handed to the external client as its sole config input
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Securely erase the artifact
    ///
    /// Overwrites the file with zeros and flushes before unlinking. If
    /// the overwrite fails the unlink is still attempted; disposal never
    /// propagates an error to the caller.
    pub fn dispose(mut self) {
        self.erase();
    }

    fn erase(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Err(e) = zero_overwrite(&self.path) {
            warn!("Failed to overwrite staged config {:?}: {}", self.path, e);
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staged config {:?}: {}", self.path, e);
            }
        }
    }
}

impl Drop for StagedConfig {
    fn drop(&mut self) {
        // Backstop for abnormal attempt teardown
        self.erase();
    }
}

fn zero_overwrite(path: &Path) -> std::io::Result<()> {
    let len = fs::metadata(path)?.len() as usize;
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(&vec![0u8; len])?;
    file.flush()?;
    file.sync_all()
}
