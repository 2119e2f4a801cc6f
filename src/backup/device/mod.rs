pub mod idevice;

use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::validate::validate_device_id;
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
use mockall::automock;

/// Identifier of a physically connected device, as reported by the discovery tool
///
/// Always a single sanitized path component: the backup tool writes into
/// `<work_dir>/<id>/` and the archive is named `<id>.tgz`.
#[derive(Clone, Debug, Display, Deref, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse<S: Into<String>>(id: S) -> Result<DeviceId> {
        let id = id.into();
        match validate_device_id(&id) {
            Ok(()) => Ok(DeviceId(id)),
            Err(e) => {
                tracing::debug!("Rejected device id {:?}: {}", id, e);
                Err(Error::invalid_device_id(id))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DeviceId::parse(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// What happened when asking the device to encrypt its backups
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncryptionOutcome {
    Enabled,
    AlreadyEnabled,
    Failed { status: String, output: String },
}

static ALREADY_ENABLED_MARKER: &str = "already enabled";
/// Status reported when the encryption command could not be started
pub static NOT_RUN_STATUS: &str = "not run";

impl EncryptionOutcome {
    /// Classifies a finished encryption command from its exit status and combined output.
    pub fn classify<S: Into<String>>(success: bool, status: S, output: &str) -> Self {
        if success {
            EncryptionOutcome::Enabled
        } else if output.to_lowercase().contains(ALREADY_ENABLED_MARKER) {
            EncryptionOutcome::AlreadyEnabled
        } else {
            EncryptionOutcome::Failed {
                status: status.into(),
                output: output.trim().to_string(),
            }
        }
    }

    /// Benign outcomes let the pipeline carry on without operator attention.
    pub fn is_benign(&self) -> bool {
        !matches!(self, EncryptionOutcome::Failed { .. })
    }
}

/// External tooling that talks to the device
///
/// The production implementation shells out to libimobiledevice binaries,
/// see [`idevice::IDeviceTool`].
#[cfg_attr(test, automock)]
pub trait DeviceTool {
    /// Lists the ids of every connected device.
    fn list_devices(&self) -> Result<Vec<DeviceId>>;

    /// Turns on device-side backup encryption.
    ///
    /// Never fails the run: a tool that refused or could not be started at all
    /// is reported as [`EncryptionOutcome::Failed`].
    fn enable_encryption(&self, device: &DeviceId, password: &RedactedString)
        -> EncryptionOutcome;

    /// Runs a full backup of `device` into `destination`, attached to the operator's terminal.
    fn capture(&self, device: &DeviceId, destination: &Path) -> Result<()>;
}

/// Splits discovery output into device ids, dropping blank lines and lines
/// that cannot name a backup directory.
pub fn parse_device_list(stdout: &str) -> Vec<DeviceId> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match DeviceId::parse(line) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Ignoring discovery output line: {e}");
                None
            }
        })
        .collect()
}
