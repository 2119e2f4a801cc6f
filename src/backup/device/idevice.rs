use crate::backup::device::{
    parse_device_list, DeviceId, DeviceTool, EncryptionOutcome, NOT_RUN_STATUS,
};
use crate::backup::function_path;
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use bon::Builder;
use function_name::named;
use getset::Getters;
use std::path::Path;
use std::process::{Command, Output};

pub static DEFAULT_DISCOVERY_PROGRAM: &str = "idevice_id";
pub static DEFAULT_BACKUP_PROGRAM: &str = "idevicebackup2";

/// [`DeviceTool`] backed by the libimobiledevice command line tools
///
/// - discovery: `idevice_id -l`
/// - encryption: `idevicebackup2 -u <id> encryption on <password>`
/// - capture: `idevicebackup2 -u <id> backup <destination>`
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct IDeviceTool {
    #[builder(default = DEFAULT_DISCOVERY_PROGRAM.to_string(), into)]
    discovery_program: String,
    #[builder(default = DEFAULT_BACKUP_PROGRAM.to_string(), into)]
    backup_program: String,
}

impl Default for IDeviceTool {
    fn default() -> Self {
        IDeviceTool::builder().build()
    }
}

fn run_captured(program: &str, command: &mut Command) -> Result<Output> {
    command
        .output()
        .map_err(|e| Error::process_spawn(program, e))
}

impl DeviceTool for IDeviceTool {
    #[named]
    fn list_devices(&self) -> Result<Vec<DeviceId>> {
        tracing::debug!("Listing devices with {} -l", self.discovery_program);
        let output = run_captured(
            &self.discovery_program,
            Command::new(&self.discovery_program).arg("-l"),
        )
        .add_fn_name(function_path!())?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(Error::device_discovery(format!(
                "{} exited with {}: {}",
                self.discovery_program,
                output.status,
                stderr.trim()
            ))
            .add_fn_name(function_path!()));
        }

        let devices = parse_device_list(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!("Found {} devices", devices.len());
        Ok(devices)
    }

    fn enable_encryption(
        &self,
        device: &DeviceId,
        password: &RedactedString,
    ) -> EncryptionOutcome {
        tracing::debug!(
            "Running {} -u {} encryption on {:?}",
            self.backup_program,
            device,
            password
        );
        let output = run_captured(
            &self.backup_program,
            Command::new(&self.backup_program).args([
                "-u",
                device.as_str(),
                "encryption",
                "on",
                password.inner().as_str(),
            ]),
        );
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return EncryptionOutcome::Failed {
                    status: NOT_RUN_STATUS.to_string(),
                    output: e.to_string(),
                }
            }
        };

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        EncryptionOutcome::classify(
            output.status.success(),
            output.status.to_string(),
            &combined,
        )
    }

    #[named]
    fn capture(&self, device: &DeviceId, destination: &Path) -> Result<()> {
        tracing::debug!(
            "Running {} -u {} backup {:?}",
            self.backup_program,
            device,
            destination
        );
        // Inherited stdio so device prompts reach the operator.
        let status = Command::new(&self.backup_program)
            .args(["-u", device.as_str(), "backup"])
            .arg(destination)
            .status()
            .map_err(|e| Error::process_spawn(self.backup_program.as_str(), e))
            .add_fn_name(function_path!())?;

        if !status.success() {
            return Err(Error::process_failed(
                self.backup_program.as_str(),
                status.to_string(),
                format!("backup of device {device} did not complete"),
            )
            .add_fn_name(function_path!()));
        }
        Ok(())
    }
}
