//! The `backup` command, step by step.

use crate::backup::backup_config::BackupPlan;
use crate::backup::device::DeviceTool;
use crate::backup::function_path;
use crate::backup::publish::{Cid, Publisher};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::tar::create_tgz;
use crate::backup::trim::trim_backup;
use function_name::named;
use tracing::{info, warn};

/// enable encryption → capture (unless skipped) → trim → archive → publish
///
/// The first failing step stops the run. Artifacts of earlier steps are left
/// in the work directory.
#[named]
pub fn run_backup(plan: &BackupPlan, tool: &dyn DeviceTool, publisher: &Publisher) -> Result<Cid> {
    let device = plan.device();
    let work_dir = plan.work_dir();

    info!("Enabling backup encryption on device {}...", device);
    let outcome = tool.enable_encryption(device, plan.password());
    if outcome.is_benign() {
        info!("Backup encryption is on ({:?})", outcome);
    } else {
        warn!("Enabling backup encryption failed, continuing: {:?}", outcome);
    }

    if *plan.skip_capture() {
        info!("Skipping device backup, using existing files in {:?}", work_dir);
    } else {
        info!("Backing up device {} into {:?}...", device, work_dir);
        tool.capture(device, work_dir)
            .add_msg(format!("Backup of device {} failed", device))
            .add_fn_name(function_path!())?;
        info!("Device backup finished.");
    }

    let backup_dir = work_dir.join(device.as_str());
    trim_backup(&backup_dir)?;

    let archive = create_tgz(work_dir, device, plan.compression())?;
    info!("Created archive {:?}", archive);

    let cid = publisher.publish(&archive, device)?;
    info!("Published {} for device {} as {}", plan.provider(), device, cid);
    Ok(cid)
}
