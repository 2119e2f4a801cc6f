use crate::backup::backup_config::{
    resolve_store_address, BackupArgs, BackupPlan, FileConfig, InitStoreArgs,
};
use crate::backup::device::DeviceTool;
use crate::backup::pipeline::run_backup;
use crate::backup::publish::record_store::{record_schema, ThreadsHttpClient, RECORD_MODEL_NAME};
use crate::backup::publish::RecordStore;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

pub static DEVICES_HEADER: &str = "Connected device UUIDs:";
pub static DEVICES_FAILURE: &str = "Something went wrong.";

/// Back up a connected iOS device and publish the archive to IPFS
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML file with defaults for endpoints, credentials and tools
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List connected devices
    Devices,
    /// Back up a device and publish the archive
    Backup(BackupArgs),
    /// Create a record store and register the backup schema in it
    InitStore(InitStoreArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    let file = FileConfig::load_optional(cli.config.as_deref())?;
    let mut stdout = std::io::stdout();
    match cli.command {
        Commands::Devices => print_devices(&file.device_tool(), &mut stdout),
        Commands::Backup(args) => {
            let plan = BackupPlan::resolve(args, file)?;
            let publisher = plan.publisher()?;
            let cid = run_backup(&plan, plan.tools(), &publisher)?;
            writeln!(stdout, "{cid}")?;
            Ok(())
        }
        Commands::InitStore(args) => {
            let store = ThreadsHttpClient::new(&resolve_store_address(args, &file)?)?;
            init_store(&store, &mut stdout).map(|_| ())
        }
    }
}

/// Prints connected device ids under a header.
///
/// A failing discovery tool is reported with a generic line and is not an error.
pub fn print_devices<W: Write>(tool: &dyn DeviceTool, out: &mut W) -> Result<()> {
    match tool.list_devices() {
        Ok(devices) => {
            writeln!(out, "{DEVICES_HEADER}")?;
            for device in devices {
                writeln!(out, "{device}")?;
            }
        }
        Err(e) => {
            tracing::warn!("Listing devices failed: {e}");
            writeln!(out, "{DEVICES_FAILURE}")?;
        }
    }
    Ok(())
}

/// Creates a new store, registers the backup model in it and prints the store id.
pub fn init_store<W: Write>(store: &dyn RecordStore, out: &mut W) -> Result<String> {
    let store_id = store.new_store().add_msg("Creating record store failed")?;
    tracing::info!("Created record store {}", store_id);
    store
        .register_schema(&store_id, RECORD_MODEL_NAME, record_schema())
        .add_msg(format!("Registering schema in store {} failed", store_id))?;
    tracing::info!("Registered model {:?} in store {}", RECORD_MODEL_NAME, store_id);
    writeln!(out, "{store_id}")?;
    Ok(store_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::backup_config::Provider;
    use crate::backup::device::{DeviceId, MockDeviceTool};
    use crate::backup::publish::MockRecordStore;
    use crate::backup::result_error::error::Error;
    use clap::CommandFactory;
    use mockall::Sequence;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_backup_with_aliases() {
        let cli = Cli::try_parse_from([
            "ipfs-ios-backup",
            "backup",
            "pinata",
            "ABC123",
            "--password",
            "hunter2",
            "--upload-only",
            "--endpoint",
            "/ip4/127.0.0.1/tcp/5001",
        ])
        .unwrap();
        match cli.command {
            Commands::Backup(args) => {
                assert_eq!(args.provider, Provider::PinningService);
                assert_eq!(args.device_id, "ABC123");
                assert!(args.skip_capture);
                assert_eq!(
                    args.password.as_ref().map(|p| p.inner().as_str()),
                    Some("hunter2")
                );
            }
            other => panic!("Expected backup, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_provider() {
        let res = Cli::try_parse_from(["ipfs-ios-backup", "backup", "s3", "ABC123"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_compression() {
        let res = Cli::try_parse_from([
            "ipfs-ios-backup",
            "backup",
            "ipfs",
            "ABC123",
            "--compression-level",
            "10",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_missing_flag_fails_before_any_side_effect() {
        let cli = Cli::try_parse_from([
            "ipfs-ios-backup",
            "backup",
            "pinning-service",
            "ABC123",
            "--password",
            "hunter2",
            "--endpoint",
            "/ip4/127.0.0.1/tcp/5001",
            "--pinning-api-key",
            "key",
        ])
        .unwrap();
        let err = run(cli).unwrap_err();
        assert!(matches!(
            err.root(),
            Error::MissingFlag { flag, .. } if flag == "pinning-api-secret"
        ));
        assert!(!std::path::Path::new("ABC123.tgz").exists());
    }

    #[test]
    fn test_print_devices() {
        let mut tool = MockDeviceTool::new();
        tool.expect_list_devices().times(1).returning(|| {
            Ok(vec![
                DeviceId::parse("ABC123").unwrap(),
                DeviceId::parse("XYZ").unwrap(),
            ])
        });
        let mut out = Vec::new();

        print_devices(&tool, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Connected device UUIDs:\nABC123\nXYZ\n"
        );
    }

    #[test]
    fn test_print_devices_failure_is_generic() {
        let mut tool = MockDeviceTool::new();
        tool.expect_list_devices()
            .times(1)
            .returning(|| Err(Error::device_discovery("idevice_id exited with 1")));
        let mut out = Vec::new();

        print_devices(&tool, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Something went wrong.\n");
    }

    #[test]
    fn test_init_store_registers_schema_in_new_store() {
        let mut seq = Sequence::new();
        let mut store = MockRecordStore::new();
        store
            .expect_new_store()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok("store-1".to_string()));
        store
            .expect_register_schema()
            .withf(|store_id, name, schema| {
                store_id == "store-1" && name == "iOS Backup" && schema["title"] == "iOS Backup"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        store.expect_create_record().never();
        let mut out = Vec::new();

        let store_id = init_store(&store, &mut out).unwrap();

        assert_eq!(store_id, "store-1");
        assert_eq!(String::from_utf8(out).unwrap(), "store-1\n");
    }

    #[test]
    fn test_init_store_stops_when_store_creation_fails() {
        let mut store = MockRecordStore::new();
        store
            .expect_new_store()
            .returning(|| Err(Error::no_upload_result("mock")));
        store.expect_register_schema().never();
        let mut out = Vec::new();

        assert!(init_store(&store, &mut out).is_err());
        assert!(out.is_empty());
    }
}
