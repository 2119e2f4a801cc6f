use crate::backup::compress::GzipConfig;
use crate::backup::device::idevice::IDeviceTool;
use crate::backup::device::DeviceId;
use crate::backup::publish::content_store::IpfsHttpClient;
use crate::backup::publish::pinning::{PinataClient, DEFAULT_PINNING_BASE_URL, PIN_NAME};
use crate::backup::publish::record_store::{ThreadsHttpClient, RECORD_MODEL_NAME};
use crate::backup::publish::{FollowUp, Publisher};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{validate_dir_exist, validate_http_url};
use bon::Builder;
use clap::{Args, ValueEnum};
use derive_more::Display;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use validator::Validate;

/// Where the archive goes after the content-store upload
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// Upload to the content-store node only
    #[value(alias = "ipfs")]
    #[display("content-store")]
    ContentStore,
    /// Upload, then queue the CID at the pinning service
    #[value(alias = "pinata")]
    #[display("pinning-service")]
    PinningService,
    /// Upload, then record the CID in the record store
    #[value(alias = "threads")]
    #[display("record-store")]
    RecordStore,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PinningFileConfig {
    pub api_key: Option<String>,
    #[validate(nested)]
    pub api_secret: Option<RedactedString>,
    #[validate(custom(function = validate_http_url))]
    pub base_url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RecordStoreFileConfig {
    #[validate(custom(function = validate_http_url))]
    pub address: Option<String>,
    #[validate(length(min = 1))]
    pub store_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolsFileConfig {
    #[validate(length(min = 1))]
    pub discovery: Option<String>,
    #[validate(length(min = 1))]
    pub backup: Option<String>,
}

/// Defaults read from `--config <file.yml>`
///
/// ```yaml
/// endpoint: /ip4/127.0.0.1/tcp/5001
/// pinning:
///   api_key: key
///   api_secret: secret
/// record_store:
///   address: http://127.0.0.1:6007
///   store_id: bafk...
/// tools:
///   backup: /usr/local/bin/idevicebackup2
/// compression:
///   level: 9
/// work_dir: /var/backups/ios
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[validate(length(min = 1))]
    pub endpoint: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub pinning: PinningFileConfig,
    #[serde(default)]
    #[validate(nested)]
    pub record_store: RecordStoreFileConfig,
    #[serde(default)]
    #[validate(nested)]
    pub tools: ToolsFileConfig,
    #[serde(default)]
    #[validate(nested)]
    pub compression: GzipConfig,
    pub work_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<FileConfig> {
        let config = File::open(path)
            .map_err(Error::from)
            .add_msg(format!("Open config failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, FileConfig>(f)
                    .map_err(Error::from)
                    .add_msg(format!("Parse YAML config failed: {:?}", path))
            })?;
        config
            .validate()
            .map_err(Error::from)
            .add_msg(format!("Config validation failed: {:?}", path))?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise every value comes from the command line.
    pub fn load_optional(path: Option<&Path>) -> Result<FileConfig> {
        match path {
            Some(path) => FileConfig::load(path),
            None => Ok(FileConfig::default()),
        }
    }

    pub fn device_tool(&self) -> IDeviceTool {
        IDeviceTool::builder()
            .maybe_discovery_program(self.tools.discovery.clone())
            .maybe_backup_program(self.tools.backup.clone())
            .build()
    }
}

/// Arguments of the `backup` command
#[derive(Args, Clone, Debug)]
pub struct BackupArgs {
    /// Where to publish the archive
    #[arg(value_enum)]
    pub provider: Provider,

    /// Id of the device to back up, as listed by `devices`
    pub device_id: String,

    /// Password for device-side backup encryption
    #[arg(long)]
    pub password: Option<RedactedString>,

    /// Skip the device backup and publish what is already in the work directory
    #[arg(long, alias = "upload-only")]
    pub skip_capture: bool,

    /// Content-store node API, as `http(s)://host:port` or a multiaddr
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub pinning_api_key: Option<String>,

    #[arg(long)]
    pub pinning_api_secret: Option<RedactedString>,

    /// Pinning service API root [default: https://api.pinata.cloud]
    #[arg(long)]
    pub pinning_base_url: Option<String>,

    #[arg(long)]
    pub record_store_address: Option<String>,

    #[arg(long)]
    pub record_store_id: Option<String>,

    /// Directory holding `<device-id>/` and `<device-id>.tgz` [default: .]
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Gzip level, 0-9 [default: 6]
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: Option<u32>,
}

/// Arguments of the `init-store` command
#[derive(Args, Clone, Debug, Default)]
pub struct InitStoreArgs {
    #[arg(long)]
    pub record_store_address: Option<String>,
}

/// What runs after the content-store upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUpTarget {
    None,
    Pin {
        api_key: String,
        api_secret: RedactedString,
        base_url: String,
    },
    Record {
        address: String,
        store_id: String,
    },
}

/// A fully resolved `backup` invocation
#[derive(Clone, Debug, Builder, Getters, Validate)]
#[getset(get = "pub")]
pub struct BackupPlan {
    provider: Provider,
    device: DeviceId,
    #[validate(nested)]
    password: RedactedString,
    #[builder(default)]
    skip_capture: bool,
    #[builder(into)]
    endpoint: String,
    #[builder(default = FollowUpTarget::None)]
    follow_up: FollowUpTarget,
    #[builder(default = PathBuf::from("."), into)]
    #[validate(custom(function = validate_dir_exist))]
    work_dir: PathBuf,
    #[builder(default)]
    #[validate(nested)]
    compression: GzipConfig,
    #[builder(default)]
    tools: IDeviceTool,
}

fn require<T>(value: Option<T>, flag: &str, provider: Provider) -> Result<T> {
    value.ok_or_else(|| Error::missing_flag(flag, provider.to_string()))
}

impl BackupPlan {
    /// Merges flags over the file config and checks everything the selected
    /// provider needs, before anything touches the device or the network.
    ///
    /// Only the selected provider's flags are required.
    pub fn resolve(args: BackupArgs, file: FileConfig) -> Result<BackupPlan> {
        let provider = args.provider;
        let endpoint = require(args.endpoint.or(file.endpoint.clone()), "endpoint", provider)?;
        let password = require(args.password, "password", provider)?;

        let follow_up = match provider {
            Provider::ContentStore => FollowUpTarget::None,
            Provider::PinningService => FollowUpTarget::Pin {
                api_key: require(
                    args.pinning_api_key.or(file.pinning.api_key.clone()),
                    "pinning-api-key",
                    provider,
                )?,
                api_secret: require(
                    args.pinning_api_secret
                        .or(file.pinning.api_secret.clone()),
                    "pinning-api-secret",
                    provider,
                )?,
                base_url: args
                    .pinning_base_url
                    .or(file.pinning.base_url.clone())
                    .unwrap_or_else(|| DEFAULT_PINNING_BASE_URL.to_string()),
            },
            Provider::RecordStore => FollowUpTarget::Record {
                address: require(
                    args.record_store_address
                        .or(file.record_store.address.clone()),
                    "record-store-address",
                    provider,
                )?,
                store_id: require(
                    args.record_store_id.or(file.record_store.store_id.clone()),
                    "record-store-id",
                    provider,
                )?,
            },
        };

        let compression = GzipConfig::builder()
            .maybe_level(args.compression_level.or(file.compression.level))
            .build();

        let plan = BackupPlan::builder()
            .provider(provider)
            .device(DeviceId::parse(args.device_id)?)
            .password(password)
            .skip_capture(args.skip_capture)
            .endpoint(endpoint)
            .follow_up(follow_up)
            .work_dir(
                args.work_dir
                    .or(file.work_dir.clone())
                    .unwrap_or_else(|| PathBuf::from(".")),
            )
            .compression(compression)
            .tools(file.device_tool())
            .build();

        plan.validate()
            .map_err(Error::from)
            .add_msg("Invalid backup options")?;
        Ok(plan)
    }

    /// Builds the clients for the configured provider.
    pub fn publisher(&self) -> Result<Publisher> {
        let content_store = IpfsHttpClient::new(&self.endpoint)?;
        let follow_ups = match &self.follow_up {
            FollowUpTarget::None => vec![],
            FollowUpTarget::Pin {
                api_key,
                api_secret,
                base_url,
            } => vec![FollowUp::Pin {
                service: Box::new(PinataClient::new(
                    base_url,
                    api_key,
                    api_secret.clone(),
                )?),
                name: PIN_NAME.to_string(),
            }],
            FollowUpTarget::Record { address, store_id } => vec![FollowUp::Record {
                store: Box::new(ThreadsHttpClient::new(address)?),
                store_id: store_id.clone(),
                model: RECORD_MODEL_NAME.to_string(),
            }],
        };
        Ok(Publisher::new(Box::new(content_store), follow_ups))
    }
}

/// Record-store address for `init-store`, flag first, then the file.
pub fn resolve_store_address(args: InitStoreArgs, file: &FileConfig) -> Result<String> {
    args.record_store_address
        .or(file.record_store.address.clone())
        .ok_or_else(|| Error::missing_flag("record-store-address", "init-store"))
}
