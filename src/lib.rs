//! # ipfs-ios-backup
//!
//! Backs up a connected iOS device with libimobiledevice and publishes the
//! archive to IPFS.
//!
//! ## Commands
//!
//! - **devices**: list connected device ids
//! - **backup**: encrypt, capture, trim, compress and publish one device
//! - **init-store**: create a record store with the backup schema
//!
//! ## Providers
//!
//! - **content-store** (`ipfs`): add the archive to an IPFS node, pinned
//! - **pinning-service** (`pinata`): as above, then queue the CID at Pinata
//! - **record-store** (`threads`): as above, then record `{deviceUUID, backupCID}`
//!
//! ## Quick Start
//!
//! ```no_run
//! use ipfs_ios_backup::backup::device::idevice::IDeviceTool;
//! use ipfs_ios_backup::backup::device::DeviceTool;
//!
//! for device in IDeviceTool::default().list_devices()? {
//!     println!("{device}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
pub mod cli;
