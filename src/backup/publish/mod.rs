//! Publishing an archive and what happens to its CID afterwards.
//!
//! Every backup is first added to a content-addressed store ([`ContentStore`]).
//! The resulting [`Cid`] is then handed, in order, to each configured
//! [`FollowUp`]: queueing it at a pinning service, or recording it in the
//! record store.

pub mod content_store;
pub mod pinning;
pub mod record_store;
#[cfg(test)]
pub(crate) mod test_server;

use crate::backup::device::DeviceId;
use crate::backup::function_path;
use crate::backup::publish::record_store::BackupRecord;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use derive_more::{Deref, Display, From};
use function_name::named;
use reqwest::blocking::Response;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
use mockall::automock;

/// Content identifier returned by the content-addressed store
#[derive(Clone, Debug, Display, Deref, From, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl From<&str> for Cid {
    fn from(value: &str) -> Self {
        Cid(value.to_string())
    }
}

impl Cid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A content-addressed storage node
#[cfg_attr(test, automock)]
pub trait ContentStore {
    /// Uploads the file at `path`, pinned on the node, and returns its identifier.
    fn add(&self, path: &Path) -> Result<Cid>;

    /// Where uploads go, for logging.
    fn describe(&self) -> String;
}

/// A third-party pinning queue
#[cfg_attr(test, automock)]
pub trait PinningService {
    /// Asks the service to pin `cid`. Success means the request was queued.
    fn pin_by_hash(&self, cid: &Cid, name: &str) -> Result<()>;
}

/// A schema-typed remote store of backup records
#[cfg_attr(test, automock)]
pub trait RecordStore {
    /// Creates a new, empty store and returns its id.
    fn new_store(&self) -> Result<String>;

    /// Registers `schema` as model `name` in store `store_id`.
    fn register_schema(&self, store_id: &str, name: &str, schema: &serde_json::Value)
        -> Result<()>;

    /// Creates `record` as an instance of `model` and returns the new instance ids.
    fn create_record(&self, store_id: &str, model: &str, record: &BackupRecord)
        -> Result<Vec<String>>;
}

/// One publish step that runs after the content-store upload succeeded
pub enum FollowUp {
    Pin {
        service: Box<dyn PinningService>,
        name: String,
    },
    Record {
        store: Box<dyn RecordStore>,
        store_id: String,
        model: String,
    },
}

impl FollowUp {
    #[named]
    fn run(&self, cid: &Cid, device: &DeviceId) -> Result<()> {
        match self {
            FollowUp::Pin { service, name } => {
                tracing::info!("Sending CID {} to pinning service queue...", cid);
                service
                    .pin_by_hash(cid, name)
                    .add_fn_name(function_path!())?;
                tracing::info!("Successfully sent CID to pinning service queue.");
            }
            FollowUp::Record {
                store,
                store_id,
                model,
            } => {
                let record = BackupRecord::new(device, cid)?;
                tracing::info!("Recording backup in store {}...", store_id);
                let ids = store
                    .create_record(store_id, model, &record)
                    .add_fn_name(function_path!())?;
                tracing::info!("Recorded backup as {:?} in store {}.", ids, store_id);
            }
        }
        Ok(())
    }
}

/// Upload followed by an ordered list of follow-up steps
pub struct Publisher {
    content_store: Box<dyn ContentStore>,
    follow_ups: Vec<FollowUp>,
}

impl Publisher {
    pub fn new(content_store: Box<dyn ContentStore>, follow_ups: Vec<FollowUp>) -> Self {
        Self {
            content_store,
            follow_ups,
        }
    }

    /// Uploads `archive` exactly once, then runs each follow-up in order with the resulting CID.
    ///
    /// The first failing step aborts the rest.
    pub fn publish(&self, archive: &Path, device: &DeviceId) -> Result<Cid> {
        if !archive.is_file() {
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("archive {:?} does not exist", archive),
            )));
        }

        tracing::info!(
            "Pinning backup to content store {}...",
            self.content_store.describe()
        );
        let cid = self
            .content_store
            .add(archive)
            .add_msg(format!("Uploading {:?} failed", archive))?;
        tracing::info!("Successfully pinned backup to content store ({})", cid);

        for follow_up in &self.follow_ups {
            follow_up.run(&cid, device)?;
        }
        Ok(cid)
    }
}

/// Appends path segments to `base`, keeping whatever path prefix it already has.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::invalid_endpoint(base.as_str()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turns non-2xx responses into [`Error::UnexpectedResponse`] carrying the body.
pub(crate) fn ensure_success(url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(Error::unexpected_response(
        url.as_str(),
        status.to_string(),
        body,
    ))
}
