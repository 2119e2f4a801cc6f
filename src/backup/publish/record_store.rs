//! Backup records kept in a schema-typed document store.

use crate::backup::device::DeviceId;
use crate::backup::function_path;
use crate::backup::publish::{ensure_success, join_segments, Cid, RecordStore};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use getset::Getters;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use validator::Validate;

/// Model name backups are recorded under
pub static RECORD_MODEL_NAME: &str = "iOS Backup";

/// One record per successful backup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate, Getters)]
#[getset(get = "pub")]
pub struct BackupRecord {
    #[serde(rename = "deviceUUID")]
    #[validate(length(min = 1))]
    device_uuid: String,
    #[serde(rename = "backupCID")]
    #[validate(length(min = 1))]
    backup_cid: String,
}

impl BackupRecord {
    pub fn new(device: &DeviceId, cid: &Cid) -> Result<Self> {
        let record = BackupRecord {
            device_uuid: device.to_string(),
            backup_cid: cid.to_string(),
        };
        record
            .validate()
            .map_err(Error::from)
            .add_msg(format!("Invalid backup record {:?}", record))?;
        Ok(record)
    }
}

/// JSON schema registered for [`RECORD_MODEL_NAME`]
pub fn record_schema() -> &'static serde_json::Value {
    static SCHEMA: OnceLock<serde_json::Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        serde_json::json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": RECORD_MODEL_NAME,
            "type": "object",
            "properties": {
                "ID": { "type": "string" },
                "deviceUUID": { "type": "string" },
                "backupCID": { "type": "string" }
            },
            "required": ["deviceUUID", "backupCID"]
        })
    })
}

#[derive(Debug, Serialize)]
struct NewCollectionRequest<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct NewStoreResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    #[serde(default)]
    instance_ids: Vec<String>,
}

/// [`RecordStore`] speaking JSON over HTTP to a threads-style daemon
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct ThreadsHttpClient {
    #[getset(skip)]
    client: Client,
    base_url: Url,
}

impl ThreadsHttpClient {
    pub fn new(address: &str) -> Result<Self> {
        let base_url = match Url::parse(address) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
            _ => return Err(Error::invalid_endpoint(address)),
        };
        let client = Client::builder()
            .build()
            .map_err(Error::from)
            .add_msg("Failed to build HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn stores_url(&self) -> Result<Url> {
        join_segments(&self.base_url, &["stores"])
    }

    pub fn collections_url(&self, store_id: &str) -> Result<Url> {
        join_segments(&self.base_url, &["stores", store_id, "collections"])
    }

    pub fn instances_url(&self, store_id: &str, model: &str) -> Result<Url> {
        join_segments(
            &self.base_url,
            &["stores", store_id, "collections", model, "instances"],
        )
    }

    fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<reqwest::blocking::Response> {
        tracing::debug!("POST {}", url);
        self.client
            .post(url.clone())
            .json(body)
            .send()
            .map_err(Error::from)
            .and_then(|r| ensure_success(url, r))
    }
}

impl RecordStore for ThreadsHttpClient {
    #[named]
    fn new_store(&self) -> Result<String> {
        let url = self.stores_url()?;
        let response: NewStoreResponse = self
            .post_json(&url, &serde_json::json!({}))
            .and_then(|r| r.json().map_err(Error::from))
            .add_fn_name(function_path!())?;
        Ok(response.id)
    }

    #[named]
    fn register_schema(
        &self,
        store_id: &str,
        name: &str,
        schema: &serde_json::Value,
    ) -> Result<()> {
        let url = self.collections_url(store_id)?;
        self.post_json(&url, &NewCollectionRequest { name, schema })
            .add_msg(format!("Registering model {:?} failed", name))
            .add_fn_name(function_path!())?;
        Ok(())
    }

    #[named]
    fn create_record(
        &self,
        store_id: &str,
        model: &str,
        record: &BackupRecord,
    ) -> Result<Vec<String>> {
        let url = self.instances_url(store_id, model)?;
        let response: CreateResponse = self
            .post_json(&url, std::slice::from_ref(record))
            .and_then(|r| r.json().map_err(Error::from))
            .add_fn_name(function_path!())?;
        Ok(response.instance_ids)
    }
}
