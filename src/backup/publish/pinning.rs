//! Pinata pinning service client.

use crate::backup::function_path;
use crate::backup::publish::{ensure_success, join_segments, Cid, PinningService};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub static DEFAULT_PINNING_BASE_URL: &str = "https://api.pinata.cloud";
/// Display name attached to every pin request
pub static PIN_NAME: &str = "My iOS Backup";

static API_KEY_HEADER: &str = "pinata_api_key";
static SECRET_API_KEY_HEADER: &str = "pinata_secret_api_key";

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PinByHashRequest<'a> {
    pub hash_to_pin: &'a str,
    pub pinata_metadata: PinataMetadata<'a>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PinataMetadata<'a> {
    pub name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinByHashResponse {
    id: Option<String>,
    status: Option<String>,
}

pub struct PinataClient {
    client: Client,
    base_url: Url,
    api_key: String,
    api_secret: RedactedString,
}

impl PinataClient {
    pub fn new(base_url: &str, api_key: &str, api_secret: RedactedString) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|_| Error::invalid_endpoint(base_url))
            .add_msg("Invalid pinning service url")?;
        let client = Client::builder()
            .build()
            .map_err(Error::from)
            .add_msg("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            api_secret,
        })
    }

    pub fn pin_by_hash_url(&self) -> Result<Url> {
        join_segments(&self.base_url, &["pinning", "pinByHash"])
    }
}

impl PinningService for PinataClient {
    #[named]
    fn pin_by_hash(&self, cid: &Cid, name: &str) -> Result<()> {
        let url = self.pin_by_hash_url()?;
        let body = PinByHashRequest {
            hash_to_pin: cid.as_str(),
            pinata_metadata: PinataMetadata { name },
        };
        tracing::debug!("POST {} {:?}", url, body);

        let response = self
            .client
            .post(url.clone())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header(SECRET_API_KEY_HEADER, self.api_secret.inner().as_str())
            .json(&body)
            .send()
            .map_err(Error::from)
            .and_then(|r| ensure_success(&url, r))
            .add_fn_name(function_path!())?;

        // The queue acknowledgement body is informational only.
        let ack: PinByHashResponse = response.json().unwrap_or_default();
        tracing::debug!("Pin request {:?} is {:?}", ack.id, ack.status);
        Ok(())
    }
}
