//! IPFS HTTP API client for the content-store step.

use crate::backup::function_path;
use crate::backup::publish::{ensure_success, join_segments, Cid, ContentStore};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use getset::Getters;
use reqwest::blocking::{multipart, Client};
use reqwest::Url;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parses a content-store endpoint
///
/// Accepts a plain `http(s)://host:port[/prefix]` URL or a multiaddr such as
/// `/ip4/127.0.0.1/tcp/5001`, `/dns4/ipfs.local/tcp/443/https`.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.starts_with('/') {
        return multiaddr_to_url(endpoint);
    }
    match Url::parse(endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(url),
        _ => Err(Error::invalid_endpoint(endpoint)),
    }
}

fn multiaddr_to_url(addr: &str) -> Result<Url> {
    let parts: Vec<&str> = addr.trim_end_matches('/').split('/').skip(1).collect();
    let (proto, host, port, scheme) = match parts.as_slice() {
        [proto, host, "tcp", port] => (*proto, *host, *port, "http"),
        [proto, host, "tcp", port, scheme @ ("http" | "https")] => (*proto, *host, *port, *scheme),
        _ => return Err(Error::invalid_endpoint(addr)),
    };
    if port.parse::<u16>().is_err() {
        return Err(Error::invalid_endpoint(addr));
    }
    let host = match proto {
        "ip4" | "dns" | "dns4" | "dns6" => host.to_string(),
        "ip6" => format!("[{host}]"),
        _ => return Err(Error::invalid_endpoint(addr)),
    };
    Url::parse(&format!("{scheme}://{host}:{port}/")).map_err(|_| Error::invalid_endpoint(addr))
}

/// One line of the `/api/v0/add` response stream
///
/// Progress lines carry `Bytes`, result lines carry `Hash`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddEvent {
    name: Option<String>,
    hash: Option<String>,
    bytes: Option<u64>,
}

/// Returns the CID of the first result event and leaves the rest of the stream unread.
pub fn first_added_cid<R: BufRead>(reader: R, source: &str) -> Result<Cid> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: AddEvent = serde_json::from_str(&line)?;
        match event.hash {
            Some(hash) => {
                tracing::debug!("Added {:?} as {}", event.name, hash);
                return Ok(Cid::from(hash));
            }
            None => tracing::trace!("Upload progress: {:?} bytes", event.bytes),
        }
    }
    Err(Error::no_upload_result(source))
}

/// [`ContentStore`] talking to a node's HTTP RPC API
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct IpfsHttpClient {
    #[getset(skip)]
    client: Client,
    base_url: Url,
}

impl IpfsHttpClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let base_url = parse_endpoint(endpoint)?;
        let client = Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(Error::from)
            .add_msg("Failed to build HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn add_url(&self) -> Result<Url> {
        let mut url = join_segments(&self.base_url, &["api", "v0", "add"])?;
        url.query_pairs_mut().append_pair("pin", "true");
        Ok(url)
    }
}

impl ContentStore for IpfsHttpClient {
    #[named]
    fn add(&self, path: &Path) -> Result<Cid> {
        let url = self.add_url()?;
        let form = multipart::Form::new()
            .file("file", path)
            .map_err(Error::from)
            .add_msg(format!("Failed to open {:?}", path))?;

        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .map_err(Error::from)
            .and_then(|r| ensure_success(&url, r))
            .add_fn_name(function_path!())?;

        first_added_cid(BufReader::new(response), url.as_str()).add_fn_name(function_path!())
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}
