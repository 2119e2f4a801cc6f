//! Validation functions for configuration values.
//!
//! Used through `#[validate(custom(function = ...))]` on config structs.

use reqwest::Url;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::Path;

/// A device id names both the backup directory and the archive, so it has to
/// be a single, sanitized path component.
pub fn validate_device_id<S: AsRef<str>>(id: S) -> Result<(), ValidationError> {
    let id = id.as_ref();
    if id.trim().is_empty() {
        return Err(ValidationError::new("InvalidDeviceId")
            .with_message("device id must not be empty".into()));
    }

    if id == "." || id == ".." || !is_sanitized(id) {
        return Err(ValidationError::new("InvalidDeviceId").with_message(
            format!("Invalid device id, try sanitizing like {:?}", sanitize(id)).into(),
        ));
    }

    Ok(())
}

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

pub fn validate_http_url<S: AsRef<str>>(url: S) -> Result<(), ValidationError> {
    let url = url.as_ref();
    match Url::parse(url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
        _ => Err(ValidationError::new("InvalidUrl")
            .with_message(format!("{url:?} is not an http(s) url").into())),
    }
}
