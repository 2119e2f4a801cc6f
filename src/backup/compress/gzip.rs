use crate::backup::compress::CompressorBuilder;
use crate::backup::result_error::result::Result;
use bon::Builder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;
use validator::Validate;

/// Default compression level (same as `gzip -6`)
static DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Configuration for the gzip layer of the `.tgz` archive
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug, Builder, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GzipConfig {
    /// Compression level (0-9)
    ///
    /// - 0: no compression
    /// - 6: default
    /// - 9: smallest output
    #[validate(range(min = 0, max = 9))]
    pub level: Option<u32>,
}

impl GzipConfig {
    pub fn effective_level(&self) -> u32 {
        self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl<W: Write> CompressorBuilder<W> for GzipConfig {
    type Compressor = GzEncoder<W>;

    fn build_compressor(&self, writer: W) -> Result<GzEncoder<W>> {
        let level = self.effective_level();
        tracing::debug!("Creating gzip compressor with level={}", level);
        Ok(GzEncoder::new(writer, Compression::new(level)))
    }
}
