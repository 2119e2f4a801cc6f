pub mod gzip;

use crate::backup::result_error::result::Result;
use std::io::Write;

pub use gzip::GzipConfig;

pub trait CompressorBuilder<W: Write> {
    type Compressor: Write;

    fn build_compressor(&self, writer: W) -> Result<Self::Compressor>;
}
