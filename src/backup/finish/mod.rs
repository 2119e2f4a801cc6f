use flate2::write::GzEncoder;
use std::io::{Error, Write};

/// Writers that need an explicit trailer write before the inner writer is usable again
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write> Finish<W> for GzEncoder<W> {
    fn finish(self) -> Result<W, Error> {
        GzEncoder::finish(self)
    }
}
