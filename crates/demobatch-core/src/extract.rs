//! Gzip decompression of compressed captures.

use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Decompress `compressed` into `output`, replacing any existing file.
///
/// Returns the number of bytes written. A failure part-way through may leave a
/// truncated `output` behind; callers decide what to do with it.
pub fn gunzip(compressed: &Path, output: &Path) -> Result<u64> {
    let wrap = |source: io::Error| Error::Extraction {
        path: compressed.to_path_buf(),
        source,
    };

    let input = File::open(compressed).map_err(wrap)?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(File::create(output).map_err(wrap)?);

    let written = io::copy(&mut decoder, &mut writer).map_err(wrap)?;
    writer.flush().map_err(wrap)?;

    debug!("Decompressed {:?} -> {:?} ({} bytes)", compressed, output, written);
    Ok(written)
}
