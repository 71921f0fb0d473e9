//! Common functionality.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};
use tracing::trace;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn Read>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        trace!("Opening {:?} as gzip for reading", path.as_ref());
        let file = File::open(path)?;
        let bufreader = BufReader::new(file);
        let decoder = MultiGzDecoder::new(bufreader);
        Ok(Box::new(decoder))
    } else {
        trace!("Opening {:?} as plain text for reading", path.as_ref());
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Transparently open a file with gzip encoder.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        trace!("Opening {:?} as gzip for writing", path.as_ref());
        let file = File::create(path)?;
        let bufwriter = BufWriter::new(file);
        let encoder = GzEncoder::new(bufwriter, Compression::default());
        Ok(Box::new(encoder))
    } else {
        trace!("Opening {:?} as plain text for writing", path.as_ref());
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Return the version of the `plastid-ir-worker` crate and `x.y.z` in tests.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use pretty_assertions::assert_eq;

    #[test]
    fn open_read_maybe_gz_plain() -> Result<(), anyhow::Error> {
        let mut reader = super::open_read_maybe_gz("tests/common/payload.txt")?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        assert_eq!(buf, "This is some payload.\n");

        Ok(())
    }

    #[test]
    fn open_read_maybe_gz_gzip() -> Result<(), anyhow::Error> {
        let mut reader = super::open_read_maybe_gz("tests/common/payload.txt.gz")?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        assert_eq!(buf, "This is some payload.\n");

        Ok(())
    }

    #[test]
    fn open_write_maybe_gz_roundtrip() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("payload.txt.gz");

        {
            let mut writer = super::open_write_maybe_gz(&path)?;
            writer.write_all(b"This is some payload.\n")?;
        }

        let mut reader = super::open_read_maybe_gz(&path)?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        assert_eq!(buf, "This is some payload.\n");

        Ok(())
    }

    #[test]
    fn worker_version_in_tests() {
        assert_eq!(super::worker_version(), "x.y.z");
    }
}
