use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::libs::error::{PangeneError, Result};

/// Open a (possibly gzipped) input for buffered reading.
/// `"stdin"` reads from standard input.
pub fn reader(input: &str) -> Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = Path::new(input);
        let file = std::fs::File::open(path).map_err(PangeneError::Io)?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

/// Open an output for buffered writing. `"stdout"` writes to standard output.
pub fn writer(output: &str) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        Box::new(BufWriter::new(
            std::fs::File::create(output).map_err(PangeneError::Io)?,
        ))
    };

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plain_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.txt");

        {
            let mut w = writer(path.to_str().unwrap()).unwrap();
            writeln!(w, "hello").unwrap();
        }
        let r = reader(path.to_str().unwrap()).unwrap();
        let lines: Vec<_> = r.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["hello"]);
    }

    #[test]
    fn gz_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.txt.gz");

        {
            let file = std::fs::File::create(&path).unwrap();
            let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            writeln!(enc, ">s1").unwrap();
            enc.finish().unwrap();
        }
        let r = reader(path.to_str().unwrap()).unwrap();
        let lines: Vec<_> = r.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec![">s1"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(reader("no/such/file.txt").is_err());
    }
}
