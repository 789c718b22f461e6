use std::{
    fs::File,
    io::{self, BufRead, BufReader, Stdin},
    path::Path,
};

use common::landmark::LandmarkFrame;
use tracing::trace;

use crate::ports::{LandmarkSource, SourceError};

/// Reads newline-delimited JSON frames, one [`LandmarkFrame`] per line.
/// Blank lines are frames without a hand.
pub struct JsonLinesLandmarkSource<R: BufRead + Send> {
    reader: R,
    buffer: String,
    line_number: usize,
}

impl<R: BufRead + Send> JsonLinesLandmarkSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            line_number: 0,
        }
    }
}

impl JsonLinesLandmarkSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl JsonLinesLandmarkSource<BufReader<File>> {
    /// Replay a recorded detector session.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead + Send> LandmarkSource for JsonLinesLandmarkSource<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        self.buffer.clear();
        let bytes_read = self
            .reader
            .read_line(&mut self.buffer)
            .map_err(SourceError::FailedToRead)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let line = self.buffer.trim();
        if line.is_empty() {
            trace!("Blank line {}. No hand.", self.line_number);
            return Ok(Some(LandmarkFrame::default()));
        }

        serde_json::from_str(line)
            .map(Some)
            .map_err(|source| SourceError::Malformed {
                line: self.line_number,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn source(text: &str) -> JsonLinesLandmarkSource<Cursor<Vec<u8>>> {
        JsonLinesLandmarkSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_reads_frames_until_exhausted() {
        let mut source = source(
            "{\"hands\":[{\"landmarks\":[{\"x\":0.5,\"y\":0.5,\"z\":0.0}],\"score\":0.9}]}\n\n{}\n",
        );

        let frame = source
            .next_frame()
            .expect("Failed to read frame")
            .expect("Expected a frame");
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].score, Some(0.9));

        let blank = source
            .next_frame()
            .expect("Failed to read frame")
            .expect("Expected a frame");
        assert!(blank.hands.is_empty());

        let empty = source
            .next_frame()
            .expect("Failed to read frame")
            .expect("Expected a frame");
        assert!(empty.hands.is_empty());

        assert!(source.next_frame().expect("Failed to read").is_none());
    }

    #[test]
    fn test_reports_malformed_line_number() {
        let mut source = source("{}\nnot a frame\n{}");
        assert!(source.next_frame().is_ok());
        match source.next_frame() {
            Err(SourceError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected malformed frame, got {:?}", other),
        }
        // Later lines are still readable.
        assert!(matches!(source.next_frame(), Ok(Some(_))));
    }
}
