//! Splits a feed stream into logical lines without loading it into memory.
//!
//! The feed is one large JSON-like object:
//!
//! ```text
//! {"Filmliste":[<metadata>],"Filmliste":[<column names>],"X":[<row>],"X":[<row>]}
//! ```
//!
//! Logical lines are separated by `{"Filmliste":` (only at the very start of
//! the stream) and `,"X":`. A `}` closing the stream ends the last row and is
//! followed by an empty terminal line; without it, whatever remains at the
//! end of the stream is the terminal line.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::ParseError;

const HEADER_SEPARATOR: &[u8] = b"{\"Filmliste\":";
const ROW_SEPARATOR: &[u8] = b",\"X\":";
const CHUNK_SIZE: usize = 64 * 1024;

/// One logical line of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLine {
    /// A line followed by a separator.
    Line(String),
    /// The last line of the stream.
    Terminal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Header,
    Rows,
    Terminal,
    Finished,
}

/// Streaming splitter over an async byte source.
pub struct FeedReader<R> {
    source: R,
    chunk: Vec<u8>,
    buffer: Vec<u8>,
    /// Start of the unconsumed part of `buffer`.
    start: usize,
    /// Position in `buffer` up to which no separator was found.
    scanned: usize,
    bytes_read: u64,
    eof: bool,
    state: ReaderState,
}

impl<R: AsyncRead + Unpin> FeedReader<R> {
    /// Wrap a byte source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            chunk: vec![0u8; CHUNK_SIZE],
            buffer: Vec::with_capacity(CHUNK_SIZE),
            start: 0,
            scanned: 0,
            bytes_read: 0,
            eof: false,
            state: ReaderState::Header,
        }
    }

    /// Bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Next logical line, `None` after the terminal line.
    pub async fn next_line(&mut self) -> Result<Option<FeedLine>, ParseError> {
        loop {
            match self.state {
                ReaderState::Finished => return Ok(None),
                ReaderState::Terminal => {
                    self.state = ReaderState::Finished;
                    return Ok(Some(FeedLine::Terminal(String::new())));
                }
                ReaderState::Header => {
                    if self.pending().len() >= HEADER_SEPARATOR.len() || self.eof {
                        self.state = ReaderState::Rows;
                        if self.pending().starts_with(HEADER_SEPARATOR) {
                            self.start += HEADER_SEPARATOR.len();
                            self.scanned = self.start;
                            return Ok(Some(FeedLine::Line(String::new())));
                        }
                        continue;
                    }
                }
                ReaderState::Rows => {
                    if let Some(line) = self.split_row()? {
                        return Ok(Some(FeedLine::Line(line)));
                    }
                    if self.eof {
                        return self.finish().map(Some);
                    }
                }
            }

            self.fill().await?;
        }
    }

    fn pending(&self) -> &[u8] {
        &self.buffer[self.start..]
    }

    fn split_row(&mut self) -> Result<Option<String>, ParseError> {
        let position = self.buffer[self.scanned..]
            .windows(ROW_SEPARATOR.len())
            .position(|window| window == ROW_SEPARATOR);

        match position {
            Some(offset) => {
                let end = self.scanned + offset;
                let line = self.buffer[self.start..end].to_vec();
                self.start = end + ROW_SEPARATOR.len();
                self.scanned = self.start;
                decode(line).map(Some)
            }
            None => {
                // A separator may straddle the next chunk.
                self.scanned = self
                    .start
                    .max(self.buffer.len().saturating_sub(ROW_SEPARATOR.len() - 1));
                Ok(None)
            }
        }
    }

    fn finish(&mut self) -> Result<FeedLine, ParseError> {
        let mut rest = self.buffer.split_off(self.start);
        self.buffer.clear();
        self.start = 0;
        self.scanned = 0;
        let content_len = rest
            .iter()
            .rposition(|byte| !byte.is_ascii_whitespace())
            .map_or(0, |position| position + 1);

        if content_len > 0 && rest[content_len - 1] == b'}' {
            rest.truncate(content_len - 1);
            self.state = ReaderState::Terminal;
            return decode(rest).map(FeedLine::Line);
        }

        self.state = ReaderState::Finished;
        decode(rest).map(FeedLine::Terminal)
    }

    async fn fill(&mut self) -> Result<(), ParseError> {
        let read = self.source.read(&mut self.chunk).await?;

        if read == 0 {
            self.eof = true;
        } else {
            self.compact();
            self.bytes_read += read as u64;
            self.buffer.extend_from_slice(&self.chunk[..read]);
        }

        Ok(())
    }

    /// Drop consumed bytes, once per refill.
    fn compact(&mut self) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
    }
}

fn decode(bytes: Vec<u8>) -> Result<String, ParseError> {
    String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}
