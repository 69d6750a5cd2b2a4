//! Session framing
//!
//! Turns the byte stream of one connection into message payloads.
//!
//! - `Framing::Line` splits on `\n` and reassembles lines that arrive across
//!   several reads; an unterminated tail at end of stream is still delivered.
//! - `Framing::Read` treats every successful read as one message, so TCP
//!   segmentation decides where messages start and end.
//!
//! In both modes one trailing line terminator (`\n` or `\r\n`) is removed.
//! A line longer than `max_line_bytes` ends the session with a fatal fault,
//! so a peer that never sends `\n` cannot grow the buffer without bound.
//! Read errors come back as a `ReadFault` that says whether retrying makes
//! sense.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};

use thiserror::Error;

use crate::config::Framing;

/// What the next read produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Message(Vec<u8>),
    /// The peer closed the connection.
    Closed,
}

#[derive(Debug, Error)]
pub enum ReadFault {
    /// Interrupted or temporarily unavailable; read again.
    #[error("transient read error: {0}")]
    Retryable(#[source] io::Error),
    /// Ends the session.
    #[error("read failed: {0}")]
    Fatal(#[source] io::Error),
}

impl ReadFault {
    pub fn classify(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                Self::Retryable(err)
            }
            _ => Self::Fatal(err),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Removes one trailing `\n` or `\r\n`.
pub fn trim_line_terminator(bytes: &[u8]) -> &[u8] {
    if let Some(rest) = bytes.strip_suffix(b"\r\n") {
        rest
    } else if let Some(rest) = bytes.strip_suffix(b"\n") {
        rest
    } else {
        bytes
    }
}

/// Line length limit used when none is configured.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

pub struct FrameReader<R> {
    inner: R,
    framing: Framing,
    buf: Vec<u8>,
    partial: Vec<u8>,
    ready: VecDeque<Vec<u8>>,
    max_line: usize,
    overflow: bool,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, framing: Framing, buffer_size: usize) -> Self {
        Self {
            inner,
            framing,
            buf: vec![0; buffer_size.max(1)],
            partial: Vec::new(),
            ready: VecDeque::new(),
            max_line: DEFAULT_MAX_LINE_BYTES,
            overflow: false,
            eof: false,
        }
    }

    /// Sets the longest line `Framing::Line` accepts, terminator excluded.
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line = max.max(1);
        self
    }

    pub fn next_frame(&mut self) -> Result<Frame, ReadFault> {
        match self.framing {
            Framing::Read => self.next_read(),
            Framing::Line => self.next_line(),
        }
    }

    fn read_chunk(&mut self) -> Result<usize, ReadFault> {
        self.inner.read(&mut self.buf).map_err(ReadFault::classify)
    }

    fn next_read(&mut self) -> Result<Frame, ReadFault> {
        let n = self.read_chunk()?;
        if n == 0 {
            return Ok(Frame::Closed);
        }
        Ok(Frame::Message(trim_line_terminator(&self.buf[..n]).to_vec()))
    }

    fn next_line(&mut self) -> Result<Frame, ReadFault> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Frame::Message(line));
            }
            if self.overflow {
                return Err(ReadFault::Fatal(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("line exceeds {} bytes", self.max_line),
                )));
            }
            if self.eof {
                if self.partial.is_empty() {
                    return Ok(Frame::Closed);
                }
                let tail = std::mem::take(&mut self.partial);
                return Ok(Frame::Message(trim_line_terminator(&tail).to_vec()));
            }

            let n = self.read_chunk()?;
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.split_lines(n);
        }
    }

    /// Appends the last `n` bytes read to the pending line and moves every
    /// completed line to `ready`. Only the new bytes are scanned.
    fn split_lines(&mut self, n: usize) {
        let mut scan_from = self.partial.len();
        self.partial.extend_from_slice(&self.buf[..n]);

        let mut line_start = 0;
        while let Some(offset) = self.partial[scan_from..].iter().position(|&b| b == b'\n') {
            let end = scan_from + offset + 1;
            let line = trim_line_terminator(&self.partial[line_start..end]);
            if line.len() > self.max_line {
                self.overflow = true;
                break;
            }
            self.ready.push_back(line.to_vec());
            line_start = end;
            scan_from = end;
        }
        self.partial.drain(..line_start);

        // a trailing '\r' may still become part of "\r\n"
        let pending = self.partial.strip_suffix(b"\r").unwrap_or(&self.partial[..]);
        if pending.len() > self.max_line {
            self.overflow = true;
        }
    }
}
