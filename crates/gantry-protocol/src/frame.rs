//! Bounded JSONL frame reading.
//!
//! Both sides of the protocol read newline-terminated envelopes from a
//! blocking stream. The reader carries bytes received past the delimiter over
//! to the next call, so a peer that writes several envelopes in one burst
//! loses nothing. [`MAX_ENVELOPE_BYTES`] bounds any single line so a
//! misbehaving peer cannot grow the buffer without limit.

use std::io::{self, Read};

use crate::envelope::{EnvelopeError, MAX_ENVELOPE_BYTES};

/// Incremental envelope reader.
///
/// Keep one reader per stream for its whole lifetime; the internal buffer
/// holds whatever arrived beyond the last returned line.
#[derive(Debug, Default)]
pub struct EnvelopeReader {
    pending: Vec<u8>,
}

impl EnvelopeReader {
    /// Creates a reader with an empty carry buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the next envelope line from the stream.
    ///
    /// Returns `Ok(None)` once the peer disconnects and no buffered data
    /// remains. A partial line at EOF is returned as-is so the caller can
    /// report the malformed tail.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::TooLarge`] when a single line exceeds the
    /// envelope size limit, or [`EnvelopeError::Io`] when the underlying
    /// read fails.
    pub fn next_line<R: Read>(
        &mut self,
        stream: &mut R,
    ) -> Result<Option<Vec<u8>>, EnvelopeError> {
        loop {
            if let Some(newline_pos) = self.pending.iter().position(|byte| *byte == b'\n') {
                if newline_pos + 1 > MAX_ENVELOPE_BYTES {
                    return Err(EnvelopeError::too_large(newline_pos + 1));
                }
                let rest = self.pending.split_off(newline_pos + 1);
                let line = std::mem::replace(&mut self.pending, rest);
                return Ok(Some(line));
            }
            // Only an unterminated line counts against the limit; buffered
            // complete envelopes were already bounded individually.
            if self.pending.len() > MAX_ENVELOPE_BYTES {
                return Err(EnvelopeError::too_large(self.pending.len()));
            }

            let mut chunk = [0_u8; 1024];
            let bytes_read = read_with_retry(stream, &mut chunk)?;
            if bytes_read == 0 {
                return Ok(if self.pending.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.pending))
                });
            }
            self.pending.extend_from_slice(&chunk[..bytes_read]);
        }
    }
}

fn read_with_retry<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
