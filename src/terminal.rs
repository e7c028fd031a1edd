//! Line-oriented console over a [`DuplexStream`].
//!
//! Attaching a stream redirects console output to it and makes its input
//! available as lines.  Nothing attached behaves like [`NullStream`]
//! (writes vanish, no input).
//!
//! [`NullStream`]: crate::transport::NullStream

use core::fmt;

use log::{debug, info, warn};

use crate::transport::DuplexStream;

/// Longest line kept before the partial input is emitted as-is.
pub const MAX_LINE: usize = 1024;

const READ_CHUNK: usize = 64;

pub struct Terminal<S: DuplexStream> {
    stream: Option<S>,
    partial: Vec<u8>,
}

impl<S: DuplexStream> Default for Terminal<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DuplexStream> Terminal<S> {
    pub fn new() -> Self {
        Self {
            stream: None,
            partial: Vec::new(),
        }
    }

    /// Use `stream` as the console.  A previously attached stream is dropped.
    pub fn attach(&mut self, stream: S) {
        if self.stream.replace(stream).is_some() {
            debug!("terminal: replaced attached stream");
        }
        self.partial.clear();
        info!("terminal: stream attached");
    }

    /// Give the stream back; any half-received line is discarded.
    pub fn detach(&mut self) -> Option<S> {
        self.partial.clear();
        self.stream.take()
    }

    pub fn is_attached(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    pub fn stream_mut(&mut self) -> Option<&mut S> {
        self.stream.as_mut()
    }

    /// Returns the number of bytes the stream accepted (0 when detached).
    pub fn write_bytes(&mut self, data: &[u8]) -> usize {
        self.stream.as_mut().map_or(0, |s| s.write(data))
    }

    pub fn write_str(&mut self, s: &str) -> usize {
        self.write_bytes(s.as_bytes())
    }

    pub fn write_line(&mut self, s: &str) -> usize {
        self.write_str(s) + self.write_bytes(b"\r\n")
    }

    /// Pull everything readable and hand each complete line to `on_line`,
    /// without its `\n` and any `\r`.  Returns the number of lines yielded.
    ///
    /// Invalid UTF-8 is replaced; use [`Terminal::poll_bytes`] to keep the
    /// input as received.
    pub fn poll(&mut self, mut on_line: impl FnMut(&str)) -> usize {
        self.poll_bytes(|line, _| on_line(&String::from_utf8_lossy(line)))
    }

    /// Like [`Terminal::poll`], but yields raw bytes plus whether the piece
    /// ended at a newline.  A piece cut at [`MAX_LINE`] reports `false`; the
    /// rest of that line follows in later pieces.
    pub fn poll_bytes(&mut self, mut on_line: impl FnMut(&[u8], bool)) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };

        let mut lines = 0;
        let mut buf = [0u8; READ_CHUNK];
        while stream.poll_readable() {
            let Some(n) = stream.read_into(&mut buf) else {
                break;
            };
            for &b in &buf[..n] {
                match b {
                    b'\r' => {}
                    b'\n' => {
                        on_line(&self.partial, true);
                        self.partial.clear();
                        lines += 1;
                    }
                    _ => {
                        self.partial.push(b);
                        if self.partial.len() >= MAX_LINE {
                            warn!("terminal: line exceeds {} bytes, splitting", MAX_LINE);
                            on_line(&self.partial, false);
                            self.partial.clear();
                            lines += 1;
                        }
                    }
                }
            }
        }
        lines
    }

    /// Bytes of the line currently being assembled.
    pub fn pending_line(&self) -> &[u8] {
        &self.partial
    }
}

impl<S: DuplexStream> fmt::Write for Terminal<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Terminal::write_str(self, s);
        Ok(())
    }
}
