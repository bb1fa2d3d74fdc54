//! Line-prefixing output mirror

use std::io::{self, Write};

/// Prefix written at the start of every mirrored line
pub const DEFAULT_PREFIX: &str = "DOCKER: ";

/// Writer that prefixes every line written through it
#[derive(Debug)]
pub struct PrefixedWriter<W: Write> {
    inner: W,
    prefix: String,
    at_line_start: bool,
}

impl<W: Write> PrefixedWriter<W> {
    /// Wrap `inner` with the default `DOCKER: ` prefix
    pub fn new(inner: W) -> Self {
        Self::with_prefix(inner, DEFAULT_PREFIX)
    }

    /// Wrap `inner` with a custom prefix
    pub fn with_prefix(inner: W, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            at_line_start: true,
        }
    }

    /// Unwrap the inner writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for PrefixedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for line in buf.split_inclusive(|b| *b == b'\n') {
            if self.at_line_start {
                self.inner.write_all(self.prefix.as_bytes())?;
            }
            self.inner.write_all(line)?;
            self.at_line_start = line.ends_with(b"\n");
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
