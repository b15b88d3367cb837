// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical-line reassembly over a blocking byte stream.

use std::io::{self, Read};

const BUF_SIZE: usize = 4096;

/// Reads newline-delimited logical lines from a byte stream, concatenating
/// continuation fragments whenever a line exceeds the internal buffer.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, BUF_SIZE)
    }

    /// The buffer size is observable only as the continuation threshold;
    /// tests shrink it to exercise reassembly.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self { inner, buf: vec![0; capacity], start: 0, end: 0 }
    }

    /// Next logical line without its terminator, or `None` at end of stream.
    ///
    /// A final unterminated fragment is returned as a line of its own.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line: Vec<u8> = Vec::new();
        loop {
            if self.start == self.end {
                self.start = 0;
                self.end = match self.inner.read(&mut self.buf) {
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if self.end == 0 {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(finish(line)));
                }
            }

            let chunk = &self.buf[self.start..self.end];
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&chunk[..pos]);
                    self.start += pos + 1;
                    return Ok(Some(finish(line)));
                }
                None => {
                    line.extend_from_slice(chunk);
                    self.start = self.end;
                }
            }
        }
    }
}

/// PTY output is CRLF-terminated; drop the carriage return as well.
fn finish(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

#[cfg(test)]
#[path = "lines_tests.rs"]
mod tests;
