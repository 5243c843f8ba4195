//-
// Copyright (c) 2025, Ketch Developers
//
// This file is part of Ketch.
//
// Ketch is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Ketch is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Ketch. If not, see <http://www.gnu.org/licenses/>.

//! Buffered access to one CRLF-terminated line at a time.
//!
//! The IMAP grammar is line-oriented, but literals are byte-counted and may
//! span any number of underlying lines. The reader therefore exposes two
//! advance operations: [`LineReader::advance`], which refuses to step past
//! the end of the current line, and [`LineReader::advance_all`], which
//! transparently fetches the next line and is used only while consuming
//! literal payloads.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::support::error::Error;

const MAX_LINE: usize = 65536;

pub struct LineReader<R> {
    io: BufReader<R>,
    /// The current line, including its terminator.
    line: Vec<u8>,
    pos: usize,
    /// Start position of the token most recently begun via `mark_token`.
    token_start: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(io: R) -> Self {
        LineReader {
            io: BufReader::new(io),
            line: Vec::new(),
            pos: 0,
            token_start: 0,
        }
    }

    /// The underlying buffered stream, for writing responses.
    pub fn io(&mut self) -> &mut BufReader<R> {
        &mut self.io
    }

    /// Replace the underlying stream, dropping any buffered input. Used for
    /// the STARTTLS swap.
    pub fn replace_io(&mut self, io: R) -> R {
        self.line.clear();
        self.pos = 0;
        self.token_start = 0;
        std::mem::replace(&mut self.io, BufReader::new(io)).into_inner()
    }

    /// Discard the rest of the current line and read the next one.
    ///
    /// LF-only line endings are tolerated. EOF before any byte arrives
    /// surfaces as [`Error::Disconnected`]; EOF in the middle of a line is a
    /// parse error.
    pub async fn next_line(&mut self) -> Result<(), Error> {
        self.line.clear();
        self.pos = 0;
        self.token_start = 0;

        let nread = (&mut self.io)
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut self.line)
            .await?;
        if nread == 0 {
            return Err(Error::Disconnected);
        }
        if !self.line.ends_with(b"\n") {
            return Err(Error::parse(if nread == MAX_LINE {
                "Command line too long"
            } else {
                "EOF in the middle of a line"
            }));
        }

        Ok(())
    }

    /// The byte under the cursor.
    pub fn current(&self) -> u8 {
        self.line.get(self.pos).copied().unwrap_or(0)
    }

    /// Whether the cursor sits on the line terminator.
    pub fn at_eol(&self) -> bool {
        matches!(self.current(), b'\r' | b'\n')
    }

    /// Step one byte forward within the current line.
    ///
    /// Stepping past the terminator means a line-bounded token was not
    /// closed before the end of the line, which is a parse error.
    pub fn advance(&mut self) -> Result<(), Error> {
        if self.pos + 1 >= self.line.len() {
            return Err(Error::parse("Unexpected end of line"));
        }
        self.pos += 1;
        Ok(())
    }

    /// Step one byte forward, fetching the next underlying line when the
    /// current one is exhausted. Only valid while consuming a literal.
    pub async fn advance_all(&mut self) -> Result<(), Error> {
        self.pos += 1;
        if self.pos >= self.line.len() {
            self.next_line().await?;
        }
        Ok(())
    }

    /// Step one byte backward.
    pub fn rewind(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    /// Record the current position as the start of a token.
    pub fn mark_token(&mut self) {
        self.token_start = self.pos;
    }

    /// Restore the cursor to the most recent token start.
    pub fn rewind_token(&mut self) {
        self.pos = self.token_start;
    }
}
