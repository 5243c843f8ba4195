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

//! Token recognisers over the IMAP lexical grammar.
//!
//! Every recogniser returns `Ok(None)` (or `Ok(false)`) with the cursor
//! restored when the input is not that token, and advances the cursor only
//! on success. Hard violations of the grammar (bad literal count, CR inside
//! a quoted string, end of line inside a token) are `Error::Parse`, which is
//! fatal to the connection.

use tokio::io::AsyncRead;

use super::line_reader::LineReader;
use crate::support::error::Error;

/// Characters that terminate an astring atom. `]` is permitted (it is a
/// resp-special, legal in astrings).
const ASTRING_EXCEPTIONS: &[u8] = b" ()%*\\{";
/// Tags additionally exclude `+` (it would collide with continuation
/// requests when the tag is echoed).
const TAG_EXCEPTIONS: &[u8] = b" ()%*\\{+";
/// list-mailbox patterns permit the wildcards but not `]`.
const LIST_MAILBOX_EXCEPTIONS: &[u8] = b" ()]\\{";

/// FETCH macros standing for fixed attachment lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMacro {
    All,
    Full,
    Fast,
}

/// The closed keyword set of FETCH attachments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchAttKind {
    Envelope,
    Flags,
    InternalDate,
    Rfc822Header,
    Rfc822Size,
    Rfc822Text,
    Body,
    BodyPeek,
    BodyStructure,
    Uid,
}

/// Part specifiers inside a BODY[] section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartSpecifier {
    #[default]
    None,
    Header,
    HeaderFields,
    HeaderFieldsNot,
    Text,
    Mime,
}

pub struct Lexer<R> {
    rd: LineReader<R>,
}

impl<R: AsyncRead + Unpin> Lexer<R> {
    pub fn new(rd: LineReader<R>) -> Self {
        Lexer { rd }
    }

    pub fn reader(&mut self) -> &mut LineReader<R> {
        &mut self.rd
    }

    /// Advance to the next underlying line, discarding the rest of the
    /// current one. Mandatory before the first token of any command.
    pub async fn new_line(&mut self) -> Result<(), Error> {
        self.rd.next_line().await
    }

    pub fn at_eol(&self) -> bool {
        self.rd.at_eol()
    }

    pub fn current(&self) -> u8 {
        self.rd.current()
    }

    /// Consume a run of spaces.
    pub fn skip_space(&mut self) -> Result<(), Error> {
        while self.rd.current() == b' ' {
            self.rd.advance()?;
        }
        Ok(())
    }

    /// Restore the cursor to the most recent token start.
    pub fn push_back_token(&mut self) {
        self.rd.rewind_token();
    }

    /// Step the cursor one byte backward.
    pub fn push_back(&mut self) {
        self.rd.rewind();
    }

    /// astring = quoted | literal | 1*ASTRING-CHAR
    pub async fn astring(&mut self) -> Result<Option<String>, Error> {
        self.string_like(ASTRING_EXCEPTIONS).await
    }

    /// A mailbox pattern: like an astring but the wildcards `%` and `*` are
    /// ordinary characters and `]` is not.
    pub async fn list_mailbox(&mut self) -> Result<Option<String>, Error> {
        self.string_like(LIST_MAILBOX_EXCEPTIONS).await
    }

    /// A command tag. Never quoted, never a literal.
    pub fn tag(&mut self) -> Result<Option<String>, Error> {
        self.skip_space()?;
        self.atom(TAG_EXCEPTIONS)
    }

    async fn string_like(
        &mut self,
        exceptions: &[u8],
    ) -> Result<Option<String>, Error> {
        self.skip_space()?;
        match self.rd.current() {
            b'"' => {
                self.rd.advance()?;
                self.qstring().map(Some)
            }
            b'{' => {
                self.rd.advance()?;
                self.literal().await.map(Some)
            }
            _ => self.atom(exceptions),
        }
    }

    /// One or more printable ASCII bytes outside the exception set.
    fn atom(&mut self, exceptions: &[u8]) -> Result<Option<String>, Error> {
        self.rd.mark_token();
        let mut buffer = Vec::with_capacity(16);
        loop {
            let c = self.rd.current();
            if c > b' ' && c < 0x7f && !exceptions.contains(&c) {
                buffer.push(c);
                self.rd.advance()?;
            } else {
                break;
            }
        }

        if buffer.is_empty() {
            self.rd.rewind_token();
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
        }
    }

    /// The remainder of a quoted string, the opening quote already consumed.
    /// `\` escapes the next byte. The string must close before end of line.
    fn qstring(&mut self) -> Result<String, Error> {
        let mut buffer = Vec::with_capacity(16);
        loop {
            match self.rd.current() {
                b'"' => break,
                c @ (b'\r' | b'\n') => {
                    return Err(Error::Parse(format!(
                        "Unexpected character {:?} in quoted string",
                        c as char
                    )));
                }
                b'\\' => {
                    self.rd.advance()?;
                    buffer.push(self.rd.current());
                }
                c => buffer.push(c),
            }
            self.rd.advance()?;
        }

        // The closing quote
        self.rd.advance()?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// The remainder of a `{n}CRLF<octets>` literal, the opening curly
    /// already consumed. The payload is byte-counted and may span any number
    /// of underlying lines.
    async fn literal(&mut self) -> Result<String, Error> {
        let mut digits = Vec::with_capacity(8);
        while self.rd.current() != b'}' {
            let c = self.rd.current();
            if !c.is_ascii_digit() {
                return Err(Error::Parse(format!(
                    "Unexpected character {:?} in literal length",
                    c as char
                )));
            }
            digits.push(c);
            self.rd.advance()?;
        }

        let length: u32 = std::str::from_utf8(&digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::parse("Invalid literal length"))?;

        // The payload starts on the next underlying line
        self.rd.next_line().await?;

        let mut buffer = Vec::with_capacity(length.min(8192) as usize);
        for _ in 0..length {
            buffer.push(self.rd.current());
            self.rd.advance_all().await?;
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// An unsigned integer. Overflow and explicit signs are parse errors.
    pub fn number(&mut self) -> Result<Option<u32>, Error> {
        self.skip_space()?;
        self.rd.mark_token();

        let negative = self.rd.current() == b'-';
        if negative {
            self.rd.advance()?;
        }

        let mut digits = Vec::with_capacity(10);
        while self.rd.current().is_ascii_digit() {
            digits.push(self.rd.current());
            self.rd.advance()?;
        }

        if digits.is_empty() {
            self.rd.rewind_token();
            return Ok(None);
        }
        if negative {
            return Err(Error::parse("Unexpected negative integer"));
        }

        std::str::from_utf8(&digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Some)
            .ok_or_else(|| Error::parse("Integer overflow"))
    }

    /// A non-zero unsigned integer. Zero is rejected with the cursor
    /// restored, so the caller can try an alternative production.
    pub fn non_zero_number(&mut self) -> Result<Option<u32>, Error> {
        match self.number()? {
            Some(0) => {
                self.rd.rewind_token();
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn single(&mut self, target: u8) -> Result<bool, Error> {
        if self.rd.current() == target {
            self.rd.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn sequence_range_separator(&mut self) -> Result<bool, Error> {
        self.single(b':')
    }

    pub fn sequence_delimiter(&mut self) -> Result<bool, Error> {
        self.single(b',')
    }

    pub fn sequence_wildcard(&mut self) -> Result<bool, Error> {
        self.single(b'*')
    }

    pub fn left_paren(&mut self) -> Result<bool, Error> {
        self.single(b'(')
    }

    pub fn right_paren(&mut self) -> Result<bool, Error> {
        self.single(b')')
    }

    pub fn left_bracket(&mut self) -> Result<bool, Error> {
        self.single(b'[')
    }

    pub fn right_bracket(&mut self) -> Result<bool, Error> {
        self.single(b']')
    }

    pub fn less_than(&mut self) -> Result<bool, Error> {
        self.single(b'<')
    }

    pub fn greater_than(&mut self) -> Result<bool, Error> {
        self.single(b'>')
    }

    pub fn dot(&mut self) -> Result<bool, Error> {
        self.single(b'.')
    }

    /// A keyword atom: letters, digits, and dots, uppercased.
    fn keyword(&mut self) -> Result<Option<String>, Error> {
        self.skip_space()?;
        self.rd.mark_token();
        let mut buffer = Vec::with_capacity(16);
        loop {
            let c = self.rd.current();
            if c.is_ascii_alphanumeric() || c == b'.' {
                buffer.push(c.to_ascii_uppercase());
                self.rd.advance()?;
            } else {
                break;
            }
        }

        if buffer.is_empty() {
            self.rd.rewind_token();
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
        }
    }

    pub fn fetch_macro(&mut self) -> Result<Option<FetchMacro>, Error> {
        let keyword = match self.keyword()? {
            Some(k) => k,
            None => return Ok(None),
        };
        let result = match keyword.as_str() {
            "ALL" => Some(FetchMacro::All),
            "FULL" => Some(FetchMacro::Full),
            "FAST" => Some(FetchMacro::Fast),
            _ => None,
        };
        if result.is_none() {
            self.rd.rewind_token();
        }
        Ok(result)
    }

    pub fn fetch_att_keyword(&mut self) -> Result<Option<FetchAttKind>, Error> {
        let keyword = match self.keyword()? {
            Some(k) => k,
            None => return Ok(None),
        };
        let result = match keyword.as_str() {
            "ENVELOPE" => Some(FetchAttKind::Envelope),
            "FLAGS" => Some(FetchAttKind::Flags),
            "INTERNALDATE" => Some(FetchAttKind::InternalDate),
            "RFC822.HEADER" => Some(FetchAttKind::Rfc822Header),
            "RFC822.SIZE" => Some(FetchAttKind::Rfc822Size),
            "RFC822.TEXT" => Some(FetchAttKind::Rfc822Text),
            "BODY" => Some(FetchAttKind::Body),
            "BODY.PEEK" => Some(FetchAttKind::BodyPeek),
            "BODYSTRUCTURE" => Some(FetchAttKind::BodyStructure),
            "UID" => Some(FetchAttKind::Uid),
            _ => None,
        };
        if result.is_none() {
            self.rd.rewind_token();
        }
        Ok(result)
    }

    pub fn part_specifier(&mut self) -> Result<Option<PartSpecifier>, Error> {
        let keyword = match self.keyword()? {
            Some(k) => k,
            None => return Ok(None),
        };
        let result = match keyword.as_str() {
            "HEADER" => Some(PartSpecifier::Header),
            "HEADER.FIELDS" => Some(PartSpecifier::HeaderFields),
            "HEADER.FIELDS.NOT" => Some(PartSpecifier::HeaderFieldsNot),
            "TEXT" => Some(PartSpecifier::Text),
            _ => None,
        };
        if result.is_none() {
            self.rd.rewind_token();
        }
        Ok(result)
    }

    pub fn mime(&mut self) -> Result<bool, Error> {
        match self.keyword()? {
            Some(ref k) if k == "MIME" => Ok(true),
            Some(_) => {
                self.rd.rewind_token();
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
