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

//! The response accumulator.
//!
//! A response is an ordered list of untagged entries, optionally followed by
//! a final line carrying the originating tag, a condition, and a
//! human-readable message. Partial responses (no final line) are streamed
//! mid-command; the final response ends the command, and there is at most
//! one final response per command tag.

use std::fmt;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_rustls::TlsAcceptor;

/// Field values longer than this are emitted as literals rather than
/// inline.
const LONG_FIELD_LENGTH: usize = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Ok,
    No,
    Bad,
    Bye,
    PreAuth,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Condition::Ok => "OK",
            Condition::No => "NO",
            Condition::Bad => "BAD",
            Condition::Bye => "BYE",
            Condition::PreAuth => "PREAUTH",
        })
    }
}

/// Carried by a STARTTLS final response: the session loop performs the
/// handshake and installs the encrypted stream before parsing further.
pub struct StreamUpgrade {
    pub acceptor: TlsAcceptor,
}

pub struct Response {
    /// `None` for partial and untagged-fatal responses.
    tag: Option<String>,
    /// `None` for partial responses.
    condition: Option<Condition>,
    message: String,
    close_connection: bool,
    upgrade: Option<StreamUpgrade>,
    /// Completed untagged entries, in order.
    entries: Vec<String>,
    /// The entry currently being built.
    current: String,
    /// Whether the last append to `current` was a field.
    fields: bool,
}

impl Response {
    fn final_response(
        tag: impl Into<String>,
        condition: Condition,
        message: impl Into<String>,
    ) -> Self {
        Response {
            tag: Some(tag.into()),
            condition: Some(condition),
            message: message.into(),
            close_connection: false,
            upgrade: None,
            entries: Vec::new(),
            current: String::new(),
            fields: false,
        }
    }

    pub fn ok(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Response::final_response(tag, Condition::Ok, message)
    }

    pub fn no(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Response::final_response(tag, Condition::No, message)
    }

    pub fn bad(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Response::final_response(tag, Condition::Bad, message)
    }

    /// An untagged `BYE` that terminates the connection.
    pub fn fatal(message: impl Into<String>) -> Self {
        let mut response =
            Response::final_response("", Condition::Bye, message);
        response.tag = None;
        response.close_connection = true;
        response
    }

    /// A partial response: untagged data only, no final line.
    pub fn partial() -> Self {
        Response {
            tag: None,
            condition: None,
            message: String::new(),
            close_connection: false,
            upgrade: None,
            entries: Vec::new(),
            current: String::new(),
            fields: false,
        }
    }

    /// Append raw text to the current entry.
    pub fn put(&mut self, text: &str) -> &mut Self {
        self.current.push_str(text);
        self.fields = false;
        self
    }

    /// Flush the current entry and start a new one with `line`.
    pub fn put_line(&mut self, line: impl Into<String>) -> &mut Self {
        if !self.current.is_empty() {
            let finished = std::mem::take(&mut self.current);
            self.entries.push(finished);
        }
        self.current = line.into();
        self.fields = false;
        self
    }

    /// Append a named field to the current entry. Consecutive fields are
    /// separated by a single space; a long value is emitted as a literal.
    pub fn put_field(&mut self, name: &str, value: &str) -> &mut Self {
        if self.fields && !self.current.is_empty() {
            self.current.push(' ');
        }
        self.current.push_str(name);

        if value.len() > LONG_FIELD_LENGTH {
            self.current
                .push_str(&format!(" {{{}}}\r\n{}\r\n", value.len(), value));
        } else {
            self.current.push(' ');
            self.current.push_str(value);
        }

        self.fields = true;
        self
    }

    /// Mark that the connection ends after this response is written.
    pub fn closing(mut self) -> Self {
        self.close_connection = true;
        self
    }

    /// Attach a stream-upgrade payload (STARTTLS).
    pub fn replacing_streams(mut self, upgrade: StreamUpgrade) -> Self {
        self.upgrade = Some(upgrade);
        self
    }

    pub fn is_close(&self) -> bool {
        self.close_connection
    }

    pub fn take_upgrade(&mut self) -> Option<StreamUpgrade> {
        self.upgrade.take()
    }

    /// Serialise to the wire. Untagged entries are prefixed with `* `; the
    /// final line, if any, carries the tag and flushes the output.
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        w: &mut W,
    ) -> std::io::Result<()> {
        for entry in &self.entries {
            write_untagged(w, entry).await?;
        }
        if !self.current.is_empty() {
            write_untagged(w, &self.current).await?;
        }

        if let Some(condition) = self.condition {
            let line = format!(
                "{} {} {}\r\n",
                self.tag.as_deref().unwrap_or("*"),
                condition,
                self.message
            );
            w.write_all(line.as_bytes()).await?;
            w.flush().await?;
        }

        Ok(())
    }
}

async fn write_untagged<W: AsyncWrite + Unpin>(
    w: &mut W,
    entry: &str,
) -> std::io::Result<()> {
    w.write_all(b"* ").await?;
    w.write_all(entry.as_bytes()).await?;
    w.write_all(b"\r\n").await?;
    Ok(())
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("tag", &self.tag)
            .field("condition", &self.condition)
            .field("message", &self.message)
            .field("close_connection", &self.close_connection)
            .field("upgrade", &self.upgrade.is_some())
            .field("entries", &self.entries)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn render(response: &Response) -> String {
        let mut buffer = std::io::Cursor::new(Vec::new());
        response.write_to(&mut buffer).await.unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn final_line_carries_tag_and_condition() {
        let response = Response::ok("a1", "CAPABILITY completed");
        assert_eq!("a1 OK CAPABILITY completed\r\n", render(&response).await);

        let response = Response::no("a2", "SELECT No such mailbox");
        assert_eq!("a2 NO SELECT No such mailbox\r\n", render(&response).await);

        let response = Response::bad("a3", "FOO unknown command");
        assert_eq!("a3 BAD FOO unknown command\r\n", render(&response).await);
    }

    #[tokio::test]
    async fn untagged_lines_precede_the_final_line() {
        let mut response = Response::ok("a2", "LOGOUT completed").closing();
        response.put_line("BYE IMAP4rev1 Server logging out");
        assert_eq!(
            "* BYE IMAP4rev1 Server logging out\r\na2 OK LOGOUT completed\r\n",
            render(&response).await
        );
        assert!(response.is_close());
    }

    #[tokio::test]
    async fn fatal_is_untagged_bye() {
        let response = Response::fatal("Unexpected end of line");
        assert_eq!("* BYE Unexpected end of line\r\n", render(&response).await);
        assert!(response.is_close());
    }

    #[tokio::test]
    async fn fields_are_space_separated() {
        let mut response = Response::partial();
        response.put("1 FETCH (");
        response.put_field("UID", "3");
        response.put_field("FLAGS", "(\\Seen)");
        response.put(")");
        assert_eq!(
            "* 1 FETCH (UID 3 FLAGS (\\Seen))\r\n",
            render(&response).await
        );
    }

    #[tokio::test]
    async fn long_field_values_become_literals() {
        let value = "x".repeat(100);
        let mut response = Response::partial();
        response.put("1 FETCH (");
        response.put_field("RFC822.TEXT", &value);
        response.put(")");
        assert_eq!(
            format!("* 1 FETCH (RFC822.TEXT {{100}}\r\n{}\r\n)\r\n", value),
            render(&response).await
        );
    }

    #[tokio::test]
    async fn put_line_flushes_previous_entry() {
        let mut response = Response::ok("a1", "LIST completed");
        response.put_line("LIST () \"/\" \"INBOX\"");
        response.put_line("LIST () \"/\" \"Archive\"");
        assert_eq!(
            "* LIST () \"/\" \"INBOX\"\r\n* LIST () \"/\" \"Archive\"\r\na1 OK LIST completed\r\n",
            render(&response).await
        );
    }

    #[tokio::test]
    async fn partial_without_content_writes_nothing() {
        let response = Response::partial();
        assert_eq!("", render(&response).await);
    }
}
