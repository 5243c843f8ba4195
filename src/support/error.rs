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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input from the client. Fatal to the connection: the session
    /// loop converts this into an untagged `BYE` and disconnects.
    #[error("{0}")]
    Parse(String),
    /// The client went away before the start of a command line.
    #[error("Client disconnected")]
    Disconnected,
    #[error("No such mailbox")]
    NxMailbox,
    #[error("Mailbox already exists")]
    MailboxExists,
    #[error("Operation not allowed for INBOX")]
    BadOperationOnInbox,
    #[error("could not create mailbox: {0}")]
    CreateFailure(String),
    #[error("cannot delete; mailbox does not exist: {0}")]
    DeleteFailure(String),
    #[error("Non-existent message")]
    NxMessage,
    #[error("Message could not be parsed")]
    BadMessage,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }
}
