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

//! The collaborator interfaces the protocol engine runs against.
//!
//! Ketch does not store mail itself; it drives a [`Mailstore`] (and an
//! [`AuthStore`]) supplied by the embedder. Implementations must be safe for
//! concurrent use across connections. UID allocation within a mailbox must
//! be at least atomic-increment.

use std::io;

use chrono::{DateTime, FixedOffset};

use crate::support::error::Error;

pub mod memory;
pub mod wrap;

/// The mailbox hierarchy delimiter. Fixed, server-chosen per RFC 3501.
pub const PATH_DELIMITER: char = '/';

/// Per-message flag bits as stored by the provider.
pub mod message_flags {
    pub const SEEN: u8 = 1 << 0;
    pub const ANSWERED: u8 = 1 << 1;
    pub const FLAGGED: u8 = 1 << 2;
    pub const DELETED: u8 = 1 << 3;
    pub const DRAFT: u8 = 1 << 4;
    pub const RECENT: u8 = 1 << 5;
}

/// Per-mailbox flag bits as stored by the provider.
pub mod mailbox_flags {
    pub const NOINFERIORS: u8 = 1 << 0;
    pub const NOSELECT: u8 = 1 << 1;
    pub const MARKED: u8 = 1 << 2;
    pub const UNMARKED: u8 = 1 << 3;
}

/// Render the set bits of a message flag byte as IMAP flag atoms.
pub fn message_flag_names(flags: u8) -> Vec<&'static str> {
    static NAMES: &[(u8, &str)] = &[
        (message_flags::SEEN, "\\Seen"),
        (message_flags::ANSWERED, "\\Answered"),
        (message_flags::FLAGGED, "\\Flagged"),
        (message_flags::DELETED, "\\Deleted"),
        (message_flags::DRAFT, "\\Draft"),
        (message_flags::RECENT, "\\Recent"),
    ];
    NAMES
        .iter()
        .filter(|&&(bit, _)| flags & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

/// Render the set bits of a mailbox flag byte as IMAP attribute atoms.
///
/// Only the four attributes LIST may report are considered; any other bits
/// the provider sets are ignored.
pub fn mailbox_flag_names(flags: u8) -> Vec<&'static str> {
    static NAMES: &[(u8, &str)] = &[
        (mailbox_flags::NOINFERIORS, "\\Noinferiors"),
        (mailbox_flags::NOSELECT, "\\Noselect"),
        (mailbox_flags::MARKED, "\\Marked"),
        (mailbox_flags::UNMARKED, "\\Unmarked"),
    ];
    NAMES
        .iter()
        .filter(|&&(bit, _)| flags & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

/// Split a wire-format mailbox path into segments.
///
/// Leading and trailing delimiters are dropped, and a leading `inbox` in any
/// case is canonicalised to `INBOX`.
pub fn path_to_segments(path: &str) -> Vec<String> {
    let mut segments: Vec<String> = path
        .split(PATH_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if let Some(first) = segments.first_mut() {
        if first.eq_ignore_ascii_case("INBOX") {
            *first = "INBOX".to_owned();
        }
    }
    segments
}

/// Join path segments back into wire format.
pub fn join_segments(segments: &[String]) -> String {
    segments.join(&PATH_DELIMITER.to_string())
}

/// The authentication backend.
///
/// Only `authenticate` is invoked by the protocol core; user lifecycle
/// management belongs to the embedder.
pub trait AuthStore: Send + Sync {
    /// Attempt to authenticate the given credentials.
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, Error>;
}

/// A service that resolves mailboxes for an authenticated user.
pub trait Mailstore: Send + Sync {
    /// Look up the mailbox at `path`. Returns `None` if it does not exist.
    fn mailbox(
        &self,
        user: &str,
        path: &[String],
    ) -> Result<Option<Box<dyn Mailbox>>, Error>;

    /// List the immediate children of `path` (the root for an empty path).
    fn mailboxes(
        &self,
        user: &str,
        path: &[String],
    ) -> Result<Vec<Box<dyn Mailbox>>, Error>;

    /// Create the mailbox at `path`, creating intermediate levels as needed.
    ///
    /// Fails with [`Error::CreateFailure`] when the name cannot be created.
    fn create_mailbox(&self, user: &str, path: &[String]) -> Result<(), Error>;

    /// Delete the mailbox at `path`.
    ///
    /// Fails with [`Error::DeleteFailure`] when there is no such mailbox.
    fn delete_mailbox(&self, user: &str, path: &[String]) -> Result<(), Error>;
}

/// One mailbox, as handed out by a [`Mailstore`].
pub trait Mailbox: Send + Sync {
    fn path(&self) -> &[String];

    /// The mailbox attribute bits (see [`mailbox_flags`]).
    fn flags(&self) -> Result<u8, Error>;

    fn uid_validity(&self) -> Result<u32, Error>;

    /// The next UID that will be assigned in this mailbox.
    fn next_uid(&self) -> Result<u32, Error>;

    /// All UIDs currently in the mailbox, ascending.
    fn all_uids(&self) -> Result<Vec<u32>, Error>;

    /// The sequence number of the first unseen message.
    fn first_unseen(&self) -> Result<u32, Error>;

    fn total_messages(&self) -> Result<u32, Error>;

    fn recent_messages(&self) -> Result<u32, Error>;

    /// Fetch one message by UID. Returns `None` if no message has that UID.
    fn fetch(&self, uid: u32) -> Result<Option<Box<dyn Message>>, Error>;

    fn subscribe(&self) -> Result<(), Error>;

    fn unsubscribe(&self) -> Result<(), Error>;

    fn subscribed(&self) -> Result<bool, Error>;

    /// Whether any descendant of this mailbox is subscribed.
    fn subscribed_descendant(&self) -> Result<bool, Error>;

    /// Request a checkpoint of the mailbox's backing state.
    fn checkpoint(&self) -> Result<(), Error>;

    /// Rename this mailbox, moving the whole subtree atomically.
    fn rename(&self, new_path: &[String]) -> Result<(), Error>;
}

/// One message within a mailbox.
pub trait Message: Send + Sync {
    /// The message flag bits (see [`message_flags`]).
    fn flags(&self) -> Result<u8, Error>;

    /// The server-internal receipt timestamp.
    fn internal_date(&self) -> Result<DateTime<FixedOffset>, Error>;

    /// Size of the raw message in octets.
    fn size(&self) -> Result<u32, Error>;

    /// A reader over the raw RFC 822 octets.
    fn open(&self) -> Result<Box<dyn io::Read + Send>, Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn path_splitting() {
        assert_eq!(vec!["a", "b"], path_to_segments("a/b"));
        assert_eq!(vec!["a", "b"], path_to_segments("/a/b/"));
        assert_eq!(Vec::<String>::new(), path_to_segments(""));
        assert_eq!(Vec::<String>::new(), path_to_segments("/"));
    }

    #[test]
    fn inbox_is_canonicalised() {
        assert_eq!(vec!["INBOX"], path_to_segments("inbox"));
        assert_eq!(vec!["INBOX", "sub"], path_to_segments("InBox/sub"));
        // Only the first segment is INBOX
        assert_eq!(vec!["a", "inbox"], path_to_segments("a/inbox"));
    }

    #[test]
    fn flag_rendering() {
        assert_eq!(
            vec!["\\Seen", "\\Flagged"],
            message_flag_names(message_flags::SEEN | message_flags::FLAGGED)
        );
        assert!(message_flag_names(0).is_empty());
        assert_eq!(
            vec!["\\Noselect"],
            mailbox_flag_names(mailbox_flags::NOSELECT)
        );
    }
}
