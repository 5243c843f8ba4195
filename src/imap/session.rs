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

//! Per-connection session state.
//!
//! A session is created on accept and owned exclusively by its connection;
//! commands executing for that connection are the only mutators. Invariants:
//! `Selected` implies a selected mailbox is present, and any transition back
//! to `NotAuthenticated` clears both the user and the mailbox.

use std::sync::Arc;

use log::info;

use super::command::FetchAtt;
use super::fetch_att;
use super::response::Response;
use super::server::{Listener, ServerShared};
use crate::store::wrap::MailboxWrap;
use crate::support::error::Error;

/// How deep the LIST wildcard walk may recurse.
const MAX_LIST_DEPTH: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotAuthenticated,
    Authenticated,
    Selected,
}

/// The encryption level currently in effect on the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncryptionLevel {
    Plaintext,
    TlsActive,
}

pub struct Session {
    id: u64,
    pub state: SessionState,
    pub encryption: EncryptionLevel,
    /// The authenticated user. Empty until LOGIN succeeds.
    pub user: String,
    /// The selected mailbox. Present exactly in the Selected state.
    pub mailbox: Option<MailboxWrap>,
    pub shared: Arc<ServerShared>,
    pub listener: Arc<Listener>,
}

impl Session {
    pub fn new(
        id: u64,
        shared: Arc<ServerShared>,
        listener: Arc<Listener>,
        encryption: EncryptionLevel,
    ) -> Self {
        Session {
            id,
            state: SessionState::NotAuthenticated,
            encryption,
            user: String::new(),
            mailbox: None,
            shared,
            listener,
        }
    }

    pub fn log(&self, message: &str) {
        info!("IMAP ({}) {}", self.id, message);
    }

    /// Select the mailbox at `path`. Returns whether it exists; the selected
    /// mailbox is left untouched when it does not.
    pub fn select_mailbox(&mut self, path: &[String]) -> Result<bool, Error> {
        let mailbox = self.shared.store.mailbox(&self.user, path)?;
        match mailbox {
            Some(provider) => {
                self.mailbox = Some(MailboxWrap::wrap(provider));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resolve a mailbox without touching the selection (STATUS).
    pub fn peek_mailbox(
        &self,
        path: &[String],
    ) -> Result<Option<MailboxWrap>, Error> {
        Ok(self
            .shared
            .store
            .mailbox(&self.user, path)?
            .map(MailboxWrap::wrap))
    }

    /// List mailboxes matching `pattern`, interpreted relative to
    /// `reference`.
    ///
    /// The non-wildcard prefix of the pattern is concatenated onto the
    /// reference, then the hierarchy is walked depth-first. `%` matches
    /// exactly one path segment; `*` matches any number, including none.
    pub fn list(
        &self,
        reference: &[String],
        pattern: &[String],
    ) -> Result<Vec<MailboxWrap>, Error> {
        let mut results = Vec::with_capacity(4);
        let mut path = reference.to_vec();

        // Build a path that does not have wildcards
        let mut wildcard = None;
        for (i, segment) in pattern.iter().enumerate() {
            if segment == "%" || segment == "*" {
                wildcard = Some(i);
                break;
            }
            path.push(segment.clone());
        }

        // Without wildcards the pattern names at most one mailbox
        let Some(wildcard) = wildcard else {
            if let Some(provider) =
                self.shared.store.mailbox(&self.user, &path)?
            {
                results.push(MailboxWrap::wrap(provider));
            }
            return Ok(results);
        };

        self.depth_first(&mut results, path, &pattern[wildcard..])?;
        Ok(results)
    }

    fn depth_first(
        &self,
        results: &mut Vec<MailboxWrap>,
        path: Vec<String>,
        pattern: &[String],
    ) -> Result<(), Error> {
        // Stop recursing if the pattern is exhausted or the path is too long
        if path.len() > MAX_LIST_DEPTH {
            return Ok(());
        }
        let Some((head, rest)) = pattern.split_first() else {
            return Ok(());
        };

        match head.as_str() {
            "%" => {
                for provider in
                    self.shared.store.mailboxes(&self.user, &path)?
                {
                    let child = provider.path().to_vec();
                    if rest.is_empty() {
                        results.push(MailboxWrap::wrap(provider));
                    } else {
                        self.depth_first(results, child, rest)?;
                    }
                }
            }

            "*" => {
                // Zero segments: the remainder may match at this very level
                if !rest.is_empty() {
                    self.depth_first(results, path.clone(), rest)?;
                }
                for provider in
                    self.shared.store.mailboxes(&self.user, &path)?
                {
                    let child = provider.path().to_vec();
                    if rest.is_empty() {
                        results.push(MailboxWrap::wrap(provider));
                    }
                    // The wildcard remains in effect across this segment
                    self.depth_first(results, child, pattern)?;
                }
            }

            segment => {
                let mut child = path;
                child.push(segment.to_owned());
                if rest.is_empty() {
                    if let Some(provider) =
                        self.shared.store.mailbox(&self.user, &child)?
                    {
                        results.push(MailboxWrap::wrap(provider));
                    }
                } else {
                    self.depth_first(results, child, rest)?;
                }
            }
        }

        Ok(())
    }

    /// Append the selected mailbox's status lines to `response`.
    pub fn add_mailbox_info(
        &mut self,
        response: &mut Response,
    ) -> Result<(), Error> {
        let mailbox = self.mailbox.as_ref().ok_or(Error::NxMailbox)?;
        mailbox_info(mailbox, response)
    }

    /// Fetch one message by sequence number, writing one field per
    /// attachment to `response`.
    pub fn fetch(
        &mut self,
        response: &mut Response,
        seqnum: u32,
        atts: &[FetchAtt],
    ) -> Result<(), Error> {
        let mailbox = self.mailbox.as_mut().ok_or(Error::NxMailbox)?;
        let message = mailbox.fetch(seqnum)?;
        fetch_att::extract_all(response, &message, atts)
    }
}

/// Write the EXISTS, RECENT, UNSEEN, UIDVALIDITY, and UIDNEXT untagged lines
/// for a mailbox.
pub fn mailbox_info(
    mailbox: &MailboxWrap,
    response: &mut Response,
) -> Result<(), Error> {
    let provider = &mailbox.provider;
    let first_unseen = provider.first_unseen()?;
    let total = provider.total_messages()?;
    let recent = provider.recent_messages()?;
    let next_uid = provider.next_uid()?;
    let uid_validity = provider.uid_validity()?;

    response.put_line(format!("{} EXISTS", total));
    response.put_line(format!("{} RECENT", recent));
    response.put_line(format!(
        "OK [UNSEEN {}] Message {} is first unseen",
        first_unseen, first_unseen
    ));
    response.put_line(format!("OK [UIDVALIDITY {}] UIDs valid", uid_validity));
    response.put_line(format!("OK [UIDNEXT {}] Predicted next UID", next_uid));
    Ok(())
}
