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

//! A reference mailstore and auth backend held entirely in memory.
//!
//! This backs the demo configuration and the test suite. It is
//! single-tenant: the user argument on the `Mailstore` methods is ignored,
//! every authenticated user sees the same hierarchy.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, Utc};

use crate::store::{
    join_segments, AuthStore, Mailbox, Mailstore, Message,
};
use crate::support::error::Error;

#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    boxes: BTreeMap<Vec<String>, BoxState>,
}

struct BoxState {
    flags: u8,
    uid_validity: u32,
    next_uid: u32,
    subscribed: bool,
    messages: BTreeMap<u32, Arc<StoredMessage>>,
}

struct StoredMessage {
    raw: Vec<u8>,
    flags: u8,
    internal_date: DateTime<FixedOffset>,
}

impl BoxState {
    fn new() -> Self {
        BoxState {
            flags: 0,
            uid_validity: 1,
            next_uid: 1,
            subscribed: false,
            messages: BTreeMap::new(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store pre-populated with a subscribed INBOX holding two messages,
    /// for running the server out of the box.
    pub fn with_sample_data() -> Self {
        let store = MemoryStore::new();
        let inbox = vec!["INBOX".to_owned()];
        store.create_mailbox("", &inbox).expect("fresh store");
        {
            let mut inner = store.inner.lock().unwrap();
            inner.boxes.get_mut(&inbox).unwrap().subscribed = true;
        }
        store.deliver(
            &inbox,
            b"From: postmaster@example.org\r\n\
              To: you@example.org\r\n\
              Subject: Welcome to Ketch\r\n\
              Date: Mon, 6 Jan 2025 09:30:00 +0000\r\n\
              Message-ID: <welcome-1@example.org>\r\n\
              \r\n\
              Your mailbox is ready.\r\n"
                .to_vec(),
            0,
        );
        store.deliver(
            &inbox,
            b"From: postmaster@example.org\r\n\
              To: you@example.org\r\n\
              Subject: Getting started\r\n\
              Date: Mon, 6 Jan 2025 09:31:00 +0000\r\n\
              Message-ID: <welcome-2@example.org>\r\n\
              \r\n\
              Point an IMAP client at this server.\r\n"
                .to_vec(),
            crate::store::message_flags::RECENT,
        );
        store
    }

    /// Append a message, allocating the next UID. Returns the UID.
    pub fn deliver(&self, path: &[String], raw: Vec<u8>, flags: u8) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        let state = inner
            .boxes
            .get_mut(path)
            .expect("deliver to nonexistent mailbox");
        let uid = state.next_uid;
        state.next_uid += 1;
        state.messages.insert(
            uid,
            Arc::new(StoredMessage {
                raw,
                flags,
                internal_date: Utc::now().fixed_offset(),
            }),
        );
        uid
    }

    /// Append a message under a caller-chosen UID (test fixtures).
    pub fn deliver_with_uid(
        &self,
        path: &[String],
        uid: u32,
        raw: Vec<u8>,
        flags: u8,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let state = inner
            .boxes
            .get_mut(path)
            .expect("deliver to nonexistent mailbox");
        state.next_uid = state.next_uid.max(uid + 1);
        state.messages.insert(
            uid,
            Arc::new(StoredMessage {
                raw,
                flags,
                internal_date: Utc::now().fixed_offset(),
            }),
        );
    }

    fn handle(&self, path: &[String]) -> MemoryMailbox {
        MemoryMailbox {
            path: path.to_vec(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Mailstore for MemoryStore {
    fn mailbox(
        &self,
        _user: &str,
        path: &[String],
    ) -> Result<Option<Box<dyn Mailbox>>, Error> {
        let inner = self.inner.lock().unwrap();
        if inner.boxes.contains_key(path) {
            Ok(Some(Box::new(self.handle(path))))
        } else {
            Ok(None)
        }
    }

    fn mailboxes(
        &self,
        _user: &str,
        path: &[String],
    ) -> Result<Vec<Box<dyn Mailbox>>, Error> {
        let inner = self.inner.lock().unwrap();
        let mut children = Vec::new();
        for key in inner.boxes.keys() {
            if key.len() == path.len() + 1 && key.starts_with(path) {
                children.push(Box::new(MemoryMailbox {
                    path: key.clone(),
                    inner: Arc::clone(&self.inner),
                }) as Box<dyn Mailbox>);
            }
        }
        Ok(children)
    }

    fn create_mailbox(&self, _user: &str, path: &[String]) -> Result<(), Error> {
        if path.is_empty() {
            return Err(Error::CreateFailure(join_segments(path)));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.boxes.contains_key(path) {
            return Err(Error::CreateFailure(join_segments(path)));
        }

        // Create intermediate levels as needed
        for depth in 1..=path.len() {
            let prefix = path[..depth].to_vec();
            inner.boxes.entry(prefix).or_insert_with(BoxState::new);
        }
        Ok(())
    }

    fn delete_mailbox(&self, _user: &str, path: &[String]) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.boxes.remove(path).is_none() {
            return Err(Error::DeleteFailure(join_segments(path)));
        }
        Ok(())
    }
}

/// A handle onto one mailbox in a [`MemoryStore`].
pub struct MemoryMailbox {
    path: Vec<String>,
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryMailbox {
    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut BoxState) -> T,
    ) -> Result<T, Error> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.boxes.get_mut(&self.path).ok_or(Error::NxMailbox)?;
        Ok(f(state))
    }
}

impl Mailbox for MemoryMailbox {
    fn path(&self) -> &[String] {
        &self.path
    }

    fn flags(&self) -> Result<u8, Error> {
        self.with_state(|s| s.flags)
    }

    fn uid_validity(&self) -> Result<u32, Error> {
        self.with_state(|s| s.uid_validity)
    }

    fn next_uid(&self) -> Result<u32, Error> {
        self.with_state(|s| s.next_uid)
    }

    fn all_uids(&self) -> Result<Vec<u32>, Error> {
        self.with_state(|s| s.messages.keys().copied().collect())
    }

    fn first_unseen(&self) -> Result<u32, Error> {
        self.with_state(|s| {
            s.messages
                .values()
                .position(|m| m.flags & crate::store::message_flags::SEEN == 0)
                .map(|i| i as u32 + 1)
                .unwrap_or(0)
        })
    }

    fn total_messages(&self) -> Result<u32, Error> {
        self.with_state(|s| s.messages.len() as u32)
    }

    fn recent_messages(&self) -> Result<u32, Error> {
        self.with_state(|s| {
            s.messages
                .values()
                .filter(|m| {
                    m.flags & crate::store::message_flags::RECENT != 0
                })
                .count() as u32
        })
    }

    fn fetch(&self, uid: u32) -> Result<Option<Box<dyn Message>>, Error> {
        self.with_state(|s| {
            s.messages.get(&uid).map(|m| {
                Box::new(MemoryMessage(Arc::clone(m))) as Box<dyn Message>
            })
        })
    }

    fn subscribe(&self) -> Result<(), Error> {
        self.with_state(|s| s.subscribed = true)
    }

    fn unsubscribe(&self) -> Result<(), Error> {
        self.with_state(|s| s.subscribed = false)
    }

    fn subscribed(&self) -> Result<bool, Error> {
        self.with_state(|s| s.subscribed)
    }

    fn subscribed_descendant(&self) -> Result<bool, Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.boxes.iter().any(|(path, state)| {
            path.len() > self.path.len()
                && path.starts_with(&self.path)
                && state.subscribed
        }))
    }

    fn checkpoint(&self) -> Result<(), Error> {
        // Nothing is buffered; every operation is immediately visible.
        Ok(())
    }

    fn rename(&self, new_path: &[String]) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.boxes.contains_key(new_path) {
            return Err(Error::MailboxExists);
        }

        let moved: Vec<Vec<String>> = inner
            .boxes
            .keys()
            .filter(|path| path.starts_with(&self.path))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(Error::NxMailbox);
        }

        for old in moved {
            let state = inner.boxes.remove(&old).unwrap();
            let mut renamed = new_path.to_vec();
            renamed.extend_from_slice(&old[self.path.len()..]);
            inner.boxes.insert(renamed, state);
        }
        Ok(())
    }
}

struct MemoryMessage(Arc<StoredMessage>);

impl Message for MemoryMessage {
    fn flags(&self) -> Result<u8, Error> {
        Ok(self.0.flags)
    }

    fn internal_date(&self) -> Result<DateTime<FixedOffset>, Error> {
        Ok(self.0.internal_date)
    }

    fn size(&self) -> Result<u32, Error> {
        Ok(self.0.raw.len() as u32)
    }

    fn open(&self) -> Result<Box<dyn io::Read + Send>, Error> {
        Ok(Box::new(io::Cursor::new(self.0.raw.clone())))
    }
}

/// An in-memory user table.
pub struct MemoryAuth {
    users: HashMap<String, Option<String>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        MemoryAuth {
            users: HashMap::new(),
        }
    }

    /// Add a user. With a password of `None`, any password is accepted.
    pub fn add_user(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.users.insert(username.into(), password);
        self
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        MemoryAuth::new()
    }
}

impl AuthStore for MemoryAuth {
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, Error> {
        Ok(match self.users.get(username) {
            Some(Some(expected)) => expected == password,
            Some(None) => true,
            None => false,
        })
    }
}
