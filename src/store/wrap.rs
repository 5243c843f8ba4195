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

//! Adapters around provider mailboxes and messages.
//!
//! [`MailboxWrap`] owns the sequence-number table. The table is built from
//! the provider's ascending UID enumeration the first time it is needed and
//! is then fixed for the lifetime of the selection; messages delivered later
//! become addressable on re-SELECT.

use std::io::Read;

use crate::store::{Mailbox, Message};
use crate::support::error::Error;

/// A provider mailbox plus sequence-number bookkeeping.
pub struct MailboxWrap {
    pub provider: Box<dyn Mailbox>,
    seq_nums: Option<Vec<u32>>,
}

/// A provider message plus its UID and buffered octets.
pub struct MessageWrap {
    pub uid: u32,
    pub provider: Box<dyn Message>,
}

impl MailboxWrap {
    pub fn wrap(provider: Box<dyn Mailbox>) -> Self {
        MailboxWrap {
            provider,
            seq_nums: None,
        }
    }

    /// The sequence-number table: entry `i` holds the UID of sequence number
    /// `i + 1`.
    pub fn seq_table(&mut self) -> Result<&[u32], Error> {
        if self.seq_nums.is_none() {
            self.seq_nums = Some(self.provider.all_uids()?);
        }
        Ok(self.seq_nums.as_deref().unwrap_or_default())
    }

    /// The largest in-use sequence number, i.e. the meaning of `*`.
    pub fn largest_seq_num(&mut self) -> Result<u32, Error> {
        Ok(self.seq_table()?.len() as u32)
    }

    /// Map a 1-based sequence number to its UID.
    pub fn uid_for(&mut self, seqnum: u32) -> Result<u32, Error> {
        self.seq_table()?
            .get(seqnum.checked_sub(1).ok_or(Error::NxMessage)? as usize)
            .copied()
            .ok_or(Error::NxMessage)
    }

    /// Fetch the message with the given sequence number.
    pub fn fetch(&mut self, seqnum: u32) -> Result<MessageWrap, Error> {
        let uid = self.uid_for(seqnum)?;
        let message = self.provider.fetch(uid)?.ok_or(Error::NxMessage)?;
        Ok(MessageWrap {
            uid,
            provider: message,
        })
    }
}

impl MessageWrap {
    /// Read the whole raw message into memory.
    pub fn read_all(&self) -> Result<Vec<u8>, Error> {
        let mut reader = self.provider.open()?;
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Ok(raw)
    }
}

/// The raw header block of a message: everything up to, but not including,
/// the blank line that separates headers from body.
pub fn rfc822_header(raw: &[u8]) -> &[u8] {
    let mut offset = 0;
    while offset < raw.len() {
        let line_end = match raw[offset..].iter().position(|&b| b == b'\n') {
            Some(i) => offset + i + 1,
            None => raw.len(),
        };
        let line = &raw[offset..line_end];
        if line == b"\r\n" || line == b"\n" {
            return &raw[..offset];
        }
        offset = line_end;
    }
    raw
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::Mailstore;

    const SAMPLE: &[u8] = b"From: a@example.com\r\n\
        Subject: hi\r\n\
        \r\n\
        body text\r\n";

    fn mailbox_with_uids(uids: &[u32]) -> MailboxWrap {
        let store = MemoryStore::new();
        let path = vec!["INBOX".to_owned()];
        store.create_mailbox("test", &path).unwrap();
        for &uid in uids {
            store.deliver_with_uid(&path, uid, SAMPLE.to_vec(), 0);
        }
        MailboxWrap::wrap(store.mailbox("test", &path).unwrap().unwrap())
    }

    #[test]
    fn sequence_numbers_map_to_ascending_uids() {
        let mut wrap = mailbox_with_uids(&[3, 7, 20]);
        assert_eq!(3, wrap.uid_for(1).unwrap());
        assert_eq!(7, wrap.uid_for(2).unwrap());
        assert_eq!(20, wrap.uid_for(3).unwrap());
        assert_eq!(3, wrap.largest_seq_num().unwrap());
        assert!(matches!(wrap.uid_for(0), Err(Error::NxMessage)));
        assert!(matches!(wrap.uid_for(4), Err(Error::NxMessage)));
    }

    #[test]
    fn fetch_reads_raw_octets() {
        let mut wrap = mailbox_with_uids(&[1]);
        let message = wrap.fetch(1).unwrap();
        assert_eq!(1, message.uid);
        assert_eq!(SAMPLE, &message.read_all().unwrap()[..]);
    }

    #[test]
    fn header_block_extraction() {
        let header = rfc822_header(SAMPLE);
        assert_eq!(
            b"From: a@example.com\r\nSubject: hi\r\n".as_slice(),
            header
        );
        // A message without a body separator is all header
        assert_eq!(b"X: 1\r\n".as_slice(), rfc822_header(b"X: 1\r\n"));
    }
}
