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

//! The command AST produced by the parser and consumed (exactly once) by the
//! dispatcher.

use super::lexer::{FetchMacro, PartSpecifier};

/// The sentinel for `*` in a sequence set: resolved against the largest
/// in-use sequence number (or UID) at execution time.
pub const SEQUENCE_WILDCARD: u32 = u32::MAX;

/// One element of a sequence set: a single number (`end` absent) or an
/// inclusive range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl SequenceRange {
    pub fn single(start: u32) -> Self {
        SequenceRange { start, end: None }
    }

    pub fn range(start: u32, end: u32) -> Self {
        SequenceRange {
            start,
            end: Some(end),
        }
    }
}

/// A byte range applied to a fetched section's octets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPartial {
    pub from: u32,
    pub length: u32,
}

/// The bracketed portion of `BODY[...]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchSection {
    /// The dotted part-number path, e.g. `1.2.3`.
    pub part: Vec<u32>,
    pub specifier: PartSpecifier,
    /// Header names for the HEADER.FIELDS variants.
    pub fields: Vec<String>,
    pub partial: Option<FetchPartial>,
}

/// One FETCH attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchAtt {
    Envelope,
    Flags,
    InternalDate,
    Rfc822Header,
    Rfc822Size,
    Rfc822Text,
    /// `BODY` without a section: BODYSTRUCTURE without extension data.
    Body,
    BodyStructure,
    Uid,
    /// `BODY[section]` / `BODY.PEEK[section]`. PEEK must not set `\Seen`.
    BodySection { section: FetchSection, peek: bool },
}

/// A parsed UID subcommand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UidCommand {
    Fetch {
        set: Vec<SequenceRange>,
        macro_: Option<FetchMacro>,
        atts: Vec<FetchAtt>,
    },
    /// COPY, STORE, and SEARCH are routed but not implemented.
    NotImplemented(String),
    Unknown(String),
}

/// A tagged command variant. Carries the original tag plus the
/// command-specific fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Noop { tag: String },
    Capability { tag: String },
    StartTls { tag: String },
    Login { tag: String, user: String, password: String },
    Logout { tag: String },
    Authenticate { tag: String, mechanism: String },
    Select { tag: String, mailbox: String },
    Examine { tag: String, mailbox: String },
    Create { tag: String, mailbox: String },
    Delete { tag: String, mailbox: String },
    Rename { tag: String, old_name: String, new_name: String },
    Subscribe { tag: String, mailbox: String },
    Unsubscribe { tag: String, mailbox: String },
    List { tag: String, reference: String, pattern: String },
    Lsub { tag: String, reference: String, pattern: String },
    Status { tag: String, mailbox: String },
    Check { tag: String },
    Fetch {
        tag: String,
        set: Vec<SequenceRange>,
        macro_: Option<FetchMacro>,
        atts: Vec<FetchAtt>,
    },
    Uid { tag: String, sub: UidCommand },
    Unknown { tag: String, name: String },
}
