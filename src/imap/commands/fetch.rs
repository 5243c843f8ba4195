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

//! FETCH and its UID variant.
//!
//! Each matched message produces one partial response of the form
//! `* <seqnum> FETCH (<field> ...)`, streamed as it is built; the final OK
//! follows the last message.

use tokio::sync::mpsc::Sender;

use super::{internal_error, must_authenticate};
use crate::imap::command::{
    FetchAtt, SequenceRange, SEQUENCE_WILDCARD,
};
use crate::imap::lexer::FetchMacro;
use crate::imap::response::Response;
use crate::imap::session::{Session, SessionState};

/// A fetch macro stands for a fixed attachment list.
fn expand_macro(
    macro_: Option<FetchMacro>,
    atts: Vec<FetchAtt>,
) -> Vec<FetchAtt> {
    match macro_ {
        None => atts,
        Some(FetchMacro::All) => vec![
            FetchAtt::Flags,
            FetchAtt::InternalDate,
            FetchAtt::Rfc822Size,
            FetchAtt::Envelope,
        ],
        Some(FetchMacro::Fast) => vec![
            FetchAtt::Flags,
            FetchAtt::InternalDate,
            FetchAtt::Rfc822Size,
        ],
        Some(FetchMacro::Full) => vec![
            FetchAtt::Flags,
            FetchAtt::InternalDate,
            FetchAtt::Rfc822Size,
            FetchAtt::Envelope,
            FetchAtt::Body,
        ],
    }
}

pub async fn fetch(
    session: &mut Session,
    tag: String,
    set: Vec<SequenceRange>,
    macro_: Option<FetchMacro>,
    atts: Vec<FetchAtt>,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "FETCH")).await;
        return;
    }
    if session.state != SessionState::Selected {
        let _ = out.send(Response::bad(&tag, "Must SELECT first")).await;
        return;
    }

    let atts = expand_macro(macro_, atts);

    let largest = match session
        .mailbox
        .as_mut()
        .expect("Selected session without mailbox")
        .largest_seq_num()
    {
        Ok(largest) => largest,
        Err(e) => {
            let _ =
                out.send(internal_error(session, &tag, "FETCH", &e)).await;
            return;
        }
    };

    for range in &set {
        let start = if range.start == SEQUENCE_WILDCARD {
            largest
        } else {
            range.start
        };
        let end = match range.end {
            None => start,
            Some(SEQUENCE_WILDCARD) => largest,
            Some(end) => end,
        };
        // A reversed range is equivalent to its forward form
        let lo = start.min(end);
        let hi = start.max(end).min(largest);

        let mut seqnum = lo;
        while seqnum >= 1 && seqnum <= hi {
            let mut response = Response::partial();
            response.put(&format!("{} FETCH (", seqnum));
            if let Err(e) = session.fetch(&mut response, seqnum, &atts) {
                let _ = out
                    .send(internal_error(session, &tag, "FETCH", &e))
                    .await;
                return;
            }
            response.put(")");
            let _ = out.send(response).await;

            seqnum += 1;
        }
    }

    let _ = out.send(Response::ok(&tag, "FETCH completed")).await;
}

/// UID FETCH: the set addresses UIDs rather than sequence numbers, and the
/// reported attachment list always includes the UID.
pub async fn uid_fetch(
    session: &mut Session,
    tag: String,
    set: Vec<SequenceRange>,
    macro_: Option<FetchMacro>,
    atts: Vec<FetchAtt>,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "UID")).await;
        return;
    }
    if session.state != SessionState::Selected {
        let _ = out.send(Response::bad(&tag, "Must SELECT first")).await;
        return;
    }

    let mut atts = expand_macro(macro_, atts);
    if !atts.contains(&FetchAtt::Uid) {
        atts.push(FetchAtt::Uid);
    }

    let uids = match session
        .mailbox
        .as_mut()
        .expect("Selected session without mailbox")
        .seq_table()
    {
        Ok(uids) => uids.to_vec(),
        Err(e) => {
            let _ = out
                .send(internal_error(session, &tag, "UID FETCH", &e))
                .await;
            return;
        }
    };
    let largest_uid = uids.last().copied().unwrap_or(0);

    for (index, &uid) in uids.iter().enumerate() {
        if !uid_in_set(uid, &set, largest_uid) {
            continue;
        }

        let seqnum = index as u32 + 1;
        let mut response = Response::partial();
        response.put(&format!("{} FETCH (", seqnum));
        if let Err(e) = session.fetch(&mut response, seqnum, &atts) {
            let _ = out
                .send(internal_error(session, &tag, "UID FETCH", &e))
                .await;
            return;
        }
        response.put(")");
        let _ = out.send(response).await;
    }

    let _ = out.send(Response::ok(&tag, "UID FETCH completed")).await;
}

fn uid_in_set(uid: u32, set: &[SequenceRange], largest_uid: u32) -> bool {
    let resolve = |n: u32| {
        if n == SEQUENCE_WILDCARD {
            largest_uid
        } else {
            n
        }
    };

    set.iter().any(|range| {
        let start = resolve(range.start);
        match range.end {
            None => uid == start,
            Some(end) => {
                let end = resolve(end);
                uid >= start.min(end) && uid <= start.max(end)
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uid_set_membership() {
        let set = vec![
            SequenceRange::single(3),
            SequenceRange::range(10, SEQUENCE_WILDCARD),
        ];
        assert!(uid_in_set(3, &set, 20));
        assert!(!uid_in_set(4, &set, 20));
        assert!(uid_in_set(10, &set, 20));
        assert!(uid_in_set(20, &set, 20));
        // The wildcard resolves to the largest known UID
        assert!(uid_in_set(15, &set, 20));
        assert!(!uid_in_set(9, &set, 20));
    }

    #[test]
    fn wildcard_alone_matches_only_the_last_uid() {
        let set = vec![SequenceRange::single(SEQUENCE_WILDCARD)];
        assert!(uid_in_set(20, &set, 20));
        assert!(!uid_in_set(19, &set, 20));
    }

    #[test]
    fn macros_expand_to_fixed_lists() {
        assert_eq!(
            vec![
                FetchAtt::Flags,
                FetchAtt::InternalDate,
                FetchAtt::Rfc822Size,
                FetchAtt::Envelope
            ],
            expand_macro(Some(FetchMacro::All), vec![])
        );
        assert_eq!(
            vec![FetchAtt::Uid],
            expand_macro(None, vec![FetchAtt::Uid])
        );
    }
}
