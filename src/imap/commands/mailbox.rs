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

//! Mailbox management commands.

use tokio::sync::mpsc::Sender;

use super::{internal_error, must_authenticate};
use crate::imap::response::Response;
use crate::imap::session::{mailbox_info, Session, SessionState};
use crate::store::{
    join_segments, mailbox_flag_names, path_to_segments, PATH_DELIMITER,
};
use crate::support::error::Error;

/// SELECT and EXAMINE. EXAMINE is the read-only variant.
pub async fn select(
    session: &mut Session,
    tag: String,
    mailbox: String,
    read_only: bool,
    out: &Sender<Response>,
) {
    let name = if read_only { "EXAMINE" } else { "SELECT" };

    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, name)).await;
        return;
    }

    let path = path_to_segments(&mailbox);
    match session.select_mailbox(&path) {
        Err(e) => {
            let _ = out.send(internal_error(session, &tag, name, &e)).await;
        }
        Ok(false) => {
            // A failed SELECT leaves the session unselected
            session.state = SessionState::Authenticated;
            session.mailbox = None;
            let _ = out
                .send(Response::no(&tag, format!("{} No such mailbox", name)))
                .await;
        }
        Ok(true) => {
            let mut response = Response::ok(
                &tag,
                if read_only {
                    "[READ-ONLY] EXAMINE completed"
                } else {
                    "SELECT completed"
                },
            );
            match session.add_mailbox_info(&mut response) {
                Err(e) => {
                    let _ = out
                        .send(internal_error(session, &tag, name, &e))
                        .await;
                }
                Ok(()) => {
                    session.state = SessionState::Selected;
                    let _ = out.send(response).await;
                }
            }
        }
    }
}

pub async fn create(
    session: &mut Session,
    tag: String,
    mailbox: String,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "CREATE")).await;
        return;
    }

    let path = path_to_segments(&mailbox);
    let response = match session
        .shared
        .store
        .create_mailbox(&session.user, &path)
    {
        Ok(()) => Response::ok(&tag, "CREATE completed"),
        Err(Error::CreateFailure(_)) => Response::no(
            &tag,
            "create failure: can't create mailbox with that name",
        ),
        Err(e) => {
            session.log(&format!("CREATE {}", e));
            Response::bad(&tag, "Unknown error creating mailbox")
        }
    };
    let _ = out.send(response).await;
}

pub async fn delete(
    session: &mut Session,
    tag: String,
    mailbox: String,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "DELETE")).await;
        return;
    }

    if mailbox.eq_ignore_ascii_case("INBOX") {
        let _ = out.send(Response::no(&tag, "cannot delete INBOX")).await;
        return;
    }

    let path = path_to_segments(&mailbox);
    let response = match session
        .shared
        .store
        .delete_mailbox(&session.user, &path)
    {
        Ok(()) => Response::ok(&tag, "DELETE Completed"),
        Err(Error::DeleteFailure(_)) => Response::no(
            &tag,
            "delete failure: can't delete mailbox with that name",
        ),
        Err(e) => {
            session.log(&format!("DELETE {}", e));
            Response::bad(&tag, "unknown error occurred")
        }
    };
    let _ = out.send(response).await;
}

pub async fn rename(
    session: &mut Session,
    tag: String,
    old_name: String,
    new_name: String,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "RENAME")).await;
        return;
    }

    let old_path = path_to_segments(&old_name);
    let new_path = path_to_segments(&new_name);

    let mailbox = match session.shared.store.mailbox(&session.user, &old_path)
    {
        Ok(Some(mailbox)) => mailbox,
        Ok(None) => {
            let _ = out.send(Response::no(&tag, "mailbox not found")).await;
            return;
        }
        Err(e) => {
            let _ = out
                .send(internal_error(session, &tag, "RENAME", &e))
                .await;
            return;
        }
    };

    match session.shared.store.mailbox(&session.user, &new_path) {
        Ok(Some(_)) => {
            let _ = out.send(Response::no(&tag, "name already taken")).await;
            return;
        }
        Ok(None) => {}
        Err(e) => {
            let _ = out
                .send(internal_error(session, &tag, "RENAME", &e))
                .await;
            return;
        }
    }

    let response = match mailbox.rename(&new_path) {
        Ok(()) => Response::ok(&tag, "RENAME Completed"),
        Err(e) => {
            session.log(&format!("RENAME {}", e));
            Response::no(&tag, "error occurred while renaming")
        }
    };
    let _ = out.send(response).await;
}

/// SUBSCRIBE and UNSUBSCRIBE.
pub async fn subscribe(
    session: &mut Session,
    tag: String,
    mailbox: String,
    subscribed: bool,
    out: &Sender<Response>,
) {
    let name = if subscribed { "SUBSCRIBE" } else { "UNSUBSCRIBE" };

    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, name)).await;
        return;
    }

    let path = path_to_segments(&mailbox);
    let target = match session.shared.store.mailbox(&session.user, &path) {
        Ok(Some(target)) => target,
        Ok(None) | Err(_) => {
            let _ = out
                .send(Response::no(
                    &tag,
                    format!("{} failed; mailbox not found", name),
                ))
                .await;
            return;
        }
    };

    let result = if subscribed {
        target.subscribe()
    } else {
        target.unsubscribe()
    };
    let response = match result {
        Ok(()) => Response::ok(&tag, format!("{} Completed", name)),
        Err(e) => {
            session.log(&format!("{} {}", name, e));
            Response::no(&tag, format!("{} failed", name))
        }
    };
    let _ = out.send(response).await;
}

pub async fn list(
    session: &mut Session,
    tag: String,
    reference: String,
    pattern: String,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "LIST")).await;
        return;
    }

    // An empty pattern means: report the delimiter and the reference root
    if pattern.is_empty() {
        let reference = if reference.is_empty() {
            "\"\"".to_owned()
        } else {
            reference
        };
        let mut response = Response::ok(&tag, "LIST completed");
        response.put_line(format!(
            "LIST () \"{}\" {}",
            PATH_DELIMITER, reference
        ));
        let _ = out.send(response).await;
        return;
    }

    let mailboxes = match session
        .list(&path_to_segments(&reference), &path_to_segments(&pattern))
    {
        Ok(mailboxes) => mailboxes,
        Err(e) => {
            let _ =
                out.send(internal_error(session, &tag, "LIST", &e)).await;
            return;
        }
    };

    let mut response = Response::ok(&tag, "LIST completed");
    for mailbox in &mailboxes {
        let flags = match mailbox.provider.flags() {
            Ok(flags) => flags,
            Err(e) => {
                let _ = out
                    .send(internal_error(session, &tag, "LIST", &e))
                    .await;
                return;
            }
        };
        response.put_line(format!(
            "LIST ({}) \"{}\" \"{}\"",
            mailbox_flag_names(flags).join(" "),
            PATH_DELIMITER,
            join_segments(mailbox.provider.path()),
        ));
    }
    let _ = out.send(response).await;
}

/// Like LIST, but restricted to subscriptions. An unsubscribed mailbox with
/// a subscribed descendant is reported with \Noselect.
pub async fn lsub(
    session: &mut Session,
    tag: String,
    reference: String,
    pattern: String,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "LSUB")).await;
        return;
    }

    let mailboxes = match session
        .list(&path_to_segments(&reference), &path_to_segments(&pattern))
    {
        Ok(mailboxes) => mailboxes,
        Err(e) => {
            let _ =
                out.send(internal_error(session, &tag, "LSUB", &e)).await;
            return;
        }
    };

    let mut response = Response::ok(&tag, "LSUB completed");
    for mailbox in &mailboxes {
        let subscribed = match mailbox.provider.subscribed() {
            Ok(subscribed) => subscribed,
            Err(e) => {
                session.log(&format!("LSUB subscription check: {}", e));
                continue;
            }
        };

        if subscribed {
            let flags = mailbox.provider.flags().unwrap_or(0);
            response.put_line(format!(
                "LSUB ({}) \"{}\" \"{}\"",
                mailbox_flag_names(flags).join(" "),
                PATH_DELIMITER,
                join_segments(mailbox.provider.path()),
            ));
            continue;
        }

        match mailbox.provider.subscribed_descendant() {
            Ok(true) => {
                response.put_line(format!(
                    "LSUB (\\Noselect) \"{}\" \"{}\"",
                    PATH_DELIMITER,
                    join_segments(mailbox.provider.path()),
                ));
            }
            Ok(false) => {}
            Err(e) => {
                session.log(&format!("LSUB descendant check: {}", e));
            }
        }
    }
    let _ = out.send(response).await;
}

/// STATUS resolves the mailbox into a temporary handle; the selection is
/// never replaced.
pub async fn status(
    session: &mut Session,
    tag: String,
    mailbox: String,
    out: &Sender<Response>,
) {
    if session.state == SessionState::NotAuthenticated {
        let _ = out.send(must_authenticate(session, &tag, "STATUS")).await;
        return;
    }

    let path = path_to_segments(&mailbox);
    match session.peek_mailbox(&path) {
        Err(e) => {
            let _ = out
                .send(internal_error(session, &tag, "STATUS", &e))
                .await;
        }
        Ok(None) => {
            if session.state == SessionState::Selected {
                session.state = SessionState::Authenticated;
                session.mailbox = None;
            }
            let _ = out
                .send(Response::no(&tag, "STATUS No such mailbox"))
                .await;
        }
        Ok(Some(target)) => {
            let mut response = Response::ok(&tag, "STATUS completed");
            match mailbox_info(&target, &mut response) {
                Err(e) => {
                    let _ = out
                        .send(internal_error(session, &tag, "STATUS", &e))
                        .await;
                }
                Ok(()) => {
                    let _ = out.send(response).await;
                }
            }
        }
    }
}

pub async fn check(
    session: &mut Session,
    tag: String,
    out: &Sender<Response>,
) {
    if session.state != SessionState::Selected {
        let _ = out
            .send(Response::bad(&tag, "CHECK requires SELECTED state"))
            .await;
        return;
    }

    let result = session
        .mailbox
        .as_ref()
        .map(|m| m.provider.checkpoint())
        .unwrap_or(Err(Error::NxMailbox));
    let response = match result {
        Ok(()) => Response::ok(&tag, "CHECK Completed"),
        Err(e) => internal_error(session, &tag, "CHECK", &e),
    };
    let _ = out.send(response).await;
}
