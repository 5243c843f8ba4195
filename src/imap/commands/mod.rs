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

//! Command execution.
//!
//! Each handler runs on its own task, receives the session and the response
//! channel, writes zero or more partial responses followed by exactly one
//! final response, and closes the channel on exit (the sender is dropped
//! with the task). Errors never escape a handler; they become NO/BAD/BYE
//! responses.

mod any_state;
mod fetch;
mod mailbox;

use tokio::sync::mpsc::Sender;

use super::command::{Command, UidCommand};
use super::response::Response;
use super::session::Session;
use crate::support::error::Error;

pub async fn execute(
    command: Command,
    session: &mut Session,
    out: &Sender<Response>,
) {
    match command {
        Command::Noop { tag } => any_state::noop(session, tag, out).await,
        Command::Capability { tag } => {
            any_state::capability(session, tag, out).await
        }
        Command::StartTls { tag } => {
            any_state::starttls(session, tag, out).await
        }
        Command::Login {
            tag,
            user,
            password,
        } => any_state::login(session, tag, user, password, out).await,
        Command::Logout { tag } => any_state::logout(session, tag, out).await,
        Command::Authenticate { tag, mechanism } => {
            any_state::authenticate(session, tag, mechanism, out).await
        }
        Command::Unknown { tag, name } => {
            any_state::unknown(session, tag, name, out).await
        }

        Command::Select { tag, mailbox } => {
            mailbox::select(session, tag, mailbox, false, out).await
        }
        Command::Examine { tag, mailbox } => {
            mailbox::select(session, tag, mailbox, true, out).await
        }
        Command::Create { tag, mailbox } => {
            mailbox::create(session, tag, mailbox, out).await
        }
        Command::Delete { tag, mailbox } => {
            mailbox::delete(session, tag, mailbox, out).await
        }
        Command::Rename {
            tag,
            old_name,
            new_name,
        } => mailbox::rename(session, tag, old_name, new_name, out).await,
        Command::Subscribe { tag, mailbox } => {
            mailbox::subscribe(session, tag, mailbox, true, out).await
        }
        Command::Unsubscribe { tag, mailbox } => {
            mailbox::subscribe(session, tag, mailbox, false, out).await
        }
        Command::List {
            tag,
            reference,
            pattern,
        } => mailbox::list(session, tag, reference, pattern, out).await,
        Command::Lsub {
            tag,
            reference,
            pattern,
        } => mailbox::lsub(session, tag, reference, pattern, out).await,
        Command::Status { tag, mailbox } => {
            mailbox::status(session, tag, mailbox, out).await
        }
        Command::Check { tag } => mailbox::check(session, tag, out).await,

        Command::Fetch {
            tag,
            set,
            macro_,
            atts,
        } => fetch::fetch(session, tag, set, macro_, atts, out).await,
        Command::Uid { tag, sub } => match sub {
            UidCommand::Fetch { set, macro_, atts } => {
                fetch::uid_fetch(session, tag, set, macro_, atts, out).await
            }
            UidCommand::NotImplemented(sub) => {
                session.log(&format!("Command not implemented: UID {}", sub));
                let _ = out
                    .send(Response::bad(
                        tag,
                        format!("command not implemented: UID {}", sub),
                    ))
                    .await;
            }
            UidCommand::Unknown(sub) => {
                session.log(&format!("Unknown sub-command: UID {}", sub));
                let _ = out
                    .send(Response::bad(
                        tag,
                        format!("unknown command: UID {}", sub),
                    ))
                    .await;
            }
        },
    }
}

/// A protocol-state refusal: the command is not legal before LOGIN.
fn must_authenticate(session: &Session, tag: &str, name: &str) -> Response {
    let message = format!("{} not authenticated", name);
    session.log(&message);
    Response::bad(tag, message)
}

/// A provider failure: reported as NO and fatal to the connection.
fn internal_error(
    session: &Session,
    tag: &str,
    name: &str,
    error: &Error,
) -> Response {
    let message = format!("{} {}", name, error);
    session.log(&message);
    Response::no(tag, message).closing()
}
