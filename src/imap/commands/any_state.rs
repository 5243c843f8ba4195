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

//! Commands legal in every state: connection management and authentication.

use tokio::sync::mpsc::Sender;

use crate::imap::response::{Response, StreamUpgrade};
use crate::imap::session::{EncryptionLevel, Session, SessionState};
use crate::support::system_config::EncryptionPolicy;

pub async fn noop(session: &mut Session, tag: String, out: &Sender<Response>) {
    let mut response = Response::ok(&tag, "NOOP Completed");

    if session.state == SessionState::Selected {
        if let Err(e) = session.add_mailbox_info(&mut response) {
            session.log(&format!("NOOP {}", e));
            let _ = out
                .send(Response::no(&tag, format!("NOOP {}", e)))
                .await;
            return;
        }
    }

    let _ = out.send(response).await;
}

/// The capability set depends on the session state, the listener's
/// encryption policy, and whether TLS is already active.
pub async fn capability(
    session: &mut Session,
    tag: String,
    out: &Sender<Response>,
) {
    let mut extra: Vec<&str> = Vec::new();

    if session.state == SessionState::NotAuthenticated {
        match session.listener.encryption {
            EncryptionPolicy::Plaintext => {}
            EncryptionPolicy::StartTls => {
                if session.encryption == EncryptionLevel::TlsActive {
                    extra.push("AUTH=PLAIN");
                } else {
                    extra.push("STARTTLS");
                    extra.push("LOGINDISABLED");
                }
            }
            EncryptionPolicy::Tls => extra.push("AUTH=PLAIN"),
        }
    }

    let mut response = Response::ok(&tag, "CAPABILITY completed");
    response.put_line(format!("CAPABILITY IMAP4rev1 {}", extra.join(" ")));
    let _ = out.send(response).await;
}

/// The tagged OK is the last plaintext the client sees; the session loop
/// performs the handshake carried in the upgrade payload before parsing
/// anything further.
pub async fn starttls(
    session: &mut Session,
    tag: String,
    out: &Sender<Response>,
) {
    if session.encryption == EncryptionLevel::TlsActive {
        let _ = out
            .send(Response::bad(&tag, "Already using TLS"))
            .await;
        return;
    }
    if session.state != SessionState::NotAuthenticated
        || session.listener.encryption != EncryptionPolicy::StartTls
    {
        let _ = out
            .send(Response::bad(&tag, "STARTTLS not available"))
            .await;
        return;
    }

    let acceptor = match session.listener.acceptor.clone() {
        Some(acceptor) => acceptor,
        None => {
            session.log("STARTTLS requested but no certificate is loaded");
            let _ = out
                .send(Response::bad(&tag, "STARTTLS not available"))
                .await;
            return;
        }
    };

    let response = Response::ok(&tag, "Begin TLS negotiation now")
        .replacing_streams(StreamUpgrade { acceptor });
    let _ = out.send(response).await;
}

pub async fn login(
    session: &mut Session,
    tag: String,
    user: String,
    password: String,
    out: &Sender<Response>,
) {
    // Has the user already logged in?
    if session.state != SessionState::NotAuthenticated {
        let message = "LOGIN already logged in";
        session.log(message);
        let _ = out.send(Response::bad(&tag, message)).await;
        return;
    }

    // A STARTTLS-negotiable listener advertises LOGINDISABLED while the
    // connection is cleartext; the auth backend is not consulted.
    if session.listener.encryption == EncryptionPolicy::StartTls
        && session.encryption == EncryptionLevel::Plaintext
    {
        let message = "LOGIN not allowed";
        session.log(message);
        let _ = out.send(Response::bad(&tag, message)).await;
        return;
    }

    match session.shared.auth.authenticate(&user, &password) {
        Ok(true) => {
            session.state = SessionState::Authenticated;
            session.user = user;
            let _ = out.send(Response::ok(&tag, "LOGIN completed")).await;
        }
        Ok(false) => {
            let _ = out.send(Response::no(&tag, "LOGIN failure")).await;
        }
        Err(e) => {
            session.log(&format!("LOGIN backend error: {}", e));
            let _ = out.send(Response::no(&tag, "LOGIN failure")).await;
        }
    }
}

pub async fn logout(
    session: &mut Session,
    tag: String,
    out: &Sender<Response>,
) {
    session.state = SessionState::NotAuthenticated;
    session.user.clear();
    session.mailbox = None;

    let mut response = Response::ok(&tag, "LOGOUT completed").closing();
    response.put_line("BYE IMAP4rev1 Server logging out");
    let _ = out.send(response).await;
}

pub async fn authenticate(
    session: &mut Session,
    tag: String,
    mechanism: String,
    out: &Sender<Response>,
) {
    session.log(&format!("AUTHENTICATE {} refused", mechanism));
    let _ = out
        .send(Response::no(&tag, "Mechanism not supported"))
        .await;
}

pub async fn unknown(
    session: &mut Session,
    tag: String,
    name: String,
    out: &Sender<Response>,
) {
    let message = format!("{} unknown command", name);
    session.log(&message);
    let _ = out.send(Response::bad(&tag, message)).await;
}
