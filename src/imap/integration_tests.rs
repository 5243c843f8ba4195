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

//! End-to-end tests over a real socket: greeting, command dispatch,
//! response framing, and session state transitions.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::server::test_support::{
    plaintext_listener, shared_with, starttls_listener,
};
use super::server::{accept_loop, Listener};
use crate::store::memory::MemoryStore;
use crate::store::{path_to_segments, Mailstore};

async fn start_server(
    listener: Arc<Listener>,
    store: Arc<MemoryStore>,
) -> SocketAddr {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(accept_loop(socket, listener, shared_with(store)));
    addr
}

struct TestClient {
    stream: BufReader<TcpStream>,
}

impl TestClient {
    /// Connect and consume the greeting.
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = TestClient {
            stream: BufReader::new(stream),
        };
        assert_eq!("* OK IMAP4rev1 Service Ready\r\n", client.line().await);
        client
    }

    async fn send(&mut self, data: &str) {
        self.stream
            .get_mut()
            .write_all(data.as_bytes())
            .await
            .unwrap();
        self.stream.get_mut().flush().await.unwrap();
    }

    /// Read one response line. Returns the empty string at EOF.
    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.stream.read_line(&mut line).await.unwrap();
        line
    }
}

fn empty_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

fn store_with_inbox(messages: usize) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let inbox = path_to_segments("INBOX");
    store.create_mailbox("test", &inbox).unwrap();
    for i in 0..messages {
        store.deliver(
            &inbox,
            format!(
                "From: sender@example.org\r\n\
                 Subject: message {}\r\n\
                 \r\n\
                 body {}\r\n",
                i, i
            )
            .into_bytes(),
            0,
        );
    }
    Arc::new(store)
}

#[tokio::test]
async fn capability_then_logout() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    // Both commands pipelined in one write
    client.send("a1 CAPABILITY\r\na2 LOGOUT\r\n").await;

    assert_eq!("* CAPABILITY IMAP4rev1 \r\n", client.line().await);
    assert_eq!("a1 OK CAPABILITY completed\r\n", client.line().await);
    assert_eq!(
        "* BYE IMAP4rev1 Server logging out\r\n",
        client.line().await
    );
    assert_eq!("a2 OK LOGOUT completed\r\n", client.line().await);
    assert_eq!("", client.line().await); // connection closed
}

#[tokio::test]
async fn login_disabled_on_cleartext_starttls_listener() {
    let addr = start_server(starttls_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a0 CAPABILITY\r\n").await;
    assert_eq!(
        "* CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED\r\n",
        client.line().await
    );
    assert_eq!("a0 OK CAPABILITY completed\r\n", client.line().await);

    client.send("a1 LOGIN user pass\r\n").await;
    assert_eq!("a1 BAD LOGIN not allowed\r\n", client.line().await);
}

#[tokio::test]
async fn select_of_missing_mailbox_leaves_authenticated() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test anypassword\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);

    client.send("a2 SELECT nope\r\n").await;
    assert_eq!("a2 NO SELECT No such mailbox\r\n", client.line().await);

    // Still authenticated, but nothing selected
    client.send("a3 FETCH 1 FLAGS\r\n").await;
    assert_eq!("a3 BAD Must SELECT first\r\n", client.line().await);
}

#[tokio::test]
async fn login_with_literal_credentials() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client
        .send("a1 LOGIN {4}\r\ntest {8}\r\npassword\r\n")
        .await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);
}

#[tokio::test]
async fn list_with_empty_pattern_reports_the_delimiter() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);

    client.send("a2 LIST \"\" \"\"\r\n").await;
    assert_eq!("* LIST () \"/\" \"\"\r\n", client.line().await);
    assert_eq!("a2 OK LIST completed\r\n", client.line().await);
}

#[tokio::test]
async fn fetch_wildcard_range_covers_the_mailbox() {
    let addr = start_server(plaintext_listener(), store_with_inbox(8)).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);

    client.send("a2 SELECT INBOX\r\n").await;
    assert_eq!("* 8 EXISTS\r\n", client.line().await);
    assert_eq!("* 0 RECENT\r\n", client.line().await);
    assert_eq!(
        "* OK [UNSEEN 1] Message 1 is first unseen\r\n",
        client.line().await
    );
    assert_eq!("* OK [UIDVALIDITY 1] UIDs valid\r\n", client.line().await);
    assert_eq!(
        "* OK [UIDNEXT 9] Predicted next UID\r\n",
        client.line().await
    );
    assert_eq!("a2 OK SELECT completed\r\n", client.line().await);

    client.send("a3 FETCH 1:* (UID FLAGS)\r\n").await;
    for n in 1..=8 {
        assert_eq!(
            format!("* {} FETCH (UID {} FLAGS ())\r\n", n, n),
            client.line().await
        );
    }
    assert_eq!("a3 OK FETCH completed\r\n", client.line().await);
}

#[tokio::test]
async fn reversed_ranges_match_their_forward_form() {
    let addr = start_server(plaintext_listener(), store_with_inbox(4)).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);
    client.send("a2 SELECT INBOX\r\n").await;
    for _ in 0..6 {
        client.line().await;
    }

    client.send("a3 FETCH 3:1 (UID)\r\n").await;
    for n in 1..=3 {
        assert_eq!(
            format!("* {} FETCH (UID {})\r\n", n, n),
            client.line().await
        );
    }
    assert_eq!("a3 OK FETCH completed\r\n", client.line().await);

    client.send("a4 UID FETCH 3:1 (UID)\r\n").await;
    for n in 1..=3 {
        assert_eq!(
            format!("* {} FETCH (UID {})\r\n", n, n),
            client.line().await
        );
    }
    assert_eq!("a4 OK UID FETCH completed\r\n", client.line().await);
}

#[tokio::test]
async fn uid_fetch_reports_uids() {
    let addr = start_server(plaintext_listener(), store_with_inbox(4)).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);
    client.send("a2 SELECT INBOX\r\n").await;
    for _ in 0..6 {
        client.line().await;
    }

    client.send("a3 UID FETCH 2:3 (FLAGS)\r\n").await;
    assert_eq!(
        "* 2 FETCH (FLAGS () UID 2)\r\n",
        client.line().await
    );
    assert_eq!(
        "* 3 FETCH (FLAGS () UID 3)\r\n",
        client.line().await
    );
    assert_eq!("a3 OK UID FETCH completed\r\n", client.line().await);

    client.send("a4 UID STORE 1 +FLAGS (\\Seen)\r\n").await;
    assert_eq!(
        "a4 BAD command not implemented: UID store\r\n",
        client.line().await
    );
}

#[tokio::test]
async fn noop_is_idempotent_when_authenticated() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);

    client.send("a2 NOOP\r\n").await;
    let first = client.line().await;
    client.send("a3 NOOP\r\n").await;
    let second = client.line().await;

    assert_eq!("a2 OK NOOP Completed\r\n", first);
    assert_eq!(
        first.trim_start_matches("a2"),
        second.trim_start_matches("a3")
    );
}

#[tokio::test]
async fn parse_errors_are_fatal_byes() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    // A quoted string may not contain a line break
    client.send("a1 LOGIN \"unterminated\r\n").await;
    let line = client.line().await;
    assert!(line.starts_with("* BYE "), "got: {:?}", line);
    assert_eq!("", client.line().await); // connection closed
}

#[tokio::test]
async fn unknown_commands_keep_the_connection_open() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 FROBNICATE\r\n").await;
    assert_eq!(
        "a1 BAD FROBNICATE unknown command\r\n",
        client.line().await
    );

    client.send("a2 NOOP\r\n").await;
    assert_eq!("a2 OK NOOP Completed\r\n", client.line().await);
}

#[tokio::test]
async fn mailbox_management_round_trip() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);

    client.send("a2 CREATE projects/ketch\r\n").await;
    assert_eq!("a2 OK CREATE completed\r\n", client.line().await);

    client.send("a3 LIST \"\" *\r\n").await;
    assert_eq!(
        "* LIST () \"/\" \"projects\"\r\n",
        client.line().await
    );
    assert_eq!(
        "* LIST () \"/\" \"projects/ketch\"\r\n",
        client.line().await
    );
    assert_eq!("a3 OK LIST completed\r\n", client.line().await);

    client.send("a4 RENAME projects archive\r\n").await;
    assert_eq!("a4 OK RENAME Completed\r\n", client.line().await);

    client.send("a5 SUBSCRIBE archive/ketch\r\n").await;
    assert_eq!("a5 OK SUBSCRIBE Completed\r\n", client.line().await);

    client.send("a6 LSUB \"\" *\r\n").await;
    assert_eq!(
        "* LSUB (\\Noselect) \"/\" \"archive\"\r\n",
        client.line().await
    );
    assert_eq!(
        "* LSUB () \"/\" \"archive/ketch\"\r\n",
        client.line().await
    );
    assert_eq!("a6 OK LSUB completed\r\n", client.line().await);

    client.send("a7 DELETE archive/ketch\r\n").await;
    assert_eq!("a7 OK DELETE Completed\r\n", client.line().await);

    client.send("a8 DELETE INBOX\r\n").await;
    assert_eq!("a8 NO cannot delete INBOX\r\n", client.line().await);
}

#[tokio::test]
async fn status_does_not_disturb_the_selection() {
    let store = store_with_inbox(2);
    store
        .create_mailbox("test", &path_to_segments("Other"))
        .unwrap();
    let addr = start_server(plaintext_listener(), store).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);
    client.send("a2 SELECT INBOX\r\n").await;
    for _ in 0..6 {
        client.line().await;
    }

    client.send("a3 STATUS Other\r\n").await;
    for _ in 0..5 {
        let line = client.line().await;
        assert!(line.starts_with("* "), "got: {:?}", line);
    }
    assert_eq!("a3 OK STATUS completed\r\n", client.line().await);

    // The INBOX selection survived
    client.send("a4 FETCH 1 (UID)\r\n").await;
    assert_eq!("* 1 FETCH (UID 1)\r\n", client.line().await);
    assert_eq!("a4 OK FETCH completed\r\n", client.line().await);

    // STATUS of a missing mailbox drops back to Authenticated
    client.send("a5 STATUS nope\r\n").await;
    assert_eq!("a5 NO STATUS No such mailbox\r\n", client.line().await);
    client.send("a6 FETCH 1 (UID)\r\n").await;
    assert_eq!("a6 BAD Must SELECT first\r\n", client.line().await);
}

#[tokio::test]
async fn examine_is_read_only_select() {
    let addr = start_server(plaintext_listener(), store_with_inbox(1)).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 LOGIN test x\r\n").await;
    assert_eq!("a1 OK LOGIN completed\r\n", client.line().await);

    client.send("a2 EXAMINE INBOX\r\n").await;
    for _ in 0..5 {
        client.line().await;
    }
    assert_eq!(
        "a2 OK [READ-ONLY] EXAMINE completed\r\n",
        client.line().await
    );

    client.send("a3 CHECK\r\n").await;
    assert_eq!("a3 OK CHECK Completed\r\n", client.line().await);
}

#[tokio::test]
async fn starttls_refused_on_plaintext_listener() {
    let addr = start_server(plaintext_listener(), empty_store()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("a1 STARTTLS\r\n").await;
    assert_eq!("a1 BAD STARTTLS not available\r\n", client.line().await);
}
