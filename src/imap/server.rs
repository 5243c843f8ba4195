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

//! The listener and per-connection loops.
//!
//! One task accepts connections per listening endpoint; each accepted
//! connection runs its own task. Inside a connection, every command runs on
//! a producer task that streams responses into a one-slot channel which the
//! session loop drains to the socket. Commands are strictly sequential: the
//! next command is not parsed until every response of the previous one has
//! been written and, for STARTTLS, until the replacement streams are
//! installed.

use std::fs::File;
use std::io::{self, BufReader as StdBufReader};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use log::{error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

use super::commands;
use super::parser::{CommandRegistry, Parser};
use super::response::Response;
use super::session::{EncryptionLevel, Session};
use crate::store::{AuthStore, Mailstore};
use crate::support::error::Error;
use crate::support::system_config::{
    EncryptionPolicy, ListenerConfig, SystemConfig, TlsConfig,
};

/// Process-wide collaborators shared by every connection.
pub struct ServerShared {
    pub store: Arc<dyn Mailstore>,
    pub auth: Arc<dyn AuthStore>,
    pub registry: Arc<CommandRegistry>,
    next_connection_id: AtomicU64,
}

impl ServerShared {
    fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// One listening endpoint: its address, encryption policy, and certificate
/// material. Fixed at startup.
pub struct Listener {
    pub address: String,
    pub encryption: EncryptionPolicy,
    pub acceptor: Option<TlsAcceptor>,
}

pub struct Server {
    shared: Arc<ServerShared>,
    listeners: Vec<Arc<Listener>>,
}

impl Server {
    pub fn new(
        config: &SystemConfig,
        store: Arc<dyn Mailstore>,
        auth: Arc<dyn AuthStore>,
        registry: CommandRegistry,
    ) -> Result<Self, Error> {
        let shared = Arc::new(ServerShared {
            store,
            auth,
            registry: Arc::new(registry),
            next_connection_id: AtomicU64::new(1),
        });

        let mut listeners = Vec::with_capacity(config.listeners.len());
        for listener in &config.listeners {
            listeners.push(Arc::new(build_listener(listener)?));
        }

        Ok(Server { shared, listeners })
    }

    /// Bind every configured listener and serve until SIGINT or SIGTERM.
    ///
    /// Shutdown closes the listening sockets; in-flight sessions drain
    /// naturally.
    pub async fn run(self) -> Result<(), Error> {
        let accept_tasks: Arc<Mutex<Vec<JoinHandle<()>>>> =
            Arc::new(Mutex::new(Vec::new()));

        for listener in &self.listeners {
            let socket = TcpListener::bind(&listener.address).await?;
            info!("IMAP server listening on {}", listener.address);

            let handle = tokio::spawn(accept_loop(
                socket,
                Arc::clone(listener),
                Arc::clone(&self.shared),
            ));
            accept_tasks.lock().unwrap().push(handle);
        }

        wait_for_shutdown().await;
        info!("Shutting down; closing listeners");

        for handle in accept_tasks.lock().unwrap().iter() {
            handle.abort();
        }
        Ok(())
    }
}

async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Unable to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

fn build_listener(config: &ListenerConfig) -> Result<Listener, Error> {
    let acceptor = match config.encryption {
        EncryptionPolicy::Plaintext => None,
        EncryptionPolicy::StartTls | EncryptionPolicy::Tls => {
            let tls = config.tls.as_ref().ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "listener {} requires certificate material",
                        config.address
                    ),
                ))
            })?;
            Some(build_acceptor(tls)?)
        }
    };

    Ok(Listener {
        address: config.address.clone(),
        encryption: config.encryption,
        acceptor,
    })
}

fn build_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, Error> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut cert_reader =
        StdBufReader::new(File::open(&config.certificate_chain)?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()?;

    let mut key_reader = StdBufReader::new(File::open(&config.private_key)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or_else(
        || {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "no private key found in PEM file",
            ))
        },
    )?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

pub(crate) async fn accept_loop(
    socket: TcpListener,
    listener: Arc<Listener>,
    shared: Arc<ServerShared>,
) {
    loop {
        let (stream, peer) = match socket.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("IMAP accept error on {}: {}", listener.address, e);
                continue;
            }
        };

        let id = shared.next_connection_id();
        info!("IMAP ({}) accepted connection from {}", id, peer);

        let listener = Arc::clone(&listener);
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            match handle_connection(stream, id, listener, shared).await {
                Ok(()) => info!("IMAP ({}) connection closed", id),
                Err(e) => warn!("IMAP ({}) connection error: {}", id, e),
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    id: u64,
    listener: Arc<Listener>,
    shared: Arc<ServerShared>,
) -> Result<(), Error> {
    let (conn, encryption) = match listener.encryption {
        EncryptionPolicy::Tls => {
            let acceptor = listener
                .acceptor
                .clone()
                .expect("TLS listener without acceptor");
            let tls = acceptor.accept(stream).await?;
            (Conn::Tls(Box::new(tls)), EncryptionLevel::TlsActive)
        }
        _ => (Conn::Plain(stream), EncryptionLevel::Plaintext),
    };

    let session =
        Session::new(id, Arc::clone(&shared), listener, encryption);
    run_session(conn, session, &shared.registry).await
}

/// The per-connection loop: greet, then parse/execute/stream until LOGOUT
/// or a fatal error.
pub(crate) async fn run_session(
    conn: Conn,
    mut session: Session,
    registry: &Arc<CommandRegistry>,
) -> Result<(), Error> {
    let mut parser = Parser::new(conn, Arc::clone(registry));

    {
        let stream = parser.stream();
        stream
            .write_all(b"* OK IMAP4rev1 Service Ready\r\n")
            .await?;
        stream.flush().await?;
    }

    loop {
        let command = match parser.next().await {
            Ok(command) => command,
            Err(Error::Disconnected) => return Ok(()),
            Err(Error::Parse(reason)) => {
                // Parse errors are fatal: report BYE and drop the connection
                let response = Response::fatal(reason);
                let _ = response.write_to(parser.stream()).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // Run the command on its own task, streaming responses through a
        // one-slot channel
        let (sender, mut receiver) = mpsc::channel::<Response>(1);
        let mut task_session = session;
        let producer: JoinHandle<Session> = tokio::spawn(async move {
            commands::execute(command, &mut task_session, &sender).await;
            task_session
        });

        let mut close = false;
        let mut upgrade = None;
        while let Some(mut response) = receiver.recv().await {
            close |= response.is_close();
            if let Some(u) = response.take_upgrade() {
                upgrade = Some(u);
            }
            response.write_to(parser.stream()).await?;
        }

        session = match producer.await {
            Ok(session) => session,
            Err(e) => {
                error!("IMAP command task failed: {}", e);
                return Ok(());
            }
        };

        // STARTTLS: the tagged OK has been written and flushed; swap the
        // streams before anything else is read
        if let Some(upgrade) = upgrade {
            let plain = parser.replace_stream(Conn::Detached);
            match plain {
                Conn::Plain(stream) => {
                    let tls = upgrade.acceptor.accept(stream).await?;
                    parser.replace_stream(Conn::Tls(Box::new(tls)));
                    session.encryption = EncryptionLevel::TlsActive;
                    session.log("TLS negotiation complete");
                }
                other => {
                    parser.replace_stream(other);
                    session.log("STARTTLS on a non-plaintext stream");
                    return Ok(());
                }
            }
        }

        if close {
            return Ok(());
        }
    }
}

/// The connection's byte stream: cleartext, TLS, or detached mid-upgrade.
pub enum Conn {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::server::TlsStream<TcpStream>>),
    Detached,
}

impl AsyncRead for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        ctx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(stream) => Pin::new(stream).poll_read(ctx, buf),
            Conn::Tls(stream) => Pin::new(stream).poll_read(ctx, buf),
            Conn::Detached => Poll::Ready(Err(detached())),
        }
    }
}

impl AsyncWrite for Conn {
    fn poll_write(
        self: Pin<&mut Self>,
        ctx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Conn::Plain(stream) => Pin::new(stream).poll_write(ctx, buf),
            Conn::Tls(stream) => Pin::new(stream).poll_write(ctx, buf),
            Conn::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        ctx: &mut Context<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(stream) => Pin::new(stream).poll_flush(ctx),
            Conn::Tls(stream) => Pin::new(stream).poll_flush(ctx),
            Conn::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        ctx: &mut Context<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(stream) => Pin::new(stream).poll_shutdown(ctx),
            Conn::Tls(stream) => Pin::new(stream).poll_shutdown(ctx),
            Conn::Detached => Poll::Ready(Ok(())),
        }
    }
}

fn detached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream detached")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::memory::MemoryAuth;

    pub fn shared_with(store: Arc<dyn Mailstore>) -> Arc<ServerShared> {
        Arc::new(ServerShared {
            store,
            auth: Arc::new(MemoryAuth::new().add_user("test", None)),
            registry: Arc::new(CommandRegistry::standard()),
            next_connection_id: AtomicU64::new(1),
        })
    }

    pub fn plaintext_listener() -> Arc<Listener> {
        Arc::new(Listener {
            address: "127.0.0.1:0".to_owned(),
            encryption: EncryptionPolicy::Plaintext,
            acceptor: None,
        })
    }

    pub fn starttls_listener() -> Arc<Listener> {
        Arc::new(Listener {
            address: "127.0.0.1:0".to_owned(),
            encryption: EncryptionPolicy::StartTls,
            acceptor: None,
        })
    }
}
