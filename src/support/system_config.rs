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

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::support::error::Error;

/// The system-wide configuration for Ketch.
///
/// This is stored in a file named `ketch.toml`. Each `[[listener]]` block
/// describes one listening endpoint. The listener list is fixed at startup
/// and read-only thereafter.
#[derive(Clone, Debug, Deserialize)]
pub struct SystemConfig {
    #[serde(rename = "listener")]
    pub listeners: Vec<ListenerConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListenerConfig {
    /// The address to bind, e.g. `0.0.0.0:143`.
    pub address: String,

    /// The encryption policy for connections accepted on this address.
    #[serde(default)]
    pub encryption: EncryptionPolicy,

    /// Certificate material. Required unless `encryption = "plaintext"`.
    pub tls: Option<TlsConfig>,
}

/// How connections on a listener are (or become) encrypted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionPolicy {
    /// Cleartext only. STARTTLS is not offered.
    #[default]
    Plaintext,
    /// Cleartext until the client negotiates STARTTLS. LOGIN is disabled
    /// while the connection remains cleartext.
    StartTls,
    /// TLS is established immediately on accept.
    Tls,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TlsConfig {
    /// The path to the TLS private key, which must be in PEM format.
    pub private_key: PathBuf,
    /// The path to the TLS certificate chain, which must be in PEM format.
    pub certificate_chain: PathBuf,
}

impl SystemConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let config: SystemConfig = toml::from_str(&text)?;
        Ok(config)
    }
}

impl Default for SystemConfig {
    /// One cleartext listener on the unprivileged IMAP port.
    fn default() -> Self {
        SystemConfig {
            listeners: vec![ListenerConfig {
                address: "0.0.0.0:1143".to_owned(),
                encryption: EncryptionPolicy::Plaintext,
                tls: None,
            }],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_listener_config() {
        let config: SystemConfig = toml::from_str(
            r#"
            [[listener]]
            address = "0.0.0.0:143"
            encryption = "starttls"
            [listener.tls]
            private_key = "/etc/ketch/key.pem"
            certificate_chain = "/etc/ketch/chain.pem"

            [[listener]]
            address = "0.0.0.0:993"
            encryption = "tls"
            [listener.tls]
            private_key = "/etc/ketch/key.pem"
            certificate_chain = "/etc/ketch/chain.pem"
            "#,
        )
        .unwrap();

        assert_eq!(2, config.listeners.len());
        assert_eq!("0.0.0.0:143", config.listeners[0].address);
        assert_eq!(EncryptionPolicy::StartTls, config.listeners[0].encryption);
        assert_eq!(EncryptionPolicy::Tls, config.listeners[1].encryption);
        assert!(config.listeners[0].tls.is_some());
    }

    #[test]
    fn encryption_defaults_to_plaintext() {
        let config: SystemConfig = toml::from_str(
            r#"
            [[listener]]
            address = "127.0.0.1:1143"
            "#,
        )
        .unwrap();

        assert_eq!(
            EncryptionPolicy::Plaintext,
            config.listeners[0].encryption
        );
        assert!(config.listeners[0].tls.is_none());
    }
}
