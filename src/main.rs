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

mod imap;
mod store;
mod support;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use log::{error, info};
use structopt::StructOpt;

use crate::imap::parser::CommandRegistry;
use crate::imap::server::Server;
use crate::store::memory::{MemoryAuth, MemoryStore};
use crate::support::system_config::SystemConfig;

/// A lightweight IMAP4rev1 server.
///
/// Without a configuration file, Ketch serves an in-memory demo mailstore
/// on a cleartext listener; user `test` logs in with any password.
#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// The configuration file describing the listening endpoints.
    #[structopt(long, parse(from_os_str), default_value = "ketch.toml")]
    config: PathBuf,
}

fn main() {
    let options = Options::from_args();
    init_simple_log();

    let config = if options.config.exists() {
        match SystemConfig::load(&options.config) {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "Unable to load {}: {}",
                    options.config.display(),
                    e
                );
                process::exit(1);
            }
        }
    } else {
        info!(
            "{} not found; using the default demo configuration",
            options.config.display()
        );
        SystemConfig::default()
    };

    let store = Arc::new(MemoryStore::with_sample_data());
    let auth = Arc::new(MemoryAuth::new().add_user("test", None));

    let server = match Server::new(
        &config,
        store,
        auth,
        CommandRegistry::standard(),
    ) {
        Ok(server) => server,
        Err(e) => {
            error!("Unable to initialise server: {}", e);
            process::exit(1);
        }
    };

    serve(server);
}

#[tokio::main]
async fn serve(server: Server) {
    if let Err(e) = server.run().await {
        error!("Fatal server error: {}", e);
        process::exit(1);
    }
}

fn init_simple_log() {
    let stderr = log4rs::append::console::ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(log4rs::encode::pattern::PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();
    let log_config = log4rs::config::Config::builder()
        .appender(
            log4rs::config::Appender::builder()
                .build("stderr", Box::new(stderr)),
        )
        .build(
            log4rs::config::Root::builder()
                .appender("stderr")
                .build(log::LevelFilter::Info),
        )
        .unwrap();
    log4rs::init_config(log_config).unwrap();
}
