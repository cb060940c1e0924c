// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use morel_db::Database;
use morel_kernel::{World, WorldOptions, autosave};

mod config;
mod listen;
mod ops;

#[derive(Parser, Debug)]
#[command(about = "Launch a morel server.")]
struct Args {
    #[arg(short, long, help = "path to a config.toml")]
    config: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,
}

fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let args = Args::parse();
    let config = Arc::new(config::load(args.config.as_deref())?);
    let debug = args.debug || config.debug;

    init_tracing(&config, debug);

    let db = Arc::new(Database::new());
    match db.load_if_present(&config.db_file) {
        Ok(true) => info!("Database successfully loaded."),
        Ok(false) => info!("Database not found, starting fresh."),
        // a corrupt snapshot must not stop the server; it runs with
        // whatever loaded (nothing), and the atomic-rename discipline has
        // kept the file itself intact for inspection
        Err(e) => error!("database load failed, starting fresh: {e}"),
    }

    let world = World::boot(
        db,
        WorldOptions {
            debug,
            db_path: config.db_file.clone(),
            autosave_period: Duration::from_secs(config.autosave_period),
        },
    );
    autosave::spawn_autosave(world.clone());

    let kill = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, kill.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, kill.clone())?;

    info!(
        "Starting server on {}:{}",
        config.listen_address, config.listen_port
    );
    if let Err(e) = listen::serve(world.clone(), config.clone(), kill.clone()) {
        error!("listener failed: {e}");
        kill.store(true, Ordering::SeqCst);
    }

    info!("closing the server...");
    world.sessions.broadcast("Shutting down...");
    world.sessions.shutdown_all();
    if let Err(e) = world.db.dump(&config.db_file) {
        warn!("final dump failed: {e}");
    }
    info!("Done.");
    Ok(())
}

fn init_tracing(config: &config::Config, debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    if config.log_file.as_os_str().is_empty() {
        let subscriber = tracing_subscriber::fmt()
            .compact()
            .with_thread_names(true)
            .with_max_level(level)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Unable to configure logging");
        return;
    }

    match std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&config.log_file)
    {
        Ok(file) => {
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .with_ansi(false)
                .with_thread_names(true)
                .with_max_level(level)
                .with_writer(Arc::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .expect("Unable to configure logging");
        }
        Err(e) => {
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .with_thread_names(true)
                .with_max_level(level)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .expect("Unable to configure logging");
            warn!(path = %config.log_file.display(), "cannot open log file, using stdout: {e}");
        }
    }
}
