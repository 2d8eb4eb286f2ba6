/*
 * This file is part of Uni-Curved.
 *
 * Copyright (C) 2026 Uni-Curved contributors
 *
 * Uni-Curved is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Uni-Curved is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Uni-Curved. If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::Path;

use anyhow::anyhow;
use tracing::info;

use uni_curved::apply::UniSyncCommand;
use uni_curved::config::Store;
use uni_curved::daemon::Daemon;
use uni_curved::sensors::SensorReader;
use uni_curved::service;

fn print_help() {
    eprintln!("uni-curved {} - Temperature curve daemon for Uni-Sync controllers", service::VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    uni-curved [COMMAND]");
    eprintln!();
    eprintln!("COMMANDS:");
    eprintln!("    (none)          Run the control loop (requires root)");
    eprintln!("    install         Install binary and systemd service");
    eprintln!("    uninstall       Remove binary and systemd service");
    eprintln!("    status          Show service state and version");
    eprintln!("    -v, --version   Print version");
    eprintln!("    -h, --help      Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    UNI_CURVED_LOG  Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("uni-curved {}", service::VERSION);
}

fn init_logging() {
    let log_level = std::env::var("UNI_CURVED_LOG").unwrap_or_else(|_| "info".to_string());

    // Prefer journald under systemd, fall back to stdout
    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("-h") | Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("-v") | Some("--version") => {
            print_version();
            return Ok(());
        }
        Some("status") => {
            println!("{}", service::get_service_status());
            return Ok(());
        }
        Some("install") => {
            service::install_service().map_err(|e| anyhow!(e))?;
            println!("Installed and started {}", service::SERVICE_NAME);
            return Ok(());
        }
        Some("uninstall") => {
            service::uninstall_service().map_err(|e| anyhow!(e))?;
            println!("Removed {}", service::SERVICE_NAME);
            return Ok(());
        }
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            print_help();
            std::process::exit(1);
        }
        None => {}
    }

    // Daemon mode: writes /etc/uni-sync and drives the controllers
    if unsafe { libc::geteuid() } != 0 {
        eprintln!("Error: uni-curved must run as root to manage fan configuration.");
        eprintln!(
            "Run with: sudo {}",
            args.first().map(String::as_str).unwrap_or("uni-curved")
        );
        std::process::exit(1);
    }

    init_logging();
    info!("uni-curved {} starting", service::VERSION);

    let store = Store::default();
    let sensor = SensorReader::system();
    let applier = UniSyncCommand::locate();
    Daemon::new(store, Box::new(sensor), Box::new(applier)).run()
}
