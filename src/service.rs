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

//! systemd service installation and lifecycle. The unit restarts the
//! daemon on failure and orders it after `uni-sync.service` so the
//! controllers are programmed once before curve control takes over.

use std::path::Path;
use std::process::Command;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const SERVICE_NAME: &str = "uni-curve.service";
const UNIT_PATH: &str = "/etc/systemd/system/uni-curve.service";
const DAEMON_DEST: &str = "/usr/local/bin/uni-curved";

fn systemd_service(daemon_path: &str) -> String {
    format!(
        r#"[Unit]
Description=Uni-Sync Temperature Curve Daemon
After=network.target uni-sync.service

[Service]
Type=simple
ExecStart={}
Restart=always
RestartSec=5

[Install]
WantedBy=multi-user.target
"#,
        daemon_path
    )
}

pub fn is_service_installed() -> bool {
    Path::new(UNIT_PATH).exists()
}

pub fn is_service_running() -> bool {
    Command::new("systemctl")
        .args(["is-active", "--quiet", SERVICE_NAME])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Version reported by the installed daemon binary, or `None` when the
/// binary is missing or does not answer `--version`.
pub fn installed_version() -> Option<String> {
    if !Path::new(DAEMON_DEST).exists() {
        return None;
    }
    let output = Command::new(DAEMON_DEST).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

/// Last whitespace-separated token of the first line: `uni-curved 1.1.0`
/// reports `1.1.0`, a bare version string reports itself.
fn parse_version_line(s: &str) -> Option<String> {
    s.lines()
        .next()?
        .split_whitespace()
        .last()
        .map(str::to_string)
}

/// The gate is exact string equality: any difference in the reported
/// version, in either direction, means reinstall.
pub fn is_installed_current() -> bool {
    installed_version().as_deref() == Some(VERSION)
}

pub fn needs_install() -> bool {
    !is_service_installed() || !is_installed_current()
}

/// Install the running binary to the system path plus the systemd unit,
/// then enable and (re)start it. One combined privileged script, through
/// pkexec when not already root.
pub fn install_service() -> Result<(), String> {
    let exe = std::env::current_exe()
        .map_err(|e| format!("Could not determine current executable: {}", e))?;
    let unit = systemd_service(DAEMON_DEST);
    let temp_file = "/tmp/uni-curve.service";
    std::fs::write(temp_file, &unit).map_err(|e| format!("Failed to write temp file: {}", e))?;

    let script = format!(
        r#"
        cp '{}' '{}' && \
        chmod 755 '{}' && \
        chown root:root '{}' && \
        cp {} {} && \
        chmod 644 {} && \
        systemctl daemon-reload && \
        systemctl enable {} && \
        systemctl restart {}
    "#,
        exe.display(),
        DAEMON_DEST,
        DAEMON_DEST,
        DAEMON_DEST,
        temp_file,
        UNIT_PATH,
        UNIT_PATH,
        SERVICE_NAME,
        SERVICE_NAME
    );

    let result = run_privileged(&script);
    let _ = std::fs::remove_file(temp_file);
    result
}

pub fn uninstall_service() -> Result<(), String> {
    let script = format!(
        r#"
        systemctl stop {} 2>/dev/null || true
        systemctl disable {} 2>/dev/null || true
        rm -f {}
        rm -f {}
        systemctl daemon-reload
    "#,
        SERVICE_NAME, SERVICE_NAME, UNIT_PATH, DAEMON_DEST
    );
    run_privileged(&script)
}

pub fn start_service() -> Result<(), String> {
    run_privileged(&format!("systemctl start {}", SERVICE_NAME))
}

pub fn stop_service() -> Result<(), String> {
    run_privileged(&format!("systemctl stop {}", SERVICE_NAME))
}

pub fn restart_service() -> Result<(), String> {
    run_privileged(&format!("systemctl restart {}", SERVICE_NAME))
}

/// One-line status for the editor and the `status` subcommand.
pub fn get_service_status() -> String {
    if !is_service_installed() {
        return "Not installed".to_string();
    }
    let installed = installed_version();
    let current = installed.as_deref() == Some(VERSION);
    match (is_service_running(), current) {
        (true, true) => format!("Running (v{})", VERSION),
        (true, false) => format!(
            "Running (v{}, v{} available)",
            installed.as_deref().unwrap_or("unknown"),
            VERSION
        ),
        (false, _) => "Stopped".to_string(),
    }
}

/// Run a shell script with root privileges: directly when already root,
/// through pkexec otherwise.
fn run_privileged(script: &str) -> Result<(), String> {
    let output = if unsafe { libc::geteuid() } == 0 {
        Command::new("sh").args(["-c", script]).output()
    } else {
        Command::new("pkexec").args(["sh", "-c", script]).output()
    }
    .map_err(|e| format!("Failed to run privileged command: {}", e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "Privileged command failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
