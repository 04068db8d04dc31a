//! Daemon configuration loaded from the environment
//!
//! - `HOTKEY_TOGGLE_SOCKET`: control socket path
//! - `HOTKEY_TOGGLE_STOP_CHORD`: chord that stops the daemon
//! - `HOTKEY_TOGGLE_BINDINGS`: `;`-separated `chord[:flag,...]` entries
//! - `HOTKEY_TOGGLE_DEBUG`: `1`/`true` for verbose controller logging

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::binding::BehaviorOptions;

/// Stop chord used when none is configured
pub const DEFAULT_STOP_CHORD: &str = "ctrl+f12";

/// One binding declared in configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub chord: String,
    pub options: BehaviorOptions,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for control requests
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Chord that stops the daemon
    pub stop_chord: String,

    /// Bindings to register at startup
    pub bindings: Vec<BindingSpec>,

    /// Verbose controller logging
    pub log_debug: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("hotkey-toggle");

        let socket_path = match std::env::var_os("HOTKEY_TOGGLE_SOCKET") {
            Some(path) => PathBuf::from(path),
            None => data_dir.join("control.sock"),
        };

        let stop_chord = std::env::var("HOTKEY_TOGGLE_STOP_CHORD")
            .ok()
            .filter(|chord| !chord.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STOP_CHORD.to_string());

        let bindings = match std::env::var("HOTKEY_TOGGLE_BINDINGS") {
            Ok(raw) => parse_bindings(&raw)?,
            Err(_) => Vec::new(),
        };

        let log_debug = std::env::var("HOTKEY_TOGGLE_DEBUG")
            .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            socket_path,
            data_dir,
            stop_chord,
            bindings,
            log_debug,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Parse `chord[:flag,...];chord[:flag,...]`
///
/// Flags: `repeat=<ms>`, `one_state`, `wait_for_release`, `debug`.
pub fn parse_bindings(raw: &str) -> Result<Vec<BindingSpec>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_binding)
        .collect()
}

fn parse_binding(entry: &str) -> Result<BindingSpec> {
    let (chord, flags) = match entry.split_once(':') {
        Some((chord, flags)) => (chord.trim(), flags),
        None => (entry, ""),
    };
    if chord.is_empty() {
        bail!("binding entry '{entry}' has no chord");
    }

    let mut options = BehaviorOptions::default();
    for flag in flags.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match flag.split_once('=') {
            Some(("repeat", ms)) => {
                let ms: u64 = ms
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid repeat delay in '{entry}'"))?;
                options = options.repeat_every(Duration::from_millis(ms));
            }
            None if flag == "one_state" => options = options.one_state(true),
            None if flag == "wait_for_release" => options = options.wait_for_release(true),
            None if flag == "debug" => options = options.log_debug(true),
            _ => bail!("unknown flag '{flag}' for chord '{chord}'"),
        }
    }

    Ok(BindingSpec {
        chord: chord.to_string(),
        options,
    })
}
