//! Shared CLI definitions for pegasus.
//!
//! Used by the main application and by the build script (manpage).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// View to open at startup.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StartView {
    /// Sites table
    Sites,
    /// Trouble tickets table
    Trb,
    /// Preventive maintenance work orders table
    Pmwo,
    /// Site work orders table
    Swo,
    /// KPI dashboard
    Dashboard,
}

/// Command-line arguments for pegasus
#[derive(Parser, Debug)]
#[command(version, about = "pegasus - passive infrastructure operations in the terminal")]
pub struct Args {
    /// Base URL of the Pegasus backend (overrides the config file)
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// View to open at startup
    #[arg(long = "view", value_enum)]
    pub view: Option<StartView>,

    /// Rows per table page (overrides the config file)
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,

    /// Per-request timeout in seconds (overrides the config file)
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Verify backend connectivity and exit
    #[arg(long = "check", action)]
    pub check: bool,

    /// Enable debug mode: debug strip in the UI and file logging
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Log file path (implies --debug)
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Write the default config file and exit
    #[arg(long = "write-config", action)]
    pub write_config: bool,

    /// With --write-config, overwrite an existing config file
    #[arg(long = "force", action)]
    pub force: bool,
}
