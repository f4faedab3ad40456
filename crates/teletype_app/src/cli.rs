//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogDestination {
    /// Write to ./teletype.log in the current directory.
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "teletype")]
#[command(about = "Retro-terminal page browser with progressive reveal", long_about = None)]
pub struct Args {
    /// Page to open on startup
    pub url: Option<String>,

    /// RON file overriding fetch, reveal and audio settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the stored sound preference
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Log destination
    #[arg(long, value_enum, default_value = "file")]
    pub log: LogDestination,

    /// Log at debug level instead of info
    #[arg(long)]
    pub verbose: bool,

    /// Write the session audio to this WAV file on exit
    #[arg(long, value_name = "PATH")]
    pub wav: Option<PathBuf>,

    /// Write the reveal transcript to this JSON file on exit
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,
}
