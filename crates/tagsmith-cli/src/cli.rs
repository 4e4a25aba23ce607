use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tagsmith")]
#[command(author, version, about = "Write figurine images onto NTAG215 tags")]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Store configuration file (TOML)
    #[arg(long, global = true, env = "TAGSMITH_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Directory holding figure dumps and the key file
    #[arg(long, global = true, env = "TAGSMITH_ROOT")]
    pub(crate) root: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the write password for a tag serial
    Password {
        /// 7-byte serial in hex (e.g. 04112233445566)
        serial: String,
    },

    /// Describe a 540-byte tag dump
    Inspect {
        /// Dump file
        dump: PathBuf,

        /// Print every page
        #[arg(long)]
        pages: bool,
    },

    /// Write an image onto a simulated blank tag
    Simulate {
        /// Figure file inside the root directory; a blank image when omitted
        figure: Option<PathBuf>,

        /// Serial of the simulated tag in hex
        #[arg(long, default_value = "04112233445566")]
        serial: String,

        /// Fail the WRITE to this page
        #[arg(long)]
        fail_at: Option<u8>,

        /// Capability-container size byte in hex
        #[arg(long, default_value = "3e")]
        size_byte: String,
    },
}
