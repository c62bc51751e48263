//! CLI struct definitions for the docshift command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "docshift",
    version = env!("CARGO_PKG_VERSION"),
    about = "Versioned-document migration engine: detect a file's embedded schema version and walk it up to a target version through single-step transforms."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

/// Flags configuring which version detectors get registered. Trust order:
/// the path query outranks the regex, and the assumed fallback comes last.
#[derive(clap::Args, Debug)]
pub(crate) struct DetectorCli {
    /// Path query locating the version marker (e.g. "/configuration/@version").
    #[clap(long, default_value = "/*/@version")]
    pub query: String,
    /// Regex fallback whose first capture group is the version.
    #[clap(long)]
    pub regex: Option<String>,
    /// Treat files no detector recognizes as this version.
    #[clap(long)]
    pub assume: Option<i32>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ProgramsCli {
    /// Directory of extra transform programs (migrate_<from>_<to>.toml),
    /// registered on top of the stock set.
    #[clap(long)]
    pub programs: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Report the detected version of a document (-1 when unknown).
    VersionOf {
        file: PathBuf,
        #[clap(flatten)]
        detect: DetectorCli,
    },
    /// Check whether a document needs migration to reach the target.
    Check {
        file: PathBuf,
        /// Version the document should be at.
        #[clap(long)]
        target: i32,
        #[clap(flatten)]
        detect: DetectorCli,
    },
    /// Migrate a document in place up to the target version.
    Migrate {
        file: PathBuf,
        /// Version to migrate to.
        #[clap(long)]
        target: i32,
        #[clap(flatten)]
        detect: DetectorCli,
        #[clap(flatten)]
        programs: ProgramsCli,
    },
    /// Report the highest version reachable with the registered programs,
    /// without touching the file.
    Reach {
        file: PathBuf,
        /// Version the document should eventually reach.
        #[clap(long)]
        target: i32,
        #[clap(flatten)]
        detect: DetectorCli,
        #[clap(flatten)]
        programs: ProgramsCli,
    },
    /// List the transform programs compiled into the binary.
    Programs,
}
