//! Docshift: a versioned-document migration engine.
//!
//! A document embeds an integer marker identifying its schema version.
//! Docshift detects that marker through pluggable strategies, then walks
//! the file up to a caller-chosen target version through a chain of
//! registered single-step transforms, keeping a backup and per-step
//! work-in-progress artifacts so a failed run never damages the original.
//!
//! # Core pieces
//!
//! - [`core::version`] — detection strategies (fixed value, path query,
//!   regex), ordered by how high a version each is trusted to recognize
//! - [`core::strategy`] — migration steps: declarative transform programs
//!   and streaming per-node rewrites
//! - [`core::migrator`] — the file engine: detection, chain walk,
//!   backup/promote lifecycle, reachability analysis
//! - [`core::folder`] — folder-level migration in lowest-version rounds
//!
//! # Library use
//!
//! ```no_run
//! use docshift::core::migrator::Migrator;
//! use docshift::core::strategy::TransformStrategy;
//! use docshift::core::version::PathQueryVersion;
//!
//! # fn main() -> Result<(), docshift::core::error::DocshiftError> {
//! let mut migrator = Migrator::new(2, "settings.xml");
//! migrator.add_version_strategy(Box::new(PathQueryVersion::new(
//!     2,
//!     "/configuration/@version",
//! )?));
//! migrator.add_migration_strategy(Box::new(TransformStrategy::stock(1, 2)?));
//! if migrator.needs_migration() {
//!     migrator.migrate()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;

mod cli;

use crate::cli::{Cli, Command, DetectorCli, ProgramsCli};
use crate::core::assets;
use crate::core::error::DocshiftError;
use crate::core::migrator::{Migrator, UNKNOWN_VERSION};
use crate::core::strategy::TransformStrategy;
use crate::core::version::{DefaultVersion, PathQueryVersion, RegexVersion};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

fn register_detectors(
    migrator: &mut Migrator,
    detect: &DetectorCli,
    good_to: i32,
) -> Result<(), DocshiftError> {
    migrator.add_version_strategy(Box::new(PathQueryVersion::new(good_to, &detect.query)?));
    if let Some(pattern) = &detect.regex {
        // Same trust as the query; stable ordering keeps the query first.
        migrator.add_version_strategy(Box::new(RegexVersion::new(good_to, pattern)?));
    }
    if let Some(version) = detect.assume {
        migrator.add_version_strategy(Box::new(DefaultVersion::new(version, 0)));
    }
    Ok(())
}

fn register_programs(
    migrator: &mut Migrator,
    programs: &ProgramsCli,
) -> Result<(), DocshiftError> {
    for (from, to) in assets::list_programs() {
        migrator.add_migration_strategy(Box::new(TransformStrategy::stock(from, to)?));
    }
    if let Some(dir) = &programs.programs {
        // User programs register after the stock set, so they win on a
        // duplicate (from, to) pair.
        for (from, to, path) in scan_program_dir(dir)? {
            migrator.add_migration_strategy(Box::new(TransformStrategy::from_path(
                from, to, path,
            )?));
        }
    }
    Ok(())
}

/// Find `migrate_<from>_<to>.toml` files directly under `dir`.
fn scan_program_dir(dir: &Path) -> Result<Vec<(i32, i32, PathBuf)>, DocshiftError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(versions) = name
            .strip_prefix("migrate_")
            .and_then(|rest| rest.strip_suffix(".toml"))
        else {
            continue;
        };
        let Some((from, to)) = versions.split_once('_') else {
            continue;
        };
        match (from.parse::<i32>(), to.parse::<i32>()) {
            (Ok(from), Ok(to)) => found.push((from, to, entry.path())),
            _ => continue,
        }
    }
    found.sort();
    Ok(found)
}

fn print_version(version: i32) {
    if version == UNKNOWN_VERSION {
        println!("{}", "-1 (version unknown)".bright_yellow());
    } else {
        println!("{}", version);
    }
}

pub fn run() -> Result<(), DocshiftError> {
    let cli = Cli::parse();

    match cli.command {
        Command::VersionOf { file, detect } => {
            let mut migrator = Migrator::new(i32::MAX, &file);
            register_detectors(&mut migrator, &detect, i32::MAX)?;
            print_version(migrator.file_version());
        }
        Command::Check {
            file,
            target,
            detect,
        } => {
            let mut migrator = Migrator::new(target, &file);
            register_detectors(&mut migrator, &detect, target)?;
            let current = migrator.file_version();
            if migrator.needs_migration() {
                println!(
                    "{} {} is at version {}, target is {}",
                    "migration needed:".bright_yellow().bold(),
                    file.display(),
                    current,
                    target
                );
            } else {
                println!(
                    "{} {} is at version {}",
                    "up to date:".bright_green().bold(),
                    file.display(),
                    target
                );
            }
        }
        Command::Migrate {
            file,
            target,
            detect,
            programs,
        } => {
            let mut migrator = Migrator::new(target, &file);
            register_detectors(&mut migrator, &detect, target)?;
            register_programs(&mut migrator, &programs)?;

            let current = migrator.file_version();
            if !migrator.needs_migration() {
                println!(
                    "{} {} is already at version {}",
                    "nothing to do:".bright_green().bold(),
                    file.display(),
                    target
                );
                return Ok(());
            }
            migrator.migrate()?;
            println!(
                "{} {} migrated {} {} {}",
                "done:".bright_green().bold(),
                file.display(),
                current,
                "->".bright_cyan(),
                target
            );
        }
        Command::Reach {
            file,
            target,
            detect,
            programs,
        } => {
            let mut migrator = Migrator::new(target, &file);
            register_detectors(&mut migrator, &detect, target)?;
            register_programs(&mut migrator, &programs)?;
            let reachable = migrator.maximum_reachable_version();
            print_version(reachable);
            if reachable != UNKNOWN_VERSION && reachable < target {
                eprintln!(
                    "{} no registered program continues past version {}",
                    "warning:".bright_yellow().bold(),
                    reachable
                );
            }
        }
        Command::Programs => {
            for (from, to) in assets::list_programs() {
                println!("{} {} {}", from, "->".bright_cyan(), to);
            }
        }
    }
    Ok(())
}
