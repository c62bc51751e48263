//! Folder migration: bring every matching file in a directory up to the
//! target version.
//!
//! Files migrate in rounds. Each round finds the lowest version present,
//! runs the single step registered from that version on every file of that
//! version, and copies everything else through, staging the round's output
//! under `<dir>/Migration/<from>_<to>/`. A full snapshot of the folder is
//! kept under `<dir>/Migration/Backup/` until the run completes. Rounds
//! repeat until the lowest version equals the target.

use crate::core::error::DocshiftError;
use crate::core::migrator::StrategySet;
use crate::core::strategy::MigrationStrategy;
use crate::core::version::VersionStrategy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// A non-fatal issue hit while migrating a folder, reported through the
/// problem handler after the run.
pub struct FolderProblem {
    /// The round directory being processed when the problem occurred.
    pub path: PathBuf,
    pub error: DocshiftError,
}

pub type ProblemHandler = Box<dyn Fn(&[FolderProblem])>;

const MIGRATION_DIR: &str = "Migration";
const BACKUP_DIR: &str = "Backup";

pub struct FolderMigrator {
    to_version: i32,
    source_dir: PathBuf,
    search_pattern: String,
    strategies: StrategySet,
    problem_handler: Option<ProblemHandler>,
}

impl FolderMigrator {
    pub fn new(to_version: i32, source_dir: impl Into<PathBuf>) -> Self {
        FolderMigrator {
            to_version,
            source_dir: source_dir.into(),
            search_pattern: "*".to_string(),
            strategies: StrategySet::new(),
            problem_handler: None,
        }
    }

    /// Glob-lite pattern selecting which files migrate (`*` and `?`
    /// wildcards, e.g. `*.xml`). Everything else rides along untouched.
    pub fn set_search_pattern(&mut self, pattern: impl Into<String>) {
        self.search_pattern = pattern.into();
    }

    /// Install a callback receiving the problems collected during a run
    /// (currently: `post_migrate` failures). Without one, problems are
    /// dropped.
    pub fn on_problem(&mut self, handler: ProblemHandler) {
        self.problem_handler = Some(handler);
    }

    pub fn add_version_strategy(&mut self, strategy: Box<dyn VersionStrategy>) {
        self.strategies.add_version_strategy(strategy);
    }

    pub fn add_migration_strategy(&mut self, strategy: Box<dyn MigrationStrategy>) {
        self.strategies.add_migration_strategy(strategy);
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Run the folder migration. A missing or empty source folder is a
    /// no-op, as is a folder already at the target version.
    pub fn migrate(&self) -> Result<(), DocshiftError> {
        let migration_root = self.source_dir.join(MIGRATION_DIR);
        // Leftover staging from a prior aborted run is discarded.
        if migration_root.exists() {
            fs::remove_dir_all(&migration_root)?;
        }

        if !self.source_dir.exists() {
            return Ok(());
        }

        let pattern = compile_pattern(&self.search_pattern)?;
        let versions = self.versions_in(&self.source_dir, &pattern)?;
        let Some(lowest) = versions.iter().map(|(_, v)| *v).min() else {
            return Ok(());
        };
        if lowest == self.to_version {
            return Ok(());
        }

        let backup_dir = migration_root.join(BACKUP_DIR);
        copy_dir_excluding(&self.source_dir, &backup_dir, &migration_root)?;

        let mut problems = Vec::new();
        let mut current_dir = backup_dir;
        let mut previous_lowest: Option<i32> = None;
        loop {
            let versions = self.versions_in(&current_dir, &pattern)?;
            let Some(lowest) = versions.iter().map(|(_, v)| *v).min() else {
                break;
            };
            if lowest == self.to_version {
                break;
            }
            // Guard against a step that fails to advance its own files;
            // without this the loop would spin forever.
            if previous_lowest == Some(lowest) {
                return Err(DocshiftError::MigrationStalled(lowest));
            }

            let step = self
                .strategies
                .step_from(lowest)
                .ok_or(DocshiftError::MissingStrategy(lowest))?;
            let dest_dir =
                migration_root.join(format!("{}_{}", step.from_version(), step.to_version()));
            fs::create_dir_all(&dest_dir)?;

            for (file, version) in &versions {
                let name = file.file_name().ok_or_else(|| {
                    DocshiftError::ProgramError(format!("unnameable file: {}", file.display()))
                })?;
                let target = dest_dir.join(name);
                if *version == lowest {
                    step.migrate(file, &target)?;
                } else {
                    fs::copy(file, &target)?;
                }
            }

            if let Err(error) = step.post_migrate(&current_dir, &dest_dir) {
                problems.push(FolderProblem {
                    path: current_dir.clone(),
                    error,
                });
            }

            previous_lowest = Some(lowest);
            current_dir = dest_dir;
        }

        // Promote: swap the migrated files into the source folder, then
        // drop the staging tree.
        for (file, _) in self.versions_in(&self.source_dir, &pattern)? {
            fs::remove_file(file)?;
        }
        for entry in fs::read_dir(&current_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::copy(entry.path(), self.source_dir.join(entry.file_name()))?;
            }
        }
        fs::remove_dir_all(&migration_root)?;

        if !problems.is_empty() {
            if let Some(handler) = &self.problem_handler {
                handler(&problems);
            }
        }
        Ok(())
    }

    /// Detected version of every matching file directly under `dir`.
    /// Unrecognized files participate as version `-1`; a chain starting
    /// there simply has no registered step.
    fn versions_in(
        &self,
        dir: &Path,
        pattern: &Regex,
    ) -> Result<Vec<(PathBuf, i32)>, DocshiftError> {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if pattern.is_match(&name.to_string_lossy()) {
                let path = entry.path();
                let version = self.strategies.file_version(&path);
                found.push((path, version));
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Compile a `*`/`?` glob into an anchored regex.
fn compile_pattern(pattern: &str) -> Result<Regex, DocshiftError> {
    let mut translated = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).map_err(|e| DocshiftError::QueryError(e.to_string()))
}

/// Recursively copy `source` into `target`, skipping `exclude` (the
/// staging tree lives inside the folder being backed up).
fn copy_dir_excluding(source: &Path, target: &Path, exclude: &Path) -> Result<(), DocshiftError> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        if path == exclude {
            continue;
        }
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_excluding(&path, &dest, exclude)?;
        } else {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_lite_translation() {
        let re = compile_pattern("*.xml").unwrap();
        assert!(re.is_match("a.xml"));
        assert!(re.is_match("a.b.xml"));
        assert!(!re.is_match("a.xml.bak"));
        assert!(!re.is_match("axml"));

        let re = compile_pattern("data?.txt").unwrap();
        assert!(re.is_match("data1.txt"));
        assert!(!re.is_match("data12.txt"));
    }
}
