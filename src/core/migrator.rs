//! The file migration engine.
//!
//! A [`Migrator`] owns a target version, a source file path, and the
//! registered detection and migration strategies. It detects the file's
//! current version, then walks a chain of single-step migrations until the
//! target is reached, keeping crash-safe artifacts next to the source file
//! along the way:
//!
//! - `<source>.bak` — verbatim snapshot taken before the first step
//! - `<source>.Migrate_<from>_<to>` — output of one intermediate step
//!
//! On success exactly one file remains, the migrated source. On failure the
//! original file is untouched and the backup plus the last completed
//! work-in-progress file are deliberately left on disk, trading tidiness
//! for forensic visibility into how far the chain got.

use crate::core::error::DocshiftError;
use crate::core::strategy::MigrationStrategy;
use crate::core::version::VersionStrategy;
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

/// Sentinel returned when no detection strategy recognizes the file.
///
/// Deliberately a value rather than an error: callers routinely probe
/// files of unknown provenance, and "nobody recognized it" is an answer,
/// not a failure. Kept for compatibility even though an error has been
/// debated.
pub const UNKNOWN_VERSION: i32 = -1;

/// Shared strategy bank used by the file and folder migrators.
pub(crate) struct StrategySet {
    versions: Vec<Box<dyn VersionStrategy>>,
    steps: Vec<Box<dyn MigrationStrategy>>,
}

impl StrategySet {
    pub(crate) fn new() -> Self {
        StrategySet {
            versions: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub(crate) fn add_version_strategy(&mut self, strategy: Box<dyn VersionStrategy>) {
        self.versions.push(strategy);
    }

    pub(crate) fn add_migration_strategy(&mut self, strategy: Box<dyn MigrationStrategy>) {
        self.steps.push(strategy);
    }

    /// First-success-wins fold over the detectors, highest trust first.
    /// The sort is stable, so equal trust keeps registration order. A
    /// detector error means "not my kind of file" and falls through.
    pub(crate) fn file_version(&self, path: &Path) -> i32 {
        let mut ordered: Vec<&Box<dyn VersionStrategy>> = self.versions.iter().collect();
        ordered.sort_by_key(|s| Reverse(s.good_to_version()));
        for strategy in ordered {
            if let Ok(version) = strategy.file_version(path) {
                return version;
            }
        }
        UNKNOWN_VERSION
    }

    /// Step continuing the chain from `version`. Last registered wins when
    /// duplicates share a (from, to) pair.
    pub(crate) fn step_from(&self, version: i32) -> Option<&dyn MigrationStrategy> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.from_version() == version)
            .map(|s| s.as_ref())
    }
}

/// Migrates one file up to a target version through registered single-step
/// strategies.
pub struct Migrator {
    to_version: i32,
    source: PathBuf,
    strategies: StrategySet,
}

impl Migrator {
    pub fn new(to_version: i32, source_file_path: impl Into<PathBuf>) -> Self {
        Migrator {
            to_version,
            source: source_file_path.into(),
            strategies: StrategySet::new(),
        }
    }

    pub fn add_version_strategy(&mut self, strategy: Box<dyn VersionStrategy>) {
        self.strategies.add_version_strategy(strategy);
    }

    pub fn add_migration_strategy(&mut self, strategy: Box<dyn MigrationStrategy>) {
        self.strategies.add_migration_strategy(strategy);
    }

    pub fn to_version(&self) -> i32 {
        self.to_version
    }

    pub fn source_file_path(&self) -> &Path {
        &self.source
    }

    /// `<source>.bak` — the pre-migration snapshot location.
    pub fn backup_file_path(&self) -> PathBuf {
        append_to_file_name(&self.source, ".bak")
    }

    fn working_file_path(&self, from: i32, to: i32) -> PathBuf {
        append_to_file_name(&self.source, &format!(".Migrate_{}_{}", from, to))
    }

    /// Detected version of the source file, or [`UNKNOWN_VERSION`] when no
    /// strategy recognizes it.
    pub fn file_version(&self) -> i32 {
        self.strategies.file_version(&self.source)
    }

    pub fn needs_migration(&self) -> bool {
        self.file_version() != self.to_version
    }

    /// Highest version reachable from the detected one by following
    /// consecutive registered steps. Pure: no transform runs and nothing
    /// is written. A file with a known version but no applicable step
    /// reports its own version; an unrecognized file reports
    /// [`UNKNOWN_VERSION`].
    pub fn maximum_reachable_version(&self) -> i32 {
        let mut version = self.file_version();
        if version == UNKNOWN_VERSION {
            return UNKNOWN_VERSION;
        }
        while let Some(step) = self.strategies.step_from(version) {
            version = step.to_version();
        }
        version
    }

    /// Run the migration chain and promote the result over the source
    /// file.
    ///
    /// Must only be called when [`needs_migration`](Self::needs_migration)
    /// is true; calling it on an up-to-date file is a programming error
    /// and fails with `AlreadyAtTarget` before anything is written.
    ///
    /// A chain gap fails with `MissingStrategy` and leaves the source
    /// file, the backup, and the last completed work-in-progress file on
    /// disk. Transform failures propagate unwrapped.
    pub fn migrate(&self) -> Result<(), DocshiftError> {
        let current = self.file_version();
        if current == self.to_version {
            return Err(DocshiftError::AlreadyAtTarget(self.to_version));
        }

        // A stale backup from a prior aborted run is overwritten, not an
        // error.
        fs::copy(&self.source, self.backup_file_path())?;

        let mut cursor_version = current;
        let mut cursor_path = self.source.clone();
        while cursor_version != self.to_version {
            let step = self
                .strategies
                .step_from(cursor_version)
                .ok_or(DocshiftError::MissingStrategy(cursor_version))?;
            let next_path = self.working_file_path(cursor_version, step.to_version());
            step.migrate(&cursor_path, &next_path)?;
            if cursor_path != self.source {
                fs::remove_file(&cursor_path)?;
            }
            cursor_version = step.to_version();
            cursor_path = next_path;
        }

        fs::copy(&cursor_path, &self.source)?;
        fs::remove_file(&cursor_path)?;
        fs::remove_file(self.backup_file_path())?;
        Ok(())
    }
}

/// `somefile.xml` + `.bak` -> `somefile.xml.bak`, preserving the full
/// original name as the prefix. This naming is a compatibility contract.
fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::DefaultVersion;

    #[test]
    fn artifact_names_extend_the_source_path() {
        let migrator = Migrator::new(3, "/tmp/some.file.xml");
        assert_eq!(
            migrator.backup_file_path(),
            PathBuf::from("/tmp/some.file.xml.bak")
        );
        assert_eq!(
            migrator.working_file_path(1, 2),
            PathBuf::from("/tmp/some.file.xml.Migrate_1_2")
        );
    }

    #[test]
    fn detection_with_no_strategies_is_unknown() {
        let migrator = Migrator::new(3, "somefile");
        assert_eq!(migrator.file_version(), UNKNOWN_VERSION);
    }

    #[test]
    fn equal_trust_keeps_registration_order() {
        let mut migrator = Migrator::new(10, "somefile");
        migrator.add_version_strategy(Box::new(DefaultVersion::new(4, 10)));
        migrator.add_version_strategy(Box::new(DefaultVersion::new(8, 10)));
        assert_eq!(migrator.file_version(), 4);
    }
}
