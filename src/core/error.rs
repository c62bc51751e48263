use quick_xml::events::attributes::AttrError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocshiftError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    AttrError(#[from] AttrError),
    #[error("Transform program error: {0}")]
    ProgramError(String),
    #[error("Malformed query: {0}")]
    QueryError(String),
    #[error("No version found: {0}")]
    VersionNotFound(String),
    #[error("File is already at target version {0}; check needs_migration() before migrating")]
    AlreadyAtTarget(i32),
    #[error("No migration strategy registered from version {0}")]
    MissingStrategy(i32),
    #[error("Migration must move the version forward: {from} -> {to}")]
    BackwardMigration { from: i32, to: i32 },
    #[error("Folder migration stalled: lowest version stayed at {0} after a full round")]
    MigrationStalled(i32),
}
