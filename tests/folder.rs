use docshift::core::error::DocshiftError;
use docshift::core::folder::FolderMigrator;
use docshift::core::strategy::{MigrationStrategy, TransformStrategy};
use docshift::core::version::PathQueryVersion;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::tempdir;

const PROGRAM_1_TO_2: &str = r#"
[[rule]]
element = "configuration"
when = { version = "1" }
set = { version = "2" }
"#;

const PROGRAM_2_TO_3: &str = r#"
[[rule]]
element = "configuration"
when = { version = "2" }
set = { version = "3" }
"#;

fn xml_at_version(version: i32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<configuration version=\"{}\">\n  <blah />\n</configuration>\n",
        version
    )
}

fn query_detector(good_to: i32) -> Box<PathQueryVersion> {
    Box::new(PathQueryVersion::new(good_to, "/configuration/@version").expect("valid query"))
}

fn step(from: i32, to: i32, program: &str) -> Box<TransformStrategy> {
    Box::new(TransformStrategy::from_program(from, to, program).expect("valid step"))
}

fn detected_version(path: &Path) -> i32 {
    let probe = PathQueryVersion::new(99, "/configuration/@version").expect("valid query");
    use docshift::core::version::VersionStrategy;
    probe.file_version(path).unwrap_or(-1)
}

#[test]
fn folder_migrates_mixed_versions_and_skips_non_matching_files() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("a.xml"), xml_at_version(1)).expect("write a");
    fs::write(tmp.path().join("b.xml"), xml_at_version(2)).expect("write b");
    fs::write(tmp.path().join("note.txt"), "not a document\n").expect("write note");

    let mut migrator = FolderMigrator::new(3, tmp.path());
    migrator.set_search_pattern("*.xml");
    migrator.add_version_strategy(query_detector(3));
    migrator.add_migration_strategy(step(1, 2, PROGRAM_1_TO_2));
    migrator.add_migration_strategy(step(2, 3, PROGRAM_2_TO_3));

    migrator.migrate().expect("folder migration");

    assert_eq!(detected_version(&tmp.path().join("a.xml")), 3);
    assert_eq!(detected_version(&tmp.path().join("b.xml")), 3);
    assert_eq!(
        fs::read_to_string(tmp.path().join("note.txt")).expect("note"),
        "not a document\n"
    );
    assert!(
        !tmp.path().join("Migration").exists(),
        "staging tree must be removed on success"
    );
}

#[test]
fn folder_already_at_target_is_a_no_op() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("a.xml"), xml_at_version(3)).expect("write");

    let mut migrator = FolderMigrator::new(3, tmp.path());
    migrator.set_search_pattern("*.xml");
    migrator.add_version_strategy(query_detector(3));

    migrator.migrate().expect("no-op");
    assert_eq!(detected_version(&tmp.path().join("a.xml")), 3);
}

#[test]
fn missing_folder_is_a_no_op() {
    let tmp = tempdir().expect("tempdir");
    let mut migrator = FolderMigrator::new(3, tmp.path().join("never-created"));
    migrator.add_version_strategy(query_detector(3));
    migrator.migrate().expect("missing folder is fine");
}

#[test]
fn empty_folder_is_a_no_op() {
    let tmp = tempdir().expect("tempdir");
    let mut migrator = FolderMigrator::new(3, tmp.path());
    migrator.set_search_pattern("*.xml");
    migrator.add_version_strategy(query_detector(3));
    migrator.migrate().expect("empty folder is fine");
}

#[test]
fn folder_with_chain_gap_fails_and_keeps_originals() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("a.xml"), xml_at_version(1)).expect("write");

    let mut migrator = FolderMigrator::new(3, tmp.path());
    migrator.set_search_pattern("*.xml");
    migrator.add_version_strategy(query_detector(3));
    migrator.add_migration_strategy(step(1, 2, PROGRAM_1_TO_2));

    let err = migrator.migrate().unwrap_err();
    assert!(matches!(err, DocshiftError::MissingStrategy(2)));
    assert_eq!(detected_version(&tmp.path().join("a.xml")), 1);
}

#[test]
fn folder_stalls_when_a_step_does_not_advance_its_files() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("a.xml"), xml_at_version(1)).expect("write");

    let mut migrator = FolderMigrator::new(2, tmp.path());
    migrator.set_search_pattern("*.xml");
    migrator.add_version_strategy(query_detector(2));
    // A step with no rules copies the document verbatim, so the version
    // marker never moves.
    migrator.add_migration_strategy(step(1, 2, ""));

    let err = migrator.migrate().unwrap_err();
    assert!(matches!(err, DocshiftError::MigrationStalled(1)));
}

struct FailingPostMigrate {
    inner: TransformStrategy,
}

impl MigrationStrategy for FailingPostMigrate {
    fn from_version(&self) -> i32 {
        self.inner.from_version()
    }

    fn to_version(&self) -> i32 {
        self.inner.to_version()
    }

    fn migrate(&self, source: &Path, dest: &Path) -> Result<(), DocshiftError> {
        self.inner.migrate(source, dest)
    }

    fn post_migrate(&self, _source_dir: &Path, _dest_dir: &Path) -> Result<(), DocshiftError> {
        Err(DocshiftError::ProgramError("post-migrate cleanup failed".to_string()))
    }
}

#[test]
fn post_migrate_failures_become_problems_not_aborts() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("a.xml"), xml_at_version(1)).expect("write");

    let collected: Rc<RefCell<Vec<PathBuf>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&collected);

    let mut migrator = FolderMigrator::new(2, tmp.path());
    migrator.set_search_pattern("*.xml");
    migrator.add_version_strategy(query_detector(2));
    migrator.add_migration_strategy(Box::new(FailingPostMigrate {
        inner: TransformStrategy::from_program(1, 2, PROGRAM_1_TO_2).expect("step"),
    }));
    migrator.on_problem(Box::new(move |problems| {
        sink.borrow_mut()
            .extend(problems.iter().map(|p| p.path.clone()));
    }));

    migrator.migrate().expect("problems are non-fatal");
    assert_eq!(detected_version(&tmp.path().join("a.xml")), 2);
    assert_eq!(collected.borrow().len(), 1);
}
