//! Migration step strategies.
//!
//! A strategy migrates a document from exactly one version to the next,
//! reading the whole source and writing a complete destination. The source
//! file is never opened for writing, so a failed step can not corrupt it.
//!
//! Two implementations ship with the crate:
//! - [`TransformStrategy`] applies a declarative transform program, loaded
//!   from the stock registry, a literal string, or a file.
//! - [`StreamStrategy`] walks the token stream and lets an injected hook
//!   rewrite individual nodes, for edits too fine-grained to express as a
//!   whole-document program.

use crate::core::assets;
use crate::core::error::DocshiftError;
use crate::core::transform::TransformProgram;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A single registered transform from one exact version to the next.
pub trait MigrationStrategy {
    fn from_version(&self) -> i32;
    fn to_version(&self) -> i32;

    /// Produce `dest` from `source`. Must not mutate `source`.
    fn migrate(&self, source: &Path, dest: &Path) -> Result<(), DocshiftError>;

    /// Called by the folder migrator once per round, after every matching
    /// file has been migrated. Errors are collected as problems rather than
    /// aborting the run.
    fn post_migrate(&self, _source_dir: &Path, _dest_dir: &Path) -> Result<(), DocshiftError> {
        Ok(())
    }
}

/// Steps only ever move the version forward.
fn check_step_order(from: i32, to: i32) -> Result<(), DocshiftError> {
    if to <= from {
        return Err(DocshiftError::BackwardMigration { from, to });
    }
    Ok(())
}

/// Where a [`TransformStrategy`] finds its program.
#[derive(Debug)]
pub enum ProgramSource {
    /// The compiled-in registry, keyed by (from, to). See `core::assets`.
    Stock,
    /// A program supplied as a string, e.g. from a test.
    Literal(String),
    /// A program loaded from disk at migrate time.
    File(PathBuf),
}

/// Applies a declarative transform program (see `core::transform`).
#[derive(Debug)]
pub struct TransformStrategy {
    from: i32,
    to: i32,
    source: ProgramSource,
}

impl TransformStrategy {
    /// Strategy backed by the stock program for `(from, to)`. The program
    /// is resolved lazily; a missing registry entry surfaces as a
    /// `ProgramError` when the step actually runs.
    pub fn stock(from: i32, to: i32) -> Result<Self, DocshiftError> {
        check_step_order(from, to)?;
        Ok(TransformStrategy {
            from,
            to,
            source: ProgramSource::Stock,
        })
    }

    pub fn from_program(
        from: i32,
        to: i32,
        program: impl Into<String>,
    ) -> Result<Self, DocshiftError> {
        check_step_order(from, to)?;
        Ok(TransformStrategy {
            from,
            to,
            source: ProgramSource::Literal(program.into()),
        })
    }

    pub fn from_path(from: i32, to: i32, path: impl Into<PathBuf>) -> Result<Self, DocshiftError> {
        check_step_order(from, to)?;
        Ok(TransformStrategy {
            from,
            to,
            source: ProgramSource::File(path.into()),
        })
    }

    fn load(&self) -> Result<TransformProgram, DocshiftError> {
        let text = match &self.source {
            ProgramSource::Stock => assets::get_program(self.from, self.to)
                .map(str::to_string)
                .ok_or_else(|| {
                    DocshiftError::ProgramError(format!(
                        "no stock transform program for {} -> {}",
                        self.from, self.to
                    ))
                })?,
            ProgramSource::Literal(text) => text.clone(),
            ProgramSource::File(path) => fs::read_to_string(path)?,
        };
        TransformProgram::parse(&text)
    }
}

impl MigrationStrategy for TransformStrategy {
    fn from_version(&self) -> i32 {
        self.from
    }

    fn to_version(&self) -> i32 {
        self.to
    }

    fn migrate(&self, source: &Path, dest: &Path) -> Result<(), DocshiftError> {
        self.load()?.apply(source, dest)
    }
}

/// A per-node rewrite hook for [`StreamStrategy`].
///
/// Return `Ok(Some(event))` to emit a replacement, `Ok(None)` to copy the
/// original through verbatim.
pub trait NodeHook {
    fn rewrite(&self, event: &Event<'_>) -> Result<Option<Event<'static>>, DocshiftError>;
}

impl<F> NodeHook for F
where
    F: Fn(&Event<'_>) -> Result<Option<Event<'static>>, DocshiftError>,
{
    fn rewrite(&self, event: &Event<'_>) -> Result<Option<Event<'static>>, DocshiftError> {
        self(event)
    }
}

/// Streaming copy with a rewrite hook: every event is offered to the hook,
/// and copied through unchanged when the hook declines.
pub struct StreamStrategy {
    from: i32,
    to: i32,
    hook: Box<dyn NodeHook>,
}

impl std::fmt::Debug for StreamStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamStrategy")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl StreamStrategy {
    pub fn new(from: i32, to: i32, hook: Box<dyn NodeHook>) -> Result<Self, DocshiftError> {
        check_step_order(from, to)?;
        Ok(StreamStrategy { from, to, hook })
    }

    /// The stock use case: rewrite `attribute` on every `element` start tag
    /// to the step's target version.
    pub fn bump_version_attribute(
        from: i32,
        to: i32,
        element: &str,
        attribute: &str,
    ) -> Result<Self, DocshiftError> {
        let hook = VersionAttributeHook {
            element: element.to_string(),
            attribute: attribute.to_string(),
            to,
        };
        StreamStrategy::new(from, to, Box::new(hook))
    }
}

impl MigrationStrategy for StreamStrategy {
    fn from_version(&self) -> i32 {
        self.from
    }

    fn to_version(&self) -> i32 {
        self.to
    }

    fn migrate(&self, source: &Path, dest: &Path) -> Result<(), DocshiftError> {
        let mut reader = Reader::from_file(source)?;
        let file = File::create(dest)?;
        let mut writer = Writer::new(BufWriter::new(file));
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                event => match self.hook.rewrite(&event)? {
                    Some(replacement) => writer.write_event(replacement)?,
                    None => writer.write_event(event)?,
                },
            }
            buf.clear();
        }
        writer.into_inner().flush()?;
        Ok(())
    }
}

struct VersionAttributeHook {
    element: String,
    attribute: String,
    to: i32,
}

impl VersionAttributeHook {
    fn rebuild(&self, element: &BytesStart<'_>) -> Result<BytesStart<'static>, DocshiftError> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut rebuilt = BytesStart::new(name);
        let mut seen = false;
        for attr in element.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == self.attribute {
                rebuilt.push_attribute((key.as_str(), self.to.to_string().as_str()));
                seen = true;
            } else {
                let value = String::from_utf8_lossy(&attr.value).into_owned();
                rebuilt.push_attribute((key.as_str(), value.as_str()));
            }
        }
        if !seen {
            rebuilt.push_attribute((self.attribute.as_str(), self.to.to_string().as_str()));
        }
        Ok(rebuilt)
    }
}

impl NodeHook for VersionAttributeHook {
    fn rewrite(&self, event: &Event<'_>) -> Result<Option<Event<'static>>, DocshiftError> {
        match event {
            Event::Start(e) if e.name().as_ref() == self.element.as_bytes() => {
                Ok(Some(Event::Start(self.rebuild(e)?)))
            }
            Event::Empty(e) if e.name().as_ref() == self.element.as_bytes() => {
                Ok(Some(Event::Empty(self.rebuild(e)?)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_backward_steps() {
        assert!(matches!(
            TransformStrategy::from_program(3, 3, ""),
            Err(DocshiftError::BackwardMigration { from: 3, to: 3 })
        ));
        assert!(TransformStrategy::from_program(3, 2, "").is_err());
        assert!(StreamStrategy::bump_version_attribute(5, 4, "c", "version").is_err());
        assert!(TransformStrategy::from_program(1, 2, "").is_ok());
    }

    #[test]
    fn stock_strategy_with_no_program_fails_at_migrate_time() {
        let step = TransformStrategy::stock(998, 999).expect("construction is order-checked only");
        let err = step.load().unwrap_err();
        assert!(matches!(err, DocshiftError::ProgramError(_)));
    }
}
