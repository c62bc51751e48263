//! Declarative transform programs.
//!
//! A transform program is a list of attribute-rewrite rules applied over an
//! identity copy of an XML document: every node streams through untouched
//! unless a rule claims it. This covers the common shape of a version bump
//! (rewrite one attribute on one element, keep everything else bit-for-bit)
//! without a full template language.
//!
//! Programs are authored in TOML:
//!
//! ```toml
//! [[rule]]
//! element = "configuration"
//! when = { version = "1" }
//! set = { version = "2" }
//! ```

use crate::core::error::DocshiftError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

/// One rewrite rule. Fires on elements named `element` whose attributes
/// satisfy every `when` guard; the attributes in `set` are then added or
/// overwritten. All other attributes pass through unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRule {
    pub element: String,
    #[serde(default)]
    pub when: BTreeMap<String, String>,
    #[serde(default)]
    pub set: BTreeMap<String, String>,
}

/// A parsed transform program: rules tried in order, first match wins,
/// identity copy when nothing matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformProgram {
    #[serde(default, rename = "rule")]
    rules: Vec<RewriteRule>,
}

impl TransformProgram {
    pub fn parse(text: &str) -> Result<Self, DocshiftError> {
        toml::from_str(text).map_err(|e| DocshiftError::ProgramError(e.to_string()))
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply the program, reading `source` whole and writing a complete
    /// `dest`. `source` is never opened for writing.
    pub fn apply(&self, source: &Path, dest: &Path) -> Result<(), DocshiftError> {
        let mut reader = Reader::from_file(source)?;
        let file = File::create(dest)?;
        let mut writer = Writer::new(BufWriter::new(file));
        self.run(&mut reader, &mut writer)?;
        writer.into_inner().flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn apply_str(&self, xml: &str) -> Result<String, DocshiftError> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        let mut out = Vec::new();
        let mut writer = Writer::new(&mut out);
        self.run(&mut reader, &mut writer)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn run<R: BufRead, W: Write>(
        &self,
        reader: &mut Reader<R>,
        writer: &mut Writer<W>,
    ) -> Result<(), DocshiftError> {
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) => match self.rewrite(&e)? {
                    Some(rewritten) => writer.write_event(Event::Start(rewritten))?,
                    None => writer.write_event(Event::Start(e))?,
                },
                Event::Empty(e) => match self.rewrite(&e)? {
                    Some(rewritten) => writer.write_event(Event::Empty(rewritten))?,
                    None => writer.write_event(Event::Empty(e))?,
                },
                event => writer.write_event(event)?,
            }
            buf.clear();
        }
        Ok(())
    }

    /// Returns the rebuilt element if some rule claims it, None for pure
    /// pass-through.
    fn rewrite(
        &self,
        element: &BytesStart<'_>,
    ) -> Result<Option<BytesStart<'static>>, DocshiftError> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();

        let mut attrs: Vec<(String, String)> = Vec::new();
        for attr in element.attributes() {
            let attr = attr?;
            attrs.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            ));
        }

        let rule = self.rules.iter().find(|rule| {
            rule.element == name
                && rule
                    .when
                    .iter()
                    .all(|(k, v)| attrs.iter().any(|(ak, av)| ak == k && av == v))
        });
        let Some(rule) = rule else {
            return Ok(None);
        };

        let mut rebuilt = BytesStart::new(name);
        for (key, value) in &attrs {
            match rule.set.get(key) {
                Some(replacement) => rebuilt.push_attribute((key.as_str(), replacement.as_str())),
                None => rebuilt.push_attribute((key.as_str(), value.as_str())),
            }
        }
        for (key, value) in &rule.set {
            if !attrs.iter().any(|(ak, _)| ak == key) {
                rebuilt.push_attribute((key.as_str(), value.as_str()));
            }
        }
        Ok(Some(rebuilt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUMP_1_TO_2: &str = r#"
[[rule]]
element = "configuration"
when = { version = "1" }
set = { version = "2" }
"#;

    #[test]
    fn parse_rejects_bad_toml() {
        assert!(TransformProgram::parse("[[rule]]\nelement = 3").is_err());
    }

    #[test]
    fn empty_program_is_identity() {
        let program = TransformProgram::parse("").unwrap();
        let out = program
            .apply_str(r#"<configuration version="1"><blah/></configuration>"#)
            .unwrap();
        assert_eq!(out, r#"<configuration version="1"><blah/></configuration>"#);
    }

    #[test]
    fn guarded_rule_bumps_matching_version_only() {
        let program = TransformProgram::parse(BUMP_1_TO_2).unwrap();

        let out = program
            .apply_str(r#"<configuration version="1"><blah/></configuration>"#)
            .unwrap();
        assert!(out.contains(r#"<configuration version="2">"#));
        assert!(out.contains("<blah/>"));

        // A different version does not satisfy the guard.
        let out = program
            .apply_str(r#"<configuration version="7"/>"#)
            .unwrap();
        assert!(out.contains(r#"version="7""#));
    }

    #[test]
    fn set_adds_missing_attributes() {
        let program = TransformProgram::parse(
            "[[rule]]\nelement = \"configuration\"\nset = { version = \"1\" }\n",
        )
        .unwrap();
        let out = program.apply_str("<configuration><blah/></configuration>").unwrap();
        assert!(out.contains(r#"<configuration version="1">"#));
    }

    #[test]
    fn unrelated_attributes_survive() {
        let program = TransformProgram::parse(BUMP_1_TO_2).unwrap();
        let out = program
            .apply_str(r#"<configuration version="1" producer="docshift"/>"#)
            .unwrap();
        assert!(out.contains(r#"version="2""#));
        assert!(out.contains(r#"producer="docshift""#));
    }
}
