//! Version detection strategies.
//!
//! A document embeds an integer marker identifying its schema version. Each
//! strategy here knows one way of pulling that marker out of a file, and
//! declares the highest version it is trusted to recognize
//! (`good_to_version`). The migrator consults strategies in descending
//! trust order and takes the first one that succeeds; a strategy that fails
//! is skipped, not fatal.

use crate::core::error::DocshiftError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::fs;
use std::path::Path;

/// A pluggable way of extracting the schema version from a document.
pub trait VersionStrategy {
    /// Highest version this strategy is trusted to recognize. Used only to
    /// order detection attempts, never for correctness enforcement.
    fn good_to_version(&self) -> i32;

    /// Extract the document's declared version. An error means "this
    /// strategy does not apply to that file", and the caller moves on to
    /// the next strategy.
    fn file_version(&self, path: &Path) -> Result<i32, DocshiftError>;
}

/// Fixed-value strategy: ignores the document entirely and reports a
/// constructor-supplied version.
///
/// Registered with a low `good_to_version`, this acts as a policy fallback
/// ("treat any un-markable legacy document as version N"). It also makes a
/// convenient test double.
pub struct DefaultVersion {
    version: i32,
    good_to: i32,
}

impl DefaultVersion {
    pub fn new(version: i32, good_to_version: i32) -> Self {
        DefaultVersion {
            version,
            good_to: good_to_version,
        }
    }
}

impl VersionStrategy for DefaultVersion {
    fn good_to_version(&self) -> i32 {
        self.good_to
    }

    fn file_version(&self, _path: &Path) -> Result<i32, DocshiftError> {
        Ok(self.version)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Any,
    Named(String),
}

/// Path-query strategy: evaluates a small XPath-like query against an XML
/// document and parses the matched text as an integer.
///
/// Supported query forms:
/// - `/root/child/@attr` — attribute value of the first matching element
/// - `/root/child` — first non-empty text node of the matching element
/// - `*` may stand in for any element name (e.g. `/*/@version`)
///
/// The query is evaluated over a streaming event walk, so detection never
/// loads the whole document into memory.
pub struct PathQueryVersion {
    good_to: i32,
    query: String,
    segments: Vec<Segment>,
    attribute: Option<String>,
}

impl PathQueryVersion {
    pub fn new(good_to_version: i32, query: &str) -> Result<Self, DocshiftError> {
        let rest = query.strip_prefix('/').ok_or_else(|| {
            DocshiftError::QueryError(format!("query must start with '/': {}", query))
        })?;

        let mut segments = Vec::new();
        let mut attribute = None;
        for (i, part) in rest.split('/').enumerate() {
            if part.is_empty() {
                return Err(DocshiftError::QueryError(format!(
                    "empty path segment in query: {}",
                    query
                )));
            }
            if let Some(attr) = part.strip_prefix('@') {
                attribute = Some(attr.to_string());
                // An attribute test is only valid as the final segment.
                if rest.split('/').count() != i + 1 {
                    return Err(DocshiftError::QueryError(format!(
                        "attribute must be the last segment: {}",
                        query
                    )));
                }
                break;
            }
            segments.push(if part == "*" {
                Segment::Any
            } else {
                Segment::Named(part.to_string())
            });
        }
        if segments.is_empty() {
            return Err(DocshiftError::QueryError(format!(
                "query selects no element: {}",
                query
            )));
        }

        Ok(PathQueryVersion {
            good_to: good_to_version,
            query: query.to_string(),
            segments,
            attribute,
        })
    }

    fn matches(&self, stack: &[String]) -> bool {
        stack.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(stack)
                .all(|(seg, name)| match seg {
                    Segment::Any => true,
                    Segment::Named(n) => n == name,
                })
    }

    fn parse_version(&self, raw: &str, path: &Path) -> Result<i32, DocshiftError> {
        raw.trim().parse::<i32>().map_err(|_| {
            DocshiftError::VersionNotFound(format!(
                "{} matched non-integer '{}' in {}",
                self.query,
                raw.trim(),
                path.display()
            ))
        })
    }

    fn attribute_value(
        &self,
        element: &BytesStart<'_>,
        attr_name: &str,
    ) -> Result<Option<String>, DocshiftError> {
        for attr in element.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == attr_name.as_bytes() {
                return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
            }
        }
        Ok(None)
    }
}

impl VersionStrategy for PathQueryVersion {
    fn good_to_version(&self) -> i32 {
        self.good_to
    }

    fn file_version(&self, path: &Path) -> Result<i32, DocshiftError> {
        let mut reader = Reader::from_file(path)?;
        let mut buf = Vec::new();
        let mut stack: Vec<String> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    if let Some(attr_name) = &self.attribute {
                        if self.matches(&stack) {
                            if let Some(value) = self.attribute_value(&e, attr_name)? {
                                return self.parse_version(&value, path);
                            }
                        }
                    }
                }
                Event::Empty(e) => {
                    stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    if let Some(attr_name) = &self.attribute {
                        if self.matches(&stack) {
                            if let Some(value) = self.attribute_value(&e, attr_name)? {
                                return self.parse_version(&value, path);
                            }
                        }
                    }
                    stack.pop();
                }
                Event::Text(t) => {
                    if self.attribute.is_none() && self.matches(&stack) {
                        let text = String::from_utf8_lossy(t.as_ref());
                        if !text.trim().is_empty() {
                            return self.parse_version(&text, path);
                        }
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Err(DocshiftError::VersionNotFound(format!(
            "{} matched nothing in {}",
            self.query,
            path.display()
        )))
    }
}

/// Regex strategy for documents that carry their version marker outside of
/// any XML structure. The pattern's first capture group is parsed as the
/// version.
pub struct RegexVersion {
    good_to: i32,
    pattern: Regex,
}

impl RegexVersion {
    pub fn new(good_to_version: i32, pattern: &str) -> Result<Self, DocshiftError> {
        let pattern =
            Regex::new(pattern).map_err(|e| DocshiftError::QueryError(e.to_string()))?;
        if pattern.captures_len() < 2 {
            return Err(DocshiftError::QueryError(format!(
                "pattern needs one capture group for the version: {}",
                pattern
            )));
        }
        Ok(RegexVersion {
            good_to: good_to_version,
            pattern,
        })
    }
}

impl VersionStrategy for RegexVersion {
    fn good_to_version(&self) -> i32 {
        self.good_to
    }

    fn file_version(&self, path: &Path) -> Result<i32, DocshiftError> {
        let text = fs::read_to_string(path)?;
        let caps = self.pattern.captures(&text).ok_or_else(|| {
            DocshiftError::VersionNotFound(format!(
                "{} matched nothing in {}",
                self.pattern,
                path.display()
            ))
        })?;
        let raw = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default();
        raw.parse::<i32>().map_err(|_| {
            DocshiftError::VersionNotFound(format!(
                "{} captured non-integer '{}' in {}",
                self.pattern,
                raw,
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_requires_leading_slash() {
        assert!(PathQueryVersion::new(3, "configuration/@version").is_err());
    }

    #[test]
    fn query_rejects_empty_segments() {
        assert!(PathQueryVersion::new(3, "//@version").is_err());
    }

    #[test]
    fn query_rejects_attribute_in_the_middle() {
        assert!(PathQueryVersion::new(3, "/configuration/@version/blah").is_err());
    }

    #[test]
    fn query_accepts_attribute_and_text_forms() {
        assert!(PathQueryVersion::new(3, "/configuration/@version").is_ok());
        assert!(PathQueryVersion::new(3, "/configuration/version").is_ok());
        assert!(PathQueryVersion::new(3, "/*/@version").is_ok());
    }

    #[test]
    fn regex_requires_capture_group() {
        assert!(RegexVersion::new(3, r"version \d+").is_err());
        assert!(RegexVersion::new(3, r"version (\d+)").is_ok());
    }

    #[test]
    fn default_version_ignores_missing_file() {
        let strategy = DefaultVersion::new(4, 9);
        assert_eq!(
            strategy.file_version(Path::new("no-such-file")).unwrap(),
            4
        );
        assert_eq!(strategy.good_to_version(), 9);
    }
}
