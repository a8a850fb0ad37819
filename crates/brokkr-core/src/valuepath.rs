//! Value-path parsing and navigation for dynamic documents
//!
//! Substitution rules address locations inside structured files with
//! dot/bracket paths such as `spec.template.containers[0].image` or
//! `metadata.annotations["app.kubernetes.io/name"]`. This module parses those
//! paths into segments and navigates documents with them, creating
//! intermediate structures on write.

use crate::document::Document;
use crate::error::{Error, Result};

/// One step of a value path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing mapping members
    Key(String),
    /// A numeric index for accessing sequence elements
    Index(usize),
}

/// Parse a path string into segments
///
/// Supports dot notation (`foo.bar`), bracket indices (`items[0]`), quoted
/// bracket keys (`labels["special.key"]`), and backslash-escaped literal dots
/// (`foo\.bar`).
pub fn parse(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }

                match chars.peek().copied() {
                    Some(quote @ ('"' | '\'')) => {
                        chars.next();
                        let mut key = String::new();
                        let mut closed = false;
                        for ch in chars.by_ref() {
                            if ch == quote {
                                closed = true;
                                break;
                            }
                            key.push(ch);
                        }
                        if !closed || chars.next() != Some(']') {
                            return Err(Error::validation(format!(
                                "unterminated bracket key in path: {}",
                                path
                            )));
                        }
                        segments.push(PathSegment::Key(key));
                    }
                    _ => {
                        let mut index = String::new();
                        let mut closed = false;
                        for ch in chars.by_ref() {
                            if ch == ']' {
                                closed = true;
                                break;
                            }
                            index.push(ch);
                        }
                        if !closed {
                            return Err(Error::validation(format!(
                                "unterminated index in path: {}",
                                path
                            )));
                        }
                        let idx: usize = index.parse().map_err(|_| {
                            Error::validation(format!(
                                "invalid sequence index {:?} in path: {}",
                                index, path
                            ))
                        })?;
                        segments.push(PathSegment::Index(idx));
                    }
                }
            }
            _ => current.push(ch),
        }
    }

    if escaped {
        return Err(Error::validation(format!(
            "dangling escape in path: {}",
            path
        )));
    }
    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    if segments.is_empty() {
        return Err(Error::validation("empty value path"));
    }

    Ok(segments)
}

/// Look up the value at a path, if present
pub fn get<'a>(doc: &'a Document, segments: &[PathSegment]) -> Option<&'a Document> {
    let mut current = doc;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(idx) => current.as_sequence()?.get(*idx)?,
        };
    }
    Some(current)
}

/// Splice a value into a document at a path, creating intermediate structures
///
/// Descends through mappings and sequences; null intermediates are replaced
/// by the structure the next segment requires, and sequences are padded with
/// nulls up to an addressed index. Indexing into a scalar is an error.
pub fn set(doc: &mut Document, segments: &[PathSegment], value: Document) -> Result<()> {
    let target = navigate(doc, segments)?;
    *target = value;
    Ok(())
}

fn navigate<'a>(doc: &'a mut Document, segments: &[PathSegment]) -> Result<&'a mut Document> {
    let mut current = doc;
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Document::Mapping(Default::default());
                }
                let map = current.as_mapping_mut().ok_or_else(|| {
                    Error::validation(format!("expected mapping while navigating to {:?}", key))
                })?;
                current = map
                    .entry(Document::String(key.clone()))
                    .or_insert(Document::Null);
            }
            PathSegment::Index(idx) => {
                if current.is_null() {
                    *current = Document::Sequence(Vec::new());
                }
                let seq = current.as_sequence_mut().ok_or_else(|| {
                    Error::validation(format!("expected sequence while navigating to index {}", idx))
                })?;
                while seq.len() <= *idx {
                    seq.push(Document::Null);
                }
                current = &mut seq[*idx];
            }
        }
    }
    Ok(current)
}
