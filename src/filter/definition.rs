// src/filter/definition.rs

//! Tokenizer for filter definition strings
//!
//! A definition is a comma separated list of `scope=value,value` clauses:
//!
//! ```text
//! /unmanaged_files/files/name=/opt,/srv,"/changed_managed_files/files/name=/etc/a,/etc/b"
//! ```
//!
//! - commas inside double quotes never separate clauses; the quotes
//!   themselves are dropped
//! - `\,` is a literal comma and `\"` a literal quote inside a value
//! - a quote that is never closed is an error
//! - a comma separated piece without `=` continues the value list of the
//!   clause before it
//! - the scope path ends at the first `=`

use crate::error::{Error, Result};

/// One `scope=values` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub scope_path: String,
    pub values: Vec<String>,
}

/// A top-level piece of a definition string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Text with quotes removed and `\,` escapes preserved
    pub text: String,
    /// Whether any part of the segment was quoted
    pub quoted: bool,
}

impl Segment {
    /// Render the segment back into definition syntax
    pub fn to_definition(&self) -> String {
        if self.quoted {
            format!("\"{}\"", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Split a definition on top-level commas
pub fn split_segments(definition: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = definition.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some(',' | '"')) => {
                current.push('\\');
                current.extend(chars.next());
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ',' if !in_quotes => {
                push_segment(&mut segments, &mut current, quoted);
                quoted = false;
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(Error::ParseError(format!(
            "Unterminated quote in filter definition '{}'",
            definition
        )));
    }
    push_segment(&mut segments, &mut current, quoted);

    Ok(segments)
}

fn push_segment(segments: &mut Vec<Segment>, current: &mut String, quoted: bool) {
    if !current.is_empty() {
        segments.push(Segment {
            text: std::mem::take(current),
            quoted,
        });
    }
}

/// Split on commas that are not escaped, resolving `\,` and `\"`
pub fn split_values(text: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some(',' | '"')) => {
                current.extend(chars.next());
            }
            ',' => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);

    values.retain(|v| !v.is_empty());
    values
}

/// Parse a definition string into clauses, in declaration order
///
/// An empty definition has no clauses. A leading piece without `=` has no
/// clause to continue and is rejected.
pub fn parse_definition(definition: &str) -> Result<Vec<Clause>> {
    let mut clauses: Vec<Clause> = Vec::new();

    for segment in split_segments(definition)? {
        match segment.text.split_once('=') {
            Some((scope_path, values)) => {
                if scope_path.is_empty() {
                    return Err(Error::ParseError(format!(
                        "Filter definition without scope path: '{}'",
                        segment.text
                    )));
                }
                clauses.push(Clause {
                    scope_path: scope_path.to_string(),
                    values: split_values(values),
                });
            }
            None => match clauses.last_mut() {
                Some(clause) => clause.values.extend(split_values(&segment.text)),
                None => {
                    return Err(Error::ParseError(format!(
                        "Filter definition '{}' is missing '=' (expected scope=value)",
                        segment.text
                    )));
                }
            },
        }
    }

    Ok(clauses)
}
