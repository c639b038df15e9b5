//! Registry document format.
//!
//! Manifest and agent network files are HOCON. We accept the subset that maps
//! cleanly onto JSON:
//!
//! - `#` and `//` line comments
//! - trailing commas, and newlines in place of commas
//! - `=` as well as `:` between keys and values, and `key { ... }` for objects
//! - `"""` multi-line strings
//! - optional braces around the root object
//!
//! Substitutions (`${...}`) and includes are rejected. The normalised text is
//! flow-style YAML, which `serde_yaml` deserializes directly.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::domain::errors::{RegistryError, RegistryResult};

/// Read and parse one registry document.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> RegistryResult<T> {
    let source = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&source).map_err(|reason| RegistryError::invalid(path, reason))
}

/// Parse a registry document from text.
pub fn parse_document<T: DeserializeOwned>(source: &str) -> Result<T, String> {
    let normalized = normalize(source)?;
    serde_yaml::from_str(&normalized).map_err(|e| e.to_string())
}

/// Rewrite a HOCON document as flow-style YAML.
pub fn normalize(source: &str) -> Result<String, String> {
    let wrapped;
    let source = if starts_with_container(source) {
        source
    } else {
        wrapped = format!("{{\n{source}\n}}");
        &wrapped
    };

    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut containers: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' if chars[i..].starts_with(&['"', '"', '"']) => {
                let start = i + 3;
                let end = find_triple_quote(&chars, start)
                    .ok_or_else(|| "unterminated \"\"\" string".to_string())?;
                let text: String = chars[start..end].iter().collect();
                out.push_str(&serde_json::to_string(&text).map_err(|e| e.to_string())?);
                i = end + 3;
                continue;
            }
            '"' => {
                let end = find_string_end(&chars, i + 1)
                    .ok_or_else(|| "unterminated string".to_string())?;
                out.extend(&chars[i..=end]);
                i = end + 1;
                continue;
            }
            '#' => {
                i = skip_line(&chars, i);
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                i = skip_line(&chars, i);
                continue;
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                return Err("substitutions (${...}) are not supported".to_string());
            }
            '{' | '[' => {
                if c == '{' && containers.last() == Some(&'{') && ends_with_value(&out) {
                    let trimmed = out.trim_end().len();
                    out.truncate(trimmed);
                    out.push_str(": ");
                }
                containers.push(c);
                out.push(c);
            }
            '}' | ']' => {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                if out.ends_with(',') {
                    out.pop();
                }
                containers.pop();
                out.push(c);
            }
            ':' | '=' => {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                out.push(':');
                if chars.get(i + 1).is_some_and(|next| !next.is_whitespace()) {
                    out.push(' ');
                }
            }
            '\n' => {
                if let Some(&container) = containers.last() {
                    if ends_with_value(&out) && next_starts_member(&chars, i + 1, container) {
                        out.push(',');
                    }
                }
                out.push('\n');
            }
            '\t' => out.push(' '),
            _ => out.push(c),
        }
        i += 1;
    }

    if !containers.is_empty() {
        return Err("unbalanced braces or brackets".to_string());
    }
    Ok(out)
}

fn starts_with_container(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .is_some_and(|line| line.starts_with('{') || line.starts_with('['))
}

fn find_string_end(chars: &[char], mut i: usize) -> Option<usize> {
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return Some(i),
            '\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn find_triple_quote(chars: &[char], start: usize) -> Option<usize> {
    (start..chars.len().saturating_sub(2)).find(|&i| chars[i..].starts_with(&['"', '"', '"']))
}

fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

/// True when the last emitted token completes a value or key.
fn ends_with_value(out: &str) -> bool {
    out.trim_end()
        .chars()
        .last()
        .is_some_and(|c| !matches!(c, '{' | '[' | ',' | ':'))
}

/// True when the next token starts a new member rather than closing or continuing one.
///
/// Inside an object a `{` on the next line is the value of the preceding key.
fn next_starts_member(chars: &[char], from: usize, container: char) -> bool {
    chars[from..]
        .iter()
        .find(|c| !c.is_whitespace())
        .is_some_and(|&c| match c {
            '}' | ']' | ',' | ':' | '=' => false,
            '{' => container == '[',
            _ => true,
        })
}
