//! Addressing values inside observed trees.
//!
//! [`PathStep`] names one key or index. JSON Pointers (RFC 6901) parse into a
//! list of steps: `~1` decodes to `/` and `~0` to `~`.

use std::borrow::Cow;
use std::fmt;

use crate::error::ObserveError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl PathStep {
    /// The step as a property name. Indices render in decimal.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            PathStep::Key(k) => Cow::Borrowed(k),
            PathStep::Index(i) => Cow::Owned(i.to_string()),
        }
    }

    /// The step as a sequence index, if it is one. Keys count when they are
    /// canonical decimal integers (`"3"`, not `"03"` or `"+3"`).
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathStep::Index(i) => Some(*i),
            PathStep::Key(k) => parse_index(k),
        }
    }
}

fn parse_index(s: &str) -> Option<usize> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if canonical {
        s.parse().ok()
    } else {
        None
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl From<&str> for PathStep {
    fn from(k: &str) -> Self {
        PathStep::Key(k.to_string())
    }
}

impl From<String> for PathStep {
    fn from(k: String) -> Self {
        PathStep::Key(k)
    }
}

impl From<&String> for PathStep {
    fn from(k: &String) -> Self {
        PathStep::Key(k.clone())
    }
}

impl From<usize> for PathStep {
    fn from(i: usize) -> Self {
        PathStep::Index(i)
    }
}

fn unescape(component: &str, pointer: &str) -> Result<String, ObserveError> {
    if !component.contains('~') {
        return Ok(component.to_string());
    }
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(ObserveError::InvalidPointer(pointer.to_string())),
        }
    }
    Ok(out)
}

/// Escape a key for use as a pointer component.
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Parse a JSON Pointer into steps. `""` addresses the root.
pub fn parse_pointer(pointer: &str) -> Result<Vec<PathStep>, ObserveError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(ObserveError::InvalidPointer(pointer.to_string()));
    };
    rest.split('/')
        .map(|token| {
            let key = unescape(token, pointer)?;
            Ok(match parse_index(&key) {
                Some(i) => PathStep::Index(i),
                None => PathStep::Key(key),
            })
        })
        .collect()
}

/// Render steps back into a JSON Pointer.
pub fn format_pointer(path: &[PathStep]) -> String {
    path.iter()
        .map(|step| format!("/{}", escape_component(&step.as_key())))
        .collect()
}
