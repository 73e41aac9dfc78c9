//! Path template matching.
//!
//! # Responsibilities
//! - Parse templates such as `/v1/item/{id}` into segments
//! - Match a concrete request path and bind named segments
//! - Detect templates that could match the same concrete path
//! - Render a template back into a path with substituted values
//!
//! # Design Decisions
//! - Matching is by segment count and literal equality, case-sensitive
//! - A named segment matches exactly one non-empty segment
//! - Bound values stay percent-encoded; decoding belongs to parameter
//!   binding, where a bad value is the client's error rather than a miss
//! - No regex, no wildcards, no priorities

use std::collections::BTreeMap;
use std::fmt;

use crate::config::validation::ValidationError;

/// Values bound to named segments, keyed by parameter name.
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidTemplate {
            template: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with `/`"))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                if part.is_empty() {
                    return Err(invalid("empty segment"));
                }
                if let Some(inner) = part.strip_prefix('{') {
                    let name = inner
                        .strip_suffix('}')
                        .ok_or_else(|| invalid("unterminated `{`"))?;
                    if name.is_empty() || name.contains(['{', '}']) {
                        return Err(invalid("invalid parameter name"));
                    }
                    if segments
                        .iter()
                        .any(|s| matches!(s, Segment::Param(p) if p == name))
                    {
                        return Err(invalid("parameter bound twice"));
                    }
                    segments.push(Segment::Param(name.to_string()));
                } else if part.contains(['{', '}']) {
                    return Err(invalid("braces must span a whole segment"));
                } else {
                    segments.push(Segment::Literal(part.to_string()));
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Names of the parameters in template order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path, returning the raw (still percent-encoded)
    /// parameter values.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts = split_path(path)?;
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// True when some concrete path would match both templates.
    pub fn overlaps(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }

    /// Substitute parameter values, percent-encoding each one.
    ///
    /// Parameters missing from `params` render as empty segments.
    pub fn render(&self, params: &PathParams) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(name) => {
                    let value = params.get(name).map(String::as_str).unwrap_or_default();
                    out.push_str(&urlencoding::encode(value));
                }
            }
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}
