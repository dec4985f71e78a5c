//! Address patterns.
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `log`   | exactly `log` |
//! | `:name` | one non-empty segment, captured as `name` |
//! | `*`     | one non-empty segment |
//! | `**`    | zero or more trailing segments (last segment only) |

use std::fmt;

use crate::error::PatternError;

/// Named segments captured by a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Any,
    Rest,
}

/// A compiled address pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile `pattern`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if index + 1 == parts.len() => Segment::Rest,
                "**" => return Err(PatternError::MisplacedRest(pattern.to_string())),
                "*" => Segment::Any,
                param if param.starts_with(':') => {
                    let name = &param[1..];
                    if name.is_empty() {
                        return Err(PatternError::EmptyParam(pattern.to_string()));
                    }
                    Segment::Param(name.to_string())
                }
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `address`, returning the captured parameters on success.
    pub fn matches(&self, address: &str) -> Option<Params> {
        let rest = address.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Rest => return Some(Params(params)),
                Segment::Literal(literal) => {
                    if parts.next()? != literal {
                        return None;
                    }
                }
                Segment::Any => {
                    if parts.next()?.is_empty() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next()?;
                    if value.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), value.to_string()));
                }
            }
        }

        match parts.next() {
            None => Some(Params(params)),
            Some(_) => None,
        }
    }

    pub fn is_match(&self, address: &str) -> bool {
        self.matches(address).is_some()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
