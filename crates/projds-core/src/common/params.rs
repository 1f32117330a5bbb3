//! Whitespace-separated parameter files.
//!
//! Each non-empty line is `key [value] ...`; everything after `#` is ignored.
//! Values that parse as numbers are stored as numbers, the rest as text.
//! `%include <file>` merges another parameter file (relative to the including
//! file's directory), and a missing `<name>` falls back to `<name>.param`.
//! After loading, keys with exactly one value collapse to a scalar.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const INCLUDE_DIRECTIVE: &str = "%include";
const PARAM_EXTENSION: &str = "param";
const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    fn parse(token: &str) -> Self {
        token
            .parse::<f64>()
            .map(Self::Number)
            .unwrap_or_else(|_| Self::Text(token.to_string()))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Number(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamEntry {
    Scalar(ParamValue),
    List(Vec<ParamValue>),
}

#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("failed to read parameter file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("'{}' line {line}: %include needs a file name", path.display())]
    MissingIncludeTarget { path: PathBuf, line: usize },
    #[error("'{}': %include nesting deeper than {depth} levels", path.display())]
    IncludeDepthExceeded { path: PathBuf, depth: usize },
    #[error("parameter '{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamDict {
    entries: BTreeMap<String, ParamEntry>,
}

impl ParamDict {
    pub fn load(path: &Path) -> Result<Self, ParamError> {
        let mut raw = BTreeMap::new();
        load_into(path, &mut raw, 0)?;

        let entries = raw
            .into_iter()
            .map(|(key, mut values)| {
                let entry = if values.len() == 1 {
                    ParamEntry::Scalar(values.remove(0))
                } else {
                    ParamEntry::List(values)
                };
                (key, entry)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&ParamEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn number(&self, key: &str) -> Result<Option<f64>, ParamError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ParamEntry::Scalar(ParamValue::Number(value))) => Ok(Some(*value)),
            Some(_) => Err(ParamError::WrongType {
                key: key.to_string(),
                expected: "a single number",
            }),
        }
    }

    /// A single value rendered as text; numbers use `f64` formatting, so
    /// `out 7` yields `"7"`.
    pub fn text(&self, key: &str) -> Result<Option<String>, ParamError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ParamEntry::Scalar(ParamValue::Text(value))) => Ok(Some(value.clone())),
            Some(ParamEntry::Scalar(ParamValue::Number(value))) => Ok(Some(value.to_string())),
            Some(ParamEntry::List(_)) => Err(ParamError::WrongType {
                key: key.to_string(),
                expected: "a single value",
            }),
        }
    }

    /// A bare key or a nonzero number counts as set; `true`/`yes`/`on` and
    /// their negations are accepted as text.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, ParamError> {
        let wrong_type = || ParamError::WrongType {
            key: key.to_string(),
            expected: "a boolean flag",
        };
        match self.entries.get(key) {
            None => Ok(None),
            Some(ParamEntry::List(values)) if values.is_empty() => Ok(Some(true)),
            Some(ParamEntry::Scalar(ParamValue::Number(value))) => Ok(Some(*value != 0.0)),
            Some(ParamEntry::Scalar(ParamValue::Text(value))) => {
                match value.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" => Ok(Some(true)),
                    "false" | "no" | "off" => Ok(Some(false)),
                    _ => Err(wrong_type()),
                }
            }
            Some(ParamEntry::List(_)) => Err(wrong_type()),
        }
    }
}

fn load_into(
    path: &Path,
    entries: &mut BTreeMap<String, Vec<ParamValue>>,
    depth: usize,
) -> Result<(), ParamError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(ParamError::IncludeDepthExceeded {
            path: path.to_path_buf(),
            depth: MAX_INCLUDE_DEPTH,
        });
    }

    let (resolved, source) = read_with_fallback(path)?;
    let base_dir = resolved.parent().map(Path::to_path_buf).unwrap_or_default();

    for (line_index, line) in source.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default();
        let mut tokens = content.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };

        if name == INCLUDE_DIRECTIVE {
            let target = tokens.next().ok_or_else(|| ParamError::MissingIncludeTarget {
                path: resolved.clone(),
                line: line_index + 1,
            })?;
            let target = Path::new(target);
            let include_path = if target.is_absolute() {
                target.to_path_buf()
            } else {
                base_dir.join(target)
            };
            load_into(&include_path, entries, depth + 1)?;
        } else {
            entries.insert(name.to_string(), tokens.map(ParamValue::parse).collect());
        }
    }

    Ok(())
}

fn read_with_fallback(path: &Path) -> Result<(PathBuf, String), ParamError> {
    match fs::read_to_string(path) {
        Ok(source) => Ok((path.to_path_buf(), source)),
        Err(_) => {
            let mut fallback = path.as_os_str().to_owned();
            fallback.push(".");
            fallback.push(PARAM_EXTENSION);
            let fallback = PathBuf::from(fallback);
            fs::read_to_string(&fallback)
                .map(|source| (fallback.clone(), source))
                .map_err(|source| ParamError::Read {
                    path: path.to_path_buf(),
                    source,
                })
        }
    }
}
