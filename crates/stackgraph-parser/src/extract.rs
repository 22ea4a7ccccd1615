//! Block extractors built on the scanner.
//!
//! Each extractor distinguishes "construct not present" (`Ok(None)`, the
//! normal case for most directories) from a token stream that ended inside a
//! construct (`Err`). Callers log the latter and carry on.

use crate::scanner::{ScanError, Token, TokenKind, TokenStream, is_comment_line, tokenize};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const BUCKET_KEY: &str = "bucket";
const PREFIX_KEY: &str = "prefix";

/// Lines before the introspector's hint where remote-state scanning starts.
/// Tolerates off-by-one positions.
const HINT_SLACK: usize = 2;

/// Where a stack's state is stored: the `(bucket, prefix)` pair of its backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendCoordinate {
    pub bucket: String,
    pub prefix: String,
}

impl BackendCoordinate {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

impl std::fmt::Display for BackendCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.prefix)
    }
}

/// An unresolved value inside a remote-state `config` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Quoted string, used as-is.
    Literal(String),
    /// `var.NAME`, substituted from the directory's variables.
    Variable(String),
    /// Anything else (locals, function calls, interpolations of other objects).
    Unsupported(String),
}

impl RefValue {
    fn from_token(token: &Token) -> Self {
        match token.kind {
            TokenKind::Str => Self::Literal(token.unquoted().to_string()),
            TokenKind::Word => match token.text.strip_prefix("var.") {
                Some(rest) => {
                    let name = rest.split(['.', '[']).next().unwrap_or_default();
                    if name.is_empty() {
                        Self::Unsupported(token.text.clone())
                    } else {
                        Self::Variable(name.to_string())
                    }
                }
                None => Self::Unsupported(token.text.clone()),
            },
            _ => Self::Unsupported(token.text.clone()),
        }
    }

    /// Resolve against a variable map. `None` means the value is unavailable.
    pub fn resolve(&self, vars: &BTreeMap<String, String>) -> Option<String> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Variable(name) => vars.get(name).cloned(),
            Self::Unsupported(_) => None,
        }
    }
}

/// The storage coordinate a `terraform_remote_state` data source reads from,
/// before variable substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStateRef {
    pub bucket: RefValue,
    pub prefix: RefValue,
}

impl RemoteStateRef {
    /// Resolve both values. Either one being unavailable yields `None`.
    pub fn resolve(&self, vars: &BTreeMap<String, String>) -> Option<BackendCoordinate> {
        let bucket = self.bucket.resolve(vars)?;
        let prefix = self.prefix.resolve(vars)?;
        Some(BackendCoordinate { bucket, prefix })
    }

    pub fn needs_variables(&self) -> bool {
        matches!(self.bucket, RefValue::Variable(_)) || matches!(self.prefix, RefValue::Variable(_))
    }
}

/// Find the first `backend "<kind>" { ... }` block and return its bucket/prefix.
pub fn backend_coordinate(
    source: &str,
    kind: &str,
) -> Result<Option<BackendCoordinate>, ScanError> {
    let tokens = tokenize(source);
    let mut stream = TokenStream::new(&tokens);

    while let Some(token) = stream.next() {
        if !token.is_word("backend") {
            continue;
        }
        let Some(label) = stream.next() else {
            return Ok(None);
        };
        if label.kind != TokenKind::Str || label.unquoted() != kind {
            continue;
        }
        let body = stream.read_block(&[BUCKET_KEY, PREFIX_KEY], "backend block")?;
        return Ok(match (body.get(BUCKET_KEY), body.get(PREFIX_KEY)) {
            (Some(bucket), Some(prefix)) => Some(BackendCoordinate::new(
                bucket.unquoted(),
                prefix.unquoted(),
            )),
            _ => None,
        });
    }
    Ok(None)
}

/// Read the `config = { ... }` body of a remote-state data source that the
/// introspector places at `hint_line` (1-based).
///
/// Scanning starts a little before the hint and takes the first `config =`
/// assignment found; if that body lacks either coordinate key the result is
/// `None`.
pub fn remote_state_config(
    source: &str,
    hint_line: usize,
) -> Result<Option<RemoteStateRef>, ScanError> {
    let first_line = hint_line.saturating_sub(HINT_SLACK);
    let tokens: Vec<Token> = tokenize(source)
        .into_iter()
        .filter(|t| t.line > first_line)
        .collect();
    let mut stream = TokenStream::new(&tokens);

    while let Some(token) = stream.next() {
        if !token.is_word("config") {
            continue;
        }
        if !stream.peek().is_some_and(|t| t.kind == TokenKind::Equals) {
            continue;
        }
        stream.next();
        let body = stream.read_block(&[BUCKET_KEY, PREFIX_KEY], "remote state config")?;
        return Ok(match (body.get(BUCKET_KEY), body.get(PREFIX_KEY)) {
            (Some(bucket), Some(prefix)) => Some(RemoteStateRef {
                bucket: RefValue::from_token(bucket),
                prefix: RefValue::from_token(prefix),
            }),
            _ => None,
        });
    }
    Ok(None)
}

/// Result of scanning a file for `variable` defaults.
///
/// A truncated file still reports the defaults read before the break.
#[derive(Debug, Default)]
pub struct DefaultsScan {
    pub defaults: BTreeMap<String, String>,
    pub error: Option<ScanError>,
}

/// Collect string-literal `default` values of every `variable` block.
/// Non-string defaults (numbers, lists, maps) are left out.
pub fn variable_defaults(source: &str) -> DefaultsScan {
    let tokens = tokenize(source);
    let mut stream = TokenStream::new(&tokens);
    let mut scan = DefaultsScan::default();

    while let Some(token) = stream.next() {
        if !token.is_word("variable") {
            continue;
        }
        let name = match stream.expect_next("variable declaration") {
            Ok(name) => name.unquoted().to_string(),
            Err(e) => {
                scan.error = Some(e);
                break;
            }
        };
        match stream.read_block(&["default"], "variable block") {
            Ok(body) => {
                if let Some(value) = body.get("default")
                    && value.kind == TokenKind::Str
                {
                    scan.defaults.insert(name, value.unquoted().to_string());
                }
            }
            Err(e) => {
                scan.error = Some(e);
                break;
            }
        }
    }
    scan
}

/// Parse flat `key = "value"` lines of a variable-override file.
pub fn tfvars_assignments(source: &str) -> BTreeMap<String, String> {
    static ASSIGN_RE: OnceLock<Regex> = OnceLock::new();
    let assign_re = ASSIGN_RE.get_or_init(|| {
        Regex::new(r#"^\s*([A-Za-z0-9_-]+)\s*=\s*["']([^"']+)["']"#).expect("valid regex")
    });

    source
        .lines()
        .filter(|line| !is_comment_line(line))
        .filter_map(|line| {
            let caps = assign_re.captures(line)?;
            Some((caps[1].to_string(), caps[2].to_string()))
        })
        .collect()
}
