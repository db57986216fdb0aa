use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{Result, UpgradeError};
use crate::report::Reporter;
use crate::store::SPEC_FILE;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("datastore spec is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("datastore spec node at {at} is not an object")]
    NotAnObject { at: String },

    #[error("datastore spec node at {at}: field '{field}' is missing or not {expected}")]
    Field {
        at: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("datastore spec node at {at}: unknown type '{kind}'")]
    UnknownType { at: String, kind: String },
}

impl SpecError {
    /// The field a node was rejected on, if the document parsed at all.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Json(_) | Self::NotAnObject { .. } => None,
            Self::Field { field, .. } => Some(*field),
            Self::UnknownType { .. } => Some("type"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Badger,
    FlatFs,
    LevelDs,
}

impl LeafKind {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "badgerds" => Some(Self::Badger),
            "flatfs" => Some(Self::FlatFs),
            "levelds" => Some(Self::LevelDs),
            _ => None,
        }
    }

    /// Only badger stores are upgraded; the other leaf kinds are left alone.
    pub fn is_migratable(self) -> bool {
        matches!(self, Self::Badger)
    }
}

/// One node of the datastore composition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecNode {
    Mount { children: Vec<SpecNode> },
    Measure { child: Box<SpecNode> },
    Leaf { kind: LeafKind, path: Option<String> },
}

impl SpecNode {
    pub fn parse(value: &Value) -> std::result::Result<Self, SpecError> {
        parse_node(value, "$")
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, SpecError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::parse(&value)
    }

    /// Paths of every migratable leaf, depth-first, left to right. Duplicates are kept.
    pub fn migratable_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        match self {
            Self::Mount { children } => {
                for child in children {
                    child.collect_paths(out);
                }
            }
            Self::Measure { child } => child.collect_paths(out),
            Self::Leaf {
                kind,
                path: Some(path),
            } if kind.is_migratable() => out.push(path.clone()),
            Self::Leaf { .. } => {}
        }
    }
}

fn as_object<'a>(value: &'a Value, at: &str) -> std::result::Result<&'a Map<String, Value>, SpecError> {
    value.as_object().ok_or_else(|| SpecError::NotAnObject { at: at.to_string() })
}

fn field_err(at: &str, field: &'static str, expected: &'static str) -> SpecError {
    SpecError::Field {
        at: at.to_string(),
        field,
        expected,
    }
}

fn parse_node(value: &Value, at: &str) -> std::result::Result<SpecNode, SpecError> {
    let node = as_object(value, at)?;
    let kind = node
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| field_err(at, "type", "a string"))?;

    match kind {
        "mount" => {
            let mounts = node
                .get("mounts")
                .and_then(Value::as_array)
                .ok_or_else(|| field_err(at, "mounts", "an array"))?;
            let children = mounts
                .iter()
                .enumerate()
                .map(|(i, child)| parse_node(child, &format!("{at}.mounts[{i}]")))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(SpecNode::Mount { children })
        }
        "measure" => {
            let child = node
                .get("child")
                .filter(|child| child.is_object())
                .ok_or_else(|| field_err(at, "child", "an object"))?;
            let child = parse_node(child, &format!("{at}.child"))?;
            Ok(SpecNode::Measure {
                child: Box::new(child),
            })
        }
        other => {
            let kind = LeafKind::from_type(other).ok_or_else(|| SpecError::UnknownType {
                at: at.to_string(),
                kind: other.to_string(),
            })?;
            let path = match node.get("path") {
                Some(Value::String(path)) => Some(path.clone()),
                _ if kind.is_migratable() => return Err(field_err(at, "path", "a string")),
                _ => None,
            };
            Ok(SpecNode::Leaf { kind, path })
        }
    }
}

/// Load the repository's datastore spec and list the store paths that need upgrading.
pub fn resolve_paths(repo_root: &Path, reporter: &dyn Reporter) -> Result<Vec<String>> {
    let spec_path = repo_root.join(SPEC_FILE);
    let raw = fs::read_to_string(&spec_path).map_err(|e| UpgradeError::io(&spec_path, e))?;
    let paths = SpecNode::from_json(&raw)?.migratable_paths();
    for path in &paths {
        reporter.note(&format!("Badger instance at {path}"));
    }
    Ok(paths)
}
