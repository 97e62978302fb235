//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Map Writer
//!
//! Builds every document as nested generic values: ordered objects, arrays
//! and scalars, with no knowledge of a target type.
//!
//! Levels are created as events arrive but materialized lazily: a level only
//! becomes part of the output once a leaf is written at or below it, so
//! structure that never receives a leaf is dropped. The name of the
//! outermost node is not part of the output; its value is the document.
//!
//! A node named `entry` inside an object-valued node is a map entry. Its
//! `key` child supplies the member name and its `value` child the member
//! value. A leaf written directly into an object-valued node becomes its
//! `value` member.

use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};
use crate::record::ZiScalar;
use crate::writer::json::{scalar_to_json, TEXT_MEMBER};
use crate::writer::{deliver, ZiCollector, ZiTargetWriter, ZiTreeWriter};

/// Reserved node name of a map entry.
pub const ENTRY: &str = "entry";
/// Reserved node name of a map entry's key.
pub const ENTRY_KEY: &str = "key";
/// Reserved node name of a map entry's value.
pub const ENTRY_VALUE: &str = "value";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ZiLevelKind {
    Scalar,
    Map,
    List,
    Entry,
}

#[derive(Debug)]
struct ZiLevel {
    name: String,
    kind: ZiLevelKind,
    built: bool,
    value: Option<Value>,
    key: Option<String>,
    repeated: Vec<String>,
}

impl ZiLevel {
    fn new(name: &str, kind: ZiLevelKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            built: false,
            value: None,
            key: None,
            repeated: Vec::new(),
        }
    }

    fn materialize(&mut self) {
        if self.built {
            return;
        }
        self.built = true;
        self.value = match self.kind {
            ZiLevelKind::Map => Some(Value::Object(Map::new())),
            ZiLevelKind::List => Some(Value::Array(Vec::new())),
            ZiLevelKind::Scalar | ZiLevelKind::Entry => None,
        };
    }

    /// Inserts a member; repeated names collect into an array.
    fn insert(&mut self, name: String, value: Value) -> Result<()> {
        let Some(Value::Object(members)) = self.value.as_mut() else {
            return Err(ZiError::internal(format!("level '{}' is not an object", self.name)));
        };
        match members.get_mut(&name) {
            None => {
                members.insert(name, value);
            }
            Some(Value::Array(items)) if self.repeated.contains(&name) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
                self.repeated.push(name);
            }
        }
        Ok(())
    }

    fn into_document(self) -> Value {
        match (self.value, self.kind) {
            (Some(value), _) => value,
            (None, ZiLevelKind::List) => Value::Array(Vec::new()),
            (None, _) => Value::Object(Map::new()),
        }
    }
}

/// Tree writer producing `serde_json::Value` documents.
#[derive(Debug, Default)]
pub struct ZiMapWriter {
    levels: Vec<ZiLevel>,
    in_tree: bool,
    results: Vec<Value>,
    target: Option<ZiCollector<Value>>,
}

impl ZiMapWriter {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed documents not yet flushed to a target.
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn take_results(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.results)
    }

    fn path(&self) -> String {
        let names: Vec<&str> = self.levels.iter().map(|level| level.name.as_str()).collect();
        format!("/{}", names.join("/"))
    }

    fn push(&mut self, name: &str, kind: ZiLevelKind) -> Result<()> {
        if !self.in_tree {
            return Err(ZiError::mapping(name, "node started outside of a tree"));
        }
        let path = self.path();
        let kind = match self.levels.last_mut() {
            None => kind,
            Some(parent) => match parent.kind {
                ZiLevelKind::Scalar if parent.built => {
                    return Err(ZiError::mapping(
                        path,
                        format!("node '{name}' follows the value of a scalar node"),
                    ))
                }
                ZiLevelKind::Scalar | ZiLevelKind::Map => {
                    parent.kind = ZiLevelKind::Map;
                    if name == ENTRY && kind == ZiLevelKind::Scalar {
                        ZiLevelKind::Entry
                    } else {
                        kind
                    }
                }
                ZiLevelKind::Entry if name == ENTRY_KEY || name == ENTRY_VALUE => kind,
                ZiLevelKind::Entry => {
                    return Err(ZiError::mapping(
                        path,
                        format!("map entry expects '{ENTRY_KEY}' or '{ENTRY_VALUE}', got '{name}'"),
                    ))
                }
                ZiLevelKind::List => kind,
            },
        };
        self.levels.push(ZiLevel::new(name, kind));
        Ok(())
    }

    fn pop(&mut self) -> Result<()> {
        let path = self.path();
        let level = self
            .levels
            .pop()
            .ok_or_else(|| ZiError::mapping(path.clone(), "unbalanced end of node"))?;
        let Some(parent) = self.levels.last_mut() else {
            self.results.push(level.into_document());
            return Ok(());
        };
        if !level.built {
            return Ok(());
        }
        let ZiLevel {
            name,
            kind,
            value,
            key,
            ..
        } = level;
        let value = match kind {
            ZiLevelKind::Entry => {
                let key = key.ok_or_else(|| ZiError::mapping(path.clone(), "map entry without a key"))?;
                return parent.insert(key, value.unwrap_or(Value::Null));
            }
            _ => value.unwrap_or(Value::Null),
        };
        match parent.kind {
            ZiLevelKind::List => {
                if let Some(Value::Array(items)) = parent.value.as_mut() {
                    items.push(value);
                }
                Ok(())
            }
            ZiLevelKind::Map => parent.insert(name, value),
            ZiLevelKind::Entry if name == ENTRY_KEY => {
                parent.key = Some(match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                });
                Ok(())
            }
            ZiLevelKind::Entry => {
                parent.value = Some(value);
                Ok(())
            }
            ZiLevelKind::Scalar => Err(ZiError::internal(format!("scalar level holds child at '{path}'"))),
        }
    }
}

impl ZiTreeWriter for ZiMapWriter {
    fn write_start_tree(&mut self) -> Result<()> {
        self.levels.clear();
        self.in_tree = true;
        Ok(())
    }

    fn write_end_tree(&mut self) -> Result<()> {
        if !self.levels.is_empty() {
            return Err(ZiError::mapping(self.path(), "tree ended with open nodes"));
        }
        self.in_tree = false;
        Ok(())
    }

    fn write_start_node(&mut self, name: &str) -> Result<()> {
        self.push(name, ZiLevelKind::Scalar)
    }

    fn write_end_node(&mut self, _name: &str) -> Result<()> {
        self.pop()
    }

    fn write_start_collection(&mut self, name: &str) -> Result<()> {
        self.push(name, ZiLevelKind::List)
    }

    fn write_end_collection(&mut self, _name: &str) -> Result<()> {
        self.pop()
    }

    fn write_leaf(&mut self, value: &ZiScalar) -> Result<()> {
        let path = self.path();
        for level in self.levels.iter_mut() {
            level.materialize();
        }
        let top = self
            .levels
            .last_mut()
            .ok_or_else(|| ZiError::mapping(path.clone(), "leaf outside of a node"))?;
        let value = scalar_to_json(value);
        match top.kind {
            ZiLevelKind::Scalar | ZiLevelKind::Entry if top.value.is_some() => {
                Err(ZiError::mapping(path, "node already has a value"))
            }
            ZiLevelKind::Scalar | ZiLevelKind::Entry => {
                top.value = Some(value);
                Ok(())
            }
            ZiLevelKind::List => {
                if let Some(Value::Array(items)) = top.value.as_mut() {
                    items.push(value);
                }
                Ok(())
            }
            ZiLevelKind::Map => top.insert(TEXT_MEMBER.to_string(), value),
        }
    }

    fn write_namespace(&mut self, _prefix: &str, _uri: &str) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(target) = &self.target {
            deliver(target, self.results.drain(..))?;
        }
        Ok(())
    }
}

impl ZiTargetWriter for ZiMapWriter {
    type Target = ZiCollector<Value>;

    fn set_target(&mut self, target: Self::Target) -> Result<()> {
        self.target = Some(target);
        Ok(())
    }
}
