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

//! # JSON Serializer
//!
//! Event-to-text rendering for the streaming backend. The document is one
//! JSON object and every top-level node is a member of it. A node is held
//! back until its first event: a leaf makes it a scalar member, a child node
//! or attribute makes it an object, and no content at all renders `null`.
//! Collections become arrays whose item nodes are written without names.
//! Text arriving after a node became an object is written as its `value`
//! member. Namespaces have no JSON form and are dropped.
//!
//! Members are written in event order and never merged: a node repeated
//! outside a collection yields a repeated member name in its object, which
//! is logged as a warning. Bind repeated nodes inside a collection to get an
//! array instead.

use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Number, Value};

use crate::errors::{Result, ZiError};
use crate::record::ZiScalar;
use crate::writer::stream::ZiTreeSerializer;

/// Member name of text inside an object-valued node.
pub const TEXT_MEMBER: &str = "value";

/// Projects a scalar onto a JSON value.
pub fn scalar_to_json(value: &ZiScalar) -> Value {
    match value {
        ZiScalar::Null => Value::Null,
        ZiScalar::Boolean(value) => Value::Bool(*value),
        ZiScalar::Integer(value) => Value::from(*value),
        ZiScalar::Number(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
        ZiScalar::String(value) => Value::String(value.clone()),
        ZiScalar::Date(value) => Value::String(value.to_rfc3339()),
        ZiScalar::Bytes(value) => Value::String(STANDARD.encode(value)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ZiJsonKind {
    /// Started, nothing written for its value yet.
    Pending(String),
    Object,
    Array,
    Scalar(String),
}

#[derive(Debug, Clone)]
struct ZiJsonLevel {
    kind: ZiJsonKind,
    first: bool,
    members: HashSet<String>,
}

impl ZiJsonLevel {
    fn new(kind: ZiJsonKind) -> Self {
        Self {
            kind,
            first: true,
            members: HashSet::new(),
        }
    }
}

/// JSON rendering of tree events.
#[derive(Debug, Default)]
pub struct ZiJsonSerializer {
    levels: Vec<ZiJsonLevel>,
}

impl ZiJsonSerializer {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    fn top(&mut self, name: &str) -> Result<&mut ZiJsonLevel> {
        self.levels
            .last_mut()
            .ok_or_else(|| ZiError::mapping(name, "event outside of a JSON document"))
    }

    /// Turns a pending node on top into an object.
    fn open_pending(&mut self, name: &str, out: &mut String) -> Result<()> {
        let top = self.top(name)?;
        match &top.kind {
            ZiJsonKind::Pending(_) => {
                out.push('{');
                top.kind = ZiJsonKind::Object;
                top.first = true;
                Ok(())
            }
            ZiJsonKind::Scalar(node) => Err(ZiError::mapping(
                node.clone(),
                format!("'{name}' follows the text of a scalar node"),
            )),
            _ => Ok(()),
        }
    }

    /// Writes the separator and, inside objects, the member name.
    fn begin_member(&mut self, name: &str, out: &mut String) -> Result<()> {
        self.open_pending(name, out)?;
        let top = self.top(name)?;
        if !top.first {
            out.push(',');
        }
        top.first = false;
        if top.kind == ZiJsonKind::Object {
            if !top.members.insert(name.to_string()) {
                log::warn!("member '{name}' repeated in one JSON object; bind it inside a collection for an array");
            }
            out.push_str(&serde_json::to_string(name)?);
            out.push(':');
        }
        Ok(())
    }

    fn close(&mut self, name: &str, out: &mut String) -> Result<()> {
        let level = self
            .levels
            .pop()
            .ok_or_else(|| ZiError::mapping(name, "unbalanced end event"))?;
        match level.kind {
            ZiJsonKind::Pending(_) => out.push_str("null"),
            ZiJsonKind::Object => out.push('}'),
            ZiJsonKind::Array => out.push(']'),
            ZiJsonKind::Scalar(_) => {}
        }
        Ok(())
    }
}

impl ZiTreeSerializer for ZiJsonSerializer {
    fn start_document(&mut self, out: &mut String) -> Result<()> {
        out.push('{');
        self.levels.clear();
        self.levels.push(ZiJsonLevel::new(ZiJsonKind::Object));
        Ok(())
    }

    fn end_document(&mut self, out: &mut String) -> Result<()> {
        if self.levels.len() != 1 {
            return Err(ZiError::mapping("/", "document ended with open nodes"));
        }
        self.close("/", out)
    }

    fn start_node(&mut self, name: &str, out: &mut String) -> Result<()> {
        self.begin_member(name, out)?;
        self.levels.push(ZiJsonLevel::new(ZiJsonKind::Pending(name.to_string())));
        Ok(())
    }

    fn end_node(&mut self, name: &str, out: &mut String) -> Result<()> {
        self.close(name, out)
    }

    fn start_collection(&mut self, name: &str, out: &mut String) -> Result<()> {
        self.begin_member(name, out)?;
        out.push('[');
        self.levels.push(ZiJsonLevel::new(ZiJsonKind::Array));
        Ok(())
    }

    fn end_collection(&mut self, name: &str, out: &mut String) -> Result<()> {
        self.close(name, out)
    }

    fn attribute(&mut self, name: &str, value: &ZiScalar, out: &mut String) -> Result<()> {
        self.open_pending(name, out)?;
        if self.top(name)?.kind != ZiJsonKind::Object {
            return Err(ZiError::mapping(name, "attribute outside of an object node"));
        }
        self.begin_member(name, out)?;
        out.push_str(&serde_json::to_string(&scalar_to_json(value))?);
        Ok(())
    }

    fn namespace(&mut self, _prefix: &str, _uri: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn text(&mut self, value: &ZiScalar, out: &mut String) -> Result<()> {
        let rendered = serde_json::to_string(&scalar_to_json(value))?;
        let kind = self.top(TEXT_MEMBER)?.kind.clone();
        match kind {
            ZiJsonKind::Pending(node) => {
                self.top(TEXT_MEMBER)?.kind = ZiJsonKind::Scalar(node);
            }
            ZiJsonKind::Object => self.begin_member(TEXT_MEMBER, out)?,
            ZiJsonKind::Array => {
                let top = self.top(TEXT_MEMBER)?;
                if !top.first {
                    out.push(',');
                }
                top.first = false;
            }
            ZiJsonKind::Scalar(node) => {
                return Err(ZiError::mapping(node, "scalar node already has a value"))
            }
        }
        out.push_str(&rendered);
        Ok(())
    }

    fn cdata(&mut self, value: &ZiScalar, out: &mut String) -> Result<()> {
        self.text(value, out)
    }
}
