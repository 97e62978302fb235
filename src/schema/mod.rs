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

//! # ZiTree Schema Module
//!
//! Target shape of the typed object graphs built by the bean writer.
//!
//! A schema is a tree of [`ZiSchemaObject`] nodes plus an arena of named
//! [`ZiSchemaObject::TypedObject`] definitions. A
//! [`ZiSchemaObject::TypedObjectRef`] points into the arena by type name, so
//! shared and recursive types are expressed without pointer cycles:
//!
//! ```rust
//! use zitree::schema::{ZiSchema, ZiSchemaObject, ZiSimpleType};
//!
//! let node = ZiSchemaObject::typed(
//!     "Node",
//!     vec![
//!         ZiSchemaObject::scalar(ZiSimpleType::String).with_name("label"),
//!         ZiSchemaObject::collection(ZiSchemaObject::reference("Node")).with_name("children"),
//!     ],
//! );
//! let schema = ZiSchema::new(ZiSchemaObject::reference("Node")).with_type(node);
//! schema.validate().unwrap();
//! ```

pub mod types;

pub use types::ZiSimpleType;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};

/// One node of a target type description.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZiSchemaObject {
    Scalar {
        #[serde(default)]
        name: Option<String>,
        #[serde(rename = "type")]
        ty: ZiSimpleType,
    },
    TypedObject {
        #[serde(default)]
        name: Option<String>,
        type_name: String,
        #[serde(default)]
        children: Vec<ZiSchemaObject>,
    },
    Collection {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        type_name: Option<String>,
        item: Box<ZiSchemaObject>,
    },
    Map {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        type_name: Option<String>,
        key: Box<ZiSchemaObject>,
        value: Box<ZiSchemaObject>,
    },
    TypedObjectRef {
        #[serde(default)]
        name: Option<String>,
        type_name: String,
    },
}

impl ZiSchemaObject {
    #[allow(non_snake_case)]
    pub fn scalar(ty: ZiSimpleType) -> Self {
        ZiSchemaObject::Scalar { name: None, ty }
    }

    #[allow(non_snake_case)]
    pub fn typed(type_name: impl Into<String>, children: Vec<ZiSchemaObject>) -> Self {
        ZiSchemaObject::TypedObject {
            name: None,
            type_name: type_name.into(),
            children,
        }
    }

    #[allow(non_snake_case)]
    pub fn collection(item: ZiSchemaObject) -> Self {
        ZiSchemaObject::Collection {
            name: None,
            type_name: None,
            item: Box::new(item),
        }
    }

    #[allow(non_snake_case)]
    pub fn map(key: ZiSchemaObject, value: ZiSchemaObject) -> Self {
        ZiSchemaObject::Map {
            name: None,
            type_name: None,
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    #[allow(non_snake_case)]
    pub fn reference(type_name: impl Into<String>) -> Self {
        ZiSchemaObject::TypedObjectRef {
            name: None,
            type_name: type_name.into(),
        }
    }

    /// Sets the property name under which this node lives in its parent.
    #[allow(non_snake_case)]
    pub fn with_name(mut self, property: impl Into<String>) -> Self {
        let property = Some(property.into());
        match &mut self {
            ZiSchemaObject::Scalar { name, .. }
            | ZiSchemaObject::TypedObject { name, .. }
            | ZiSchemaObject::Collection { name, .. }
            | ZiSchemaObject::Map { name, .. }
            | ZiSchemaObject::TypedObjectRef { name, .. } => *name = property,
        }
        self
    }

    /// Sets the concrete type identifier of a collection or map.
    #[allow(non_snake_case)]
    pub fn with_type_name(mut self, type_id: impl Into<String>) -> Self {
        match &mut self {
            ZiSchemaObject::Collection { type_name, .. } | ZiSchemaObject::Map { type_name, .. } => {
                *type_name = Some(type_id.into())
            }
            ZiSchemaObject::TypedObject { type_name, .. }
            | ZiSchemaObject::TypedObjectRef { type_name, .. } => *type_name = type_id.into(),
            ZiSchemaObject::Scalar { .. } => {}
        }
        self
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ZiSchemaObject::Scalar { name, .. }
            | ZiSchemaObject::TypedObject { name, .. }
            | ZiSchemaObject::Collection { name, .. }
            | ZiSchemaObject::Map { name, .. }
            | ZiSchemaObject::TypedObjectRef { name, .. } => name.as_deref(),
        }
    }

    /// Type identifier: scalar type name, typed object name or container type.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            ZiSchemaObject::Scalar { ty, .. } => Some(ty.name()),
            ZiSchemaObject::TypedObject { type_name, .. }
            | ZiSchemaObject::TypedObjectRef { type_name, .. } => Some(type_name),
            ZiSchemaObject::Collection { type_name, .. } | ZiSchemaObject::Map { type_name, .. } => {
                type_name.as_deref()
            }
        }
    }

    /// Named child of a typed object.
    pub fn child(&self, property: &str) -> Option<&ZiSchemaObject> {
        match self {
            ZiSchemaObject::TypedObject { children, .. } => {
                children.iter().find(|child| child.name() == Some(property))
            }
            _ => None,
        }
    }
}

impl PartialEq for ZiSchemaObject {
    /// Same kind, name and type identifier with equal children; typed object
    /// children compare in order, map key/value sides in any order.
    fn eq(&self, other: &Self) -> bool {
        if self.name() != other.name() || self.type_name() != other.type_name() {
            return false;
        }
        match (self, other) {
            (ZiSchemaObject::Scalar { .. }, ZiSchemaObject::Scalar { .. }) => true,
            (
                ZiSchemaObject::TypedObject { children: left, .. },
                ZiSchemaObject::TypedObject { children: right, .. },
            ) => left == right,
            (
                ZiSchemaObject::Collection { item: left, .. },
                ZiSchemaObject::Collection { item: right, .. },
            ) => left == right,
            (
                ZiSchemaObject::Map { key: lk, value: lv, .. },
                ZiSchemaObject::Map { key: rk, value: rv, .. },
            ) => (lk == rk && lv == rv) || (lk == rv && lv == rk),
            (ZiSchemaObject::TypedObjectRef { .. }, ZiSchemaObject::TypedObjectRef { .. }) => true,
            _ => false,
        }
    }
}

/// Callback for [`ZiSchema::walk`].
pub trait ZiSchemaVisitor {
    /// Called once per node; `path` is the `/`-separated property path.
    fn visit(&mut self, path: &str, object: &ZiSchemaObject) -> Result<()>;
}

/// A schema root with its arena of named typed objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiSchema {
    pub root: ZiSchemaObject,
    #[serde(default)]
    pub types: BTreeMap<String, ZiSchemaObject>,
}

impl ZiSchema {
    #[allow(non_snake_case)]
    pub fn new(root: ZiSchemaObject) -> Self {
        Self {
            root,
            types: BTreeMap::new(),
        }
    }

    /// Registers a typed object definition in the arena.
    #[allow(non_snake_case)]
    pub fn with_type(mut self, definition: ZiSchemaObject) -> Self {
        if let Some(type_name) = definition.type_name() {
            self.types.insert(type_name.to_string(), definition);
        }
        self
    }

    /// Follows a reference into the arena; other nodes resolve to themselves.
    pub fn resolve<'s>(&'s self, object: &'s ZiSchemaObject) -> Result<&'s ZiSchemaObject> {
        match object {
            ZiSchemaObject::TypedObjectRef { type_name, .. } => {
                self.types.get(type_name).ok_or_else(|| {
                    ZiError::configuration(format!("schema references undefined type '{type_name}'"))
                })
            }
            other => Ok(other),
        }
    }

    /// Node at a `/`-separated path in the vocabulary of [`ZiSchema::walk`].
    ///
    /// Collection items are reached through `item`, map sides through `key`
    /// and `value`, optionally preceded by `entry`. References are followed
    /// at every step, so recursive types resolve at any depth. `Ok(None)`
    /// means no node lives at `path`.
    pub fn find_by_path(&self, path: &str) -> Result<Option<&ZiSchemaObject>> {
        let mut current = self.resolve(&self.root)?;
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            let next = match (current, segment) {
                (ZiSchemaObject::TypedObject { .. }, property) => current.child(property),
                (ZiSchemaObject::Collection { item, .. }, "item") => Some(item.as_ref()),
                (ZiSchemaObject::Map { .. }, "entry") => Some(current),
                (ZiSchemaObject::Map { key, .. }, "key") => Some(key.as_ref()),
                (ZiSchemaObject::Map { value, .. }, "value") => Some(value.as_ref()),
                _ => None,
            };
            match next {
                Some(object) => current = self.resolve(object)?,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Checks arena entries are typed objects and every reference resolves.
    pub fn validate(&self) -> Result<()> {
        for (type_name, definition) in &self.types {
            match definition {
                ZiSchemaObject::TypedObject { type_name: declared, .. } if declared == type_name => {}
                _ => {
                    return Err(ZiError::configuration(format!(
                        "schema type '{type_name}' must be a typed object of the same name"
                    )))
                }
            }
        }
        struct ZiNoop;
        impl ZiSchemaVisitor for ZiNoop {
            fn visit(&mut self, _path: &str, _object: &ZiSchemaObject) -> Result<()> {
                Ok(())
            }
        }
        self.walk(&mut ZiNoop)
    }

    /// Depth-first walk. A referenced type is entered at its first
    /// reference only, which keeps recursive schemas finite.
    pub fn walk(&self, visitor: &mut dyn ZiSchemaVisitor) -> Result<()> {
        let mut entered = HashSet::new();
        self.walk_node(&self.root, "/".to_string(), visitor, &mut entered)
    }

    fn walk_node<'s>(
        &'s self,
        object: &'s ZiSchemaObject,
        path: String,
        visitor: &mut dyn ZiSchemaVisitor,
        entered: &mut HashSet<&'s str>,
    ) -> Result<()> {
        let object = match object {
            ZiSchemaObject::TypedObjectRef { type_name, .. } => {
                let target = self.resolve(object)?;
                if !entered.insert(type_name.as_str()) {
                    return Ok(());
                }
                target
            }
            other => other,
        };
        visitor.visit(&path, object)?;
        let base = path.trim_end_matches('/');
        match object {
            ZiSchemaObject::TypedObject { children, .. } => {
                for child in children {
                    let name = child.name().unwrap_or("?");
                    self.walk_node(child, format!("{base}/{name}"), visitor, entered)?;
                }
            }
            ZiSchemaObject::Collection { item, .. } => {
                self.walk_node(item, format!("{base}/item"), visitor, entered)?;
            }
            ZiSchemaObject::Map { key, value, .. } => {
                self.walk_node(key, format!("{base}/key"), visitor, entered)?;
                self.walk_node(value, format!("{base}/value"), visitor, entered)?;
            }
            _ => {}
        }
        Ok(())
    }
}
