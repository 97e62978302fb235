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

//! # Bean Writer
//!
//! Builds typed object graphs by walking a [`ZiSchema`] in lockstep with the
//! incoming tree events.
//!
//! ## Event interpretation
//!
//! - Outside any node, `write_start_node` opens the schema root. A completed
//!   root is kept until [`ZiBeanWriter::flush_bean`], and a root started
//!   before that continues filling the same object.
//! - Inside a typed object the node name selects a property. Scalar
//!   properties take the next leaf; other properties open a nested value,
//!   reusing one already assigned to that property.
//! - A node resolving to a collection opens the collection and one item in
//!   it, so repeating the node appends items. `write_start_collection` opens
//!   the collection alone and every child node becomes one item.
//! - Inside a map every child node is an entry; its `key` and `value` children
//!   fill the two sides.
//!
//! Values are kept in builder form and turned into class instances through
//! the [`ZiBeanRegistry`] only when the root is flushed.

pub mod class;

pub use class::{ZiBeanClass, ZiBeanRegistry, ZiBeanValue};

use crate::errors::{Result, ZiError};
use crate::record::ZiScalar;
use crate::schema::{ZiSchema, ZiSchemaObject, ZiSchemaVisitor, ZiSimpleType};
use crate::writer::{deliver, ZiCollector, ZiTargetWriter, ZiTreeWriter};

/// Reserved node name of collection items.
pub const LIST_ITEM: &str = "item";
/// Reserved node name of map entries.
pub const MAP_ENTRY: &str = "entry";
/// Reserved node name of a map entry's key.
pub const MAP_KEY: &str = "key";
/// Reserved node name of a map entry's value.
pub const MAP_VALUE: &str = "value";

/// State of the bean writer's state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiBeanState {
    Tree,
    Bean,
    Property,
    Collection,
    Map,
    MapEntry,
}

#[derive(Debug)]
enum ZiBeanSlot {
    Value(ZiBeanValue),
    Bean {
        type_name: String,
        properties: Vec<(String, ZiBeanSlot)>,
    },
    List(Vec<ZiBeanSlot>),
    Map(Vec<(ZiBeanSlot, ZiBeanSlot)>),
    Entry {
        key: Option<Box<ZiBeanSlot>>,
        value: Option<Box<ZiBeanSlot>>,
    },
}

impl ZiBeanSlot {
    fn state(&self) -> ZiBeanState {
        match self {
            ZiBeanSlot::Value(_) => ZiBeanState::Property,
            ZiBeanSlot::Bean { .. } => ZiBeanState::Bean,
            ZiBeanSlot::List(_) => ZiBeanState::Collection,
            ZiBeanSlot::Map(_) => ZiBeanState::Map,
            ZiBeanSlot::Entry { .. } => ZiBeanState::MapEntry,
        }
    }

    fn empty_for(schema: &ZiSchemaObject) -> Option<Self> {
        match schema {
            ZiSchemaObject::TypedObject { type_name, .. } => Some(ZiBeanSlot::Bean {
                type_name: type_name.clone(),
                properties: Vec::new(),
            }),
            ZiSchemaObject::Collection { .. } => Some(ZiBeanSlot::List(Vec::new())),
            ZiSchemaObject::Map { .. } => Some(ZiBeanSlot::Map(Vec::new())),
            _ => None,
        }
    }

    fn fits(&self, schema: &ZiSchemaObject) -> bool {
        matches!(
            (self, schema),
            (ZiBeanSlot::Bean { .. }, ZiSchemaObject::TypedObject { .. })
                | (ZiBeanSlot::List(_), ZiSchemaObject::Collection { .. })
                | (ZiBeanSlot::Map(_), ZiSchemaObject::Map { .. })
        )
    }
}

/// Where a finished value goes.
#[derive(Clone, Debug, PartialEq)]
enum ZiRole {
    Root,
    Property(String),
    Item,
    Key,
    Value,
    Entry,
}

struct ZiFrame<'s> {
    slot: ZiBeanSlot,
    schema: &'s ZiSchemaObject,
    role: ZiRole,
    depth: usize,
    path: String,
}

struct ZiPendingLeaf {
    role: ZiRole,
    ty: ZiSimpleType,
    depth: usize,
    value: Option<ZiBeanValue>,
    path: String,
}

/// Mutable state of the bean writer between events.
#[derive(Default)]
pub struct ZiBeanWriteContext<'s> {
    frames: Vec<ZiFrame<'s>>,
    pending: Option<ZiPendingLeaf>,
    depth: usize,
    in_tree: bool,
    result: Option<ZiBeanSlot>,
}

impl ZiBeanWriteContext<'_> {
    pub fn state(&self) -> ZiBeanState {
        if self.pending.is_some() {
            return ZiBeanState::Property;
        }
        self.frames
            .last()
            .map_or(ZiBeanState::Tree, |frame| frame.slot.state())
    }

    fn path(&self) -> &str {
        self.frames.last().map_or("/", |frame| frame.path.as_str())
    }
}

/// Tree writer materializing typed objects.
pub struct ZiBeanWriter<'s> {
    schema: &'s ZiSchema,
    registry: &'s ZiBeanRegistry,
    ctx: ZiBeanWriteContext<'s>,
    target: Option<ZiCollector<ZiBeanValue>>,
}

struct ZiClassCheck<'r> {
    registry: &'r ZiBeanRegistry,
}

impl ZiSchemaVisitor for ZiClassCheck<'_> {
    fn visit(&mut self, path: &str, object: &ZiSchemaObject) -> Result<()> {
        let ZiSchemaObject::TypedObject {
            type_name,
            children,
            ..
        } = object
        else {
            return Ok(());
        };
        let class = self.registry.get(type_name).ok_or_else(|| {
            ZiError::configuration(format!("no bean class registered for type '{type_name}' at '{path}'"))
        })?;
        for child in children {
            let property = child.name().ok_or_else(|| {
                ZiError::configuration(format!("unnamed property of '{type_name}' at '{path}'"))
            })?;
            if !class.has_property(property) {
                return Err(ZiError::mapping(
                    format!("{}/{property}", path.trim_end_matches('/')),
                    format!("type '{type_name}' declares no property '{property}'"),
                ));
            }
        }
        Ok(())
    }
}

impl<'s> ZiBeanWriter<'s> {
    /// Validates `schema` against `registry` and creates the writer.
    #[allow(non_snake_case)]
    pub fn new(schema: &'s ZiSchema, registry: &'s ZiBeanRegistry) -> Result<Self> {
        schema.validate()?;
        schema.walk(&mut ZiClassCheck { registry })?;
        Ok(Self {
            schema,
            registry,
            ctx: ZiBeanWriteContext::default(),
            target: None,
        })
    }

    pub fn state(&self) -> ZiBeanState {
        self.ctx.state()
    }

    /// Returns and clears the last completed root.
    pub fn flush_bean(&mut self) -> Result<Option<ZiBeanValue>> {
        match self.ctx.result.take() {
            Some(slot) => {
                log::debug!("bean root completed");
                self.materialize(slot, "/").map(Some)
            }
            None => Ok(None),
        }
    }

    fn materialize(&self, slot: ZiBeanSlot, path: &str) -> Result<ZiBeanValue> {
        match slot {
            ZiBeanSlot::Value(value) => Ok(value),
            ZiBeanSlot::Bean {
                type_name,
                properties,
            } => {
                let class = self.registry.get(&type_name).ok_or_else(|| {
                    ZiError::mapping(path, format!("no bean class registered for type '{type_name}'"))
                })?;
                let mut bean = class.instantiate();
                for (name, slot) in properties {
                    let property_path = format!("{}/{name}", path.trim_end_matches('/'));
                    let value = self.materialize(slot, &property_path)?;
                    class
                        .set(bean.as_mut(), &name, value)
                        .map_err(|err| ZiError::mapping(&property_path, format!("{err:#}")))?;
                }
                Ok(ZiBeanValue::Object(bean))
            }
            ZiBeanSlot::List(items) => {
                let item_path = format!("{}/{LIST_ITEM}", path.trim_end_matches('/'));
                items
                    .into_iter()
                    .map(|item| self.materialize(item, &item_path))
                    .collect::<Result<Vec<_>>>()
                    .map(ZiBeanValue::List)
            }
            ZiBeanSlot::Map(entries) => {
                let entry_path = format!("{}/{MAP_ENTRY}", path.trim_end_matches('/'));
                entries
                    .into_iter()
                    .map(|(key, value)| {
                        Ok((
                            self.materialize(key, &entry_path)?,
                            self.materialize(value, &entry_path)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(ZiBeanValue::Map)
            }
            ZiBeanSlot::Entry { .. } => Err(ZiError::internal(format!(
                "unattached map entry at '{path}'"
            ))),
        }
    }

    fn start(&mut self, name: &str, cascade: bool) -> Result<()> {
        if !self.ctx.in_tree {
            return Err(ZiError::mapping(name, "node started outside of a tree"));
        }
        if let Some(pending) = &self.ctx.pending {
            return Err(ZiError::mapping(
                pending.path.clone(),
                format!("scalar property cannot contain node '{name}'"),
            ));
        }
        let depth = self.ctx.depth + 1;
        let started = self.start_at(name, depth, cascade);
        if started.is_ok() {
            self.ctx.depth = depth;
        }
        started
    }

    fn start_at(&mut self, name: &str, depth: usize, cascade: bool) -> Result<()> {
        match self.ctx.state() {
            ZiBeanState::Tree => {
                let schemas: &'s ZiSchema = self.schema;
                let schema = schemas.resolve(&schemas.root)?;
                let slot = match self.ctx.result.take() {
                    Some(slot) if slot.fits(schema) => slot,
                    _ => ZiBeanSlot::empty_for(schema).ok_or_else(|| {
                        ZiError::mapping("/", "schema root must be a typed object, collection or map")
                    })?,
                };
                self.ctx.frames.push(ZiFrame {
                    slot,
                    schema,
                    role: ZiRole::Root,
                    depth,
                    path: "/".to_string(),
                });
                if cascade && matches!(schema, ZiSchemaObject::Collection { .. }) {
                    self.open_item(depth)?;
                }
                Ok(())
            }
            ZiBeanState::Bean => {
                let schema: &'s ZiSchemaObject = self.top()?.schema;
                let child = schema.child(name).ok_or_else(|| {
                    ZiError::mapping(
                        self.ctx.path().to_string(),
                        format!("type '{}' has no property '{name}'", schema.type_name().unwrap_or("?")),
                    )
                })?;
                self.open(ZiRole::Property(name.to_string()), child, name, depth, cascade)
            }
            ZiBeanState::Collection => self.open_item(depth),
            ZiBeanState::Map => {
                let parent = self.top()?;
                let path = format!("{}/{MAP_ENTRY}", parent.path.trim_end_matches('/'));
                let schema = parent.schema;
                self.ctx.frames.push(ZiFrame {
                    slot: ZiBeanSlot::Entry {
                        key: None,
                        value: None,
                    },
                    schema,
                    role: ZiRole::Entry,
                    depth,
                    path,
                });
                Ok(())
            }
            ZiBeanState::MapEntry => {
                let schema: &'s ZiSchemaObject = self.top()?.schema;
                let ZiSchemaObject::Map { key, value, .. } = schema else {
                    return Err(ZiError::internal("map entry without map schema"));
                };
                let (role, side) = match name {
                    MAP_KEY => (ZiRole::Key, &**key),
                    MAP_VALUE => (ZiRole::Value, &**value),
                    other => {
                        return Err(ZiError::mapping(
                            self.ctx.path().to_string(),
                            format!("map entry expects '{MAP_KEY}' or '{MAP_VALUE}', got '{other}'"),
                        ))
                    }
                };
                self.open(role, side, name, depth, cascade)
            }
            ZiBeanState::Property => Err(ZiError::internal("pending property not detected")),
        }
    }

    fn top(&self) -> Result<&ZiFrame<'s>> {
        self.ctx
            .frames
            .last()
            .ok_or_else(|| ZiError::internal("bean frame stack is empty"))
    }

    /// Opens one item of the collection on top of the stack.
    fn open_item(&mut self, depth: usize) -> Result<()> {
        let schema: &'s ZiSchemaObject = self.top()?.schema;
        let ZiSchemaObject::Collection { item, .. } = schema else {
            return Err(ZiError::internal("collection frame without collection schema"));
        };
        self.open(ZiRole::Item, &**item, LIST_ITEM, depth, false)
    }

    fn open(
        &mut self,
        role: ZiRole,
        declared: &'s ZiSchemaObject,
        name: &str,
        depth: usize,
        cascade: bool,
    ) -> Result<()> {
        let path = format!("{}/{name}", self.ctx.path().trim_end_matches('/'));
        let schemas: &'s ZiSchema = self.schema;
        let schema = schemas.resolve(declared)?;
        if let ZiSchemaObject::Scalar { ty, .. } = schema {
            self.ctx.pending = Some(ZiPendingLeaf {
                role,
                ty: *ty,
                depth,
                value: None,
                path,
            });
            return Ok(());
        }

        let reused = match (&role, self.ctx.frames.last_mut()) {
            (ZiRole::Property(property), Some(parent)) => take_property(&mut parent.slot, property, schema),
            _ => None,
        };
        let slot = match reused {
            Some(slot) => slot,
            None => ZiBeanSlot::empty_for(schema).ok_or_else(|| {
                ZiError::mapping(path.clone(), "unsupported schema node")
            })?,
        };
        self.ctx.frames.push(ZiFrame {
            slot,
            schema,
            role,
            depth,
            path,
        });
        if cascade && matches!(schema, ZiSchemaObject::Collection { .. }) {
            self.open_item(depth)?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.ctx.depth == 0 {
            return Err(ZiError::mapping(self.ctx.path().to_string(), "unbalanced end of node"));
        }
        let depth = self.ctx.depth;
        if let Some(pending) = self.ctx.pending.take() {
            if pending.depth != depth {
                return Err(ZiError::internal("pending property opened at another depth"));
            }
            let value = match (pending.value, &pending.role) {
                (Some(value), _) => Some(value),
                (None, ZiRole::Property(_)) => None,
                (None, _) => Some(ZiBeanValue::Null),
            };
            if let Some(value) = value {
                self.attach(pending.role, ZiBeanSlot::Value(value), &pending.path)?;
            }
        }
        while self.ctx.frames.last().map_or(false, |frame| frame.depth == depth) {
            let Some(frame) = self.ctx.frames.pop() else { break };
            self.attach(frame.role, frame.slot, &frame.path)?;
        }
        self.ctx.depth -= 1;
        Ok(())
    }

    fn attach(&mut self, role: ZiRole, slot: ZiBeanSlot, path: &str) -> Result<()> {
        if role == ZiRole::Root {
            self.ctx.result = Some(slot);
            return Ok(());
        }
        let parent = self
            .ctx
            .frames
            .last_mut()
            .ok_or_else(|| ZiError::internal(format!("no parent for '{path}'")))?;
        match (role, &mut parent.slot) {
            (ZiRole::Property(name), ZiBeanSlot::Bean { properties, .. }) => {
                match properties.iter_mut().find(|(property, _)| *property == name) {
                    Some((_, existing)) => *existing = slot,
                    None => properties.push((name, slot)),
                }
            }
            (ZiRole::Item, ZiBeanSlot::List(items)) => items.push(slot),
            (ZiRole::Key, ZiBeanSlot::Entry { key, .. }) => *key = Some(Box::new(slot)),
            (ZiRole::Value, ZiBeanSlot::Entry { value, .. }) => *value = Some(Box::new(slot)),
            (ZiRole::Entry, ZiBeanSlot::Map(entries)) => {
                let ZiBeanSlot::Entry { key, value } = slot else {
                    return Err(ZiError::internal("map entry frame holds no entry"));
                };
                let key = key.map_or(ZiBeanSlot::Value(ZiBeanValue::Null), |key| *key);
                let value = value.map_or(ZiBeanSlot::Value(ZiBeanValue::Null), |value| *value);
                entries.push((key, value));
            }
            (role, parent) => {
                return Err(ZiError::mapping(
                    path,
                    format!("cannot attach {role:?} to {:?}", parent.state()),
                ))
            }
        }
        Ok(())
    }
}

/// Takes a container already assigned to `property`, leaving a null in place.
fn take_property(slot: &mut ZiBeanSlot, property: &str, schema: &ZiSchemaObject) -> Option<ZiBeanSlot> {
    let ZiBeanSlot::Bean { properties, .. } = slot else {
        return None;
    };
    let (_, existing) = properties
        .iter_mut()
        .find(|(name, existing)| name == property && existing.fits(schema))?;
    Some(std::mem::replace(existing, ZiBeanSlot::Value(ZiBeanValue::Null)))
}

impl ZiTreeWriter for ZiBeanWriter<'_> {
    fn write_start_tree(&mut self) -> Result<()> {
        self.ctx.in_tree = true;
        Ok(())
    }

    fn write_end_tree(&mut self) -> Result<()> {
        if self.ctx.depth != 0 || !self.ctx.frames.is_empty() {
            return Err(ZiError::mapping(
                self.ctx.path().to_string(),
                "tree ended with open nodes",
            ));
        }
        self.ctx.in_tree = false;
        Ok(())
    }

    fn write_start_node(&mut self, name: &str) -> Result<()> {
        self.start(name, true)
    }

    fn write_end_node(&mut self, _name: &str) -> Result<()> {
        self.end()
    }

    fn write_start_collection(&mut self, name: &str) -> Result<()> {
        self.start(name, false)
    }

    fn write_end_collection(&mut self, _name: &str) -> Result<()> {
        self.end()
    }

    fn write_leaf(&mut self, value: &ZiScalar) -> Result<()> {
        let path = self.ctx.path().to_string();
        let pending = self
            .ctx
            .pending
            .as_mut()
            .ok_or_else(|| ZiError::mapping(path, "leaf outside of a scalar property"))?;
        let converted = ZiBeanValue::convert(pending.ty, value)
            .map_err(|err| ZiError::mapping(pending.path.clone(), format!("{err:#}")))?;
        pending.value = Some(converted);
        Ok(())
    }

    /// Namespaces have no meaning for objects.
    fn write_namespace(&mut self, _prefix: &str, _uri: &str) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(target) = self.target.clone() else {
            return Ok(());
        };
        if let Some(bean) = self.flush_bean()? {
            deliver(&target, Some(bean))?;
        }
        Ok(())
    }
}

impl ZiTargetWriter for ZiBeanWriter<'_> {
    type Target = ZiCollector<ZiBeanValue>;

    fn set_target(&mut self, target: Self::Target) -> Result<()> {
        self.target = Some(target);
        Ok(())
    }
}
