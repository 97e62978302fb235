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

//! # Writable Nodes
//!
//! The compiled mapping tree and its write protocol.
//!
//! A [`ZiWritable`] is one node of the output document. Containers
//! ([`ZiWritableObject`], [`ZiWritableCollection`]) own ordered children and
//! may carry a [`ZiPortBinding`] that repeats them once per correlated child
//! record. Writing walks the tree depth first and emits events through the
//! [`ZiTreeWriter`] held by the [`ZiWriteContext`].
//!
//! ## Write states
//!
//! In [`ZiWriteState::All`] the whole document is written. The other states
//! split the document around the partition element so its start and end can
//! be emitted in separate passes while its body is written in between:
//!
//! | State     | Ancestors            | Partition element        |
//! |-----------|----------------------|--------------------------|
//! | `Header`  | start + earlier kids | collection start         |
//! | `Nothing` | silent               | body items               |
//! | `Footer`  | later kids + end     | collection end           |

use std::collections::HashSet;

use crate::errors::Result;
use crate::mapping::binding::ZiPortBinding;
use crate::mapping::value::{ZiNodeName, ZiWritableValue};
use crate::portdata::{ZiDataIterator, ZiPortRegistry};
use crate::record::{ZiRecord, ZiRecordSet, ZiScalar};
use crate::writer::ZiTreeWriter;

/// Whether namespace declarations make an object non-empty.
///
/// Off: an object holding only namespace declarations is empty and is
/// suppressed unless it has `write_null` set.
pub const NAMESPACES_COUNT_AS_CONTENT: bool = false;

/// Stable identifier of a container within one mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZiNodeId(pub usize);

/// Per-pass write state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZiWriteState {
    #[default]
    All,
    Header,
    Footer,
    Nothing,
}

/// The designated partition element and the ids on the path leading to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ZiPartition {
    pub element: ZiNodeId,
    pub path: HashSet<ZiNodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ZiNodeRole {
    Normal,
    Ancestor,
    Partition,
}

struct ZiActiveIterator {
    port: usize,
    iterator: Box<dyn ZiDataIterator>,
}

/// Mutable state of one write pass.
pub struct ZiWriteContext<'a> {
    pub(crate) writer: &'a mut dyn ZiTreeWriter,
    pub(crate) records: &'a mut ZiRecordSet,
    pub(crate) ports: &'a mut ZiPortRegistry,
    state: ZiWriteState,
    partition: Option<&'a ZiPartition>,
    iterators: Vec<ZiActiveIterator>,
}

impl<'a> ZiWriteContext<'a> {
    #[allow(non_snake_case)]
    pub fn new(
        writer: &'a mut dyn ZiTreeWriter,
        records: &'a mut ZiRecordSet,
        ports: &'a mut ZiPortRegistry,
    ) -> Self {
        Self {
            writer,
            records,
            ports,
            state: ZiWriteState::All,
            partition: None,
            iterators: Vec::new(),
        }
    }

    /// Sets the pass state and the partition it brackets.
    #[allow(non_snake_case)]
    pub fn with_state(mut self, state: ZiWriteState, partition: Option<&'a ZiPartition>) -> Self {
        self.state = state;
        self.partition = partition;
        self
    }

    pub fn state(&self) -> ZiWriteState {
        self.state
    }

    pub fn records(&self) -> &ZiRecordSet {
        self.records
    }

    fn in_state<T>(
        &mut self,
        state: ZiWriteState,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.state, state);
        let outcome = body(self);
        self.state = previous;
        outcome
    }

    fn role(&self, id: ZiNodeId) -> ZiNodeRole {
        match self.partition {
            Some(partition) if self.state != ZiWriteState::All => {
                if partition.element == id {
                    ZiNodeRole::Partition
                } else if partition.path.contains(&id) {
                    ZiNodeRole::Ancestor
                } else {
                    ZiNodeRole::Normal
                }
            }
            _ => ZiNodeRole::Normal,
        }
    }

    fn on_path(&self, node: &ZiWritable) -> bool {
        match (self.partition, node.id()) {
            (Some(partition), Some(id)) => partition.path.contains(&id),
            _ => false,
        }
    }

    pub(crate) fn push_iterator(&mut self, port: usize, iterator: Box<dyn ZiDataIterator>) -> usize {
        self.iterators.push(ZiActiveIterator { port, iterator });
        self.iterators.len() - 1
    }

    pub(crate) fn pop_iterator(&mut self) {
        self.iterators.pop();
    }

    pub(crate) fn next_from(&mut self, depth: usize) -> Option<ZiRecord> {
        self.iterators
            .get_mut(depth)
            .and_then(|active| active.iterator.next_record())
    }

    /// Peeks the innermost active iterator over `port`.
    pub(crate) fn peek_port(&mut self, port: usize) -> Option<ZiRecord> {
        self.iterators
            .iter_mut()
            .rev()
            .find(|active| active.port == port)
            .and_then(|active| active.iterator.peek_record())
    }
}

/// One node of the compiled mapping.
#[derive(Clone, Debug)]
pub enum ZiWritable {
    Object(ZiWritableObject),
    Collection(ZiWritableCollection),
    Attribute(ZiWritableAttribute),
    Value(ZiWritableText),
    CData(ZiWritableText),
    Namespace(ZiWritableNamespace),
}

impl ZiWritable {
    pub fn write(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        match self {
            ZiWritable::Object(object) => object.write(ctx),
            ZiWritable::Collection(collection) => collection.write(ctx),
            ZiWritable::Attribute(attribute) => attribute.write(ctx),
            ZiWritable::Value(text) => text.write(ctx, false),
            ZiWritable::CData(text) => text.write(ctx, true),
            ZiWritable::Namespace(namespace) => namespace.write(ctx),
        }
    }

    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        match self {
            ZiWritable::Object(object) => object.is_empty(records),
            ZiWritable::Collection(collection) => collection.is_empty(records),
            ZiWritable::Attribute(attribute) => attribute.is_empty(records),
            ZiWritable::Value(text) | ZiWritable::CData(text) => text.is_empty(records),
            ZiWritable::Namespace(_) => Ok(!NAMESPACES_COUNT_AS_CONTENT),
        }
    }

    /// Id of a container node.
    pub fn id(&self) -> Option<ZiNodeId> {
        match self {
            ZiWritable::Object(object) => Some(object.id),
            ZiWritable::Collection(collection) => Some(collection.id),
            _ => None,
        }
    }

    pub fn binding(&self) -> Option<&ZiPortBinding> {
        match self {
            ZiWritable::Object(object) => object.binding.as_ref(),
            ZiWritable::Collection(collection) => collection.binding.as_ref(),
            _ => None,
        }
    }

    pub fn children(&self) -> &[ZiWritable] {
        match self {
            ZiWritable::Object(object) => &object.children,
            ZiWritable::Collection(collection) => &collection.children,
            _ => &[],
        }
    }

    /// Every `(port, field)` reference held by this node, not its children.
    pub fn references(&self) -> Vec<(usize, usize)> {
        match self {
            ZiWritable::Object(object) => {
                let mut refs: Vec<_> = object.name.references().collect();
                for attribute in &object.attributes {
                    refs.extend(attribute.name.references());
                    refs.extend(attribute.value.references());
                }
                refs
            }
            ZiWritable::Collection(collection) => collection.name.references().collect(),
            ZiWritable::Attribute(attribute) => attribute
                .name
                .references()
                .chain(attribute.value.references())
                .collect(),
            ZiWritable::Value(text) | ZiWritable::CData(text) => text.value.references().collect(),
            ZiWritable::Namespace(_) => Vec::new(),
        }
    }
}

fn write_children(children: &[ZiWritable], ctx: &mut ZiWriteContext<'_>) -> Result<()> {
    for child in children {
        child.write(ctx)?;
    }
    Ok(())
}

/// Children of a partition ancestor: the path child keeps the pass state,
/// siblings before it belong to the header and siblings after it to the footer.
fn write_path_children(children: &[ZiWritable], ctx: &mut ZiWriteContext<'_>) -> Result<()> {
    let state = ctx.state;
    let mut before = true;
    for child in children {
        if ctx.on_path(child) {
            child.write(ctx)?;
            before = false;
            continue;
        }
        let owned = match state {
            ZiWriteState::Header => before,
            ZiWriteState::Footer => !before,
            _ => false,
        };
        if owned {
            ctx.in_state(ZiWriteState::All, |ctx| child.write(ctx))?;
        }
    }
    Ok(())
}

fn children_empty(children: &[ZiWritable], records: &ZiRecordSet) -> Result<bool> {
    for child in children {
        if !child.is_empty(records)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Element node with attributes, namespaces and children.
#[derive(Clone, Debug)]
pub struct ZiWritableObject {
    pub id: ZiNodeId,
    pub path: String,
    pub name: ZiNodeName,
    pub write_null: bool,
    pub hidden: bool,
    pub root: bool,
    pub namespaces: Vec<ZiWritableNamespace>,
    pub attributes: Vec<ZiWritableAttribute>,
    pub children: Vec<ZiWritable>,
    pub binding: Option<ZiPortBinding>,
}

impl ZiWritableObject {
    #[allow(non_snake_case)]
    pub fn new(id: ZiNodeId, name: ZiNodeName) -> Self {
        let path = format!("/{}", name.describe());
        Self {
            id,
            path,
            name,
            write_null: false,
            hidden: false,
            root: false,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            binding: None,
        }
    }

    /// The mapping root: never tagged, only dispatches to its children.
    #[allow(non_snake_case)]
    pub fn root() -> Self {
        let mut root = Self::new(ZiNodeId(0), ZiNodeName::default());
        root.root = true;
        root.path = String::new();
        root
    }

    #[allow(non_snake_case)]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[allow(non_snake_case)]
    pub fn with_write_null(mut self, write_null: bool) -> Self {
        self.write_null = write_null;
        self
    }

    #[allow(non_snake_case)]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    #[allow(non_snake_case)]
    pub fn with_binding(mut self, binding: ZiPortBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    #[allow(non_snake_case)]
    pub fn with(mut self, node: ZiWritable) -> Self {
        self.add(node);
        self
    }

    /// Adds a node; attributes and namespaces go to their own lists.
    pub fn add(&mut self, node: ZiWritable) {
        match node {
            ZiWritable::Attribute(attribute) => self.attributes.push(attribute),
            ZiWritable::Namespace(namespace) => self.namespaces.push(namespace),
            other => self.children.push(other),
        }
    }

    /// Bound objects and `write_null` objects are never empty; otherwise
    /// attributes and children decide.
    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        if self.write_null || self.binding.is_some() {
            return Ok(false);
        }
        self.is_content_empty(records)
    }

    fn is_content_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        if NAMESPACES_COUNT_AS_CONTENT && !self.namespaces.is_empty() {
            return Ok(false);
        }
        for attribute in &self.attributes {
            if !attribute.is_empty(records)? {
                return Ok(false);
            }
        }
        children_empty(&self.children, records)
    }

    fn tagged(&self) -> bool {
        !self.root && !self.hidden
    }

    pub fn write(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        match ctx.role(self.id) {
            ZiNodeRole::Ancestor => self.write_ancestor(ctx),
            ZiNodeRole::Partition => {
                if ctx.state != ZiWriteState::Nothing {
                    return Ok(());
                }
                ctx.in_state(ZiWriteState::All, |ctx| match &self.binding {
                    Some(binding) => {
                        binding.write_segment(ctx, &self.path, |ctx| self.write_instance(ctx))
                    }
                    None => self.write_instance(ctx),
                })
            }
            ZiNodeRole::Normal => match &self.binding {
                Some(binding) => binding.write_each(ctx, &self.path, |ctx| self.write_instance(ctx)),
                None => self.write_instance(ctx),
            },
        }
    }

    /// One occurrence of the element against the current records.
    fn write_instance(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        if !self.write_null && self.is_content_empty(ctx.records)? {
            return Ok(());
        }
        if !self.tagged() {
            return write_children(&self.children, ctx);
        }
        let name = self.write_start(ctx)?;
        write_children(&self.children, ctx)?;
        ctx.writer.write_end_node(&name)
    }

    fn write_start(&self, ctx: &mut ZiWriteContext<'_>) -> Result<String> {
        let name = self.name.resolve(ctx.records)?;
        ctx.writer.write_start_node(&name)?;
        for namespace in &self.namespaces {
            namespace.write(ctx)?;
        }
        for attribute in &self.attributes {
            attribute.write(ctx)?;
        }
        Ok(name)
    }

    fn write_ancestor(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        if !self.tagged() {
            return write_path_children(&self.children, ctx);
        }
        let name = match ctx.state {
            ZiWriteState::Header => self.write_start(ctx)?,
            _ => self.name.resolve(ctx.records)?,
        };
        write_path_children(&self.children, ctx)?;
        if ctx.state == ZiWriteState::Footer {
            ctx.writer.write_end_node(&name)?;
        }
        Ok(())
    }
}

/// Collection container, bracketed by collection events.
#[derive(Clone, Debug)]
pub struct ZiWritableCollection {
    pub id: ZiNodeId,
    pub path: String,
    pub name: ZiNodeName,
    pub write_null: bool,
    pub children: Vec<ZiWritable>,
    pub binding: Option<ZiPortBinding>,
}

impl ZiWritableCollection {
    #[allow(non_snake_case)]
    pub fn new(id: ZiNodeId, name: ZiNodeName) -> Self {
        let path = format!("/{}", name.describe());
        Self {
            id,
            path,
            name,
            write_null: false,
            children: Vec::new(),
            binding: None,
        }
    }

    #[allow(non_snake_case)]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[allow(non_snake_case)]
    pub fn with_write_null(mut self, write_null: bool) -> Self {
        self.write_null = write_null;
        self
    }

    #[allow(non_snake_case)]
    pub fn with_binding(mut self, binding: ZiPortBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    #[allow(non_snake_case)]
    pub fn with(mut self, node: ZiWritable) -> Self {
        self.children.push(node);
        self
    }

    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        if self.write_null || self.binding.is_some() {
            return Ok(false);
        }
        children_empty(&self.children, records)
    }

    /// A bound collection is bracketed once; its children repeat per record.
    pub fn write(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        match ctx.role(self.id) {
            ZiNodeRole::Ancestor => {
                let name = self.name.resolve(ctx.records)?;
                if ctx.state == ZiWriteState::Header {
                    ctx.writer.write_start_collection(&name)?;
                }
                write_path_children(&self.children, ctx)?;
                if ctx.state == ZiWriteState::Footer {
                    ctx.writer.write_end_collection(&name)?;
                }
                Ok(())
            }
            ZiNodeRole::Partition => match ctx.state {
                ZiWriteState::Header => {
                    let name = self.name.resolve(ctx.records)?;
                    ctx.writer.write_start_collection(&name)
                }
                ZiWriteState::Footer => {
                    let name = self.name.resolve(ctx.records)?;
                    ctx.writer.write_end_collection(&name)
                }
                _ => ctx.in_state(ZiWriteState::All, |ctx| match &self.binding {
                    Some(binding) => binding.write_segment(ctx, &self.path, |ctx| {
                        write_children(&self.children, ctx)
                    }),
                    None => write_children(&self.children, ctx),
                }),
            },
            ZiNodeRole::Normal => {
                if self.is_empty(ctx.records)? {
                    return Ok(());
                }
                let name = self.name.resolve(ctx.records)?;
                ctx.writer.write_start_collection(&name)?;
                match &self.binding {
                    Some(binding) => binding.write_each(ctx, &self.path, |ctx| {
                        write_children(&self.children, ctx)
                    })?,
                    None => write_children(&self.children, ctx)?,
                }
                ctx.writer.write_end_collection(&name)
            }
        }
    }
}

/// Attribute of the enclosing object.
#[derive(Clone, Debug)]
pub struct ZiWritableAttribute {
    pub name: ZiNodeName,
    pub value: ZiWritableValue,
    pub write_null: bool,
}

impl ZiWritableAttribute {
    #[allow(non_snake_case)]
    pub fn new(name: ZiNodeName, value: ZiWritableValue) -> Self {
        Self {
            name,
            value,
            write_null: false,
        }
    }

    #[allow(non_snake_case)]
    pub fn with_write_null(mut self, write_null: bool) -> Self {
        self.write_null = write_null;
        self
    }

    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        if self.write_null {
            return Ok(false);
        }
        self.value.is_empty(records)
    }

    fn write(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        if self.value.is_empty(ctx.records)? && !self.write_null {
            return Ok(());
        }
        let value = self.value.resolve(ctx.records)?.unwrap_or(ZiScalar::Null);
        let name = self.name.resolve(ctx.records)?;
        ctx.writer.write_attribute(&name, &value)
    }
}

/// Text or CDATA content of the enclosing node.
#[derive(Clone, Debug)]
pub struct ZiWritableText {
    pub value: ZiWritableValue,
    pub write_null: bool,
}

impl ZiWritableText {
    #[allow(non_snake_case)]
    pub fn new(value: ZiWritableValue) -> Self {
        Self {
            value,
            write_null: false,
        }
    }

    #[allow(non_snake_case)]
    pub fn with_write_null(mut self, write_null: bool) -> Self {
        self.write_null = write_null;
        self
    }

    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        if self.write_null {
            return Ok(false);
        }
        self.value.is_empty(records)
    }

    fn write(&self, ctx: &mut ZiWriteContext<'_>, cdata: bool) -> Result<()> {
        if self.value.is_empty(ctx.records)? && !self.write_null {
            return Ok(());
        }
        let value = self.value.resolve(ctx.records)?.unwrap_or(ZiScalar::Null);
        if cdata {
            ctx.writer.write_cdata(&value)
        } else {
            ctx.writer.write_leaf(&value)
        }
    }
}

/// Namespace declaration of the enclosing object.
#[derive(Clone, Debug, PartialEq)]
pub struct ZiWritableNamespace {
    pub prefix: String,
    pub uri: String,
}

impl ZiWritableNamespace {
    #[allow(non_snake_case)]
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    fn write(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        ctx.writer.write_namespace(&self.prefix, &self.uri)
    }
}
