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

//! # ZiTree Mapping Module
//!
//! The compiled, immutable description of an output document.
//!
//! A [`ZiWritableMapping`] is built once, either by hand from [`node`] types
//! or from a declarative [`design::ZiMappingDesign`] through
//! [`compiler::ZiMappingCompiler`], and is then shared read-only by every
//! formatter that writes it.

pub mod binding;
pub mod compiler;
pub mod design;
pub mod filter;
pub mod node;
pub mod value;

use std::collections::HashSet;

use crate::errors::{Result, ZiError};
use crate::mapping::binding::ZiPortBinding;
use crate::mapping::node::{
    ZiNodeId, ZiPartition, ZiWritable, ZiWritableObject, ZiWriteContext,
};

/// Root of a compiled mapping plus its optional partition element.
#[derive(Clone, Debug)]
pub struct ZiWritableMapping {
    root: ZiWritableObject,
    partition: Option<ZiPartition>,
}

impl ZiWritableMapping {
    #[allow(non_snake_case)]
    pub fn new(root: ZiWritableObject) -> Self {
        Self {
            root,
            partition: None,
        }
    }

    /// Designates the partition element.
    ///
    /// The element must be a container of this mapping and none of its
    /// ancestors may be bound to a port.
    #[allow(non_snake_case)]
    pub fn with_partition(mut self, element: ZiNodeId) -> Result<Self> {
        let mut trail = vec![ZiPathStep {
            id: self.root.id,
            bound: self.root.binding.is_some(),
            path: self.root.path.clone(),
        }];
        let found = self.root.id == element || find_path(&self.root.children, element, &mut trail);
        if !found {
            return Err(ZiError::configuration(format!(
                "partition element {element:?} is not a container of the mapping"
            )));
        }
        let ancestors = &trail[..trail.len() - 1];
        if let Some(step) = ancestors.iter().find(|step| step.bound) {
            return Err(ZiError::configuration(format!(
                "partition element cannot be nested in bound element '{}'",
                step.path
            )));
        }
        self.partition = Some(ZiPartition {
            element,
            path: trail.iter().map(|step| step.id).collect(),
        });
        Ok(self)
    }

    pub fn root(&self) -> &ZiWritableObject {
        &self.root
    }

    pub fn partition(&self) -> Option<&ZiPartition> {
        self.partition.as_ref()
    }

    /// First bound container in document order.
    pub fn first_bound_container(&self) -> Option<ZiNodeId> {
        fn visit(node: &ZiWritable) -> Option<ZiNodeId> {
            if node.binding().is_some() {
                return node.id();
            }
            node.children().iter().find_map(visit)
        }
        self.root.children.iter().find_map(visit)
    }

    /// Writes one pass of the document in the context's state.
    pub fn write(&self, ctx: &mut ZiWriteContext<'_>) -> Result<()> {
        self.root.write(ctx)
    }

    /// Every container's port binding in document order.
    pub fn bindings(&self) -> Vec<&ZiPortBinding> {
        let mut bindings = Vec::new();
        collect_bindings(&self.root.children, &mut bindings);
        if let Some(binding) = &self.root.binding {
            bindings.insert(0, binding);
        }
        bindings
    }

    /// Every `(port, field)` reference of names, values and attributes.
    pub fn references(&self) -> Vec<(usize, usize)> {
        let mut refs = Vec::new();
        for attribute in &self.root.attributes {
            refs.extend(attribute.name.references());
            refs.extend(attribute.value.references());
        }
        collect_references(&self.root.children, &mut refs);
        refs
    }

    /// Ports read by this mapping, through bindings or field references.
    pub fn ports(&self) -> HashSet<usize> {
        let mut ports: HashSet<usize> = self.references().into_iter().map(|(port, _)| port).collect();
        for binding in self.bindings() {
            ports.insert(binding.port);
            ports.extend(binding.parent_port);
        }
        ports
    }
}

struct ZiPathStep {
    id: ZiNodeId,
    bound: bool,
    path: String,
}

fn find_path(children: &[ZiWritable], target: ZiNodeId, trail: &mut Vec<ZiPathStep>) -> bool {
    for child in children {
        let path = match child {
            ZiWritable::Object(object) => &object.path,
            ZiWritable::Collection(collection) => &collection.path,
            _ => continue,
        };
        let Some(id) = child.id() else { continue };
        trail.push(ZiPathStep {
            id,
            bound: child.binding().is_some(),
            path: path.clone(),
        });
        if id == target || find_path(child.children(), target, trail) {
            return true;
        }
        trail.pop();
    }
    false
}

fn collect_bindings<'m>(children: &'m [ZiWritable], out: &mut Vec<&'m ZiPortBinding>) {
    for child in children {
        if let Some(binding) = child.binding() {
            out.push(binding);
        }
        collect_bindings(child.children(), out);
    }
}

fn collect_references(children: &[ZiWritable], out: &mut Vec<(usize, usize)>) {
    for child in children {
        out.extend(child.references());
        collect_references(child.children(), out);
    }
}
