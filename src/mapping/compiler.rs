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

//! # Mapping Compiler
//!
//! Compiles a [`ZiMappingDesign`] against the record metadata of the input
//! ports into an immutable [`ZiWritableMapping`].
//!
//! Compilation fails fast with [`ZiError::Configuration`] on anything that
//! would otherwise only surface once records flow: unknown ports or fields,
//! references to a port that is not available at that point of the document,
//! join keys that do not exist or do not pair up, malformed filters and
//! partition designations that cannot be honoured.
//!
//! A port is available inside the element bound to it and all of that
//! element's descendants. Ports no element is bound to are supplied with the
//! record set of each pass and are available everywhere.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};
use crate::mapping::binding::ZiPortBinding;
use crate::mapping::design::{
    ZiCollectionDesign, ZiDesignNode, ZiElementDesign, ZiMappingDesign, ZiPortRef,
    ZiRelationDesign, ZiTextDesign, ZiWildcardDesign,
};
use crate::mapping::filter::ZiExpressionFilter;
use crate::mapping::node::{
    ZiNodeId, ZiWritable, ZiWritableAttribute, ZiWritableCollection, ZiWritableNamespace,
    ZiWritableObject, ZiWritableText,
};
use crate::mapping::value::{ZiNodeName, ZiNodeValue, ZiWritableValue};
use crate::mapping::ZiWritableMapping;
use crate::record::ZiRecordMetadata;

/// Compiler switches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiCompileOptions {
    /// Without an explicitly flagged element, use the first bound container
    /// as partition element.
    #[serde(default)]
    pub resolve_partition: bool,
}

impl ZiCompileOptions {
    #[allow(non_snake_case)]
    pub fn with_resolve_partition(mut self, resolve_partition: bool) -> Self {
        self.resolve_partition = resolve_partition;
        self
    }

    /// Lenient loader: unknown keys are ignored, missing keys keep defaults.
    #[allow(non_snake_case)]
    pub fn from_json(config: &Value) -> Self {
        let mut options = Self::default();
        if let Some(flag) = config.get("resolve_partition").and_then(Value::as_bool) {
            options.resolve_partition = flag;
        }
        options
    }
}

#[derive(Clone, Debug)]
struct ZiScope {
    available: Vec<usize>,
    bound: Option<usize>,
    path: String,
}

impl ZiScope {
    fn enter(&self, name: &str, port: Option<usize>) -> Self {
        let mut scope = self.clone();
        scope.path = format!("{}/{}", self.path, name);
        if let Some(port) = port {
            if !scope.available.contains(&port) {
                scope.available.push(port);
            }
            scope.bound = Some(port);
        }
        scope
    }
}

/// Design to mapping compiler over a fixed set of port metadata.
pub struct ZiMappingCompiler<'m> {
    ports: &'m [Arc<ZiRecordMetadata>],
    options: ZiCompileOptions,
    bound_ports: HashSet<usize>,
    next_id: usize,
    flagged: Vec<ZiNodeId>,
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$|\{\$([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)\.([A-Za-z_][A-Za-z0-9_]*)")
            .expect("value template pattern")
    })
}

impl<'m> ZiMappingCompiler<'m> {
    #[allow(non_snake_case)]
    pub fn new(ports: &'m [Arc<ZiRecordMetadata>]) -> Self {
        Self {
            ports,
            options: ZiCompileOptions::default(),
            bound_ports: HashSet::new(),
            next_id: 1,
            flagged: Vec::new(),
        }
    }

    #[allow(non_snake_case)]
    pub fn with_options(mut self, options: ZiCompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn compile(&mut self, design: &ZiMappingDesign) -> Result<ZiWritableMapping> {
        self.next_id = 1;
        self.flagged.clear();
        self.bound_ports.clear();
        self.collect_bound_ports(&design.children)?;

        let scope = ZiScope {
            available: Vec::new(),
            bound: None,
            path: String::new(),
        };
        let mut root = ZiWritableObject::root();
        for child in &design.children {
            for node in self.compile_node(child, &scope)? {
                root.add(node);
            }
        }

        let mut mapping = ZiWritableMapping::new(root);
        let element = match self.flagged.as_slice() {
            [] if self.options.resolve_partition => mapping.first_bound_container(),
            [] => None,
            [element] => Some(*element),
            _ => {
                return Err(ZiError::configuration(
                    "more than one element is flagged as partition element",
                ))
            }
        };
        if let Some(element) = element {
            mapping = mapping.with_partition(element)?;
            log::debug!("partition element resolved to {element:?}");
        } else if self.options.resolve_partition {
            log::warn!("partitioned output requested but the mapping has no bound element");
        }
        log::debug!(
            "compiled mapping: {} containers, {} bindings",
            self.next_id - 1,
            mapping.bindings().len()
        );
        Ok(mapping)
    }

    fn next_id(&mut self) -> ZiNodeId {
        let id = ZiNodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn collect_bound_ports(&mut self, nodes: &[ZiDesignNode]) -> Result<()> {
        for node in nodes {
            let (relation, children) = match node {
                ZiDesignNode::Element(element) => (&element.relation, &element.children),
                ZiDesignNode::Collection(collection) => (&collection.relation, &collection.children),
                _ => continue,
            };
            if let Some(relation) = relation {
                let port = self.resolve_port_ref(&relation.port)?;
                self.bound_ports.insert(port);
            }
            self.collect_bound_ports(children)?;
        }
        Ok(())
    }

    fn compile_node(&mut self, node: &ZiDesignNode, scope: &ZiScope) -> Result<Vec<ZiWritable>> {
        match node {
            ZiDesignNode::Element(element) => Ok(vec![self.compile_element(element, scope)?]),
            ZiDesignNode::Collection(collection) => {
                Ok(vec![self.compile_collection(collection, scope)?])
            }
            ZiDesignNode::Value(text) => Ok(vec![ZiWritable::Value(self.compile_text(text, scope)?)]),
            ZiDesignNode::Cdata(text) => Ok(vec![ZiWritable::CData(self.compile_text(text, scope)?)]),
            ZiDesignNode::Wildcard(wildcard) => self.compile_wildcard(wildcard, scope),
        }
    }

    fn compile_element(&mut self, design: &ZiElementDesign, scope: &ZiScope) -> Result<ZiWritable> {
        let id = self.next_id();
        let binding = design
            .relation
            .as_ref()
            .map(|relation| self.compile_binding(relation, scope, &design.name))
            .transpose()?;
        let inner = scope.enter(&design.name, binding.as_ref().map(|binding| binding.port));
        let name = self.compile_name(&design.name, &inner)?;

        let mut object = ZiWritableObject::new(id, name)
            .with_path(inner.path.clone())
            .with_write_null(design.write_null)
            .with_hidden(design.hide);
        object.binding = binding;
        for namespace in &design.namespaces {
            object.add(ZiWritable::Namespace(ZiWritableNamespace::new(
                namespace.prefix.clone(),
                namespace.uri.clone(),
            )));
        }
        for attribute in &design.attributes {
            let compiled = ZiWritableAttribute::new(
                self.compile_name(&attribute.name, &inner)?,
                self.compile_template(&attribute.value, &inner)?,
            )
            .with_write_null(attribute.write_null);
            object.add(ZiWritable::Attribute(compiled));
        }
        for child in &design.children {
            for node in self.compile_node(child, &inner)? {
                object.add(node);
            }
        }
        if design.partition {
            self.flagged.push(id);
        }
        Ok(ZiWritable::Object(object))
    }

    fn compile_collection(&mut self, design: &ZiCollectionDesign, scope: &ZiScope) -> Result<ZiWritable> {
        let id = self.next_id();
        let binding = design
            .relation
            .as_ref()
            .map(|relation| self.compile_binding(relation, scope, &design.name))
            .transpose()?;
        let inner = scope.enter(&design.name, binding.as_ref().map(|binding| binding.port));
        // The bracket is written once per parent, outside the bound records.
        let name = self.compile_name(&design.name, scope)?;

        let mut collection = ZiWritableCollection::new(id, name)
            .with_path(inner.path.clone())
            .with_write_null(design.write_null);
        collection.binding = binding;
        for child in &design.children {
            collection.children.extend(self.compile_node(child, &inner)?);
        }
        if design.partition {
            self.flagged.push(id);
        }
        Ok(ZiWritable::Collection(collection))
    }

    fn compile_text(&mut self, design: &ZiTextDesign, scope: &ZiScope) -> Result<ZiWritableText> {
        Ok(ZiWritableText::new(self.compile_template(&design.value, scope)?)
            .with_write_null(design.write_null))
    }

    fn compile_wildcard(&mut self, design: &ZiWildcardDesign, scope: &ZiScope) -> Result<Vec<ZiWritable>> {
        let include = self.compile_globs(design.include.as_deref(), scope)?;
        let exclude = self.compile_globs(design.exclude.as_deref(), scope)?;
        let mut ports = self.visible_ports(scope);
        ports.sort_unstable();

        let mut nodes = Vec::new();
        for port in ports {
            let metadata = self.metadata(port)?;
            for (field, field_meta) in metadata.fields.iter().enumerate() {
                let matches = |globs: &[(usize, Regex)]| {
                    globs
                        .iter()
                        .any(|(glob_port, glob)| *glob_port == port && glob.is_match(&field_meta.name))
                };
                if (!include.is_empty() && !matches(&include)) || matches(&exclude) {
                    continue;
                }
                let name = ZiNodeName::fixed(&field_meta.name);
                let value = ZiWritableValue::field(port, field);
                if design.attributes {
                    nodes.push(ZiWritable::Attribute(
                        ZiWritableAttribute::new(name, value).with_write_null(design.write_null),
                    ));
                } else {
                    let id = self.next_id();
                    let object = ZiWritableObject::new(id, name)
                        .with_path(format!("{}/{}", scope.path, field_meta.name))
                        .with(ZiWritable::Value(
                            ZiWritableText::new(value).with_write_null(design.write_null),
                        ));
                    nodes.push(ZiWritable::Object(object.with_write_null(design.write_null)));
                }
            }
        }
        Ok(nodes)
    }

    fn compile_globs(&self, patterns: Option<&str>, scope: &ZiScope) -> Result<Vec<(usize, Regex)>> {
        let Some(patterns) = patterns else {
            return Ok(Vec::new());
        };
        let mut globs = Vec::new();
        for pattern in patterns.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (port, glob) = pattern
                .strip_prefix('$')
                .and_then(|rest| rest.split_once('.'))
                .ok_or_else(|| {
                    ZiError::configuration(format!(
                        "wildcard pattern '{pattern}' must look like $port.field"
                    ))
                })?;
            let port = self.resolve_port(port)?;
            self.check_available(port, scope, pattern)?;
            let regex = format!("^{}$", regex::escape(glob).replace(r"\*", ".*"));
            let regex = Regex::new(&regex).map_err(|err| ZiError::configuration(err.to_string()))?;
            globs.push((port, regex));
        }
        Ok(globs)
    }

    fn compile_binding(&mut self, relation: &ZiRelationDesign, scope: &ZiScope, name: &str) -> Result<ZiPortBinding> {
        let port = self.resolve_port_ref(&relation.port)?;
        let path = format!("{}/{}", scope.path, name);
        let mut binding = ZiPortBinding::new(port);

        let keys = relation
            .key
            .as_deref()
            .map(|key| self.key_fields(port, key))
            .transpose()?;
        match (&relation.parent_key, scope.bound) {
            (Some(parent_key), Some(parent_port)) => {
                let keys = keys.ok_or_else(|| {
                    ZiError::configuration(format!("'{path}': parent key given without key"))
                })?;
                let parent_keys = self.key_fields(parent_port, parent_key)?;
                if keys.len() != parent_keys.len() {
                    return Err(ZiError::configuration(format!(
                        "'{path}': {} key fields do not pair with {} parent key fields",
                        keys.len(),
                        parent_keys.len()
                    )));
                }
                binding = binding.with_join(keys, parent_port, parent_keys);
            }
            (Some(_), None) => {
                return Err(ZiError::configuration(format!(
                    "'{path}': parent key given but no ancestor is bound to a port"
                )))
            }
            (None, Some(parent_port)) => {
                log::warn!(
                    "'{path}' is nested in port {parent_port} without a parent key; every record of port {port} is written for each parent"
                );
                binding.keys = keys;
            }
            (None, None) => binding.keys = keys,
        }

        if let Some(expression) = &relation.filter {
            let filter_scope = scope.enter(name, Some(port));
            let filter = ZiExpressionFilter::parse(expression, |port_name, field_name| {
                let port = self.resolve_port(port_name)?;
                self.check_available(port, &filter_scope, expression)?;
                Ok((port, self.resolve_field(port, field_name)?))
            })?;
            binding = binding.with_filter(Arc::new(filter));
        }
        Ok(binding)
    }

    fn key_fields(&self, port: usize, keys: &str) -> Result<Vec<usize>> {
        keys.split(';')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| self.resolve_field(port, key))
            .collect()
    }

    /// Parses `prefix:name` into a name of two templates.
    fn compile_name(&self, text: &str, scope: &ZiScope) -> Result<ZiNodeName> {
        match text.split_once(':') {
            Some((prefix, local)) => Ok(ZiNodeName::new(
                Some(self.compile_template(prefix, scope)?),
                self.compile_template(local, scope)?,
            )),
            None => Ok(ZiNodeName::new(None, self.compile_template(text, scope)?)),
        }
    }

    fn compile_template(&self, text: &str, scope: &ZiScope) -> Result<ZiWritableValue> {
        parse_template(text, |port_name, field_name| {
            let port = self.resolve_port(port_name)?;
            self.check_available(port, scope, text)?;
            Ok((port, self.resolve_field(port, field_name)?))
        })
    }

    fn check_available(&self, port: usize, scope: &ZiScope, context: &str) -> Result<()> {
        if !self.bound_ports.contains(&port) || scope.available.contains(&port) {
            return Ok(());
        }
        Err(ZiError::configuration(format!(
            "'{}{}': port {port} is not available here; bind an enclosing element to it",
            scope.path,
            if context.is_empty() { String::new() } else { format!(" ({context})") }
        )))
    }

    fn visible_ports(&self, scope: &ZiScope) -> Vec<usize> {
        (0..self.ports.len())
            .filter(|port| !self.bound_ports.contains(port) || scope.available.contains(port))
            .collect()
    }

    fn metadata(&self, port: usize) -> Result<&'m Arc<ZiRecordMetadata>> {
        self.ports
            .get(port)
            .ok_or_else(|| ZiError::configuration(format!("unknown port {port}")))
    }

    fn resolve_port_ref(&self, port: &ZiPortRef) -> Result<usize> {
        match port {
            ZiPortRef::Index(index) => self.metadata(*index).map(|_| *index),
            ZiPortRef::Name(name) => self.resolve_port(name),
        }
    }

    /// Port by number or by metadata name.
    fn resolve_port(&self, name: &str) -> Result<usize> {
        if let Ok(index) = name.parse::<usize>() {
            return self.metadata(index).map(|_| index);
        }
        self.ports
            .iter()
            .position(|metadata| metadata.name == name)
            .ok_or_else(|| ZiError::configuration(format!("unknown port '{name}'")))
    }

    /// Field by name or by position.
    fn resolve_field(&self, port: usize, name: &str) -> Result<usize> {
        let metadata = self.metadata(port)?;
        if let Some(position) = metadata.field_position(name) {
            return Ok(position);
        }
        match name.parse::<usize>() {
            Ok(index) if index < metadata.len() => Ok(index),
            _ => Err(ZiError::configuration(format!(
                "port {port} ('{}') has no field '{name}'",
                metadata.name
            ))),
        }
    }
}

/// Splits a value template into static text and field references.
///
/// `$port.field` and `{$port.field}` become [`ZiNodeValue::Dynamic`] parts
/// through `resolve`; `$$` is a literal `$`. The bare form needs a field name
/// starting with a letter or `_`, so text like `$5.00` stays static; field
/// positions are written braced, as in `{$0.1}`.
pub fn parse_template<R>(text: &str, mut resolve: R) -> Result<ZiWritableValue>
where
    R: FnMut(&str, &str) -> Result<(usize, usize)>,
{
    let mut parts = Vec::new();
    let mut pending = String::new();
    let mut last = 0;
    for captures in template_pattern().captures_iter(text) {
        let Some(whole) = captures.get(0) else { continue };
        pending.push_str(&text[last..whole.start()]);
        last = whole.end();
        let reference = match (captures.get(1), captures.get(2), captures.get(3), captures.get(4)) {
            (Some(port), Some(field), _, _) | (_, _, Some(port), Some(field)) => {
                Some((port.as_str(), field.as_str()))
            }
            _ => None,
        };
        match reference {
            Some((port, field)) => {
                if !pending.is_empty() {
                    parts.push(ZiNodeValue::Static(std::mem::take(&mut pending)));
                }
                let (port, field) = resolve(port, field)?;
                parts.push(ZiNodeValue::Dynamic { port, field });
            }
            None => pending.push('$'),
        }
    }
    pending.push_str(&text[last..]);
    if !pending.is_empty() {
        parts.push(ZiNodeValue::Static(pending));
    }
    Ok(ZiWritableValue::new(parts))
}
