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

//! # Mapping Design
//!
//! Declarative, serde-loadable form of a mapping, compiled into a
//! [`super::ZiWritableMapping`] by [`super::compiler::ZiMappingCompiler`].
//!
//! ## Example
//!
//! ```json
//! {
//!   "children": [{
//!     "kind": "element",
//!     "name": "customers",
//!     "children": [{
//!       "kind": "element",
//!       "name": "customer",
//!       "relation": {"port": "customer"},
//!       "attributes": [{"name": "id", "value": "$customer.id"}],
//!       "children": [{"kind": "value", "value": "{$customer.name}"}]
//!     }]
//!   }]
//! }
//! ```
//!
//! Names and values are templates: `$port.field` or `{$port.field}` insert a
//! field of the record active on a port (given by number or metadata name),
//! `$$` is a literal `$`, everything else is static text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;

/// Root of a mapping design.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiMappingDesign {
    #[serde(default)]
    pub children: Vec<ZiDesignNode>,
}

impl ZiMappingDesign {
    #[allow(non_snake_case)]
    pub fn new(children: Vec<ZiDesignNode>) -> Self {
        Self { children }
    }

    #[allow(non_snake_case)]
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    #[allow(non_snake_case)]
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    #[cfg(feature = "yaml")]
    #[allow(non_snake_case)]
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// One design node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZiDesignNode {
    Element(ZiElementDesign),
    Collection(ZiCollectionDesign),
    Value(ZiTextDesign),
    Cdata(ZiTextDesign),
    Wildcard(ZiWildcardDesign),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiElementDesign {
    /// Name template, optionally `prefix:name`.
    pub name: String,
    #[serde(default)]
    pub namespaces: Vec<ZiNamespaceDesign>,
    #[serde(default)]
    pub attributes: Vec<ZiAttributeDesign>,
    #[serde(default)]
    pub children: Vec<ZiDesignNode>,
    /// Suppress the element's own tags, keeping its content.
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub write_null: bool,
    #[serde(default)]
    pub partition: bool,
    #[serde(default)]
    pub relation: Option<ZiRelationDesign>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiCollectionDesign {
    pub name: String,
    #[serde(default)]
    pub children: Vec<ZiDesignNode>,
    #[serde(default)]
    pub write_null: bool,
    #[serde(default)]
    pub partition: bool,
    #[serde(default)]
    pub relation: Option<ZiRelationDesign>,
}

/// Text or CDATA content.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiTextDesign {
    pub value: String,
    #[serde(default)]
    pub write_null: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiAttributeDesign {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub write_null: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiNamespaceDesign {
    #[serde(default)]
    pub prefix: String,
    pub uri: String,
}

/// Port given by number or by its metadata name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZiPortRef {
    Index(usize),
    Name(String),
}

impl Default for ZiPortRef {
    fn default() -> Self {
        ZiPortRef::Index(0)
    }
}

/// Binding of a container to a child port.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiRelationDesign {
    pub port: ZiPortRef,
    /// `;`-separated child key field names.
    #[serde(default)]
    pub key: Option<String>,
    /// `;`-separated key field names of the nearest bound ancestor's port.
    #[serde(default)]
    pub parent_key: Option<String>,
    /// Comparison expression, e.g. `$orders.total > 100 && $orders.state == 'open'`.
    #[serde(default)]
    pub filter: Option<String>,
}

/// Expands to one element (or attribute) per matching field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiWildcardDesign {
    /// `;`-separated `$port.glob` patterns. Absent: every field of every available port.
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub exclude: Option<String>,
    #[serde(default)]
    pub attributes: bool,
    #[serde(default)]
    pub write_null: bool,
}
