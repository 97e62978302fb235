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

//! # ZiTree Core Library
//!
//! A hierarchical tree-writing engine: flat records arriving on several input
//! ports are turned into nested output documents (XML, JSON, generic maps or
//! typed objects) according to a declarative mapping.
//!
//! ## Module Overview
//!
//! - **record**: field metadata, scalar values, records and the per-pass record set
//! - **portdata**: keyed child streams feeding bound elements
//! - **mapping**: the compiled mapping tree, its write protocol, the mapping
//!   design format and its compiler
//! - **schema**: type descriptions driving the bean backend
//! - **writer**: the tree event contract and the streaming, map and bean backends
//! - **formatter**: pass orchestration over one mapping and one backend
//!
//! ## Feature Flags
//!
//! - `yaml`: Loads mapping designs from YAML
//! - `full`: Enables all features
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zitree::{ZiMappingCompiler, ZiMappingDesign, ZiRecordMetadata, ZiFieldType};
//!
//! let orders = Arc::new(ZiRecordMetadata::new("orders").with_field("id", ZiFieldType::Integer));
//! let design = ZiMappingDesign::from_json_str(r#"{"children": [
//!     {"kind": "element", "name": "orders", "children": [
//!         {"kind": "element", "name": "order", "relation": {"port": 0},
//!          "attributes": [{"name": "id", "value": "$0.id"}]}
//!     ]}
//! ]}"#)?;
//! let mapping = ZiMappingCompiler::new(&[orders]).compile(&design)?;
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ZiError>`. Design problems surface as
//! configuration errors before any record flows; problems found while writing
//! a document surface as mapping errors naming the offending node.

#![allow(non_snake_case)]

pub mod errors;
pub mod formatter;
pub mod mapping;
pub mod portdata;
pub mod record;
pub mod schema;
pub mod writer;

pub use errors::{Result, ZiError};
pub use formatter::{ZiFormatStats, ZiFormatterConfig, ZiTreeFormatter};
pub use mapping::binding::ZiPortBinding;
pub use mapping::compiler::{parse_template, ZiCompileOptions, ZiMappingCompiler};
pub use mapping::design::{
    ZiAttributeDesign, ZiCollectionDesign, ZiDesignNode, ZiElementDesign, ZiMappingDesign,
    ZiNamespaceDesign, ZiPortRef, ZiRelationDesign, ZiTextDesign, ZiWildcardDesign,
};
pub use mapping::filter::{ZiCompareOp, ZiExpressionFilter, ZiFnFilter, ZiRecordFilter};
pub use mapping::node::{
    ZiNodeId, ZiPartition, ZiWritable, ZiWritableAttribute, ZiWritableCollection,
    ZiWritableNamespace, ZiWritableObject, ZiWritableText, ZiWriteContext, ZiWriteState,
    NAMESPACES_COUNT_AS_CONTENT,
};
pub use mapping::value::{ZiNodeName, ZiNodeValue, ZiWritableValue};
pub use mapping::ZiWritableMapping;
pub use portdata::{
    ZiCachedPortData, ZiDataIterator, ZiPortData, ZiPortRegistry, ZiStreamingPortData,
};
pub use record::{
    ZiFieldMetadata, ZiFieldType, ZiRecord, ZiRecordKey, ZiRecordMetadata, ZiRecordSet, ZiScalar,
};
pub use schema::{ZiSchema, ZiSchemaObject, ZiSchemaVisitor, ZiSimpleType};
pub use writer::bean::{ZiBeanClass, ZiBeanRegistry, ZiBeanState, ZiBeanValue, ZiBeanWriter};
pub use writer::json::ZiJsonSerializer;
pub use writer::map::ZiMapWriter;
pub use writer::stream::{
    ZiSharedBuffer, ZiStreamConfig, ZiStreamFormat, ZiStreamTreeWriter, ZiTreeSerializer,
    ZiWriteStats,
};
pub use writer::xml::ZiXmlSerializer;
pub use writer::{collector, ZiCollector, ZiTargetWriter, ZiTreeWriter};
