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

//! # ZiTree Writer Module
//!
//! The event contract shared by every output backend.
//!
//! The mapping model talks to its output exclusively through [`ZiTreeWriter`].
//! Calls are well nested: every `write_start_*` is matched by the
//! corresponding `write_end_*` with the same name before a sibling starts, and
//! leaves only occur inside a node or collection. Three backends are provided:
//!
//! - [`stream::ZiStreamTreeWriter`]: serializes events immediately to a byte
//!   sink through an XML or JSON [`stream::ZiTreeSerializer`]
//! - [`map::ZiMapWriter`]: materializes nested generic maps and lists
//! - [`bean::ZiBeanWriter`]: builds typed objects described by a
//!   [`crate::schema::ZiSchema`]
//!
//! A new physical format only has to implement [`ZiTreeWriter`].

pub mod bean;
pub mod json;
pub mod map;
pub mod stream;
pub mod xml;

use std::sync::{Arc, Mutex};

use crate::errors::{Result, ZiError};
use crate::record::ZiScalar;

/// Low-level tree event sink.
pub trait ZiTreeWriter {
    fn write_start_tree(&mut self) -> Result<()>;

    fn write_end_tree(&mut self) -> Result<()>;

    fn write_start_node(&mut self, name: &str) -> Result<()>;

    fn write_end_node(&mut self, name: &str) -> Result<()>;

    fn write_start_collection(&mut self, name: &str) -> Result<()>;

    fn write_end_collection(&mut self, name: &str) -> Result<()>;

    fn write_leaf(&mut self, value: &ZiScalar) -> Result<()>;

    /// Declares `prefix` (empty for the default namespace) on the open node.
    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()>;

    /// Writes an attribute of the open node. Backends without attributes
    /// receive it as a child node holding a single leaf.
    fn write_attribute(&mut self, name: &str, value: &ZiScalar) -> Result<()> {
        self.write_start_node(name)?;
        self.write_leaf(value)?;
        self.write_end_node(name)
    }

    fn write_cdata(&mut self, value: &ZiScalar) -> Result<()> {
        self.write_leaf(value)
    }

    /// Hands over whatever the backend accumulated since the last flush.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A backend with a bindable output destination.
pub trait ZiTargetWriter: ZiTreeWriter {
    type Target;

    fn set_target(&mut self, target: Self::Target) -> Result<()>;
}

/// Accumulating destination of the map and bean backends.
pub type ZiCollector<T> = Arc<Mutex<Vec<T>>>;

/// Creates an empty [`ZiCollector`].
pub fn collector<T>() -> ZiCollector<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn deliver<T>(target: &ZiCollector<T>, items: impl IntoIterator<Item = T>) -> Result<()> {
    let mut guard = target
        .lock()
        .map_err(|_| ZiError::internal("output collector lock poisoned"))?;
    guard.extend(items);
    Ok(())
}
