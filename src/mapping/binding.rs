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

//! # Port Binding
//!
//! Correlated join between a bound container and its child port.
//!
//! Each time the container is written the binding computes the parent's join
//! key from the record active on the parent port, opens an iterator over the
//! matching child records and writes the container once per accepted record
//! with that record placed in the child port's slot. The key of the next
//! parent record is obtained by peeking the parent's own iterator so
//! streaming sources can stop exactly where the next parent's children begin.
//! A parent placed through the record set, or the last one of its group, has
//! no known successor; streaming sources then hold the groups they read past
//! for the parents that follow.

use std::fmt;
use std::sync::Arc;

use crate::errors::{Result, ZiError};
use crate::mapping::filter::ZiRecordFilter;
use crate::mapping::node::ZiWriteContext;
use crate::portdata::ZiDataIterator;
use crate::record::ZiRecordKey;

/// Attachment of a container to a child input port.
#[derive(Clone)]
pub struct ZiPortBinding {
    pub port: usize,
    pub keys: Option<Vec<usize>>,
    pub parent_port: Option<usize>,
    pub parent_keys: Option<Vec<usize>>,
    pub filter: Option<Arc<dyn ZiRecordFilter>>,
}

impl fmt::Debug for ZiPortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiPortBinding")
            .field("port", &self.port)
            .field("keys", &self.keys)
            .field("parent_port", &self.parent_port)
            .field("parent_keys", &self.parent_keys)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl ZiPortBinding {
    /// An unconstrained binding over every record of `port`.
    #[allow(non_snake_case)]
    pub fn new(port: usize) -> Self {
        Self {
            port,
            keys: None,
            parent_port: None,
            parent_keys: None,
            filter: None,
        }
    }

    /// Joins child fields `keys` against `parent_keys` of the record on `parent_port`.
    #[allow(non_snake_case)]
    pub fn with_join(mut self, keys: Vec<usize>, parent_port: usize, parent_keys: Vec<usize>) -> Self {
        self.keys = Some(keys);
        self.parent_port = Some(parent_port);
        self.parent_keys = Some(parent_keys);
        self
    }

    #[allow(non_snake_case)]
    pub fn with_filter(mut self, filter: Arc<dyn ZiRecordFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Writes `body` once per accepted child record of the current parent.
    pub(crate) fn write_each<F>(&self, ctx: &mut ZiWriteContext<'_>, path: &str, mut body: F) -> Result<()>
    where
        F: FnMut(&mut ZiWriteContext<'_>) -> Result<()>,
    {
        let iterator = self.open(ctx, path)?;
        let depth = ctx.push_iterator(self.port, iterator);
        let outcome = self.drain(ctx, depth, path, &mut body);
        ctx.pop_iterator();
        outcome
    }

    /// Partition body: a record already placed on the port is written alone,
    /// otherwise the binding is iterated.
    pub(crate) fn write_segment<F>(&self, ctx: &mut ZiWriteContext<'_>, path: &str, mut body: F) -> Result<()>
    where
        F: FnMut(&mut ZiWriteContext<'_>) -> Result<()>,
    {
        if ctx.records.get(self.port).is_none() {
            return self.write_each(ctx, path, body);
        }
        if self.accept(ctx, path)? {
            body(ctx)?;
        }
        Ok(())
    }

    fn open(&self, ctx: &mut ZiWriteContext<'_>, path: &str) -> Result<Box<dyn ZiDataIterator>> {
        let (key, next_key) = match (self.parent_port, &self.parent_keys) {
            (Some(parent_port), Some(parent_keys)) => {
                let parent = ctx.records.get(parent_port).ok_or_else(|| {
                    ZiError::mapping(path, format!("no active parent record on port {parent_port}"))
                })?;
                let key = ZiRecordKey::from_record(parent, parent_keys);
                let next_key = ctx
                    .peek_port(parent_port)
                    .map(|next| ZiRecordKey::from_record(&next, parent_keys));
                (Some(key), next_key)
            }
            _ => (None, None),
        };
        let data = ctx.ports.get_mut(self.port).ok_or_else(|| {
            ZiError::configuration(format!("no data registered for port {}", self.port))
        })?;
        data.iterator(self.keys.as_deref(), key.as_ref(), next_key.as_ref())
    }

    fn drain<F>(&self, ctx: &mut ZiWriteContext<'_>, depth: usize, path: &str, body: &mut F) -> Result<()>
    where
        F: FnMut(&mut ZiWriteContext<'_>) -> Result<()>,
    {
        while let Some(record) = ctx.next_from(depth) {
            let previous = ctx.records.replace(self.port, Some(record));
            let outcome = match self.accept(ctx, path) {
                Ok(true) => body(ctx),
                Ok(false) => Ok(()),
                Err(err) => Err(err),
            };
            ctx.records.replace(self.port, previous);
            outcome?;
        }
        Ok(())
    }

    fn accept(&self, ctx: &ZiWriteContext<'_>, path: &str) -> Result<bool> {
        match &self.filter {
            Some(filter) => filter
                .accept(ctx.records())
                .map_err(|err| ZiError::record_filter(path, err)),
            None => Ok(true),
        }
    }
}
