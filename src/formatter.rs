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

//! # Tree Formatter
//!
//! Drives one compiled [`ZiWritableMapping`] into one writer backend.
//!
//! Each `write` call produces a complete document from the records of the
//! current pass. A mapping with a partition element can instead be written
//! in pieces: one `write_header`, any number of `write_partition` calls and
//! one `write_footer` produce the same output as a single `write` over all
//! partition items.
//!
//! ```rust,ignore
//! let mut formatter = ZiTreeFormatter::new(mapping, ZiMapWriter::new(), ZiFormatterConfig::default());
//! formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(children)));
//! formatter.init(&metadata)?;
//! formatter.set_target(collector.clone())?;
//! formatter.write(&ZiRecordSet::new().with_record(0, parent))?;
//! formatter.close()?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};
use crate::mapping::node::{ZiWriteContext, ZiWriteState};
use crate::mapping::ZiWritableMapping;
use crate::portdata::{ZiPortData, ZiPortRegistry};
use crate::record::{ZiRecordMetadata, ZiRecordSet};
use crate::writer::ZiTargetWriter;

/// Configuration for [`ZiTreeFormatter`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZiFormatterConfig {
    /// Require a partition element and allow partitioned writes.
    pub partitioned: bool,
    /// Check field references and join keys against the port metadata.
    pub validate_ports: bool,
}

impl Default for ZiFormatterConfig {
    fn default() -> Self {
        Self {
            partitioned: false,
            validate_ports: true,
        }
    }
}

impl ZiFormatterConfig {
    #[allow(non_snake_case)]
    pub fn with_partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    #[allow(non_snake_case)]
    pub fn with_validate_ports(mut self, validate: bool) -> Self {
        self.validate_ports = validate;
        self
    }

    /// Loads a config from JSON; missing or malformed keys keep defaults.
    #[allow(non_snake_case)]
    pub fn from_json(config: &Value) -> Self {
        let mut result = Self::default();
        if let Some(partitioned) = config.get("partitioned").and_then(Value::as_bool) {
            result.partitioned = partitioned;
        }
        if let Some(validate) = config.get("validate_ports").and_then(Value::as_bool) {
            result.validate_ports = validate;
        }
        result
    }
}

/// Counters of one formatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiFormatStats {
    /// Complete documents written by `write`.
    pub documents: usize,
    /// Header, partition and footer passes.
    pub partition_passes: usize,
    pub flushes: usize,
}

/// Writes a mapping through a backend, pass by pass.
pub struct ZiTreeFormatter<W: ZiTargetWriter> {
    mapping: Arc<ZiWritableMapping>,
    writer: W,
    ports: ZiPortRegistry,
    working: ZiRecordSet,
    config: ZiFormatterConfig,
    initialized: bool,
    closed: bool,
    stats: ZiFormatStats,
}

impl<W: ZiTargetWriter> ZiTreeFormatter<W> {
    #[allow(non_snake_case)]
    pub fn new(mapping: Arc<ZiWritableMapping>, writer: W, config: ZiFormatterConfig) -> Self {
        Self {
            mapping,
            writer,
            ports: ZiPortRegistry::new(),
            working: ZiRecordSet::new(),
            config,
            initialized: false,
            closed: false,
            stats: ZiFormatStats::default(),
        }
    }

    /// Registers the child stream of a bound port.
    pub fn add_port_data(&mut self, port: usize, data: Box<dyn ZiPortData>) {
        self.ports.insert(port, data);
    }

    /// Validates the mapping against the metadata of every declared port.
    pub fn init(&mut self, metadata: &[Arc<ZiRecordMetadata>]) -> Result<()> {
        if self.config.partitioned && self.mapping.partition().is_none() {
            return Err(ZiError::configuration(
                "partitioned formatter needs a mapping with a partition element",
            ));
        }
        if self.config.validate_ports {
            self.validate(metadata)?;
        }
        let used = self.mapping.ports();
        for (port, meta) in metadata.iter().enumerate() {
            if !used.contains(&port) {
                log::warn!("input port {} ({}) is not used by the mapping", port, meta.name);
            }
        }
        self.working = ZiRecordSet::with_ports(metadata.len());
        self.initialized = true;
        Ok(())
    }

    fn validate(&self, metadata: &[Arc<ZiRecordMetadata>]) -> Result<()> {
        let port_meta = |port: usize| {
            metadata
                .get(port)
                .ok_or_else(|| ZiError::configuration(format!("mapping uses undeclared port {port}")))
        };
        let check_fields = |port: usize, fields: &[usize], what: &str| -> Result<()> {
            let meta = port_meta(port)?;
            match fields.iter().find(|field| **field >= meta.len()) {
                Some(field) => Err(ZiError::configuration(format!(
                    "{what} field {field} does not exist on port {port} ({})",
                    meta.name
                ))),
                None => Ok(()),
            }
        };
        for (port, field) in self.mapping.references() {
            check_fields(port, &[field], "referenced")?;
        }
        for binding in self.mapping.bindings() {
            check_fields(binding.port, binding.keys.as_deref().unwrap_or_default(), "join key")?;
            if let Some(parent_port) = binding.parent_port {
                check_fields(parent_port, binding.parent_keys.as_deref().unwrap_or_default(), "parent key")?;
            }
            if let Some(filter) = &binding.filter {
                for (port, field) in filter.references() {
                    check_fields(port, &[field], "filter")?;
                }
            }
            if !self.ports.contains(binding.port) {
                return Err(ZiError::configuration(format!(
                    "no data registered for bound port {}",
                    binding.port
                )));
            }
        }
        Ok(())
    }

    /// Binds the backend's output destination.
    pub fn set_target(&mut self, target: W::Target) -> Result<()> {
        self.writer.set_target(target)
    }

    /// Writes one complete document from `records`.
    pub fn write(&mut self, records: &ZiRecordSet) -> Result<()> {
        self.ensure_open()?;
        self.load(records);
        self.writer.write_start_tree()?;
        self.pass(ZiWriteState::All)?;
        self.writer.write_end_tree()?;
        self.stats.documents += 1;
        Ok(())
    }

    /// Starts a partitioned document up to the partition element's start.
    pub fn write_header(&mut self, records: &ZiRecordSet) -> Result<()> {
        self.ensure_partitioned()?;
        self.load(records);
        self.writer.write_start_tree()?;
        self.pass(ZiWriteState::Header)
    }

    /// Writes partition items: the record placed on the partition port, or
    /// every record its binding yields.
    pub fn write_partition(&mut self, records: &ZiRecordSet) -> Result<()> {
        self.ensure_partitioned()?;
        self.load(records);
        self.pass(ZiWriteState::Nothing)
    }

    /// Finishes a partitioned document.
    pub fn write_footer(&mut self, records: &ZiRecordSet) -> Result<()> {
        self.ensure_partitioned()?;
        self.load(records);
        self.pass(ZiWriteState::Footer)?;
        self.writer.write_end_tree()
    }

    /// Hands over the backend's accumulated output.
    pub fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.writer.flush()?;
        self.stats.flushes += 1;
        Ok(())
    }

    /// Flushes and releases the backend. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.writer.close()?;
        self.closed = true;
        log::info!(
            "tree formatter closed: {} documents, {} partition passes, {} flushes",
            self.stats.documents,
            self.stats.partition_passes,
            self.stats.flushes
        );
        Ok(())
    }

    pub fn stats(&self) -> &ZiFormatStats {
        &self.stats
    }

    pub fn mapping(&self) -> &Arc<ZiWritableMapping> {
        &self.mapping
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.initialized {
            return Err(ZiError::configuration("tree formatter used before init"));
        }
        if self.closed {
            return Err(ZiError::configuration("tree formatter used after close"));
        }
        Ok(())
    }

    fn ensure_partitioned(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.mapping.partition().is_none() {
            return Err(ZiError::configuration("mapping has no partition element"));
        }
        self.stats.partition_passes += 1;
        Ok(())
    }

    fn load(&mut self, records: &ZiRecordSet) {
        self.working.clear();
        for port in 0..records.len() {
            self.working.replace(port, records.get(port).cloned());
        }
    }

    fn pass(&mut self, state: ZiWriteState) -> Result<()> {
        let mapping = Arc::clone(&self.mapping);
        log::debug!("tree formatter pass {:?}", state);
        let mut ctx = ZiWriteContext::new(&mut self.writer, &mut self.working, &mut self.ports)
            .with_state(state, mapping.partition());
        mapping.write(&mut ctx)
    }
}
