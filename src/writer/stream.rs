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

//! # Streaming Tree Writer
//!
//! Serializes tree events straight to a byte sink. Every event is rendered by
//! a [`ZiTreeSerializer`] into a small text buffer that is written to the
//! sink before the call returns, so nothing but the serializer's own nesting
//! state is held in memory. The serializer keeps that state across flushes,
//! which lets a document be produced in several partition passes.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};
use crate::record::ZiScalar;
use crate::writer::json::ZiJsonSerializer;
use crate::writer::xml::ZiXmlSerializer;
use crate::writer::{ZiTargetWriter, ZiTreeWriter};

/// Physical output format of the streaming backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiStreamFormat {
    #[default]
    Xml,
    Json,
}

/// Configuration for the streaming backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZiStreamConfig {
    /// Output format.
    pub format: ZiStreamFormat,
    /// Emit `<?xml ...?>` at the start of every XML document.
    pub xml_declaration: bool,
    /// Encoding named in the XML declaration. Output is always UTF-8.
    pub encoding: String,
    /// Flush the sink at every end of tree.
    pub auto_flush: bool,
}

impl Default for ZiStreamConfig {
    fn default() -> Self {
        Self {
            format: ZiStreamFormat::Xml,
            xml_declaration: false,
            encoding: "UTF-8".to_string(),
            auto_flush: false,
        }
    }
}

impl ZiStreamConfig {
    #[allow(non_snake_case)]
    pub fn with_format(mut self, format: ZiStreamFormat) -> Self {
        self.format = format;
        self
    }

    #[allow(non_snake_case)]
    pub fn with_xml_declaration(mut self, enabled: bool) -> Self {
        self.xml_declaration = enabled;
        self
    }

    #[allow(non_snake_case)]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    #[allow(non_snake_case)]
    pub fn with_auto_flush(mut self, enabled: bool) -> Self {
        self.auto_flush = enabled;
        self
    }

    /// Loads a config from JSON; missing or malformed keys keep defaults.
    #[allow(non_snake_case)]
    pub fn from_json(config: &Value) -> Self {
        let mut result = Self::default();
        if let Some(format) = config.get("format").and_then(Value::as_str) {
            match format.to_ascii_lowercase().as_str() {
                "xml" => result.format = ZiStreamFormat::Xml,
                "json" => result.format = ZiStreamFormat::Json,
                _ => {}
            }
        }
        if let Some(enabled) = config.get("xml_declaration").and_then(Value::as_bool) {
            result.xml_declaration = enabled;
        }
        if let Some(encoding) = config.get("encoding").and_then(Value::as_str) {
            result.encoding = encoding.to_string();
        }
        if let Some(enabled) = config.get("auto_flush").and_then(Value::as_bool) {
            result.auto_flush = enabled;
        }
        result
    }
}

/// Statistics about streamed output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiWriteStats {
    /// Nodes and collections started.
    pub nodes_written: usize,
    /// Leaves, CDATA sections and attributes written.
    pub leaves_written: usize,
    /// Bytes handed to the sink.
    pub bytes_written: usize,
    /// Sink flushes.
    pub flushes: usize,
}

/// Renders tree events as text of one physical format.
pub trait ZiTreeSerializer: Send {
    fn start_document(&mut self, out: &mut String) -> Result<()>;

    fn end_document(&mut self, out: &mut String) -> Result<()>;

    fn start_node(&mut self, name: &str, out: &mut String) -> Result<()>;

    fn end_node(&mut self, name: &str, out: &mut String) -> Result<()>;

    fn start_collection(&mut self, name: &str, out: &mut String) -> Result<()>;

    fn end_collection(&mut self, name: &str, out: &mut String) -> Result<()>;

    fn attribute(&mut self, name: &str, value: &ZiScalar, out: &mut String) -> Result<()>;

    fn namespace(&mut self, prefix: &str, uri: &str, out: &mut String) -> Result<()>;

    fn text(&mut self, value: &ZiScalar, out: &mut String) -> Result<()>;

    fn cdata(&mut self, value: &ZiScalar, out: &mut String) -> Result<()>;
}

/// Tree writer streaming to any `Write` sink.
pub struct ZiStreamTreeWriter {
    config: ZiStreamConfig,
    serializer: Box<dyn ZiTreeSerializer>,
    sink: Option<Box<dyn Write + Send>>,
    buffer: String,
    stats: ZiWriteStats,
}

impl std::fmt::Debug for ZiStreamTreeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZiStreamTreeWriter")
            .field("config", &self.config)
            .field("bound", &self.sink.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ZiStreamTreeWriter {
    /// Creates a writer with the serializer selected by `config.format`.
    #[allow(non_snake_case)]
    pub fn new(config: ZiStreamConfig) -> Self {
        let serializer: Box<dyn ZiTreeSerializer> = match config.format {
            ZiStreamFormat::Xml => Box::new(ZiXmlSerializer::new(
                config.xml_declaration.then(|| config.encoding.clone()),
            )),
            ZiStreamFormat::Json => Box::new(ZiJsonSerializer::new()),
        };
        Self::with_serializer(config, serializer)
    }

    /// Creates a writer around a custom serializer.
    #[allow(non_snake_case)]
    pub fn with_serializer(config: ZiStreamConfig, serializer: Box<dyn ZiTreeSerializer>) -> Self {
        Self {
            config,
            serializer,
            sink: None,
            buffer: String::new(),
            stats: ZiWriteStats::default(),
        }
    }

    pub fn config(&self) -> &ZiStreamConfig {
        &self.config
    }

    pub fn stats(&self) -> &ZiWriteStats {
        &self.stats
    }

    pub fn is_bound(&self) -> bool {
        self.sink.is_some()
    }

    fn emit<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&mut dyn ZiTreeSerializer, &mut String) -> Result<()>,
    {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| ZiError::configuration("stream writer has no output target"))?;
        self.buffer.clear();
        render(self.serializer.as_mut(), &mut self.buffer)?;
        if !self.buffer.is_empty() {
            sink.write_all(self.buffer.as_bytes())?;
            self.stats.bytes_written += self.buffer.len();
        }
        Ok(())
    }
}

impl ZiTreeWriter for ZiStreamTreeWriter {
    fn write_start_tree(&mut self) -> Result<()> {
        self.emit(|serializer, out| serializer.start_document(out))
    }

    fn write_end_tree(&mut self) -> Result<()> {
        self.emit(|serializer, out| serializer.end_document(out))?;
        if self.config.auto_flush {
            self.flush()?;
        }
        Ok(())
    }

    fn write_start_node(&mut self, name: &str) -> Result<()> {
        self.emit(|serializer, out| serializer.start_node(name, out))?;
        self.stats.nodes_written += 1;
        Ok(())
    }

    fn write_end_node(&mut self, name: &str) -> Result<()> {
        self.emit(|serializer, out| serializer.end_node(name, out))
    }

    fn write_start_collection(&mut self, name: &str) -> Result<()> {
        self.emit(|serializer, out| serializer.start_collection(name, out))?;
        self.stats.nodes_written += 1;
        Ok(())
    }

    fn write_end_collection(&mut self, name: &str) -> Result<()> {
        self.emit(|serializer, out| serializer.end_collection(name, out))
    }

    fn write_leaf(&mut self, value: &ZiScalar) -> Result<()> {
        self.emit(|serializer, out| serializer.text(value, out))?;
        self.stats.leaves_written += 1;
        Ok(())
    }

    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.emit(|serializer, out| serializer.namespace(prefix, uri, out))
    }

    fn write_attribute(&mut self, name: &str, value: &ZiScalar) -> Result<()> {
        self.emit(|serializer, out| serializer.attribute(name, value, out))?;
        self.stats.leaves_written += 1;
        Ok(())
    }

    fn write_cdata(&mut self, value: &ZiScalar) -> Result<()> {
        self.emit(|serializer, out| serializer.cdata(value, out))?;
        self.stats.leaves_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
            self.stats.flushes += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.sink = None;
        Ok(())
    }
}

impl ZiTargetWriter for ZiStreamTreeWriter {
    type Target = Box<dyn Write + Send>;

    fn set_target(&mut self, target: Self::Target) -> Result<()> {
        self.sink = Some(target);
        Ok(())
    }
}

/// In-memory sink whose contents stay readable after it is handed over.
#[derive(Clone, Debug, Default)]
pub struct ZiSharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl ZiSharedBuffer {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded as UTF-8.
    pub fn contents(&self) -> String {
        match self.bytes.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for ZiSharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self
            .bytes
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "shared buffer lock poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
