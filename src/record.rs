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

//! # ZiTree Record Module
//!
//! Flat relational records as they arrive on the input ports of a tree writer.
//!
//! A port carries records of one [`ZiRecordMetadata`]; fields are addressed by
//! stable indices resolved against that metadata when a mapping is compiled.
//! During a write pass the records currently active on every port are held in
//! a [`ZiRecordSet`], indexed by port number.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zitree::record::{ZiFieldType, ZiRecord, ZiRecordMetadata};
//! use serde_json::json;
//!
//! let metadata = Arc::new(
//!     ZiRecordMetadata::new("customer")
//!         .with_field("id", ZiFieldType::Integer)
//!         .with_field("name", ZiFieldType::String),
//! );
//! let record = ZiRecord::from_json(metadata, &json!({"id": 7, "name": "Ada"})).unwrap();
//! assert_eq!(record.field_by_name("name").unwrap().to_text(), "Ada");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};

/// Declared type of a record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiFieldType {
    String,
    Integer,
    Long,
    Number,
    Decimal,
    Boolean,
    Date,
    Byte,
}

/// Name and type of one record field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiFieldMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: ZiFieldType,
}

/// Shape of the records travelling on one port.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiRecordMetadata {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<ZiFieldMetadata>,
}

impl ZiRecordMetadata {
    #[allow(non_snake_case)]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field declaration.
    #[allow(non_snake_case)]
    pub fn with_field(mut self, name: impl Into<String>, field_type: ZiFieldType) -> Self {
        self.fields.push(ZiFieldMetadata {
            name: name.into(),
            field_type,
        });
        self
    }

    /// Position of the named field.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, index: usize) -> Option<&ZiFieldMetadata> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum ZiScalar {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl ZiScalar {
    pub fn is_null(&self) -> bool {
        matches!(self, ZiScalar::Null)
    }

    /// Null, or a value whose text form is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            ZiScalar::Null => true,
            ZiScalar::String(text) => text.is_empty(),
            ZiScalar::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    /// Canonical text form; null renders as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            ZiScalar::Null => String::new(),
            ZiScalar::Boolean(value) => value.to_string(),
            ZiScalar::Integer(value) => value.to_string(),
            ZiScalar::Number(value) => value.to_string(),
            ZiScalar::String(value) => value.clone(),
            ZiScalar::Date(value) => value.to_rfc3339(),
            ZiScalar::Bytes(value) => STANDARD.encode(value),
        }
    }

    /// Numeric view used by comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ZiScalar::Integer(value) => Some(*value as f64),
            ZiScalar::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Orders two scalars of compatible kinds. Integers and numbers compare
    /// numerically, everything else only against its own kind.
    pub fn compare(&self, other: &ZiScalar) -> Option<Ordering> {
        match (self, other) {
            (ZiScalar::Null, ZiScalar::Null) => Some(Ordering::Equal),
            (ZiScalar::Boolean(a), ZiScalar::Boolean(b)) => Some(a.cmp(b)),
            (ZiScalar::Integer(a), ZiScalar::Integer(b)) => Some(a.cmp(b)),
            (ZiScalar::String(a), ZiScalar::String(b)) => Some(a.cmp(b)),
            (ZiScalar::Date(a), ZiScalar::Date(b)) => Some(a.cmp(b)),
            (ZiScalar::Bytes(a), ZiScalar::Bytes(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Converts a JSON value into a scalar of the declared field type.
    pub fn from_json(field_type: ZiFieldType, value: &Value) -> std::result::Result<Self, String> {
        if value.is_null() {
            return Ok(ZiScalar::Null);
        }
        match field_type {
            ZiFieldType::String => Ok(ZiScalar::String(match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })),
            ZiFieldType::Integer | ZiFieldType::Long => value
                .as_i64()
                .map(ZiScalar::Integer)
                .ok_or_else(|| format!("expected integer, got {value}")),
            ZiFieldType::Number | ZiFieldType::Decimal => value
                .as_f64()
                .map(ZiScalar::Number)
                .ok_or_else(|| format!("expected number, got {value}")),
            ZiFieldType::Boolean => value
                .as_bool()
                .map(ZiScalar::Boolean)
                .ok_or_else(|| format!("expected boolean, got {value}")),
            ZiFieldType::Date => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("expected RFC 3339 date string, got {value}"))?;
                DateTime::parse_from_rfc3339(text)
                    .map(|date| ZiScalar::Date(date.with_timezone(&Utc)))
                    .map_err(|err| err.to_string())
            }
            ZiFieldType::Byte => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("expected base64 string, got {value}"))?;
                STANDARD
                    .decode(text)
                    .map(ZiScalar::Bytes)
                    .map_err(|err| err.to_string())
            }
        }
    }
}

impl fmt::Display for ZiScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for ZiScalar {
    fn from(value: &str) -> Self {
        ZiScalar::String(value.to_string())
    }
}

impl From<String> for ZiScalar {
    fn from(value: String) -> Self {
        ZiScalar::String(value)
    }
}

impl From<i64> for ZiScalar {
    fn from(value: i64) -> Self {
        ZiScalar::Integer(value)
    }
}

impl From<i32> for ZiScalar {
    fn from(value: i32) -> Self {
        ZiScalar::Integer(i64::from(value))
    }
}

impl From<f64> for ZiScalar {
    fn from(value: f64) -> Self {
        ZiScalar::Number(value)
    }
}

impl From<bool> for ZiScalar {
    fn from(value: bool) -> Self {
        ZiScalar::Boolean(value)
    }
}

impl From<DateTime<Utc>> for ZiScalar {
    fn from(value: DateTime<Utc>) -> Self {
        ZiScalar::Date(value)
    }
}

/// One flat record bound to its port metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ZiRecord {
    metadata: Arc<ZiRecordMetadata>,
    values: Vec<ZiScalar>,
}

impl ZiRecord {
    /// Creates a record with every field set to null.
    #[allow(non_snake_case)]
    pub fn new(metadata: Arc<ZiRecordMetadata>) -> Self {
        let values = vec![ZiScalar::Null; metadata.len()];
        Self { metadata, values }
    }

    /// Creates a record from positional values; missing trailing values are null.
    #[allow(non_snake_case)]
    pub fn from_values(metadata: Arc<ZiRecordMetadata>, values: Vec<ZiScalar>) -> Result<Self> {
        if values.len() > metadata.len() {
            return Err(ZiError::configuration(format!(
                "record '{}' declares {} fields, got {} values",
                metadata.name,
                metadata.len(),
                values.len()
            )));
        }
        let mut record = Self::new(metadata);
        for (slot, value) in record.values.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(record)
    }

    /// Builds a record from a JSON object keyed by field name. Absent keys are null.
    #[allow(non_snake_case)]
    pub fn from_json(metadata: Arc<ZiRecordMetadata>, payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| {
            ZiError::mapping(metadata.name.clone(), "record payload must be a JSON object")
        })?;
        let mut record = Self::new(metadata.clone());
        for (index, field) in metadata.fields.iter().enumerate() {
            if let Some(value) = object.get(&field.name) {
                record.values[index] = ZiScalar::from_json(field.field_type, value).map_err(
                    |message| ZiError::mapping(format!("{}.{}", metadata.name, field.name), message),
                )?;
            }
        }
        Ok(record)
    }

    pub fn metadata(&self) -> &Arc<ZiRecordMetadata> {
        &self.metadata
    }

    pub fn field(&self, index: usize) -> Option<&ZiScalar> {
        self.values.get(index)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&ZiScalar> {
        self.metadata
            .field_position(name)
            .and_then(|index| self.values.get(index))
    }

    pub fn set_field(&mut self, index: usize, value: impl Into<ZiScalar>) -> Result<()> {
        let slot = self.values.get_mut(index).ok_or_else(|| {
            ZiError::configuration(format!(
                "record '{}' has no field #{index}",
                self.metadata.name
            ))
        })?;
        *slot = value.into();
        Ok(())
    }

    /// Overwrites this record's values with another record of the same shape.
    pub fn copy_from(&mut self, other: &ZiRecord) {
        self.values.clone_from(&other.values);
    }

    pub fn values(&self) -> &[ZiScalar] {
        &self.values
    }
}

/// Join key of a record: canonical text of the key fields, null kept distinct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ZiRecordKey(Vec<Option<String>>);

impl ZiRecordKey {
    /// Extracts the key fields at `keys` from `record`.
    pub fn from_record(record: &ZiRecord, keys: &[usize]) -> Self {
        ZiRecordKey(
            keys.iter()
                .map(|index| match record.field(*index) {
                    None | Some(ZiScalar::Null) => None,
                    Some(value) => Some(value.to_text()),
                })
                .collect(),
        )
    }

    /// Builds a key directly from its parts.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        ZiRecordKey(parts.into_iter().map(|part| part.map(Into::into)).collect())
    }

    pub fn parts(&self) -> &[Option<String>] {
        &self.0
    }
}

impl fmt::Display for ZiRecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|part| part.as_deref().unwrap_or("<null>"))
            .collect();
        write!(f, "[{}]", parts.join(";"))
    }
}

/// The records currently active on each port during a write pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZiRecordSet {
    slots: Vec<Option<ZiRecord>>,
}

impl ZiRecordSet {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty record set with room for `ports` ports.
    #[allow(non_snake_case)]
    pub fn with_ports(ports: usize) -> Self {
        Self {
            slots: vec![None; ports],
        }
    }

    /// Builder form of [`ZiRecordSet::set`].
    #[allow(non_snake_case)]
    pub fn with_record(mut self, port: usize, record: ZiRecord) -> Self {
        self.set(port, record);
        self
    }

    pub fn get(&self, port: usize) -> Option<&ZiRecord> {
        self.slots.get(port).and_then(Option::as_ref)
    }

    pub fn set(&mut self, port: usize, record: ZiRecord) {
        self.replace(port, Some(record));
    }

    /// Puts `record` into the slot of `port`, returning the previous occupant.
    pub fn replace(&mut self, port: usize, record: Option<ZiRecord>) -> Option<ZiRecord> {
        if port >= self.slots.len() {
            if record.is_none() {
                return None;
            }
            self.slots.resize(port + 1, None);
        }
        std::mem::replace(&mut self.slots[port], record)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Number of port slots, occupied or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
