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

//! # Name and Value Resolvers
//!
//! Every name and value in a compiled mapping is a [`ZiWritableValue`]: an
//! ordered list of static text and record field references resolved against
//! the active [`ZiRecordSet`]. A single part keeps its typed value; several
//! parts are concatenated through their text form.

use crate::errors::{Result, ZiError};
use crate::record::{ZiRecordSet, ZiScalar};

/// One part of a resolvable value.
#[derive(Clone, Debug, PartialEq)]
pub enum ZiNodeValue {
    /// Constant text.
    Static(String),
    /// Field `field` of the record active on `port`.
    Dynamic { port: usize, field: usize },
}

impl ZiNodeValue {
    pub fn resolve(&self, records: &ZiRecordSet) -> Result<ZiScalar> {
        match self {
            ZiNodeValue::Static(text) => Ok(ZiScalar::String(text.clone())),
            ZiNodeValue::Dynamic { port, field } => {
                let record = records.get(*port).ok_or_else(|| {
                    ZiError::mapping(self.describe(), format!("no active record on port {port}"))
                })?;
                record.field(*field).cloned().ok_or_else(|| {
                    ZiError::mapping(
                        self.describe(),
                        format!("record '{}' has no field #{field}", record.metadata().name),
                    )
                })
            }
        }
    }

    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        match self {
            ZiNodeValue::Static(text) => Ok(text.is_empty()),
            ZiNodeValue::Dynamic { .. } => Ok(self.resolve(records)?.is_empty()),
        }
    }

    /// Template form of this part, used in error paths.
    pub fn describe(&self) -> String {
        match self {
            ZiNodeValue::Static(text) => text.replace('$', "$$"),
            ZiNodeValue::Dynamic { port, field } => format!("${port}.#{field}"),
        }
    }
}

/// Composite resolver: concatenation of [`ZiNodeValue`] parts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZiWritableValue {
    parts: Vec<ZiNodeValue>,
}

impl ZiWritableValue {
    #[allow(non_snake_case)]
    pub fn new(parts: Vec<ZiNodeValue>) -> Self {
        Self { parts }
    }

    /// A constant value.
    #[allow(non_snake_case)]
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![ZiNodeValue::Static(text.into())])
    }

    /// A single record field reference.
    #[allow(non_snake_case)]
    pub fn field(port: usize, field: usize) -> Self {
        Self::new(vec![ZiNodeValue::Dynamic { port, field }])
    }

    pub fn parts(&self) -> &[ZiNodeValue] {
        &self.parts
    }

    /// Field references as `(port, field)` pairs.
    pub fn references(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.parts.iter().filter_map(|part| match part {
            ZiNodeValue::Dynamic { port, field } => Some((*port, *field)),
            ZiNodeValue::Static(_) => None,
        })
    }

    /// Resolves the value. `None` only when there are no parts at all.
    pub fn resolve(&self, records: &ZiRecordSet) -> Result<Option<ZiScalar>> {
        match self.parts.as_slice() {
            [] => Ok(None),
            [single] => single.resolve(records).map(Some),
            parts => {
                let mut text = String::new();
                for part in parts {
                    text.push_str(&part.resolve(records)?.to_text());
                }
                Ok(Some(ZiScalar::String(text)))
            }
        }
    }

    /// Resolves the value through its text form.
    pub fn resolve_text(&self, records: &ZiRecordSet) -> Result<Option<String>> {
        Ok(self.resolve(records)?.map(|value| value.to_text()))
    }

    /// Empty when every part is empty.
    pub fn is_empty(&self, records: &ZiRecordSet) -> Result<bool> {
        for part in &self.parts {
            if !part.is_empty(records)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn describe(&self) -> String {
        self.parts.iter().map(ZiNodeValue::describe).collect()
    }
}

/// Resolvable node or attribute name with optional namespace prefix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZiNodeName {
    pub prefix: Option<ZiWritableValue>,
    pub local: ZiWritableValue,
}

impl ZiNodeName {
    #[allow(non_snake_case)]
    pub fn new(prefix: Option<ZiWritableValue>, local: ZiWritableValue) -> Self {
        Self { prefix, local }
    }

    /// A constant name, split on the first `:` into prefix and local part.
    #[allow(non_snake_case)]
    pub fn fixed(name: &str) -> Self {
        match name.split_once(':') {
            Some((prefix, local)) => Self::new(
                Some(ZiWritableValue::fixed(prefix)),
                ZiWritableValue::fixed(local),
            ),
            None => Self::new(None, ZiWritableValue::fixed(name)),
        }
    }

    /// Resolves to `prefix:local` or `local`. An empty local part is an error.
    pub fn resolve(&self, records: &ZiRecordSet) -> Result<String> {
        let local = self.local.resolve_text(records)?.unwrap_or_default();
        if local.is_empty() {
            return Err(ZiError::mapping(
                self.describe(),
                "name resolved to an empty string",
            ));
        }
        match &self.prefix {
            Some(prefix) => match prefix.resolve_text(records)? {
                Some(prefix) if !prefix.is_empty() => Ok(format!("{prefix}:{local}")),
                _ => Ok(local),
            },
            None => Ok(local),
        }
    }

    pub fn references(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.prefix
            .iter()
            .flat_map(ZiWritableValue::references)
            .chain(self.local.references())
    }

    pub fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix.describe(), self.local.describe()),
            None => self.local.describe(),
        }
    }
}
