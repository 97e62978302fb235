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

//! # Scalar Schema Types

use serde::{Deserialize, Serialize};

/// Declared type of a scalar property, collection item or map key/value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiSimpleType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Date,
    Bytes,
}

impl ZiSimpleType {
    /// Looks a type up by its schema name, accepting common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ZiSimpleType::Boolean,
            "byte" | "i8" => ZiSimpleType::Byte,
            "short" | "i16" => ZiSimpleType::Short,
            "int" | "integer" | "i32" => ZiSimpleType::Int,
            "long" | "i64" => ZiSimpleType::Long,
            "float" | "f32" => ZiSimpleType::Float,
            "double" | "f64" => ZiSimpleType::Double,
            "char" | "character" => ZiSimpleType::Char,
            "string" => ZiSimpleType::String,
            "date" => ZiSimpleType::Date,
            "bytes" => ZiSimpleType::Bytes,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ZiSimpleType::Boolean => "boolean",
            ZiSimpleType::Byte => "byte",
            ZiSimpleType::Short => "short",
            ZiSimpleType::Int => "int",
            ZiSimpleType::Long => "long",
            ZiSimpleType::Float => "float",
            ZiSimpleType::Double => "double",
            ZiSimpleType::Char => "char",
            ZiSimpleType::String => "string",
            ZiSimpleType::Date => "date",
            ZiSimpleType::Bytes => "bytes",
        }
    }
}
