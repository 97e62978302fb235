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

//! # ZiTree Error Module
//!
//! This module defines the error types used throughout ZiTree for consistent
//! error handling and reporting.
//!
//! ## Error Categories
//!
//! - **Io**: Failures of the physical sink bound to a streaming writer
//! - **Configuration**: Mapping or schema setup problems detected before any
//!   record flows (unknown ports, fields or join keys, broken schema references)
//! - **Mapping**: Failures of the current document pass, carrying the offending
//!   mapping or schema path
//! - **Serde**: Serialization/deserialization errors of designs and configs
//! - **Internal**: Unexpected internal failures
//!
//! Record filter predicates report arbitrary errors through `anyhow`; those are
//! wrapped into [`ZiError::Mapping`] by [`ZiError::record_filter`] so a failing
//! predicate aborts the pass like any other mapping failure.
//!
//! ## Usage
//!
//! ```rust
//! use zitree::errors::{Result, ZiError};
//!
//! fn key_index(names: &[&str], key: &str) -> Result<usize> {
//!     names
//!         .iter()
//!         .position(|name| *name == key)
//!         .ok_or_else(|| ZiError::configuration(format!("unknown key field '{key}'")))
//! }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used throughout ZiTree.
pub type Result<T> = std::result::Result<T, ZiError>;

/// Canonical error enumeration for ZiTree.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ZiError {
    /// Errors originating from the physical output sink.
    #[error("io error: {0}")]
    Io(String),

    /// Invalid mapping, port or schema setup. Fatal, raised before writing.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Failure of the current document pass at the given mapping/schema path.
    #[error("mapping error at '{path}': {message}")]
    Mapping { path: String, message: String },

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for ZiError {
    fn from(err: io::Error) -> Self {
        ZiError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ZiError {
    fn from(err: serde_json::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

#[cfg(feature = "yaml")]
impl From<serde_yaml::Error> for ZiError {
    fn from(err: serde_yaml::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl ZiError {
    /// Helper to construct configuration errors.
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        ZiError::Configuration {
            message: message.into(),
        }
    }

    /// Helper to construct mapping errors.
    pub fn mapping(path: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Mapping {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wraps a failing record filter predicate.
    pub fn record_filter(path: impl Into<String>, err: anyhow::Error) -> Self {
        ZiError::Mapping {
            path: path.into(),
            message: format!("record filter failed: {err:#}"),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        ZiError::Internal(message.into())
    }

    /// Returns `true` for [`ZiError::Configuration`].
    pub fn is_configuration(&self) -> bool {
        matches!(self, ZiError::Configuration { .. })
    }

    /// Returns `true` for [`ZiError::Mapping`].
    pub fn is_mapping(&self) -> bool {
        matches!(self, ZiError::Mapping { .. })
    }
}
