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

//! # Bean Classes
//!
//! Accessor tables standing in for runtime reflection.
//!
//! Every typed object a [`crate::schema::ZiSchema`] names is registered once
//! as a [`ZiBeanClass`]: a factory producing a default instance plus one
//! setter closure per property. The bean writer looks classes up by type name
//! when it is constructed and only calls closures afterwards.
//!
//! ```rust
//! use zitree::writer::bean::{ZiBeanClass, ZiBeanRegistry};
//!
//! #[derive(Default)]
//! struct Track {
//!     title: String,
//!     plays: i32,
//! }
//!
//! let registry = ZiBeanRegistry::new().with_class(
//!     ZiBeanClass::of::<Track>("Track")
//!         .property("title", |track: &mut Track, value| {
//!             track.title = value.into_string()?;
//!             Ok(())
//!         })
//!         .property("plays", |track: &mut Track, value| {
//!             track.plays = value.into_i32()?;
//!             Ok(())
//!         }),
//! );
//! assert!(registry.get("Track").is_some());
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};

use crate::record::ZiScalar;
use crate::schema::ZiSimpleType;

/// A value produced by the bean writer.
pub enum ZiBeanValue {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    /// Instance of a registered bean class.
    Object(Box<dyn Any + Send>),
    List(Vec<ZiBeanValue>),
    /// Map entries in insertion order.
    Map(Vec<(ZiBeanValue, ZiBeanValue)>),
}

impl fmt::Debug for ZiBeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZiBeanValue::Null => f.write_str("Null"),
            ZiBeanValue::Boolean(value) => write!(f, "Boolean({value})"),
            ZiBeanValue::Byte(value) => write!(f, "Byte({value})"),
            ZiBeanValue::Short(value) => write!(f, "Short({value})"),
            ZiBeanValue::Int(value) => write!(f, "Int({value})"),
            ZiBeanValue::Long(value) => write!(f, "Long({value})"),
            ZiBeanValue::Float(value) => write!(f, "Float({value})"),
            ZiBeanValue::Double(value) => write!(f, "Double({value})"),
            ZiBeanValue::Char(value) => write!(f, "Char({value:?})"),
            ZiBeanValue::String(value) => write!(f, "String({value:?})"),
            ZiBeanValue::Date(value) => write!(f, "Date({value})"),
            ZiBeanValue::Bytes(value) => write!(f, "Bytes({} bytes)", value.len()),
            ZiBeanValue::Object(_) => f.write_str("Object(..)"),
            ZiBeanValue::List(items) => f.debug_list().entries(items).finish(),
            ZiBeanValue::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(key, value)| (key, value)))
                .finish(),
        }
    }
}

impl ZiBeanValue {
    /// Converts a field value to the declared scalar type.
    pub fn convert(ty: ZiSimpleType, value: &ZiScalar) -> anyhow::Result<Self> {
        if value.is_null() {
            return Ok(ZiBeanValue::Null);
        }
        let converted = match ty {
            ZiSimpleType::Boolean => ZiBeanValue::Boolean(match value {
                ZiScalar::Boolean(flag) => *flag,
                ZiScalar::Integer(number) => *number != 0,
                ZiScalar::String(text) => text.trim().parse()?,
                other => bail!("cannot convert {other:?} to boolean"),
            }),
            ZiSimpleType::Byte => ZiBeanValue::Byte(i8::try_from(integral(value)?)?),
            ZiSimpleType::Short => ZiBeanValue::Short(i16::try_from(integral(value)?)?),
            ZiSimpleType::Int => ZiBeanValue::Int(i32::try_from(integral(value)?)?),
            ZiSimpleType::Long => ZiBeanValue::Long(integral(value)?),
            ZiSimpleType::Float => ZiBeanValue::Float(floating(value)? as f32),
            ZiSimpleType::Double => ZiBeanValue::Double(floating(value)?),
            ZiSimpleType::Char => {
                let text = value.to_text();
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => ZiBeanValue::Char(ch),
                    _ => bail!("cannot convert '{text}' to a single character"),
                }
            }
            ZiSimpleType::String => ZiBeanValue::String(value.to_text()),
            ZiSimpleType::Date => ZiBeanValue::Date(match value {
                ZiScalar::Date(date) => *date,
                ZiScalar::String(text) => DateTime::parse_from_rfc3339(text.trim())?.with_timezone(&Utc),
                ZiScalar::Integer(millis) => DateTime::from_timestamp_millis(*millis)
                    .ok_or_else(|| anyhow!("timestamp {millis} out of range"))?,
                other => bail!("cannot convert {other:?} to date"),
            }),
            ZiSimpleType::Bytes => ZiBeanValue::Bytes(match value {
                ZiScalar::Bytes(bytes) => bytes.clone(),
                other => other.to_text().into_bytes(),
            }),
        };
        Ok(converted)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ZiBeanValue::Null)
    }

    pub fn into_bool(self) -> anyhow::Result<bool> {
        match self {
            ZiBeanValue::Boolean(flag) => Ok(flag),
            other => bail!("expected boolean, got {other:?}"),
        }
    }

    pub fn into_i64(self) -> anyhow::Result<i64> {
        match self {
            ZiBeanValue::Byte(value) => Ok(i64::from(value)),
            ZiBeanValue::Short(value) => Ok(i64::from(value)),
            ZiBeanValue::Int(value) => Ok(i64::from(value)),
            ZiBeanValue::Long(value) => Ok(value),
            other => bail!("expected integer, got {other:?}"),
        }
    }

    pub fn into_i32(self) -> anyhow::Result<i32> {
        Ok(i32::try_from(self.into_i64()?)?)
    }

    pub fn into_f64(self) -> anyhow::Result<f64> {
        match self {
            ZiBeanValue::Float(value) => Ok(f64::from(value)),
            ZiBeanValue::Double(value) => Ok(value),
            other => Ok(other.into_i64()? as f64),
        }
    }

    pub fn into_string(self) -> anyhow::Result<String> {
        match self {
            ZiBeanValue::String(text) => Ok(text),
            ZiBeanValue::Char(ch) => Ok(ch.to_string()),
            other => bail!("expected string, got {other:?}"),
        }
    }

    pub fn into_date(self) -> anyhow::Result<DateTime<Utc>> {
        match self {
            ZiBeanValue::Date(date) => Ok(date),
            other => bail!("expected date, got {other:?}"),
        }
    }

    /// Null becomes `None`, anything else goes through `convert`.
    pub fn into_option<T>(
        self,
        convert: impl FnOnce(ZiBeanValue) -> anyhow::Result<T>,
    ) -> anyhow::Result<Option<T>> {
        match self {
            ZiBeanValue::Null => Ok(None),
            other => convert(other).map(Some),
        }
    }

    /// Unwraps an instance of a registered bean class.
    pub fn into_object<T: Any>(self) -> anyhow::Result<T> {
        match self {
            ZiBeanValue::Object(object) => {
                let object: Box<dyn Any> = object;
                object
                    .downcast::<T>()
                    .map(|boxed| *boxed)
                    .map_err(|_| anyhow!("bean is not a {}", type_name::<T>()))
            }
            other => bail!("expected {}, got {other:?}", type_name::<T>()),
        }
    }

    /// Converts every item of a list. Null is an empty list.
    pub fn into_list<T>(
        self,
        mut convert: impl FnMut(ZiBeanValue) -> anyhow::Result<T>,
    ) -> anyhow::Result<Vec<T>> {
        match self {
            ZiBeanValue::Null => Ok(Vec::new()),
            ZiBeanValue::List(items) => items.into_iter().map(&mut convert).collect(),
            other => bail!("expected list, got {other:?}"),
        }
    }

    /// Converts every entry of a map, preserving order. Null is an empty map.
    pub fn into_entries<K, V>(
        self,
        mut key: impl FnMut(ZiBeanValue) -> anyhow::Result<K>,
        mut value: impl FnMut(ZiBeanValue) -> anyhow::Result<V>,
    ) -> anyhow::Result<Vec<(K, V)>> {
        match self {
            ZiBeanValue::Null => Ok(Vec::new()),
            ZiBeanValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((key(k)?, value(v)?)))
                .collect(),
            other => bail!("expected map, got {other:?}"),
        }
    }
}

fn integral(value: &ZiScalar) -> anyhow::Result<i64> {
    match value {
        ZiScalar::Integer(number) => Ok(*number),
        ZiScalar::Number(number) if number.fract() == 0.0 && number.is_finite() => Ok(*number as i64),
        ZiScalar::Boolean(flag) => Ok(i64::from(*flag)),
        ZiScalar::String(text) => Ok(text.trim().parse()?),
        other => bail!("cannot convert {other:?} to an integer"),
    }
}

fn floating(value: &ZiScalar) -> anyhow::Result<f64> {
    match value {
        ZiScalar::Integer(number) => Ok(*number as f64),
        ZiScalar::Number(number) => Ok(*number),
        ZiScalar::String(text) => Ok(text.trim().parse()?),
        other => bail!("cannot convert {other:?} to a number"),
    }
}

type ZiFactory = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;
type ZiSetter = Box<dyn Fn(&mut (dyn Any + Send), ZiBeanValue) -> anyhow::Result<()> + Send + Sync>;

/// Factory and property setters of one bean type.
pub struct ZiBeanClass {
    type_name: String,
    factory: ZiFactory,
    setters: HashMap<String, ZiSetter>,
}

impl fmt::Debug for ZiBeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut properties: Vec<&String> = self.setters.keys().collect();
        properties.sort();
        f.debug_struct("ZiBeanClass")
            .field("type_name", &self.type_name)
            .field("properties", &properties)
            .finish()
    }
}

impl ZiBeanClass {
    /// A class instantiated through `T::default()`.
    #[allow(non_snake_case)]
    pub fn of<T: Any + Send + Default>(type_name: impl Into<String>) -> Self {
        Self::with_factory(type_name, || T::default())
    }

    #[allow(non_snake_case)]
    pub fn with_factory<T, F>(type_name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            factory: Box::new(move || Box::new(factory())),
            setters: HashMap::new(),
        }
    }

    /// Registers the setter of `name`.
    #[allow(non_snake_case)]
    pub fn property<T, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        T: Any + Send,
        F: Fn(&mut T, ZiBeanValue) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let wrapped = move |bean: &mut (dyn Any + Send), value: ZiBeanValue| {
            let bean = bean
                .downcast_mut::<T>()
                .ok_or_else(|| anyhow!("setter expects a {}", type_name::<T>()))?;
            setter(bean, value)
        };
        self.setters.insert(name.into(), Box::new(wrapped));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    pub fn instantiate(&self) -> Box<dyn Any + Send> {
        (self.factory)()
    }

    pub fn set(&self, bean: &mut (dyn Any + Send), name: &str, value: ZiBeanValue) -> anyhow::Result<()> {
        let setter = self
            .setters
            .get(name)
            .ok_or_else(|| anyhow!("{} has no property '{name}'", self.type_name))?;
        setter(bean, value)
    }
}

/// Bean classes by type name.
#[derive(Debug, Default)]
pub struct ZiBeanRegistry {
    classes: HashMap<String, ZiBeanClass>,
}

impl ZiBeanRegistry {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(non_snake_case)]
    pub fn with_class(mut self, class: ZiBeanClass) -> Self {
        self.register(class);
        self
    }

    pub fn register(&mut self, class: ZiBeanClass) {
        self.classes.insert(class.type_name.clone(), class);
    }

    pub fn get(&self, type_name: &str) -> Option<&ZiBeanClass> {
        self.classes.get(type_name)
    }
}
