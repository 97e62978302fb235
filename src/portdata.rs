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

//! # ZiTree Port Data Module
//!
//! Child record streams consumed by port bindings.
//!
//! A binding never walks a port's records directly. It asks the port's
//! [`ZiPortData`] for an iterator scoped to the parent's current join key and
//! pulls records one at a time through [`ZiDataIterator`]. Two sources are
//! provided:
//!
//! - [`ZiCachedPortData`]: every record of the port is held in memory and
//!   grouped lazily by join key, so keys may be requested in any order.
//! - [`ZiStreamingPortData`]: records arrive from a pull source already grouped
//!   by join key in parent order. A group is read only when some parent asks
//!   for its key or for a key behind it; groups read past are held until
//!   their parent asks for them.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::iter::Peekable;
use std::rc::Rc;

use crate::errors::{Result, ZiError};
use crate::record::{ZiRecord, ZiRecordKey};

/// Resumable pull cursor over the child records of one binding invocation.
pub trait ZiDataIterator {
    /// Whether another record is available.
    fn has_next(&mut self) -> bool;

    /// Consumes and returns the next record.
    fn next_record(&mut self) -> Option<ZiRecord>;

    /// Returns the next record without consuming it.
    fn peek_record(&mut self) -> Option<ZiRecord>;
}

/// Source of key-scoped child iterators for one port.
pub trait ZiPortData {
    /// Opens an iterator over the records whose `keys` fields equal `key`.
    ///
    /// `next_key` is the key of the parent record that follows the current
    /// one, when known. Streaming sources stop in front of it. With no `key`
    /// the iterator is unconstrained.
    fn iterator(
        &mut self,
        keys: Option<&[usize]>,
        key: Option<&ZiRecordKey>,
        next_key: Option<&ZiRecordKey>,
    ) -> Result<Box<dyn ZiDataIterator>>;
}

type ZiKeyIndex = HashMap<ZiRecordKey, Rc<Vec<usize>>>;

/// In-memory port data grouped by join key on first use.
#[derive(Default)]
pub struct ZiCachedPortData {
    records: Rc<Vec<ZiRecord>>,
    indexes: HashMap<Vec<usize>, ZiKeyIndex>,
}

impl ZiCachedPortData {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(non_snake_case)]
    pub fn from_records(records: Vec<ZiRecord>) -> Self {
        Self {
            records: Rc::new(records),
            indexes: HashMap::new(),
        }
    }

    /// Appends a record. Existing key groups are rebuilt on next use.
    pub fn push(&mut self, record: ZiRecord) {
        Rc::make_mut(&mut self.records).push(record);
        self.indexes.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn group(&mut self, keys: &[usize], key: &ZiRecordKey) -> Rc<Vec<usize>> {
        let records = &self.records;
        let index = self.indexes.entry(keys.to_vec()).or_insert_with(|| {
            let mut grouped: HashMap<ZiRecordKey, Vec<usize>> = HashMap::new();
            for (position, record) in records.iter().enumerate() {
                grouped
                    .entry(ZiRecordKey::from_record(record, keys))
                    .or_default()
                    .push(position);
            }
            grouped
                .into_iter()
                .map(|(key, positions)| (key, Rc::new(positions)))
                .collect()
        });
        index.get(key).cloned().unwrap_or_default()
    }
}

impl ZiPortData for ZiCachedPortData {
    fn iterator(
        &mut self,
        keys: Option<&[usize]>,
        key: Option<&ZiRecordKey>,
        _next_key: Option<&ZiRecordKey>,
    ) -> Result<Box<dyn ZiDataIterator>> {
        let positions = match (keys, key) {
            (Some(keys), Some(key)) => Some(self.group(keys, key)),
            _ => None,
        };
        Ok(Box::new(ZiCachedIterator {
            records: self.records.clone(),
            positions,
            cursor: 0,
        }))
    }
}

struct ZiCachedIterator {
    records: Rc<Vec<ZiRecord>>,
    positions: Option<Rc<Vec<usize>>>,
    cursor: usize,
}

impl ZiCachedIterator {
    fn current(&self) -> Option<&ZiRecord> {
        match &self.positions {
            Some(positions) => positions
                .get(self.cursor)
                .and_then(|position| self.records.get(*position)),
            None => self.records.get(self.cursor),
        }
    }
}

impl ZiDataIterator for ZiCachedIterator {
    fn has_next(&mut self) -> bool {
        self.current().is_some()
    }

    fn next_record(&mut self) -> Option<ZiRecord> {
        let record = self.current().cloned();
        if record.is_some() {
            self.cursor += 1;
        }
        record
    }

    fn peek_record(&mut self) -> Option<ZiRecord> {
        self.current().cloned()
    }
}

/// Shared read position of a streaming port.
///
/// `held` keeps the groups read past while looking for another key. Each held
/// group is complete because the source is grouped by key.
struct ZiStreamState {
    source: Peekable<Box<dyn Iterator<Item = ZiRecord>>>,
    held: HashMap<ZiRecordKey, VecDeque<ZiRecord>>,
}

type ZiRecordSource = Rc<RefCell<ZiStreamState>>;

/// Port data read incrementally from a source grouped by join key.
///
/// Consecutive iterators share the source: the first record of the next group
/// stays unread until the iterator for that group asks for it. Groups found
/// in front of the requested key are held aside and served to the parent that
/// asks for them later; groups no parent asks for are never written.
pub struct ZiStreamingPortData {
    source: ZiRecordSource,
}

impl ZiStreamingPortData {
    #[allow(non_snake_case)]
    pub fn new<I>(source: I) -> Self
    where
        I: IntoIterator<Item = ZiRecord>,
        I::IntoIter: 'static,
    {
        let boxed: Box<dyn Iterator<Item = ZiRecord>> = Box::new(source.into_iter());
        Self {
            source: Rc::new(RefCell::new(ZiStreamState {
                source: boxed.peekable(),
                held: HashMap::new(),
            })),
        }
    }

    /// Number of records read from the source but not yet handed out.
    pub fn held_len(&self) -> usize {
        self.source.borrow().held.values().map(VecDeque::len).sum()
    }
}

impl ZiPortData for ZiStreamingPortData {
    fn iterator(
        &mut self,
        keys: Option<&[usize]>,
        key: Option<&ZiRecordKey>,
        next_key: Option<&ZiRecordKey>,
    ) -> Result<Box<dyn ZiDataIterator>> {
        let scope = match (keys, key) {
            (Some(keys), Some(key)) => Some((keys.to_vec(), key.clone())),
            (None, Some(_)) => {
                return Err(ZiError::configuration(
                    "streaming port data requires join key fields for a keyed iterator",
                ))
            }
            _ => None,
        };
        let held = scope
            .as_ref()
            .and_then(|(_, key)| self.source.borrow_mut().held.remove(key));
        Ok(Box::new(ZiStreamingIterator {
            source: self.source.clone(),
            scope,
            next_key: next_key.cloned(),
            held,
            started: false,
            finished: false,
        }))
    }
}

struct ZiStreamingIterator {
    source: ZiRecordSource,
    scope: Option<(Vec<usize>, ZiRecordKey)>,
    next_key: Option<ZiRecordKey>,
    held: Option<VecDeque<ZiRecord>>,
    started: bool,
    finished: bool,
}

impl ZiStreamingIterator {
    /// Positions the shared source on the next record of this group.
    fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }
        if let Some(held) = &self.held {
            self.finished = held.is_empty();
            return !self.finished;
        }
        let mut state = self.source.borrow_mut();
        loop {
            let record_key = match (state.source.peek(), &self.scope) {
                (None, _) => {
                    self.finished = true;
                    return false;
                }
                (Some(_), None) => return true,
                (Some(record), Some((keys, _))) => ZiRecordKey::from_record(record, keys),
            };
            if self.scope.as_ref().map(|(_, key)| key) == Some(&record_key) {
                self.started = true;
                return true;
            }
            if self.started || self.next_key.as_ref() == Some(&record_key) {
                self.finished = true;
                return false;
            }
            if let Some(record) = state.source.next() {
                log::debug!("holding child record with key {record_key} for a later parent");
                state.held.entry(record_key).or_default().push_back(record);
            }
        }
    }
}

impl ZiDataIterator for ZiStreamingIterator {
    fn has_next(&mut self) -> bool {
        self.advance()
    }

    fn next_record(&mut self) -> Option<ZiRecord> {
        if !self.advance() {
            return None;
        }
        match &mut self.held {
            Some(held) => held.pop_front(),
            None => self.source.borrow_mut().source.next(),
        }
    }

    fn peek_record(&mut self) -> Option<ZiRecord> {
        if !self.advance() {
            return None;
        }
        match &self.held {
            Some(held) => held.front().cloned(),
            None => self.source.borrow_mut().source.peek().cloned(),
        }
    }
}

/// Port data registered with a formatter, indexed by port number.
#[derive(Default)]
pub struct ZiPortRegistry {
    ports: Vec<Option<Box<dyn ZiPortData>>>,
}

impl ZiPortRegistry {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: usize, data: Box<dyn ZiPortData>) {
        if port >= self.ports.len() {
            self.ports.resize_with(port + 1, || None);
        }
        self.ports[port] = Some(data);
    }

    pub fn contains(&self, port: usize) -> bool {
        matches!(self.ports.get(port), Some(Some(_)))
    }

    pub fn get_mut(&mut self, port: usize) -> Option<&mut (dyn ZiPortData + 'static)> {
        self.ports.get_mut(port).and_then(|slot| slot.as_deref_mut())
    }
}
