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

//! # ZiTree Writer Tests - Generic Maps
//!
//! Tests for the map backend building nested `serde_json::Value` documents.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test map_writer
//! ```

use serde_json::json;
use zitree::{collector, ZiMapWriter, ZiScalar, ZiTargetWriter, ZiTreeWriter};

fn leaf_node(writer: &mut ZiMapWriter, name: &str, value: impl Into<ZiScalar>) {
    writer.write_start_node(name).unwrap();
    writer.write_leaf(&value.into()).unwrap();
    writer.write_end_node(name).unwrap();
}

fn entry(writer: &mut ZiMapWriter, key: &str, int_value: i64, string_value: &str) {
    writer.write_start_node("entry").unwrap();
    leaf_node(writer, "key", key);
    writer.write_start_node("value").unwrap();
    leaf_node(writer, "intValue", int_value);
    leaf_node(writer, "stringValue", string_value);
    writer.write_end_node("value").unwrap();
    writer.write_end_node("entry").unwrap();
}

/// Tests map entries keyed by their `key` child.
#[test]
fn test_string_keyed_map() {
    let mut writer = ZiMapWriter::new();
    writer.write_start_tree().unwrap();
    writer.write_start_node("simpleMap").unwrap();
    writer.write_start_node("mapStringToSimpleType").unwrap();
    entry(&mut writer, "Scandinavian Nu Metal", 20, "Shoe Gazing");
    entry(&mut writer, "Black metal", 10, "Corpse paint");
    entry(&mut writer, "Super black metal", 450, "Blast beats");
    writer.write_end_node("mapStringToSimpleType").unwrap();
    writer.write_end_node("simpleMap").unwrap();
    writer.write_end_tree().unwrap();

    assert_eq!(
        writer.take_results(),
        vec![json!({
            "mapStringToSimpleType": {
                "Scandinavian Nu Metal": {"intValue": 20, "stringValue": "Shoe Gazing"},
                "Black metal": {"intValue": 10, "stringValue": "Corpse paint"},
                "Super black metal": {"intValue": 450, "stringValue": "Blast beats"}
            }
        })]
    );
    assert!(writer.results().is_empty());
}

/// Tests that repeated member names collect into an array.
#[test]
fn test_repeated_names() {
    let mut writer = ZiMapWriter::new();
    writer.write_start_tree().unwrap();
    writer.write_start_node("doc").unwrap();
    leaf_node(&mut writer, "title", "Riffs");
    leaf_node(&mut writer, "tag", "x");
    leaf_node(&mut writer, "tag", "y");
    leaf_node(&mut writer, "tag", "z");
    writer.write_end_node("doc").unwrap();
    writer.write_end_tree().unwrap();

    assert_eq!(writer.results(), &[json!({"title": "Riffs", "tag": ["x", "y", "z"]})]);
}

/// Tests collections, leafless structure and text in object nodes.
#[test]
fn test_collections_and_lazy_structure() {
    let mut writer = ZiMapWriter::new();
    writer.write_start_tree().unwrap();
    writer.write_start_node("doc").unwrap();
    writer.write_start_collection("items").unwrap();
    leaf_node(&mut writer, "item", 1i64);
    leaf_node(&mut writer, "item", 2i64);
    writer.write_end_collection("items").unwrap();
    writer.write_start_collection("none").unwrap();
    writer.write_start_node("item").unwrap();
    writer.write_end_node("item").unwrap();
    writer.write_end_collection("none").unwrap();
    writer.write_start_node("price").unwrap();
    leaf_node(&mut writer, "currency", "EUR");
    writer.write_leaf(&ZiScalar::from(12.5)).unwrap();
    writer.write_end_node("price").unwrap();
    writer.write_end_node("doc").unwrap();
    writer.write_end_tree().unwrap();

    assert_eq!(
        writer.results(),
        &[json!({"items": [1, 2], "price": {"currency": "EUR", "value": 12.5}})]
    );
}

/// Tests documents whose root receives no leaf or is a collection.
#[test]
fn test_empty_and_list_roots() {
    let mut writer = ZiMapWriter::new();
    writer.write_start_tree().unwrap();
    writer.write_start_node("doc").unwrap();
    writer.write_start_node("nothing").unwrap();
    writer.write_end_node("nothing").unwrap();
    writer.write_end_node("doc").unwrap();
    writer.write_end_tree().unwrap();

    writer.write_start_tree().unwrap();
    writer.write_start_collection("rows").unwrap();
    writer.write_end_collection("rows").unwrap();
    writer.write_end_tree().unwrap();

    writer.write_start_tree().unwrap();
    writer.write_start_collection("rows").unwrap();
    writer.write_start_node("row").unwrap();
    leaf_node(&mut writer, "id", 7i64);
    writer.write_end_node("row").unwrap();
    writer.write_end_collection("rows").unwrap();
    writer.write_end_tree().unwrap();

    assert_eq!(writer.results(), &[json!({}), json!([]), json!([{"id": 7}])]);
}

/// Tests mapping errors for malformed event sequences.
#[test]
fn test_structure_errors() {
    let mut writer = ZiMapWriter::new();
    assert!(writer.write_start_node("early").unwrap_err().is_mapping());

    writer.write_start_tree().unwrap();
    writer.write_start_node("doc").unwrap();
    writer.write_start_node("name").unwrap();
    writer.write_leaf(&ZiScalar::from("a")).unwrap();
    assert!(writer.write_leaf(&ZiScalar::from("b")).unwrap_err().is_mapping());
    assert!(writer.write_start_node("child").unwrap_err().is_mapping());

    let mut writer = ZiMapWriter::new();
    writer.write_start_tree().unwrap();
    writer.write_start_node("doc").unwrap();
    writer.write_start_node("entry").unwrap();
    assert!(writer.write_start_node("other").unwrap_err().is_mapping());

    let mut writer = ZiMapWriter::new();
    writer.write_start_tree().unwrap();
    writer.write_start_node("doc").unwrap();
    writer.write_start_node("entry").unwrap();
    leaf_node(&mut writer, "value", 1i64);
    assert!(writer.write_end_node("entry").unwrap_err().is_mapping());
}

/// Tests that flush hands completed documents to the collector.
#[test]
fn test_flush_to_collector() {
    let output = collector();
    let mut writer = ZiMapWriter::new();
    writer.set_target(output.clone()).unwrap();
    for id in 1..=2i64 {
        writer.write_start_tree().unwrap();
        writer.write_start_node("doc").unwrap();
        leaf_node(&mut writer, "id", id);
        writer.write_end_node("doc").unwrap();
        writer.write_end_tree().unwrap();
    }
    assert!(output.lock().unwrap().is_empty());

    writer.flush().unwrap();
    assert!(writer.results().is_empty());
    assert_eq!(*output.lock().unwrap(), vec![json!({"id": 1}), json!({"id": 2})]);
}
