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

//! # ZiTree Writer Tests - Typed Objects
//!
//! Tests for the bean backend building registered Rust types from tree
//! events walked against a schema.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test bean_writer
//! ```

use zitree::{
    collector, ZiBeanClass, ZiBeanRegistry, ZiBeanState, ZiBeanValue, ZiBeanWriter, ZiSchema,
    ZiSchemaObject, ZiScalar, ZiSimpleType, ZiTargetWriter, ZiTreeWriter,
};

#[derive(Debug, Default, PartialEq)]
struct Simple {
    int_value: i32,
    string_value: String,
}

#[derive(Debug, Default, PartialEq)]
struct Holder {
    simple_map: Vec<(String, Simple)>,
    matrix: Vec<Vec<Simple>>,
    map_list: Vec<Vec<(Simple, f64)>>,
}

fn simple_class() -> ZiBeanClass {
    ZiBeanClass::of::<Simple>("Simple")
        .property("intValue", |bean: &mut Simple, value| {
            bean.int_value = value.into_i32()?;
            Ok(())
        })
        .property("stringValue", |bean: &mut Simple, value| {
            bean.string_value = value.into_string()?;
            Ok(())
        })
}

fn holder_class() -> ZiBeanClass {
    ZiBeanClass::of::<Holder>("Holder")
        .property("mapStringToSimpleType", |bean: &mut Holder, value| {
            bean.simple_map =
                value.into_entries(ZiBeanValue::into_string, ZiBeanValue::into_object::<Simple>)?;
            Ok(())
        })
        .property("simpleTypedValuesMatrix", |bean: &mut Holder, value| {
            bean.matrix = value.into_list(|row| row.into_list(ZiBeanValue::into_object::<Simple>))?;
            Ok(())
        })
        .property("mapList", |bean: &mut Holder, value| {
            bean.map_list = value.into_list(|map| {
                map.into_entries(ZiBeanValue::into_object::<Simple>, ZiBeanValue::into_f64)
            })?;
            Ok(())
        })
}

fn registry() -> ZiBeanRegistry {
    ZiBeanRegistry::new()
        .with_class(simple_class())
        .with_class(holder_class())
}

fn simple_type() -> ZiSchemaObject {
    ZiSchemaObject::typed(
        "Simple",
        vec![
            ZiSchemaObject::scalar(ZiSimpleType::Int).with_name("intValue"),
            ZiSchemaObject::scalar(ZiSimpleType::String).with_name("stringValue"),
        ],
    )
}

fn holder_schema() -> ZiSchema {
    let holder = ZiSchemaObject::typed(
        "Holder",
        vec![
            ZiSchemaObject::map(
                ZiSchemaObject::scalar(ZiSimpleType::String),
                ZiSchemaObject::reference("Simple"),
            )
            .with_name("mapStringToSimpleType"),
            ZiSchemaObject::collection(ZiSchemaObject::collection(ZiSchemaObject::reference(
                "Simple",
            )))
            .with_name("simpleTypedValuesMatrix"),
            ZiSchemaObject::collection(ZiSchemaObject::map(
                ZiSchemaObject::reference("Simple"),
                ZiSchemaObject::scalar(ZiSimpleType::Double),
            ))
            .with_name("mapList"),
        ],
    );
    ZiSchema::new(ZiSchemaObject::reference("Holder"))
        .with_type(holder)
        .with_type(simple_type())
}

fn leaf(writer: &mut ZiBeanWriter<'_>, name: &str, value: ZiScalar) {
    writer.write_start_node(name).unwrap();
    writer.write_leaf(&value).unwrap();
    writer.write_end_node(name).unwrap();
}

fn simple_fields(writer: &mut ZiBeanWriter<'_>, int_value: i64, string_value: &str) {
    leaf(writer, "intValue", ZiScalar::from(int_value));
    leaf(writer, "stringValue", ZiScalar::from(string_value));
}

fn simple(int_value: i32, string_value: &str) -> Simple {
    Simple {
        int_value,
        string_value: string_value.to_string(),
    }
}

fn take<T: 'static>(writer: &mut ZiBeanWriter<'_>) -> T {
    writer
        .flush_bean()
        .unwrap()
        .expect("a completed root")
        .into_object::<T>()
        .unwrap()
}

/// Tests a typed root with scalar properties and the state machine.
#[test]
fn test_simple_structure() {
    let schema = ZiSchema::new(ZiSchemaObject::reference("Simple")).with_type(simple_type());
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();
    assert_eq!(writer.state(), ZiBeanState::Tree);

    writer.write_start_tree().unwrap();
    writer.write_start_node("simple").unwrap();
    assert_eq!(writer.state(), ZiBeanState::Bean);
    writer.write_start_node("intValue").unwrap();
    assert_eq!(writer.state(), ZiBeanState::Property);
    writer.write_leaf(&ZiScalar::from("10")).unwrap();
    writer.write_end_node("intValue").unwrap();
    leaf(&mut writer, "stringValue", ZiScalar::from("Shoe Gazing"));
    writer.write_end_node("simple").unwrap();
    writer.write_end_tree().unwrap();

    assert_eq!(take::<Simple>(&mut writer), simple(10, "Shoe Gazing"));
    assert!(writer.flush_bean().unwrap().is_none());
}

/// Tests a map property with typed values.
#[test]
fn test_map_of_beans() {
    let schema = holder_schema();
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    writer.write_start_tree().unwrap();
    writer.write_start_node("simpleMap").unwrap();
    writer.write_start_node("mapStringToSimpleType").unwrap();
    assert_eq!(writer.state(), ZiBeanState::Map);
    for (key, int_value, string_value) in [
        ("Scandinavian Nu Metal", 20, "Shoe Gazing"),
        ("Black metal", 10, "Corpse paint"),
        ("Super black metal", 450, "Blast beats"),
    ] {
        writer.write_start_node("entry").unwrap();
        assert_eq!(writer.state(), ZiBeanState::MapEntry);
        leaf(&mut writer, "key", ZiScalar::from(key));
        writer.write_start_node("value").unwrap();
        simple_fields(&mut writer, int_value, string_value);
        writer.write_end_node("value").unwrap();
        writer.write_end_node("entry").unwrap();
    }
    writer.write_end_node("mapStringToSimpleType").unwrap();
    writer.write_end_node("simpleMap").unwrap();
    writer.write_end_tree().unwrap();

    let holder = take::<Holder>(&mut writer);
    assert_eq!(
        holder.simple_map,
        vec![
            ("Scandinavian Nu Metal".to_string(), simple(20, "Shoe Gazing")),
            ("Black metal".to_string(), simple(10, "Corpse paint")),
            ("Super black metal".to_string(), simple(450, "Blast beats")),
        ]
    );
    assert!(holder.matrix.is_empty());
}

/// Tests a nested collection filled by repeating its property node.
///
/// Every occurrence of the property appends one row to the same matrix.
#[test]
fn test_matrix_in_bean() {
    let schema = holder_schema();
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    let rows = [
        [(20, "First rule"), (10, "of")],
        [(450, "metal"), (345, "Play it f*ckin' loud!")],
    ];
    writer.write_start_tree().unwrap();
    writer.write_start_node("arrayInBean").unwrap();
    for row in rows {
        writer.write_start_node("simpleTypedValuesMatrix").unwrap();
        assert_eq!(writer.state(), ZiBeanState::Collection);
        for (int_value, string_value) in row {
            writer.write_start_node("item").unwrap();
            simple_fields(&mut writer, int_value, string_value);
            writer.write_end_node("item").unwrap();
        }
        writer.write_end_node("simpleTypedValuesMatrix").unwrap();
    }
    writer.write_end_node("arrayInBean").unwrap();
    writer.write_end_tree().unwrap();

    let holder = take::<Holder>(&mut writer);
    assert_eq!(
        holder.matrix,
        vec![
            vec![simple(20, "First rule"), simple(10, "of")],
            vec![simple(450, "metal"), simple(345, "Play it f*ckin' loud!")],
        ]
    );
}

/// Tests a collection of maps keyed by beans.
#[test]
fn test_collection_of_maps_in_bean() {
    let schema = holder_schema();
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    writer.write_start_tree().unwrap();
    writer.write_start_node("collectionInBean").unwrap();
    for round in 0..3i64 {
        writer.write_start_node("mapList").unwrap();
        for side in 0..2i64 {
            writer.write_start_node("entry").unwrap();
            writer.write_start_node("key").unwrap();
            simple_fields(&mut writer, round * 10 + side, "key");
            writer.write_end_node("key").unwrap();
            leaf(&mut writer, "value", ZiScalar::from(round as f64 + 0.5));
            writer.write_end_node("entry").unwrap();
        }
        writer.write_end_node("mapList").unwrap();
    }
    writer.write_end_node("collectionInBean").unwrap();
    writer.write_end_tree().unwrap();

    let holder = take::<Holder>(&mut writer);
    assert_eq!(holder.map_list.len(), 3);
    assert_eq!(
        holder.map_list[2],
        vec![(simple(20, "key"), 2.5), (simple(21, "key"), 2.5)]
    );
}

/// Tests a collection root filled by repeated root nodes.
#[test]
fn test_list_of_beans() {
    let schema = ZiSchema::new(ZiSchemaObject::collection(ZiSchemaObject::reference("Simple")))
        .with_type(simple_type());
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    let words = ["Dobra rada", "do zivota:", "\"Nejez", "zluty", "snih\""];
    writer.write_start_tree().unwrap();
    for word in words {
        writer.write_start_node("list").unwrap();
        leaf(&mut writer, "stringValue", ZiScalar::from(word));
        writer.write_end_node("list").unwrap();
    }
    writer.write_end_tree().unwrap();

    let beans = writer
        .flush_bean()
        .unwrap()
        .expect("a completed root")
        .into_list(ZiBeanValue::into_object::<Simple>)
        .unwrap();
    let expected: Vec<Simple> = words.iter().map(|word| simple(0, word)).collect();
    assert_eq!(beans, expected);
}

/// Tests an explicit collection root of scalars, including a null item.
#[test]
fn test_list_of_properties() {
    let schema = ZiSchema::new(ZiSchemaObject::collection(ZiSchemaObject::scalar(
        ZiSimpleType::String,
    )));
    let registry = ZiBeanRegistry::new();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    writer.write_start_tree().unwrap();
    writer.write_start_collection("values").unwrap();
    leaf(&mut writer, "item", ZiScalar::from("a"));
    writer.write_start_node("item").unwrap();
    writer.write_end_node("item").unwrap();
    leaf(&mut writer, "item", ZiScalar::from(3i64));
    writer.write_end_collection("values").unwrap();
    writer.write_end_tree().unwrap();

    let values = writer
        .flush_bean()
        .unwrap()
        .expect("a completed root")
        .into_list(|value| value.into_option(ZiBeanValue::into_string))
        .unwrap();
    assert_eq!(values, vec![Some("a".to_string()), None, Some("3".to_string())]);
}

/// Tests a collection root of nested maps.
#[test]
fn test_list_of_maps_of_maps() {
    let inner = ZiSchemaObject::map(
        ZiSchemaObject::scalar(ZiSimpleType::String),
        ZiSchemaObject::scalar(ZiSimpleType::Long),
    );
    let schema = ZiSchema::new(ZiSchemaObject::collection(ZiSchemaObject::map(
        ZiSchemaObject::scalar(ZiSimpleType::String),
        inner,
    )));
    let registry = ZiBeanRegistry::new();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    writer.write_start_tree().unwrap();
    for outer in ["north", "south"] {
        writer.write_start_node("list").unwrap();
        writer.write_start_node("entry").unwrap();
        leaf(&mut writer, "key", ZiScalar::from(outer));
        writer.write_start_node("value").unwrap();
        for (key, count) in [("a", 1i64), ("b", 2i64)] {
            writer.write_start_node("entry").unwrap();
            leaf(&mut writer, "key", ZiScalar::from(key));
            leaf(&mut writer, "value", ZiScalar::from(count));
            writer.write_end_node("entry").unwrap();
        }
        writer.write_end_node("value").unwrap();
        writer.write_end_node("entry").unwrap();
        writer.write_end_node("list").unwrap();
    }
    writer.write_end_tree().unwrap();

    let maps = writer
        .flush_bean()
        .unwrap()
        .expect("a completed root")
        .into_list(|map| {
            map.into_entries(ZiBeanValue::into_string, |inner| {
                inner.into_entries(ZiBeanValue::into_string, ZiBeanValue::into_i64)
            })
        })
        .unwrap();
    let counts = vec![("a".to_string(), 1), ("b".to_string(), 2)];
    assert_eq!(
        maps,
        vec![
            vec![("north".to_string(), counts.clone())],
            vec![("south".to_string(), counts)],
        ]
    );
}

/// Tests construction errors from the class registry.
#[test]
fn test_registry_errors() {
    let schema = ZiSchema::new(ZiSchemaObject::reference("Simple")).with_type(simple_type());
    let err = ZiBeanWriter::new(&schema, &ZiBeanRegistry::new()).err().unwrap();
    assert!(err.is_configuration());

    let partial = ZiBeanRegistry::new().with_class(ZiBeanClass::of::<Simple>("Simple").property(
        "intValue",
        |bean: &mut Simple, value| {
            bean.int_value = value.into_i32()?;
            Ok(())
        },
    ));
    let err = ZiBeanWriter::new(&schema, &partial).err().unwrap();
    assert!(err.is_mapping());
    assert!(err.to_string().contains("/stringValue"));
}

/// Tests mapping errors raised while writing.
#[test]
fn test_write_errors() {
    let schema = ZiSchema::new(ZiSchemaObject::reference("Simple")).with_type(simple_type());
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();

    assert!(writer.write_start_node("simple").unwrap_err().is_mapping());
    writer.write_start_tree().unwrap();
    writer.write_start_node("simple").unwrap();
    assert!(writer.write_start_node("unknown").unwrap_err().is_mapping());
    assert!(writer.write_leaf(&ZiScalar::from("x")).unwrap_err().is_mapping());

    writer.write_start_node("intValue").unwrap();
    let err = writer.write_leaf(&ZiScalar::from("not a number")).unwrap_err();
    assert!(err.is_mapping());
    assert!(writer.write_start_node("nested").unwrap_err().is_mapping());
}

/// Tests that flush delivers the completed root to the collector.
#[test]
fn test_flush_to_collector() {
    let schema = ZiSchema::new(ZiSchemaObject::reference("Simple")).with_type(simple_type());
    let registry = registry();
    let mut writer = ZiBeanWriter::new(&schema, &registry).unwrap();
    let output = collector();
    writer.set_target(output.clone()).unwrap();

    writer.write_start_tree().unwrap();
    writer.write_start_node("simple").unwrap();
    simple_fields(&mut writer, 7, "seven");
    writer.write_end_node("simple").unwrap();
    writer.write_end_tree().unwrap();
    writer.flush().unwrap();
    writer.flush().unwrap();

    let mut delivered = output.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    let bean = std::mem::replace(&mut delivered[0], ZiBeanValue::Null);
    assert_eq!(bean.into_object::<Simple>().unwrap(), simple(7, "seven"));
}
