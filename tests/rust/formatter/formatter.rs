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

//! # ZiTree Formatter Tests
//!
//! Tests for pass orchestration: complete documents, partitioned writes
//! split into header, partition and footer passes, init validation and the
//! formatter lifecycle.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test formatter
//! ```

use std::sync::Arc;

use serde_json::json;
use zitree::{
    collector, ZiCachedPortData, ZiCompileOptions, ZiFieldType, ZiFormatterConfig, ZiMapWriter,
    ZiMappingCompiler, ZiMappingDesign, ZiRecord, ZiRecordMetadata, ZiRecordSet, ZiSharedBuffer,
    ZiStreamConfig, ZiStreamFormat, ZiStreamTreeWriter, ZiStreamingPortData, ZiTreeFormatter,
    ZiWritableMapping,
};

fn metadata() -> Vec<Arc<ZiRecordMetadata>> {
    vec![
        Arc::new(
            ZiRecordMetadata::new("parent")
                .with_field("key", ZiFieldType::String)
                .with_field("label", ZiFieldType::String),
        ),
        Arc::new(
            ZiRecordMetadata::new("child")
                .with_field("parent", ZiFieldType::String)
                .with_field("name", ZiFieldType::String),
        ),
    ]
}

fn parents() -> Vec<ZiRecord> {
    let meta = metadata();
    vec![
        ZiRecord::from_json(meta[0].clone(), &json!({"key": "A", "label": "first"})).unwrap(),
        ZiRecord::from_json(meta[0].clone(), &json!({"key": "B", "label": "second"})).unwrap(),
    ]
}

fn children() -> Vec<ZiRecord> {
    let meta = metadata();
    vec![
        ZiRecord::from_json(meta[1].clone(), &json!({"parent": "A", "name": "AAA"})).unwrap(),
        ZiRecord::from_json(meta[1].clone(), &json!({"parent": "B", "name": "BBB"})).unwrap(),
    ]
}

fn compile_with(design: serde_json::Value, options: ZiCompileOptions) -> Arc<ZiWritableMapping> {
    let meta = metadata();
    let design = ZiMappingDesign::from_json(&design).unwrap();
    Arc::new(
        ZiMappingCompiler::new(&meta)
            .with_options(options)
            .compile(&design)
            .unwrap(),
    )
}

fn compile(design: serde_json::Value) -> Arc<ZiWritableMapping> {
    compile_with(design, ZiCompileOptions::default())
}

fn joined_design() -> serde_json::Value {
    json!({"children": [{
        "kind": "element",
        "name": "parents",
        "children": [{
            "kind": "element",
            "name": "parent",
            "relation": {"port": "parent"},
            "attributes": [{"name": "key", "value": "$parent.key"}],
            "children": [{
                "kind": "element",
                "name": "child",
                "relation": {"port": "child", "key": "parent", "parent_key": "key"},
                "children": [{"kind": "value", "value": "$child.name"}]
            }]
        }]
    }]})
}

fn catalog_design() -> serde_json::Value {
    json!({"children": [{
        "kind": "element",
        "name": "catalog",
        "children": [
            {"kind": "element", "name": "title", "children": [{"kind": "value", "value": "Parts"}]},
            {
                "kind": "collection",
                "name": "items",
                "partition": true,
                "relation": {"port": "parent"},
                "children": [{
                    "kind": "element",
                    "name": "item",
                    "attributes": [{"name": "id", "value": "$parent.key"}],
                    "children": [{"kind": "value", "value": "$parent.label"}]
                }]
            },
            {"kind": "element", "name": "end", "children": [{"kind": "value", "value": "done"}]}
        ]
    }]})
}

const CATALOG_XML: &str = concat!(
    "<catalog><title>Parts</title>",
    "<item id=\"A\">first</item><item id=\"B\">second</item>",
    "<end>done</end></catalog>"
);

fn stream_formatter(
    mapping: Arc<ZiWritableMapping>,
    format: ZiStreamFormat,
) -> (ZiTreeFormatter<ZiStreamTreeWriter>, ZiSharedBuffer) {
    let writer = ZiStreamTreeWriter::new(ZiStreamConfig::default().with_format(format));
    let mut formatter = ZiTreeFormatter::new(mapping, writer, ZiFormatterConfig::default());
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(children())));
    formatter.init(&metadata()).unwrap();
    let buffer = ZiSharedBuffer::new();
    formatter.set_target(Box::new(buffer.clone())).unwrap();
    (formatter, buffer)
}

/// Tests complete documents delivered through the map backend.
#[test]
fn test_write_documents_to_collector() {
    let output = collector();
    let mut formatter = ZiTreeFormatter::new(
        compile(joined_design()),
        ZiMapWriter::new(),
        ZiFormatterConfig::default(),
    );
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(children())));
    formatter.init(&metadata()).unwrap();
    formatter.set_target(output.clone()).unwrap();

    formatter.write(&ZiRecordSet::new()).unwrap();
    formatter.write(&ZiRecordSet::new()).unwrap();
    assert_eq!(formatter.writer().results().len(), 2);
    formatter.close().unwrap();

    let document = json!({"parent": [
        {"key": "A", "child": "AAA"},
        {"key": "B", "child": "BBB"}
    ]});
    assert_eq!(*output.lock().unwrap(), vec![document.clone(), document]);
    assert_eq!(formatter.stats().documents, 2);
    assert_eq!(formatter.stats().flushes, 1);
}

/// Tests that header, partition and footer passes reproduce a single pass.
#[test]
fn test_partition_passes_match_single_pass() {
    let (mut whole, whole_buffer) = stream_formatter(compile(catalog_design()), ZiStreamFormat::Xml);
    whole.write(&ZiRecordSet::new()).unwrap();
    assert_eq!(whole_buffer.contents(), CATALOG_XML);

    let (mut split, buffer) = stream_formatter(compile(catalog_design()), ZiStreamFormat::Xml);
    split.write_header(&ZiRecordSet::new()).unwrap();
    assert_eq!(buffer.contents(), "<catalog><title>Parts</title>");
    split.write_partition(&ZiRecordSet::new()).unwrap();
    split.write_footer(&ZiRecordSet::new()).unwrap();
    assert_eq!(buffer.contents(), CATALOG_XML);
    assert_eq!(split.stats().partition_passes, 3);
    assert_eq!(split.stats().documents, 0);
}

/// Tests partition passes driven one record at a time.
///
/// A record placed on the partition port is written as the only item of
/// its pass.
#[test]
fn test_externally_driven_partition() {
    let (mut formatter, buffer) = stream_formatter(compile(catalog_design()), ZiStreamFormat::Xml);
    formatter.write_header(&ZiRecordSet::new()).unwrap();
    for parent in parents() {
        formatter
            .write_partition(&ZiRecordSet::new().with_record(0, parent))
            .unwrap();
        formatter.flush().unwrap();
    }
    formatter.write_footer(&ZiRecordSet::new()).unwrap();
    assert_eq!(buffer.contents(), CATALOG_XML);
    assert_eq!(formatter.stats().partition_passes, 4);
    assert_eq!(formatter.stats().flushes, 2);
}

/// Tests partitioned JSON output against a single pass.
#[test]
fn test_partitioned_json() {
    let (mut whole, whole_buffer) = stream_formatter(compile(catalog_design()), ZiStreamFormat::Json);
    whole.write(&ZiRecordSet::new()).unwrap();

    let (mut split, buffer) = stream_formatter(compile(catalog_design()), ZiStreamFormat::Json);
    split.write_header(&ZiRecordSet::new()).unwrap();
    split.write_partition(&ZiRecordSet::new()).unwrap();
    split.write_footer(&ZiRecordSet::new()).unwrap();

    assert_eq!(buffer.contents(), whole_buffer.contents());
    let parsed: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
    assert_eq!(
        parsed,
        json!({"catalog": {
            "title": "Parts",
            "items": [{"id": "A", "value": "first"}, {"id": "B", "value": "second"}],
            "end": "done"
        }})
    );
}

/// Tests a partitioned document built by the map backend.
#[test]
fn test_partitioned_map_document() {
    let output = collector();
    let mut formatter = ZiTreeFormatter::new(
        compile(catalog_design()),
        ZiMapWriter::new(),
        ZiFormatterConfig::default().with_partitioned(true),
    );
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    formatter.init(&metadata()).unwrap();
    formatter.set_target(output.clone()).unwrap();

    formatter.write_header(&ZiRecordSet::new()).unwrap();
    formatter.write_partition(&ZiRecordSet::new()).unwrap();
    formatter.write_footer(&ZiRecordSet::new()).unwrap();
    formatter.flush().unwrap();

    assert_eq!(
        *output.lock().unwrap(),
        vec![json!({
            "title": "Parts",
            "items": [{"id": "A", "value": "first"}, {"id": "B", "value": "second"}],
            "end": "done"
        })]
    );
}

/// Tests a partition resolved to the first bound element.
#[test]
fn test_resolved_partition_matches_single_pass() {
    let options = ZiCompileOptions::from_json(&json!({"resolve_partition": true}));
    let mapping = compile_with(joined_design(), options);
    assert!(mapping.partition().is_some());

    let (mut formatter, buffer) = stream_formatter(mapping, ZiStreamFormat::Xml);
    formatter.write_header(&ZiRecordSet::new()).unwrap();
    formatter.write_partition(&ZiRecordSet::new()).unwrap();
    formatter.write_footer(&ZiRecordSet::new()).unwrap();
    assert_eq!(
        buffer.contents(),
        concat!(
            "<parents>",
            "<parent key=\"A\"><child>AAA</child></parent>",
            "<parent key=\"B\"><child>BBB</child></parent>",
            "</parents>"
        )
    );
}

/// Tests configuration errors reported by init.
#[test]
fn test_init_errors() {
    let partitioned = ZiFormatterConfig::default().with_partitioned(true);
    let mut formatter = ZiTreeFormatter::new(compile(joined_design()), ZiMapWriter::new(), partitioned);
    assert!(formatter.init(&metadata()).unwrap_err().is_configuration());

    let mut formatter = ZiTreeFormatter::new(
        compile(joined_design()),
        ZiMapWriter::new(),
        ZiFormatterConfig::default(),
    );
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    let err = formatter.init(&metadata()).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("port 1"));

    formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(children())));
    let narrow = vec![
        metadata()[0].clone(),
        Arc::new(ZiRecordMetadata::new("child").with_field("parent", ZiFieldType::String)),
    ];
    assert!(formatter.init(&narrow).unwrap_err().is_configuration());
    assert!(formatter.init(&metadata()[..1]).unwrap_err().is_configuration());
}

/// Tests that disabling port validation skips the field checks.
#[test]
fn test_init_without_validation() {
    let mut formatter = ZiTreeFormatter::new(
        compile(joined_design()),
        ZiMapWriter::new(),
        ZiFormatterConfig::default().with_validate_ports(false),
    );
    let narrow = vec![
        metadata()[0].clone(),
        Arc::new(ZiRecordMetadata::new("child").with_field("parent", ZiFieldType::String)),
    ];
    formatter.init(&narrow).unwrap();
}

/// Tests use before init, partition calls without a partition and close.
#[test]
fn test_lifecycle() {
    let mut formatter = ZiTreeFormatter::new(
        compile(joined_design()),
        ZiMapWriter::new(),
        ZiFormatterConfig::default(),
    );
    assert!(formatter.write(&ZiRecordSet::new()).unwrap_err().is_configuration());

    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(children())));
    formatter.init(&metadata()).unwrap();
    assert!(formatter.write_header(&ZiRecordSet::new()).unwrap_err().is_configuration());

    formatter.close().unwrap();
    formatter.close().unwrap();
    formatter.flush().unwrap();
    assert_eq!(formatter.stats().flushes, 1);
    assert!(formatter.write(&ZiRecordSet::new()).unwrap_err().is_configuration());
}

/// Tests loading the formatter configuration from JSON.
#[test]
fn test_formatter_config_from_json() {
    let config = ZiFormatterConfig::from_json(&json!({"partitioned": true, "validate_ports": "yes"}));
    assert!(config.partitioned);
    assert!(config.validate_ports);

    let config = ZiFormatterConfig::from_json(&json!({"validate_ports": false}));
    assert!(!config.partitioned);
    assert!(!config.validate_ports);
}

fn record(meta: &Arc<ZiRecordMetadata>, payload: serde_json::Value) -> ZiRecord {
    ZiRecord::from_json(meta.clone(), &payload).unwrap()
}

/// Tests a three level join whose innermost port is streamed.
///
/// The last parent under each grand record has no following parent to look
/// at, so its child group lookup runs without a next key; the children of
/// the parents under the next grand record must still be written.
#[test]
fn test_three_level_join_with_streamed_children() {
    let meta = vec![
        Arc::new(ZiRecordMetadata::new("grand").with_field("id", ZiFieldType::String)),
        Arc::new(
            ZiRecordMetadata::new("parent")
                .with_field("key", ZiFieldType::String)
                .with_field("grand", ZiFieldType::String),
        ),
        Arc::new(
            ZiRecordMetadata::new("child")
                .with_field("parent", ZiFieldType::String)
                .with_field("name", ZiFieldType::String),
        ),
    ];
    let design = ZiMappingDesign::from_json(&json!({"children": [{
        "kind": "element",
        "name": "root",
        "children": [{
            "kind": "element",
            "name": "g",
            "relation": {"port": "grand"},
            "attributes": [{"name": "id", "value": "$grand.id"}],
            "children": [{
                "kind": "element",
                "name": "p",
                "relation": {"port": "parent", "key": "grand", "parent_key": "id"},
                "attributes": [{"name": "k", "value": "$parent.key"}],
                "children": [{
                    "kind": "element",
                    "name": "c",
                    "relation": {"port": "child", "key": "parent", "parent_key": "key"},
                    "children": [{"kind": "value", "value": "$child.name"}]
                }]
            }]
        }]
    }]}))
    .unwrap();
    let mapping = Arc::new(ZiMappingCompiler::new(&meta).compile(&design).unwrap());

    let grands = vec![record(&meta[0], json!({"id": "G1"})), record(&meta[0], json!({"id": "G2"}))];
    let parents = vec![
        record(&meta[1], json!({"key": "A", "grand": "G1"})),
        record(&meta[1], json!({"key": "B", "grand": "G2"})),
        record(&meta[1], json!({"key": "C", "grand": "G2"})),
    ];
    let children = vec![
        record(&meta[2], json!({"parent": "B", "name": "b1"})),
        record(&meta[2], json!({"parent": "B", "name": "b2"})),
        record(&meta[2], json!({"parent": "C", "name": "c1"})),
    ];

    let writer = ZiStreamTreeWriter::new(ZiStreamConfig::default());
    let mut formatter = ZiTreeFormatter::new(mapping, writer, ZiFormatterConfig::default());
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(grands)));
    formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(parents)));
    formatter.add_port_data(2, Box::new(ZiStreamingPortData::new(children)));
    formatter.init(&meta).unwrap();
    let buffer = ZiSharedBuffer::new();
    formatter.set_target(Box::new(buffer.clone())).unwrap();
    formatter.write(&ZiRecordSet::new()).unwrap();

    assert_eq!(
        buffer.contents(),
        concat!(
            "<root>",
            "<g id=\"G1\"><p k=\"A\"/></g>",
            "<g id=\"G2\"><p k=\"B\"><c>b1</c><c>b2</c></p><p k=\"C\"><c>c1</c></p></g>",
            "</root>"
        )
    );
}

/// Tests streamed children of parents supplied one pass at a time.
///
/// Each parent arrives on its own partition pass, so no following parent is
/// known while its children are read; a parent without children must leave
/// the next parent's children in place.
#[test]
fn test_streamed_children_of_externally_driven_parents() {
    let options = ZiCompileOptions::default().with_resolve_partition(true);
    let mapping = compile_with(joined_design(), options);
    let meta = metadata();
    let children = vec![
        record(&meta[1], json!({"parent": "B", "name": "b1"})),
        record(&meta[1], json!({"parent": "B", "name": "b2"})),
    ];

    let writer = ZiStreamTreeWriter::new(ZiStreamConfig::default());
    let mut formatter = ZiTreeFormatter::new(mapping, writer, ZiFormatterConfig::default().with_partitioned(true));
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    formatter.add_port_data(1, Box::new(ZiStreamingPortData::new(children)));
    formatter.init(&meta).unwrap();
    let buffer = ZiSharedBuffer::new();
    formatter.set_target(Box::new(buffer.clone())).unwrap();

    formatter.write_header(&ZiRecordSet::new()).unwrap();
    for parent in parents() {
        formatter
            .write_partition(&ZiRecordSet::new().with_record(0, parent))
            .unwrap();
    }
    formatter.write_footer(&ZiRecordSet::new()).unwrap();
    assert_eq!(
        buffer.contents(),
        concat!(
            "<parents>",
            "<parent key=\"A\"/>",
            "<parent key=\"B\"><child>b1</child><child>b2</child></parent>",
            "</parents>"
        )
    );
}

/// Tests that init checks the fields read by relation filters.
#[test]
fn test_init_checks_filter_fields() {
    let mut design = joined_design();
    let element = &mut design["children"][0]["children"][0]["children"][0];
    element["relation"]["filter"] = json!("$child.name != 'BBB'");
    element["children"][0]["value"] = json!("$child.parent");

    let mut formatter = ZiTreeFormatter::new(compile(design), ZiMapWriter::new(), ZiFormatterConfig::default());
    formatter.add_port_data(0, Box::new(ZiCachedPortData::from_records(parents())));
    formatter.add_port_data(1, Box::new(ZiCachedPortData::from_records(children())));
    let narrow = vec![
        metadata()[0].clone(),
        Arc::new(ZiRecordMetadata::new("child").with_field("parent", ZiFieldType::String)),
    ];
    let err = formatter.init(&narrow).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("filter field 1"));
    formatter.init(&metadata()).unwrap();
}

