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

//! # ZiTree Writer Tests - Streaming
//!
//! Tests for the streaming backend with its XML and JSON serializers.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test stream
//! ```

use std::fs::File;

use serde_json::json;
use zitree::{
    ZiScalar, ZiSharedBuffer, ZiStreamConfig, ZiStreamFormat, ZiStreamTreeWriter, ZiTargetWriter,
    ZiTreeWriter,
};

fn bound(config: ZiStreamConfig) -> (ZiStreamTreeWriter, ZiSharedBuffer) {
    let buffer = ZiSharedBuffer::new();
    let mut writer = ZiStreamTreeWriter::new(config);
    writer.set_target(Box::new(buffer.clone())).unwrap();
    (writer, buffer)
}

/// Writes `<catalog xmlns="urn:c"><book id="1">Dune & co</book><empty/></catalog>`
/// as events.
fn write_catalog(writer: &mut dyn ZiTreeWriter) -> zitree::Result<()> {
    writer.write_start_tree()?;
    writer.write_start_node("catalog")?;
    writer.write_namespace("", "urn:c")?;
    writer.write_start_collection("books")?;
    writer.write_start_node("book")?;
    writer.write_attribute("id", &ZiScalar::from(1i64))?;
    writer.write_leaf(&ZiScalar::from("Dune & co"))?;
    writer.write_end_node("book")?;
    writer.write_end_collection("books")?;
    writer.write_start_node("empty")?;
    writer.write_end_node("empty")?;
    writer.write_end_node("catalog")?;
    writer.write_end_tree()
}

/// Tests XML rendering of nodes, attributes, namespaces and text.
#[test]
fn test_xml_document() {
    let (mut writer, buffer) = bound(ZiStreamConfig::default());
    write_catalog(&mut writer).unwrap();
    assert_eq!(
        buffer.contents(),
        "<catalog xmlns=\"urn:c\"><book id=\"1\">Dune &amp; co</book><empty/></catalog>"
    );

    let stats = writer.stats();
    assert_eq!(stats.nodes_written, 4);
    assert_eq!(stats.leaves_written, 2);
    assert_eq!(stats.bytes_written, buffer.contents().len());
}

/// Tests the XML declaration and auto flush.
#[test]
fn test_xml_declaration() {
    let config = ZiStreamConfig::default()
        .with_xml_declaration(true)
        .with_encoding("ISO-8859-2")
        .with_auto_flush(true);
    let (mut writer, buffer) = bound(config);
    writer.write_start_tree().unwrap();
    writer.write_start_node("a").unwrap();
    writer.write_end_node("a").unwrap();
    writer.write_end_tree().unwrap();
    assert_eq!(buffer.contents(), "<?xml version=\"1.0\" encoding=\"ISO-8859-2\"?><a/>");
    assert_eq!(writer.stats().flushes, 1);
}

/// Tests that attributes are rejected once element content started.
#[test]
fn test_xml_attribute_after_content() {
    let (mut writer, _buffer) = bound(ZiStreamConfig::default());
    writer.write_start_tree().unwrap();
    writer.write_start_node("a").unwrap();
    writer.write_leaf(&ZiScalar::from("text")).unwrap();
    let err = writer.write_attribute("late", &ZiScalar::from("x")).unwrap_err();
    assert!(err.is_mapping());
}

/// Tests that an open start tag survives a flush between passes.
#[test]
fn test_xml_open_tag_across_flush() {
    let (mut writer, buffer) = bound(ZiStreamConfig::default());
    writer.write_start_tree().unwrap();
    writer.write_start_node("root").unwrap();
    writer.write_attribute("n", &ZiScalar::from(2i64)).unwrap();
    writer.flush().unwrap();
    assert_eq!(buffer.contents(), "<root n=\"2\"");

    writer.write_start_node("item").unwrap();
    writer.write_end_node("item").unwrap();
    writer.write_end_node("root").unwrap();
    writer.write_end_tree().unwrap();
    assert_eq!(buffer.contents(), "<root n=\"2\"><item/></root>");
}

/// Tests JSON rendering of the same events.
///
/// Collections become arrays, attributes members and mixed text the
/// `value` member.
#[test]
fn test_json_document() {
    let (mut writer, buffer) = bound(ZiStreamConfig::default().with_format(ZiStreamFormat::Json));
    write_catalog(&mut writer).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
    assert_eq!(
        parsed,
        json!({"catalog": {"books": [{"id": 1, "value": "Dune & co"}], "empty": null}})
    );
}

/// Tests that writing without a bound sink fails.
#[test]
fn test_unbound_writer() {
    let mut writer = ZiStreamTreeWriter::new(ZiStreamConfig::default());
    assert!(!writer.is_bound());
    let err = writer.write_start_tree().unwrap_err();
    assert!(err.is_configuration());
}

/// Tests streaming into a file and closing twice.
#[test]
fn test_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xml");
    let mut writer = ZiStreamTreeWriter::new(ZiStreamConfig::default());
    writer.set_target(Box::new(File::create(&path).unwrap())).unwrap();
    write_catalog(&mut writer).unwrap();
    writer.close().unwrap();
    writer.close().unwrap();
    assert!(!writer.is_bound());

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("<catalog xmlns=\"urn:c\">"));
    assert!(written.ends_with("</catalog>"));
}

/// Tests loading the stream configuration from JSON.
#[test]
fn test_stream_config_from_json() {
    let config = ZiStreamConfig::from_json(&json!({
        "format": "JSON",
        "xml_declaration": true,
        "encoding": 5
    }));
    assert_eq!(config.format, ZiStreamFormat::Json);
    assert!(config.xml_declaration);
    assert_eq!(config.encoding, "UTF-8");
    assert!(!config.auto_flush);
}
