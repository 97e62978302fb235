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

//! # XML Serializer
//!
//! Event-to-text rendering for the streaming backend. Start tags stay open
//! until the first child, text or end event so that attributes and namespace
//! declarations can still be added; an element that receives nothing else is
//! closed as `<name/>`. Collections produce no markup of their own.

use crate::errors::{Result, ZiError};
use crate::record::ZiScalar;
use crate::writer::stream::ZiTreeSerializer;

/// XML rendering of tree events.
#[derive(Debug, Default)]
pub struct ZiXmlSerializer {
    declaration: Option<String>,
    open_tag: bool,
}

impl ZiXmlSerializer {
    /// `declaration` is the encoding to announce, `None` for no declaration.
    #[allow(non_snake_case)]
    pub fn new(declaration: Option<String>) -> Self {
        Self {
            declaration,
            open_tag: false,
        }
    }

    fn close_start_tag(&mut self, out: &mut String) {
        if self.open_tag {
            out.push('>');
            self.open_tag = false;
        }
    }

    fn require_open_tag(&self, what: &str, name: &str) -> Result<()> {
        if self.open_tag {
            Ok(())
        } else {
            Err(ZiError::mapping(
                name,
                format!("{what} written after element content"),
            ))
        }
    }
}

impl ZiTreeSerializer for ZiXmlSerializer {
    fn start_document(&mut self, out: &mut String) -> Result<()> {
        self.open_tag = false;
        if let Some(encoding) = &self.declaration {
            out.push_str("<?xml version=\"1.0\" encoding=\"");
            out.push_str(&escape_attribute(encoding));
            out.push_str("\"?>");
        }
        Ok(())
    }

    fn end_document(&mut self, out: &mut String) -> Result<()> {
        self.close_start_tag(out);
        Ok(())
    }

    fn start_node(&mut self, name: &str, out: &mut String) -> Result<()> {
        self.close_start_tag(out);
        out.push('<');
        out.push_str(name);
        self.open_tag = true;
        Ok(())
    }

    fn end_node(&mut self, name: &str, out: &mut String) -> Result<()> {
        if self.open_tag {
            out.push_str("/>");
            self.open_tag = false;
        } else {
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Ok(())
    }

    fn start_collection(&mut self, _name: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn end_collection(&mut self, _name: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &ZiScalar, out: &mut String) -> Result<()> {
        self.require_open_tag("attribute", name)?;
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(&value.to_text()));
        out.push('"');
        Ok(())
    }

    fn namespace(&mut self, prefix: &str, uri: &str, out: &mut String) -> Result<()> {
        self.require_open_tag("namespace declaration", prefix)?;
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_attribute(uri));
        out.push('"');
        Ok(())
    }

    fn text(&mut self, value: &ZiScalar, out: &mut String) -> Result<()> {
        self.close_start_tag(out);
        out.push_str(&escape_text(&value.to_text()));
        Ok(())
    }

    fn cdata(&mut self, value: &ZiScalar, out: &mut String) -> Result<()> {
        self.close_start_tag(out);
        out.push_str("<![CDATA[");
        out.push_str(&value.to_text().replace("]]>", "]]]]><![CDATA[>"));
        out.push_str("]]>");
        Ok(())
    }
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_attribute(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\t' => escaped.push_str("&#9;"),
            other => escaped.push(other),
        }
    }
    escaped
}
