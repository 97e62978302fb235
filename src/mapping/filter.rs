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

//! # Record Filters
//!
//! Predicates deciding whether a child record produced by a port binding
//! contributes to the document. A filter sees the whole [`ZiRecordSet`] with
//! the candidate child already placed in its port slot, so it may compare the
//! child against any ancestor record.
//!
//! Filters report failures through `anyhow`; the binding wraps them with
//! [`crate::errors::ZiError::record_filter`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::errors::{Result, ZiError};
use crate::record::{ZiRecordSet, ZiScalar};

/// Predicate over the assembled record context.
pub trait ZiRecordFilter: Send + Sync {
    fn accept(&self, records: &ZiRecordSet) -> anyhow::Result<bool>;

    /// Fields read by the filter as `(port, field)` pairs, when known.
    fn references(&self) -> Vec<(usize, usize)> {
        Vec::new()
    }
}

/// Filter backed by a closure.
pub struct ZiFnFilter<F> {
    predicate: F,
}

impl<F> ZiFnFilter<F>
where
    F: Fn(&ZiRecordSet) -> anyhow::Result<bool> + Send + Sync,
{
    #[allow(non_snake_case)]
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> ZiRecordFilter for ZiFnFilter<F>
where
    F: Fn(&ZiRecordSet) -> anyhow::Result<bool> + Send + Sync,
{
    fn accept(&self, records: &ZiRecordSet) -> anyhow::Result<bool> {
        (self.predicate)(records)
    }
}

/// Comparison operator of an expression clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiCompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ZiCompareOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "==" => ZiCompareOp::Eq,
            "!=" => ZiCompareOp::Ne,
            "<" => ZiCompareOp::Lt,
            "<=" => ZiCompareOp::Le,
            ">" => ZiCompareOp::Gt,
            ">=" => ZiCompareOp::Ge,
            _ => return None,
        })
    }

    fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (ZiCompareOp::Ne, None) => true,
            (_, None) => false,
            (ZiCompareOp::Eq, Some(ord)) => ord == Ordering::Equal,
            (ZiCompareOp::Ne, Some(ord)) => ord != Ordering::Equal,
            (ZiCompareOp::Lt, Some(ord)) => ord == Ordering::Less,
            (ZiCompareOp::Le, Some(ord)) => ord != Ordering::Greater,
            (ZiCompareOp::Gt, Some(ord)) => ord == Ordering::Greater,
            (ZiCompareOp::Ge, Some(ord)) => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for ZiCompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZiCompareOp::Eq => "==",
            ZiCompareOp::Ne => "!=",
            ZiCompareOp::Lt => "<",
            ZiCompareOp::Le => "<=",
            ZiCompareOp::Gt => ">",
            ZiCompareOp::Ge => ">=",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
struct ZiClause {
    port: usize,
    field: usize,
    op: ZiCompareOp,
    literal: ZiScalar,
}

/// Conjunction of `$port.field OP literal` comparisons joined by `&&`.
#[derive(Clone, Debug, PartialEq)]
pub struct ZiExpressionFilter {
    expression: String,
    clauses: Vec<ZiClause>,
}

fn clause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\$([A-Za-z0-9_]+)\.([A-Za-z_][A-Za-z0-9_]*)\s*(==|!=|<=|>=|<|>)\s*(.+?)\s*$")
            .expect("filter clause pattern")
    })
}

impl ZiExpressionFilter {
    /// Parses `expression`, resolving each `$port.field` through `resolve`.
    #[allow(non_snake_case)]
    pub fn parse<R>(expression: &str, resolve: R) -> Result<Self>
    where
        R: Fn(&str, &str) -> Result<(usize, usize)>,
    {
        let mut clauses = Vec::new();
        for part in split_clauses(expression) {
            let captures = clause_pattern().captures(part).ok_or_else(|| {
                ZiError::configuration(format!("malformed filter clause '{}'", part.trim()))
            })?;
            let (port, field) = resolve(&captures[1], &captures[2])?;
            let op = ZiCompareOp::parse(&captures[3]).ok_or_else(|| {
                ZiError::configuration(format!("unknown operator '{}'", &captures[3]))
            })?;
            clauses.push(ZiClause {
                port,
                field,
                op,
                literal: parse_literal(&captures[4])?,
            });
        }
        Ok(Self {
            expression: expression.trim().to_string(),
            clauses,
        })
    }
}

impl fmt::Display for ZiExpressionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Splits on `&&` outside quoted literals.
fn split_clauses(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut start = 0;
    let mut chars = expression.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '&') if matches!(chars.peek(), Some((_, '&'))) => {
                parts.push(&expression[start..index]);
                chars.next();
                start = index + 2;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

impl ZiRecordFilter for ZiExpressionFilter {
    fn accept(&self, records: &ZiRecordSet) -> anyhow::Result<bool> {
        for clause in &self.clauses {
            let record = records
                .get(clause.port)
                .ok_or_else(|| anyhow!("no active record on port {}", clause.port))?;
            let Some(value) = record.field(clause.field) else {
                bail!(
                    "record '{}' has no field #{}",
                    record.metadata().name,
                    clause.field
                );
            };
            if !clause.op.holds(compare(value, &clause.literal)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn references(&self) -> Vec<(usize, usize)> {
        self.clauses.iter().map(|clause| (clause.port, clause.field)).collect()
    }
}

fn compare(value: &ZiScalar, literal: &ZiScalar) -> Option<Ordering> {
    match (value, literal) {
        (ZiScalar::Date(date), ZiScalar::String(text)) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|other| date.cmp(&other.with_timezone(&Utc))),
        _ => value.compare(literal),
    }
}

fn parse_literal(token: &str) -> Result<ZiScalar> {
    let quoted = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| token.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')));
    if let Some(text) = quoted {
        return Ok(ZiScalar::String(text.to_string()));
    }
    match token {
        "true" => return Ok(ZiScalar::Boolean(true)),
        "false" => return Ok(ZiScalar::Boolean(false)),
        "null" => return Ok(ZiScalar::Null),
        _ => {}
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(ZiScalar::Integer(value));
    }
    token
        .parse::<f64>()
        .map(ZiScalar::Number)
        .map_err(|_| ZiError::configuration(format!("unsupported filter literal '{token}'")))
}
