// Copyright 2024 shardq Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp::Ordering;
use std::fmt;

/// A column's declared storage type, as carried by `TableMeta::column_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Str,
}

impl ColumnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "str" => Some(Self::Str),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Str => "str",
        }
    }
}

/// `int64 | string`, per §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    pub fn type_of(&self) -> ColumnType {
        match self {
            Value::Int(_) => ColumnType::Int,
            Value::Str(_) => ColumnType::Str,
        }
    }

    /// Parses a cell typed by the declared column type, used by
    /// `insert_from_tsv` (§4.5).
    pub fn parse_typed(raw: &str, ty: ColumnType) -> Value {
        match ty {
            ColumnType::Int => Value::Int(raw.parse().unwrap_or_default()),
            ColumnType::Str => Value::Str(raw.to_string()),
        }
    }

    /// Triple-way compare for same-indexed variants, 0 (equal) for
    /// mixed-index comparisons, matching `compareVar` in §4.4.
    pub fn compare_var(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Per §3 / Open Question #4: `NE` is retained even though no parser path
/// in scope ever produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn eval(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }
}

/// Right-hand side of a predicate: either a literal or, inside join
/// predicates only, another qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredRhs {
    Literal(Value),
    Column(String),
}

/// `(left-column, op, right-value)`, per §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub left: String,
    pub op: CompareOp,
    pub right: PredRhs,
}

impl Predicate {
    pub fn new(left: impl Into<String>, op: CompareOp, right: PredRhs) -> Self {
        Self {
            left: left.into(),
            op,
            right,
        }
    }

    /// True if the right-hand side names another column (a join
    /// predicate), per the split in `build_select_stmt` (§4.2).
    pub fn is_join_pred(&self) -> bool {
        matches!(self.right, PredRhs::Column(_))
    }
}

/// Splits a qualified column name `T.c` on its first `.`; returns `("",
/// c)` for an unqualified name, per §3.
pub fn split_qualified(col: &str) -> (&str, &str) {
    match col.find('.') {
        Some(idx) => (&col[..idx], &col[idx + 1..]),
        None => ("", col),
    }
}

pub fn qualify(table: &str, col: &str) -> String {
    format!("{table}.{col}")
}

/// The unqualified part of a (possibly already-unqualified) column name.
pub fn unqualified(col: &str) -> &str {
    split_qualified(col).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_qualified_handles_missing_dot() {
        assert_eq!(split_qualified("id"), ("", "id"));
        assert_eq!(split_qualified("Orders.id"), ("Orders", "id"));
    }

    #[test]
    fn compare_var_is_zero_across_variants() {
        let i = Value::Int(1);
        let s = Value::Str("1".to_string());
        assert_eq!(i.compare_var(&s), Ordering::Equal);
    }

    #[test]
    fn compare_ops_eval() {
        assert!(CompareOp::Lt.eval(Ordering::Less));
        assert!(!CompareOp::Lt.eval(Ordering::Equal));
        assert!(CompareOp::Ge.eval(Ordering::Equal));
        assert!(CompareOp::Ne.eval(Ordering::Greater));
    }
}
