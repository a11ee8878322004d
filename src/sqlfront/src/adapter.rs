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
//
// Wraps `sqlparser` (any library returning a tagged AST is acceptable per
// §1) for the `SELECT` grammar, and normalizes its output into
// `SelectStmt`. `INSERT`/`DELETE` use a small whitespace-token grammar of
// their own — the same style as the catalog's DDL lines — since their
// shape here is narrow (`INSERT INTO t (cols) VALUES (...), ...` /
// `DELETE FROM t WHERE pred AND pred ...`) and not worth a second AST
// library dependency.

use shardq_catalog::DatabaseMeta;
use shardq_common::{
    qualify, split_qualified, ColumnType, CompareOp, PredRhs, Predicate, Result, ShardqError, Value,
};
use sqlparser::ast::{BinaryOperator, Expr as SqlExpr, Query, SelectItem, SetExpr, Statement, TableFactor, Value as SqlValue};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::stmt::{DeleteStmt, InsertStmt, SelectStmt};

/// The outcome of normalizing one line of input SQL.
pub enum Stmt {
    Select(SelectStmt),
    Insert(InsertStmt),
    Delete(DeleteStmt),
}

pub fn parse_statement(sql: &str, db: &DatabaseMeta) -> Result<Stmt> {
    let trimmed = sql.trim();
    let upper = trimmed.to_ascii_uppercase();
    if upper.starts_with("INSERT") {
        Ok(Stmt::Insert(build_insert_stmt(trimmed, db)?))
    } else if upper.starts_with("DELETE") {
        Ok(Stmt::Delete(build_delete_stmt(trimmed, db)?))
    } else {
        Ok(Stmt::Select(build_select_stmt(trimmed, db)?))
    }
}

fn table_names(query: &Query) -> Result<Vec<String>> {
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(ShardqError::parse("only flat SELECT bodies are supported"));
    };
    let mut names = Vec::new();
    for twj in &select.from {
        match &twj.relation {
            TableFactor::Table { name, .. } => names.push(name.to_string()),
            other => return Err(ShardqError::parse(format!("unsupported FROM item: {other}"))),
        }
    }
    if names.is_empty() {
        return Err(ShardqError::parse("SELECT requires at least one table"));
    }
    Ok(names)
}

/// Qualifies an unqualified column name with `default_table`, per §3 / §4.2.
fn qualify_default(col: &str, default_table: &str) -> String {
    let (q, c) = split_qualified(col);
    if q.is_empty() {
        qualify(default_table, c)
    } else {
        col.to_string()
    }
}

fn sql_ident_to_column(expr: &SqlExpr) -> Option<String> {
    match expr {
        SqlExpr::Identifier(id) => Some(id.value.clone()),
        SqlExpr::CompoundIdentifier(parts) => {
            Some(parts.iter().map(|p| p.value.as_str()).collect::<Vec<_>>().join("."))
        }
        _ => None,
    }
}

fn sql_literal_to_value(expr: &SqlExpr) -> Option<Value> {
    match expr {
        SqlExpr::Value(SqlValue::Number(n, _)) => n.parse::<i64>().ok().map(Value::Int),
        SqlExpr::Value(SqlValue::SingleQuotedString(s)) => Some(Value::Str(s.clone())),
        _ => None,
    }
}

fn binop_to_compare(op: &BinaryOperator) -> Option<CompareOp> {
    match op {
        BinaryOperator::Eq => Some(CompareOp::Eq),
        BinaryOperator::NotEq => Some(CompareOp::Ne),
        BinaryOperator::Lt => Some(CompareOp::Lt),
        BinaryOperator::LtEq => Some(CompareOp::Le),
        BinaryOperator::Gt => Some(CompareOp::Gt),
        BinaryOperator::GtEq => Some(CompareOp::Ge),
        _ => None,
    }
}

/// Splits the WHERE tree (a right-leaning AND spine) into join predicates
/// (right side is another column reference) and filter predicates
/// (everything else), qualifying bare column names against
/// `default_table` along the way. Per §4.2.
fn split_where(
    expr: &SqlExpr,
    default_table: &str,
    join_preds: &mut Vec<Predicate>,
    filter_preds: &mut Vec<Predicate>,
) -> Result<()> {
    match expr {
        SqlExpr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            split_where(left, default_table, join_preds, filter_preds)?;
            split_where(right, default_table, join_preds, filter_preds)
        }
        SqlExpr::BinaryOp { left, op, right } => {
            let Some(cmp) = binop_to_compare(op) else {
                return Err(ShardqError::parse(format!("unsupported operator: {op}")));
            };
            let Some(left_col) = sql_ident_to_column(left) else {
                return Err(ShardqError::parse("WHERE clause left side must be a column"));
            };
            let left_col = qualify_default(&left_col, default_table);
            if let Some(right_col) = sql_ident_to_column(right) {
                let right_col = qualify_default(&right_col, default_table);
                join_preds.push(Predicate::new(left_col, cmp, PredRhs::Column(right_col)));
            } else if let Some(value) = sql_literal_to_value(right) {
                filter_preds.push(Predicate::new(left_col, cmp, PredRhs::Literal(value)));
            } else {
                return Err(ShardqError::parse("unsupported WHERE right-hand side"));
            }
            Ok(())
        }
        other => Err(ShardqError::parse(format!("unsupported WHERE expression: {other}"))),
    }
}

pub fn build_select_stmt(sql: &str, db: &DatabaseMeta) -> Result<SelectStmt> {
    let mut stmts =
        Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| ShardqError::parse(e))?;
    if stmts.len() != 1 {
        return Err(ShardqError::parse("expected exactly one statement"));
    }
    let Statement::Query(query) = stmts.remove(0) else {
        return Err(ShardqError::parse("expected a SELECT statement"));
    };

    let tables = table_names(&query)?;
    let default_table = tables[0].clone();

    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(ShardqError::parse("only flat SELECT bodies are supported"));
    };

    let mut projected_cols = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => {
                for t in &tables {
                    let cols = db
                        .tables
                        .get(t)
                        .ok_or_else(|| ShardqError::catalog(format!("unknown table {t}")))?
                        .columns
                        .clone();
                    projected_cols.extend(cols.into_iter().map(|c| qualify(t, &c)));
                }
            }
            SelectItem::UnnamedExpr(expr) => {
                let col = sql_ident_to_column(expr)
                    .ok_or_else(|| ShardqError::parse("projection item must be a column"))?;
                projected_cols.push(qualify_default(&col, &default_table));
            }
            other => return Err(ShardqError::parse(format!("unsupported projection item: {other}"))),
        }
    }

    let mut join_preds = Vec::new();
    let mut filter_preds = Vec::new();
    if let Some(selection) = &select.selection {
        split_where(selection, &default_table, &mut join_preds, &mut filter_preds)?;
    }

    Ok(SelectStmt {
        tables,
        projected_cols,
        join_preds,
        filter_preds,
    })
}

/// Splits top-level commas, respecting parenthesis nesting and quoted
/// strings — used to tokenize `INSERT`'s column list and value tuples.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut cur = String::new();
    for ch in s.chars() {
        match ch {
            '\'' => {
                in_quotes = !in_quotes;
                cur.push(ch);
            }
            '(' if !in_quotes => {
                depth += 1;
                cur.push(ch);
            }
            ')' if !in_quotes => {
                depth -= 1;
                cur.push(ch);
            }
            c if c == sep && depth == 0 && !in_quotes => {
                out.push(cur.trim().to_string());
                cur.clear();
            }
            c => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur.trim().to_string());
    }
    out
}

fn parse_literal(tok: &str, ty: ColumnType) -> Value {
    let tok = tok.trim();
    if let Some(stripped) = tok.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::Str(stripped.to_string());
    }
    Value::parse_typed(tok, ty)
}

fn build_insert_stmt(sql: &str, db: &DatabaseMeta) -> Result<InsertStmt> {
    let rest = sql[6..].trim(); // strip "INSERT"
    let rest = rest
        .strip_prefix("INTO")
        .or_else(|| rest.strip_prefix("into"))
        .ok_or_else(|| ShardqError::parse("expected INSERT INTO"))?
        .trim();

    let values_idx = rest
        .to_ascii_uppercase()
        .find("VALUES")
        .ok_or_else(|| ShardqError::parse("INSERT requires VALUES"))?;
    let head = rest[..values_idx].trim();
    let values_part = rest[values_idx + "VALUES".len()..].trim().trim_end_matches(';');

    let (table, col_list) = match head.find('(') {
        Some(idx) => {
            let table = head[..idx].trim().to_string();
            let cols_str = head[idx + 1..]
                .trim_end()
                .trim_end_matches(')')
                .to_string();
            let cols = split_top_level(&cols_str, ',');
            (table, Some(cols))
        }
        None => (head.to_string(), None),
    };

    let table_meta = db
        .tables
        .get(&table)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table {table}")))?;
    let cols = col_list.unwrap_or_else(|| table_meta.columns.clone());
    let col_types: Vec<ColumnType> = cols
        .iter()
        .map(|c| table_meta.column_type.get(c).copied().unwrap_or(ColumnType::Str))
        .collect();

    let mut rows = Vec::new();
    for tuple in split_top_level(values_part, ',') {
        let tuple = tuple.trim();
        let inner = tuple
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| ShardqError::parse("expected a parenthesized value tuple"))?;
        let cells = split_top_level(inner, ',');
        if cells.len() != cols.len() {
            return Err(ShardqError::parse("column count mismatch in INSERT row"));
        }
        let row = cells
            .iter()
            .zip(&col_types)
            .map(|(cell, ty)| parse_literal(cell, *ty))
            .collect();
        rows.push(row);
    }

    Ok(InsertStmt { table, cols, rows })
}

fn build_delete_stmt(sql: &str, db: &DatabaseMeta) -> Result<DeleteStmt> {
    let rest = sql[6..].trim(); // strip "DELETE"
    let rest = rest
        .strip_prefix("FROM")
        .or_else(|| rest.strip_prefix("from"))
        .ok_or_else(|| ShardqError::parse("expected DELETE FROM"))?
        .trim();

    let (table, where_part) = match rest.to_ascii_uppercase().find("WHERE") {
        Some(idx) => (rest[..idx].trim(), Some(rest[idx + "WHERE".len()..].trim())),
        None => (rest.trim_end_matches(';'), None),
    };
    let table = table.to_string();
    let table_meta = db
        .tables
        .get(&table)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table {table}")))?;

    let mut filter_preds = Vec::new();
    if let Some(where_part) = where_part {
        for chunk in where_part.trim_end_matches(';').split_inclusive("AND") {
            let chunk = chunk.trim().trim_end_matches("AND").trim();
            let toks: Vec<&str> = chunk.split_whitespace().collect();
            if toks.len() != 3 {
                return Err(ShardqError::parse("DELETE predicates must be `col op value`"));
            }
            let op = CompareOp::parse(toks[1])
                .ok_or_else(|| ShardqError::parse(format!("unknown operator {}", toks[1])))?;
            let col = split_qualified(toks[0]).1.to_string();
            let ty = table_meta
                .column_type
                .get(&col)
                .copied()
                .unwrap_or(ColumnType::Str);
            filter_preds.push(Predicate::new(col, op, PredRhs::Literal(parse_literal(toks[2], ty))));
        }
    }

    Ok(DeleteStmt {
        table,
        filter_preds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardq_catalog::ddl::process_create_meta;

    fn demo_db() -> DatabaseMeta {
        let mut db = DatabaseMeta::default();
        process_create_meta(
            "CREATEMETA T Publisher ON HFRAG WHERE id:int name:str nation:str",
            &mut db,
        );
        process_create_meta(
            "CREATEMETA H node0.p1 ON Publisher WHERE id < 104000",
            &mut db,
        );
        db
    }

    #[test]
    fn expands_wildcard_and_qualifies_bare_columns() {
        let db = demo_db();
        let Stmt::Select(stmt) =
            parse_statement("SELECT * FROM Publisher WHERE id < 104000 AND nation = 'USA'", &db).unwrap()
        else {
            panic!("expected select")
        };
        assert_eq!(
            stmt.projected_cols,
            vec!["Publisher.id", "Publisher.name", "Publisher.nation"]
        );
        assert_eq!(stmt.filter_preds.len(), 2);
        assert_eq!(stmt.filter_preds[0].left, "Publisher.id");
    }

    #[test]
    fn splits_join_predicate_from_filter_predicate() {
        let mut db = demo_db();
        process_create_meta(
            "CREATEMETA T Orders ON HFRAG WHERE id:int customer_id:int quantity:int",
            &mut db,
        );
        process_create_meta("CREATEMETA H node0.o1 ON Orders WHERE id >= 0", &mut db);
        let Stmt::Select(stmt) = parse_statement(
            "SELECT quantity FROM Orders, Publisher WHERE Orders.customer_id = Publisher.id AND Publisher.id = 1",
            &db,
        )
        .unwrap() else {
            panic!("expected select")
        };
        assert_eq!(stmt.join_preds.len(), 1);
        assert_eq!(stmt.filter_preds.len(), 1);
        assert_eq!(stmt.projected_cols, vec!["Orders.quantity"]);
    }

    #[test]
    fn parses_insert_with_explicit_columns() {
        let db = demo_db();
        let Stmt::Insert(stmt) = parse_statement(
            "INSERT INTO Publisher (id, name, nation) VALUES (1, 'Acme', 'USA'), (2, 'Globex', 'USA')",
            &db,
        )
        .unwrap() else {
            panic!("expected insert")
        };
        assert_eq!(stmt.cols, vec!["id", "name", "nation"]);
        assert_eq!(stmt.rows.len(), 2);
        assert_eq!(stmt.rows[0][0], Value::Int(1));
        assert_eq!(stmt.rows[1][1], Value::Str("Globex".to_string()));
    }

    #[test]
    fn parses_delete_with_where() {
        let db = demo_db();
        let Stmt::Delete(stmt) =
            parse_statement("DELETE FROM Publisher WHERE id = 1", &db).unwrap()
        else {
            panic!("expected delete")
        };
        assert_eq!(stmt.table, "Publisher");
        assert_eq!(stmt.filter_preds.len(), 1);
    }
}
