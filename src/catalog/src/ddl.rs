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
// DDL line grammar (also the catalog persistence format, §4.1/§6):
//
//   CREATEMETA T <table> ON {HFRAG|VFRAG} WHERE <col:type> ...
//   CREATEMETA H <site>.<frag> ON <table> WHERE <pred> [AND <pred>]*
//   CREATEMETA V <site>.<frag> ON <table> WHERE <col> <col> ...
//
// where a `<pred>` is three whitespace-separated tokens `<col> <op>
// <value>`. Malformed lines are rejected silently to the caller and only
// logged, per §4.1.

use std::collections::HashMap;

use shardq_common::{CompareOp, ColumnType, PredRhs, Predicate, Value};

use crate::meta::{DatabaseMeta, FragType, HFragment, TableMeta, VFragment};

fn ci_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Accepts one DDL line and applies it to `db`. Returns `true` if the line
/// was recognized and applied, `false` if it was malformed (in which case
/// the caller should log and move on, never error out to a client).
pub fn process_create_meta(line: &str, db: &mut DatabaseMeta) -> bool {
    let toks: Vec<&str> = line.split_whitespace().collect();
    if toks.len() < 5 || !ci_eq(toks[0], "CREATEMETA") {
        return false;
    }
    match toks[1].to_ascii_uppercase().as_str() {
        "T" => process_table_decl(&toks, db),
        "H" => process_hfrag_decl(&toks, db),
        "V" => process_vfrag_decl(&toks, db),
        _ => false,
    }
}

/// `CREATEMETA T <table> ON {HFRAG|VFRAG} WHERE <col:type> ...`
fn process_table_decl(toks: &[&str], db: &mut DatabaseMeta) -> bool {
    if toks.len() < 6 || !ci_eq(toks[3], "ON") || !ci_eq(toks[5], "WHERE") {
        return false;
    }
    let table_name = toks[2];
    let frag_type = match toks[4].to_ascii_uppercase().as_str() {
        "HFRAG" => FragType::Hfrag,
        "VFRAG" => FragType::Vfrag,
        _ => return false,
    };
    let mut meta = TableMeta::new(table_name, frag_type);
    for spec in &toks[6..] {
        let Some((col, ty)) = spec.split_once(':') else {
            return false;
        };
        let Some(ty) = ColumnType::parse(ty) else {
            return false;
        };
        meta.columns.push(col.to_string());
        meta.column_type.insert(col.to_string(), ty);
    }
    if meta.columns.is_empty() {
        return false;
    }
    db.tables.insert(table_name.to_string(), meta);
    true
}

fn parse_site_frag(spec: &str) -> Option<(&str, &str)> {
    spec.split_once('.')
}

/// `CREATEMETA H <site>.<frag> ON <table> WHERE <pred> [AND <pred>]*`
fn process_hfrag_decl(toks: &[&str], db: &mut DatabaseMeta) -> bool {
    if toks.len() < 7 || !ci_eq(toks[3], "ON") || !ci_eq(toks[5], "WHERE") {
        return false;
    }
    let Some((site, frag)) = parse_site_frag(toks[2]) else {
        return false;
    };
    let table_name = toks[4];
    let Some(table) = db.tables.get_mut(table_name) else {
        return false;
    };
    if table.frag_type != FragType::Hfrag {
        return false;
    }

    let mut preds = Vec::new();
    let mut chunk = Vec::new();
    let flush = |chunk: &mut Vec<&str>, preds: &mut Vec<Predicate>| -> bool {
        if chunk.len() != 3 {
            return false;
        }
        let Some(op) = CompareOp::parse(chunk[1]) else {
            return false;
        };
        let col_ty = chunk[0].rsplit_once('.').map(|(_, c)| c).unwrap_or(chunk[0]);
        let ty = table_col_type(table, col_ty);
        let value = Value::parse_typed(chunk[2], ty);
        preds.push(Predicate::new(chunk[0], op, PredRhs::Literal(value)));
        true
    };
    for tok in &toks[6..] {
        if ci_eq(tok, "AND") {
            if !flush(&mut chunk, &mut preds) {
                return false;
            }
            chunk.clear();
        } else {
            chunk.push(tok);
        }
    }
    if !flush(&mut chunk, &mut preds) {
        return false;
    }

    table.hfrag.insert(
        site.to_string(),
        HFragment {
            frag_name: frag.to_string(),
            preds,
        },
    );
    db.register_site(site);
    true
}

fn table_col_type(table: &TableMeta, col: &str) -> ColumnType {
    table
        .column_type
        .get(col)
        .copied()
        .unwrap_or(ColumnType::Str)
}

/// `CREATEMETA V <site>.<frag> ON <table> WHERE <col> <col> ...`
fn process_vfrag_decl(toks: &[&str], db: &mut DatabaseMeta) -> bool {
    if toks.len() < 7 || !ci_eq(toks[3], "ON") || !ci_eq(toks[5], "WHERE") {
        return false;
    }
    let Some((site, frag)) = parse_site_frag(toks[2]) else {
        return false;
    };
    let table_name = toks[4];
    let Some(table) = db.tables.get_mut(table_name) else {
        return false;
    };
    if table.frag_type != FragType::Vfrag {
        return false;
    }
    let columns: Vec<String> = toks[6..].iter().map(|s| s.to_string()).collect();
    if columns.is_empty() || !columns.iter().all(|c| table.columns.contains(c)) {
        return false;
    }
    table.vfrag.insert(
        site.to_string(),
        VFragment {
            frag_name: frag.to_string(),
            columns,
        },
    );
    db.register_site(site);
    true
}

fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Int => "INTEGER",
        ColumnType::Str => "TEXT",
    }
}

/// Splits `<table-info-stmt>|<meta-stmt>|…` on `|`, applies each meta
/// statement to `db`, and returns a map from site name to the site-local
/// `CREATE TABLE` SQL that site must run, built from the columns that
/// site's fragment materializes. Per §4.1.
pub fn parse_create_table(def: &str, db: &mut DatabaseMeta) -> HashMap<String, String> {
    let mut table_name = String::new();
    for stmt in def.split('|') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        let applied = process_create_meta(stmt, db);
        if !applied {
            tracing::warn!(stmt, "rejected malformed CREATEMETA line");
            continue;
        }
        let toks: Vec<&str> = stmt.split_whitespace().collect();
        if ci_eq(toks[1], "T") {
            table_name = toks[2].to_string();
        }
    }

    let mut out = HashMap::new();
    let Some(table) = db.tables.get(&table_name) else {
        return out;
    };
    match table.frag_type {
        FragType::Hfrag => {
            for (site, frag) in &table.hfrag {
                let cols = table
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c, sql_type(table_col_type(table, c))))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.insert(
                    site.clone(),
                    format!("CREATE TABLE {} ({})", frag.frag_name, cols),
                );
            }
        }
        FragType::Vfrag => {
            for (site, frag) in &table.vfrag {
                let cols = frag
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c, sql_type(table_col_type(table, c))))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.insert(
                    site.clone(),
                    format!("CREATE TABLE {} ({})", frag.frag_name, cols),
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_lines_without_panicking() {
        let mut db = DatabaseMeta::default();
        assert!(!process_create_meta("not a ddl line", &mut db));
        assert!(!process_create_meta("CREATEMETA X garbage", &mut db));
    }

    #[test]
    fn builds_hfrag_table_and_fragments() {
        let mut db = DatabaseMeta::default();
        assert!(process_create_meta(
            "CREATEMETA T Publisher ON HFRAG WHERE id:int name:str nation:str",
            &mut db
        ));
        assert!(process_create_meta(
            "CREATEMETA H node0.p1 ON Publisher WHERE id < 104000",
            &mut db
        ));
        assert!(process_create_meta(
            "CREATEMETA H node1.p2 ON Publisher WHERE id >= 104000 AND nation = USA",
            &mut db
        ));
        let table = &db.tables["Publisher"];
        assert_eq!(table.hfrag.len(), 2);
        assert_eq!(table.hfrag["node1"].preds.len(), 2);
        assert_eq!(db.sites.len(), 2);
    }

    #[test]
    fn builds_vfrag_table_with_join_column() {
        let mut db = DatabaseMeta::default();
        assert!(process_create_meta(
            "CREATEMETA T Customer ON VFRAG WHERE id:int name:str rank:str",
            &mut db
        ));
        assert!(process_create_meta(
            "CREATEMETA V node0.c1 ON Customer WHERE id name",
            &mut db
        ));
        assert!(process_create_meta(
            "CREATEMETA V node1.c2 ON Customer WHERE id rank",
            &mut db
        ));
        let table = &db.tables["Customer"];
        assert_eq!(table.vfrag_join_column().as_deref(), Some("id"));
    }

    #[test]
    fn parse_create_table_yields_site_local_ddl() {
        let mut db = DatabaseMeta::default();
        let map = parse_create_table(
            "CREATEMETA T Book ON HFRAG WHERE id:int title:str|\
             CREATEMETA H node0.b1 ON Book WHERE id < 200000|\
             CREATEMETA H node1.b2 ON Book WHERE id >= 200000",
            &mut db,
        );
        assert_eq!(map.len(), 2);
        assert!(map["node0"].starts_with("CREATE TABLE b1"));
    }
}
