//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for one entity table.
//! Identifiers come from the table's known column set only; values are always parameters.
//! Rows are returned as a single jsonb column named `record`.

use crate::sql::BindValue;

/// Quote identifier for PostgreSQL (safe: only from known columns).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

const ALIAS: &str = "t";
const ID: &str = "id";

/// Schema-qualified table an entity lives in.
#[derive(Clone, Debug)]
pub struct TableRef<'a> {
    pub schema: &'a str,
    pub table: &'a str,
}

impl TableRef<'_> {
    fn qualified(&self) -> String {
        format!("{}.{}", quoted(self.schema), quoted(self.table))
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: BindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn select_from(table: &TableRef<'_>) -> String {
    format!(
        "SELECT to_jsonb({a}) AS record FROM {} AS {a}",
        table.qualified(),
        a = ALIAS
    )
}

fn order_by_id() -> String {
    format!(" ORDER BY {}.{}", ALIAS, quoted(ID))
}

/// All rows ordered by id.
pub fn select_all(table: &TableRef<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("{}{}", select_from(table), order_by_id());
    q
}

/// Rows whose column, cast to text, equals the value.
pub fn select_where_text(table: &TableRef<'_>, column: &str, value: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(BindValue::Text(value.to_string()));
    q.sql = format!(
        "{} WHERE {}.{}::text = ${}{}",
        select_from(table),
        ALIAS,
        quoted(column),
        n,
        order_by_id()
    );
    q
}

/// Rows whose column, cast to text, is any of `values`. Used for batch-loading related rows.
pub fn select_where_in(table: &TableRef<'_>, column: &str, values: Vec<String>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(BindValue::TextArray(values));
    q.sql = format!(
        "{} WHERE {}.{}::text = ANY(${}){}",
        select_from(table),
        ALIAS,
        quoted(column),
        n,
        order_by_id()
    );
    q
}

pub fn select_by_id(table: &TableRef<'_>, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(BindValue::BigInt(id));
    q.sql = format!("{} WHERE {}.{} = ${}", select_from(table), ALIAS, quoted(ID), n);
    q
}

pub fn select_by_code(table: &TableRef<'_>, code_column: &str, code: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(BindValue::Text(code.to_string()));
    q.sql = format!(
        "{} WHERE {}.{}::text = ${} LIMIT 1",
        select_from(table),
        ALIAS,
        quoted(code_column),
        n
    );
    q
}

/// INSERT of the given columns, values taken from a jsonb record so PostgreSQL coerces types.
pub fn insert(table: &TableRef<'_>, columns: &[&str], record: serde_json::Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = table.qualified();
    if columns.is_empty() {
        q.sql = format!(
            "INSERT INTO {} AS {a} DEFAULT VALUES RETURNING to_jsonb({a}) AS record",
            target,
            a = ALIAS
        );
        return q;
    }
    let n = q.push_param(BindValue::Json(record));
    let cols: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
    let values: Vec<String> = columns.iter().map(|c| format!("p.{}", quoted(c))).collect();
    q.sql = format!(
        "INSERT INTO {t} AS {a} ({}) SELECT {} FROM jsonb_populate_record(NULL::{t}, ${}) AS p RETURNING to_jsonb({a}) AS record",
        cols.join(", "),
        values.join(", "),
        n,
        t = target,
        a = ALIAS
    );
    q
}

/// UPDATE by id: SET only the given columns. With no columns, reads the row back instead.
pub fn update(table: &TableRef<'_>, id: i64, columns: &[&str], patch: serde_json::Value) -> QueryBuf {
    if columns.is_empty() {
        return select_by_id(table, id);
    }
    let mut q = QueryBuf::new();
    let target = table.qualified();
    let patch_param = q.push_param(BindValue::Json(patch));
    let id_param = q.push_param(BindValue::BigInt(id));
    let sets: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = p.{}", quoted(c), quoted(c)))
        .collect();
    q.sql = format!(
        "UPDATE {t} AS {a} SET {} FROM jsonb_populate_record(NULL::{t}, ${}) AS p WHERE {a}.{} = ${} RETURNING to_jsonb({a}) AS record",
        sets.join(", "),
        patch_param,
        quoted(ID),
        id_param,
        t = target,
        a = ALIAS
    );
    q
}

/// DELETE by id, returning the id so a miss is observable.
pub fn delete(table: &TableRef<'_>, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(BindValue::BigInt(id));
    q.sql = format!(
        "DELETE FROM {} AS {a} WHERE {a}.{} = ${} RETURNING {a}.{}",
        table.qualified(),
        quoted(ID),
        n,
        quoted(ID),
        a = ALIAS
    );
    q
}
