//! # SQL Builder Seam
//!
//! The emitter only needs two things from the surrounding query builder:
//! a placeholder for each bound literal, and somewhere to put the finished
//! WHERE fragment. [`ArgsBuilder`] is the plain implementation used by the
//! CLI and tests.

use serde_json::Value;

pub trait SqlBuilder {
    /// Bind a literal and return its placeholder.
    fn var(&mut self, value: Value) -> String;

    /// Receive a finished WHERE fragment.
    fn add_where(&mut self, expr: String);
}

/// Collects positional `?` arguments and WHERE fragments.
#[derive(Debug, Clone, Default)]
pub struct ArgsBuilder {
    args: Vec<Value>,
    wheres: Vec<String>,
}

impl ArgsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// All fragments joined with `AND`, or `None` if nothing was added.
    pub fn where_clause(&self) -> Option<String> {
        match self.wheres.len() {
            0 => None,
            1 => Some(self.wheres[0].clone()),
            _ => Some(
                self.wheres
                    .iter()
                    .map(|w| format!("({})", w))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
        }
    }

    /// Substitute the collected arguments into `sql` as literals.
    /// For display only; never send the result to the server.
    pub fn inline(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut args = self.args.iter();
        for ch in sql.chars() {
            if ch == '?' {
                match args.next() {
                    Some(v) => out.push_str(&sql_literal(v)),
                    None => out.push(ch),
                }
            } else {
                out.push(ch);
            }
        }
        out
    }
}

impl SqlBuilder for ArgsBuilder {
    fn var(&mut self, value: Value) -> String {
        self.args.push(value);
        "?".to_string()
    }

    fn add_where(&mut self, expr: String) {
        self.wheres.push(expr);
    }
}

/// Backtick-quote an identifier. Backslashes and backticks inside it are
/// escaped so the name cannot close the quotes early.
pub fn quote_ident(raw: &str) -> String {
    format!("`{}`", raw.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Render a JSON literal the way ClickHouse would read it.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(sql_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(_) => format!("'{}'", value.to_string().replace('\'', "\\'")),
    }
}
