//! # bj-plan: body-JSON filter compiler
//!
//! Compiles `(path, operator, value)` filters against a polymorphic JSON
//! column into ClickHouse predicates.
//!
//! ```text
//! FieldKey ──▶ PlanBuilder ──▶ Plan (tree, one per column)
//!                  │                    │
//!            TypeLookup ◀── resolve     ▼
//!                               emit / emit_group_by ──▶ SqlBuilder
//! ```
//!
//! [`Compiler`] ties the pieces together for callers.

pub mod compiler;
pub mod emit;
pub mod error;
pub mod plan;
pub mod resolve;
pub mod sql;

#[cfg(test)]
mod testing;

pub use compiler::{plan_field, Compiler};
pub use emit::{apply_operator, emit, emit_all, emit_group_by, GroupBy};
pub use error::{Error, Result};
pub use plan::{build, Budget, NodeId, Plan, PlanBuilder, PlanNode, Root, TerminalConfig};
pub use resolve::{infer_value, resolve, resolve_declared, Resolution};
pub use sql::{quote_ident, sql_literal, ArgsBuilder, SqlBuilder};
