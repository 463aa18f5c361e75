//! # Compiler
//!
//! Entry point used by query builders: field key in, SQL out. One plan per
//! physical column the key may live in; conditions across columns are ORed.

use bj_core::{split_path, Columns, FieldKey, Operator, TypeLookup};
use serde_json::Value;

use crate::emit::{emit_all, emit_group_by, GroupBy};
use crate::error::{Error, Result};
use crate::plan::{Plan, PlanBuilder, Root};
use crate::sql::SqlBuilder;

pub struct Compiler<'a, L: TypeLookup + ?Sized> {
    lookup: &'a L,
    columns: Columns,
}

impl<'a, L: TypeLookup + ?Sized> Compiler<'a, L> {
    pub fn new(lookup: &'a L, columns: Columns) -> Self {
        Self { lookup, columns }
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Body plan first, then the promoted plan when the key allows it.
    pub fn plans(&self, key: &FieldKey, op: Operator, value: &Value) -> Result<Vec<Plan>> {
        let path = key.path();
        let parts = split_path(&path).map_err(|_| Error::EmptyPath)?;
        let builder = PlanBuilder::new(self.lookup).declared(key.data_type);

        let mut plans = vec![builder.build(&parts, op, value, &Root::body(&self.columns.body))?];
        if key.promoted {
            plans.push(builder.build(&parts, op, value, &Root::promoted(&self.columns.promoted))?);
        }
        Ok(plans)
    }

    /// Compile a filter into a boolean expression.
    pub fn condition(
        &self,
        key: &FieldKey,
        op: Operator,
        value: &Value,
        sb: &mut dyn SqlBuilder,
    ) -> Result<String> {
        let plans = self.plans(key, op, value)?;
        let expr = emit_all(&plans, sb)?;
        tracing::debug!("compiled {} {} over {} plan(s)", key.name, op, plans.len());
        Ok(expr)
    }

    /// Compile a filter and attach it to the builder's WHERE clause.
    pub fn filter(
        &self,
        key: &FieldKey,
        op: Operator,
        value: &Value,
        sb: &mut dyn SqlBuilder,
    ) -> Result<()> {
        let expr = self.condition(key, op, value, sb)?;
        sb.add_where(expr);
        Ok(())
    }

    /// Unnesting clauses and field expression for grouping by `key`.
    pub fn group_by(&self, key: &FieldKey) -> Result<GroupBy> {
        let plans = self.plans(key, Operator::Exists, &Value::Null)?;
        emit_group_by(&plans)
    }
}

/// One-shot planning without holding a [`Compiler`].
pub fn plan_field<L: TypeLookup + ?Sized>(
    key: &FieldKey,
    op: Operator,
    value: &Value,
    lookup: &L,
    columns: &Columns,
) -> Result<Vec<Plan>> {
    Compiler::new(lookup, columns.clone()).plans(key, op, value)
}
