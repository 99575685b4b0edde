//! Schema reconciliation against an existing destination table.
//!
//! Evolution is additive only: the reconciler emits `AddColumn` actions for
//! incoming columns the table lacks and never removes or re-types anything.

use crate::model::{AddColumn, TableSchema, TargetTable};

/// Columns to add so `existing` can hold every incoming column.
///
/// Names are compared case-sensitively. Order follows the incoming schema.
#[must_use]
pub fn reconcile(existing: &TargetTable, incoming: &TableSchema) -> Vec<AddColumn> {
    incoming
        .columns()
        .iter()
        .filter(|c| !existing.has_column(&c.name))
        .map(|c| AddColumn {
            name: c.name.clone(),
            column_type: c.column_type,
            long_text: c.long_text,
        })
        .collect()
}

/// Incoming columns unknown to `existing`.
#[must_use]
pub fn unknown_columns(existing: &TargetTable, incoming: &TableSchema) -> Vec<String> {
    reconcile(existing, incoming)
        .into_iter()
        .map(|c| c.name)
        .collect()
}
