//! Resolved model: the static catalog indexed for runtime lookups.

use crate::config::{ColumnDef, ColumnType, DeleteSignal, EntityKind, TableDef};
use std::collections::HashMap;

/// Bookkeeping columns carried by soft-delete tables, in select order.
pub const SOFT_DELETE_COLUMNS: &[&str] = &["is_deleted", "deleted_at", "updated_at"];
pub const UPDATED_AT: &str = "updated_at";

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub kind: EntityKind,
    pub table_name: String,
    pub path_segment: String,
    pub pk_column: String,
    pub columns: Vec<ColumnDef>,
    pub required: Vec<String>,
    pub natural_key: Vec<String>,
    pub delete_signal: DeleteSignal,
    pub read_only: bool,
    pub hard_delete: bool,
    pub echo: Vec<String>,
    /// Exact label/alias -> canonical column name.
    labels: HashMap<String, String>,
    /// Lower-cased label/alias -> canonical column name.
    labels_folded: HashMap<String, String>,
    column_index: HashMap<String, usize>,
}

impl ResolvedEntity {
    pub(crate) fn from_def(def: &TableDef) -> Self {
        let mut labels = HashMap::new();
        let mut labels_folded = HashMap::new();
        let mut column_index = HashMap::new();
        for (i, c) in def.columns.iter().enumerate() {
            column_index.insert(c.name.to_string(), i);
            for external in std::iter::once(&c.label).chain(c.aliases.iter()) {
                labels.insert(external.to_string(), c.name.to_string());
                labels_folded.insert(external.to_lowercase(), c.name.to_string());
            }
        }
        ResolvedEntity {
            kind: def.kind,
            table_name: def.table.to_string(),
            path_segment: def.path_segment.to_string(),
            pk_column: def.primary_key.to_string(),
            columns: def.columns.to_vec(),
            required: def.required.iter().map(|s| s.to_string()).collect(),
            natural_key: def.natural_key.iter().map(|s| s.to_string()).collect(),
            delete_signal: def.delete_signal,
            read_only: def.read_only,
            hard_delete: def.hard_delete,
            echo: def.echo.iter().map(|s| s.to_string()).collect(),
            labels,
            labels_folded,
            column_index,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index.get(name).map(|&i| &self.columns[i])
    }

    pub fn is_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Canonical column for an external label or alias: exact match first, then case-insensitive.
    pub fn column_for_label(&self, label: &str) -> Option<&str> {
        self.labels
            .get(label)
            .or_else(|| self.labels_folded.get(&label.to_lowercase()))
            .map(String::as_str)
    }

    /// External label for a canonical name. Primary key and bookkeeping columns keep their own name.
    pub fn label_for(&self, name: &str) -> String {
        self.column(name)
            .map(|c| c.label.to_string())
            .unwrap_or_else(|| name.to_string())
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        if name == self.pk_column {
            return Some(ColumnType::Int);
        }
        self.column(name).map(|c| c.ty)
    }

    pub fn has_soft_delete(&self) -> bool {
        self.delete_signal == DeleteSignal::SoftDelete
    }

    /// Predicate selecting rows that are not soft-deleted, if this table soft-deletes.
    pub fn live_predicate(&self) -> Option<&'static str> {
        match self.delete_signal {
            DeleteSignal::SoftDelete => Some("\"is_deleted\" = 0"),
            DeleteSignal::Inactive => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, usize>,
}

impl ResolvedModel {
    /// Look up by path segment (`buildings`) or its singular alias (`building`).
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path).map(|&i| &self.entities[i])
    }

    pub fn entity(&self, kind: EntityKind) -> Option<&ResolvedEntity> {
        self.entities.iter().find(|e| e.kind == kind)
    }
}
