//! Catalog validation: column references and label uniqueness.

use crate::config::TableDef;
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(tables: &[TableDef]) -> Result<(), ConfigError> {
    let mut paths: HashSet<&str> = HashSet::new();

    for t in tables {
        for segment in [t.path_segment, t.path_alias] {
            if !paths.insert(segment) {
                return Err(ConfigError::DuplicatePathSegment(segment.to_string()));
            }
        }

        let column_names: HashSet<&str> = t.columns.iter().map(|c| c.name).collect();
        if column_names.len() != t.columns.len() {
            return Err(ConfigError::Validation(format!(
                "table {} declares a column twice",
                t.table
            )));
        }
        if column_names.contains(t.primary_key) {
            return Err(ConfigError::InvalidPrimaryKey {
                table: t.table.to_string(),
                column: t.primary_key.to_string(),
            });
        }

        for name in t.required.iter().chain(t.natural_key.iter()).chain(t.echo.iter()) {
            if !column_names.contains(name) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", t.table, name),
                });
            }
        }

        let mut labels: HashSet<String> = HashSet::new();
        for c in t.columns {
            for external in std::iter::once(&c.label).chain(c.aliases.iter()) {
                if !labels.insert(external.to_lowercase()) {
                    return Err(ConfigError::Validation(format!(
                        "table {}: label '{}' is used twice",
                        t.table, external
                    )));
                }
            }
        }

        if t.read_only && (t.hard_delete || !t.required.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "table {} is read-only but declares write rules",
                t.table
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDef, ColumnType, CATALOG, BUILDING};

    #[test]
    fn catalog_is_valid() {
        validate(CATALOG).unwrap();
    }

    #[test]
    fn unknown_required_column_is_rejected() {
        let broken = TableDef {
            required: &["no_such_column"],
            ..BUILDING
        };
        let err = validate(&[broken]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "column", .. }));
    }

    #[test]
    fn colliding_labels_are_rejected() {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef { name: "city", label: "City", aliases: &[], ty: ColumnType::Text },
            ColumnDef { name: "town", label: "town", aliases: &["CITY"], ty: ColumnType::Text },
        ];
        let broken = TableDef {
            columns: COLUMNS,
            required: &[],
            natural_key: &[],
            echo: &[],
            ..BUILDING
        };
        assert!(matches!(validate(&[broken]), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn duplicate_path_segment_is_rejected() {
        let err = validate(&[BUILDING, BUILDING]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePathSegment(ref s) if s == "buildings"));
    }
}
