//! Build the resolved model from the static catalog.

use crate::config::resolved::{ResolvedEntity, ResolvedModel};
use crate::config::{validate, CATALOG};
use crate::error::ConfigError;
use std::collections::HashMap;

/// Validate the catalog and index it for request handling. Call once at startup.
pub fn resolve() -> Result<ResolvedModel, ConfigError> {
    validate(CATALOG)?;

    let mut entities = Vec::with_capacity(CATALOG.len());
    let mut entity_by_path = HashMap::new();
    for (i, def) in CATALOG.iter().enumerate() {
        entities.push(ResolvedEntity::from_def(def));
        entity_by_path.insert(def.path_segment.to_string(), i);
        entity_by_path.insert(def.path_alias.to_string(), i);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}
