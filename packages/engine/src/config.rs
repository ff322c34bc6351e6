use serde::{Deserialize, Serialize};

use crate::errors;
use crate::StrataError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix prepended to the entity's root table name to name its id table.
    pub id_table_prefix: String,
    /// When false the id table is assumed to exist and no create DDL is issued.
    pub create_id_tables: bool,
    /// Overrides the dialect's after-use action for id tables the engine
    /// creates. Pre-existing tables are always purged.
    pub drop_id_tables: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_table_prefix: "HT_".to_string(),
            create_id_tables: true,
            drop_id_tables: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self, StrataError> {
        let config: Self = serde_json::from_str(raw).map_err(|error| {
            errors::invalid_configuration_error(&format!("invalid engine config: {error}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        let prefix_is_identifier = self
            .id_table_prefix
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !prefix_is_identifier {
            return Err(errors::invalid_configuration_error(&format!(
                "id_table_prefix `{}` must only contain ASCII letters, digits and underscores",
                self.id_table_prefix
            )));
        }
        Ok(())
    }
}
