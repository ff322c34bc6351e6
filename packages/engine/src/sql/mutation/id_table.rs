use crate::dialect::{AfterUseAction, BeforeUseAction, TemporaryTableKind};
use crate::errors;
use crate::metadata::{EntityDescriptor, PhysicalColumn};
use crate::{EngineConfig, SqlDialect, StrataError};

/// The temporary table holding the identifiers of the rows a bulk statement
/// affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTable {
    name: String,
    columns: Vec<PhysicalColumn>,
    dialect: SqlDialect,
}

impl IdTable {
    pub fn for_entity(
        entity: &EntityDescriptor,
        config: &EngineConfig,
        dialect: SqlDialect,
    ) -> Result<Self, StrataError> {
        if !dialect.supports_temporary_tables() {
            return Err(errors::temporary_tables_unsupported_error(
                dialect.name(),
                &entity.name,
            ));
        }
        let name = format!("{}{}", config.id_table_prefix, entity.root_table.name);
        let columns = entity
            .identifier_columns()
            .iter()
            .map(|column| PhysicalColumn::new(name.clone(), column.name.clone(), column.sql_type))
            .collect::<Vec<_>>();
        if columns.is_empty() {
            return Err(errors::invalid_configuration_error(&format!(
                "entity `{}` has no identifier columns",
                entity.name
            )));
        }
        Ok(Self {
            name,
            columns,
            dialect,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[PhysicalColumn] {
        &self.columns
    }

    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_ddl(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                format!(
                    "{} {} not null",
                    column.name,
                    self.dialect.column_type_name(column.sql_type)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut ddl = format!(
            "{} {} ({columns})",
            self.dialect.temporary_table_create_command(),
            self.name
        );
        if let Some(options) = self.dialect.temporary_table_create_options() {
            ddl.push(' ');
            ddl.push_str(options);
        }
        ddl
    }

    pub fn drop_ddl(&self) -> String {
        format!("{} {}", self.dialect.temporary_table_drop_command(), self.name)
    }

    pub fn clean_sql(&self) -> String {
        format!("delete from {}", self.name)
    }

    /// `(<id columns>) in (select <id columns> from <id table>)` against the
    /// given key columns of a target table.
    pub fn key_restriction(&self, table: &str, key_columns: &[String]) -> Result<String, StrataError> {
        if key_columns.len() != self.columns.len() {
            return Err(errors::invalid_configuration_error(&format!(
                "table `{table}` has {} key columns but the identifier has {}",
                key_columns.len(),
                self.columns.len()
            )));
        }
        let subquery = format!("select {} from {}", self.column_list(), self.name);
        match key_columns {
            [single] => Ok(format!("{single} in ({subquery})")),
            _ if self.dialect.supports_row_value_constructor() => {
                Ok(format!("({}) in ({subquery})", key_columns.join(", ")))
            }
            _ => {
                let matches = key_columns
                    .iter()
                    .zip(&self.columns)
                    .map(|(key, id)| format!("{}.{} = {table}.{key}", self.name, id.name))
                    .collect::<Vec<_>>()
                    .join(" and ");
                Ok(format!("exists (select 1 from {} where {matches})", self.name))
            }
        }
    }

    pub fn before_use_action(&self, config: &EngineConfig) -> BeforeUseAction {
        if !config.create_id_tables {
            return BeforeUseAction::None;
        }
        self.dialect.temporary_table_before_use_action()
    }

    /// The dialect's after-use action with the configured override applied.
    /// Tables the engine did not create, and tables that merely stand in for
    /// temporary ones, are purged and never dropped.
    pub fn after_use_action(&self, config: &EngineConfig) -> AfterUseAction {
        let shared = !config.create_id_tables
            || self.dialect.temporary_table_kind() == Some(TemporaryTableKind::Persistent);
        if shared {
            return AfterUseAction::Clean;
        }
        match config.drop_id_tables {
            Some(true) => AfterUseAction::Drop,
            Some(false) => AfterUseAction::Clean,
            None => self.dialect.temporary_table_after_use_action(),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}
