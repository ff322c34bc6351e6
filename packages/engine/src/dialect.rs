use serde::{Deserialize, Serialize};

use crate::metadata::SqlType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    MySql,
    H2,
    Oracle,
    /// ANSI rendering with no temporary table support.
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporaryTableKind {
    /// Session scoped, created on demand.
    Local,
    /// Definition shared by all sessions, rows session scoped.
    Global,
    /// A regular table used as a temporary one.
    Persistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeUseAction {
    Create,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterUseAction {
    /// Purge the rows, keep the table.
    Clean,
    Drop,
}

/// How temporary table DDL runs relative to the statement's unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporaryTableIsolation {
    RunInline,
    RunIsolatedTransactional,
    RunIsolatedNonTransactional,
}

impl SqlDialect {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::H2 => "h2",
            Self::Oracle => "oracle",
            Self::Generic => "generic",
        }
    }

    pub const fn supports_temporary_tables(self) -> bool {
        self.temporary_table_kind().is_some()
    }

    pub const fn temporary_table_kind(self) -> Option<TemporaryTableKind> {
        match self {
            Self::Sqlite | Self::Postgres | Self::MySql | Self::H2 => {
                Some(TemporaryTableKind::Local)
            }
            Self::Oracle => Some(TemporaryTableKind::Global),
            Self::Generic => None,
        }
    }

    pub const fn temporary_table_create_command(self) -> &'static str {
        match self {
            Self::Sqlite => "create temporary table",
            Self::Postgres | Self::MySql => "create temporary table if not exists",
            Self::H2 => "create cached local temporary table if not exists",
            Self::Oracle => "create global temporary table",
            Self::Generic => "create table",
        }
    }

    pub const fn temporary_table_create_options(self) -> Option<&'static str> {
        match self {
            Self::H2 => Some("on commit drop transactional"),
            Self::Oracle => Some("on commit delete rows"),
            _ => None,
        }
    }

    pub const fn temporary_table_drop_command(self) -> &'static str {
        match self {
            Self::MySql => "drop temporary table",
            _ => "drop table",
        }
    }

    pub const fn temporary_table_before_use_action(self) -> BeforeUseAction {
        match self {
            Self::Generic => BeforeUseAction::None,
            _ => BeforeUseAction::Create,
        }
    }

    pub const fn temporary_table_after_use_action(self) -> AfterUseAction {
        match self {
            Self::Sqlite | Self::Postgres | Self::MySql => AfterUseAction::Drop,
            // `on commit drop` outlives the statement, and `if not exists`
            // would reuse the previous statement's ids.
            Self::H2 | Self::Oracle | Self::Generic => AfterUseAction::Clean,
        }
    }

    pub const fn temporary_table_ddl_isolation(self) -> TemporaryTableIsolation {
        match self {
            Self::Sqlite | Self::Postgres | Self::H2 => TemporaryTableIsolation::RunInline,
            Self::MySql => TemporaryTableIsolation::RunIsolatedNonTransactional,
            Self::Oracle | Self::Generic => TemporaryTableIsolation::RunIsolatedTransactional,
        }
    }

    pub const fn supports_row_value_constructor(self) -> bool {
        !matches!(self, Self::Generic)
    }

    /// Placeholder text for a 1-based parameter position.
    pub fn placeholder(self, position_1_based: usize) -> String {
        match self {
            Self::Sqlite => format!("?{position_1_based}"),
            Self::Postgres => format!("${position_1_based}"),
            Self::MySql | Self::H2 | Self::Oracle | Self::Generic => "?".to_string(),
        }
    }

    pub const fn column_type_name(self, sql_type: SqlType) -> &'static str {
        match (self, sql_type) {
            (Self::Sqlite, SqlType::Integer | SqlType::Boolean) => "integer",
            (Self::Sqlite, SqlType::Real) => "real",
            (Self::Sqlite, SqlType::Text | SqlType::Timestamp) => "text",
            (Self::Sqlite, SqlType::Blob) => "blob",
            (Self::Oracle, SqlType::Integer) => "number(19,0)",
            (Self::Oracle, SqlType::Boolean) => "number(1,0)",
            (Self::Oracle, SqlType::Text) => "varchar2(255 char)",
            (Self::Oracle, SqlType::Real) => "binary_double",
            (Self::Postgres, SqlType::Blob) => "bytea",
            (_, SqlType::Integer) => "bigint",
            (_, SqlType::Real) => "double precision",
            (_, SqlType::Text) => "varchar(255)",
            (_, SqlType::Blob) => "blob",
            (_, SqlType::Boolean) => "boolean",
            (_, SqlType::Timestamp) => "timestamp",
        }
    }
}
