use crate::StrataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unknown,
    IllegalJoinSpecification,
    UnresolvedTableBinding,
    MissingRootTableBinding,
    SelectClauseFinalized,
    TemporaryTablesUnsupported,
    InvalidConfiguration,
    UnknownEntity,
    UnknownAttribute,
    UnsupportedMutation,
    InvalidExpression,
    UnboundParameter,
    StatementExecution,
    ResultRead,
}

/// Taxonomy used by callers to decide how a failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    InternalConsistency,
    BackendExecution,
    IllegalConstruction,
    Semantic,
    Hydration,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "STRATA_ERROR_UNKNOWN",
            Self::IllegalJoinSpecification => "STRATA_ERROR_ILLEGAL_JOIN_SPECIFICATION",
            Self::UnresolvedTableBinding => "STRATA_ERROR_UNRESOLVED_TABLE_BINDING",
            Self::MissingRootTableBinding => "STRATA_ERROR_MISSING_ROOT_TABLE_BINDING",
            Self::SelectClauseFinalized => "STRATA_ERROR_SELECT_CLAUSE_FINALIZED",
            Self::TemporaryTablesUnsupported => "STRATA_ERROR_TEMPORARY_TABLES_UNSUPPORTED",
            Self::InvalidConfiguration => "STRATA_ERROR_INVALID_CONFIGURATION",
            Self::UnknownEntity => "STRATA_ERROR_UNKNOWN_ENTITY",
            Self::UnknownAttribute => "STRATA_ERROR_UNKNOWN_ATTRIBUTE",
            Self::UnsupportedMutation => "STRATA_ERROR_UNSUPPORTED_MUTATION",
            Self::InvalidExpression => "STRATA_ERROR_INVALID_EXPRESSION",
            Self::UnboundParameter => "STRATA_ERROR_UNBOUND_PARAMETER",
            Self::StatementExecution => "STRATA_ERROR_STATEMENT_EXECUTION",
            Self::ResultRead => "STRATA_ERROR_RESULT_READ",
        }
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::TemporaryTablesUnsupported | Self::InvalidConfiguration => {
                ErrorCategory::Configuration
            }
            Self::UnresolvedTableBinding
            | Self::MissingRootTableBinding
            | Self::SelectClauseFinalized => ErrorCategory::InternalConsistency,
            Self::Unknown | Self::StatementExecution => ErrorCategory::BackendExecution,
            Self::IllegalJoinSpecification => ErrorCategory::IllegalConstruction,
            Self::UnknownEntity
            | Self::UnknownAttribute
            | Self::UnsupportedMutation
            | Self::InvalidExpression
            | Self::UnboundParameter => ErrorCategory::Semantic,
            Self::ResultRead => ErrorCategory::Hydration,
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Unknown,
            Self::IllegalJoinSpecification,
            Self::UnresolvedTableBinding,
            Self::MissingRootTableBinding,
            Self::SelectClauseFinalized,
            Self::TemporaryTablesUnsupported,
            Self::InvalidConfiguration,
            Self::UnknownEntity,
            Self::UnknownAttribute,
            Self::UnsupportedMutation,
            Self::InvalidExpression,
            Self::UnboundParameter,
            Self::StatementExecution,
            Self::ResultRead,
        ]
    }

    pub fn from_code_str(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|candidate| candidate.as_str() == code)
    }
}

fn build_error(code: ErrorCode, title: &str, description: &str) -> StrataError {
    StrataError::new(code.as_str(), title, description)
}

pub(crate) fn illegal_join_specification_error(join_kind: &str) -> StrataError {
    build_error(
        ErrorCode::IllegalJoinSpecification,
        "Illegal join specification",
        &format!("a {join_kind} cannot carry a join predicate"),
    )
}

pub(crate) fn unresolved_table_binding_error(table: &str, table_group_uid: &str) -> StrataError {
    build_error(
        ErrorCode::UnresolvedTableBinding,
        "Unresolved table binding",
        &format!("table `{table}` is not bound by table group `{table_group_uid}`"),
    )
}

pub(crate) fn unresolved_column_binding_error(
    table: &str,
    column: &str,
    table_group_uid: &str,
) -> StrataError {
    build_error(
        ErrorCode::UnresolvedTableBinding,
        "Unresolved column binding",
        &format!(
            "column `{table}.{column}` cannot be resolved: table `{table}` is not bound by table group `{table_group_uid}`"
        ),
    )
}

pub(crate) fn missing_root_table_binding_error(table_group_uid: &str) -> StrataError {
    build_error(
        ErrorCode::MissingRootTableBinding,
        "Missing root table binding",
        &format!("table group `{table_group_uid}` has no root table binding"),
    )
}

pub(crate) fn select_clause_finalized_error(column: &str) -> StrataError {
    build_error(
        ErrorCode::SelectClauseFinalized,
        "Select clause is finalized",
        &format!("cannot add `{column}` to a select list whose positions are already fixed"),
    )
}

pub(crate) fn temporary_tables_unsupported_error(dialect: &str, entity: &str) -> StrataError {
    build_error(
        ErrorCode::TemporaryTablesUnsupported,
        "Temporary tables unsupported",
        &format!(
            "bulk mutation of multi-table entity `{entity}` requires temporary tables, which dialect `{dialect}` does not support"
        ),
    )
}

pub(crate) fn invalid_configuration_error(description: &str) -> StrataError {
    build_error(
        ErrorCode::InvalidConfiguration,
        "Invalid configuration",
        description,
    )
}

pub(crate) fn unknown_entity_error(entity: &str) -> StrataError {
    build_error(
        ErrorCode::UnknownEntity,
        "Unknown entity",
        &format!("entity `{entity}` is not mapped"),
    )
}

pub(crate) fn unknown_attribute_error(entity: &str, path: &str) -> StrataError {
    build_error(
        ErrorCode::UnknownAttribute,
        "Unknown attribute",
        &format!("`{path}` does not resolve to a column-backed attribute of `{entity}`"),
    )
}

pub(crate) fn unsupported_mutation_error(description: &str) -> StrataError {
    build_error(
        ErrorCode::UnsupportedMutation,
        "Unsupported bulk mutation",
        description,
    )
}

pub(crate) fn invalid_expression_error(description: &str) -> StrataError {
    build_error(
        ErrorCode::InvalidExpression,
        "Invalid expression",
        description,
    )
}

pub(crate) fn unbound_parameter_error(parameter: &str) -> StrataError {
    build_error(
        ErrorCode::UnboundParameter,
        "Unbound parameter",
        &format!("no value was supplied for parameter {parameter}"),
    )
}

pub(crate) fn statement_execution_error(sql: &str, cause: StrataError) -> StrataError {
    build_error(
        ErrorCode::StatementExecution,
        "Statement execution failed",
        &format!("{}: {}", cause.title, cause.description),
    )
    .with_sql(sql)
    .with_cause(cause)
}

pub(crate) fn result_read_error(description: &str) -> StrataError {
    build_error(ErrorCode::ResultRead, "Result read failed", description)
}

#[cfg(test)]
mod tests {
    use super::{
        illegal_join_specification_error, statement_execution_error,
        temporary_tables_unsupported_error, unresolved_column_binding_error, ErrorCategory,
        ErrorCode,
    };
    use crate::StrataError;
    use std::collections::HashSet;

    #[test]
    fn error_code_strings_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::all() {
            let inserted = seen.insert(code.as_str());
            assert!(inserted, "duplicate error code string: {}", code.as_str());
        }
    }

    #[test]
    fn error_codes_round_trip_through_their_strings() {
        for code in ErrorCode::all() {
            assert_eq!(ErrorCode::from_code_str(code.as_str()), Some(*code));
        }
        assert_eq!(ErrorCode::from_code_str("STRATA_ERROR_NOPE"), None);
    }

    #[test]
    fn constructors_carry_code_and_category() {
        let join = illegal_join_specification_error("cross join");
        assert_eq!(join.code, "STRATA_ERROR_ILLEGAL_JOIN_SPECIFICATION");
        assert_eq!(join.category(), ErrorCategory::IllegalConstruction);

        let unresolved = unresolved_column_binding_error("audit", "created_by", "i1");
        assert_eq!(unresolved.category(), ErrorCategory::InternalConsistency);
        assert!(unresolved.description.contains("audit.created_by"));

        let config = temporary_tables_unsupported_error("generic", "Invoice");
        assert_eq!(config.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn statement_errors_keep_sql_and_cause() {
        let cause = StrataError::unknown("no such table: HT_invoice");
        let error = statement_execution_error("delete from invoice", cause.clone());
        assert_eq!(error.sql.as_deref(), Some("delete from invoice"));
        assert_eq!(error.cause.as_deref(), Some(&cause));
        assert!(error.description.contains("no such table"));
        assert_eq!(error.category(), ErrorCategory::BackendExecution);
    }
}
