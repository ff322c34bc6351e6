use tracing::{debug, warn};

use super::id_table::IdTable;
use crate::dialect::{AfterUseAction, BeforeUseAction, TemporaryTableIsolation};
use crate::{EngineConfig, StrataBackend, StrataError};

/// Result of an id table lifecycle step. Failures are reported here and
/// logged, never propagated.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOutcome {
    Completed { sql: String },
    Skipped,
    Failed { sql: String, error: StrataError },
}

impl LifecycleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

async fn run_ddl(
    backend: &dyn StrataBackend,
    sql: &str,
    isolation: TemporaryTableIsolation,
) -> Result<(), StrataError> {
    match isolation {
        TemporaryTableIsolation::RunInline => backend.execute(sql, &[]).await.map(|_| ()),
        TemporaryTableIsolation::RunIsolatedTransactional => {
            backend.execute_isolated(sql, true).await
        }
        TemporaryTableIsolation::RunIsolatedNonTransactional => {
            backend.execute_isolated(sql, false).await
        }
    }
}

/// Creates the id table unless it is expected to exist already.
pub async fn ensure_id_table(
    backend: &dyn StrataBackend,
    table: &IdTable,
    config: &EngineConfig,
) -> LifecycleOutcome {
    if table.before_use_action(config) == BeforeUseAction::None {
        return LifecycleOutcome::Skipped;
    }
    let sql = table.create_ddl();
    debug!(sql = %sql, "creating id table");
    match run_ddl(backend, &sql, table.dialect().temporary_table_ddl_isolation()).await {
        Ok(()) => LifecycleOutcome::Completed { sql },
        Err(error) => {
            // The id capture insert fails loudly if the table is really missing.
            debug!(table = table.name(), sql = %sql, error = %error, "unable to create id table");
            LifecycleOutcome::Failed { sql, error }
        }
    }
}

/// Drops or purges the id table after use.
pub async fn release_id_table(
    backend: &dyn StrataBackend,
    table: &IdTable,
    config: &EngineConfig,
) -> LifecycleOutcome {
    let (sql, result) = match table.after_use_action(config) {
        AfterUseAction::Drop => {
            let sql = table.drop_ddl();
            debug!(sql = %sql, "dropping id table");
            let result =
                run_ddl(backend, &sql, table.dialect().temporary_table_ddl_isolation()).await;
            (sql, result)
        }
        AfterUseAction::Clean => {
            let sql = table.clean_sql();
            debug!(sql = %sql, "cleaning id table");
            let result = backend.execute(&sql, &[]).await.map(|_| ());
            (sql, result)
        }
    };
    match result {
        Ok(()) => LifecycleOutcome::Completed { sql },
        Err(error) => {
            warn!(table = table.name(), sql = %sql, error = %error, "unable to release id table");
            LifecycleOutcome::Failed { sql, error }
        }
    }
}
