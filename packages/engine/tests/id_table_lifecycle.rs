mod support;

use strata_engine::sql::mutation::{ensure_id_table, release_id_table, IdTable, LifecycleOutcome};
use strata_engine::{
    compile_bulk_mutation, BulkMutation, EngineConfig, ExecutionContext, QueryParameters,
    SqlDialect, StandardWhereCompiler, Value,
};

use support::{invoice_model, seeded_backend, NullBackend, RecordingBackend};

async fn run_delete_times(dialect: SqlDialect, config: &EngineConfig, times: usize) -> Vec<String> {
    let backend = RecordingBackend::new(NullBackend {
        dialect,
        rows_affected: 2,
    });
    let mutation = BulkMutation::delete("Invoice")
        .filter("total > ?")
        .unwrap();
    let executor = compile_bulk_mutation(
        &mutation,
        &invoice_model(),
        dialect,
        config,
        &StandardWhereCompiler,
    )
    .unwrap();
    for _ in 0..times {
        let affected = executor
            .execute(
                &backend,
                &QueryParameters::positional([Value::Integer(100)]),
                &ExecutionContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }
    backend.sql()
}

async fn run_delete(dialect: SqlDialect, config: &EngineConfig) -> Vec<String> {
    run_delete_times(dialect, config, 1).await
}

#[tokio::test]
async fn global_temporary_tables_are_purged_not_dropped() {
    let sql = run_delete(SqlDialect::Oracle, &EngineConfig::default()).await;
    assert!(sql[0].starts_with("create global temporary table HT_invoice"));
    assert!(sql[0].ends_with("on commit delete rows"));
    assert!(sql[1].ends_with("where i1_0.dtype = 'INV' and (i1_0.total > ?)"));
    assert_eq!(sql.last().map(String::as_str), Some("delete from HT_invoice"));
}

#[tokio::test]
async fn transaction_scoped_tables_are_purged_after_every_execution() {
    let sql = run_delete_times(SqlDialect::H2, &EngineConfig::default(), 2).await;
    assert!(sql[0].starts_with("create cached local temporary table if not exists HT_invoice"));
    let purges = sql
        .iter()
        .enumerate()
        .filter(|(_, statement)| statement.as_str() == "delete from HT_invoice")
        .map(|(position, _)| position)
        .collect::<Vec<_>>();
    assert_eq!(purges.len(), 2);
    // each purge closes its own execution, before the next create
    let second_create = sql
        .iter()
        .rposition(|statement| statement.starts_with("create cached local temporary table"))
        .unwrap();
    assert!(purges[0] < second_create);
    assert_eq!(purges[1], sql.len() - 1);
    assert!(!sql.iter().any(|statement| statement.starts_with("drop table")));
}

#[tokio::test]
async fn existing_id_tables_are_not_created() {
    let config = EngineConfig::from_json(r#"{ "create_id_tables": false, "id_table_prefix": "ids_" }"#)
        .unwrap();
    let sql = run_delete(SqlDialect::Postgres, &config).await;
    assert!(sql[0].starts_with("insert into ids_invoice (id) select i1_0.id"));
    assert!(sql[0].ends_with("(i1_0.total > $1)"));
    assert_eq!(sql.last().map(String::as_str), Some("delete from ids_invoice"));
    assert!(!sql.iter().any(|statement| statement.starts_with("drop table")));
}

#[tokio::test]
async fn existing_id_table_survives_repeated_executions() {
    let sqlite = seeded_backend();
    sqlite
        .run_script("create table HT_invoice (id integer not null);")
        .unwrap();
    let backend = RecordingBackend::new(sqlite);
    let config = EngineConfig {
        create_id_tables: false,
        drop_id_tables: Some(true),
        ..EngineConfig::default()
    };
    let mutation = BulkMutation::delete("Invoice")
        .filter("total > ?")
        .unwrap();
    let executor = compile_bulk_mutation(
        &mutation,
        &invoice_model(),
        SqlDialect::Sqlite,
        &config,
        &StandardWhereCompiler,
    )
    .unwrap();

    let mut affected = Vec::new();
    for _ in 0..2 {
        affected.push(
            executor
                .execute(
                    &backend,
                    &QueryParameters::positional([Value::Integer(100)]),
                    &ExecutionContext::new(),
                )
                .await
                .expect("the pre-existing id table stays in place"),
        );
    }
    assert_eq!(affected, vec![3, 0]);
    assert!(!backend
        .sql()
        .iter()
        .any(|statement| statement.starts_with("create") || statement.starts_with("drop")));
    assert_eq!(backend.inner().count("HT_invoice").unwrap(), 0);
}

#[tokio::test]
async fn lifecycle_failures_are_reported_not_raised() {
    let backend = RecordingBackend::new(NullBackend {
        dialect: SqlDialect::Sqlite,
        rows_affected: 0,
    })
    .failing_on("HT_invoice");
    let model = invoice_model();
    let invoice = strata_engine::metadata::require_entity(&model, "Invoice").unwrap();
    let config = EngineConfig::default();
    let table = IdTable::for_entity(invoice, &config, SqlDialect::Sqlite).unwrap();

    let created = ensure_id_table(&backend, &table, &config).await;
    let released = release_id_table(&backend, &table, &config).await;
    assert!(created.is_failed());
    assert!(matches!(released, LifecycleOutcome::Failed { ref sql, .. } if sql == "drop table HT_invoice"));

    let skipped = ensure_id_table(
        &backend,
        &table,
        &EngineConfig {
            create_id_tables: false,
            ..EngineConfig::default()
        },
    )
    .await;
    assert_eq!(skipped, LifecycleOutcome::Skipped);
}
