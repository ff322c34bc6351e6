use std::collections::BTreeMap;

use super::query_return::{QueryReturn, SqlSelection, SqlSelectionResolver};
use super::selectable::Selectable;
use crate::errors;
use crate::sql::from::ColumnBinding;
use crate::StrataError;

/// One logical selection: what is selected, the source expression it came
/// from and the caller's result alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub selectable: Selectable,
    pub source: String,
    pub result_alias: Option<String>,
}

impl Selection {
    pub fn new(selectable: Selectable, source: impl Into<String>) -> Self {
        Self {
            selectable,
            source: source.into(),
            result_alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.result_alias = Some(alias.into());
        self
    }
}

/// The flattened, deduplicated select list. Positions never move once
/// assigned.
#[derive(Debug, Clone, Default)]
pub struct SqlSelectionCollector {
    bindings: Vec<ColumnBinding>,
    positions: BTreeMap<ColumnBinding, usize>,
    finalized: bool,
}

impl SqlSelectionCollector {
    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl SqlSelectionResolver for SqlSelectionCollector {
    fn resolve_sql_selection(
        &mut self,
        binding: &ColumnBinding,
    ) -> Result<SqlSelection, StrataError> {
        if let Some(position) = self.positions.get(binding) {
            return Ok(SqlSelection::new(*position, binding));
        }
        if self.finalized {
            return Err(errors::select_clause_finalized_error(&binding.render()));
        }
        let position = self.bindings.len();
        self.bindings.push(binding.clone());
        self.positions.insert(binding.clone(), position);
        Ok(SqlSelection::new(position, binding))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectClause {
    selections: Vec<Selection>,
    collector: SqlSelectionCollector,
    distinct: bool,
}

impl SelectClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn add_selection(&mut self, selection: Selection) -> Result<(), StrataError> {
        if self.collector.finalized {
            return Err(errors::select_clause_finalized_error(&selection.source));
        }
        self.selections.push(selection);
        Ok(())
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn collector_mut(&mut self) -> &mut SqlSelectionCollector {
        &mut self.collector
    }

    pub fn sql_selections(&self) -> &[ColumnBinding] {
        self.collector.bindings()
    }

    /// Assigns select-list positions to every selection, in selection order,
    /// and freezes the list.
    pub fn finalize(&mut self) -> Result<Vec<QueryReturn>, StrataError> {
        let returns = self
            .selections
            .iter()
            .map(|selection| {
                selection
                    .selectable
                    .to_query_return(selection.result_alias.as_deref(), &mut self.collector)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.collector.finalized = true;
        Ok(returns)
    }

    /// `select [distinct] a, b, ...`
    pub fn render(&self) -> String {
        let columns = self
            .collector
            .bindings
            .iter()
            .map(ColumnBinding::render)
            .collect::<Vec<_>>()
            .join(", ");
        if self.distinct {
            format!("select distinct {columns}")
        } else {
            format!("select {columns}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectClause, Selection};
    use crate::errors::ErrorCode;
    use crate::metadata::{PhysicalColumn, PhysicalTable, SqlType};
    use crate::sql::from::{ColumnBinding, TableBinding};
    use crate::sql::select::{QueryReturn, Selectable, SqlSelectionResolver};

    fn binding(column: &str) -> ColumnBinding {
        let table = TableBinding::new(PhysicalTable::new("invoice"), "i1_0");
        ColumnBinding::new(PhysicalColumn::new("invoice", column, SqlType::Integer), &table)
    }

    #[test]
    fn shared_columns_are_selected_once() {
        let mut clause = SelectClause::new();
        clause
            .add_selection(Selection::new(
                Selectable::Scalar {
                    binding: binding("id"),
                },
                "i.id",
            ))
            .unwrap();
        clause
            .add_selection(
                Selection::new(
                    Selectable::Composite {
                        embeddable: "Key".to_string(),
                        bindings: vec![binding("id"), binding("revision")],
                    },
                    "i.key",
                )
                .with_alias("key"),
            )
            .unwrap();

        let returns = clause.finalize().unwrap();
        assert_eq!(clause.render(), "select i1_0.id, i1_0.revision");
        let QueryReturn::Composite { alias, selections, .. } = &returns[1] else {
            panic!("expected a composite return");
        };
        assert_eq!(alias.as_deref(), Some("key"));
        let positions = selections
            .selections()
            .iter()
            .map(|selection| selection.position())
            .collect::<Vec<_>>();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn finalized_clause_rejects_new_columns() {
        let mut clause = SelectClause::new();
        clause.set_distinct(true);
        clause
            .add_selection(Selection::new(
                Selectable::Scalar {
                    binding: binding("id"),
                },
                "i.id",
            ))
            .unwrap();
        clause.finalize().unwrap();
        assert_eq!(clause.render(), "select distinct i1_0.id");

        let known = clause
            .collector_mut()
            .resolve_sql_selection(&binding("id"))
            .expect("existing column keeps its slot");
        assert_eq!(known.jdbc_position(), 1);

        let error = clause
            .collector_mut()
            .resolve_sql_selection(&binding("total"))
            .expect_err("new column after finalize");
        assert!(error.has_code(ErrorCode::SelectClauseFinalized));
        assert!(clause
            .add_selection(Selection::new(
                Selectable::Scalar {
                    binding: binding("total"),
                },
                "i.total",
            ))
            .is_err());
    }
}
