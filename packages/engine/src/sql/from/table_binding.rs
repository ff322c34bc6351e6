use crate::metadata::PhysicalTable;

/// One aliased occurrence of a physical table in a compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    table: PhysicalTable,
    identification_variable: String,
}

impl TableBinding {
    pub fn new(table: PhysicalTable, identification_variable: impl Into<String>) -> Self {
        Self {
            table,
            identification_variable: identification_variable.into(),
        }
    }

    pub fn table(&self) -> &PhysicalTable {
        &self.table
    }

    pub fn identification_variable(&self) -> &str {
        &self.identification_variable
    }

    /// True when `table` is this binding's table, or one of the subclass
    /// tables it stands in for.
    pub fn binds(&self, table: &str) -> bool {
        self.table.includes(table)
    }
}
