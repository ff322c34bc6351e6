use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use sqlparser::ast::{Expr, Ident};

use super::TableBinding;
use crate::metadata::PhysicalColumn;
use crate::sql::reader::ValueReader;

/// A physical column resolved against the table binding that owns it.
///
/// Equality, hashing and ordering only look at the owning alias and the column
/// expression, which is what makes two bindings interchangeable in SQL.
#[derive(Debug, Clone)]
pub struct ColumnBinding {
    column: PhysicalColumn,
    reader: ValueReader,
    identification_variable: String,
}

impl ColumnBinding {
    pub fn new(column: PhysicalColumn, table_binding: &TableBinding) -> Self {
        Self {
            reader: ValueReader::for_type(column.sql_type),
            column,
            identification_variable: table_binding.identification_variable().to_string(),
        }
    }

    pub fn column(&self) -> &PhysicalColumn {
        &self.column
    }

    pub fn reader(&self) -> ValueReader {
        self.reader
    }

    pub fn identification_variable(&self) -> &str {
        &self.identification_variable
    }

    pub fn column_expression(&self) -> &str {
        &self.column.name
    }

    pub fn to_expr(&self) -> Expr {
        Expr::CompoundIdentifier(vec![
            Ident::new(self.identification_variable.as_str()),
            Ident::new(self.column.name.as_str()),
        ])
    }

    pub fn render(&self) -> String {
        format!("{}.{}", self.identification_variable, self.column.name)
    }

    fn sort_key(&self) -> (&str, &str) {
        (self.identification_variable.as_str(), self.column.name.as_str())
    }
}

impl PartialEq for ColumnBinding {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for ColumnBinding {}

impl Hash for ColumnBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for ColumnBinding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnBinding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
