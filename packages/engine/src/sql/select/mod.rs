//! Select-list resolution: selectables, the select clause and the returns
//! that read result rows back.

mod hydrate;
mod query_return;
mod select_clause;
mod selectable;

pub use hydrate::{AttributeValue, EntityRow, ReturnValue};
pub use query_return::{
    AttributeReturn, AttributeRole, QueryReturn, SqlSelection, SqlSelectionGroup,
    SqlSelectionResolver,
};
pub use select_clause::{SelectClause, Selection, SqlSelectionCollector};
pub use selectable::{ColumnBindingGroup, EntityAttributeBindings, Selectable};
