use sqlparser::ast::{BinaryOperator, Expr};

use super::{ColumnBinding, TableBinding, TableGroupId};
use crate::errors;
use crate::StrataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub const fn sql_text(self) -> &'static str {
        match self {
            Self::Inner => "inner join",
            Self::Left => "left outer join",
            Self::Right => "right outer join",
            Self::Full => "full outer join",
            Self::Cross => "cross join",
        }
    }
}

fn check_join_specification(kind: JoinKind, predicate: Option<&Expr>) -> Result<(), StrataError> {
    if kind == JoinKind::Cross && predicate.is_some() {
        return Err(errors::illegal_join_specification_error(kind.sql_text()));
    }
    Ok(())
}

/// A table binding joined into its table group.
#[derive(Debug, Clone)]
pub struct TableJoin {
    kind: JoinKind,
    binding: TableBinding,
    predicate: Option<Expr>,
}

impl TableJoin {
    pub fn new(
        kind: JoinKind,
        binding: TableBinding,
        predicate: Option<Expr>,
    ) -> Result<Self, StrataError> {
        check_join_specification(kind, predicate.as_ref())?;
        Ok(Self {
            kind,
            binding,
            predicate,
        })
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn binding(&self) -> &TableBinding {
        &self.binding
    }

    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }
}

/// A table group joined into a table space.
#[derive(Debug, Clone)]
pub struct TableGroupJoin {
    kind: JoinKind,
    group: TableGroupId,
    predicate: Option<Expr>,
}

impl TableGroupJoin {
    pub fn new(
        kind: JoinKind,
        group: TableGroupId,
        predicate: Option<Expr>,
    ) -> Result<Self, StrataError> {
        check_join_specification(kind, predicate.as_ref())?;
        Ok(Self {
            kind,
            group,
            predicate,
        })
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn group(&self) -> TableGroupId {
        self.group
    }

    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }
}

/// `lhs[0] = rhs[0] AND lhs[1] = rhs[1] ...`
pub fn column_equality_predicate(
    lhs: &[ColumnBinding],
    rhs: &[ColumnBinding],
) -> Result<Expr, StrataError> {
    if lhs.is_empty() || lhs.len() != rhs.len() {
        return Err(errors::invalid_expression_error(&format!(
            "cannot equate {} columns with {} columns",
            lhs.len(),
            rhs.len()
        )));
    }
    let mut pairs = lhs.iter().zip(rhs).map(|(left, right)| Expr::BinaryOp {
        left: Box::new(left.to_expr()),
        op: BinaryOperator::Eq,
        right: Box::new(right.to_expr()),
    });
    let first = pairs
        .next()
        .ok_or_else(|| errors::invalid_expression_error("join predicate needs columns"))?;
    Ok(pairs.fold(first, |acc, next| Expr::BinaryOp {
        left: Box::new(acc),
        op: BinaryOperator::And,
        right: Box::new(next),
    }))
}

#[cfg(test)]
mod tests {
    use super::{column_equality_predicate, JoinKind, TableGroupJoin, TableJoin};
    use crate::errors::ErrorCode;
    use crate::metadata::{PhysicalColumn, PhysicalTable, SqlType};
    use crate::sql::from::{ColumnBinding, TableBinding, TableGroupId};

    fn predicate() -> sqlparser::ast::Expr {
        let left = TableBinding::new(PhysicalTable::new("invoice"), "i1_0");
        let right = TableBinding::new(PhysicalTable::new("customer"), "c1_0");
        column_equality_predicate(
            &[ColumnBinding::new(
                PhysicalColumn::new("invoice", "customer_id", SqlType::Integer),
                &left,
            )],
            &[ColumnBinding::new(
                PhysicalColumn::new("customer", "id", SqlType::Integer),
                &right,
            )],
        )
        .expect("predicate should build")
    }

    #[test]
    fn cross_join_rejects_predicate() {
        let binding = TableBinding::new(PhysicalTable::new("customer"), "c1_0");
        let error = TableJoin::new(JoinKind::Cross, binding.clone(), Some(predicate()))
            .expect_err("cross join with predicate must fail");
        assert!(error.has_code(ErrorCode::IllegalJoinSpecification));

        let group_error =
            TableGroupJoin::new(JoinKind::Cross, TableGroupId(1), Some(predicate()))
                .expect_err("cross group join with predicate must fail");
        assert!(group_error.has_code(ErrorCode::IllegalJoinSpecification));
    }

    #[test]
    fn cross_join_without_predicate_is_accepted() {
        let binding = TableBinding::new(PhysicalTable::new("customer"), "c1_0");
        let join = TableJoin::new(JoinKind::Cross, binding, None).expect("plain cross join");
        assert_eq!(join.kind(), JoinKind::Cross);
        assert!(join.predicate().is_none());
        assert!(TableGroupJoin::new(JoinKind::Cross, TableGroupId(1), None).is_ok());
    }

    #[test]
    fn equality_predicate_renders_qualified_columns() {
        assert_eq!(predicate().to_string(), "i1_0.customer_id = c1_0.id");
    }

    #[test]
    fn equality_predicate_needs_matching_arity() {
        let binding = TableBinding::new(PhysicalTable::new("invoice"), "i1_0");
        let id = ColumnBinding::new(PhysicalColumn::new("invoice", "id", SqlType::Integer), &binding);
        assert!(column_equality_predicate(&[id], &[]).is_err());
    }
}
