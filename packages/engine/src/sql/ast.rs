use sqlparser::ast::{BinaryOperator, Expr};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::errors;
use crate::StrataError;

/// Parses a standalone expression such as a filter or an assignment value.
pub fn parse_expression(sql: &str) -> Result<Expr, StrataError> {
    let dialect = GenericDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(sql)
        .map_err(|error| errors::invalid_expression_error(&format!("`{sql}`: {error}")))?;
    let expression = parser
        .parse_expr()
        .map_err(|error| errors::invalid_expression_error(&format!("`{sql}`: {error}")))?;
    let trailing = parser.peek_token();
    if trailing.token != Token::EOF {
        return Err(errors::invalid_expression_error(&format!(
            "`{sql}`: unexpected `{}` after expression",
            trailing.token
        )));
    }
    Ok(expression)
}

pub(crate) fn conjunction(expressions: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    expressions.into_iter().reduce(|left, right| Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::And,
        right: Box::new(right),
    })
}

/// Wraps compound expressions in parentheses so they survive being combined.
pub(crate) fn nested(expression: Expr) -> Expr {
    match expression {
        Expr::BinaryOp { .. } => Expr::Nested(Box::new(expression)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{conjunction, nested, parse_expression};
    use crate::errors::ErrorCode;

    #[test]
    fn parses_placeholders_and_paths() {
        let expression = parse_expression("i.total > ? and c.code = :code").unwrap();
        assert_eq!(expression.to_string(), "i.total > ? AND c.code = :code");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let error = parse_expression("total > 1 total").expect_err("trailing identifier");
        assert!(error.has_code(ErrorCode::InvalidExpression));
    }

    #[test]
    fn conjunction_keeps_operands_grouped() {
        let left = nested(parse_expression("a = 1 or b = 2").unwrap());
        let right = nested(parse_expression("c = 3").unwrap());
        assert_eq!(
            conjunction([left, right]).map(|expression| expression.to_string()),
            Some("(a = 1 OR b = 2) AND c = 3".to_string())
        );
        assert!(conjunction(Vec::new()).is_none());
    }
}
