use crate::sql::from::{FromClause, JoinKind, TableBinding, TableGroup, TableSpace};
use crate::StrataError;

/// `table alias`, or `(subquery) alias` for union roots.
pub fn render_table(binding: &TableBinding) -> String {
    let table = binding.table();
    match &table.subquery {
        Some(subquery) => format!("({subquery}) {}", binding.identification_variable()),
        None => format!("{} {}", table.name, binding.identification_variable()),
    }
}

/// ` from a i1_0 inner join b i1_1 on ..., c c1_0`
pub fn render_from_clause(from: &FromClause) -> Result<String, StrataError> {
    let spaces = from
        .table_spaces()
        .iter()
        .map(|space| render_table_space(from, space))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(" from {}", spaces.join(", ")))
}

fn render_table_space(from: &FromClause, space: &TableSpace) -> Result<String, StrataError> {
    let mut sql = String::new();
    let root = from.table_group(space.root_group())?;
    sql.push_str(&render_table(root.root_table_binding()?));
    render_table_joins(&mut sql, root, None);

    for join in space.joined_groups() {
        let group = from.table_group(join.group())?;
        sql.push(' ');
        sql.push_str(join.kind().sql_text());
        sql.push(' ');
        sql.push_str(&render_table(group.root_table_binding()?));
        if let Some(predicate) = join.predicate() {
            sql.push_str(&format!(" on {predicate}"));
        }
        render_table_joins(&mut sql, group, Some(join.kind()));
    }
    Ok(sql)
}

/// Secondary tables of a group reached through an outer join must not filter
/// the outer rows, so their inner joins widen to left joins.
fn render_table_joins(sql: &mut String, group: &TableGroup, group_join: Option<JoinKind>) {
    let outer = matches!(
        group_join,
        Some(JoinKind::Left | JoinKind::Right | JoinKind::Full)
    );
    for join in group.table_joins() {
        let kind = match join.kind() {
            JoinKind::Inner if outer => JoinKind::Left,
            kind => kind,
        };
        sql.push(' ');
        sql.push_str(kind.sql_text());
        sql.push(' ');
        sql.push_str(&render_table(join.binding()));
        if let Some(predicate) = join.predicate() {
            sql.push_str(&format!(" on {predicate}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::render_from_clause;
    use crate::metadata::{
        AttributeMapping, EntityDescriptor, Metamodel, PhysicalColumn, PhysicalTable, SqlType,
        StaticMetamodel, TableMapping,
    };
    use crate::sql::from::{FromClause, JoinKind};

    fn model() -> StaticMetamodel {
        let customer = EntityDescriptor::new(
            "Customer",
            PhysicalTable::new("customer"),
            AttributeMapping::basic("id", PhysicalColumn::new("customer", "id", SqlType::Integer)),
        )
        .with_joined_table(TableMapping::new("customer_profile", ["customer_id"]));
        let invoice = EntityDescriptor::new(
            "Invoice",
            PhysicalTable::new("invoice"),
            AttributeMapping::basic("id", PhysicalColumn::new("invoice", "id", SqlType::Integer)),
        )
        .with_joined_table(TableMapping::new("invoice_detail", ["invoice_id"]))
        .with_attribute(AttributeMapping::to_one(
            "customer",
            "Customer",
            vec![PhysicalColumn::new("invoice", "customer_id", SqlType::Integer)],
        ));
        let payment = EntityDescriptor::new(
            "Payment",
            PhysicalTable::union_of(
                "payment",
                ["card_payment", "cash_payment"],
                "select id from card_payment union all select id from cash_payment",
            ),
            AttributeMapping::basic("id", PhysicalColumn::new("payment", "id", SqlType::Integer)),
        );
        StaticMetamodel::new()
            .with_entity(customer)
            .with_entity(invoice)
            .with_entity(payment)
    }

    #[test]
    fn outer_group_join_widens_secondary_inner_joins() {
        let model = model();
        let invoice = model.entity("Invoice").unwrap().clone();
        let mut from = FromClause::new();
        let root = from.add_root_entity(&invoice, None).unwrap();
        from.add_entity_join(root, "customer", JoinKind::Left, &model, None)
            .unwrap();

        assert_eq!(
            render_from_clause(&from).unwrap(),
            " from invoice i1_0 inner join invoice_detail i1_1 on i1_0.id = i1_1.invoice_id \
             left outer join customer c1_0 on i1_0.customer_id = c1_0.id \
             left outer join customer_profile c1_1 on c1_0.id = c1_1.customer_id"
        );
    }

    #[test]
    fn union_root_renders_as_subquery() {
        let model = model();
        let payment = model.entity("Payment").unwrap().clone();
        let mut from = FromClause::new();
        from.add_root_entity(&payment, None).unwrap();
        assert_eq!(
            render_from_clause(&from).unwrap(),
            " from (select id from card_payment union all select id from cash_payment) p1_0"
        );
    }
}
