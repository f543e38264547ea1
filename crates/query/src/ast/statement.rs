//! Statement AST: table sources, joins, select items and statements.
//!
//! These nodes are produced by an external parser; the builders here exist
//! so callers and tests can assemble queries directly.

use super::expr::Expression;
use super::name::QualifiedName;

/// Sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Placement of nulls in a sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NullOrder {
    /// Nulls sort lowest.
    #[default]
    Default,
    First,
    Last,
}

/// One ORDER BY item.
#[derive(Clone, Debug, PartialEq)]
pub struct SortItem {
    pub expression: Expression,
    pub order: SortOrder,
    pub null_order: NullOrder,
}

impl SortItem {
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            order: SortOrder::Asc,
            null_order: NullOrder::Default,
        }
    }

    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            order: SortOrder::Desc,
            null_order: NullOrder::Default,
        }
    }

    pub fn nulls(mut self, null_order: NullOrder) -> Self {
        self.null_order = null_order;
        self
    }
}

/// `WITH (name = value)` option attached to a table source.
#[derive(Clone, Debug, PartialEq)]
pub struct TableOption {
    pub name: String,
    pub value: Expression,
}

/// A FROM item.
#[derive(Clone, Debug, PartialEq)]
pub enum TableSource {
    /// A table, optionally catalog-qualified (`cat#table`).
    Table {
        catalog: Option<String>,
        name: QualifiedName,
        alias: Option<String>,
        options: Vec<TableOption>,
    },
    /// A table-valued function call.
    Function {
        catalog: Option<String>,
        name: String,
        args: Vec<Expression>,
        alias: Option<String>,
        options: Vec<TableOption>,
    },
}

impl TableSource {
    /// Creates a table source from a dotted table name.
    pub fn table(name: &str) -> Self {
        TableSource::Table {
            catalog: None,
            name: QualifiedName::parse(name),
            alias: None,
            options: Vec::new(),
        }
    }

    /// Creates a table function source.
    pub fn function(name: &str, args: Vec<Expression>) -> Self {
        TableSource::Function {
            catalog: None,
            name: name.to_string(),
            args,
            alias: None,
            options: Vec::new(),
        }
    }

    /// Sets the alias.
    pub fn alias(mut self, value: &str) -> Self {
        match &mut self {
            TableSource::Table { alias, .. } | TableSource::Function { alias, .. } => {
                *alias = Some(value.to_string())
            }
        }
        self
    }

    /// Sets the catalog alias.
    pub fn catalog(mut self, value: &str) -> Self {
        match &mut self {
            TableSource::Table { catalog, .. } | TableSource::Function { catalog, .. } => {
                *catalog = Some(value.to_string())
            }
        }
        self
    }

    /// Adds a table option.
    pub fn option(mut self, name: &str, value: Expression) -> Self {
        match &mut self {
            TableSource::Table { options, .. } | TableSource::Function { options, .. } => {
                options.push(TableOption {
                    name: name.to_string(),
                    value,
                })
            }
        }
        self
    }

    /// The alias name, defaulting to the last part of the table name or the
    /// function name.
    pub fn alias_name(&self) -> String {
        match self {
            TableSource::Table { name, alias, .. } => alias
                .clone()
                .unwrap_or_else(|| name.last().unwrap_or_default().to_string()),
            TableSource::Function { name, alias, .. } => alias.clone().unwrap_or_else(|| name.clone()),
        }
    }

    pub fn catalog_alias(&self) -> Option<&str> {
        match self {
            TableSource::Table { catalog, .. } | TableSource::Function { catalog, .. } => {
                catalog.as_deref()
            }
        }
    }

    pub fn options(&self) -> &[TableOption] {
        match self {
            TableSource::Table { options, .. } | TableSource::Function { options, .. } => options,
        }
    }

    /// Source name as written, for diagnostics.
    pub fn source_name(&self) -> String {
        match self {
            TableSource::Table { name, .. } => name.to_string(),
            TableSource::Function { name, .. } => format!("{}()", name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyType {
    Cross,
    Outer,
}

/// How a joined source attaches to the preceding ones.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinKind {
    Join {
        join_type: JoinType,
        condition: Expression,
    },
    Apply(ApplyType),
}

/// A JOIN or APPLY clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub source: TableSource,
    pub kind: JoinKind,
    /// Group the inner rows under the outer tuple instead of flattening.
    pub populate: bool,
}

impl Join {
    pub fn inner(source: TableSource, condition: Expression) -> Self {
        Self {
            source,
            kind: JoinKind::Join {
                join_type: JoinType::Inner,
                condition,
            },
            populate: false,
        }
    }

    pub fn left(source: TableSource, condition: Expression) -> Self {
        Self {
            source,
            kind: JoinKind::Join {
                join_type: JoinType::Left,
                condition,
            },
            populate: false,
        }
    }

    pub fn cross_apply(source: TableSource) -> Self {
        Self {
            source,
            kind: JoinKind::Apply(ApplyType::Cross),
            populate: false,
        }
    }

    pub fn outer_apply(source: TableSource) -> Self {
        Self {
            source,
            kind: JoinKind::Apply(ApplyType::Outer),
            populate: false,
        }
    }

    /// Marks the join as populating.
    pub fn populate(mut self) -> Self {
        self.populate = true;
        self
    }

    /// True for LEFT joins and OUTER applies.
    pub fn is_outer(&self) -> bool {
        matches!(
            self.kind,
            JoinKind::Join {
                join_type: JoinType::Left,
                ..
            } | JoinKind::Apply(ApplyType::Outer)
        )
    }

    pub fn condition(&self) -> Option<&Expression> {
        match &self.kind {
            JoinKind::Join { condition, .. } => Some(condition),
            JoinKind::Apply(_) => None,
        }
    }
}

/// FROM clause: a source followed by its joins.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSourceJoined {
    pub source: TableSource,
    pub joins: Vec<Join>,
}

/// Shape of a nested select item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NestedShape {
    Object,
    Array,
}

/// One SELECT item.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    Expression {
        expression: Expression,
        alias: Option<String>,
    },
    /// `*` or `alias.*`.
    Asterisk { alias: Option<String> },
    /// `OBJECT(...)` / `ARRAY(...)`, optionally iterating the rows of an
    /// alias given by `from`.
    Nested {
        shape: NestedShape,
        alias: Option<String>,
        from: Option<Expression>,
        items: Vec<SelectItem>,
        where_clause: Option<Expression>,
        order_by: Vec<SortItem>,
    },
}

impl SelectItem {
    pub fn expr(expression: Expression) -> Self {
        SelectItem::Expression {
            expression,
            alias: None,
        }
    }

    pub fn named(expression: Expression, alias: &str) -> Self {
        SelectItem::Expression {
            expression,
            alias: Some(alias.to_string()),
        }
    }

    pub fn asterisk(alias: Option<&str>) -> Self {
        SelectItem::Asterisk {
            alias: alias.map(str::to_string),
        }
    }

    pub fn object(alias: &str, from: Option<Expression>, items: Vec<SelectItem>) -> Self {
        SelectItem::Nested {
            shape: NestedShape::Object,
            alias: Some(alias.to_string()),
            from,
            items,
            where_clause: None,
            order_by: Vec::new(),
        }
    }

    pub fn array(alias: &str, from: Option<Expression>, items: Vec<SelectItem>) -> Self {
        SelectItem::Nested {
            shape: NestedShape::Array,
            alias: Some(alias.to_string()),
            from,
            items,
            where_clause: None,
            order_by: Vec::new(),
        }
    }

    /// Adds a filter to a nested item. Other items are returned unchanged.
    pub fn filter(mut self, predicate: Expression) -> Self {
        if let SelectItem::Nested { where_clause, .. } = &mut self {
            *where_clause = Some(predicate);
        }
        self
    }

    /// Adds ordering to a nested item. Other items are returned unchanged.
    pub fn order_by(mut self, items: Vec<SortItem>) -> Self {
        if let SelectItem::Nested { order_by, .. } = &mut self {
            *order_by = items;
        }
        self
    }
}

/// A SELECT statement.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Select {
    pub items: Vec<SelectItem>,
    pub from: Option<TableSourceJoined>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub order_by: Vec<SortItem>,
    pub top: Option<Expression>,
}

impl Select {
    pub fn new(items: Vec<SelectItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn from(mut self, source: TableSource) -> Self {
        self.from = Some(TableSourceJoined {
            source,
            joins: Vec::new(),
        });
        self
    }

    /// Appends a join. Requires a prior [`Select::from`]; otherwise the join
    /// becomes the FROM source.
    pub fn join(mut self, join: Join) -> Self {
        match &mut self.from {
            Some(from) => from.joins.push(join),
            None => {
                self.from = Some(TableSourceJoined {
                    source: join.source,
                    joins: Vec::new(),
                })
            }
        }
        self
    }

    pub fn filter(mut self, predicate: Expression) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn group_by(mut self, expressions: Vec<Expression>) -> Self {
        self.group_by = expressions;
        self
    }

    pub fn order_by(mut self, items: Vec<SortItem>) -> Self {
        self.order_by = items;
        self
    }

    pub fn top(mut self, count: Expression) -> Self {
        self.top = Some(count);
        self
    }
}

/// A statement in a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select(Select),
    /// `SET @name = value`
    SetVariable { name: String, value: Expression },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_defaults() {
        assert_eq!(TableSource::table("db.orders").alias_name(), "orders");
        assert_eq!(TableSource::table("orders").alias("o").alias_name(), "o");
        assert_eq!(TableSource::function("range", vec![]).alias_name(), "range");
    }

    #[test]
    fn test_select_builder() {
        let select = Select::new(vec![SelectItem::asterisk(None)])
            .from(TableSource::table("t").alias("a"))
            .join(Join::left(TableSource::table("u").alias("b"), Expression::col("a.id")).populate())
            .top(Expression::lit(10i32));
        let from = select.from.as_ref().map(|f| f.joins.len());
        assert_eq!(from, Some(1));
        assert!(select.from.as_ref().is_some_and(|f| f.joins[0].populate && f.joins[0].is_outer()));
        assert!(select.top.is_some());
    }

    #[test]
    fn test_catalog_and_options() {
        let source = TableSource::table("t")
            .catalog("mem")
            .option("batch_size", Expression::lit(10i32));
        assert_eq!(source.catalog_alias(), Some("mem"));
        assert_eq!(source.options().len(), 1);
        assert_eq!(source.source_name(), "t");
    }
}
