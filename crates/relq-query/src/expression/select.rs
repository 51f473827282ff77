//! Single-table SELECT statement built from SQL expressions.

use super::SqlExpr;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableExpression {
    pub name: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionExpression {
    pub alias: String,
    pub expression: SqlExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingExpression {
    pub expression: SqlExpr,
    pub ascending: bool,
}

/// A translated query: projections over one table with an optional
/// predicate, ordering and row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectExpression {
    pub table: TableExpression,
    pub projections: Vec<ProjectionExpression>,
    pub predicate: Option<SqlExpr>,
    pub orderings: Vec<OrderingExpression>,
    pub limit: Option<SqlExpr>,
}

impl SelectExpression {
    /// Every top-level expression in rendering order: projections,
    /// predicate, orderings, limit.
    pub fn expressions(&self) -> impl Iterator<Item = &SqlExpr> {
        self.projections
            .iter()
            .map(|p| &p.expression)
            .chain(self.predicate.iter())
            .chain(self.orderings.iter().map(|o| &o.expression))
            .chain(self.limit.iter())
    }

    /// Rebuild with `f` applied to each top-level expression, in the same
    /// order as [`expressions`](Self::expressions).
    pub fn try_map<F>(&self, mut f: F) -> Result<SelectExpression>
    where
        F: FnMut(&SqlExpr) -> Result<SqlExpr>,
    {
        let projections = self
            .projections
            .iter()
            .map(|p| {
                Ok(ProjectionExpression {
                    alias: p.alias.clone(),
                    expression: f(&p.expression)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let predicate = self.predicate.as_ref().map(&mut f).transpose()?;

        let orderings = self
            .orderings
            .iter()
            .map(|o| {
                Ok(OrderingExpression {
                    expression: f(&o.expression)?,
                    ascending: o.ascending,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let limit = self.limit.as_ref().map(&mut f).transpose()?;

        Ok(SelectExpression {
            table: self.table.clone(),
            projections,
            predicate,
            orderings,
            limit,
        })
    }
}
