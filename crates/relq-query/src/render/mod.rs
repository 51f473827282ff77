//! Command text generation.
//!
//! Renderers turn a finalized `SelectExpression` into the command text of
//! one SQL dialect. Placeholders render as `@name`; the values travel
//! separately in the processed parameter list.

mod generator;

pub use generator::QuerySqlGenerator;

use crate::error::Result;
use crate::expression::SelectExpression;

/// Trait for rendering a finalized query to command text.
pub trait QueryRenderer: Send + Sync {
    /// Unique name for this renderer
    fn name(&self) -> &str;

    /// Render the query. Fails on trees that still contain unexpanded
    /// sequence parameters.
    fn render(&self, select: &SelectExpression) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::TableExpression;

    struct MockRenderer;

    impl QueryRenderer for MockRenderer {
        fn name(&self) -> &str {
            "mock"
        }

        fn render(&self, select: &SelectExpression) -> Result<String> {
            Ok(format!("SELECT 1 FROM {}", select.table.name))
        }
    }

    #[test]
    fn test_mock_renderer() {
        let renderer: Box<dyn QueryRenderer> = Box::new(MockRenderer);
        let select = SelectExpression {
            table: TableExpression {
                name: "Blogs".into(),
                alias: "b".into(),
            },
            projections: Vec::new(),
            predicate: None,
            orderings: Vec::new(),
            limit: None,
        };

        assert_eq!(renderer.render(&select).unwrap(), "SELECT 1 FROM Blogs");
        assert_eq!(renderer.name(), "mock");
    }
}
