//! Expression traversal and placeholder binding.

use super::ast::{EqValue, Expression, Query};
use crate::error::{Error, Result};

/// Walks an expression tree in pre-order.
///
/// The callback returns `false` to stop the traversal; `walk` then
/// returns `false` as well.
pub fn walk<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a Expression) -> bool) -> bool {
    if !f(expr) {
        return false;
    }

    match expr {
        Expression::Eq { .. } => true,
        Expression::Not(child) => walk(child, f),
        Expression::And(children) | Expression::Or(children) => {
            children.iter().all(|child| walk(child, f))
        }
    }
}

impl Query {
    /// Returns a copy of the query with every placeholder `$n` replaced
    /// by `args[n - 1]`.
    ///
    /// Values are substituted as strings; no coercion is performed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if an argument is missing.
    pub fn bind(&self, args: &[String]) -> Result<Query> {
        let mut query = self.clone();
        bind_expr(&mut query.expr, args)?;
        Ok(query)
    }
}

fn bind_expr(expr: &mut Expression, args: &[String]) -> Result<()> {
    match expr {
        Expression::Eq { value, .. } => {
            if let EqValue::Placeholder(n) = value {
                let index = *n as usize - 1;
                let arg = args.get(index).ok_or_else(|| {
                    Error::Argument(format!("no argument bound for placeholder ${n}"))
                })?;
                *value = EqValue::Literal(arg.clone());
            }
            Ok(())
        }
        Expression::Not(child) => bind_expr(child, args),
        Expression::And(children) | Expression::Or(children) => {
            children.iter_mut().try_for_each(|child| bind_expr(child, args))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Parser;
    use super::*;

    #[test]
    fn walk_visits_in_preorder() {
        let query = Parser::parse(r#"foo = "bar" | ( bar = "baz" & ^ baz = "quux" )"#).unwrap();

        let mut kinds = Vec::new();
        walk(&query.expr, &mut |e| {
            kinds.push(match e {
                Expression::Eq { .. } => "eq",
                Expression::Not(_) => "not",
                Expression::And(_) => "and",
                Expression::Or(_) => "or",
            });
            true
        });

        assert_eq!(kinds, vec!["or", "eq", "and", "eq", "not", "eq"]);
    }

    #[test]
    fn walk_stops_when_asked() {
        let query = Parser::parse(r#"a = "1" & b = "2""#).unwrap();
        let mut visits = 0;
        let finished = walk(&query.expr, &mut |_| {
            visits += 1;
            false
        });
        assert!(!finished);
        assert_eq!(visits, 1);
    }

    #[test]
    fn bind_replaces_placeholders() {
        let query = Parser::parse(r#"foo = $1 | ( bar = $2 & ^ baz = $3 )"#).unwrap();
        let bound = query
            .bind(&["1".to_string(), "2".to_string(), "3".to_string()])
            .unwrap();

        assert_eq!(
            bound.to_string(),
            r#"foo = "1" | ( bar = "2" & ^ baz = "3" )"#
        );
    }

    #[test]
    fn bind_reports_missing_arguments() {
        let query = Parser::parse("foo = $2").unwrap();
        let err = query.bind(&["only-one".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn bind_leaves_literals_alone() {
        let query = Parser::parse(r#"foo = "bar""#).unwrap();
        let bound = query.bind(&[]).unwrap();
        assert_eq!(bound, query);
    }
}
