//! Expression AST and structural fingerprints.
//!
//! The grammar is closed, so the tree is a plain tagged enum rather
//! than an open trait. Each subtree has a deterministic 64-bit
//! fingerprint used as the memoization cache key; `And`/`Or`
//! fingerprints are invariant under child reordering (those operators
//! commute), while `Not` composes non-commutatively so `^ ^ x` and `x`
//! stay distinct keys.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::value_code;

const MASK_NOT: u64 = 0x87A9_CD14_CAEB_50EB;
const MASK_AND: u64 = 0xF9F1_F5AD_CB67_A077;
const MASK_OR: u64 = 0xBFB8_5A99_B03E_78E7;

/// Right-hand side of an equality comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EqValue {
    /// A literal string value.
    Literal(String),
    /// A positional placeholder (`$1`, `$2`, …), to be bound before
    /// evaluation.
    Placeholder(u32),
}

/// A boolean expression over column equalities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// `column = "value"` or `column = $n`.
    Eq {
        /// Column name.
        column: String,
        /// Literal value or placeholder.
        value: EqValue,
    },
    /// Negation (`^`).
    Not(Box<Expression>),
    /// N-ary conjunction (`&`), at least one child.
    And(Vec<Expression>),
    /// N-ary disjunction (`|`), at least one child.
    Or(Vec<Expression>),
}

impl Expression {
    /// Convenience constructor for an equality leaf.
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            column: column.into(),
            value: EqValue::Literal(value.into()),
        }
    }

    /// Computes the structural fingerprint of this subtree.
    ///
    /// The `Eq` fingerprint is the leaf's value code, so a cached leaf
    /// bitmap is shared by every query touching the same
    /// `(column, value)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if the subtree still contains an
    /// unbound placeholder.
    pub fn fingerprint(&self) -> Result<u64> {
        match self {
            Self::Eq { column, value } => match value {
                EqValue::Literal(v) => Ok(value_code(column, v)),
                EqValue::Placeholder(n) => {
                    Err(Error::Argument(format!("unbound placeholder ${n}")))
                }
            },
            Self::Not(child) => Ok(child.fingerprint()?.rotate_left(1) ^ MASK_NOT),
            Self::And(children) => Self::combine(MASK_AND, children),
            Self::Or(children) => Self::combine(MASK_OR, children),
        }
    }

    fn combine(mask: u64, children: &[Expression]) -> Result<u64> {
        let mut fp = mask;
        for child in children {
            fp ^= child.fingerprint()?.rotate_left(1);
        }
        Ok(fp)
    }

    /// Returns true if any leaf is an unbound placeholder.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        match self {
            Self::Eq { value, .. } => matches!(value, EqValue::Placeholder(_)),
            Self::Not(child) => child.has_placeholders(),
            Self::And(children) | Self::Or(children) => {
                children.iter().any(Expression::has_placeholders)
            }
        }
    }
}

/// A parsed query: an expression plus optional group-by columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The filter expression.
    pub expr: Expression,
    /// Columns to group the matched rows by, in order.
    pub group_by: Vec<String>,
}

impl Query {
    /// Creates a query without grouping.
    #[must_use]
    pub fn new(expr: Expression) -> Self {
        Self {
            expr,
            group_by: Vec::new(),
        }
    }

    /// Adds group-by columns.
    #[must_use]
    pub fn group_by(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_fingerprint_is_the_value_code() {
        let expr = Expression::eq("country", "DE");
        assert_eq!(expr.fingerprint().unwrap(), value_code("country", "DE"));
    }

    #[test]
    fn and_fingerprint_commutes() {
        let ab = Expression::And(vec![Expression::eq("a", "1"), Expression::eq("b", "2")]);
        let ba = Expression::And(vec![Expression::eq("b", "2"), Expression::eq("a", "1")]);
        assert_eq!(ab.fingerprint().unwrap(), ba.fingerprint().unwrap());
    }

    #[test]
    fn or_fingerprint_commutes() {
        let ab = Expression::Or(vec![Expression::eq("a", "1"), Expression::eq("b", "2")]);
        let ba = Expression::Or(vec![Expression::eq("b", "2"), Expression::eq("a", "1")]);
        assert_eq!(ab.fingerprint().unwrap(), ba.fingerprint().unwrap());
    }

    #[test]
    fn and_and_or_fingerprints_differ() {
        let children = vec![Expression::eq("a", "1"), Expression::eq("b", "2")];
        let and = Expression::And(children.clone());
        let or = Expression::Or(children);
        assert_ne!(and.fingerprint().unwrap(), or.fingerprint().unwrap());
    }

    #[test]
    fn double_not_does_not_collapse() {
        let once = Expression::Not(Box::new(Expression::eq("a", "1")));
        let twice = Expression::Not(Box::new(once.clone()));
        assert_ne!(
            Expression::eq("a", "1").fingerprint().unwrap(),
            twice.fingerprint().unwrap()
        );
        assert_ne!(once.fingerprint().unwrap(), twice.fingerprint().unwrap());
    }

    #[test]
    fn placeholder_fingerprint_is_an_error() {
        let expr = Expression::Eq {
            column: "a".to_string(),
            value: EqValue::Placeholder(1),
        };
        assert!(expr.fingerprint().is_err());
        assert!(expr.has_placeholders());
    }
}
