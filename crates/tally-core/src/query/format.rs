//! Canonical text rendering of queries.
//!
//! The output is re-parseable: parentheses are emitted exactly where
//! the grammar needs them to reconstruct the same tree.

use std::fmt;

use super::ast::{EqValue, Expression, Query};

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if !self.group_by.is_empty() {
            write!(f, " ; {}", self.group_by.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { column, value } => match value {
                EqValue::Literal(v) => write!(f, "{column} = {}", quote(v)),
                EqValue::Placeholder(n) => write!(f, "{column} = ${n}"),
            },
            Self::Not(child) => {
                f.write_str("^ ")?;
                // A chain under `^` needs parentheses to keep `^` from
                // grabbing only the first operand on re-parse.
                if matches!(**child, Self::And(_) | Self::Or(_)) {
                    write!(f, "( {child} )")
                } else {
                    write!(f, "{child}")
                }
            }
            Self::And(children) => write_chain(f, children, " & "),
            Self::Or(children) => write_chain(f, children, " | "),
        }
    }
}

fn write_chain(
    f: &mut fmt::Formatter<'_>,
    children: &[Expression],
    separator: &str,
) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        // The grammar allows one operator kind per chain, so a child
        // chain of the other kind must be parenthesized.
        if matches!(child, Expression::And(_) | Expression::Or(_)) {
            write!(f, "( {child} )")?;
        } else {
            write!(f, "{child}")?;
        }
    }
    Ok(())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::super::Parser;

    /// Canonical strings must survive parse → format unchanged, and the
    /// formatted text must parse back to the same tree.
    #[test]
    fn canonical_round_trip() {
        for input in [
            r#"foo = "bar""#,
            r#"foo = "foo""bar""#,
            r#"foo = "bar" & bar = "baz""#,
            r#"foo = "bar" & bar = "baz" & baz = "quux""#,
            r#"foo = "bar" & ( bar = "baz" | baz = "quux" )"#,
            r#"foo = "bar" | ( bar = "baz" & baz = "quux" )"#,
            r#"^ foo = "bar""#,
            r#"^ ( foo = "bar" & bar = "baz" )"#,
            r#"^ foo = "bar" & bar = "baz""#,
            r#"foo = "bar" ; bar, baz, quux"#,
            r#"foo = $1"#,
            r#"foo = $1 & bar = $2"#,
        ] {
            let query = Parser::parse(input).unwrap();
            let formatted = query.to_string();
            assert_eq!(formatted, input);

            let reparsed = Parser::parse(&formatted).unwrap();
            assert_eq!(reparsed, query);
        }
    }

    #[test]
    fn unicode_survives_quoting() {
        let input = r#"city = "Zürich ""Altstadt""""#;
        let query = Parser::parse(input).unwrap();
        assert_eq!(query.to_string(), input);
    }
}
