//! Query text parser built on pest.

use pest::iterators::Pair;
use pest::Parser as PestParser;
use pest_derive::Parser;

use super::ast::{EqValue, Expression, Query};
use super::error::ParseError;

#[derive(Parser)]
#[grammar = "query/grammar.pest"]
struct QueryParser;

/// Query text parser.
pub struct Parser;

impl Parser {
    /// Parses query text into a [`Query`].
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] carrying the 1-based `line:column` of
    /// the offending input.
    ///
    /// # Example
    ///
    /// ```
    /// use tally_core::query::Parser;
    ///
    /// let query = Parser::parse(r#"country = "DE" ; city"#).unwrap();
    /// assert_eq!(query.group_by, vec!["city"]);
    /// ```
    pub fn parse(input: &str) -> Result<Query, ParseError> {
        let mut pairs = QueryParser::parse(Rule::query, input)
            .map_err(|e| Self::map_pest_error(input, &e))?;

        let query_pair = pairs
            .next()
            .ok_or_else(|| ParseError::syntax(1, 1, "empty query"))?;

        let mut expr = None;
        let mut group_by = Vec::new();

        for pair in query_pair.into_inner() {
            match pair.as_rule() {
                Rule::expr => expr = Some(Self::build_expr(pair)?),
                Rule::field_list => {
                    group_by = pair
                        .into_inner()
                        .map(|field| field.as_str().to_string())
                        .collect();
                }
                Rule::EOI => {}
                _ => {
                    let (line, column) = position(&pair);
                    return Err(ParseError::syntax(
                        line,
                        column,
                        format!("unexpected {:?}", pair.as_rule()),
                    ));
                }
            }
        }

        let expr = expr.ok_or_else(|| ParseError::syntax(1, 1, "empty query"))?;

        Ok(Query { expr, group_by })
    }

    fn build_expr(pair: Pair<Rule>) -> Result<Expression, ParseError> {
        let (line, column) = position(&pair);
        let mut inner = pair.into_inner();

        let first = inner
            .next()
            .ok_or_else(|| ParseError::syntax(line, column, "expected expression"))?;
        let first = Self::build_simple(first)?;

        let Some(chain) = inner.next() else {
            return Ok(first);
        };

        let rule = chain.as_rule();
        let mut children = vec![first];
        for simple in chain.into_inner() {
            children.push(Self::build_simple(simple)?);
        }

        match rule {
            Rule::and_chain => Ok(Expression::And(children)),
            Rule::or_chain => Ok(Expression::Or(children)),
            _ => Err(ParseError::syntax(
                line,
                column,
                format!("unexpected {rule:?} in expression"),
            )),
        }
    }

    fn build_simple(pair: Pair<Rule>) -> Result<Expression, ParseError> {
        let (line, column) = position(&pair);
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::syntax(line, column, "expected expression"))?;

        match inner.as_rule() {
            Rule::group => {
                let (line, column) = position(&inner);
                let expr = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::syntax(line, column, "expected expression"))?;
                Self::build_expr(expr)
            }
            Rule::not => {
                let (line, column) = position(&inner);
                let child = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::syntax(line, column, "expected expression"))?;
                Ok(Expression::Not(Box::new(Self::build_simple(child)?)))
            }
            Rule::comparison => Self::build_comparison(inner),
            rule => Err(ParseError::syntax(
                line,
                column,
                format!("unexpected {rule:?}"),
            )),
        }
    }

    fn build_comparison(pair: Pair<Rule>) -> Result<Expression, ParseError> {
        let (line, column) = position(&pair);
        let mut inner = pair.into_inner();

        let column_name = inner
            .next()
            .ok_or_else(|| ParseError::syntax(line, column, "expected field"))?
            .as_str()
            .to_string();

        let operand = inner
            .next()
            .ok_or_else(|| ParseError::unexpected(line, column, "value", "end of input"))?;

        let value = match operand.as_rule() {
            Rule::value => EqValue::Literal(decode_value(operand.as_str())),
            Rule::placeholder => {
                let (line, column) = position(&operand);
                let raw = operand.as_str();
                let number: u32 = raw[1..]
                    .parse()
                    .map_err(|_| ParseError::placeholder(line, column, raw))?;
                if number == 0 {
                    return Err(ParseError::placeholder(line, column, raw));
                }
                EqValue::Placeholder(number)
            }
            rule => {
                let (line, column) = position(&operand);
                return Err(ParseError::unexpected(
                    line,
                    column,
                    "value",
                    &format!("{rule:?}"),
                ));
            }
        };

        Ok(Expression::Eq {
            column: column_name,
            value,
        })
    }

    fn map_pest_error(input: &str, err: &pest::error::Error<Rule>) -> ParseError {
        if let Some((line, column)) = unterminated_value_start(input) {
            return ParseError::unterminated(line, column);
        }

        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((line, column))
            | pest::error::LineColLocation::Span((line, column), _) => (line, column),
        };

        let offset = match err.location {
            pest::error::InputLocation::Pos(pos) | pest::error::InputLocation::Span((pos, _)) => {
                pos
            }
        };
        if input[offset..].starts_with('$') {
            let fragment: String = input[offset..]
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            return ParseError::placeholder(line, column, &fragment);
        }

        ParseError::syntax(line, column, err.variant.message().to_string())
    }
}

/// Strips the outer quotes and un-doubles embedded quotes.
fn decode_value(raw: &str) -> String {
    raw[1..raw.len() - 1].replace("\"\"", "\"")
}

/// Scans for a quoted value that is never closed, honoring `""`
/// escapes. Returns the 1-based position of the opening quote.
fn unterminated_value_start(input: &str) -> Option<(usize, usize)> {
    let mut chars = input.chars().peekable();
    let mut line = 1;
    let mut column = 1;
    let mut open: Option<(usize, usize)> = None;

    while let Some(c) = chars.next() {
        if c == '"' {
            match open {
                None => open = Some((line, column)),
                Some(_) => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        column += 1;
                    } else {
                        open = None;
                    }
                }
            }
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    open
}

fn position(pair: &Pair<Rule>) -> (usize, usize) {
    pair.as_span().start_pos().line_col()
}
