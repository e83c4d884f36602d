// cirrus-query/src/parser.rs
// ============================================================================
// Module: Query Parser
// Description: Recursive-descent parser for the SQL-like document dialect.
// Purpose: Turn lexed tokens into a validated [`Query`] tree with positioned
//          errors and a nesting limit.
// Dependencies: crate::{ast, error, lexer}
// ============================================================================

//! ## Overview
//! The parser is a hand-written recursive descent over the token stream.
//! Keywords are matched case-insensitively and only where the grammar
//! expects them, so `c.value` and `c.top` stay ordinary property accesses.
//! Operator precedence, lowest to highest: `OR`, `AND`, `NOT`, comparison
//! (including `IN` and `BETWEEN`), additive (`+ - ||`), multiplicative
//! (`* / %`), unary minus, postfix access, primary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::ast::BinaryOp;
use crate::ast::Expr;
use crate::ast::FromClause;
use crate::ast::JoinClause;
use crate::ast::OffsetLimit;
use crate::ast::OrderTerm;
use crate::ast::Projection;
use crate::ast::ProjectionItem;
use crate::ast::Query;
use crate::ast::UnaryOp;
use crate::error::QueryError;
use crate::error::QueryResult;
use crate::lexer::Lexer;
use crate::lexer::SpannedToken;
use crate::lexer::Token;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed query text size in bytes.
pub const MAX_QUERY_BYTES: usize = 256 * 1024;
/// Maximum supported nesting depth for expressions.
pub const MAX_QUERY_NESTING: usize = 64;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Parses query text into a [`Query`] tree.
///
/// # Errors
///
/// Returns [`QueryError`] for lexical errors, syntax errors, trailing input,
/// or inputs exceeding the size limit.
pub fn parse_query(text: &str) -> QueryResult<Query> {
    if text.trim().is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    if text.len() > MAX_QUERY_BYTES {
        return Err(QueryError::QueryTooLarge {
            max: MAX_QUERY_BYTES,
            actual: text.len(),
        });
    }
    let tokens = Lexer::new(text).lex()?;
    let mut parser = Parser::new(tokens);
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser over the token stream.
struct Parser<'a> {
    /// Token stream with source positions.
    tokens: Vec<SpannedToken<'a>>,
    /// Current token index.
    index: usize,
    /// Current nesting depth for bracketed expressions.
    nesting: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'a>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    // ------------------------------------------------------------------
    // Clause structure
    // ------------------------------------------------------------------

    /// Parses a full query.
    fn parse_query(&mut self) -> QueryResult<Query> {
        self.expect_keyword("SELECT")?;
        let distinct = self.match_keyword("DISTINCT");
        let top = if self.match_keyword("TOP") {
            Some(self.parse_unsigned_integer("row count after TOP")?)
        } else {
            None
        };
        let projection = self.parse_projection()?;
        self.expect_keyword("FROM")?;
        let from = self.parse_from_clause()?;
        let mut joins = Vec::new();
        while self.match_keyword("JOIN") {
            joins.push(self.parse_join_clause()?);
        }
        let filter =
            if self.match_keyword("WHERE") { Some(self.parse_expression()?) } else { None };
        let mut group_by = Vec::new();
        if self.match_keyword("GROUP") {
            self.expect_keyword("BY")?;
            loop {
                group_by.push(self.parse_expression()?);
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        let mut order_by = Vec::new();
        if self.match_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.parse_expression()?;
                let descending = if self.match_keyword("DESC") {
                    true
                } else {
                    self.match_keyword("ASC");
                    false
                };
                order_by.push(OrderTerm {
                    expr,
                    descending,
                });
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        let offset_limit = if self.match_keyword("OFFSET") {
            let offset = self.parse_unsigned_integer("row count after OFFSET")?;
            self.expect_keyword("LIMIT")?;
            let limit = self.parse_unsigned_integer("row count after LIMIT")?;
            Some(OffsetLimit {
                offset,
                limit,
            })
        } else {
            None
        };
        Ok(Query {
            distinct,
            top,
            projection,
            from,
            joins,
            filter,
            group_by,
            order_by,
            offset_limit,
        })
    }

    /// Parses the projection clause.
    fn parse_projection(&mut self) -> QueryResult<Projection> {
        if self.matches(&Token::Star) {
            return Ok(Projection::Star);
        }
        if self.match_keyword("VALUE") {
            return Ok(Projection::Value(self.parse_expression()?));
        }
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let alias = if self.match_keyword("AS") {
                Some(self.expect_identifier("alias after AS")?)
            } else {
                None
            };
            items.push(ProjectionItem {
                expr,
                alias,
            });
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        Ok(Projection::Items(items))
    }

    /// Parses the `FROM` clause.
    ///
    /// Accepted shapes: `FROM c`, `FROM container alias`, and
    /// `FROM alias IN expr` for a flattening source.
    fn parse_from_clause(&mut self) -> QueryResult<FromClause> {
        let first = self.expect_identifier("source after FROM")?;
        if self.match_keyword("IN") {
            let source = self.parse_expression()?;
            return Ok(FromClause {
                alias: first,
                source: Some(source),
            });
        }
        if self.match_keyword("AS") {
            let alias = self.expect_identifier("alias after AS")?;
            return Ok(FromClause {
                alias,
                source: None,
            });
        }
        if let Token::Ident(name) = self.current().token {
            if !is_clause_keyword(name) {
                self.advance();
                return Ok(FromClause {
                    alias: name.to_string(),
                    source: None,
                });
            }
        }
        Ok(FromClause {
            alias: first,
            source: None,
        })
    }

    /// Parses one `JOIN alias IN expr` clause.
    fn parse_join_clause(&mut self) -> QueryResult<JoinClause> {
        let alias = self.expect_identifier("alias after JOIN")?;
        self.expect_keyword("IN")?;
        let source = self.parse_expression()?;
        Ok(JoinClause {
            alias,
            source,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Parses a full expression.
    fn parse_expression(&mut self) -> QueryResult<Expr> {
        self.parse_or()
    }

    /// Parses `OR` chains.
    fn parse_or(&mut self) -> QueryResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.match_keyword("OR") {
            let right = self.parse_and()?;
            expr = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Parses `AND` chains.
    fn parse_and(&mut self) -> QueryResult<Expr> {
        let mut expr = self.parse_not()?;
        while self.peek_keyword("AND") {
            self.advance();
            let right = self.parse_not()?;
            expr = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Parses prefix `NOT`.
    fn parse_not(&mut self) -> QueryResult<Expr> {
        if self.match_keyword("NOT") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    /// Parses comparison, `IN`, and `BETWEEN` at one precedence level.
    fn parse_comparison(&mut self) -> QueryResult<Expr> {
        let left = self.parse_additive()?;
        let negated = self.peek_keyword("NOT")
            && matches!(self.peek_next_keyword(), Some(keyword) if keyword.eq_ignore_ascii_case("IN") || keyword.eq_ignore_ascii_case("BETWEEN"));
        if negated {
            self.advance();
        }
        if self.match_keyword("IN") {
            self.expect(&Token::LParen, "`(` after IN")?;
            let mut haystack = Vec::new();
            if !self.matches(&Token::RParen) {
                loop {
                    haystack.push(self.parse_expression()?);
                    if self.matches(&Token::Comma) {
                        continue;
                    }
                    self.expect(&Token::RParen, "`)` after IN list")?;
                    break;
                }
            }
            let membership = Expr::In {
                needle: Box::new(left),
                haystack,
            };
            return Ok(wrap_not(membership, negated));
        }
        if self.match_keyword("BETWEEN") {
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            let range = Expr::Between {
                probe: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
            };
            return Ok(wrap_not(range, negated));
        }
        if negated {
            return Err(QueryError::UnexpectedToken {
                expected: "IN or BETWEEN after NOT",
                found: self.current().token.describe(),
                position: self.current().position,
            });
        }
        let op = match self.current().token {
            Token::Eq => BinaryOp::Eq,
            Token::Neq => BinaryOp::Neq,
            Token::Lt => BinaryOp::Lt,
            Token::Lte => BinaryOp::Lte,
            Token::Gt => BinaryOp::Gt,
            Token::Gte => BinaryOp::Gte,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Parses `+`, `-`, and `||` chains.
    fn parse_additive(&mut self) -> QueryResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                Token::Concat => BinaryOp::Concat,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Parses `*`, `/`, and `%` chains.
    fn parse_multiplicative(&mut self) -> QueryResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Parses unary minus and plus.
    fn parse_unary(&mut self) -> QueryResult<Expr> {
        if self.matches(&Token::Minus) {
            let operand = self.parse_unary()?;
            // Fold literal negation so `-1` is a plain number.
            if let Expr::Number(value) = operand {
                return Ok(Expr::Number(-value));
            }
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.matches(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_postfix()
    }

    /// Parses postfix property and index access.
    fn parse_postfix(&mut self) -> QueryResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(&Token::Dot) {
                let name = self.expect_identifier("property name after `.`")?;
                expr = Expr::Property {
                    base: Box::new(expr),
                    name,
                };
            } else if self.matches(&Token::LBracket) {
                let index = self.with_nesting(|parser| parser.parse_expression())?;
                self.expect(&Token::RBracket, "`]` after index")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> QueryResult<Expr> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        match token {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::Str(value))
            }
            Token::Param(name) => {
                self.advance();
                Ok(Expr::Param(name.to_string()))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("null") => {
                self.advance();
                Ok(Expr::Null)
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("true") => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("false") => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Ident(name) => {
                self.advance();
                if self.matches(&Token::LParen) {
                    let args = self.with_nesting(|parser| parser.parse_argument_list())?;
                    return Ok(Expr::Call {
                        function: name.to_ascii_uppercase(),
                        args,
                    });
                }
                Ok(Expr::Alias(name.to_string()))
            }
            Token::LParen => {
                self.advance();
                let expr = self.with_nesting(|parser| parser.parse_expression())?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let items = self.with_nesting(|parser| {
                    let mut items = Vec::new();
                    if parser.matches(&Token::RBracket) {
                        return Ok(items);
                    }
                    loop {
                        items.push(parser.parse_expression()?);
                        if parser.matches(&Token::Comma) {
                            continue;
                        }
                        parser.expect(&Token::RBracket, "`]` after array elements")?;
                        break;
                    }
                    Ok(items)
                })?;
                Ok(Expr::ArrayCtor(items))
            }
            Token::LBrace => {
                self.advance();
                let entries = self.with_nesting(|parser| {
                    let mut entries = Vec::new();
                    if parser.matches(&Token::RBrace) {
                        return Ok(entries);
                    }
                    loop {
                        let key = parser.expect_member_name()?;
                        parser.expect(&Token::Colon, "`:` after member name")?;
                        let value = parser.parse_expression()?;
                        entries.push((key, value));
                        if parser.matches(&Token::Comma) {
                            continue;
                        }
                        parser.expect(&Token::RBrace, "`}` after object members")?;
                        break;
                    }
                    Ok(entries)
                })?;
                Ok(Expr::ObjectCtor(entries))
            }
            _ => Err(QueryError::UnexpectedToken {
                expected: "literal, identifier, or `(`",
                found: token.describe(),
                position,
            }),
        }
    }

    /// Parses a comma-separated argument list after `(`.
    fn parse_argument_list(&mut self) -> QueryResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.matches(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`)` after arguments")?;
            break;
        }
        Ok(args)
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    /// Parses a non-negative integer literal.
    fn parse_unsigned_integer(&mut self, expected: &'static str) -> QueryResult<u64> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        let Token::Number(value) = token else {
            return Err(QueryError::UnexpectedToken {
                expected,
                found: token.describe(),
                position,
            });
        };
        self.advance();
        if value < 0.0 || value.fract() != 0.0 || value > 9_007_199_254_740_992.0 {
            return Err(QueryError::InvalidNumber {
                raw: value.to_string(),
                position,
            });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(value as u64)
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let position = self.current().position;
        let next_depth = self.nesting + 1;
        if next_depth > MAX_QUERY_NESTING {
            return Err(QueryError::NestingTooDeep {
                max: MAX_QUERY_NESTING,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes an identifier token.
    fn expect_identifier(&mut self, expected: &'static str) -> QueryResult<String> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        if let Token::Ident(name) = token {
            self.advance();
            return Ok(name.to_string());
        }
        Err(QueryError::UnexpectedToken {
            expected,
            found: token.describe(),
            position,
        })
    }

    /// Consumes an object-constructor member name (identifier or string).
    fn expect_member_name(&mut self) -> QueryResult<String> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        match token {
            Token::Ident(name) => {
                self.advance();
                Ok(name.to_string())
            }
            Token::Str(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(QueryError::UnexpectedToken {
                expected: "member name",
                found: other.describe(),
                position,
            }),
        }
    }

    /// Consumes the expected token or errors.
    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> QueryResult<()> {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(token) {
            self.advance();
            Ok(())
        } else {
            Err(QueryError::UnexpectedToken {
                expected,
                found: self.current().token.describe(),
                position: self.current().position,
            })
        }
    }

    /// Consumes the expected keyword (case-insensitive) or errors.
    fn expect_keyword(&mut self, keyword: &'static str) -> QueryResult<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(QueryError::UnexpectedToken {
                expected: keyword,
                found: self.current().token.describe(),
                position: self.current().position,
            })
        }
    }

    /// Consumes a keyword when it matches case-insensitively.
    fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Tests the current token against a keyword without consuming.
    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.current().token, Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }

    /// Returns the identifier text of the token after the current one.
    fn peek_next_keyword(&self) -> Option<&'a str> {
        match self.tokens.get(self.index + 1)?.token {
            Token::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Consumes the token when its kind matches.
    fn matches(&mut self, token: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> QueryResult<()> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(QueryError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'a> {
        debug_assert!(self.index < self.tokens.len(), "parser index out of bounds");
        &self.tokens[self.index]
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }
}

/// Wraps an expression in `NOT` when the comparison was negated.
fn wrap_not(expr: Expr, negated: bool) -> Expr {
    if negated {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(expr),
        }
    } else {
        expr
    }
}

/// Identifiers that terminate the `FROM` clause rather than alias it.
fn is_clause_keyword(name: &str) -> bool {
    const CLAUSE_KEYWORDS: [&str; 8] =
        ["JOIN", "WHERE", "GROUP", "ORDER", "OFFSET", "LIMIT", "IN", "AS"];
    CLAUSE_KEYWORDS.iter().any(|keyword| keyword.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_minimal_star_query() {
        let query = parse_query("SELECT * FROM c").expect("parses");
        assert_eq!(query.projection, Projection::Star);
        assert_eq!(query.from.alias, "c");
        assert!(query.from.source.is_none());
        assert!(query.filter.is_none());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let lower = parse_query("select value c.v from c where c.v >= @min").expect("parses");
        let upper = parse_query("SELECT VALUE c.v FROM c WHERE c.v >= @min").expect("parses");
        assert_eq!(lower, upper);
    }

    #[test]
    fn parses_projection_items_with_aliases() {
        let query = parse_query("SELECT c.name, c.age AS years FROM c").expect("parses");
        let Projection::Items(items) = &query.projection else {
            panic!("expected item projection");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].alias, None);
        assert_eq!(items[1].alias.as_deref(), Some("years"));
    }

    #[test]
    fn parses_flattening_from_and_joins() {
        let query =
            parse_query("SELECT VALUE t FROM t IN c.tags").expect("parses flattening FROM");
        assert_eq!(query.from.alias, "t");
        assert!(query.from.source.is_some());

        let query = parse_query("SELECT c.id, t FROM c JOIN t IN c.tags JOIN u IN t.subtags")
            .expect("parses joins");
        assert_eq!(query.joins.len(), 2);
        assert_eq!(query.joins[0].alias, "t");
        assert_eq!(query.joins[1].alias, "u");
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let query = parse_query("SELECT * FROM c WHERE c.a = 1 OR c.b = 2 AND c.d = 3")
            .expect("parses");
        let Some(Expr::Binary {
            op: BinaryOp::Or, ..
        }) = query.filter
        else {
            panic!("OR must be the root of the predicate");
        };
    }

    #[test]
    fn parses_between_in_and_their_negations() {
        parse_query("SELECT * FROM c WHERE c.v BETWEEN 1 AND 5").expect("between");
        parse_query("SELECT * FROM c WHERE c.v IN (1, 2, 3)").expect("in");
        let negated =
            parse_query("SELECT * FROM c WHERE c.v NOT IN (1, 2)").expect("not in");
        assert!(matches!(
            negated.filter,
            Some(Expr::Unary {
                op: UnaryOp::Not,
                ..
            })
        ));
    }

    #[test]
    fn parses_constructors_and_indexing() {
        let query = parse_query(
            "SELECT VALUE {\"name\": c.name, tags: [c.t[0], c[\"weird key\"]]} FROM c",
        )
        .expect("parses");
        assert!(matches!(query.projection, Projection::Value(Expr::ObjectCtor(_))));
    }

    #[test]
    fn parses_top_order_offset_limit() {
        let query = parse_query(
            "SELECT TOP 5 c.v FROM c ORDER BY c.v DESC, c.id OFFSET 0 LIMIT 5",
        );
        // TOP together with OFFSET/LIMIT parses; the planner rejects it.
        let query = query.expect("parses");
        assert_eq!(query.top, Some(5));
        assert_eq!(query.order_by.len(), 2);
        assert!(query.order_by[0].descending);
        assert!(!query.order_by[1].descending);
        assert_eq!(
            query.offset_limit,
            Some(OffsetLimit {
                offset: 0,
                limit: 5
            })
        );
    }

    #[test]
    fn offset_requires_limit() {
        let error = parse_query("SELECT * FROM c OFFSET 2").unwrap_err();
        assert!(matches!(
            error,
            QueryError::UnexpectedToken {
                expected: "LIMIT",
                ..
            }
        ));
    }

    #[test]
    fn value_and_top_stay_usable_as_property_names() {
        parse_query("SELECT c.value, c.top FROM c WHERE c.value.top = 1").expect("parses");
    }

    #[test]
    fn rejects_trailing_input() {
        let error = parse_query("SELECT * FROM c WHERE c.a = 1 garbage ,").unwrap_err();
        assert!(matches!(error, QueryError::TrailingInput { .. }));
    }

    #[test]
    fn rejects_runaway_nesting() {
        let mut text = String::from("SELECT * FROM c WHERE c.v = ");
        text.push_str(&"(".repeat(MAX_QUERY_NESTING + 1));
        text.push('1');
        text.push_str(&")".repeat(MAX_QUERY_NESTING + 1));
        let error = parse_query(&text).unwrap_err();
        assert!(matches!(error, QueryError::NestingTooDeep { .. }));
    }

    #[test]
    fn parses_function_calls_case_insensitively() {
        let query = parse_query("SELECT * FROM c WHERE startswith(c.name, 'A')").expect("parses");
        let Some(Expr::Call {
            function, ..
        }) = query.filter
        else {
            panic!("expected a call node");
        };
        assert_eq!(function, "STARTSWITH");
    }
}
