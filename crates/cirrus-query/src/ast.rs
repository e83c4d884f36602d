// cirrus-query/src/ast.rs
// ============================================================================
// Module: Query AST
// Description: Tagged syntax tree for the SQL-like document query dialect.
// Purpose: One node kind per construct; the evaluator dispatches on tags,
//          never on runtime polymorphism.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! The tree mirrors the grammar: a [`Query`] holds the clause structure and
//! [`Expr`] holds the expression language. Nodes are immutable once built so
//! a parsed query can be executed repeatedly (including across continuation
//! pages) without re-parsing.

// ============================================================================
// SECTION: Query Structure
// ============================================================================

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `DISTINCT` flag on the projection.
    pub distinct: bool,
    /// `TOP n` row cap.
    pub top: Option<u64>,
    /// Projection clause.
    pub projection: Projection,
    /// `FROM` clause binding.
    pub from: FromClause,
    /// Flattening joins, in declaration order.
    pub joins: Vec<JoinClause>,
    /// `WHERE` predicate.
    pub filter: Option<Expr>,
    /// `GROUP BY` key expressions.
    pub group_by: Vec<Expr>,
    /// `ORDER BY` terms, in declaration order.
    pub order_by: Vec<OrderTerm>,
    /// `OFFSET n LIMIT n` pair.
    pub offset_limit: Option<OffsetLimit>,
}

/// Projection clause variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`: the root binding passes through unchanged.
    Star,
    /// `SELECT VALUE expr`: rows are the raw expression values.
    Value(Expr),
    /// `SELECT a, b AS x, …`: rows are objects built from the items.
    Items(Vec<ProjectionItem>),
}

/// One item of an object projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    /// Projected expression.
    pub expr: Expr,
    /// Explicit `AS` alias.
    pub alias: Option<String>,
}

/// The `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    /// Name bound to each source row.
    pub alias: String,
    /// `alias IN expr` source; `None` binds the collection root.
    pub source: Option<Expr>,
}

/// One `JOIN alias IN expr` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Name bound to each joined element.
    pub alias: String,
    /// Array-valued expression flattened by the join.
    pub source: Expr,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    /// Sort key expression.
    pub expr: Expr,
    /// `DESC` flag.
    pub descending: bool,
}

/// `OFFSET n LIMIT n` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetLimit {
    /// Rows skipped before emission.
    pub offset: u64,
    /// Maximum rows emitted.
    pub limit: u64,
}

// ============================================================================
// SECTION: Expressions
// ============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical `NOT` under Kleene semantics.
    Not,
    /// Numeric negation.
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `!=` / `<>`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// Logical `AND` under Kleene semantics.
    And,
    /// Logical `OR` under Kleene semantics.
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `||` string concatenation.
    Concat,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `null` literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal.
    Number(f64),
    /// String literal.
    Str(String),
    /// Bound parameter reference, including the `@`.
    Param(String),
    /// Reference to a `FROM`/`JOIN` binding.
    Alias(String),
    /// Property access `base.name`.
    Property {
        /// Expression the property is read from.
        base: Box<Expr>,
        /// Property name.
        name: String,
    },
    /// Index access `base[expr]` (array index or quoted property).
    Index {
        /// Expression the index is applied to.
        base: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// Array constructor `[a, b, …]`.
    ArrayCtor(Vec<Expr>),
    /// Object constructor `{"k": v, …}`.
    ObjectCtor(Vec<(String, Expr)>),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `needle IN (a, b, …)` membership test.
    In {
        /// Probed expression.
        needle: Box<Expr>,
        /// Candidate list.
        haystack: Vec<Expr>,
    },
    /// `probe BETWEEN low AND high` range test.
    Between {
        /// Probed expression.
        probe: Box<Expr>,
        /// Lower bound (inclusive).
        low: Box<Expr>,
        /// Upper bound (inclusive).
        high: Box<Expr>,
    },
    /// Function call; the name is stored uppercased.
    Call {
        /// Uppercased function name.
        function: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Returns the root binding name an access chain resolves from, if any.
    ///
    /// `c.a.b[0]` roots at `c`; literals and constructors have no root.
    #[must_use]
    pub fn root_alias(&self) -> Option<&str> {
        match self {
            Self::Alias(name) => Some(name),
            Self::Property {
                base, ..
            }
            | Self::Index {
                base, ..
            } => base.root_alias(),
            _ => None,
        }
    }

    /// Returns the trailing property name of an access chain, if any.
    ///
    /// Used to infer projection member names: `c.address.city` yields
    /// `city`.
    #[must_use]
    pub fn trailing_name(&self) -> Option<&str> {
        match self {
            Self::Property {
                name, ..
            } => Some(name),
            Self::Alias(name) => Some(name),
            Self::Index {
                index, ..
            } => match index.as_ref() {
                Self::Str(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Visits this expression and every sub-expression.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        match self {
            Self::Null
            | Self::Bool(_)
            | Self::Number(_)
            | Self::Str(_)
            | Self::Param(_)
            | Self::Alias(_) => {}
            Self::Property {
                base, ..
            } => base.walk(visit),
            Self::Index {
                base,
                index,
            } => {
                base.walk(visit);
                index.walk(visit);
            }
            Self::ArrayCtor(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Self::ObjectCtor(entries) => {
                for (_, value) in entries {
                    value.walk(visit);
                }
            }
            Self::Unary {
                operand, ..
            } => operand.walk(visit),
            Self::Binary {
                left,
                right,
                ..
            } => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::In {
                needle,
                haystack,
            } => {
                needle.walk(visit);
                for candidate in haystack {
                    candidate.walk(visit);
                }
            }
            Self::Between {
                probe,
                low,
                high,
            } => {
                probe.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Self::Call {
                args, ..
            } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }
}
