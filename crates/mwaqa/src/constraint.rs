//! Constraint expressions for the quality database
//!
//! A constraint is a small predicate tree that the remote service turns into
//! a SQL `WHERE` clause. On the wire it is a nested JSON array of the form
//! `[op, arg1, arg2]` (or `["not", arg]`), where every argument is a column
//! name, a literal, or another nested array:
//!
//! ```text
//! ["or",
//!     ["and", [">", "obsid", 500], ["<", "obsid", 1000]],
//!     ["not", ["like", "projectid", "%000%"]]]
//! ```
//!
//! Column names are not validated locally; the server decides what exists.

use std::str::FromStr;

use serde_json::{Value as JsonValue, json};

use crate::error::{QueryError, Result};

// ============ Types ============

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
}

/// One side of a comparison. Never a nested expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Comparison {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    /// At least two operands; see [`Constraint::logical`]
    Logical {
        op: LogicalOp,
        operands: Vec<Constraint>,
    },
    Not(Box<Constraint>),
}

// ============ Operators ============

impl CompareOp {
    pub const ALL: [CompareOp; 7] = [
        CompareOp::Eq,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Ne,
        CompareOp::Like,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Ne => "!=",
            CompareOp::Like => "like",
        }
    }
}

impl FromStr for CompareOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        CompareOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| unknown_operator(s))
    }
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

impl FromStr for LogicalOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "and" => Ok(LogicalOp::And),
            "or" => Ok(LogicalOp::Or),
            other => Err(unknown_operator(other)),
        }
    }
}

fn unknown_operator(op: &str) -> QueryError {
    QueryError::InvalidArgument(format!("unknown constraint operator '{op}'"))
}

// ============ Construction ============

impl Constraint {
    pub fn compare(op: CompareOp, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Constraint::Comparison {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    /// Build a comparison from an operator string such as `">="` or `"like"`
    pub fn parse_op(
        op: &str,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Result<Self> {
        Ok(Self::compare(op.parse()?, left, right))
    }

    pub fn logical(op: LogicalOp, operands: Vec<Constraint>) -> Result<Self> {
        if operands.len() < 2 {
            return Err(QueryError::InvalidArgument(format!(
                "'{}' needs at least two operands, got {}",
                op.as_str(),
                operands.len()
            )));
        }
        Ok(Constraint::Logical { op, operands })
    }

    pub fn and(self, other: Constraint) -> Self {
        self.join(LogicalOp::And, other)
    }

    pub fn or(self, other: Constraint) -> Self {
        self.join(LogicalOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Constraint::Not(Box::new(self))
    }

    fn join(self, op: LogicalOp, other: Constraint) -> Self {
        Constraint::Logical {
            op,
            operands: vec![self, other],
        }
    }

    /// `column >= min AND column <= max`
    pub fn between(column: &str, min: impl Into<Literal>, max: impl Into<Literal>) -> Self {
        col(column).ge(min).and(col(column).le(max))
    }
}

/// Column reference, the usual starting point: `col("obsid").gt(500)`
pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef(name.into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef(String);

macro_rules! comparison_methods {
    ($($method:ident => $op:ident),* $(,)?) => {
        impl ColumnRef {
            $(
                pub fn $method(self, value: impl Into<Literal>) -> Constraint {
                    Constraint::compare(CompareOp::$op, self, Operand::Literal(value.into()))
                }
            )*
        }
    };
}

comparison_methods! {
    eq => Eq,
    lt => Lt,
    le => Le,
    gt => Gt,
    ge => Ge,
    ne => Ne,
    like => Like,
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Operand::Column(c.0)
    }
}

impl From<Literal> for Operand {
    fn from(lit: Literal) -> Self {
        Operand::Literal(lit)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Int(n.into())
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Float(n)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.into())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

// ============ Wire format ============

impl Constraint {
    /// Check that every `Logical` node has at least two operands.
    ///
    /// A hand-built node can hold fewer. The quality client runs this
    /// before sending anything.
    pub fn validate(&self) -> Result<()> {
        match self {
            Constraint::Comparison { .. } => Ok(()),
            Constraint::Logical { op, operands } if operands.len() < 2 => {
                Err(QueryError::InvalidArgument(format!(
                    "'{}' needs at least two operands, got {}",
                    op.as_str(),
                    operands.len()
                )))
            }
            Constraint::Logical { operands, .. } => operands.iter().try_for_each(Self::validate),
            Constraint::Not(inner) => inner.validate(),
        }
    }

    /// Serialize to the nested-array form the service expects.
    ///
    /// Assumes a [`validated`](Constraint::validate) tree.
    ///
    /// Logical nodes with more than two operands are folded left into
    /// binary nodes, so every non-`not` node carries exactly two arguments.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Constraint::Comparison { op, left, right } => {
                json!([op.as_str(), left.to_json(), right.to_json()])
            }
            Constraint::Logical { op, operands } => {
                let mut iter = operands.iter();
                let first = iter.next().map(Constraint::to_json).unwrap_or(JsonValue::Null);
                iter.fold(first, |acc, next| json!([op.as_str(), acc, next.to_json()]))
            }
            Constraint::Not(inner) => json!(["not", inner.to_json()]),
        }
    }

    /// Parse the nested-array form.
    ///
    /// Strings are ambiguous on the wire: in a comparison the left argument
    /// is read as a column and the right argument as a string literal.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| malformed(value, "expected an array"))?;
        let op = items
            .first()
            .and_then(JsonValue::as_str)
            .ok_or_else(|| malformed(value, "expected an operator string"))?;

        match (op, items.len()) {
            ("not", 2) => Ok(Constraint::from_json(&items[1])?.not()),
            ("not", _) => Err(malformed(value, "'not' takes exactly one argument")),
            ("and" | "or", 3) => Constraint::logical(
                op.parse()?,
                vec![
                    Constraint::from_json(&items[1])?,
                    Constraint::from_json(&items[2])?,
                ],
            ),
            (_, 3) => Ok(Constraint::Comparison {
                op: op.parse()?,
                left: Operand::from_json(&items[1], true)?,
                right: Operand::from_json(&items[2], false)?,
            }),
            _ => Err(malformed(value, "binary operators take exactly two arguments")),
        }
    }
}

impl Operand {
    fn to_json(&self) -> JsonValue {
        match self {
            Operand::Column(name) => JsonValue::String(name.clone()),
            Operand::Literal(Literal::String(s)) => JsonValue::String(s.clone()),
            Operand::Literal(Literal::Int(n)) => json!(n),
            Operand::Literal(Literal::Float(n)) => json!(n),
        }
    }

    fn from_json(value: &JsonValue, is_left: bool) -> Result<Self> {
        match value {
            JsonValue::String(s) if is_left => Ok(Operand::Column(s.clone())),
            JsonValue::String(s) => Ok(Operand::Literal(Literal::String(s.clone()))),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Operand::Literal(Literal::Int(i))),
                None => n
                    .as_f64()
                    .map(|f| Operand::Literal(Literal::Float(f)))
                    .ok_or_else(|| malformed(value, "unrepresentable number")),
            },
            other => Err(malformed(
                other,
                "comparison arguments must be column names or scalars",
            )),
        }
    }
}

fn malformed(value: &JsonValue, reason: &str) -> QueryError {
    QueryError::InvalidArgument(format!("bad constraint {value}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Constraint {
        col("obsid")
            .gt(500)
            .and(col("obsid").lt(1000))
            .or(col("projectid").like("%000%").not())
    }

    #[test]
    fn serializes_nested_example() {
        assert_eq!(
            example().to_json(),
            json!([
                "or",
                ["and", [">", "obsid", 500], ["<", "obsid", 1000]],
                ["not", ["like", "projectid", "%000%"]]
            ])
        );
    }

    #[test]
    fn unknown_operator_is_invalid_argument() {
        let err = Constraint::parse_op("~=", col("obsid"), Literal::Int(1)).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert!("xor".parse::<LogicalOp>().is_err());
    }

    #[test]
    fn every_comparison_operator_parses() {
        for op in CompareOp::ALL {
            assert_eq!(op.as_str().parse::<CompareOp>().unwrap(), op);
        }
    }

    #[test]
    fn logical_requires_two_operands() {
        assert!(Constraint::logical(LogicalOp::And, vec![col("a").eq(1)]).is_err());
        assert!(Constraint::logical(LogicalOp::And, vec![]).is_err());
    }

    #[test]
    fn validate_rejects_short_logical_nodes() {
        let one = Constraint::Logical {
            op: LogicalOp::And,
            operands: vec![col("a").eq(1)],
        };
        assert!(one.validate().unwrap_err().is_invalid_argument());

        let nested = col("b").eq(2).or(Constraint::Logical {
            op: LogicalOp::Or,
            operands: vec![],
        });
        assert!(nested.not().validate().is_err());
        assert!(example().validate().is_ok());
    }

    #[test]
    fn wide_logical_folds_left() {
        let c = Constraint::logical(
            LogicalOp::And,
            vec![col("a").eq(1), col("b").eq(2), col("c").eq(3)],
        )
        .unwrap();
        assert_eq!(
            c.to_json(),
            json!(["and", ["and", ["=", "a", 1], ["=", "b", 2]], ["=", "c", 3]])
        );
    }

    #[test]
    fn from_json_reads_back_example() {
        let parsed = Constraint::from_json(&example().to_json()).unwrap();
        assert_eq!(parsed, example());
    }

    #[test]
    fn from_json_rejects_nested_comparison_operand() {
        let bad = json!(["=", "obsid", ["=", "a", 1]]);
        assert!(Constraint::from_json(&bad).is_err());
        assert!(Constraint::from_json(&json!(["not", ["=", "a", 1], 3])).is_err());
    }

    #[test]
    fn between_matches_range_query() {
        assert_eq!(
            Constraint::between("obsid", 10, 20).to_json(),
            json!(["and", [">=", "obsid", 10], ["<=", "obsid", 20]])
        );
    }
}
