//! SQL-like rendering of constraints
//!
//! Only used for logging and error messages. The server does its own
//! translation from the wire form.

use std::fmt::{self, Display};

use crate::constraint::{CompareOp, Constraint, Literal, LogicalOp, Operand};

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(name) => write!(f, "{}", name),
            Operand::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Like => "LIKE",
            other => other.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        };
        write!(f, "{}", s)
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Comparison { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Constraint::Logical { op, operands } => {
                // Matches the left fold used on the wire
                let mut rendered = String::new();
                for (i, operand) in operands.iter().enumerate() {
                    rendered = if i == 0 {
                        operand.to_string()
                    } else {
                        format!("({} {} {})", rendered, op, operand)
                    };
                }
                write!(f, "{}", rendered)
            }
            Constraint::Not(inner) => write!(f, "(NOT {})", inner),
        }
    }
}
