//! # Filter Operators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
    NotLike,
    #[serde(rename = "ilike")]
    ILike,
    #[serde(rename = "not_ilike")]
    NotILike,
    Regexp,
    NotRegexp,
    Contains,
    NotContains,
    In,
    NotIn,
    Exists,
    NotExists,
    /// Known to the query layer but not compilable against body JSON.
    Between,
    NotBetween,
}

impl Operator {
    /// contains / not contains
    pub fn is_membership(self) -> bool {
        matches!(self, Operator::Contains | Operator::NotContains)
    }

    /// LIKE / ILIKE and their negations
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            Operator::Like | Operator::NotLike | Operator::ILike | Operator::NotILike
        )
    }

    pub fn is_regexp(self) -> bool {
        matches!(self, Operator::Regexp | Operator::NotRegexp)
    }

    pub fn is_existence(self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Operator::NotEqual
                | Operator::NotLike
                | Operator::NotILike
                | Operator::NotRegexp
                | Operator::NotContains
                | Operator::NotIn
                | Operator::NotExists
                | Operator::NotBetween
        )
    }

    /// The positive form of a not-* operator; identity otherwise.
    pub fn positive(self) -> Operator {
        match self {
            Operator::NotEqual => Operator::Equal,
            Operator::NotLike => Operator::Like,
            Operator::NotILike => Operator::ILike,
            Operator::NotRegexp => Operator::Regexp,
            Operator::NotContains => Operator::Contains,
            Operator::NotIn => Operator::In,
            Operator::NotExists => Operator::Exists,
            Operator::NotBetween => Operator::Between,
            op => op,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEq => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEq => "<=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
            Operator::Regexp => "regexp",
            Operator::NotRegexp => "not regexp",
            Operator::Contains => "contains",
            Operator::NotContains => "not contains",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Exists => "exists",
            Operator::NotExists => "not exists",
            Operator::Between => "between",
            Operator::NotBetween => "not between",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let op = match normalized.as_str() {
            "=" | "==" | "equal" | "eq" => Operator::Equal,
            "!=" | "<>" | "not equal" | "neq" => Operator::NotEqual,
            ">" | "greater than" | "gt" => Operator::GreaterThan,
            ">=" | "greater than or eq" | "gte" => Operator::GreaterThanOrEq,
            "<" | "less than" | "lt" => Operator::LessThan,
            "<=" | "less than or eq" | "lte" => Operator::LessThanOrEq,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "ilike" => Operator::ILike,
            "not ilike" => Operator::NotILike,
            "regexp" => Operator::Regexp,
            "not regexp" => Operator::NotRegexp,
            "contains" => Operator::Contains,
            "not contains" => Operator::NotContains,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "exists" => Operator::Exists,
            "not exists" => Operator::NotExists,
            "between" => Operator::Between,
            "not between" => Operator::NotBetween,
            _ => return Err(Error::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbolic_and_named() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Equal);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::NotEqual);
        assert_eq!("NOT  ILIKE".parse::<Operator>().unwrap(), Operator::NotILike);
        assert_eq!("not_contains".parse::<Operator>().unwrap(), Operator::NotContains);
        assert_eq!("greater_than_or_eq".parse::<Operator>().unwrap(), Operator::GreaterThanOrEq);
        assert!("~=".parse::<Operator>().is_err());
    }

    #[test]
    fn test_positive_form() {
        assert_eq!(Operator::NotContains.positive(), Operator::Contains);
        assert_eq!(Operator::NotExists.positive(), Operator::Exists);
        assert_eq!(Operator::GreaterThan.positive(), Operator::GreaterThan);
        assert!(Operator::NotIn.is_negated());
        assert!(!Operator::In.is_negated());
    }

    #[test]
    fn test_serde_snake_case() {
        let op: Operator = serde_json::from_str("\"not_ilike\"").unwrap();
        assert_eq!(op, Operator::NotILike);
        assert_eq!(
            serde_json::to_string(&Operator::GreaterThanOrEq).unwrap(),
            "\"greater_than_or_eq\""
        );
    }
}
