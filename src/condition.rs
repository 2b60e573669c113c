//! Conditions for `if` blocks
//!
//! A condition compares a path into a response (or a variable) with a
//! literal: `result == 5`, `outcome != success`, `result.names *= app`,
//! `$servers #= 3`. Comparisons combine with `&&` and `||` and group with
//! parentheses. A bare operand (`result`) evaluates to the value itself,
//! which the caller then requires to be boolean.
//!
//! The comparison functions are total: incompatible operands compare as
//! `false` rather than failing. Only resolving an operand can fail.

use crate::error::CliError;
use crate::parser::parse_literal;
use crate::value::{ModelValue, ValuePath};
use crate::variables::VariableTable;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Greater,
    Lesser,
    GreaterOrEqual,
    LesserOrEqual,
    Matches,
    Contains,
    SizeEquals,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::Greater => ">",
            Operator::Lesser => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LesserOrEqual => "<=",
            Operator::Matches => "~=",
            Operator::Contains => "*=",
            Operator::SizeEquals => "#=",
        }
    }

    pub fn apply(&self, left: &ModelValue, right: &ModelValue) -> bool {
        match self {
            Operator::Equals => equals(left, right),
            Operator::NotEquals => !equals(left, right),
            Operator::Greater => compare(left, right) == Some(Ordering::Greater),
            Operator::Lesser => compare(left, right) == Some(Ordering::Less),
            Operator::GreaterOrEqual => matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal)),
            Operator::LesserOrEqual => matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)),
            Operator::Matches => matches_pattern(left, right),
            Operator::Contains => contains(left, right),
            Operator::SizeEquals => size_equals(left, right),
        }
    }
}

/// Typed ordering: numeric when both sides have a numeric form, otherwise
/// by scalar string form. Containers and `Undefined` are unordered.
///
/// Integers compare exactly; `f64` is used only when a double or a
/// fractional string is involved.
pub fn compare(left: &ModelValue, right: &ModelValue) -> Option<Ordering> {
    let unordered = |v: &ModelValue| matches!(v, ModelValue::List(_) | ModelValue::Object(_) | ModelValue::Undefined);
    if unordered(left) || unordered(right) {
        return None;
    }
    let is_double = |v: &ModelValue| matches!(v, ModelValue::Double(_));
    if !is_double(left) && !is_double(right) {
        if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
            return Some(l.cmp(&r));
        }
    }
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    Some(left.as_string().cmp(&right.as_string()))
}

/// Equality: structural for containers and `Undefined`, typed for scalars
pub fn equals(left: &ModelValue, right: &ModelValue) -> bool {
    match compare(left, right) {
        Some(ordering) => ordering == Ordering::Equal,
        None => left == right,
    }
}

/// `~=`: the whole string form of `left` matches the pattern in `right`
pub fn matches_pattern(left: &ModelValue, right: &ModelValue) -> bool {
    if !left.is_defined() {
        return false;
    }
    match Regex::new(&format!("^(?:{})$", right.as_string())) {
        Ok(re) => re.is_match(&left.as_string()),
        Err(_) => false,
    }
}

/// `*=`: `left` is a list holding an element structurally equal to `right`
pub fn contains(left: &ModelValue, right: &ModelValue) -> bool {
    match left {
        ModelValue::List(items) => items.iter().any(|item| item == right),
        _ => false,
    }
}

/// `#=`: `left` is a list whose length is the integer form of `right`
pub fn size_equals(left: &ModelValue, right: &ModelValue) -> bool {
    match (left, right.as_i64()) {
        (ModelValue::List(items), Some(n)) => n >= 0 && items.len() as i64 == n,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Path into the value the condition is evaluated against
    Path(ValuePath),
    /// `$name.path` into a session variable
    Variable(ValuePath),
    Literal(ModelValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        op: Operator,
        right: Operand,
    },
    Value(Operand),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn parse(text: &str) -> Result<Self, CliError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CliError::Parse("empty condition".into()));
        }
        match all_consuming(expression)(text) {
            Ok((_, condition)) => Ok(condition),
            Err(_) => Err(CliError::Parse(format!("invalid condition '{}'", text))),
        }
    }

    /// True when the condition reads the target value (as opposed to only
    /// variables and literals)
    pub fn uses_target(&self) -> bool {
        match self {
            Condition::Compare { left, right, .. } => {
                matches!(left, Operand::Path(_)) || matches!(right, Operand::Path(_))
            }
            Condition::Value(operand) => matches!(operand, Operand::Path(_)),
            Condition::And(a, b) | Condition::Or(a, b) => a.uses_target() || b.uses_target(),
        }
    }

    /// Evaluate against `target`; comparisons yield booleans, a bare operand
    /// yields its resolved value
    pub fn evaluate(&self, target: &ModelValue, vars: &VariableTable) -> Result<ModelValue, CliError> {
        match self {
            Condition::Compare { left, op, right } => {
                let l = resolve_operand(left, target, vars)?;
                let r = resolve_operand(right, target, vars)?;
                Ok(ModelValue::Bool(op.apply(&l, &r)))
            }
            Condition::Value(operand) => resolve_operand(operand, target, vars),
            Condition::And(a, b) => {
                if !a.is_satisfied(target, vars)? {
                    return Ok(ModelValue::Bool(false));
                }
                Ok(ModelValue::Bool(b.is_satisfied(target, vars)?))
            }
            Condition::Or(a, b) => {
                if a.is_satisfied(target, vars)? {
                    return Ok(ModelValue::Bool(true));
                }
                Ok(ModelValue::Bool(b.is_satisfied(target, vars)?))
            }
        }
    }

    /// Evaluate and require a boolean-like result
    pub fn is_satisfied(&self, target: &ModelValue, vars: &VariableTable) -> Result<bool, CliError> {
        let resolved = self.evaluate(target, vars)?;
        resolved
            .as_bool()
            .ok_or_else(|| CliError::ConditionNotBoolean(format!("'{}' resolved to {}", self, resolved)))
    }
}

fn resolve_operand(operand: &Operand, target: &ModelValue, vars: &VariableTable) -> Result<ModelValue, CliError> {
    match operand {
        Operand::Literal(v) => Ok(v.clone()),
        Operand::Path(path) => {
            if !target.is_defined() {
                return Err(CliError::NullCondition(format!("no value to resolve '{}' against", path)));
            }
            target.resolve(path)
        }
        Operand::Variable(path) => match path.root() {
            Some(root) if vars.contains(root) => vars.resolve(path),
            _ => Err(CliError::NullCondition(format!("variable '${}' is not bound", path))),
        },
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Path(p) => write!(f, "{}", p),
            Operand::Variable(p) => write!(f, "${}", p),
            Operand::Literal(ModelValue::String(s)) => write!(f, "{}", s),
            Operand::Literal(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { left, op, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Condition::Value(operand) => write!(f, "{}", operand),
            Condition::And(a, b) => write!(f, "({} && {})", a, b),
            Condition::Or(a, b) => write!(f, "({} || {})", a, b),
        }
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

fn ws<'a, O>(inner: impl FnMut(&'a str) -> IResult<&'a str, O>) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn path_text(input: &str) -> IResult<&str, ValuePath> {
    map_res(
        take_while1(|c: char| c.is_ascii_alphanumeric() || "_-.[]".contains(c)),
        ValuePath::parse,
    )(input)
}

fn variable(input: &str) -> IResult<&str, Operand> {
    map(preceded(char('$'), path_text), Operand::Variable)(input)
}

fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Equals, tag("==")),
        value(Operator::NotEquals, tag("!=")),
        value(Operator::GreaterOrEqual, tag(">=")),
        value(Operator::LesserOrEqual, tag("<=")),
        value(Operator::Matches, tag("~=")),
        value(Operator::Contains, tag("*=")),
        value(Operator::SizeEquals, tag("#=")),
        value(Operator::Greater, tag(">")),
        value(Operator::Lesser, tag("<")),
    ))(input)
}

fn quoted_literal(input: &str) -> IResult<&str, Operand> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(
                is_not("\"\\"),
                '\\',
                alt((value("\"", char('"')), value("\\", char('\\')))),
            )),
            char('"'),
        ),
        |s| Operand::Literal(ModelValue::String(s.unwrap_or_default())),
    )(input)
}

fn bare_literal(input: &str) -> IResult<&str, Operand> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != ')' && c != '&' && c != '|'),
        |s: &str| Operand::Literal(parse_literal(s)),
    )(input)
}

fn left_operand(input: &str) -> IResult<&str, Operand> {
    ws(alt((variable, map(path_text, Operand::Path))))(input)
}

fn right_operand(input: &str) -> IResult<&str, Operand> {
    ws(alt((variable, quoted_literal, bare_literal)))(input)
}

fn comparison(input: &str) -> IResult<&str, Condition> {
    map(
        pair(left_operand, opt(pair(ws(operator), right_operand))),
        |(left, rest)| match rest {
            Some((op, right)) => Condition::Compare { left, op, right },
            None => Condition::Value(left),
        },
    )(input)
}

fn atom(input: &str) -> IResult<&str, Condition> {
    alt((delimited(ws(char('(')), expression, ws(char(')'))), comparison))(input)
}

fn conjunction(input: &str) -> IResult<&str, Condition> {
    let (input, first) = atom(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), atom))(input)?;
    Ok((
        input,
        rest.into_iter().fold(first, |acc, c| Condition::And(Box::new(acc), Box::new(c))),
    ))
}

fn expression(input: &str) -> IResult<&str, Condition> {
    let (input, first) = conjunction(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), conjunction))(input)?;
    Ok((
        input,
        rest.into_iter().fold(first, |acc, c| Condition::Or(Box::new(acc), Box::new(c))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(result: ModelValue) -> ModelValue {
        ModelValue::object()
            .with("outcome", ModelValue::string("success"))
            .with("result", result)
    }

    fn eval(cond: &str, target: &ModelValue) -> Result<ModelValue, CliError> {
        Condition::parse(cond).unwrap().evaluate(target, &VariableTable::new())
    }

    #[test]
    fn test_parse_simple() {
        let c = Condition::parse("result==5").unwrap();
        assert_eq!(
            c,
            Condition::Compare {
                left: Operand::Path(ValuePath::parse("result").unwrap()),
                op: Operator::Equals,
                right: Operand::Literal(ModelValue::Int(5)),
            }
        );
        assert_eq!(c.to_string(), "result == 5");
    }

    #[test]
    fn test_parse_grouping() {
        let c = Condition::parse("(outcome == success && result > 1) || $force").unwrap();
        assert!(matches!(c, Condition::Or(_, _)));
        assert!(Condition::parse("result ==").is_err());
        assert!(Condition::parse("").is_err());
        assert!(Condition::parse("(result == 1").is_err());
    }

    #[test]
    fn test_numeric_and_string_comparison() {
        let r = response(ModelValue::Int(5));
        assert_eq!(eval("result == 5", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result >= 5", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result < 10", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result > 10", &r).unwrap(), ModelValue::Bool(false));
        assert_eq!(eval("outcome == success", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("outcome != \"success\"", &r).unwrap(), ModelValue::Bool(false));

        // numeric strings compare as numbers: "10" > "9"
        let s = response(ModelValue::string("10"));
        assert_eq!(eval("result > 9", &s).unwrap(), ModelValue::Bool(true));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        // 2^53 + 1 and 2^53 are the same f64
        let r = response(ModelValue::Int(9_007_199_254_740_993));
        assert_eq!(eval("result == 9007199254740992", &r).unwrap(), ModelValue::Bool(false));
        assert_eq!(eval("result > 9007199254740992", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result <= 9007199254740992", &r).unwrap(), ModelValue::Bool(false));
        assert_eq!(eval("result == 9007199254740993", &r).unwrap(), ModelValue::Bool(true));

        let s = response(ModelValue::string("9007199254740993"));
        assert_eq!(eval("result != 9007199254740992", &s).unwrap(), ModelValue::Bool(true));

        // a double on either side still compares as a number
        let d = response(ModelValue::Double(2.5));
        assert_eq!(eval("result > 2", &d).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result < \"2.75\"", &d).unwrap(), ModelValue::Bool(true));
        assert!(equals(&ModelValue::Int(2), &ModelValue::Double(2.0)));
    }

    #[test]
    fn test_missing_field_equals_undefined() {
        let r = response(ModelValue::Int(1));
        assert_eq!(eval("result.nope == undefined", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result.nope > 0", &r).unwrap(), ModelValue::Bool(false));
    }

    #[test]
    fn test_contains_and_size() {
        let r = response(ModelValue::List(vec![ModelValue::string("a"), ModelValue::Int(2)]));
        assert_eq!(eval("result *= a", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result *= 2", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result *= b", &r).unwrap(), ModelValue::Bool(false));
        assert_eq!(eval("result #= 2", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result #= 3", &r).unwrap(), ModelValue::Bool(false));
        assert_eq!(eval("result == [a,2]", &r).unwrap(), ModelValue::Bool(true));
        // never throws on non-lists
        assert_eq!(eval("outcome *= s", &r).unwrap(), ModelValue::Bool(false));
        assert_eq!(eval("outcome #= 7", &r).unwrap(), ModelValue::Bool(false));
    }

    #[test]
    fn test_contains_is_total() {
        let samples = vec![
            ModelValue::Undefined,
            ModelValue::Bool(true),
            ModelValue::Int(1),
            ModelValue::string("1"),
            ModelValue::object().with("a", ModelValue::Int(1)),
            ModelValue::List(vec![ModelValue::Int(1)]),
        ];
        for v in &samples {
            for x in &samples {
                let expected = matches!(v, ModelValue::List(items) if items.contains(x));
                assert_eq!(contains(v, x), expected, "contains({}, {})", v, x);
            }
        }
    }

    #[test]
    fn test_regex_match() {
        let r = response(ModelValue::string("app-1.2.war"));
        assert_eq!(eval("result ~= app-.*\\.war", &r).unwrap(), ModelValue::Bool(true));
        assert_eq!(eval("result ~= app", &r).unwrap(), ModelValue::Bool(false));
        // an invalid pattern is simply false
        assert_eq!(eval("result ~= (", &r).unwrap(), ModelValue::Bool(false));
    }

    #[test]
    fn test_bare_operand_must_be_boolean() {
        let r = response(ModelValue::Bool(true));
        let c = Condition::parse("result").unwrap();
        assert!(c.is_satisfied(&r, &VariableTable::new()).unwrap());

        let r = response(ModelValue::Int(3));
        assert!(matches!(
            c.is_satisfied(&r, &VariableTable::new()),
            Err(CliError::ConditionNotBoolean(_))
        ));
        let r = response(ModelValue::Undefined);
        assert!(matches!(
            c.is_satisfied(&r, &VariableTable::new()),
            Err(CliError::ConditionNotBoolean(_))
        ));
    }

    #[test]
    fn test_null_condition() {
        let c = Condition::parse("result == 1").unwrap();
        assert!(matches!(
            c.evaluate(&ModelValue::Undefined, &VariableTable::new()),
            Err(CliError::NullCondition(_))
        ));
        let c = Condition::parse("$missing == 1").unwrap();
        assert!(matches!(
            c.evaluate(&response(ModelValue::Int(1)), &VariableTable::new()),
            Err(CliError::NullCondition(_))
        ));
    }

    #[test]
    fn test_variables_and_logic() {
        let mut vars = VariableTable::new();
        vars.set("limit", ModelValue::Int(3)).unwrap();
        vars.set("names", ModelValue::List(vec![ModelValue::string("x")])).unwrap();
        let r = response(ModelValue::Int(2));

        let c = Condition::parse("result < $limit && $names *= x").unwrap();
        assert!(c.is_satisfied(&r, &vars).unwrap());
        let c = Condition::parse("result > $limit || $names #= 1").unwrap();
        assert!(c.is_satisfied(&r, &vars).unwrap());
        let c = Condition::parse("$limit == 3").unwrap();
        assert!(!c.uses_target());
        assert!(c.is_satisfied(&ModelValue::Undefined, &vars).unwrap());
    }

    #[test]
    fn test_logic_short_circuits() {
        // the right side would fail to resolve, but is never reached
        let r = response(ModelValue::Int(1));
        let c = Condition::parse("result == 2 && $missing == 1").unwrap();
        assert!(!c.is_satisfied(&r, &VariableTable::new()).unwrap());
    }

    #[test]
    fn test_structured_equality() {
        let list = ModelValue::List(vec![ModelValue::Int(1)]);
        assert!(equals(&list, &list.clone()));
        assert!(!equals(&list, &ModelValue::Int(1)));
        assert_eq!(compare(&list, &list), None);
        assert!(equals(&ModelValue::Bool(true), &ModelValue::string("true")));
    }
}
