//! Parser for operation requests and DMR literals
//!
//! Operation requests look like
//! `/subsystem=logging/logger=app:write-attribute(name=level,value=DEBUG)`
//! and optionally carry an operation-headers object: `:op(){rollback=false}`.
//! Literals are the values that appear as parameters, `set` values, condition
//! operands and for-loop sources.

use crate::error::CliError;
use crate::lexer::identifier;
use crate::value::ModelValue;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use std::collections::BTreeMap;

/// A parsed `[address]:operation[(params)][{headers}]` request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationRequest {
    pub address: Vec<(String, String)>,
    pub operation: String,
    pub params: Vec<(String, ModelValue)>,
    pub headers: Option<ModelValue>,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        OperationRequest {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, node_type: &str, name: &str) -> Self {
        self.address.push((node_type.to_string(), name.to_string()));
        self
    }

    pub fn param(mut self, name: &str, value: ModelValue) -> Self {
        self.params.push((name.to_string(), value));
        self
    }

    /// The wire form: `{"operation" => .., "address" => [("type" => "name")..], params..}`
    pub fn to_model(&self) -> ModelValue {
        let address = self
            .address
            .iter()
            .map(|(t, n)| ModelValue::object().with(t.clone(), ModelValue::string(n.clone())))
            .collect();

        let mut request = ModelValue::object()
            .with("operation", ModelValue::string(self.operation.clone()))
            .with("address", ModelValue::List(address));
        for (name, value) in &self.params {
            request.set(name.clone(), value.clone());
        }
        if let Some(headers) = &self.headers {
            request.set("operation-headers", headers.clone());
        }
        request
    }
}

/// True when a line should be treated as an operation request
pub fn is_operation(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with(':') || line.starts_with('/') || line.starts_with("./")
}

fn ws<'a, O>(inner: impl FnMut(&'a str) -> IResult<&'a str, O>) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

fn quoted(input: &str) -> IResult<&str, ModelValue> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(
                is_not("\"\\"),
                '\\',
                alt((value("\"", char('"')), value("\\", char('\\')), value("\n", char('n')))),
            )),
            char('"'),
        ),
        |s| ModelValue::String(s.unwrap_or_default()),
    )(input)
}

/// Classify an unquoted token
pub(crate) fn scalar_from_text(text: &str) -> ModelValue {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return ModelValue::Int(n);
    }
    if text.contains('.') || text.contains('e') || text.contains('E') {
        if let Ok(d) = text.parse::<f64>() {
            if d.is_finite() {
                return ModelValue::Double(d);
            }
        }
    }
    match text {
        "true" => ModelValue::Bool(true),
        "false" => ModelValue::Bool(false),
        "undefined" => ModelValue::Undefined,
        _ => ModelValue::String(text.to_string()),
    }
}

fn scalar(input: &str) -> IResult<&str, ModelValue> {
    map(take_while1(|c: char| !",)]}=".contains(c)), scalar_from_text)(input)
}

fn list(input: &str) -> IResult<&str, ModelValue> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), literal),
            ws(char(']')),
        ),
        ModelValue::List,
    )(input)
}

fn object_key(input: &str) -> IResult<&str, String> {
    ws(alt((
        map(quoted, |v| v.as_string()),
        map(take_while1(|c: char| !"=,}\" \t".contains(c)), String::from),
    )))(input)
}

fn object(input: &str) -> IResult<&str, ModelValue> {
    map(
        delimited(
            ws(char('{')),
            separated_list0(
                ws(char(',')),
                separated_pair(object_key, alt((tag("=>"), tag("="))), literal),
            ),
            ws(char('}')),
        ),
        |pairs| ModelValue::Object(pairs.into_iter().collect::<BTreeMap<_, _>>()),
    )(input)
}

fn literal(input: &str) -> IResult<&str, ModelValue> {
    ws(alt((quoted, list, object, scalar)))(input)
}

/// `(a,b,c)` list form, accepted at the top level only
fn paren_list(input: &str) -> IResult<&str, ModelValue> {
    map(
        delimited(
            ws(char('(')),
            separated_list0(ws(char(',')), literal),
            ws(char(')')),
        ),
        ModelValue::List,
    )(input)
}

/// Parse a standalone literal. Anything that is not a recognised structure
/// is taken as a (trimmed) string.
pub fn parse_literal(text: &str) -> ModelValue {
    let text = text.trim();
    if text.is_empty() {
        return ModelValue::String(String::new());
    }
    match all_consuming(alt((paren_list, literal)))(text) {
        Ok((_, v)) => v,
        Err(_) => ModelValue::String(text.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn node_name(input: &str) -> IResult<&str, String> {
    alt((
        map(quoted, |v| v.as_string()),
        map(take_while1(|c: char| c != '/' && c != ':' && !c.is_whitespace()), String::from),
    ))(input)
}

fn address_node(input: &str) -> IResult<&str, (String, String)> {
    separated_pair(
        map(take_while1(|c: char| c != '=' && c != '/' && c != ':' && !c.is_whitespace()), String::from),
        char('='),
        node_name,
    )(input)
}

fn address(input: &str) -> IResult<&str, Vec<(String, String)>> {
    map(
        opt(preceded(
            alt((tag("./"), tag("/"))),
            opt(separated_list1(char('/'), address_node)),
        )),
        |nodes| nodes.flatten().unwrap_or_default(),
    )(input)
}

fn param(input: &str) -> IResult<&str, (String, ModelValue)> {
    map(
        pair(identifier, opt(preceded(char('='), literal))),
        |(name, v)| (name.to_string(), v.unwrap_or(ModelValue::Bool(true))),
    )(input)
}

fn params(input: &str) -> IResult<&str, Vec<(String, ModelValue)>> {
    delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), param),
        ws(char(')')),
    )(input)
}

fn request(input: &str) -> IResult<&str, OperationRequest> {
    map(
        tuple((
            preceded(multispace0, address),
            preceded(char(':'), terminated(identifier, multispace0)),
            opt(params),
            opt(object),
        )),
        |(address, operation, params, headers)| OperationRequest {
            address,
            operation: operation.to_string(),
            params: params.unwrap_or_default(),
            headers,
        },
    )(input)
}

/// Parse an operation request line
pub fn parse_request(text: &str) -> Result<OperationRequest, CliError> {
    match all_consuming(request)(text.trim()) {
        Ok((_, req)) => Ok(req),
        Err(e) => Err(CliError::Parse(format!("invalid operation request '{}': {}", text.trim(), e))),
    }
}
