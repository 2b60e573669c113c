//! Structured values exchanged with the management endpoint
//!
//! A `ModelValue` is an immutable tree: objects, lists and scalars. Requests
//! are built as `ModelValue`s and responses come back as `ModelValue`s; the
//! condition evaluator and the for-loop read them through `ValuePath`s.

use crate::error::CliError;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A node in a structured request or response
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelValue {
    /// No value (missing field, unset attribute, loop placeholder)
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<ModelValue>),
    /// Fields are kept sorted by key, so rendering and iteration are in
    /// key order whatever order the endpoint sent them in
    Object(BTreeMap<String, ModelValue>),
}

impl ModelValue {
    pub fn object() -> Self {
        ModelValue::Object(BTreeMap::new())
    }

    pub fn string(s: impl Into<String>) -> Self {
        ModelValue::String(s.into())
    }

    /// Insert a field; turns `Undefined` into an object first
    pub fn set(&mut self, key: impl Into<String>, value: ModelValue) {
        if !matches!(self, ModelValue::Object(_)) {
            *self = ModelValue::object();
        }
        if let ModelValue::Object(map) = self {
            map.insert(key.into(), value);
        }
    }

    /// Builder form of `set`
    pub fn with(mut self, key: impl Into<String>, value: ModelValue) -> Self {
        self.set(key, value);
        self
    }

    /// Field lookup; missing keys and non-objects give `None`
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        match self {
            ModelValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ModelValue> {
        match self {
            ModelValue::Object(map) => map.get_mut(key),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, ModelValue::Undefined)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ModelValue::List(_))
    }

    pub fn as_list(&self) -> Option<&[ModelValue]> {
        match self {
            ModelValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Boolean-like form: booleans and the strings "true"/"false"
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            ModelValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            ModelValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Integer form, accepting numeric strings and integral doubles
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ModelValue::Int(n) => Some(*n),
            ModelValue::Double(d) if d.fract() == 0.0 && d.abs() < i64::MAX as f64 => Some(*d as i64),
            ModelValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric form, accepting numeric strings
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ModelValue::Int(n) => Some(*n as f64),
            ModelValue::Double(d) => Some(*d),
            ModelValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Scalar form used for substitution and string comparison.
    /// Strings come out unquoted, containers in compact DMR notation.
    pub fn as_string(&self) -> String {
        match self {
            ModelValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Descend along a path. Missing fields resolve to `Undefined`;
    /// indexing past the end of a list is an error.
    pub fn resolve(&self, path: &ValuePath) -> Result<ModelValue, CliError> {
        self.resolve_segments(&path.segments)
    }

    pub(crate) fn resolve_segments(&self, segments: &[PathSegment]) -> Result<ModelValue, CliError> {
        let mut current = self;
        for segment in segments {
            match segment {
                PathSegment::Field(name) => match current.get(name) {
                    Some(next) => current = next,
                    None => return Ok(ModelValue::Undefined),
                },
                PathSegment::Index(index) => match current {
                    ModelValue::List(items) => {
                        current = items.get(*index).ok_or(CliError::IndexOutOfRange {
                            index: *index,
                            len: items.len(),
                        })?;
                    }
                    _ => return Ok(ModelValue::Undefined),
                },
            }
        }
        Ok(current.clone())
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            ModelValue::Undefined => JsonValue::Null,
            ModelValue::Bool(b) => JsonValue::Bool(*b),
            ModelValue::Int(n) => JsonValue::Number((*n).into()),
            ModelValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ModelValue::String(s) => JsonValue::String(s.clone()),
            ModelValue::List(items) => JsonValue::Array(items.iter().map(ModelValue::to_json).collect()),
            ModelValue::Object(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => ModelValue::Undefined,
            JsonValue::Bool(b) => ModelValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => ModelValue::Int(i),
                None => ModelValue::Double(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => ModelValue::String(s),
            JsonValue::Array(items) => ModelValue::List(items.into_iter().map(ModelValue::from_json).collect()),
            JsonValue::Object(map) => ModelValue::Object(
                map.into_iter().map(|(k, v)| (k, ModelValue::from_json(v))).collect(),
            ),
        }
    }
}

/// Compact DMR notation: `{"outcome" => "success","result" => [1,2]}`
impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Undefined => write!(f, "undefined"),
            ModelValue::Bool(b) => write!(f, "{}", b),
            ModelValue::Int(n) => write!(f, "{}", n),
            ModelValue::Double(d) => {
                if d.fract() == 0.0 && d.abs() < 1e15 {
                    write!(f, "{:.1}", d)
                } else {
                    write!(f, "{}", d)
                }
            }
            ModelValue::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            ModelValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ModelValue::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\" => {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One step of a path into a structured value
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A dotted/bracketed path such as `result.children[2].name`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValuePath {
    pub segments: Vec<PathSegment>,
}

impl ValuePath {
    pub fn parse(text: &str) -> Result<Self, CliError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CliError::Parse("empty path".into()));
        }

        let mut segments = Vec::new();
        let mut field = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if field.is_empty() && !matches!(segments.last(), Some(PathSegment::Index(_))) {
                        return Err(CliError::Parse(format!("empty path segment in '{}'", text)));
                    }
                    if !field.is_empty() {
                        segments.push(PathSegment::Field(std::mem::take(&mut field)));
                    }
                }
                '[' => {
                    if !field.is_empty() {
                        segments.push(PathSegment::Field(std::mem::take(&mut field)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) => digits.push(d),
                            None => return Err(CliError::Parse(format!("unclosed '[' in '{}'", text))),
                        }
                    }
                    let index = digits.trim().parse().map_err(|_| {
                        CliError::Parse(format!("invalid index '{}' in '{}'", digits, text))
                    })?;
                    segments.push(PathSegment::Index(index));
                }
                c if c.is_whitespace() => {
                    return Err(CliError::Parse(format!("whitespace in path '{}'", text)));
                }
                c => field.push(c),
            }
        }

        if !field.is_empty() {
            segments.push(PathSegment::Field(field));
        } else if text.ends_with('.') {
            return Err(CliError::Parse(format!("path '{}' ends with '.'", text)));
        }

        Ok(ValuePath { segments })
    }

    /// The leading field name, if the path starts with one
    pub fn root(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Everything after the root segment
    pub fn tail(&self) -> &[PathSegment] {
        if self.segments.is_empty() {
            &[]
        } else {
            &self.segments[1..]
        }
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelValue {
        ModelValue::object()
            .with("outcome", ModelValue::string("success"))
            .with(
                "result",
                ModelValue::List(vec![
                    ModelValue::object().with("name", ModelValue::string("a")),
                    ModelValue::object().with("name", ModelValue::string("b")),
                ]),
            )
    }

    #[test]
    fn test_path_parse() {
        let path = ValuePath::parse("result[1].name").unwrap();
        assert_eq!(
            path.segments,
            vec![
                PathSegment::Field("result".into()),
                PathSegment::Index(1),
                PathSegment::Field("name".into()),
            ]
        );
        assert_eq!(path.to_string(), "result[1].name");
        assert!(ValuePath::parse("a..b").is_err());
        assert!(ValuePath::parse("a[x]").is_err());
        assert!(ValuePath::parse("a[1").is_err());
    }

    #[test]
    fn test_resolve_descends() {
        let v = sample();
        let name = v.resolve(&ValuePath::parse("result[1].name").unwrap()).unwrap();
        assert_eq!(name, ModelValue::string("b"));
    }

    #[test]
    fn test_missing_field_is_undefined() {
        let v = sample();
        let missing = v.resolve(&ValuePath::parse("result[0].nope.deeper").unwrap()).unwrap();
        assert_eq!(missing, ModelValue::Undefined);
        // indexing a non-list is also undefined
        let odd = v.resolve(&ValuePath::parse("outcome[0]").unwrap()).unwrap();
        assert_eq!(odd, ModelValue::Undefined);
    }

    #[test]
    fn test_index_out_of_range_fails() {
        let v = sample();
        let err = v.resolve(&ValuePath::parse("result[5]").unwrap()).unwrap_err();
        assert!(matches!(err, CliError::IndexOutOfRange { index: 5, len: 2 }));
    }

    #[test]
    fn test_scalar_forms() {
        assert_eq!(ModelValue::string("true").as_bool(), Some(true));
        assert_eq!(ModelValue::Int(3).as_bool(), None);
        assert_eq!(ModelValue::string(" 42 ").as_i64(), Some(42));
        assert_eq!(ModelValue::Double(2.0).as_i64(), Some(2));
        assert_eq!(ModelValue::string("x").as_string(), "x");
        assert_eq!(ModelValue::Int(7).as_string(), "7");
    }

    #[test]
    fn test_dmr_display() {
        let v = ModelValue::object()
            .with("a", ModelValue::List(vec![ModelValue::Int(1), ModelValue::Bool(false)]))
            .with("b", ModelValue::string("x"));
        assert_eq!(v.to_string(), "{\"a\" => [1,false],\"b\" => \"x\"}");
    }

    #[test]
    fn test_object_keys_render_sorted() {
        let json: JsonValue = serde_json::from_str(r#"{"result":{"zeta":1,"alpha":2},"outcome":"success"}"#).unwrap();
        let v = ModelValue::from_json(json);
        assert_eq!(v.to_string(), r#"{"outcome" => "success","result" => {"alpha" => 2,"zeta" => 1}}"#);

        let built = ModelValue::object().with("b", ModelValue::Int(1)).with("a", ModelValue::Int(2));
        assert_eq!(built.to_string(), r#"{"a" => 2,"b" => 1}"#);
    }

    #[test]
    fn test_json_conversion() {
        let json: JsonValue = serde_json::from_str(r#"{"outcome":"success","result":[1,2.5,null]}"#).unwrap();
        let v = ModelValue::from_json(json.clone());
        assert_eq!(
            v.get("result"),
            Some(&ModelValue::List(vec![
                ModelValue::Int(1),
                ModelValue::Double(2.5),
                ModelValue::Undefined,
            ]))
        );
        assert_eq!(v.to_json(), json);
    }
}
