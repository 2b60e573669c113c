//! Session variables
//!
//! Variables map names to structured values. A reference is a bare name or a
//! name followed by a path (`$servers[0].name`); the path is applied at read
//! time, so a later rebinding of the root is always observed.
//!
//! Loop variables are bound to `Undefined` when a `for` block opens and stay
//! bound until the block has finished running, whatever the outcome.

use crate::error::CliError;
use crate::value::{ModelValue, ValuePath};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    vars: BTreeMap<String, ModelValue>,
}

/// Variable names: ASCII letters, digits and `_`, not starting with a digit
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new variable; fails if the name is already taken
    pub fn bind(&mut self, name: &str, value: ModelValue) -> Result<(), CliError> {
        if !is_valid_name(name) {
            return Err(CliError::Parse(format!("invalid variable name '{}'", name)));
        }
        if self.vars.contains_key(name) {
            return Err(CliError::VariableAlreadyBound(name.to_string()));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    /// Bind or rebind a variable
    pub fn set(&mut self, name: &str, value: ModelValue) -> Result<(), CliError> {
        if !is_valid_name(name) {
            return Err(CliError::Parse(format!("invalid variable name '{}'", name)));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    pub fn unbind(&mut self, name: &str) -> Option<ModelValue> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ModelValue> {
        self.vars.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.vars.keys().map(|k| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelValue)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolve a reference. An unbound root or a missing field gives
    /// `Undefined`; an out-of-range index is an error.
    pub fn resolve(&self, reference: &ValuePath) -> Result<ModelValue, CliError> {
        let root = match reference.root().and_then(|name| self.vars.get(name)) {
            Some(value) => value,
            None => return Ok(ModelValue::Undefined),
        };
        root.resolve_segments(reference.tail())
    }

    /// Resolve `name.path[0]` text (without the leading `$`)
    pub fn resolve_text(&self, reference: &str) -> Result<ModelValue, CliError> {
        self.resolve(&ValuePath::parse(reference)?)
    }

    /// Replace `$name` / `$name.path[i]` references in a line with the scalar
    /// form of their values. Unbound names, `${expression}` and `\$` are left
    /// as written.
    pub fn substitute(&self, line: &str) -> Result<String, CliError> {
        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\\' && chars.get(i + 1) == Some(&'$') {
                out.push('$');
                i += 2;
                continue;
            }
            if c != '$' || !chars.get(i + 1).map(|n| n.is_ascii_alphabetic() || *n == '_').unwrap_or(false) {
                out.push(c);
                i += 1;
                continue;
            }

            let end = reference_end(&chars, i + 1);
            let reference: String = chars[i + 1..end].iter().collect();
            let path = ValuePath::parse(&reference)?;
            match path.root() {
                Some(root) if self.vars.contains_key(root) => {
                    out.push_str(&self.resolve(&path)?.as_string());
                }
                _ => {
                    out.push('$');
                    out.push_str(&reference);
                }
            }
            i = end;
        }

        Ok(out)
    }
}

/// Scan a reference starting at `start`: a name, then any number of
/// `.field` and `[digits]` suffixes.
fn reference_end(chars: &[char], start: usize) -> usize {
    let is_name = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut i = start;
    while i < chars.len() && is_name(chars[i]) {
        i += 1;
    }
    loop {
        match chars.get(i) {
            Some('.') if chars.get(i + 1).map(|c| c.is_ascii_alphabetic() || *c == '_').unwrap_or(false) => {
                i += 1;
                while i < chars.len() && (is_name(chars[i]) || chars[i] == '-') {
                    i += 1;
                }
            }
            Some('[') => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j > i + 1 && chars.get(j) == Some(&']') {
                    i = j + 1;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> VariableTable {
        let mut vars = VariableTable::new();
        vars.set("x", ModelValue::Int(3)).unwrap();
        vars.set(
            "servers",
            ModelValue::List(vec![
                ModelValue::object().with("name", ModelValue::string("one")),
                ModelValue::object().with("name", ModelValue::string("two")),
            ]),
        )
        .unwrap();
        vars
    }

    #[test]
    fn test_bind_rejects_duplicates() {
        let mut vars = table();
        assert!(matches!(
            vars.bind("x", ModelValue::Undefined),
            Err(CliError::VariableAlreadyBound(name)) if name == "x"
        ));
        vars.bind("y", ModelValue::Undefined).unwrap();
        assert!(vars.contains("y"));
    }

    #[test]
    fn test_invalid_names() {
        let mut vars = VariableTable::new();
        assert!(vars.set("1x", ModelValue::Int(1)).is_err());
        assert!(vars.set("a-b", ModelValue::Int(1)).is_err());
        assert!(is_valid_name("_tmp9"));
    }

    #[test]
    fn test_resolve_paths() {
        let vars = table();
        assert_eq!(vars.resolve_text("servers[1].name").unwrap(), ModelValue::string("two"));
        assert_eq!(vars.resolve_text("servers[0].missing").unwrap(), ModelValue::Undefined);
        assert_eq!(vars.resolve_text("nobody").unwrap(), ModelValue::Undefined);
        assert!(matches!(
            vars.resolve_text("servers[9]"),
            Err(CliError::IndexOutOfRange { index: 9, len: 2 })
        ));
    }

    #[test]
    fn test_unbind() {
        let mut vars = table();
        assert_eq!(vars.unbind("x"), Some(ModelValue::Int(3)));
        assert_eq!(vars.resolve_text("x").unwrap(), ModelValue::Undefined);
    }

    #[test]
    fn test_substitute() {
        let vars = table();
        assert_eq!(vars.substitute("echo $x items").unwrap(), "echo 3 items");
        assert_eq!(vars.substitute("echo $servers[1].name.").unwrap(), "echo two.");
        assert_eq!(
            vars.substitute(":write-attribute(name=a,value=${jboss.home})").unwrap(),
            ":write-attribute(name=a,value=${jboss.home})"
        );
        assert_eq!(vars.substitute("echo $unknown \\$x").unwrap(), "echo $unknown $x");
    }
}
