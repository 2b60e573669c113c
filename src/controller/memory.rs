//! In-memory management model
//!
//! A tree of resources, each with attributes and typed children, answering
//! the generic management operations. Used when no endpoint is configured
//! (offline mode) and as the test double for the interpreter.
//!
//! Model files are JSON:
//!
//! ```text
//! {
//!   "attributes": {"name": "server-one"},
//!   "children": {
//!     "deployment": {"app.war": {"attributes": {"enabled": true}}}
//!   }
//! }
//! ```

use crate::error::CliError;
use crate::session::{failure, success, ModelController};
use crate::value::ModelValue;
use std::collections::BTreeMap;
use std::path::Path;

/// Keys of a request that are not operation parameters
const RESERVED: &[&str] = &["operation", "address", "operation-headers"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub attributes: BTreeMap<String, ModelValue>,
    pub children: BTreeMap<String, BTreeMap<String, Resource>>,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &str, value: ModelValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn with_child(mut self, child_type: &str, name: &str, child: Resource) -> Self {
        self.children
            .entry(child_type.to_string())
            .or_default()
            .insert(name.to_string(), child);
        self
    }

    pub fn from_model(model: &ModelValue) -> Resource {
        let mut resource = Resource::new();
        if let Some(ModelValue::Object(attrs)) = model.get("attributes") {
            resource.attributes = attrs.clone();
        }
        if let Some(ModelValue::Object(types)) = model.get("children") {
            for (child_type, instances) in types {
                let entry = resource.children.entry(child_type.clone()).or_default();
                if let ModelValue::Object(instances) = instances {
                    for (name, child) in instances {
                        entry.insert(name.clone(), Resource::from_model(child));
                    }
                }
            }
        }
        resource
    }

    /// `read-resource` view: attributes plus one entry per child type.
    /// Children are expanded when `recursive`, otherwise listed by name.
    pub fn to_model(&self, recursive: bool) -> ModelValue {
        let mut out = ModelValue::Object(self.attributes.clone());
        for (child_type, instances) in &self.children {
            let children = instances
                .iter()
                .map(|(name, child)| {
                    let value = if recursive { child.to_model(true) } else { ModelValue::Undefined };
                    (name.clone(), value)
                })
                .collect();
            out.set(child_type.clone(), ModelValue::Object(children));
        }
        out
    }

    fn at(&self, address: &[(String, String)]) -> Option<&Resource> {
        let mut current = self;
        for (t, n) in address {
            current = current.children.get(t)?.get(n)?;
        }
        Some(current)
    }

    fn at_mut(&mut self, address: &[(String, String)]) -> Option<&mut Resource> {
        let mut current = self;
        for (t, n) in address {
            current = current.children.get_mut(t)?.get_mut(n)?;
        }
        Some(current)
    }
}

pub struct MemoryController {
    name: String,
    root: Resource,
}

impl Default for MemoryController {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryController {
    pub fn new() -> Self {
        Self::with_root(Resource::new())
    }

    pub fn with_root(root: Resource) -> Self {
        MemoryController {
            name: "memory".to_string(),
            root,
        }
    }

    /// Load a model file
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| CliError::Parse(format!("{}: {}", path.display(), e)))?;
        let mut controller = Self::with_root(Resource::from_model(&ModelValue::from_json(json)));
        controller.name = format!("memory:{}", path.display());
        Ok(controller)
    }

    pub fn root(&self) -> &Resource {
        &self.root
    }

    /// Run one request. `Err` carries the failure description.
    fn handle(&mut self, request: &ModelValue) -> Result<ModelValue, String> {
        let operation = request
            .get("operation")
            .map(|o| o.as_string())
            .ok_or_else(|| "request has no operation".to_string())?;
        let address = parse_address(request)?;
        let param = |name: &str| request.get(name).filter(|v| v.is_defined());
        let required = |name: &str| {
            param(name)
                .map(|v| v.as_string())
                .ok_or_else(|| format!("'{}' requires parameter '{}'", operation, name))
        };

        match operation.as_str() {
            "composite" => {
                let steps = request.get("steps").and_then(|s| s.as_list()).unwrap_or(&[]).to_vec();
                self.composite(&steps)
            }
            "add" => {
                let (last, parent) = address
                    .split_last()
                    .ok_or_else(|| "cannot add the root resource".to_string())?;
                let mut resource = Resource::new();
                if let ModelValue::Object(fields) = request {
                    for (k, v) in fields {
                        if !RESERVED.contains(&k.as_str()) {
                            resource.attributes.insert(k.clone(), v.clone());
                        }
                    }
                }
                let parent = self.root.at_mut(parent).ok_or_else(|| not_found(parent))?;
                let instances = parent.children.entry(last.0.clone()).or_default();
                if instances.contains_key(&last.1) {
                    return Err(format!("resource {} already exists", format_address(&address)));
                }
                instances.insert(last.1.clone(), resource);
                Ok(ModelValue::Undefined)
            }
            "remove" => {
                let (last, parent) = address
                    .split_last()
                    .ok_or_else(|| "cannot remove the root resource".to_string())?;
                self.root
                    .at_mut(parent)
                    .and_then(|p| p.children.get_mut(&last.0))
                    .and_then(|instances| instances.remove(&last.1))
                    .map(|_| ModelValue::Undefined)
                    .ok_or_else(|| not_found(&address))
            }
            "write-attribute" => {
                let name = required("name")?;
                let value = request.get("value").cloned().unwrap_or_default();
                let resource = self.root.at_mut(&address).ok_or_else(|| not_found(&address))?;
                resource.attributes.insert(name, value);
                Ok(ModelValue::Undefined)
            }
            "undefine-attribute" => {
                let name = required("name")?;
                let resource = self.root.at_mut(&address).ok_or_else(|| not_found(&address))?;
                resource.attributes.insert(name, ModelValue::Undefined);
                Ok(ModelValue::Undefined)
            }
            _ => {
                let resource = self.root.at(&address).ok_or_else(|| not_found(&address))?;
                match operation.as_str() {
                    "read-resource" => {
                        let recursive = param("recursive").and_then(|v| v.as_bool()).unwrap_or(false);
                        Ok(resource.to_model(recursive))
                    }
                    "read-attribute" => {
                        let name = required("name")?;
                        resource
                            .attributes
                            .get(&name)
                            .cloned()
                            .ok_or_else(|| format!("attribute '{}' not found at {}", name, format_address(&address)))
                    }
                    "read-children-names" => {
                        let child_type = required("child-type")?;
                        let instances = resource
                            .children
                            .get(&child_type)
                            .ok_or_else(|| format!("no child type '{}' at {}", child_type, format_address(&address)))?;
                        Ok(ModelValue::List(instances.keys().map(ModelValue::string).collect()))
                    }
                    "read-children-types" => Ok(ModelValue::List(
                        resource.children.keys().map(ModelValue::string).collect(),
                    )),
                    other => Err(format!("unknown operation '{}'", other)),
                }
            }
        }
    }

    /// All steps or none: the tree is restored if any step fails
    fn composite(&mut self, steps: &[ModelValue]) -> Result<ModelValue, String> {
        let snapshot = self.root.clone();
        let mut results = ModelValue::object();
        for (i, step) in steps.iter().enumerate() {
            match self.handle(step) {
                Ok(result) => results.set(format!("step-{}", i + 1), success(result)),
                Err(description) => {
                    self.root = snapshot;
                    return Err(format!("step-{} failed: {}", i + 1, description));
                }
            }
        }
        Ok(results)
    }
}

impl ModelController for MemoryController {
    fn execute(&mut self, request: &ModelValue) -> Result<ModelValue, CliError> {
        Ok(match self.handle(request) {
            Ok(result) => success(result),
            Err(description) => failure(description),
        })
    }

    fn endpoint(&self) -> String {
        self.name.clone()
    }
}

fn parse_address(request: &ModelValue) -> Result<Vec<(String, String)>, String> {
    let nodes = match request.get("address") {
        None | Some(ModelValue::Undefined) => return Ok(Vec::new()),
        Some(ModelValue::List(nodes)) => nodes,
        Some(other) => return Err(format!("invalid address {}", other)),
    };
    nodes
        .iter()
        .map(|node| match node {
            ModelValue::Object(map) if map.len() == 1 => map
                .iter()
                .next()
                .map(|(t, n)| (t.clone(), n.as_string()))
                .ok_or_else(|| "empty address node".to_string()),
            other => Err(format!("invalid address node {}", other)),
        })
        .collect()
}

fn format_address(address: &[(String, String)]) -> String {
    if address.is_empty() {
        return "/".to_string();
    }
    address.iter().map(|(t, n)| format!("/{}={}", t, n)).collect()
}

fn not_found(address: &[(String, String)]) -> String {
    format!("resource {} not found", format_address(address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_request;

    fn server() -> MemoryController {
        MemoryController::with_root(
            Resource::new()
                .with_attribute("name", ModelValue::string("server-one"))
                .with_child(
                    "deployment",
                    "app.war",
                    Resource::new().with_attribute("enabled", ModelValue::Bool(true)),
                )
                .with_child("deployment", "b.war", Resource::new()),
        )
    }

    fn run(controller: &mut MemoryController, line: &str) -> ModelValue {
        controller.execute(&parse_request(line).unwrap().to_model()).unwrap()
    }

    #[test]
    fn test_read_attribute() {
        let mut c = server();
        let r = run(&mut c, "/deployment=app.war:read-attribute(name=enabled)");
        assert_eq!(r.get("outcome"), Some(&ModelValue::string("success")));
        assert_eq!(r.get("result"), Some(&ModelValue::Bool(true)));

        let r = run(&mut c, "/deployment=nope.war:read-attribute(name=enabled)");
        assert_eq!(r.get("outcome"), Some(&ModelValue::string("failed")));
    }

    #[test]
    fn test_read_children_names() {
        let mut c = server();
        let r = run(&mut c, ":read-children-names(child-type=deployment)");
        assert_eq!(
            r.get("result"),
            Some(&ModelValue::List(vec![ModelValue::string("app.war"), ModelValue::string("b.war")]))
        );
        let r = run(&mut c, ":read-children-types");
        assert_eq!(r.get("result"), Some(&ModelValue::List(vec![ModelValue::string("deployment")])));
    }

    #[test]
    fn test_add_write_remove() {
        let mut c = server();
        let r = run(&mut c, "/deployment=c.war:add(enabled=false)");
        assert_eq!(r.get("outcome"), Some(&ModelValue::string("success")));
        let r = run(&mut c, "/deployment=c.war:add");
        assert_eq!(r.get("outcome"), Some(&ModelValue::string("failed")));

        run(&mut c, "/deployment=c.war:write-attribute(name=enabled,value=true)");
        let r = run(&mut c, "/deployment=c.war:read-attribute(name=enabled)");
        assert_eq!(r.get("result"), Some(&ModelValue::Bool(true)));

        run(&mut c, "/deployment=c.war:undefine-attribute(name=enabled)");
        let r = run(&mut c, "/deployment=c.war:read-attribute(name=enabled)");
        assert_eq!(r.get("result"), Some(&ModelValue::Undefined));

        run(&mut c, "/deployment=c.war:remove");
        let r = run(&mut c, "/deployment=c.war:remove");
        assert_eq!(r.get("outcome"), Some(&ModelValue::string("failed")));
    }

    #[test]
    fn test_read_resource() {
        let mut c = server();
        let r = run(&mut c, ":read-resource");
        let result = r.get("result").unwrap();
        assert_eq!(result.get("name"), Some(&ModelValue::string("server-one")));
        assert_eq!(
            result.get("deployment").and_then(|d| d.get("app.war")),
            Some(&ModelValue::Undefined)
        );

        let r = run(&mut c, ":read-resource(recursive=true)");
        let enabled = r
            .get("result")
            .and_then(|res| res.get("deployment"))
            .and_then(|d| d.get("app.war"))
            .and_then(|a| a.get("enabled"));
        assert_eq!(enabled, Some(&ModelValue::Bool(true)));
    }

    #[test]
    fn test_composite_rolls_back() {
        let mut c = server();
        let steps = vec![
            parse_request(":write-attribute(name=name,value=changed)").unwrap().to_model(),
            parse_request("/deployment=zzz:remove").unwrap().to_model(),
        ];
        let r = c.execute(&crate::session::composite(steps)).unwrap();
        assert_eq!(r.get("outcome"), Some(&ModelValue::string("failed")));
        assert_eq!(c.root().attributes.get("name"), Some(&ModelValue::string("server-one")));
    }

    #[test]
    fn test_unknown_operation() {
        let mut c = server();
        let r = run(&mut c, ":reload-servers");
        assert_eq!(
            r.get("failure-description"),
            Some(&ModelValue::string("unknown operation 'reload-servers'"))
        );
    }

    #[test]
    fn test_load_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"attributes": {"release": "1.0"}, "children": {"subsystem": {"logging": {"attributes": {"level": "INFO"}}}}}"#,
        )
        .unwrap();
        let mut c = MemoryController::load(&path).unwrap();
        let r = run(&mut c, "/subsystem=logging:read-attribute(name=level)");
        assert_eq!(r.get("result"), Some(&ModelValue::string("INFO")));
        assert!(c.endpoint().starts_with("memory:"));
    }
}
