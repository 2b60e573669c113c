//! Common test utilities for mgsh integration tests

#![allow(dead_code)]

pub use mgsh::{CliError, MemoryController, ModelController, ModelValue, Resource, Shell};
use std::cell::RefCell;
use std::rc::Rc;

/// A small server model: two deployments and a logging subsystem
pub fn sample_model() -> Resource {
    Resource::new()
        .with_attribute("name", ModelValue::string("server-one"))
        .with_attribute("port", ModelValue::Int(9990))
        .with_child(
            "deployment",
            "app.war",
            Resource::new()
                .with_attribute("enabled", ModelValue::Bool(true))
                .with_attribute("runtime-name", ModelValue::string("app.war")),
        )
        .with_child(
            "deployment",
            "legacy.war",
            Resource::new()
                .with_attribute("enabled", ModelValue::Bool(false))
                .with_attribute("runtime-name", ModelValue::string("legacy.war")),
        )
        .with_child(
            "subsystem",
            "logging",
            Resource::new().with_child(
                "logger",
                "app",
                Resource::new().with_attribute("level", ModelValue::string("INFO")),
            ),
        )
}

/// Shell over the sample model
pub fn shell() -> Shell {
    Shell::new(Box::new(MemoryController::with_root(sample_model())))
}

/// Dispatch every line of `script`, stopping at the first failure
pub fn run_on(shell: &mut Shell, script: &str) -> Result<Vec<String>, CliError> {
    for line in script.lines() {
        shell.dispatch(line)?;
    }
    Ok(shell.take_output())
}

/// Run `script` on a fresh shell over the sample model
pub fn run(script: &str) -> Result<Vec<String>, CliError> {
    run_on(&mut shell(), script)
}

/// Controller that forwards to a memory model and logs every operation
/// name it receives, so tests can see what reached the endpoint and when
pub struct LoggingController {
    inner: MemoryController,
    log: Rc<RefCell<Vec<String>>>,
}

impl LoggingController {
    pub fn new(log: Rc<RefCell<Vec<String>>>) -> Self {
        LoggingController {
            inner: MemoryController::with_root(sample_model()),
            log,
        }
    }
}

impl ModelController for LoggingController {
    fn execute(&mut self, request: &ModelValue) -> Result<ModelValue, CliError> {
        let operation = request.get("operation").map(|o| o.as_string()).unwrap_or_default();
        self.log.borrow_mut().push(operation);
        self.inner.execute(request)
    }

    fn endpoint(&self) -> String {
        "logging".to_string()
    }
}

/// Shell plus the log of operations its controller received
pub fn logging_shell() -> (Shell, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let shell = Shell::new(Box::new(LoggingController::new(Rc::clone(&log))));
    (shell, log)
}
