//! Management session: a controller connection plus the batch accumulator

use crate::controller::DisconnectedController;
use crate::error::CliError;
use crate::value::ModelValue;
use tracing::debug;

/// A management endpoint that turns request models into response models.
///
/// Implementations report protocol-level failures as responses with
/// `"outcome" => "failed"`; an `Err` means the request never got an answer.
pub trait ModelController {
    fn execute(&mut self, request: &ModelValue) -> Result<ModelValue, CliError>;

    /// Human-readable endpoint name, used in the prompt
    fn endpoint(&self) -> String;
}

/// Requests collected between `batch` and `run-batch`
#[derive(Debug, Clone, Default)]
pub struct Batch {
    lines: Vec<String>,
    steps: Vec<ModelValue>,
}

impl Batch {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub struct Session {
    controller: Box<dyn ModelController>,
    batch: Option<Batch>,
}

impl Session {
    pub fn new(controller: Box<dyn ModelController>) -> Self {
        Session { controller, batch: None }
    }

    pub fn disconnected() -> Self {
        Self::new(Box::new(DisconnectedController))
    }

    pub fn endpoint(&self) -> String {
        self.controller.endpoint()
    }

    pub fn set_controller(&mut self, controller: Box<dyn ModelController>) {
        self.controller = controller;
    }

    /// Send a request and return the raw response, failed outcome included
    pub fn execute(&mut self, request: &ModelValue) -> Result<ModelValue, CliError> {
        let operation = request.get("operation").map(|o| o.as_string()).unwrap_or_default();
        debug!(endpoint = %self.controller.endpoint(), %operation, "executing request");
        let response = self.controller.execute(request)?;
        debug!(%operation, outcome = %response.get("outcome").map(|o| o.as_string()).unwrap_or_default(), "response");
        Ok(response)
    }

    pub fn batch_active(&self) -> bool {
        self.batch.is_some()
    }

    pub fn start_batch(&mut self) -> Result<(), CliError> {
        if self.batch.is_some() {
            return Err(CliError::BatchAlreadyActive);
        }
        self.batch = Some(Batch::default());
        Ok(())
    }

    pub fn add_to_batch(&mut self, line: &str, request: ModelValue) -> Result<(), CliError> {
        let batch = self.batch.as_mut().ok_or(CliError::NoActiveBatch)?;
        batch.lines.push(line.to_string());
        batch.steps.push(request);
        Ok(())
    }

    /// Drop the active batch. Returns whether there was one.
    pub fn discard_active_batch(&mut self) -> bool {
        self.batch.take().is_some()
    }

    pub fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    pub fn batch_lines(&self) -> Vec<String> {
        self.batch.as_ref().map(|b| b.lines.clone()).unwrap_or_default()
    }

    /// Commit the batch as one composite request. The batch is gone
    /// afterwards whether or not the commit succeeded.
    pub fn run_batch(&mut self) -> Result<ModelValue, CliError> {
        let batch = self.batch.take().ok_or(CliError::NoActiveBatch)?;
        debug!(steps = batch.len(), "committing batch");
        let request = composite(batch.steps);
        let response = self.execute(&request)?;
        check_outcome(response)
    }
}

/// Build a composite request executing `steps` atomically
pub fn composite(steps: Vec<ModelValue>) -> ModelValue {
    ModelValue::object()
        .with("operation", ModelValue::string("composite"))
        .with("address", ModelValue::List(Vec::new()))
        .with("steps", ModelValue::List(steps))
}

pub fn is_success(response: &ModelValue) -> bool {
    response.get("outcome").map(|o| o.as_string()).as_deref() == Some("success")
}

/// Turn a failed outcome into `OperationFailed`
pub fn check_outcome(response: ModelValue) -> Result<ModelValue, CliError> {
    match response.get("outcome").map(|o| o.as_string()).as_deref() {
        Some("failed") => {
            let description = response
                .get("failure-description")
                .map(|d| d.as_string())
                .unwrap_or_else(|| "no failure description".to_string());
            Err(CliError::OperationFailed(description))
        }
        _ => Ok(response),
    }
}

/// A successful response carrying `result`
pub fn success(result: ModelValue) -> ModelValue {
    ModelValue::object()
        .with("outcome", ModelValue::string("success"))
        .with("result", result)
}

/// A failed response
pub fn failure(description: impl Into<String>) -> ModelValue {
    ModelValue::object()
        .with("outcome", ModelValue::string("failed"))
        .with("failure-description", ModelValue::string(description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::MemoryController;
    use crate::parser::parse_request;

    #[test]
    fn test_batch_lifecycle() {
        let mut session = Session::new(Box::new(MemoryController::new()));
        assert!(!session.batch_active());
        session.start_batch().unwrap();
        assert!(matches!(session.start_batch(), Err(CliError::BatchAlreadyActive)));

        let req = parse_request(":write-attribute(name=a,value=1)").unwrap();
        session.add_to_batch(":write-attribute(name=a,value=1)", req.to_model()).unwrap();
        assert_eq!(session.batch_lines(), vec![":write-attribute(name=a,value=1)"]);

        assert!(session.discard_active_batch());
        assert!(!session.discard_active_batch());
        assert!(matches!(session.run_batch(), Err(CliError::NoActiveBatch)));
    }

    #[test]
    fn test_run_batch_commits_composite() {
        let mut session = Session::new(Box::new(MemoryController::new()));
        session.start_batch().unwrap();
        for line in [":write-attribute(name=a,value=1)", ":write-attribute(name=b,value=2)"] {
            session.add_to_batch(line, parse_request(line).unwrap().to_model()).unwrap();
        }
        session.run_batch().unwrap();
        assert!(!session.batch_active());

        let read = parse_request(":read-attribute(name=b)").unwrap().to_model();
        let response = session.execute(&read).unwrap();
        assert_eq!(response.get("result"), Some(&ModelValue::Int(2)));
    }

    #[test]
    fn test_failed_batch_is_cleared() {
        let mut session = Session::new(Box::new(MemoryController::new()));
        session.start_batch().unwrap();
        let bad = parse_request("/missing=x:remove").unwrap().to_model();
        session.add_to_batch("/missing=x:remove", bad).unwrap();
        assert!(matches!(session.run_batch(), Err(CliError::OperationFailed(_))));
        assert!(!session.batch_active());
    }

    #[test]
    fn test_check_outcome() {
        assert!(check_outcome(success(ModelValue::Int(1))).is_ok());
        match check_outcome(failure("boom")) {
            Err(CliError::OperationFailed(d)) => assert_eq!(d, "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_disconnected() {
        let mut session = Session::disconnected();
        let req = parse_request(":read-resource").unwrap().to_model();
        assert!(matches!(session.execute(&req), Err(CliError::TransportFailure(_))));
    }
}
