//! Block openers: `if`, `try`, `for` and `record`

use super::{is_reserved, Shell};
use crate::condition::Condition;
use crate::control::{FOR, IF, RECORD, TRY};
use crate::error::CliError;
use crate::lexer::{rest_of_line, split_on_word, CommandLine};
use crate::macros::is_valid_macro_name;
use crate::parser::{is_operation, parse_literal, parse_request};
use crate::redirection::{ForBlock, IfElseBlock, Recorder, Redirection, Target, TryBlock};
use crate::session::check_outcome;
use crate::value::{ModelValue, ValuePath};
use crate::variables::is_valid_name;
use tracing::debug;

impl Shell {
    /// Register the block opened by `line`. Nothing runs until the block
    /// is terminated.
    pub(crate) fn open_block(&mut self, keyword: &str, line: &str) -> Result<(), CliError> {
        if self.session.batch_active() {
            return Err(CliError::InvalidNesting(format!(
                "'{}' cannot be used while a batch is active",
                keyword
            )));
        }
        if let Some(active) = &self.redirection {
            return Err(CliError::RedirectionAlreadyActive(active.kind().to_string()));
        }

        let args = rest_of_line(line);
        let redirection = match keyword {
            IF => Redirection::IfElse(self.open_if(args)?),
            TRY => {
                if !args.is_empty() {
                    return Err(CliError::Parse(format!("'try' takes no arguments, got '{}'", args)));
                }
                Redirection::TryCatchFinally(TryBlock::new())
            }
            FOR => Redirection::ForLoop(self.open_for(args)?),
            RECORD => Redirection::Recorder(self.open_record(line)?),
            other => return Err(CliError::UnknownCommand(other.to_string())),
        };

        debug!(block = keyword, "block opened");
        self.control.clear();
        self.redirection = Some(redirection);
        Ok(())
    }

    /// `if <condition> [of <request> | of $var]`
    fn open_if(&mut self, args: &str) -> Result<IfElseBlock, CliError> {
        if args.is_empty() {
            return Err(CliError::Parse("usage: if <condition> of <request>".into()));
        }
        let (condition_text, target) = match split_on_word(args, "of") {
            Some((condition_text, target_text)) => (condition_text, parse_target(target_text)?),
            None => (args, Target::None),
        };

        let condition = Condition::parse(condition_text)?;
        if target == Target::None && condition.uses_target() {
            return Err(CliError::Parse(format!(
                "condition '{}' reads a response; add 'of <request>'",
                condition_text
            )));
        }
        Ok(IfElseBlock::new(condition, target))
    }

    /// `for <var> in <request | $var | literal list>`
    ///
    /// The source is evaluated now; the variable is bound to a placeholder
    /// until the loop has run.
    fn open_for(&mut self, args: &str) -> Result<ForBlock, CliError> {
        let (var_name, source) = split_on_word(args, "in")
            .ok_or_else(|| CliError::Parse("usage: for <variable> in <request>".into()))?;
        if !is_valid_name(var_name) {
            return Err(CliError::Parse(format!("invalid variable name '{}'", var_name)));
        }
        if self.vars.contains(var_name) {
            return Err(CliError::VariableAlreadyBound(var_name.to_string()));
        }

        let value = if is_operation(source) {
            let request = parse_request(&self.vars.substitute(source)?)?;
            let response = check_outcome(self.session.execute(&request.to_model())?)?;
            response.get("result").cloned().unwrap_or_default()
        } else if let Some(reference) = source.strip_prefix('$') {
            self.vars.resolve(&ValuePath::parse(reference)?)?
        } else {
            parse_literal(source)
        };

        let items = match value {
            ModelValue::List(items) => items,
            other => {
                return Err(CliError::NotIterable(format!("'{}' resolved to {}", source, other)));
            }
        };

        self.vars.bind(var_name, ModelValue::Undefined)?;
        Ok(ForBlock::new(var_name, items))
    }

    /// `record [name] [--export file] [--discard]`
    fn open_record(&mut self, line: &str) -> Result<Recorder, CliError> {
        let cmd = CommandLine::parse(line)?;
        let recorder = Recorder::from_command(&cmd);
        if let Some(name) = &recorder.name {
            self.check_macro_name(name)?;
        }
        Ok(recorder)
    }

    pub(crate) fn check_macro_name(&self, name: &str) -> Result<(), CliError> {
        if !is_valid_macro_name(name) || is_reserved(name) {
            return Err(CliError::InvalidMacroName(name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn register_macro(&mut self, name: &str, lines: Vec<String>) -> Result<(), CliError> {
        self.check_macro_name(name)?;
        if let Some(path) = self.macros.register(name, lines)? {
            debug!(macro_name = name, path = %path.display(), "macro persisted");
        }
        Ok(())
    }
}

fn parse_target(text: &str) -> Result<Target, CliError> {
    if let Some(reference) = text.strip_prefix('$') {
        return Ok(Target::Variable(ValuePath::parse(reference)?));
    }
    if !is_operation(text) {
        return Err(CliError::Parse(format!("expected an operation request after 'of', got '{}'", text)));
    }
    // requests with variables are only checked when substituted at run time
    if !text.contains('$') {
        parse_request(text)?;
    }
    Ok(Target::Request(text.to_string()))
}
