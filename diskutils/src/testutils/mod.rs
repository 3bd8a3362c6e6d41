use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
};

use crate::dependencies::{Command, CommandResult, Dependency, DependencyError, Executor};

/// Executor that records every command instead of running it and replies
/// with canned results.
///
/// Responses are queued per dependency and handed out in order. Once a queue
/// is exhausted, further calls succeed with empty output.
#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: RefCell<HashMap<Dependency, VecDeque<CommandResult>>>,
    missing: HashSet<Dependency>,
    calls: RefCell<Vec<Command>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a result for the next call to `dependency`.
    pub fn with_response(self, dependency: Dependency, result: CommandResult) -> Self {
        self.responses
            .borrow_mut()
            .entry(dependency)
            .or_default()
            .push_back(result);
        self
    }

    /// Shorthand for a successful call printing `stdout`.
    pub fn with_stdout(self, dependency: Dependency, stdout: &str) -> Self {
        self.with_response(dependency, CommandResult::new(0, stdout, ""))
    }

    /// Makes every call to `dependency` fail as if the binary was not in $PATH.
    pub fn with_missing(mut self, dependency: Dependency) -> Self {
        self.missing.insert(dependency);
        self
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.borrow().clone()
    }

    pub fn rendered_calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(Command::render_command)
            .collect()
    }
}

impl Executor for MockExecutor {
    fn execute(&self, command: &Command) -> Result<CommandResult, Box<DependencyError>> {
        self.calls.borrow_mut().push(command.clone());

        if self.missing.contains(&command.dependency()) {
            return Err(Box::new(DependencyError::NotFound {
                dependency: command.dependency(),
                source: which::Error::CannotFindBinaryPath,
            }));
        }

        Ok(self
            .responses
            .borrow_mut()
            .get_mut(&command.dependency())
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }
}
