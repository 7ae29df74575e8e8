use std::fmt;

use chrono::{DateTime, Utc};

use super::stack::{Stack, StackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Confirmed,
    Rejected,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl From<Outcome> for ValidationState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Confirmed => Self::Confirmed,
            Outcome::Rejected => Self::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDecision {
    pub target: String,
    pub stack: StackId,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no stack is active; select a stack before validating")]
    NoActiveStack,
}

#[derive(Debug, Default)]
pub struct ValidationWorkflow {
    subject: Option<StackId>,
    state: ValidationState,
}

impl ValidationWorkflow {
    pub fn state(&self) -> ValidationState {
        self.state
    }

    pub fn state_for(&self, stack: StackId) -> ValidationState {
        if self.subject == Some(stack) {
            self.state
        } else {
            ValidationState::Pending
        }
    }

    pub fn reset(&mut self, active: Option<&Stack>) {
        self.subject = active.map(Stack::id);
        self.state = ValidationState::Pending;
    }

    pub fn submit(
        &mut self,
        outcome: Outcome,
        active: Option<&Stack>,
    ) -> Result<ValidationDecision, ValidationError> {
        let stack = active.ok_or(ValidationError::NoActiveStack)?;
        if self.subject != Some(stack.id()) {
            self.reset(Some(stack));
        }
        self.state = outcome.into();
        log::info!("stack `{}` marked {outcome}", stack.name());

        Ok(ValidationDecision {
            target: stack.name().to_string(),
            stack: stack.id(),
            outcome,
            timestamp: Utc::now(),
        })
    }
}
