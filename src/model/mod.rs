pub mod loader;
pub mod registry;
pub mod stack;
pub mod validation;

pub use loader::{load_series, LoadedSeries};
pub use registry::{RegistryError, StackRegistry};
pub use stack::{DecodeTicket, Stack, StackError, StackId, ViewHandle};
pub use validation::{Outcome, ValidationDecision, ValidationError, ValidationState, ValidationWorkflow};
