use std::collections::BTreeMap;

use crate::image_pipeline::DecodedSlice;

use super::stack::{DecodeTicket, Stack, StackId, ViewHandle};
use super::validation::ValidationDecision;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a stack named `{0}` is already loaded")]
    DuplicateName(String),

    #[error("stack {0} is not loaded")]
    UnknownStack(StackId),

    #[error("decision for `{target}` refers to a stack that is no longer loaded")]
    StaleDecision { target: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Default)]
pub struct StackRegistry {
    stacks: Vec<Stack>,
    active: Option<StackId>,
    decisions: BTreeMap<String, ValidationDecision>,
    next_id: u64,
}

impl StackRegistry {
    pub fn create(&mut self, name: impl Into<String>, view: ViewHandle) -> Result<StackId> {
        let name = name.into();
        if self.by_name(&name).is_some() {
            return Err(RegistryError::DuplicateName(name));
        }

        self.next_id += 1;
        let id = StackId(self.next_id);
        log::info!("creating stack `{name}` ({id})");
        self.stacks.push(Stack::new(id, name, view));
        Ok(id)
    }

    pub fn supersede(&mut self, name: impl Into<String>, view: ViewHandle) -> Result<StackId> {
        let name = name.into();
        if let Some(previous) = self.by_name(&name).map(Stack::id) {
            log::info!("stack `{name}` superseded by a new load");
            self.remove(previous)?;
        }
        self.create(name, view)
    }

    pub fn remove(&mut self, id: StackId) -> Result<Stack> {
        let position = self
            .stacks
            .iter()
            .position(|stack| stack.id() == id)
            .ok_or(RegistryError::UnknownStack(id))?;
        let stack = self.stacks.remove(position);

        if self.active == Some(id) {
            self.active = None;
        }
        self.decisions.remove(stack.name());
        Ok(stack)
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn get(&self, id: StackId) -> Option<&Stack> {
        self.stacks.iter().find(|stack| stack.id() == id)
    }

    pub fn get_mut(&mut self, id: StackId) -> Option<&mut Stack> {
        self.stacks.iter_mut().find(|stack| stack.id() == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|stack| stack.name() == name)
    }

    pub fn activate(&mut self, id: StackId) -> Result<()> {
        if self.get(id).is_none() {
            return Err(RegistryError::UnknownStack(id));
        }
        self.active = Some(id);
        Ok(())
    }

    pub fn active_id(&self) -> Option<StackId> {
        self.active
    }

    pub fn active(&self) -> Option<&Stack> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Stack> {
        let id = self.active?;
        self.get_mut(id)
    }

    pub fn record(&mut self, decision: ValidationDecision) -> Result<()> {
        let live = self
            .get(decision.stack)
            .is_some_and(|stack| stack.name() == decision.target);
        if !live {
            return Err(RegistryError::StaleDecision {
                target: decision.target,
            });
        }
        self.decisions.insert(decision.target.clone(), decision);
        Ok(())
    }

    pub fn decision(&self, name: &str) -> Option<&ValidationDecision> {
        self.decisions.get(name)
    }

    pub fn decisions(&self) -> impl Iterator<Item = &ValidationDecision> {
        self.decisions.values()
    }

    pub fn apply_decoded(&mut self, ticket: DecodeTicket, decoded: DecodedSlice) -> bool {
        match self.get_mut(ticket.stack) {
            Some(stack) => {
                let applied = stack.apply_decoded(ticket, decoded);
                if !applied {
                    log::warn!(
                        "discarding decode of `{}` slice {}: slice was reloaded",
                        stack.name(),
                        ticket.index
                    );
                }
                applied
            }
            None => {
                log::warn!(
                    "discarding decode for stack {}: stack is gone",
                    ticket.stack
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::confirm_reject::available_actions;
    use crate::image_pipeline::fixtures::png_rgb;
    use crate::image_pipeline::{decode_slice, ImagePipeline};
    use crate::model::validation::{Outcome, ValidationError, ValidationWorkflow};

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = StackRegistry::default();
        registry.create("series-1", ViewHandle(1)).unwrap();

        assert_eq!(
            registry.create("series-1", ViewHandle(2)),
            Err(RegistryError::DuplicateName("series-1".to_string()))
        );
        assert_eq!(registry.stacks().len(), 1);
    }

    #[test]
    fn removed_names_can_be_reused_with_new_identity() {
        let mut registry = StackRegistry::default();
        let first = registry.create("series-1", ViewHandle(1)).unwrap();
        registry.remove(first).unwrap();

        let second = registry.create("series-1", ViewHandle(1)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn series_scenario_decodes_first_slice() {
        let mut registry = StackRegistry::default();
        let id = registry.create("series-1", ViewHandle(1)).unwrap();
        let stack = registry.get_mut(id).unwrap();
        stack.append_raw(png_rgb(7, 3)).unwrap();

        let pixels = stack.ensure_pixels(0, &ImagePipeline).unwrap();

        assert_eq!((pixels.width(), pixels.height()), (7, 3));
        assert!(stack.cached_blob(0).is_some());
    }

    #[test]
    fn last_submission_wins() {
        let mut registry = StackRegistry::default();
        let id = registry.create("series-1", ViewHandle(1)).unwrap();
        registry.activate(id).unwrap();
        let mut workflow = ValidationWorkflow::default();

        let confirmed = workflow
            .submit(Outcome::Confirmed, registry.active())
            .unwrap();
        registry.record(confirmed).unwrap();
        let rejected = workflow
            .submit(Outcome::Rejected, registry.active())
            .unwrap();
        registry.record(rejected).unwrap();

        let recorded: Vec<_> = registry.decisions().collect();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].outcome, Outcome::Rejected);
    }

    #[test]
    fn nothing_active_records_nothing() {
        let mut registry = StackRegistry::default();
        registry.create("series-1", ViewHandle(1)).unwrap();
        let mut workflow = ValidationWorkflow::default();

        let result = workflow.submit(Outcome::Confirmed, registry.active());

        assert_eq!(result, Err(ValidationError::NoActiveStack));
        assert_eq!(registry.decisions().count(), 0);
    }

    #[test]
    fn hidden_buttons_do_not_block_programmatic_submit() {
        let mut registry = StackRegistry::default();
        let id = registry.create("series-1", ViewHandle(1)).unwrap();
        registry.activate(id).unwrap();
        let mut workflow = ValidationWorkflow::default();

        assert!(available_actions(false).is_empty());

        let decision = workflow
            .submit(Outcome::Confirmed, registry.active())
            .unwrap();
        registry.record(decision).unwrap();
        assert_eq!(
            registry.decision("series-1").map(|decision| decision.outcome),
            Some(Outcome::Confirmed)
        );
    }

    #[test]
    fn decision_for_superseded_stack_is_stale() {
        let mut registry = StackRegistry::default();
        let id = registry.create("series-1", ViewHandle(1)).unwrap();
        registry.activate(id).unwrap();
        let mut workflow = ValidationWorkflow::default();
        let decision = workflow
            .submit(Outcome::Confirmed, registry.active())
            .unwrap();

        registry.supersede("series-1", ViewHandle(2)).unwrap();

        assert!(matches!(
            registry.record(decision),
            Err(RegistryError::StaleDecision { .. })
        ));
        assert!(registry.decision("series-1").is_none());
        assert!(registry.active().is_none());
    }

    #[test]
    fn decode_for_removed_stack_is_discarded() {
        let mut registry = StackRegistry::default();
        let id = registry.create("series-1", ViewHandle(1)).unwrap();
        registry
            .get_mut(id)
            .unwrap()
            .append_raw(png_rgb(2, 2))
            .unwrap();
        let (ticket, raw) = registry.get(id).unwrap().decode_ticket(0).unwrap();
        let decoded = decode_slice(&ImagePipeline, &raw).unwrap();

        let replacement = registry.supersede("series-1", ViewHandle(1)).unwrap();
        registry
            .get_mut(replacement)
            .unwrap()
            .append_raw(png_rgb(2, 2))
            .unwrap();

        assert!(!registry.apply_decoded(ticket, decoded));
        assert!(registry.get(replacement).unwrap().cached_blob(0).is_none());
    }

    #[test]
    fn removing_active_stack_clears_active() {
        let mut registry = StackRegistry::default();
        let id = registry.create("series-1", ViewHandle(1)).unwrap();
        registry.activate(id).unwrap();

        registry.remove(id).unwrap();

        assert!(registry.active_id().is_none());
        assert_eq!(
            registry.activate(id),
            Err(RegistryError::UnknownStack(id))
        );
    }
}
