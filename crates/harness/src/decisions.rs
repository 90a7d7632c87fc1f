use std::collections::VecDeque;

use slotbook_core::Reference;
use slotbook_engine::{DecisionCallback, EngineError, Scope, ScopeRequest};

/// Answers prompts from queues and records what was asked.
///
/// An empty scope queue answers `Cancel`, an empty confirmation queue
/// answers yes.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    scopes: VecDeque<Scope>,
    confirms: VecDeque<bool>,
    pub prompts: Vec<ScopeRequest>,
    pub confirmations: Vec<Vec<Reference>>,
    pub failures: Vec<String>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_scope(&mut self, scope: Scope) -> &mut Self {
        self.scopes.push_back(scope);
        self
    }

    pub fn answer_confirm(&mut self, confirm: bool) -> &mut Self {
        self.confirms.push_back(confirm);
        self
    }
}

impl DecisionCallback for ScriptedDecisions {
    fn choose_scope(&mut self, request: &ScopeRequest) -> Scope {
        self.prompts.push(request.clone());
        self.scopes.pop_front().unwrap_or(Scope::Cancel)
    }

    fn confirm_delete(&mut self, deletables: &[Reference]) -> bool {
        self.confirmations.push(deletables.to_vec());
        self.confirms.pop_front().unwrap_or(true)
    }

    fn show_failure(&mut self, error: &EngineError) {
        self.failures.push(error.to_string());
    }
}
