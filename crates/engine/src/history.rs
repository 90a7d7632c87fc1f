use std::collections::VecDeque;

use tracing::{debug, info};

use crate::command::{Command, CommandContext};
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoResult {
    Applied(String),
    Empty,
}

/// Linear undo/redo history of executed commands.
pub struct CommandHistory {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_depth: usize,
}

impl CommandHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
        }
    }

    /// Execute `command` and keep it for undo if it succeeded. Any redo
    /// history is discarded.
    pub fn store_and_execute(
        &mut self,
        mut command: Box<dyn Command>,
        ctx: &mut CommandContext<'_>,
    ) -> Result<(), EngineError> {
        let name = command.name();
        command.execute(ctx)?;
        info!(command = %name, "executed");
        self.push_undo(command);
        self.redo_stack.clear();
        Ok(())
    }

    /// Undo the most recent command. A failing command stays on the undo
    /// stack.
    pub fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<UndoResult, EngineError> {
        let Some(mut command) = self.undo_stack.pop_back() else {
            return Ok(UndoResult::Empty);
        };
        let name = command.name();
        if let Err(e) = command.undo(ctx) {
            debug!(command = %name, error = %e, "undo failed");
            self.undo_stack.push_back(command);
            return Err(e);
        }
        info!(command = %name, "undone");
        self.redo_stack.push_back(command);
        Ok(UndoResult::Applied(name))
    }

    /// Execute the most recently undone command again. A failing command
    /// stays on the redo stack.
    pub fn redo(&mut self, ctx: &mut CommandContext<'_>) -> Result<UndoResult, EngineError> {
        let Some(mut command) = self.redo_stack.pop_back() else {
            return Ok(UndoResult::Empty);
        };
        let name = command.name();
        if let Err(e) = command.execute(ctx) {
            debug!(command = %name, error = %e, "redo failed");
            self.redo_stack.push_back(command);
            return Err(e);
        }
        info!(command = %name, "redone");
        self.push_undo(command);
        Ok(UndoResult::Applied(name))
    }

    fn push_undo(&mut self, command: Box<dyn Command>) {
        self.undo_stack.push_back(command);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_name(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.name())
    }

    pub fn redo_name(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.name())
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::EventCheckPipeline;
    use crate::command::StampLedger;
    use crate::facade::Facade;
    use slotbook_cache::LocalCache;
    use slotbook_core::{Entity, Reference, User};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NullFacade {
        cache: LocalCache,
    }

    impl Facade for NullFacade {
        fn cache(&self) -> &LocalCache {
            &self.cache
        }

        fn edit(&mut self, reference: &Reference) -> Result<Entity, EngineError> {
            Ok(self.cache.resolve(reference.id(), Some(reference.kind()))?.clone())
        }

        fn dispatch(&mut self, _store: Vec<Entity>, _remove: Vec<Reference>) -> Result<(), EngineError> {
            Ok(())
        }

        fn check_last_changed(&self, _: &[Entity], _: &User, _: bool) -> Result<(), EngineError> {
            Ok(())
        }

        fn refresh(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    /// Appends to a shared log; fails while `fail` is set.
    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail: Rc<RefCell<bool>>,
    }

    impl Command for Recorder {
        fn execute(&mut self, _ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
            if *self.fail.borrow() {
                return Err(EngineError::DispatchRejected(self.label.into()));
            }
            self.log.borrow_mut().push(format!("do {}", self.label));
            Ok(())
        }

        fn undo(&mut self, _ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
            if *self.fail.borrow() {
                return Err(EngineError::DispatchRejected(self.label.into()));
            }
            self.log.borrow_mut().push(format!("undo {}", self.label));
            Ok(())
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    struct Fixture {
        facade: NullFacade,
        checks: EventCheckPipeline,
        user: User,
        stamps: StampLedger,
        log: Rc<RefCell<Vec<String>>>,
        fail: Rc<RefCell<bool>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                facade: NullFacade {
                    cache: LocalCache::default(),
                },
                checks: EventCheckPipeline::new(),
                user: User::new("tester"),
                stamps: StampLedger::new(),
                log: Rc::new(RefCell::new(Vec::new())),
                fail: Rc::new(RefCell::new(false)),
            }
        }

        fn command(&self, label: &'static str) -> Box<dyn Command> {
            Box::new(Recorder {
                label,
                log: self.log.clone(),
                fail: self.fail.clone(),
            })
        }
    }

    #[test]
    fn undo_redo_cycle() {
        let mut f = Fixture::new();
        let mut history = CommandHistory::new(10);
        let (a, b) = (f.command("a"), f.command("b"));
        let mut ctx = CommandContext::new(&mut f.facade, &f.checks, &f.user, &mut f.stamps);

        history.store_and_execute(a, &mut ctx).unwrap();
        history.store_and_execute(b, &mut ctx).unwrap();
        assert_eq!(history.undo_name().as_deref(), Some("b"));

        assert_eq!(history.undo(&mut ctx).unwrap(), UndoResult::Applied("b".into()));
        assert_eq!(history.redo_name().as_deref(), Some("b"));
        assert_eq!(history.redo(&mut ctx).unwrap(), UndoResult::Applied("b".into()));
        assert_eq!(history.redo(&mut ctx).unwrap(), UndoResult::Empty);

        assert_eq!(*f.log.borrow(), vec!["do a", "do b", "undo b", "do b"]);
    }

    #[test]
    fn failed_execute_is_not_recorded() {
        let mut f = Fixture::new();
        let mut history = CommandHistory::new(10);
        *f.fail.borrow_mut() = true;
        let a = f.command("a");
        let mut ctx = CommandContext::new(&mut f.facade, &f.checks, &f.user, &mut f.stamps);
        assert!(history.store_and_execute(a, &mut ctx).is_err());
        assert!(!history.can_undo());
        assert_eq!(history.undo(&mut ctx).unwrap(), UndoResult::Empty);
    }

    #[test]
    fn new_command_clears_redo() {
        let mut f = Fixture::new();
        let mut history = CommandHistory::new(10);
        let (a, b) = (f.command("a"), f.command("b"));
        let mut ctx = CommandContext::new(&mut f.facade, &f.checks, &f.user, &mut f.stamps);
        history.store_and_execute(a, &mut ctx).unwrap();
        history.undo(&mut ctx).unwrap();
        assert!(history.can_redo());
        history.store_and_execute(b, &mut ctx).unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn failed_undo_keeps_command() {
        let mut f = Fixture::new();
        let mut history = CommandHistory::new(10);
        let a = f.command("a");
        let fail = f.fail.clone();
        let mut ctx = CommandContext::new(&mut f.facade, &f.checks, &f.user, &mut f.stamps);
        history.store_and_execute(a, &mut ctx).unwrap();

        *fail.borrow_mut() = true;
        assert!(history.undo(&mut ctx).is_err());
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 0);

        *fail.borrow_mut() = false;
        assert!(history.undo(&mut ctx).is_ok());
        assert_eq!(history.redo_depth(), 1);
    }

    #[test]
    fn depth_limit_drops_oldest() {
        let mut f = Fixture::new();
        let mut history = CommandHistory::new(2);
        let commands = [f.command("a"), f.command("b"), f.command("c")];
        let mut ctx = CommandContext::new(&mut f.facade, &f.checks, &f.user, &mut f.stamps);
        for command in commands {
            history.store_and_execute(command, &mut ctx).unwrap();
        }
        assert_eq!(history.undo_depth(), 2);
        history.undo(&mut ctx).unwrap();
        history.undo(&mut ctx).unwrap();
        assert_eq!(history.undo(&mut ctx).unwrap(), UndoResult::Empty);
    }
}
