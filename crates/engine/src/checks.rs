use slotbook_cache::LocalCache;
use slotbook_core::{Reservation, User};

/// What a validator gets to look at besides the reservations.
pub struct CheckContext<'a> {
    pub user: &'a User,
    pub cache: &'a LocalCache,
}

/// A pluggable validator run before the first dispatch of an edit.
/// Returning false vetoes the edit.
pub trait EventCheck {
    fn check(&self, reservations: &[Reservation], context: &CheckContext<'_>) -> bool;
}

impl<F> EventCheck for F
where
    F: Fn(&[Reservation], &CheckContext<'_>) -> bool,
{
    fn check(&self, reservations: &[Reservation], context: &CheckContext<'_>) -> bool {
        self(reservations, context)
    }
}

/// Ordered chain of validators. Stops at the first veto.
#[derive(Default)]
pub struct EventCheckPipeline {
    checks: Vec<Box<dyn EventCheck>>,
}

impl EventCheckPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, check: impl EventCheck + 'static) {
        self.checks.push(Box::new(check));
    }

    pub fn push_fn<F>(&mut self, check: F)
    where
        F: Fn(&[Reservation], &CheckContext<'_>) -> bool + 'static,
    {
        self.checks.push(Box::new(check));
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn run(&self, reservations: &[Reservation], context: &CheckContext<'_>) -> bool {
        self.checks.iter().all(|c| c.check(reservations, context))
    }
}
