use chrono::NaiveDateTime;
use slotbook_core::time::{move_offset, to_date_time};
use slotbook_core::{AppointmentBlock, Entity, EntityId, Reference, Reservation, User};
use tracing::{debug, error, info};

use crate::checks::EventCheckPipeline;
use crate::clipboard::{Clipboard, ClipboardAppointment, CopyType};
use crate::command::{Command, CommandContext, StampLedger};
use crate::commands::delete::locate;
use crate::commands::exchange::includes_event;
use crate::commands::{
    AllocatableExchange, AppointmentPaste, AppointmentResize, BlockRange, DeleteBlocks, DeletePlan,
    ReservationPaste,
};
use crate::config::EngineConfig;
use crate::decision::{scope_options, DecisionCallback, EditAction, Scope, ScopeRequest};
use crate::error::EngineError;
use crate::facade::Facade;
use crate::history::{CommandHistory, UndoResult};

/// Entry point for every user-level edit.
///
/// Each operation asks for a scope where needed, builds a command and runs
/// it through the history. Aborted operations end quietly with `Ok`; every
/// other failure is shown through the decision callback and returned.
pub struct EditController<F: Facade, D: DecisionCallback> {
    facade: F,
    decisions: D,
    checks: EventCheckPipeline,
    history: CommandHistory,
    stamps: StampLedger,
    clipboard: Clipboard,
    user: User,
    marked_allocatables: Vec<EntityId>,
    config: EngineConfig,
}

impl<F: Facade, D: DecisionCallback> EditController<F, D> {
    pub fn new(facade: F, decisions: D, user: User, config: EngineConfig) -> Self {
        Self {
            facade,
            decisions,
            checks: EventCheckPipeline::new(),
            history: CommandHistory::new(config.undo_depth),
            stamps: StampLedger::new(),
            clipboard: Clipboard::default(),
            user,
            marked_allocatables: Vec::new(),
            config,
        }
    }

    pub fn facade(&self) -> &F {
        &self.facade
    }

    pub fn facade_mut(&mut self) -> &mut F {
        &mut self.facade
    }

    pub fn decisions(&self) -> &D {
        &self.decisions
    }

    pub fn decisions_mut(&mut self) -> &mut D {
        &mut self.decisions
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn checks_mut(&mut self) -> &mut EventCheckPipeline {
        &mut self.checks
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allocatables currently marked in the calendar. Used for the
    /// allocatable exchange on paste.
    pub fn set_marked_allocatables(&mut self, allocatables: Vec<EntityId>) {
        self.marked_allocatables = allocatables;
    }

    // ========================================================================
    // Delete
    // ========================================================================

    pub fn delete_reservation(&mut self, reservation: &EntityId) -> Result<(), EngineError> {
        let result = self.try_delete_reservation(reservation);
        self.finish(result)
    }

    fn try_delete_reservation(&mut self, reservation: &EntityId) -> Result<(), EngineError> {
        let reference = self.facade.cache().resolve_reservation(reservation)?.reference();
        if !self.decisions.confirm_delete(&[reference]) {
            return Err(EngineError::Aborted("delete declined".into()));
        }
        let plan = DeletePlan::for_reservations([reservation.clone()]);
        self.run(Box::new(DeleteBlocks::new(plan, "delete reservation")))
    }

    /// Delete a multi-selection of blocks after one confirmation.
    pub fn delete_blocks(&mut self, blocks: &[AppointmentBlock]) -> Result<(), EngineError> {
        let result = self.try_delete_blocks(blocks);
        self.finish(result)
    }

    fn try_delete_blocks(&mut self, blocks: &[AppointmentBlock]) -> Result<(), EngineError> {
        if blocks.is_empty() {
            return Ok(());
        }
        let mut deletables: Vec<Reference> = Vec::new();
        for block in blocks {
            let reference = Reference::appointment(block.appointment.clone());
            if !deletables.contains(&reference) {
                deletables.push(reference);
            }
        }
        if !self.decisions.confirm_delete(&deletables) {
            return Err(EngineError::Aborted("delete declined".into()));
        }
        let plan = DeletePlan::for_blocks(self.facade.cache(), blocks)?;
        self.run(Box::new(DeleteBlocks::new(plan, "delete appointments")))
    }

    pub fn delete_appointment(&mut self, block: &AppointmentBlock) -> Result<(), EngineError> {
        let result = self.try_delete_appointment(block);
        self.finish(result)
    }

    fn try_delete_appointment(&mut self, block: &AppointmentBlock) -> Result<(), EngineError> {
        let scope = self.ask_scope(block, EditAction::Delete, true)?;
        self.delete_with_scope(block, scope, false)
    }

    fn delete_with_scope(&mut self, block: &AppointmentBlock, scope: Scope, cut: bool) -> Result<(), EngineError> {
        let (reservation, appointment) = locate(self.facade.cache(), &block.appointment)?;
        let plan = DeletePlan::for_scope(reservation, appointment, block.start, scope)?;
        let verb = if cut { "cut" } else { "delete" };
        let name = match scope {
            Scope::Single => format!("{verb} single appointment {}", block.start.date()),
            Scope::Series => format!("{verb} serie"),
            Scope::Reservation => format!("{verb} reservation"),
            Scope::Cancel => format!("{verb} appointment"),
        };
        self.run(Box::new(DeleteBlocks::new(plan, name)))
    }

    // ========================================================================
    // Copy, cut and paste
    // ========================================================================

    pub fn copy_appointment(&mut self, block: &AppointmentBlock, context: Vec<EntityId>) -> Result<(), EngineError> {
        let result = self.copy_cut_appointment(block, context, false);
        self.finish(result)
    }

    pub fn cut_appointment(&mut self, block: &AppointmentBlock, context: Vec<EntityId>) -> Result<(), EngineError> {
        let result = self.copy_cut_appointment(block, context, true);
        self.finish(result)
    }

    fn copy_cut_appointment(
        &mut self,
        block: &AppointmentBlock,
        context: Vec<EntityId>,
        cut: bool,
    ) -> Result<(), EngineError> {
        let action = if cut { EditAction::Cut } else { EditAction::Copy };
        let scope = self.ask_scope(block, action, true)?;

        let (source, appointment) = locate(self.facade.cache(), &block.appointment)?;
        let restricted = source.restricted_allocatables(appointment.id());
        let count = source.appointments().len();

        let entry = match scope {
            Scope::Single => {
                let mut copy = appointment.with_new_id();
                copy.set_repeating(None);
                copy.move_to(to_date_time(block.start, appointment.start()));
                ClipboardAppointment {
                    appointment: copy,
                    reservation: source.clone(),
                    copy_type: if cut { CopyType::CutBlock } else { CopyType::CopyBlock },
                    restricted_allocatables: restricted,
                }
            }
            Scope::Reservation if count > 1 => {
                let index = source
                    .appointment_index(appointment.id())
                    .ok_or_else(|| EngineError::EntityNotFound(format!("appointment {}", appointment.id())))?;
                let clone = self
                    .facade
                    .clone_entity(&Entity::Reservation(source.clone()), &self.user)?
                    .into_reservation()
                    .ok_or_else(|| EngineError::IllegalState("reservation clone of another kind".into()))?;
                let cloned_appointment = clone
                    .appointments()
                    .get(index)
                    .cloned()
                    .ok_or_else(|| EngineError::IllegalState("clone lost an appointment".into()))?;
                ClipboardAppointment {
                    appointment: cloned_appointment,
                    reservation: clone,
                    copy_type: if cut { CopyType::CutReservation } else { CopyType::CopyReservation },
                    restricted_allocatables: restricted,
                }
            }
            _ => {
                let copy_type = match (cut, count) {
                    (true, 1) => CopyType::CutReservation,
                    (true, _) => CopyType::CutBlock,
                    (false, _) => CopyType::CopyBlock,
                };
                ClipboardAppointment {
                    appointment: appointment.with_new_id(),
                    reservation: source.clone(),
                    copy_type,
                    restricted_allocatables: restricted,
                }
            }
        };
        debug!(appointment = %block.appointment, copy_type = ?entry.copy_type, "appointment to clipboard");
        self.clipboard.set_appointment(entry, context);

        if cut {
            self.delete_with_scope(block, scope, true)?;
        }
        Ok(())
    }

    pub fn copy_reservations(&mut self, reservations: &[EntityId], context: Vec<EntityId>) -> Result<(), EngineError> {
        let result = self.clone_to_clipboard(reservations, context);
        self.finish(result)
    }

    /// Clone to the clipboard, then delete the originals as one "cut".
    pub fn cut_reservations(&mut self, reservations: &[EntityId], context: Vec<EntityId>) -> Result<(), EngineError> {
        let result = self.clone_to_clipboard(reservations, context).and_then(|()| {
            let plan = DeletePlan::for_reservations(reservations.iter().cloned());
            self.run(Box::new(DeleteBlocks::new(plan, "cut")))
        });
        self.finish(result)
    }

    fn clone_to_clipboard(&mut self, reservations: &[EntityId], context: Vec<EntityId>) -> Result<(), EngineError> {
        let mut clones = Vec::with_capacity(reservations.len());
        for id in reservations {
            let source = self.facade.cache().resolve_reservation(id)?.clone();
            let clone = self
                .facade
                .clone_entity(&Entity::Reservation(source), &self.user)?
                .into_reservation()
                .ok_or_else(|| EngineError::IllegalState("reservation clone of another kind".into()))?;
            clones.push(clone);
        }
        self.clipboard.set_reservations(clones, context);
        Ok(())
    }

    /// Paste the clipboard at `start`. An empty clipboard does nothing.
    pub fn paste_appointment(&mut self, start: NaiveDateTime, as_new: bool, keep_time: bool) -> Result<(), EngineError> {
        let result = self.try_paste(start, as_new, keep_time);
        self.finish(result)
    }

    fn try_paste(&mut self, start: NaiveDateTime, as_new: bool, keep_time: bool) -> Result<(), EngineError> {
        if !self.clipboard.reservations().is_empty() {
            info!(count = self.clipboard.reservations().len(), %start, "paste reservations");
            let reservations = self.clipboard.reservations().to_vec();
            return self.run(Box::new(ReservationPaste::new(reservations, start, keep_time)));
        }
        let Some(entry) = self.clipboard.appointment().cloned() else {
            return Ok(());
        };
        let whole = entry.copy_type.is_whole_reservation();
        let offset = move_offset(entry.appointment.start(), start, keep_time);
        info!(appointment = %entry.appointment.id(), reservation = %entry.reservation.id(), %start, "paste appointment");

        let (appointment, reservation) = match self.exchange_on_paste(&entry)? {
            Some(modified) => {
                let appointment = modified
                    .find_appointment(entry.appointment.id())
                    .or_else(|| modified.appointments().first())
                    .cloned()
                    .unwrap_or(entry.appointment);
                (appointment, modified)
            }
            None => (entry.appointment, entry.reservation),
        };
        let paste = AppointmentPaste::new(
            appointment,
            reservation,
            entry.restricted_allocatables,
            as_new,
            whole,
            offset,
        )?;
        self.run(Box::new(paste))
    }

    /// The clipboard reservation with the originally marked allocatable
    /// replaced by the marked one, when a whole reservation is pasted into
    /// a different allocatable's slot.
    fn exchange_on_paste(&self, entry: &ClipboardAppointment) -> Result<Option<Reservation>, EngineError> {
        if !entry.copy_type.is_whole_reservation() {
            return Ok(None);
        }
        let (marked, previous) = (&self.marked_allocatables, self.clipboard.context_allocatables());
        let ([new], [old]) = (marked.as_slice(), previous) else {
            return Ok(None);
        };
        if new == old || entry.reservation.has_allocated(new) {
            return Ok(None);
        }
        let anchor = entry
            .reservation
            .find_appointment(entry.appointment.id())
            .or_else(|| entry.reservation.appointments().first());
        let Some(anchor) = anchor else {
            return Ok(None);
        };
        info!(%old, %new, "exchange allocatable on paste");
        let block = AppointmentBlock::first_of(anchor);
        let mut exchange = AllocatableExchange::plan(&entry.reservation, &block, old, new, None, Scope::Reservation)?;
        let mut modified = entry.reservation.clone();
        exchange.apply(&mut modified);
        Ok(Some(modified))
    }

    // ========================================================================
    // Move, resize and exchange
    // ========================================================================

    /// Move a block to `new_start`. Nothing happens if it is already there.
    pub fn move_appointment(
        &mut self,
        block: &AppointmentBlock,
        new_start: NaiveDateTime,
        keep_time: bool,
    ) -> Result<(), EngineError> {
        if new_start == block.start {
            return Ok(());
        }
        info!(appointment = %block.appointment, from = %block.start, to = %new_start, "move appointment");
        self.resize_appointment(block, new_start, None, keep_time)
    }

    /// Move a block and, with `new_end`, change its length.
    pub fn resize_appointment(
        &mut self,
        block: &AppointmentBlock,
        new_start: NaiveDateTime,
        new_end: Option<NaiveDateTime>,
        keep_time: bool,
    ) -> Result<(), EngineError> {
        let result = self.try_resize(block, new_start, new_end, keep_time);
        self.finish(result)
    }

    fn try_resize(
        &mut self,
        block: &AppointmentBlock,
        new_start: NaiveDateTime,
        new_end: Option<NaiveDateTime>,
        keep_time: bool,
    ) -> Result<(), EngineError> {
        let scope = self.ask_scope(block, EditAction::Move, new_end.is_none())?;
        let (reservation, appointment) = locate(self.facade.cache(), &block.appointment)?;

        let old_end = new_end.map(|_| block.start + appointment.duration());
        let new_start = if keep_time && new_start != block.start {
            block.start + move_offset(block.start, new_start, true)
        } else {
            new_start
        };
        let command = AppointmentResize::new(
            reservation,
            appointment.id().clone(),
            scope,
            old_end.map_or(BlockRange::moved(block.start), |end| BlockRange::resized(block.start, end)),
            new_end.map_or(BlockRange::moved(new_start), |end| BlockRange::resized(new_start, end)),
            keep_time,
        );
        self.run(Box::new(command))
    }

    /// Replace `old` by `new` on the block, optionally moving it.
    pub fn exchange_allocatable(
        &mut self,
        block: &AppointmentBlock,
        old: &EntityId,
        new: &EntityId,
        new_start: Option<NaiveDateTime>,
    ) -> Result<(), EngineError> {
        let result = self.try_exchange(block, old, new, new_start);
        self.finish(result)
    }

    fn try_exchange(
        &mut self,
        block: &AppointmentBlock,
        old: &EntityId,
        new: &EntityId,
        new_start: Option<NaiveDateTime>,
    ) -> Result<(), EngineError> {
        self.facade.cache().resolve_allocatable(new)?;
        let (reservation, _) = locate(self.facade.cache(), &block.appointment)?;
        let include_event = includes_event(reservation, old);
        let scope = self.ask_scope(block, EditAction::Exchange, include_event)?;
        info!(%old, %new, ?scope, "exchange allocatable");
        let (reservation, _) = locate(self.facade.cache(), &block.appointment)?;
        let command = AllocatableExchange::plan(reservation, block, old, new, new_start, scope)?;
        self.run(Box::new(command))
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn undo(&mut self) -> Result<UndoResult, EngineError> {
        let mut ctx = CommandContext::new(&mut self.facade, &self.checks, &self.user, &mut self.stamps);
        let result = self.history.undo(&mut ctx);
        self.report(result)
    }

    pub fn redo(&mut self) -> Result<UndoResult, EngineError> {
        let mut ctx = CommandContext::new(&mut self.facade, &self.checks, &self.user, &mut self.stamps);
        let result = self.history.redo(&mut ctx);
        self.report(result)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn run(&mut self, command: Box<dyn Command>) -> Result<(), EngineError> {
        let mut ctx = CommandContext::new(&mut self.facade, &self.checks, &self.user, &mut self.stamps);
        self.history.store_and_execute(command, &mut ctx)
    }

    /// Ask which scope `action` applies to. No prompt happens with fewer
    /// than two options, but a delete still needs confirmation.
    fn ask_scope(
        &mut self,
        block: &AppointmentBlock,
        action: EditAction,
        include_event: bool,
    ) -> Result<Scope, EngineError> {
        let (reservation, appointment) = locate(self.facade.cache(), &block.appointment)?;
        let options = scope_options(reservation, appointment, block, include_event);
        let reservation = reservation.reference();
        debug!(action = action.as_str(), %reservation, ?options, "scope options");

        if options.len() > 1 {
            let request = ScopeRequest {
                action,
                options,
                block: block.clone(),
                reservation,
            };
            let scope = self.decisions.choose_scope(&request);
            if scope == Scope::Cancel {
                return Err(EngineError::Aborted(format!("{} cancelled", action.as_str())));
            }
            if !request.options.contains(&scope) {
                return Err(EngineError::InvalidScope(format!("{scope:?} was not offered")));
            }
            return Ok(scope);
        }
        if action == EditAction::Delete && !self.decisions.confirm_delete(&[reservation]) {
            return Err(EngineError::Aborted("delete declined".into()));
        }
        Ok(options.first().copied().unwrap_or(Scope::Reservation))
    }

    fn finish(&mut self, result: Result<(), EngineError>) -> Result<(), EngineError> {
        match result {
            Err(e) if e.is_aborted() => {
                debug!(reason = %e, "operation aborted");
                Ok(())
            }
            Err(e) => {
                self.show(&e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    fn report<T>(&mut self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        if let Err(e) = &result {
            self.show(e);
        }
        result
    }

    fn show(&mut self, e: &EngineError) {
        error!(error = %e, "edit failed");
        self.decisions.show_failure(e);
    }
}
