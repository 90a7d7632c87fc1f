use chrono::NaiveTime;
use slotbook_core::{Appointment, Reference, Repeating, RepeatingType};
use slotbook_engine::{EngineError, Scope, UndoResult};
use slotbook_harness::{at, TestSession};

fn hour_on(day: i64, hour: i64) -> Appointment {
    Appointment::new(at(day, hour), at(day, hour + 1))
}

fn weekly(count: u32) -> Appointment {
    let mut app = hour_on(1, 9);
    app.set_repeating(Some(Repeating::with_number(RepeatingType::Weekly, count)));
    app
}

// ============================================================================
// Move
// ============================================================================

#[test]
fn single_occurrence_keep_time_preserves_time_of_day() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let series = weekly(4);
    let series_id = series.id().clone();
    let id = session.add_reservation("Course", vec![series], &[])?;
    let before = session.digest()?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.block_on(&id, 0, 8)?;
    session.controller.move_appointment(&block, at(10, 15), true)?;

    let prompt = &session.decisions().prompts[0];
    assert_eq!(prompt.options, vec![Scope::Reservation, Scope::Single]);

    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.appointments().len(), 2);
    let copy = reservation
        .appointments()
        .iter()
        .find(|a| *a.id() != series_id)
        .ok_or("no detached copy")?;
    assert!(!copy.is_repeating());
    assert_eq!(copy.start(), at(10, 9));
    assert_eq!(copy.start().time(), NaiveTime::from_hms_opt(9, 0, 0).ok_or("bad time")?);
    assert_eq!(copy.end(), at(10, 10));
    let series = reservation.find_appointment(&series_id).ok_or("series lost")?;
    assert!(series.repeating().ok_or("not repeating")?.is_exception(at(8, 0).date()));
    assert_eq!(series.start(), at(1, 9));

    assert_eq!(session.controller.undo()?, UndoResult::Applied("move".into()));
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn moving_whole_reservation_shifts_every_appointment() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Pair", vec![hour_on(1, 9), hour_on(3, 11)], &[])?;
    let before = session.digest()?;

    session.decisions_mut().answer_scope(Scope::Reservation);
    let block = session.first_block(&id, 0)?;
    session.controller.move_appointment(&block, at(2, 10), false)?;

    let starts: Vec<_> = session
        .reservation(&id)?
        .appointments()
        .iter()
        .map(Appointment::start)
        .collect();
    assert_eq!(starts, vec![at(2, 10), at(4, 12)]);

    session.controller.undo()?;
    assert_eq!(session.digest()?, before);
    session.controller.redo()?;
    let first = session.reservation(&id)?.appointments()[0].start();
    assert_eq!(first, at(2, 10));
    Ok(())
}

#[test]
fn moving_series_moves_the_one_appointment() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Course", vec![weekly(3), hour_on(20, 9)], &[])?;

    session.decisions_mut().answer_scope(Scope::Series);
    let block = session.block_on(&id, 0, 8)?;
    session.controller.move_appointment(&block, at(9, 9), false)?;

    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.appointments()[0].start(), at(2, 9));
    assert!(reservation.appointments()[0].is_repeating());
    assert_eq!(reservation.appointments()[1].start(), at(20, 9));
    Ok(())
}

#[test]
fn move_to_same_start_is_noop() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Lunch", vec![hour_on(1, 12)], &[])?;
    let block = session.first_block(&id, 0)?;
    session.controller.move_appointment(&block, block.start, false)?;
    assert!(session.facade().dispatches().is_empty());
    assert!(!session.controller.history().can_undo());
    Ok(())
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_sets_new_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Workshop", vec![hour_on(1, 9)], &[])?;
    let before = session.digest()?;

    let block = session.first_block(&id, 0)?;
    session
        .controller
        .resize_appointment(&block, at(1, 10), Some(at(1, 13)), false)?;

    assert!(session.decisions().prompts.is_empty());
    let app = session.reservation(&id)?.appointments()[0].clone();
    assert_eq!((app.start(), app.end()), (at(1, 10), at(1, 13)));

    session.controller.undo()?;
    let app = session.reservation(&id)?.appointments()[0].clone();
    assert_eq!((app.start(), app.end()), (at(1, 9), at(1, 10)));
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn resizing_single_occurrence_detaches_it() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Course", vec![weekly(4)], &[])?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.block_on(&id, 0, 15)?;
    session
        .controller
        .resize_appointment(&block, at(15, 8), Some(at(15, 12)), false)?;

    let reservation = session.reservation(&id)?;
    let copy = reservation.appointments().last().ok_or("no copy")?;
    assert_eq!((copy.start(), copy.end()), (at(15, 8), at(15, 12)));
    Ok(())
}

// ============================================================================
// Concurrency and failures
// ============================================================================

#[test]
fn stale_version_refreshes_and_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Lunch", vec![hour_on(1, 12)], &[])?;
    session
        .facade_mut()
        .touch_on_next_edit(Reference::reservation(id.clone()));

    let block = session.first_block(&id, 0)?;
    let result = session.controller.move_appointment(&block, at(2, 12), false);

    assert!(matches!(result, Err(EngineError::VersionConflict { .. })));
    assert_eq!(session.facade().refresh_count(), 1);
    assert_eq!(session.decisions().failures.len(), 1);
    assert!(session.facade().dispatches().is_empty());
    assert!(!session.controller.history().can_undo());
    assert_eq!(session.reservation(&id)?.appointments()[0].start(), at(1, 12));
    Ok(())
}

#[test]
fn vetoed_move_is_swallowed() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Lunch", vec![hour_on(1, 12)], &[])?;
    session
        .controller
        .checks_mut()
        .push_fn(|reservations, _| reservations.iter().all(|r| r.name() != "Lunch"));

    let block = session.first_block(&id, 0)?;
    session.controller.move_appointment(&block, at(2, 12), false)?;

    assert!(session.decisions().failures.is_empty());
    assert!(session.facade().dispatches().is_empty());
    assert!(!session.controller.history().can_undo());
    Ok(())
}

#[test]
fn rejected_dispatch_is_shown() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Lunch", vec![hour_on(1, 12)], &[])?;
    session.facade_mut().reject_next("server unavailable");

    let block = session.first_block(&id, 0)?;
    let result = session.controller.move_appointment(&block, at(2, 12), false);

    assert!(matches!(result, Err(EngineError::DispatchRejected(_))));
    assert_eq!(session.decisions().failures.len(), 1);
    assert!(session.decisions().failures[0].contains("server unavailable"));
    assert!(!session.controller.history().can_undo());
    Ok(())
}
