use slotbook_core::{Appointment, EntityId, Reservation};
use slotbook_engine::{CopyType, Facade, Scope};
use slotbook_harness::{at, TestSession};

fn hour_on(day: i64, hour: i64) -> Appointment {
    Appointment::new(at(day, hour), at(day, hour + 1))
}

fn reservations_named(session: &TestSession, name: &str) -> Vec<Reservation> {
    session
        .facade()
        .cache()
        .reservations()
        .filter(|r| r.name() == name)
        .cloned()
        .collect()
}

fn others(session: &TestSession, except: &EntityId) -> Vec<Reservation> {
    session
        .facade()
        .cache()
        .reservations()
        .filter(|r| r.id() != except)
        .cloned()
        .collect()
}

// ============================================================================
// Single appointments
// ============================================================================

#[test]
fn paste_block_into_reservation_adds_one_offset_appointment() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Pair", vec![hour_on(1, 9), hour_on(2, 9)], &[])?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.first_block(&id, 0)?;
    session.controller.copy_appointment(&block, Vec::new())?;
    let entry = session.controller.clipboard().appointment().ok_or("clipboard empty")?;
    assert_eq!(entry.copy_type, CopyType::CopyBlock);
    let before = session.digest()?;

    session.controller.paste_appointment(at(5, 14), false, false)?;

    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.appointments().len(), 3);
    let pasted = &reservation.appointments()[2];
    assert_eq!((pasted.start(), pasted.end()), (at(5, 14), at(5, 15)));
    assert_eq!(session.controller.history().undo_name().as_deref(), Some("paste"));

    session.controller.undo()?;
    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.appointments().len(), 2);
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn paste_block_as_new_reservation() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let room = session.add_room("Studio")?;
    let id = session.add_reservation("Recording", vec![hour_on(1, 9), hour_on(2, 9)], &[room.clone()])?;
    let before = session.digest()?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.first_block(&id, 1)?;
    session.controller.copy_appointment(&block, Vec::new())?;
    session.controller.paste_appointment(at(9, 16), true, false)?;

    let created = others(&session, &id);
    assert_eq!(created.len(), 1);
    let created = &created[0];
    assert_eq!(created.name(), "Recording");
    assert_eq!(created.owner(), Some(&session.user.id));
    assert_eq!(created.appointments().len(), 1);
    assert_eq!(created.appointments()[0].start(), at(9, 16));
    assert!(created.has_allocated(&room));
    assert_eq!(session.reservation(&id)?.appointments().len(), 2);

    session.controller.undo()?;
    assert!(others(&session, &id).is_empty());
    assert_eq!(session.digest()?, before);

    session.controller.redo()?;
    assert_eq!(others(&session, &id).len(), 1);
    Ok(())
}

#[test]
fn keep_time_paste_only_moves_the_date() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Pair", vec![hour_on(1, 9), hour_on(2, 9)], &[])?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.first_block(&id, 0)?;
    session.controller.copy_appointment(&block, Vec::new())?;
    session.controller.paste_appointment(at(4, 17), false, true)?;

    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.appointments()[2].start(), at(4, 9));
    Ok(())
}

#[test]
fn whole_reservation_paste_into_existing_is_shown() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Pair", vec![hour_on(1, 9), hour_on(2, 9)], &[])?;

    session.decisions_mut().answer_scope(Scope::Reservation);
    let block = session.first_block(&id, 0)?;
    session.controller.copy_appointment(&block, Vec::new())?;
    let result = session.controller.paste_appointment(at(6, 9), false, false);

    assert!(result.is_err());
    assert_eq!(session.decisions().failures.len(), 1);
    assert_eq!(session.facade().cache().reservations().count(), 1);
    Ok(())
}

#[test]
fn empty_clipboard_paste_does_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    session.controller.paste_appointment(at(1, 9), true, false)?;
    assert!(session.facade().dispatches().is_empty());
    Ok(())
}

// ============================================================================
// Whole reservations
// ============================================================================

#[test]
fn pasted_reservations_start_at_target() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let first = session.add_reservation("Kickoff", vec![hour_on(1, 9)], &[])?;
    let second = session.add_reservation("Review", vec![hour_on(3, 14)], &[])?;
    let before = session.digest()?;

    session.controller.copy_reservations(&[first, second], Vec::new())?;
    session.controller.paste_appointment(at(10, 8), true, false)?;

    let kickoff = reservations_named(&session, "Kickoff");
    let review = reservations_named(&session, "Review");
    assert_eq!((kickoff.len(), review.len()), (2, 2));
    let pasted_kickoff = kickoff.iter().map(|r| r.appointments()[0].start()).max().ok_or("none")?;
    let pasted_review = review.iter().map(|r| r.appointments()[0].start()).max().ok_or("none")?;
    assert_eq!(pasted_kickoff, at(10, 8));
    assert_eq!(pasted_review, at(12, 13));
    assert_eq!(session.facade().dispatches().len(), 1);

    session.controller.undo()?;
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn cut_reservations_removes_originals() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Offsite", vec![hour_on(2, 9)], &[])?;
    let before = session.digest()?;

    session.controller.cut_reservations(&[id.clone()], Vec::new())?;
    assert!(!session.has_reservation(&id));
    assert_eq!(session.controller.clipboard().reservations().len(), 1);
    assert_eq!(session.controller.history().undo_name().as_deref(), Some("cut"));

    session.controller.paste_appointment(at(20, 9), false, false)?;
    let pasted = reservations_named(&session, "Offsite");
    assert_eq!(pasted.len(), 1);
    assert_eq!(pasted[0].appointments()[0].start(), at(20, 9));

    session.controller.undo()?;
    session.controller.undo()?;
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn cut_block_deletes_it() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let id = session.add_reservation("Pair", vec![hour_on(1, 9), hour_on(2, 9)], &[])?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.first_block(&id, 0)?;
    session.controller.cut_appointment(&block, Vec::new())?;

    let entry = session.controller.clipboard().appointment().ok_or("clipboard empty")?;
    assert_eq!(entry.copy_type, CopyType::CutBlock);
    assert_eq!(session.reservation(&id)?.appointments().len(), 1);
    assert_eq!(
        session.controller.history().undo_name().as_deref(),
        Some("cut single appointment 2024-01-01")
    );
    Ok(())
}

#[test]
fn paste_into_other_slot_exchanges_allocatable() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let a = session.add_room("Room A")?;
    let b = session.add_room("Room B")?;
    let id = session.add_reservation("Seminar", vec![hour_on(1, 9), hour_on(2, 9)], &[a.clone()])?;

    session.decisions_mut().answer_scope(Scope::Reservation);
    let block = session.first_block(&id, 0)?;
    session.controller.copy_appointment(&block, vec![a.clone()])?;
    let entry = session.controller.clipboard().appointment().ok_or("clipboard empty")?;
    assert_eq!(entry.copy_type, CopyType::CopyReservation);

    session.controller.set_marked_allocatables(vec![b.clone()]);
    session.controller.paste_appointment(at(8, 9), true, false)?;

    let created = others(&session, &id);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].allocatables(), &[b]);
    let mut starts: Vec<_> = created[0].appointments().iter().map(Appointment::start).collect();
    starts.sort();
    assert_eq!(starts, vec![at(8, 9), at(9, 9)]);
    assert_eq!(session.reservation(&id)?.allocatables(), &[a]);
    Ok(())
}
