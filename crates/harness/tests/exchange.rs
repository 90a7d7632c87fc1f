use slotbook_core::{Appointment, EntityId, Repeating, RepeatingType, Reservation};
use slotbook_engine::Scope;
use slotbook_harness::{at, TestSession};

fn hour_on(day: i64, hour: i64) -> Appointment {
    Appointment::new(at(day, hour), at(day, hour + 1))
}

/// Three appointments with `a` restricted to all of them.
fn workshop(session: &mut TestSession, first: Appointment) -> Result<(EntityId, EntityId, EntityId, Vec<EntityId>), Box<dyn std::error::Error>> {
    let a = session.add_room("Room A")?;
    let b = session.add_room("Room B")?;
    let mut reservation = Reservation::new("Workshop");
    reservation.set_owner(Some(session.user.id.clone()));
    reservation.add_appointment(first);
    reservation.add_appointment(hour_on(2, 9));
    reservation.add_appointment(hour_on(3, 9));
    reservation.add_allocatable(a.clone());
    let apps = reservation.appointment_ids();
    reservation.set_restriction(&a, &apps);
    let id = session.store(reservation)?;
    Ok((id, a, b, apps))
}

#[test]
fn single_exchange_keeps_old_allocatable_on_the_others() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let (id, a, b, apps) = workshop(&mut session, hour_on(1, 9))?;
    let before = session.digest()?;

    let block = session.first_block(&id, 0)?;
    session.controller.exchange_allocatable(&block, &a, &b, None)?;

    // a restricted allocatable only offers the single scope here
    assert!(session.decisions().prompts.is_empty());
    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.restriction(&a), &apps[1..]);
    assert_eq!(reservation.restriction(&b), &apps[..1]);
    assert_eq!(
        session.controller.history().undo_name().as_deref(),
        Some("exchange allocatables")
    );

    session.controller.undo()?;
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn exchange_on_series_occurrence_detaches_copy() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let mut series = hour_on(1, 9);
    series.set_repeating(Some(Repeating::with_number(RepeatingType::Weekly, 4)));
    let (id, a, b, apps) = workshop(&mut session, series)?;
    let before = session.digest()?;

    session.decisions_mut().answer_scope(Scope::Single);
    let block = session.block_on(&id, 0, 8)?;
    session.controller.exchange_allocatable(&block, &a, &b, Some(at(8, 14)))?;

    assert_eq!(session.decisions().prompts[0].options, vec![Scope::Series, Scope::Single]);
    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.appointments().len(), 4);
    let copy = reservation.appointments().last().ok_or("no copy")?;
    assert_eq!(copy.start(), at(8, 14));
    assert_eq!(reservation.restriction(&a), apps.as_slice());
    assert_eq!(reservation.restriction(&b), &[copy.id().clone()]);

    session.controller.undo()?;
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn exchange_for_whole_reservation_swaps_booking() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let a = session.add_room("Room A")?;
    let b = session.add_room("Room B")?;
    let id = session.add_reservation("Talk", vec![hour_on(5, 10)], &[a.clone()])?;
    let before = session.digest()?;

    let block = session.first_block(&id, 0)?;
    session.controller.exchange_allocatable(&block, &a, &b, None)?;

    let reservation = session.reservation(&id)?;
    assert_eq!(reservation.allocatables(), &[b]);

    session.controller.undo()?;
    assert_eq!(session.digest()?, before);
    Ok(())
}

#[test]
fn exchange_to_unknown_allocatable_is_shown() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = TestSession::new()?;
    let a = session.add_room("Room A")?;
    let id = session.add_reservation("Talk", vec![hour_on(5, 10)], &[a.clone()])?;

    let block = session.first_block(&id, 0)?;
    let result = session
        .controller
        .exchange_allocatable(&block, &a, &EntityId::from("nowhere"), None);

    assert!(result.is_err());
    assert_eq!(session.decisions().failures.len(), 1);
    assert!(session.facade().dispatches().is_empty());
    assert_eq!(session.reservation(&id)?.allocatables(), &[a]);
    Ok(())
}
