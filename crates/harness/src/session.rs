use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use slotbook_cache::CacheError;
use slotbook_core::{Allocatable, Appointment, AppointmentBlock, Entity, EntityId, Reservation, User};
use slotbook_engine::{EditController, EngineConfig, EngineError, Facade};
use tracing_subscriber::EnvFilter;

use crate::{ScriptedDecisions, TestFacade};

/// Install a test-writer subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `hour` o'clock on day `day` of January 2024.
pub fn at(day: i64, hour: i64) -> NaiveDateTime {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);
    base + Duration::days(day - 1) + Duration::hours(hour)
}

/// A controller over an in-memory facade, acting as one user.
pub struct TestSession {
    pub controller: EditController<TestFacade, ScriptedDecisions>,
    pub user: User,
}

impl TestSession {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        init_tracing();
        let user = User::new("alice");
        let mut facade = TestFacade::new();
        facade.seed(Entity::User(user.clone()))?;
        let controller = EditController::new(facade, ScriptedDecisions::new(), user.clone(), config);
        Ok(Self { controller, user })
    }

    pub fn facade(&self) -> &TestFacade {
        self.controller.facade()
    }

    pub fn facade_mut(&mut self) -> &mut TestFacade {
        self.controller.facade_mut()
    }

    pub fn decisions(&self) -> &ScriptedDecisions {
        self.controller.decisions()
    }

    pub fn decisions_mut(&mut self) -> &mut ScriptedDecisions {
        self.controller.decisions_mut()
    }

    pub fn add_room(&mut self, name: &str) -> Result<EntityId, EngineError> {
        let mut room = Allocatable::new(name);
        room.owner = Some(self.user.id.clone());
        let id = room.id.clone();
        self.facade_mut().seed(room.into())?;
        Ok(id)
    }

    /// Store a reservation owned by the session user, booking `rooms` for
    /// every appointment.
    pub fn add_reservation(
        &mut self,
        name: &str,
        appointments: Vec<Appointment>,
        rooms: &[EntityId],
    ) -> Result<EntityId, EngineError> {
        let mut reservation = Reservation::new(name);
        reservation.set_owner(Some(self.user.id.clone()));
        for appointment in appointments {
            reservation.add_appointment(appointment);
        }
        for room in rooms {
            reservation.add_allocatable(room.clone());
        }
        self.store(reservation)
    }

    /// Store a prepared reservation as is.
    pub fn store(&mut self, reservation: Reservation) -> Result<EntityId, EngineError> {
        let id = reservation.id().clone();
        self.facade_mut().seed(reservation.into())?;
        Ok(id)
    }

    /// Current stored state of a reservation.
    pub fn reservation(&self, id: &EntityId) -> Result<Reservation, EngineError> {
        Ok(self.facade().cache().resolve_reservation(id)?.clone())
    }

    pub fn has_reservation(&self, id: &EntityId) -> bool {
        self.facade().cache().try_resolve_reservation(id).is_some()
    }

    /// The first occurrence of appointment `index` of a reservation.
    pub fn first_block(&self, reservation: &EntityId, index: usize) -> Result<AppointmentBlock, EngineError> {
        let reservation = self.reservation(reservation)?;
        reservation
            .appointments()
            .get(index)
            .map(AppointmentBlock::first_of)
            .ok_or_else(|| EngineError::EntityNotFound(format!("appointment #{index} of {}", reservation.id())))
    }

    /// The occurrence of appointment `index` starting on `day`.
    pub fn block_on(&self, reservation: &EntityId, index: usize, day: i64) -> Result<AppointmentBlock, EngineError> {
        let first = self.first_block(reservation, index)?;
        let start = at(day, 0) + (first.start - first.start.date().and_time(NaiveTime::MIN));
        Ok(AppointmentBlock {
            end: start + (first.end - first.start),
            start,
            appointment: first.appointment,
        })
    }

    pub fn digest(&self) -> Result<[u8; 32], CacheError> {
        self.facade().cache().state_digest()
    }
}
