pub mod appointment;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod ids;
pub mod repeating;
pub mod reservation;
pub mod resources;
pub mod time;

pub use appointment::{Appointment, AppointmentBlock};
pub use conflict::Conflict;
pub use entity::Entity;
pub use error::CoreError;
pub use ids::*;
pub use repeating::{Repeating, RepeatingType};
pub use reservation::Reservation;
pub use resources::{Allocatable, Category, DynamicType, Preferences, User};
pub use time::Timestamp;
