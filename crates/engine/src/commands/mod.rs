pub mod delete;
pub mod exchange;
pub mod paste;
pub mod resize;

pub use delete::{DeleteBlocks, DeletePlan};
pub use exchange::AllocatableExchange;
pub use paste::{AppointmentPaste, ReservationPaste};
pub use resize::{AppointmentResize, BlockRange};
