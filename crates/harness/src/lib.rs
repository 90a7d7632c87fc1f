mod decisions;
mod facade;
mod session;

pub use decisions::ScriptedDecisions;
pub use facade::{DispatchRecord, TestFacade};
pub use session::{at, init_tracing, TestSession};
