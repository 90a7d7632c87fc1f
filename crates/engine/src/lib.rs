pub mod checks;
pub mod clipboard;
pub mod command;
pub mod commands;
pub mod config;
pub mod controller;
pub mod decision;
pub mod error;
pub mod facade;
pub mod history;

pub use checks::{CheckContext, EventCheck, EventCheckPipeline};
pub use clipboard::{Clipboard, ClipboardAppointment, CopyType};
pub use command::{Command, CommandContext, DispatchMode, StampLedger};
pub use config::{EngineConfig, DEFAULT_UNDO_DEPTH};
pub use controller::EditController;
pub use decision::{scope_options, DecisionCallback, EditAction, Scope, ScopeRequest};
pub use error::EngineError;
pub use facade::Facade;
pub use history::{CommandHistory, UndoResult};
