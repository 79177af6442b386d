// src/session/mod.rs
//
// Student-side exam session: violation detectors, the warning funnel, the
// session state machine and the runtime that drives it against the server.

pub mod error;
pub mod gateway;
pub mod identity;
pub mod machine;
pub mod runtime;
pub mod signals;
pub mod warnings;

pub use error::SessionError;
pub use gateway::{ExamGateway, GatewayError, HttpGateway};
pub use identity::{CompletionMarkers, FileMarkers, MemoryMarkers, SessionIdentity, login};
pub use machine::{Effect, ExamSession, ExamSettings, FinishReason, Phase};
pub use runtime::{SessionHandle, SessionReport, SessionRuntime, SessionView, UserAction, ViewportProbe};
pub use signals::{BrowserEvent, Countermeasure, SignalHub, SignalSource, Violation, ViolationCode};
