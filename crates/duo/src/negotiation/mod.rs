//! Negotiation state machine
//!
//! [`transition`] is a pure table from (state, event) to the next state and
//! a list of [`Effect`]s. The controller executes the effects against the
//! live [`NegotiationSession`] and the signaling transport.

pub mod session;
pub mod state;
pub mod table;

pub use session::{NegotiationSession, SessionOp, StepCompletion, StepOutcome};
pub use state::{NegotiationPhase, NegotiationState};
pub use table::{transition, Effect, NegotiationContext, NegotiationEvent, SessionIntent, Transition};
