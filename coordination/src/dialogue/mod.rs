//! Dialogue protocols
//!
//! Three state machines sequence Turn Engine calls over registered agents:
//!
//! ```text
//!   ask       Initial(a,b,c) ──► Rebuttal(a,b,c)                  2 × N turns
//!   converse  Round1(a,b) ──► Round2(a,b) ──► ... ──► RoundR(a,b)  R × N turns
//!   debate    Opening(+,-) ──► Rebuttal2..R(+,-) ──► Closing(+,-)  2R + 2 turns
//! ```
//!
//! Turns inside a dialogue are strictly sequential: each prompt's context is
//! assembled from the text of turns that already completed. A turn whose
//! invocation failed is recorded with a failure marker and the protocol
//! carries on.

pub mod ask;
pub mod context;
pub mod converse;
pub mod debate;
pub mod observer;
pub mod orchestrator;
pub mod types;

pub use debate::{DebateStage, Side, Sides};
pub use observer::{DialogueObserver, NoopObserver};
pub use orchestrator::{DialogueOrchestrator, DialogueOutcome};
pub use types::{Dialogue, DialogueKind};
