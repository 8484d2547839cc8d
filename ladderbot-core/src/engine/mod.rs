//! Rung state machine, reconciliation, pending intents, and the per-cycle
//! orchestration that sequences them.

pub mod driver;
pub mod orchestrator;
pub mod pending;
pub mod reconcile;
pub mod rung_machine;

pub use driver::{CycleReport, Driver};
pub use orchestrator::{CycleOutput, Orchestrator, SymbolBook, SymbolSkip};
pub use pending::{Admission, PendingLedger};
pub use reconcile::{reconcile, Reconciliation};
pub use rung_machine::{apply_fill, IntentDraft, RungContext};
