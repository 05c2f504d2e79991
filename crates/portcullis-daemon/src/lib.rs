//! portcullis-daemon: Knock-gated remote command sessions
//!
//! The daemon listens passively on a set of decoy ports. A source address
//! that connects to those ports in the configured order within the knock
//! timeout earns a one-shot authorization, which admits exactly one
//! line-framed JSON command session on the separate command port.

pub mod admission;
pub mod exec;
pub mod knock;
pub mod server;
pub mod state;

pub use admission::AdmissionControl;
pub use state::DaemonState;
