//! Global daemon state

use portcullis_core::DaemonConfig;

use crate::admission::AdmissionControl;
use crate::exec::CommandExecutor;

/// Shared state for the portcullis daemon
pub struct DaemonState {
    /// Configuration
    pub config: DaemonConfig,
    /// Knock tracking and one-shot authorizations
    pub admission: AdmissionControl,
    /// Capability implementations
    pub executor: CommandExecutor,
}

impl DaemonState {
    /// Create daemon state from a configuration
    pub fn new(config: DaemonConfig) -> Self {
        let admission =
            AdmissionControl::new(config.knock_sequence.clone(), config.knock_timeout);
        let executor = CommandExecutor::new(config.shell_timeout);

        Self {
            config,
            admission,
            executor,
        }
    }
}
