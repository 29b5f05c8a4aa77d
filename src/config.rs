//! Machine configuration
//!
//! Every field has a default, so a JSON document only needs the keys it
//! changes: `{"clock_hz": 3500000}` is a complete configuration.

use serde::{Deserialize, Serialize};

use crate::cpu::{DEFAULT_MAX_PENDING, DEFAULT_STACK_POINTER};
use crate::error::ConfigError;

/// Default emulated clock, 4 MHz
pub const DEFAULT_CLOCK_HZ: u32 = 4_000_000;

/// Default number of executed instructions kept for diagnostics
pub const DEFAULT_HISTORY_DEPTH: usize = 64;

/// Machine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Emulated CPU clock in Hz, used to turn wall time into cycles
    pub clock_hz: u32,
    /// SP value applied on power-on and reset
    pub stack_pointer: u16,
    /// Depth of the maskable interrupt request queue
    pub max_pending_interrupts: usize,
    /// Emit a trace event for every executed instruction
    pub trace_instructions: bool,
    /// Executed instructions remembered for `Machine::history`; 0 disables
    pub history_depth: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            stack_pointer: DEFAULT_STACK_POINTER,
            max_pending_interrupts: DEFAULT_MAX_PENDING,
            trace_instructions: false,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl MachineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the machine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_hz == 0 {
            return Err(ConfigError::InvalidClock(self.clock_hz));
        }
        if self.max_pending_interrupts == 0 {
            return Err(ConfigError::InvalidQueueDepth(self.max_pending_interrupts));
        }
        Ok(())
    }
}
