//! Endpoint configuration
//!
//! One `EndpointConfig` per execution context. Loaded from JSON or built
//! with the role constructors.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Which side of the channel an endpoint runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns the shared console.
    Coordinator,
    /// Has no console of its own; forwards diagnostics to the coordinator.
    Worker,
}

impl Role {
    pub fn owns_console(self) -> bool {
        matches!(self, Self::Coordinator)
    }
}

/// Per-endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Label used as the prefix of every diagnostic line (`RPC[label]`).
    pub label: String,
    /// Coordinator or worker.
    pub role: Role,
    /// Worker only: send diagnostics to the coordinator as Log messages.
    /// When false the worker writes them to its local `log` backend.
    pub forward_diagnostics: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::coordinator()
    }
}

impl EndpointConfig {
    pub fn coordinator() -> Self {
        Self {
            label: "coordinator".into(),
            role: Role::Coordinator,
            forward_diagnostics: true,
        }
    }

    pub fn worker() -> Self {
        Self {
            label: "worker".into(),
            role: Role::Worker,
            forward_diagnostics: true,
        }
    }

    /// Replace the label, keeping everything else.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("parsing endpoint config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            bail!("endpoint label must not be empty");
        }
        Ok(())
    }

    /// True when diagnostics should leave this context as Log messages.
    pub fn forwards_diagnostics(&self) -> bool {
        !self.role.owns_console() && self.forward_diagnostics
    }
}
