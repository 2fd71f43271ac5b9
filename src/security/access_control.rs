//! Client allow-list.
//!
//! Authorization is exact string equality between the caller's resolved
//! identity and an allow-list entry. No wildcard or subnet matching.

use crate::relay::error::{RelayError, RelayResult};

/// Authorizes inbound calls against an optional allow-list.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    allowed: Option<Vec<String>>,
}

impl PermissionGate {
    /// `None` authorizes every caller.
    pub fn new(allowed: Option<Vec<String>>) -> Self {
        Self { allowed }
    }

    /// A gate that lets every caller through.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }

    pub fn is_allowed(&self, identity: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(list) => list.iter().any(|entry| entry == identity),
        }
    }

    /// Denial is terminal: the pipeline must not proceed past this point.
    pub fn authorize(&self, identity: &str) -> RelayResult<()> {
        if self.is_allowed(identity) {
            return Ok(());
        }

        tracing::warn!(client = %identity, "Client not in allow-list");
        Err(RelayError::Permission {
            identity: identity.to_string(),
        })
    }
}
