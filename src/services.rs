//! Service routing
//!
//! Maps each service name in a fixed set to either an in-process handler or
//! the address of a remote one. Names are declared up front; assigning a
//! target to an undeclared name is an error rather than a silent insert.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{OdmError, Result};

/// Where calls for a service go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTarget<A> {
    /// Handled in process
    Local(A),
    /// Forwarded to a remote address
    Address(String),
}

impl<A> ServiceTarget<A> {
    pub fn is_local(&self) -> bool {
        matches!(self, ServiceTarget::Local(_))
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            ServiceTarget::Address(addr) => Some(addr),
            ServiceTarget::Local(_) => None,
        }
    }
}

/// Closed set of service names and their current targets
#[derive(Debug, Clone)]
pub struct ServiceRegistry<A> {
    services: IndexMap<String, Option<ServiceTarget<A>>>,
}

impl<A> ServiceRegistry<A> {
    /// Declare the service names; none has a target yet
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: names.into_iter().map(|n| (n.into(), None)).collect(),
        }
    }

    /// Assign (or replace) the target of a declared service
    pub fn set(&mut self, name: &str, target: ServiceTarget<A>) -> Result<()> {
        match self.services.get_mut(name) {
            Some(slot) => {
                *slot = Some(target);
                Ok(())
            }
            None => Err(OdmError::UnknownService(name.to_string())),
        }
    }

    /// Current target; `None` when the name is undeclared or unassigned
    pub fn get(&self, name: &str) -> Option<&ServiceTarget<A>> {
        self.services.get(name).and_then(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Declared names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(|k| k.as_str())
    }

    /// Declared names with no target yet
    pub fn unassigned(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, t)| t.is_none())
            .map(|(n, _)| n.as_str())
            .collect()
    }
}
