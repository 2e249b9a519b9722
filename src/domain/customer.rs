use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a customer. Survives renames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CustomerId(pub u64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A person running a tab at the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
}

impl Customer {
    pub fn new(id: CustomerId, name: String) -> Self {
        Self { id, name }
    }
}

/// How a caller addresses a customer.
///
/// The id is the primary reference. The name is only a secondary index and is
/// resolved to an id once, at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerRef {
    Id(CustomerId),
    Name(String),
}

impl From<CustomerId> for CustomerRef {
    fn from(id: CustomerId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for CustomerRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for CustomerRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for CustomerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerRef::Id(id) => write!(f, "{}", id),
            CustomerRef::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Trims a customer name and rejects it when nothing is left.
pub fn normalize_name(name: &str) -> Result<String, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        Err(LedgerError::Validation(
            "Customer name cannot be empty".to_string(),
        ))
    } else {
        Ok(name.to_string())
    }
}
