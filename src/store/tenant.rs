//! Tenant identity and the comma-joined membership lists.
//!
//! `staff.dat` and `channels.dat` both hold a single line of identifiers
//! joined with `,`. An empty list is the empty string, which must read
//! back as an empty set rather than a set holding `""`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Result, StoreError};

/// Opaque, stable identifier of a tenant.
///
/// Doubles as the name of the tenant's data directory, so it must be a
/// single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_plain_component(&id) {
            return Err(StoreError::InvalidTenantId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// True if `name` can be joined onto a directory without escaping it.
pub(crate) fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Check that an identity or channel ID survives the comma-joined format.
pub fn validate_member(member: &str) -> Result<()> {
    if member.is_empty() || member.contains([',', '\r', '\n']) {
        return Err(StoreError::InvalidIdentity(member.to_string()));
    }
    Ok(())
}

/// Serialize a membership set as a comma-joined line.
pub fn encode_members(members: &BTreeSet<String>) -> String {
    members.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Parse a comma-joined line back into a membership set.
///
/// Empty elements are dropped; that covers the single `""` produced by
/// splitting an empty file.
pub fn decode_members(text: &str) -> BTreeSet<String> {
    text.trim_end_matches(['\r', '\n'])
        .split(',')
        .filter(|member| !member.is_empty())
        .map(str::to_string)
        .collect()
}
