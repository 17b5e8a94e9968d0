//! Action identifiers.
//!
//! 3ds Max saves every macroScript we define into the user macro folder and
//! re-reads the menu layout from disk when an item is clicked, so identifiers
//! have to be stable across reloads and restarts. They are derived from an
//! MD5 digest of the action's display name; two live actions sharing a name
//! get a numeric suffix.

use crate::error::{BridgeError, BridgeResult};
use crate::registry::ActionRegistry;
use std::borrow::Borrow;
use std::fmt;

const ID_PREFIX: &str = "sg_";

/// A validated identifier, safe to splice into MaxScript as a macro or
/// variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(String);

impl ActionId {
    /// Accepts only non-empty `[A-Za-z0-9_]` strings that do not start with a
    /// digit.
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        if is_valid_identifier(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(BridgeError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ActionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn is_valid_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Hands out identifiers for menu actions.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentifierAllocator;

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self
    }

    /// The undisambiguated identifier for `display_name`.
    pub fn base_id(&self, display_name: &str) -> ActionId {
        ActionId(format!(
            "{}{:x}",
            ID_PREFIX,
            md5::compute(display_name.as_bytes())
        ))
    }

    /// Returns the identifier for `display_name`, suffixed until it does not
    /// clash with an entry of the registry's live generation.
    pub fn allocate(&self, display_name: &str, registry: &ActionRegistry) -> ActionId {
        let base = self.base_id(display_name);
        if !registry.contains_live(&base) {
            return base;
        }

        let mut n = 2u32;
        loop {
            let candidate = ActionId(format!("{}_{}", base.0, n));
            if !registry.contains_live(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
