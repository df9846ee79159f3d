//! Capability name to endpoint mapping for one session.

use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::domain::foundation::ValidationError;

/// Maps capability names to their session-scoped endpoint URIs.
///
/// The table is only ever populated wholesale from a seed response; see
/// [`CapabilityTable::replace_all`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CapabilityTable {
    entries: HashMap<String, Url>,
}

impl CapabilityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from raw `name -> uri` pairs as returned by the seed
    /// capability.
    ///
    /// Entries with an empty name or an unparseable URI are skipped and
    /// reported back so the caller can log them; the rest of the response
    /// is still usable.
    pub fn from_raw<I>(raw: I) -> (Self, Vec<ValidationError>)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries = HashMap::new();
        let mut rejected = Vec::new();

        for (name, uri) in raw {
            if name.is_empty() {
                rejected.push(ValidationError::empty_field("capability_name"));
                continue;
            }
            match Url::parse(&uri) {
                Ok(url) => {
                    entries.insert(name, url);
                }
                Err(e) => rejected.push(ValidationError::invalid_format(name, e.to_string())),
            }
        }

        (Self { entries }, rejected)
    }

    /// Replaces every entry with those of `other`.
    ///
    /// Names present before but absent from `other` are gone afterwards.
    pub fn replace_all(&mut self, other: CapabilityTable) {
        self.entries = other.entries;
    }

    /// Looks up the endpoint for a capability.
    pub fn get(&self, name: &str) -> Option<&Url> {
        self.entries.get(name)
    }

    /// Returns true if the server granted `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Granted capability names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// Capability URIs are bearer credentials; only names are printed.
impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("names", &self.names())
            .finish()
    }
}
