// Logical <-> physical device index mapping for one run.

use std::collections::BTreeMap;

use tracing::warn;

/// Bidirectional map built once at loop start and read-only afterwards.
///
/// Logical ids are positions in the visibility list. An entry that cannot be
/// resolved leaves its position empty; later entries keep their ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentityMap {
    to_physical: BTreeMap<u32, u32>,
    to_logical: BTreeMap<u32, u32>,
    restricted: bool,
}

impl DeviceIdentityMap {
    /// Every physical index is its own logical id.
    pub fn identity(physical: impl IntoIterator<Item = u32>) -> Self {
        let mut map = Self::default();
        for idx in physical {
            map.insert(idx, idx);
        }
        map
    }

    /// Builds the map from a visibility setting (`"0,2"`, `"GPU-uuid,1"`, ...).
    /// `listing` is the tool's `index, identifier` output. When it is empty (the
    /// listing query failed) numeric entries pass through unchecked.
    pub fn from_visibility(setting: &str, listing: &[(u32, String)]) -> Self {
        let mut map = Self {
            restricted: true,
            ..Self::default()
        };
        let tokens = setting.split(',').map(str::trim).filter(|t| !t.is_empty());
        for (position, token) in tokens.enumerate() {
            let logical = position as u32;
            let Some(physical) = resolve_token(token, listing) else {
                warn!(entry = token, logical, "device visibility entry did not resolve; dropping");
                continue;
            };
            if map.to_logical.contains_key(&physical) {
                warn!(entry = token, physical, "duplicate device visibility entry; keeping first");
                continue;
            }
            map.insert(logical, physical);
        }
        map
    }

    /// `None` means no restriction: use every listed device 1:1.
    pub fn resolve(setting: Option<&str>, listing: &[(u32, String)]) -> Self {
        match setting {
            Some(s) => Self::from_visibility(s, listing),
            None => Self::identity(listing.iter().map(|(idx, _)| *idx)),
        }
    }

    fn insert(&mut self, logical: u32, physical: u32) {
        self.to_physical.insert(logical, physical);
        self.to_logical.insert(physical, logical);
    }

    pub fn physical(&self, logical: u32) -> Option<u32> {
        self.to_physical.get(&logical).copied()
    }

    pub fn logical(&self, physical: u32) -> Option<u32> {
        self.to_logical.get(&physical).copied()
    }

    /// Logical ids in ascending order.
    pub fn logical_ids(&self) -> Vec<u32> {
        self.to_physical.keys().copied().collect()
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn len(&self) -> usize {
        self.to_physical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_physical.is_empty()
    }
}

/// Numeric entries are physical indices and must appear in the listing; with no
/// listing they are taken as-is. Anything else is an identifier, matched exactly
/// or by unique prefix.
fn resolve_token(token: &str, listing: &[(u32, String)]) -> Option<u32> {
    if let Ok(idx) = token.parse::<u32>() {
        let listed = listing.is_empty() || listing.iter().any(|(i, _)| *i == idx);
        return listed.then_some(idx);
    }
    if let Some((idx, _)) = listing.iter().find(|(_, id)| id == token) {
        return Some(*idx);
    }
    let mut prefixed = listing.iter().filter(|(_, id)| id.starts_with(token));
    match (prefixed.next(), prefixed.next()) {
        (Some((idx, _)), None) => Some(*idx),
        _ => None,
    }
}
