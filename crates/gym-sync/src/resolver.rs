use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::collection::{Collection, KeyMap, LocalId, SurrogateId};
use crate::error::StoreError;

/// A natural-key reference from one record to a row of another collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignRef {
    pub target: Collection,
    pub local_id: LocalId,
}

impl ForeignRef {
    pub fn required(target: Collection, local_id: LocalId) -> Self {
        Self { target, local_id }
    }

    /// Desktop clients send `0` for an unset optional parent, same as `null`.
    pub fn optional(target: Collection, local_id: Option<LocalId>) -> Option<Self> {
        local_id
            .filter(|id| *id != 0)
            .map(|id| Self::required(target, id))
    }
}

#[async_trait]
pub trait NaturalKeyLookup: Send {
    /// Returns the surrogate id of every row in `collection` whose natural key
    /// is in `local_ids`. Keys with no row are simply absent from the map.
    async fn find_by_local_ids(
        &mut self,
        collection: Collection,
        local_ids: &[LocalId],
    ) -> Result<KeyMap, StoreError>;
}

#[derive(Debug, Default)]
pub struct ResolvedKeys {
    maps: HashMap<Collection, KeyMap>,
}

impl ResolvedKeys {
    pub fn get(&self, reference: ForeignRef) -> Option<SurrogateId> {
        self.maps
            .get(&reference.target)
            .and_then(|map| map.get(&reference.local_id))
            .copied()
    }
}

/// Looks up every distinct referenced natural key with one query per target
/// collection.
pub async fn resolve_references<L, I>(lookup: &mut L, references: I) -> Result<ResolvedKeys, StoreError>
where
    L: NaturalKeyLookup + ?Sized,
    I: IntoIterator<Item = ForeignRef>,
{
    let mut wanted: BTreeMap<Collection, BTreeSet<LocalId>> = BTreeMap::new();
    for reference in references {
        wanted
            .entry(reference.target)
            .or_default()
            .insert(reference.local_id);
    }

    let mut resolved = ResolvedKeys::default();
    for (target, ids) in wanted {
        let ids: Vec<LocalId> = ids.into_iter().collect();
        let found = lookup.find_by_local_ids(target, &ids).await?;
        debug!(
            collection = target.key(),
            requested = ids.len(),
            found = found.len(),
            "resolved natural keys"
        );
        resolved.maps.insert(target, found);
    }
    Ok(resolved)
}
