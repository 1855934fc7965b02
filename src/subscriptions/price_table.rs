use crate::domain::Tier;
use std::collections::HashMap;

/// Lookup from processor price identifiers to the tier they sell.
#[derive(Clone, Debug, Default)]
pub struct PriceTable(HashMap<String, Tier>);

impl PriceTable {
    pub fn new(entries: impl IntoIterator<Item = (String, Tier)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Unknown or missing prices never grant a paid tier.
    pub fn tier_for(&self, price_id: Option<&str>) -> Tier {
        price_id
            .and_then(|id| self.0.get(id))
            .copied()
            .unwrap_or(Tier::Free)
    }

    pub fn is_known(&self, price_id: &str) -> bool {
        self.0.contains_key(price_id)
    }
}
