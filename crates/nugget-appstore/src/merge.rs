//! Rank-preserving reconciliation of the two upstream sources.
//!
//! The ranking endpoint is authoritative for order but carries no metadata;
//! the lookup endpoint is rich in metadata but scrambles order. The merge
//! walks the authoritative order, attaches metadata where present, and
//! records the rest as omissions — it never reorders by lookup content.

use std::collections::HashMap;

use crate::types::{AppRecord, RankedApp};

/// Result of merging the authoritative order with the enrichment map.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Apps with metadata, ranked 1..=n contiguously in authoritative order.
    pub apps: Vec<RankedApp>,
    /// Identifiers ranked upstream but missing from the enrichment map.
    pub omitted: Vec<i64>,
}

impl MergeOutcome {
    #[must_use]
    pub fn omitted_count(&self) -> usize {
        self.omitted.len()
    }
}

/// Merge the ranked identifier order with the enrichment map.
///
/// Ranks are assigned 1-based over emitted apps only, so they stay
/// contiguous when identifiers are omitted. Every input identifier ends up
/// either in `apps` or in `omitted`, exactly once.
#[must_use]
pub fn merge_ranked(order: &[i64], metadata: &HashMap<i64, AppRecord>) -> MergeOutcome {
    let mut apps = Vec::with_capacity(order.len());
    let mut omitted = Vec::new();

    for id in order {
        match metadata.get(id) {
            Some(record) => {
                #[allow(clippy::cast_possible_truncation)]
                let rank = (apps.len() + 1) as u32;
                apps.push(RankedApp {
                    rank,
                    app: record.clone(),
                });
            }
            None => omitted.push(*id),
        }
    }

    MergeOutcome { apps, omitted }
}
