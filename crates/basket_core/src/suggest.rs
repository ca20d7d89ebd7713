//! Autocomplete suggestions.
//!
//! Matching is case-insensitive and tiered; the first tier with any match
//! wins, and within a tier the most recently modified item wins:
//!
//! 1. the name starts with the query
//! 2. some whitespace-delimited word of the name starts with the query
//! 3. the name contains the query anywhere

use crate::item::BasketItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Prefix,
    WordPrefix,
    Substring,
}

fn tier(name: &str, query: &str) -> Option<Tier> {
    let name = name.to_lowercase();
    if name.starts_with(query) {
        Some(Tier::Prefix)
    } else if name.split_whitespace().any(|word| word.starts_with(query)) {
        Some(Tier::WordPrefix)
    } else if name.contains(query) {
        Some(Tier::Substring)
    } else {
        None
    }
}

/// Pick the best completion for `query`, or `None` when nothing matches.
///
/// A blank query never matches.
pub fn suggest<'a, I>(query: &str, items: I) -> Option<&'a BasketItem>
where
    I: IntoIterator<Item = &'a BasketItem>,
{
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let mut best: Option<(Tier, &'a BasketItem)> = None;
    for item in items {
        let Some(tier) = tier(&item.name, &query) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((best_tier, best_item)) => {
                tier < best_tier
                    || (tier == best_tier && item.last_modified > best_item.last_modified)
            }
        };
        if better {
            best = Some((tier, item));
        }
    }
    best.map(|(_, item)| item)
}
