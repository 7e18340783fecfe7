//! Coin selection ordering.
//!
//! Strategies only decide the order in which candidate coins are offered to
//! the assembler; the assembler then classifies each one against what is
//! still missing and stops as soon as the transaction balances.

use ada_types::{AddressedUtxo, MultiToken};
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};

/// Available selection strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionStrategy {
    /// Lovelace-only coins first, each group largest first.
    #[default]
    Default,
    /// Largest lovelace first (fewest inputs).
    LargestFirst,
    /// Smallest lovelace first (consolidates dust).
    SmallestFirst,
    /// Random order.
    Random,
    /// Keep the caller's order.
    AsGiven,
}

/// Order `candidates` for offering.
pub fn order_candidates(candidates: &[AddressedUtxo], strategy: SelectionStrategy) -> Vec<AddressedUtxo> {
    let mut ordered = candidates.to_vec();
    match strategy {
        SelectionStrategy::AsGiven => {}
        SelectionStrategy::LargestFirst => {
            ordered.sort_by(|a, b| b.amount().get_default().cmp(&a.amount().get_default()));
        }
        SelectionStrategy::SmallestFirst => {
            ordered.sort_by(|a, b| a.amount().get_default().cmp(&b.amount().get_default()));
        }
        SelectionStrategy::Random => {
            use rand::seq::SliceRandom;
            ordered.shuffle(&mut rand::thread_rng());
        }
        SelectionStrategy::Default => {
            // stable: equal coins keep caller order
            ordered.sort_by(|a, b| {
                a.amount()
                    .has_non_default()
                    .cmp(&b.amount().has_non_default())
                    .then_with(|| b.amount().get_default().cmp(&a.amount().get_default()))
            });
        }
    }
    ordered
}

/// Verdict on offering one more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddInputResult {
    /// Contributes something still missing and pays for itself.
    Valid,
    /// Its lovelace does not cover the fee its inclusion adds.
    TooSmall,
    /// Contributes none of the missing assets.
    NoNeed,
}

/// Classify `value` against the outstanding `missing` amounts.
///
/// `missing` holds positive amounts for assets still lacking. When lovelace
/// is the only thing missing, a coin must at least pay its own marginal fee.
pub fn classify(value: &MultiToken, missing: &MultiToken, marginal_fee: u64) -> AddInputResult {
    let needs_token = missing
        .non_default_entries()
        .iter()
        .any(|t| t.amount.sign() == Sign::Plus && value.get(&t.identifier).sign() == Sign::Plus);
    if needs_token {
        return AddInputResult::Valid;
    }
    if missing.get_default().sign() != Sign::Plus {
        return AddInputResult::NoNeed;
    }
    if value.get_default() <= BigInt::from(marginal_fee) {
        return AddInputResult::TooSmall;
    }
    AddInputResult::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_types::{Addressing, TokenEntry, Utxo};

    fn coin(n: u8, lovelace: u64, token: Option<u64>) -> AddressedUtxo {
        let mut amount = MultiToken::from_default(1, lovelace);
        if let Some(q) = token {
            amount.add(TokenEntry::new("pp.tt", 1, q));
        }
        AddressedUtxo::new(
            Utxo {
                tx_hash: format!("{:02x}", n).repeat(32),
                output_index: 0,
                address: "61".to_string() + &"aa".repeat(28),
                amount,
            },
            Addressing::address(ada_types::constants::purpose::CIP1852, 0, 0, n as u32),
        )
    }

    fn lovelaces(v: &[AddressedUtxo]) -> Vec<u64> {
        v.iter().map(|u| u.amount().default_u64().unwrap()).collect()
    }

    #[test]
    fn test_largest_and_smallest_first() {
        let c = vec![coin(1, 50, None), coin(2, 200, None), coin(3, 100, None)];
        assert_eq!(lovelaces(&order_candidates(&c, SelectionStrategy::LargestFirst)), vec![200, 100, 50]);
        assert_eq!(lovelaces(&order_candidates(&c, SelectionStrategy::SmallestFirst)), vec![50, 100, 200]);
        assert_eq!(lovelaces(&order_candidates(&c, SelectionStrategy::AsGiven)), vec![50, 200, 100]);
    }

    #[test]
    fn test_default_prefers_plain_coins() {
        let c = vec![coin(1, 900, Some(5)), coin(2, 10, None), coin(3, 30, None)];
        let ordered = order_candidates(&c, SelectionStrategy::Default);
        assert_eq!(lovelaces(&ordered), vec![30, 10, 900]);
    }

    #[test]
    fn test_random_keeps_all() {
        let c = vec![coin(1, 1, None), coin(2, 2, None), coin(3, 3, None)];
        let mut got = lovelaces(&order_candidates(&c, SelectionStrategy::Random));
        got.sort();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_classify() {
        let missing_ada = MultiToken::from_default(1, 1_000u64);
        assert_eq!(classify(&MultiToken::from_default(1, 500u64), &missing_ada, 600), AddInputResult::TooSmall);
        assert_eq!(classify(&MultiToken::from_default(1, 5_000u64), &missing_ada, 600), AddInputResult::Valid);

        let mut missing_token = MultiToken::new(1);
        missing_token.add(TokenEntry::new("pp.tt", 1, 3));
        assert_eq!(classify(&MultiToken::from_default(1, 5_000u64), &missing_token, 600), AddInputResult::NoNeed);
        let mut with_token = MultiToken::from_default(1, 1u64);
        with_token.add(TokenEntry::new("pp.tt", 1, 1));
        assert_eq!(classify(&with_token, &missing_token, 600), AddInputResult::Valid);
    }
}
