//! Coin maturity
//!
//! Mined outputs become spendable only after `maturity_delay` further
//! blocks. Spendability is a pure function of the current height and the
//! mint height; the ledger never caches it.

use crate::types::{BlockHeight, BlockId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Confirmations required before a mined output can be spent
pub const DEFAULT_MATURITY_DELAY: BlockHeight = 144;

/// Consensus constants the node needs locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub maturity_delay: BlockHeight,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            maturity_delay: DEFAULT_MATURITY_DELAY,
        }
    }
}

/// Coinbase output paid to this node for a mined block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedOutput {
    pub block_id: BlockId,
    pub mint_height: BlockHeight,
    pub value: u64,
}

/// `current_height - mint_height >= maturity_delay`
pub fn is_spendable(
    output: &MinedOutput,
    current_height: BlockHeight,
    maturity_delay: BlockHeight,
) -> bool {
    current_height
        .checked_sub(output.mint_height)
        .is_some_and(|confirmations| confirmations >= maturity_delay)
}

/// Applies the maturity rule for a given set of consensus params
#[derive(Debug, Clone, Copy, Default)]
pub struct MaturityTracker {
    params: ConsensusParams,
}

impl MaturityTracker {
    pub fn new(params: ConsensusParams) -> Self {
        Self { params }
    }

    pub fn maturity_delay(&self) -> BlockHeight {
        self.params.maturity_delay
    }

    pub fn is_spendable(&self, output: &MinedOutput, current_height: BlockHeight) -> bool {
        is_spendable(output, current_height, self.params.maturity_delay)
    }

    /// First height at which `output` becomes spendable
    pub fn spendable_at(&self, output: &MinedOutput) -> BlockHeight {
        output.mint_height.saturating_add(self.params.maturity_delay)
    }
}

/// Outputs mined by this node
#[derive(Debug, Default)]
pub struct OutputLedger {
    tracker: MaturityTracker,
    outputs: RwLock<Vec<MinedOutput>>,
}

impl OutputLedger {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            tracker: MaturityTracker::new(params),
            outputs: RwLock::new(Vec::new()),
        }
    }

    pub fn tracker(&self) -> &MaturityTracker {
        &self.tracker
    }

    pub fn record(&self, output: MinedOutput) {
        self.outputs.write().push(output);
    }

    /// Snapshot of every recorded output
    pub fn outputs(&self) -> Vec<MinedOutput> {
        self.outputs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.outputs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.read().is_empty()
    }

    /// Sum of outputs spendable at `current_height`
    pub fn spendable_balance(&self, current_height: BlockHeight) -> u64 {
        self.outputs
            .read()
            .iter()
            .filter(|o| self.tracker.is_spendable(o, current_height))
            .map(|o| o.value)
            .sum()
    }

    /// Sum of outputs still maturing at `current_height`
    pub fn immature_balance(&self, current_height: BlockHeight) -> u64 {
        self.outputs
            .read()
            .iter()
            .filter(|o| !self.tracker.is_spendable(o, current_height))
            .map(|o| o.value)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn output(mint_height: BlockHeight, value: u64) -> MinedOutput {
        MinedOutput {
            block_id: BlockId::default(),
            mint_height,
            value,
        }
    }

    #[test]
    fn test_spendable_exactly_at_delay() {
        let tracker = MaturityTracker::new(ConsensusParams { maturity_delay: 3 });
        let out = output(10, 500);

        assert!(!tracker.is_spendable(&out, 10));
        assert!(!tracker.is_spendable(&out, 12));
        assert!(tracker.is_spendable(&out, 13));
        assert!(tracker.is_spendable(&out, 100));
        assert_eq!(tracker.spendable_at(&out), 13);
    }

    #[test]
    fn test_height_below_mint_is_not_spendable() {
        assert!(!is_spendable(&output(10, 1), 5, 0));
    }

    #[test]
    fn test_zero_delay_spendable_immediately() {
        assert!(is_spendable(&output(7, 1), 7, 0));
    }

    #[test]
    fn test_ledger_balances() {
        let ledger = OutputLedger::new(ConsensusParams { maturity_delay: 3 });
        assert!(ledger.is_empty());
        ledger.record(output(1, 100));
        ledger.record(output(2, 50));

        assert_eq!(ledger.spendable_balance(3), 0);
        assert_eq!(ledger.immature_balance(3), 150);

        assert_eq!(ledger.spendable_balance(4), 100);
        assert_eq!(ledger.immature_balance(4), 50);

        assert_eq!(ledger.spendable_balance(5), 150);
        assert_eq!(ledger.immature_balance(5), 0);
        assert_eq!(ledger.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_balance_zero_until_delay(mint in 0u64..10_000, delay in 0u64..500, value in 1u64..1_000_000) {
            let ledger = OutputLedger::new(ConsensusParams { maturity_delay: delay });
            ledger.record(output(mint, value));

            for height in mint..mint + delay {
                prop_assert_eq!(ledger.spendable_balance(height), 0);
            }
            prop_assert_eq!(ledger.spendable_balance(mint + delay), value);
        }
    }
}
