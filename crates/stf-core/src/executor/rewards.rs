//! Irregular balance changes of a block: mining rewards, withdrawals and the DAO fork.

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::{constants::shanghai::GWEI_TO_WEI, env::Ommer, interfaces::StateDb};

/// Reward of an ommer included at depth `delta`: `(8 - delta) / 8` of the block reward.
pub fn ommer_reward(block_reward: U256, delta: u64) -> U256 {
    U256::from(8u64.saturating_sub(delta)) * block_reward / U256::from(8)
}

/// Reward of the block producer: the block reward plus `1/32` of it per included ommer.
pub fn miner_reward(block_reward: U256, ommers: usize) -> U256 {
    block_reward + block_reward / U256::from(32) * U256::from(ommers)
}

/// Credits the block producer and the producers of the ommers.
///
/// The producer is credited even with a zero reward, which touches it.
pub fn apply_rewards<S: StateDb>(
    state: &mut S,
    coinbase: Address,
    ommers: &[Ommer],
    block_reward: U256,
) {
    for ommer in ommers {
        state.add_balance(ommer.address, ommer_reward(block_reward, ommer.delta));
    }
    state.add_balance(coinbase, miner_reward(block_reward, ommers.len()));
}

/// Credits the withdrawals, whose amounts are in gwei.
pub fn apply_withdrawals<S: StateDb>(state: &mut S, withdrawals: &[Withdrawal]) {
    for withdrawal in withdrawals {
        let amount = U256::from(withdrawal.amount) * U256::from(GWEI_TO_WEI);
        state.add_balance(withdrawal.address, amount);
    }
}

/// Moves the whole balance of every drained account to `refund_contract`.
pub fn apply_dao_fork<S: StateDb>(state: &mut S, drain_accounts: &[Address], refund_contract: Address) {
    let mut total = U256::ZERO;
    state.add_balance(refund_contract, U256::ZERO);
    for address in drain_accounts {
        let balance = state.balance(*address);
        state.add_balance(refund_contract, balance);
        state.set_balance(*address, U256::ZERO);
        total += balance;
    }
    debug!(accounts = drain_accounts.len(), total = %total, "Applied DAO fork");
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use rstest::rstest;

    use super::*;
    use crate::state::{Alloc, AllocAccount, MemoryState};

    const REWARD: u64 = 2_000_000_000_000_000_000;

    #[rstest]
    #[case(1, REWARD / 8 * 7)]
    #[case(2, REWARD / 8 * 6)]
    #[case(7, REWARD / 8)]
    #[case(8, 0)]
    #[case(9, 0)]
    fn test_ommer_reward(#[case] delta: u64, #[case] want: u64) {
        assert_eq!(ommer_reward(U256::from(REWARD), delta), U256::from(want));
    }

    #[test]
    fn test_rewards() {
        let coinbase = address!("0x00000000000000000000000000000000000c0ffe");
        let uncle = address!("0x000000000000000000000000000000000000000a");
        let mut state = MemoryState::default();
        let ommers = [Ommer { delta: 1, address: uncle }, Ommer { delta: 2, address: uncle }];
        apply_rewards(&mut state, coinbase, &ommers, U256::from(REWARD));

        assert_eq!(state.balance(coinbase), U256::from(REWARD + REWARD / 16));
        assert_eq!(state.balance(uncle), U256::from(REWARD / 8 * 13));
    }

    #[test]
    fn test_withdrawals_in_gwei() {
        let address = address!("0x0000000000000000000000000000000000000b0b");
        let mut state = MemoryState::default();
        let withdrawal = Withdrawal { index: 0, validator_index: 0, address, amount: 3 };
        apply_withdrawals(&mut state, &[withdrawal, withdrawal]);
        assert_eq!(state.balance(address), U256::from(6_000_000_000u64));
    }

    #[test]
    fn test_dao_drain() {
        let drained = [Address::with_last_byte(1), Address::with_last_byte(2)];
        let refund = Address::with_last_byte(3);
        let mut state = MemoryState::new(&Alloc::from([
            (drained[0], AllocAccount::with_balance(U256::from(10))),
            (drained[1], AllocAccount::with_balance(U256::from(5))),
        ]));
        apply_dao_fork(&mut state, &drained, refund);
        assert_eq!(state.balance(refund), U256::from(15));
        assert_eq!(state.balance(drained[0]), U256::ZERO);
        assert!(state.exists(drained[1]));
    }
}
