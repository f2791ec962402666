//! Chain configuration and the protocol rules derived from it.

use alloy_hardforks::{EthereumHardfork, ForkCondition};
use alloy_primitives::{Address, BlockNumber, BlockTimestamp, ChainId};

use crate::constants::{dao, stateless::DEFAULT_OVERLAY_STRIDE};

/// Ethereum hardforks in activation order. Forks up to and including [`EthereumHardfork::Paris`]
/// activate by block number, later ones by timestamp.
pub const ETHEREUM_HARDFORKS: [EthereumHardfork; 18] = [
    EthereumHardfork::Frontier,
    EthereumHardfork::Homestead,
    EthereumHardfork::Dao,
    EthereumHardfork::Tangerine,
    EthereumHardfork::SpuriousDragon,
    EthereumHardfork::Byzantium,
    EthereumHardfork::Constantinople,
    EthereumHardfork::Petersburg,
    EthereumHardfork::Istanbul,
    EthereumHardfork::MuirGlacier,
    EthereumHardfork::Berlin,
    EthereumHardfork::London,
    EthereumHardfork::ArrowGlacier,
    EthereumHardfork::GrayGlacier,
    EthereumHardfork::Paris,
    EthereumHardfork::Shanghai,
    EthereumHardfork::Cancun,
    EthereumHardfork::Prague,
];

/// Name accepted by [`ChainConfig::from_fork_name`] for the stateless era, i.e. Prague with the
/// new storage format enabled.
pub const STATELESS_FORK_NAME: &str = "Verkle";

/// Error returned for a fork name no preset exists for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fork: {0}")]
pub struct UnknownForkError(pub String);

/// Static configuration of a chain: identity, hardfork schedule and irregular state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Chain id that protected transactions must be signed for.
    pub chain_id: ChainId,
    /// Activation condition of each Ethereum hardfork. Missing forks never activate.
    pub hardforks: Vec<(EthereumHardfork, ForkCondition)>,
    /// Whether the chain takes the DAO irregular state change at the DAO fork block.
    pub dao_fork_support: bool,
    /// Accounts drained into [`ChainConfig::dao_refund_contract`] at the DAO fork block.
    pub dao_drain_accounts: Vec<Address>,
    /// Beneficiary of the DAO irregular state change.
    pub dao_refund_contract: Address,
    /// Activation of the stateless era: new storage format, conversion of the legacy layout,
    /// in-state block history and witness generation.
    pub stateless: ForkCondition,
    /// Number of legacy leaves migrated to the new format at the end of each block.
    pub overlay_stride: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            hardforks: Vec::new(),
            dao_fork_support: false,
            dao_drain_accounts: Vec::new(),
            dao_refund_contract: dao::REFUND_CONTRACT,
            stateless: ForkCondition::Never,
            overlay_stride: DEFAULT_OVERLAY_STRIDE,
        }
    }
}

impl ChainConfig {
    /// Creates a configuration where every fork up to and including `fork` is active from
    /// genesis.
    pub fn for_fork(fork: EthereumHardfork) -> Self {
        let mut config = Self::default();
        for candidate in ETHEREUM_HARDFORKS {
            config.hardforks.push((candidate, genesis_condition(candidate)));
            if candidate == fork {
                break;
            }
        }
        config
    }

    /// Creates a configuration from a fork name as used by test fixtures, e.g. `Cancun`,
    /// `Merge` or `Verkle`. Names are matched case-insensitively.
    ///
    /// Transition names of the form `<From>To<To>At<N>` or `<From>To<To>AtTime<N>` activate
    /// `<From>` from genesis and every later fork up to `<To>` at block or timestamp `N`. A
    /// trailing `k` multiplies `N` by 1000, e.g. `ShanghaiToCancunAtTime15k`. Naming `Dao`,
    /// directly or as a transition target, enables the DAO irregular state change.
    pub fn from_fork_name(name: &str) -> Result<Self, UnknownForkError> {
        if name.eq_ignore_ascii_case(STATELESS_FORK_NAME) {
            let mut config = Self::for_fork(EthereumHardfork::Prague);
            config.stateless = ForkCondition::Timestamp(0);
            return Ok(config);
        }
        if let Some(fork) = parse_hardfork(name) {
            let config = Self::for_fork(fork);
            return Ok(if fork == EthereumHardfork::Dao { config.with_dao_support() } else { config });
        }
        parse_transition(name).ok_or_else(|| UnknownForkError(name.to_string()))
    }

    /// Sets the chain id.
    pub const fn with_chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the activation condition of `fork`, replacing any previous one.
    pub fn with_fork(mut self, fork: EthereumHardfork, condition: ForkCondition) -> Self {
        self.hardforks.retain(|(existing, _)| *existing != fork);
        self.hardforks.push((fork, condition));
        self
    }

    /// Schedules the DAO irregular state change at `block`.
    pub fn with_dao_fork(mut self, block: BlockNumber, drain_accounts: Vec<Address>) -> Self {
        self.dao_fork_support = true;
        self.dao_drain_accounts = drain_accounts;
        self.with_fork(EthereumHardfork::Dao, ForkCondition::Block(block))
    }

    /// Sets the accounts drained at the DAO fork block.
    pub fn with_dao_drain_accounts(mut self, drain_accounts: Vec<Address>) -> Self {
        self.dao_drain_accounts = drain_accounts;
        self
    }

    fn with_dao_support(mut self) -> Self {
        self.dao_fork_support = true;
        self
    }

    /// Sets the activation of the stateless era.
    pub const fn with_stateless(mut self, condition: ForkCondition) -> Self {
        self.stateless = condition;
        self
    }

    /// Sets the number of legacy leaves migrated per block.
    pub const fn with_overlay_stride(mut self, stride: u64) -> Self {
        self.overlay_stride = stride;
        self
    }

    /// Returns the activation condition of `fork`.
    pub fn fork(&self, fork: EthereumHardfork) -> ForkCondition {
        self.hardforks
            .iter()
            .find_map(|(candidate, condition)| (*candidate == fork).then_some(*condition))
            .unwrap_or(ForkCondition::Never)
    }

    /// Returns `true` if `fork` is active for a block with the given number and timestamp.
    pub fn is_fork_active(
        &self,
        fork: EthereumHardfork,
        number: BlockNumber,
        timestamp: BlockTimestamp,
    ) -> bool {
        is_active(self.fork(fork), number, timestamp)
    }

    /// Returns the block number of the DAO fork if the chain takes the irregular state change.
    pub fn dao_fork_block(&self) -> Option<BlockNumber> {
        match self.fork(EthereumHardfork::Dao) {
            ForkCondition::Block(block) if self.dao_fork_support => Some(block),
            _ => None,
        }
    }

    /// Returns the rules active for a block with the given number and timestamp.
    pub fn rules(&self, number: BlockNumber, timestamp: BlockTimestamp) -> Rules {
        let active = |fork| self.is_fork_active(fork, number, timestamp);
        Rules {
            is_homestead: active(EthereumHardfork::Homestead),
            is_eip150: active(EthereumHardfork::Tangerine),
            is_eip158: active(EthereumHardfork::SpuriousDragon),
            is_byzantium: active(EthereumHardfork::Byzantium),
            is_constantinople: active(EthereumHardfork::Constantinople),
            is_petersburg: active(EthereumHardfork::Petersburg),
            is_istanbul: active(EthereumHardfork::Istanbul),
            is_berlin: active(EthereumHardfork::Berlin),
            is_london: active(EthereumHardfork::London),
            is_merge: active(EthereumHardfork::Paris),
            is_shanghai: active(EthereumHardfork::Shanghai),
            is_cancun: active(EthereumHardfork::Cancun),
            is_prague: active(EthereumHardfork::Prague),
            is_stateless: is_active(self.stateless, number, timestamp),
        }
    }
}

/// Snapshot of the protocol rules active for one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    /// EIP-2 and EIP-7: contract-creation intrinsic gas, `DELEGATECALL`.
    pub is_homestead: bool,
    /// EIP-150 gas repricing.
    pub is_eip150: bool,
    /// EIP-155 replay protection and EIP-161 removal of touched empty accounts.
    pub is_eip158: bool,
    /// Status-code receipts instead of intermediate state roots (EIP-658).
    pub is_byzantium: bool,
    /// Constantinople.
    pub is_constantinople: bool,
    /// Petersburg.
    pub is_petersburg: bool,
    /// Calldata repricing (EIP-2028).
    pub is_istanbul: bool,
    /// Access-list transactions (EIP-2930).
    pub is_berlin: bool,
    /// Fee market (EIP-1559) and reduced refunds (EIP-3529).
    pub is_london: bool,
    /// Proof-of-stake: `PREVRANDAO` replaces difficulty.
    pub is_merge: bool,
    /// Withdrawals (EIP-4895) and initcode metering (EIP-3860).
    pub is_shanghai: bool,
    /// Blob transactions (EIP-4844).
    pub is_cancun: bool,
    /// Prague.
    pub is_prague: bool,
    /// New storage format, conversion of the legacy layout and witness generation.
    pub is_stateless: bool,
}

fn is_active(condition: ForkCondition, number: BlockNumber, timestamp: BlockTimestamp) -> bool {
    condition.active_at_block(number) || condition.active_at_timestamp(timestamp)
}

fn genesis_condition(fork: EthereumHardfork) -> ForkCondition {
    match fork {
        EthereumHardfork::Shanghai | EthereumHardfork::Cancun | EthereumHardfork::Prague => {
            ForkCondition::Timestamp(0)
        }
        _ => ForkCondition::Block(0),
    }
}

/// Parses `<From>To<To>At<N>` and `<From>To<To>AtTime<N>`.
fn parse_transition(name: &str) -> Option<ChainConfig> {
    let (from, rest) = name.split_once("To")?;
    let (to, at) = rest.rsplit_once("At")?;
    let (from, to) = (parse_hardfork(from)?, parse_hardfork(to)?);
    let condition = match at.strip_prefix("Time") {
        Some(timestamp) => ForkCondition::Timestamp(parse_activation(timestamp)?),
        None => ForkCondition::Block(parse_activation(at)?),
    };

    let position = |fork| ETHEREUM_HARDFORKS.iter().position(|candidate| *candidate == fork);
    let (start, end) = (position(from)?, position(to)?);
    if end <= start {
        return None;
    }

    let mut config = ChainConfig::for_fork(from);
    for fork in &ETHEREUM_HARDFORKS[start + 1..=end] {
        config = config.with_fork(*fork, condition);
        if *fork == EthereumHardfork::Dao {
            config = config.with_dao_support();
        }
    }
    Some(config)
}

fn parse_activation(value: &str) -> Option<u64> {
    match value.strip_suffix('k') {
        Some(thousands) => thousands.parse::<u64>().ok()?.checked_mul(1000),
        None => value.parse().ok(),
    }
}

fn parse_hardfork(name: &str) -> Option<EthereumHardfork> {
    let fork = match name.to_ascii_lowercase().as_str() {
        "frontier" => EthereumHardfork::Frontier,
        "homestead" => EthereumHardfork::Homestead,
        "dao" => EthereumHardfork::Dao,
        "tangerine" | "tangerinewhistle" | "eip150" => EthereumHardfork::Tangerine,
        "spuriousdragon" | "eip158" => EthereumHardfork::SpuriousDragon,
        "byzantium" => EthereumHardfork::Byzantium,
        "constantinople" => EthereumHardfork::Constantinople,
        "petersburg" | "constantinoplefix" => EthereumHardfork::Petersburg,
        "istanbul" => EthereumHardfork::Istanbul,
        "muirglacier" => EthereumHardfork::MuirGlacier,
        "berlin" => EthereumHardfork::Berlin,
        "london" => EthereumHardfork::London,
        "arrowglacier" => EthereumHardfork::ArrowGlacier,
        "grayglacier" => EthereumHardfork::GrayGlacier,
        "paris" | "merge" => EthereumHardfork::Paris,
        "shanghai" => EthereumHardfork::Shanghai,
        "cancun" => EthereumHardfork::Cancun,
        "prague" => EthereumHardfork::Prague,
        _ => return None,
    };
    Some(fork)
}
