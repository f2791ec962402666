use std::path::PathBuf;

use alloy_primitives::{Address, U256};
use clap::Parser;
use stf_core::{
    constants::stateless::DEFAULT_OVERLAY_STRIDE, ChainConfig, StateDb, TransitionExecutor,
};
use tracing::info;

use crate::{
    logging::LogArgs,
    t8n::{
        encode_body, load_alloc, load_env, load_from_stdin, load_transactions, load_tree,
        write_json, Result, T8nError, T8nOutput, TransitionInputs, TransitionResults,
    },
};

/// Name of the input and output paths that stand for the standard streams.
const STDIN: &str = "stdin";
const STDOUT: &str = "stdout";

/// Executes a full state transition
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Specifies where output files are placed. Will be created if it does not exist.
    #[arg(long = "output.basedir")]
    pub output_basedir: Option<PathBuf>,

    /// Determines where to put the `alloc` of the post-state.
    /// `stdout` - only into the stdout output
    /// <file> - into the file <file>
    #[arg(long = "output.alloc", default_value = "alloc.json")]
    pub output_alloc: String,

    /// Determines where to put the `result` (stateroot, txroot etc) of the post-state.
    /// `stdout` - only into the stdout output
    /// <file> - into the file <file>
    #[arg(long = "output.result", default_value = "result.json")]
    pub output_result: String,

    /// If set, the RLP of the included transactions (block body) will be written to this file.
    #[arg(long = "output.body")]
    pub output_body: Option<String>,

    /// Determines where to put the leaves of the new storage layout, when it is active.
    #[arg(long = "output.tree", default_value = "tree.json")]
    pub output_tree: String,

    /// File name of where to find the prestate alloc to use.
    #[arg(long = "input.alloc", default_value = STDIN)]
    pub input_alloc: String,

    /// File name of where to find the prestate env to use.
    #[arg(long = "input.env", default_value = STDIN)]
    pub input_env: String,

    /// File name of where to find the transactions to apply. If the file
    /// extension is '.rlp', then the data is interpreted as an RLP list of signed
    /// transactions. The '.rlp' format is identical to the output.body format.
    #[arg(long = "input.txs", default_value = STDIN)]
    pub input_txs: String,

    /// File name of where to find the already converted leaves of the new storage layout.
    #[arg(long = "input.tree")]
    pub input_tree: Option<String>,

    /// Name of ruleset to use, e.g. `London`, `Cancun` or `Verkle`.
    #[arg(long = "state.fork", default_value = "Cancun")]
    pub fork: String,

    /// `ChainID` to use
    #[arg(long = "state.chainid", default_value = "1")]
    pub chain_id: u64,

    /// Mining reward. Set to -1 to disable
    #[arg(long = "state.reward", default_value = "0", allow_negative_numbers = true)]
    pub reward: i64,

    /// Number of legacy leaves converted to the new storage layout per block
    #[arg(long = "state.overlay-stride", default_value_t = DEFAULT_OVERLAY_STRIDE)]
    pub overlay_stride: u64,

    /// Comma separated accounts drained into the refund contract at the DAO fork block.
    /// Only used with a fork that schedules the DAO irregular state change, e.g.
    /// `HomesteadToDaoAt5`.
    #[arg(long = "state.dao-drain", value_delimiter = ',')]
    pub dao_drain: Vec<Address>,

    /// Logging configuration
    #[command(flatten)]
    pub log: LogArgs,
}

impl Cmd {
    /// Execute the state transition in three main steps:
    /// 1. Load inputs (alloc, env, txs)
    /// 2. Run the block transition
    /// 3. Output results
    pub fn run(&self) -> Result<()> {
        let inputs = self.load_inputs()?;
        let results = self.run_transition(inputs)?;
        self.output_results(&results)
    }

    /// Returns the chain configuration selected by the `state.*` flags.
    pub fn chain_config(&self) -> Result<ChainConfig> {
        Ok(ChainConfig::from_fork_name(&self.fork)?
            .with_chain_id(self.chain_id)
            .with_overlay_stride(self.overlay_stride)
            .with_dao_drain_accounts(self.dao_drain.clone()))
    }

    /// Returns the block reward, `None` when disabled with a negative value.
    pub fn block_reward(&self) -> Option<U256> {
        u64::try_from(self.reward).ok().map(U256::from)
    }

    /// Step 1: Load input files (alloc.json, env.json, txs.json) or from stdin
    fn load_inputs(&self) -> Result<TransitionInputs> {
        if self.input_alloc == STDIN || self.input_env == STDIN || self.input_txs == STDIN {
            let mut inputs = load_from_stdin(self.chain_id)?;
            if let Some(path) = &self.input_tree {
                inputs.tree = Some(load_tree(path)?);
            }
            return Ok(inputs);
        }

        Ok(TransitionInputs {
            alloc: load_alloc(&self.input_alloc)?,
            env: load_env(&self.input_env)?,
            txs: load_transactions(&self.input_txs, self.chain_id)?,
            tree: self.input_tree.as_deref().map(load_tree).transpose()?,
        })
    }

    /// Step 2: Execute the block on top of the pre-state
    pub fn run_transition(&self, inputs: TransitionInputs) -> Result<TransitionResults> {
        let mut executor =
            TransitionExecutor::new(self.chain_config()?).with_block_reward(self.block_reward());
        let env = inputs.env.to_block_env()?;

        let mut state = executor.pre_state(&env, inputs.alloc, inputs.tree)?;
        let result = executor.execute(&mut state, &env, &inputs.txs)?;
        info!(
            state_root = %result.state_root,
            included = result.receipts.len(),
            rejected = result.rejected.len(),
            "Executed transition"
        );

        let body = encode_body(&inputs.txs, &result.rejected);
        Ok(TransitionResults {
            alloc: state.dump(),
            tree: state.stem_tree().map(|tree| (**tree).clone()),
            body,
            result,
        })
    }

    /// Step 3: Write output files (result.json, alloc.json, tree.json, body) and print the
    /// combined output
    fn output_results(&self, results: &TransitionResults) -> Result<()> {
        let basedir = self.output_basedir.as_deref();
        if self.output_result != STDOUT {
            write_json(&results.result, &self.output_result, basedir)?;
        }
        if self.output_alloc != STDOUT {
            write_json(&results.alloc, &self.output_alloc, basedir)?;
        }
        if let Some(tree) = &results.tree {
            if self.output_tree != STDOUT {
                write_json(tree, &self.output_tree, basedir)?;
            }
        }
        if let Some(body) = &self.output_body {
            write_json(&results.body, body, basedir)?;
        }

        let output = T8nOutput {
            alloc: results.alloc.clone(),
            result: results.result.clone(),
            tree: results.tree.clone(),
        };
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| T8nError::JsonParse { file: STDOUT.to_string(), source: e })?;
        println!("{json}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cmd {
        Cmd::parse_from(std::iter::once("t8n").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cmd = parse(&[]);
        assert_eq!(cmd.input_alloc, STDIN);
        assert_eq!(cmd.output_result, "result.json");
        assert_eq!(cmd.overlay_stride, DEFAULT_OVERLAY_STRIDE);
        assert_eq!(cmd.block_reward(), Some(U256::ZERO));
    }

    #[test]
    fn test_negative_reward_disables_rewards() {
        assert_eq!(parse(&["--state.reward", "-1"]).block_reward(), None);
        assert_eq!(parse(&["--state.reward", "5"]).block_reward(), Some(U256::from(5)));
    }

    #[test]
    fn test_chain_config() {
        let cmd = parse(&[
            "--state.fork",
            "Verkle",
            "--state.chainid",
            "7",
            "--state.overlay-stride",
            "3",
        ]);
        let chain = cmd.chain_config().unwrap();
        assert_eq!(chain.chain_id, 7);
        assert_eq!(chain.overlay_stride, 3);
        assert!(chain.rules(1, 1).is_stateless);

        assert!(parse(&["--state.fork", "Unknown"]).chain_config().is_err());
    }

    #[test]
    fn test_dao_drain_accounts() {
        let cmd = parse(&[
            "--state.fork",
            "HomesteadToDaoAt5",
            "--state.dao-drain",
            "0x0000000000000000000000000000000000000001,0x0000000000000000000000000000000000000002",
        ]);
        let chain = cmd.chain_config().unwrap();
        assert_eq!(chain.dao_fork_block(), Some(5));
        assert_eq!(
            chain.dao_drain_accounts,
            vec![Address::with_last_byte(1), Address::with_last_byte(2)]
        );
        assert!(parse(&[]).chain_config().unwrap().dao_drain_accounts.is_empty());
    }
}
