//! Runs the t8n command against input files and inspects its outputs.

use std::{fs, path::Path};

use alloy_primitives::{address, Address, Bytes, U256};
use clap::Parser;
use rstest::rstest;
use stf_core::{constants::dao, state::Alloc, test_utils::TestSigner, ExecutionResult};
use stf_t8n::t8n::{Cmd, T8nError, EXIT_CONFIG, EXIT_IO, EXIT_JSON};
use tempfile::TempDir;

const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");
const COINBASE: &str = "0x00000000000000000000000000000000000c0ffe";

struct Fixture {
    dir: TempDir,
    signer: TestSigner,
}

impl Fixture {
    fn new(txs: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let signer = TestSigner::from_seed(1);
        let alloc =
            format!(r#"{{ "{}": {{ "balance": "0xde0b6b3a7640000" }} }}"#, signer.address());
        let env = format!(
            r#"{{
                "currentCoinbase": "{COINBASE}",
                "currentGasLimit": "0x1c9c380",
                "currentNumber": "0x1",
                "currentTimestamp": "0x3e8",
                "currentBaseFee": "0xa",
                "blockHashes": {{ "0": "0x0000000000000000000000000000000000000000000000000000000000000001" }}
            }}"#
        );
        fs::write(dir.path().join("alloc.json"), alloc).unwrap();
        fs::write(dir.path().join("env.json"), env).unwrap();
        fs::write(dir.path().join("txs.json"), txs).unwrap();
        Self { dir, signer }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    fn cmd(&self, txs: &str, extra: &[&str]) -> Cmd {
        let out = self.path("out");
        let mut args = vec![
            "t8n".to_string(),
            "--input.alloc".to_string(),
            self.path("alloc.json"),
            "--input.env".to_string(),
            self.path("env.json"),
            "--input.txs".to_string(),
            self.path(txs),
            "--output.basedir".to_string(),
            out,
            "--state.fork".to_string(),
            "London".to_string(),
        ];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        Cmd::parse_from(args)
    }

    fn result(&self) -> ExecutionResult {
        read_json(&self.dir.path().join("out/result.json"))
    }

    fn alloc(&self) -> Alloc {
        read_json(&self.dir.path().join("out/alloc.json"))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn transfer(nonce: u64) -> String {
    format!(
        r#"{{
            "type": "0x2",
            "chainId": "0x1",
            "nonce": "{nonce:#x}",
            "maxFeePerGas": "0x14",
            "maxPriorityFeePerGas": "0x2",
            "gas": "0x5208",
            "to": "{BOB}",
            "value": "0x3e8",
            "input": "0x",
            "accessList": [],
            "secretKey": "0x0000000000000000000000000000000000000000000000000000000000000001"
        }}"#
    )
}

#[test]
fn test_transfer_from_secret_key() {
    let fixture = Fixture::new(&format!("[{}]", transfer(0)));
    fixture.cmd("txs.json", &[]).run().unwrap();

    let result = fixture.result();
    assert!(result.rejected.is_empty());
    assert_eq!(result.receipts.len(), 1);
    assert!(result.receipts[0].status);
    assert_eq!(result.gas_used, 21_000);

    let alloc = fixture.alloc();
    assert_eq!(alloc[&BOB].balance, U256::from(1000));
    assert_eq!(alloc[&fixture.signer.address()].nonce, 1);
    let coinbase: Address = COINBASE.parse().unwrap();
    assert_eq!(alloc[&coinbase].balance, U256::from(21_000 * 2));
}

#[test]
fn test_invalid_transactions_are_rejected_by_index() {
    let malformed = r#"{ "type": "0x9", "gas": "0x5208" }"#;
    let fixture = Fixture::new(&format!("[{}, {malformed}, {}]", transfer(0), transfer(5)));
    fixture.cmd("txs.json", &[]).run().unwrap();

    let result = fixture.result();
    assert_eq!(result.receipts.len(), 1);
    let rejected: Vec<u64> = result.rejected.iter().map(|tx| tx.index).collect();
    assert_eq!(rejected, vec![1, 2]);
    assert!(result.rejected[1].error.contains("nonce"));
}

#[test]
fn test_body_feeds_back_as_rlp_input() {
    let fixture = Fixture::new(&format!("[{}, {}]", transfer(0), transfer(1)));
    fixture.cmd("txs.json", &["--output.body", "body.rlp"]).run().unwrap();
    let first = fixture.result();

    fs::copy(fixture.dir.path().join("out/body.rlp"), fixture.dir.path().join("txs.rlp")).unwrap();
    let body: Bytes = read_json(&fixture.dir.path().join("txs.rlp"));
    assert!(!body.is_empty());

    fixture.cmd("txs.rlp", &[]).run().unwrap();
    let second = fixture.result();
    assert_eq!(first.state_root, second.state_root);
    assert_eq!(first.tx_root, second.tx_root);
    assert_eq!(second.receipts.len(), 2);
}

#[test]
fn test_reward_flag() {
    let fixture = Fixture::new("[]");
    fixture.cmd("txs.json", &["--state.reward", "2000"]).run().unwrap();
    let coinbase: Address = COINBASE.parse().unwrap();
    assert_eq!(fixture.alloc()[&coinbase].balance, U256::from(2000));

    fixture.cmd("txs.json", &["--state.reward", "-1"]).run().unwrap();
    assert!(!fixture.alloc().contains_key(&coinbase));
}

#[rstest]
#[case::fork_block(5, U256::from(12))]
#[case::before_fork(4, U256::ZERO)]
fn test_dao_drain(#[case] number: u64, #[case] refunded: U256) {
    let drained = [Address::with_last_byte(0xd1), Address::with_last_byte(0xd2)];
    let fixture = Fixture::new("[]");
    let alloc = format!(
        r#"{{ "{}": {{ "balance": "0x5" }}, "{}": {{ "balance": "0x7" }} }}"#,
        drained[0], drained[1]
    );
    let env = format!(
        r#"{{ "currentCoinbase": "{COINBASE}", "currentGasLimit": "0x1c9c380", "currentNumber": "{number:#x}", "currentTimestamp": "0x3e8" }}"#
    );
    fs::write(fixture.dir.path().join("alloc.json"), alloc).unwrap();
    fs::write(fixture.dir.path().join("env.json"), env).unwrap();

    let drain = format!("{},{}", drained[0], drained[1]);
    let mut cmd = fixture.cmd("txs.json", &["--state.reward", "-1", "--state.dao-drain", &drain]);
    cmd.fork = "HomesteadToDaoAt5".to_string();
    cmd.run().unwrap();

    let alloc = fixture.alloc();
    let balance = |address| alloc.get(&address).map_or(U256::ZERO, |account| account.balance);
    assert_eq!(balance(dao::REFUND_CONTRACT), refunded);
    assert_eq!(balance(drained[0]) + balance(drained[1]), U256::from(12) - refunded);
}

#[rstest]
#[case::unknown_fork(Some("Atlantis"), None, EXIT_CONFIG)]
#[case::missing_tree(None, Some("/nonexistent/tree.json"), EXIT_IO)]
fn test_exit_codes(#[case] fork: Option<&str>, #[case] tree: Option<&str>, #[case] code: u8) {
    let fixture = Fixture::new("[]");
    let mut cmd = fixture.cmd("txs.json", &[]);
    if let Some(fork) = fork {
        cmd.fork = fork.to_string();
    }
    cmd.input_tree = tree.map(str::to_string);

    let err = cmd.run().unwrap_err();
    assert_eq!(err.exit_code(), code);
}

#[test]
fn test_malformed_env_json() {
    let fixture = Fixture::new("[]");
    fs::write(fixture.dir.path().join("env.json"), "{ \"currentCoinbase\": 1 }").unwrap();
    let err = fixture.cmd("txs.json", &[]).run().unwrap_err();
    assert!(matches!(err, T8nError::JsonParse { .. }));
    assert_eq!(err.exit_code(), EXIT_JSON);
}
