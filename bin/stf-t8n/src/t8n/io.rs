use std::{fs, io::Read, path::Path};

use alloy_primitives::{Bytes, ChainId};
use serde::{de::DeserializeOwned, Serialize};
use stf_core::{state::Alloc, BlockTransaction};

use crate::t8n::{
    decode_transactions, output_path, to_block_transactions, Env, Result, StdinInput, T8nError,
    Transaction, TransitionInputs, TreeLeaves,
};

fn read_file(path: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| T8nError::InputLoad { file: path.to_string(), source: e })
}

fn parse_json<T: DeserializeOwned>(content: &str, file: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| T8nError::JsonParse { file: file.to_string(), source: e })
}

fn decode_rlp(body: &Bytes, file: &str) -> Result<Vec<BlockTransaction>> {
    decode_transactions(body).map_err(|e| T8nError::RlpDecode { file: file.to_string(), source: e })
}

/// Load prestate allocation from a JSON file
pub fn load_alloc(path: &str) -> Result<Alloc> {
    parse_json(&read_file(path)?, path)
}

/// Load environment from a JSON file
pub fn load_env(path: &str) -> Result<Env> {
    parse_json(&read_file(path)?, path)
}

/// Load the leaves of the new storage layout from a JSON file
pub fn load_tree(path: &str) -> Result<TreeLeaves> {
    parse_json(&read_file(path)?, path)
}

/// Load transactions from a file.
///
/// A file with the `.rlp` extension holds a hex string with the RLP list of signed
/// transactions, the format written to `output.body`. Any other file holds a JSON list of
/// transactions.
pub fn load_transactions(path: &str, chain_id: ChainId) -> Result<Vec<BlockTransaction>> {
    let content = read_file(path)?;
    if Path::new(path).extension().is_some_and(|ext| ext == "rlp") {
        let body: Bytes = parse_json(&content, path)?;
        return decode_rlp(&body, path);
    }
    let txs: Vec<Transaction> = parse_json(&content, path)?;
    Ok(to_block_transactions(&txs, chain_id))
}

/// Load inputs from stdin in combined JSON format
pub fn load_from_stdin(chain_id: ChainId) -> Result<TransitionInputs> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| T8nError::InputLoad { file: "stdin".to_string(), source: e })?;
    parse_stdin_input(&buffer, chain_id)
}

/// Parses the combined JSON input
pub fn parse_stdin_input(content: &str, chain_id: ChainId) -> Result<TransitionInputs> {
    let input: StdinInput = parse_json(content, "stdin")?;
    let txs = match &input.txs_rlp {
        Some(body) => decode_rlp(body, "stdin")?,
        None => to_block_transactions(&input.txs, chain_id),
    };
    Ok(TransitionInputs { alloc: input.alloc, env: input.env, txs, tree: input.tree })
}

/// Write a value as pretty JSON to `name` under the base directory, creating the directory if
/// needed.
pub fn write_json<T: Serialize>(value: &T, name: &str, basedir: Option<&Path>) -> Result<()> {
    let path = output_path(name, basedir);
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| T8nError::JsonParse { file: path.display().to_string(), source: e })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| T8nError::OutputWrite { file: parent.display().to_string(), source: e })?;
    }
    fs::write(&path, json)
        .map_err(|e| T8nError::OutputWrite { file: path.display().to_string(), source: e })
}
