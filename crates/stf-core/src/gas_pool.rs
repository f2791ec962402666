use core::fmt;

/// Error returned when a pool cannot cover a requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GasPoolError {
    /// Not enough execution gas left in the block.
    #[error("gas limit reached")]
    GasLimitReached,
    /// Not enough blob gas left in the block.
    #[error("blob gas limit reached")]
    BlobGasLimitReached,
}

/// Tracks the execution gas and blob gas still available to the transactions of a block.
///
/// The two counters are independent: blob gas and execution gas have separate per-block limits
/// and neither can be used to pay for the other. The default value is a pool with nothing
/// available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasPool {
    gas: u64,
    blob_gas: u64,
}

impl GasPool {
    /// Creates a pool holding `gas` execution gas and no blob gas.
    pub const fn new(gas: u64) -> Self {
        Self { gas, blob_gas: 0 }
    }

    /// Builder variant of [`GasPool::add_blob_gas`].
    pub fn with_blob_gas(mut self, amount: u64) -> Self {
        self.add_blob_gas(amount);
        self
    }

    /// Makes `amount` execution gas available.
    ///
    /// # Panics
    ///
    /// Panics if the pool would exceed `u64::MAX`. Only a misconfigured block limit can get
    /// here, so this is not a recoverable condition.
    pub fn add_gas(&mut self, amount: u64) -> &mut Self {
        self.gas = self.gas.checked_add(amount).expect("gas pool pushed above uint64");
        self
    }

    /// Deducts `amount` execution gas. The pool is left untouched on failure.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        self.gas = self.gas.checked_sub(amount).ok_or(GasPoolError::GasLimitReached)?;
        Ok(())
    }

    /// Returns the execution gas still available.
    pub const fn gas(&self) -> u64 {
        self.gas
    }

    /// Overrides the available execution gas, used to undo a rejected transaction.
    pub fn set_gas(&mut self, gas: u64) {
        self.gas = gas;
    }

    /// Makes `amount` blob gas available.
    ///
    /// # Panics
    ///
    /// Panics if the pool would exceed `u64::MAX`.
    pub fn add_blob_gas(&mut self, amount: u64) -> &mut Self {
        self.blob_gas = self.blob_gas.checked_add(amount).expect("blob gas pool pushed above uint64");
        self
    }

    /// Deducts `amount` blob gas. The pool is left untouched on failure.
    pub fn sub_blob_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        self.blob_gas =
            self.blob_gas.checked_sub(amount).ok_or(GasPoolError::BlobGasLimitReached)?;
        Ok(())
    }

    /// Returns the blob gas still available.
    pub const fn blob_gas(&self) -> u64 {
        self.blob_gas
    }

    /// Overrides the available blob gas.
    pub fn set_blob_gas(&mut self, blob_gas: u64) {
        self.blob_gas = blob_gas;
    }
}

impl fmt::Display for GasPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gas: {}, blob_gas: {}", self.gas, self.blob_gas)
    }
}
