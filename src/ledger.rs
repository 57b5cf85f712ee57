// 5.0 ledger.rs: token transfer facility. fungible mints, balances per holder.
// every engine operation hands its transfers to `execute` as one batch, which
// checks the whole batch against a scratch copy before touching real balances.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::types::{AccountId, CustodyId, MintId};

/// Who can hold tokens: a user wallet or a custody's vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Holder {
    User(AccountId),
    Custody(CustodyId),
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::User(id) => write!(f, "{}", id),
            Holder::Custody(id) => write!(f, "vault:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: {holder} holds {available} of {mint}, needs {requested}")]
    InsufficientFunds {
        holder: Holder,
        mint: MintId,
        available: u64,
        requested: u64,
    },

    #[error("Mint {0} not found")]
    MintNotFound(MintId),

    #[error("Supply overflow on {0}")]
    SupplyOverflow(MintId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    pub decimals: u8,
    pub supply: u64,
}

/// One step of an atomic batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenOp {
    Transfer {
        mint: MintId,
        from: Holder,
        to: Holder,
        amount: u64,
    },
    MintTo {
        mint: MintId,
        to: Holder,
        amount: u64,
    },
    Burn {
        mint: MintId,
        from: Holder,
        amount: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    mints: HashMap<MintId, MintInfo>,
    balances: HashMap<(Holder, MintId), u64>,
    next_mint_id: u32,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self {
            mints: HashMap::new(),
            balances: HashMap::new(),
            next_mint_id: 1,
        }
    }

    pub fn create_mint(&mut self, decimals: u8) -> MintId {
        let id = MintId(self.next_mint_id);
        self.next_mint_id += 1;
        self.mints.insert(id, MintInfo { decimals, supply: 0 });
        id
    }

    pub fn mint_info(&self, mint: MintId) -> Result<MintInfo, LedgerError> {
        self.mints.get(&mint).copied().ok_or(LedgerError::MintNotFound(mint))
    }

    pub fn decimals(&self, mint: MintId) -> Result<u8, LedgerError> {
        Ok(self.mint_info(mint)?.decimals)
    }

    pub fn supply(&self, mint: MintId) -> Result<u64, LedgerError> {
        Ok(self.mint_info(mint)?.supply)
    }

    pub fn balance(&self, holder: Holder, mint: MintId) -> u64 {
        self.balances.get(&(holder, mint)).copied().unwrap_or(0)
    }

    pub fn mint_to(&mut self, mint: MintId, to: Holder, amount: u64) -> Result<(), LedgerError> {
        self.execute(&[TokenOp::MintTo { mint, to, amount }])
    }

    pub fn burn(&mut self, mint: MintId, from: Holder, amount: u64) -> Result<(), LedgerError> {
        self.execute(&[TokenOp::Burn { mint, from, amount }])
    }

    pub fn transfer(&mut self, mint: MintId, from: Holder, to: Holder, amount: u64) -> Result<(), LedgerError> {
        self.execute(&[TokenOp::Transfer { mint, from, to, amount }])
    }

    /// Apply every op or none of them.
    pub fn execute(&mut self, ops: &[TokenOp]) -> Result<(), LedgerError> {
        // only the touched entries are copied
        let mut balances: HashMap<(Holder, MintId), u64> = HashMap::new();
        let mut supplies: HashMap<MintId, u64> = HashMap::new();

        for op in ops {
            match *op {
                TokenOp::Transfer { mint, from, to, amount } => {
                    self.mint_info(mint)?;
                    self.debit(&mut balances, from, mint, amount)?;
                    self.credit(&mut balances, to, mint, amount)?;
                }
                TokenOp::MintTo { mint, to, amount } => {
                    let supply = self.staged_supply(&supplies, mint)?;
                    let supply = supply.checked_add(amount).ok_or(LedgerError::SupplyOverflow(mint))?;
                    supplies.insert(mint, supply);
                    self.credit(&mut balances, to, mint, amount)?;
                }
                TokenOp::Burn { mint, from, amount } => {
                    let supply = self.staged_supply(&supplies, mint)?;
                    self.debit(&mut balances, from, mint, amount)?;
                    // a holder balance never exceeds supply, so this can't underflow
                    supplies.insert(mint, supply.saturating_sub(amount));
                }
            }
        }

        for ((holder, mint), balance) in balances {
            if balance == 0 {
                self.balances.remove(&(holder, mint));
            } else {
                self.balances.insert((holder, mint), balance);
            }
        }
        for (mint, supply) in supplies {
            if let Some(info) = self.mints.get_mut(&mint) {
                info.supply = supply;
            }
        }
        Ok(())
    }

    fn staged_supply(&self, supplies: &HashMap<MintId, u64>, mint: MintId) -> Result<u64, LedgerError> {
        match supplies.get(&mint) {
            Some(supply) => Ok(*supply),
            None => self.supply(mint),
        }
    }

    fn staged_balance(&self, balances: &HashMap<(Holder, MintId), u64>, holder: Holder, mint: MintId) -> u64 {
        balances
            .get(&(holder, mint))
            .copied()
            .unwrap_or_else(|| self.balance(holder, mint))
    }

    fn debit(
        &self,
        balances: &mut HashMap<(Holder, MintId), u64>,
        holder: Holder,
        mint: MintId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let available = self.staged_balance(balances, holder, mint);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                holder,
                mint,
                available,
                requested: amount,
            });
        }
        balances.insert((holder, mint), available - amount);
        Ok(())
    }

    fn credit(
        &self,
        balances: &mut HashMap<(Holder, MintId), u64>,
        holder: Holder,
        mint: MintId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let current = self.staged_balance(balances, holder, mint);
        let updated = current.checked_add(amount).ok_or(LedgerError::SupplyOverflow(mint))?;
        balances.insert((holder, mint), updated);
        Ok(())
    }
}
