//! In-memory collaborators for simulation and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use tally_core::traits::{Clock, TokenLedger};
use tally_core::types::{Address, Amount, Timestamp};

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
}

impl TokenBook {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn move_funds(&mut self, from: &Address, to: &Address, amount: Amount) -> bool {
        let have = self.balance(from);
        if have < amount {
            return false;
        }
        self.balances.insert(*from, have - amount);
        let entry = self.balances.entry(*to).or_insert(0);
        *entry = entry.saturating_add(amount);
        true
    }
}

/// A fungible token held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryToken {
    book: Mutex<TokenBook>,
}

impl MemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `to` out of thin air.
    pub fn mint(&self, to: &Address, amount: Amount) {
        let mut book = self.book.lock();
        let entry = book.balances.entry(*to).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Let `spender` pull up to `amount` from `owner`.
    pub fn approve(&self, owner: &Address, spender: &Address, amount: Amount) {
        self.book.lock().allowances.insert((*owner, *spender), amount);
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.book
            .lock()
            .allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }
}

impl TokenLedger for MemoryToken {
    fn transfer(&self, holder: &Address, to: &Address, amount: Amount) -> bool {
        self.book.lock().move_funds(holder, to, amount)
    }

    fn transfer_from(&self, from: &Address, to: &Address, amount: Amount) -> bool {
        let mut book = self.book.lock();
        let key = (*from, *to);
        let allowed = book.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount || !book.move_funds(from, to, amount) {
            return false;
        }
        book.allowances.insert(key, allowed - amount);
        true
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.book.lock().balance(account)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
