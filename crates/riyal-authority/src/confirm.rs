use std::fmt;

use riyal_core::types::{Address, AuthorityKind};

/// An operation that cannot be undone once the ledger accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrreversibleAction {
    RevokeAuthority {
        mint: Address,
        symbol: String,
        kind: AuthorityKind,
    },
}

impl fmt::Display for IrreversibleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrreversibleAction::RevokeAuthority { mint, symbol, kind } => write!(
                f,
                "permanently revoke the {kind} authority of {symbol} ({})",
                mint.short(8)
            ),
        }
    }
}

/// Asks the operator before an irreversible action is submitted.
pub trait ConfirmIrreversible: Send + Sync {
    fn confirm(&self, action: &IrreversibleAction) -> bool;
}

impl<F> ConfirmIrreversible for F
where
    F: Fn(&IrreversibleAction) -> bool + Send + Sync,
{
    fn confirm(&self, action: &IrreversibleAction) -> bool {
        self(action)
    }
}

/// Pre-approved, e.g. `--yes` on the command line.
pub struct AlwaysConfirm;

impl ConfirmIrreversible for AlwaysConfirm {
    fn confirm(&self, _action: &IrreversibleAction) -> bool {
        true
    }
}
