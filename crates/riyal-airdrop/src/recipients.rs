//! Recipient list parsing.
//!
//! One `address, amount` pair per line. Whitespace also separates the two
//! fields. Blank lines and `#` comments are skipped; every other line either
//! becomes an entry or is rejected on its own with its 1-based line number.

use thiserror::Error;

use riyal_core::instruction::Transfer;
use riyal_core::types::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected `address, amount`")]
    BadFormat,

    #[error("missing amount")]
    MissingAmount,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount has more than {decimals} decimal places")]
    TooPrecise { decimals: u8 },

    #[error("amount must be greater than zero")]
    ZeroAmount,
}

/// A recipient and the base-unit amount owed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientEntry {
    pub address: Address,
    pub amount: Amount,
}

impl From<&RecipientEntry> for Transfer {
    fn from(e: &RecipientEntry) -> Self {
        Transfer {
            to: e.address,
            amount: e.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line_number: usize,
    pub content: String,
    pub reason: LineError,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedRecipients {
    pub entries: Vec<RecipientEntry>,
    pub rejected: Vec<RejectedLine>,
}

impl ParsedRecipients {
    pub fn total(&self) -> u128 {
        self.entries.iter().map(|e| e.amount as u128).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Parse a recipient list for a token with `decimals` places.
pub fn parse_recipients(text: &str, decimals: u8) -> ParsedRecipients {
    let mut out = ParsedRecipients::default();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line, decimals) {
            Ok(entry) => out.entries.push(entry),
            Err(reason) => out.rejected.push(RejectedLine {
                line_number: i + 1,
                content: line.to_string(),
                reason,
            }),
        }
    }
    out
}

fn parse_line(line: &str, decimals: u8) -> Result<RecipientEntry, LineError> {
    let (addr, amount) = match line.split_once(',') {
        Some((a, rest)) => (a.trim(), rest.trim()),
        None => {
            let mut parts = line.split_whitespace();
            let a = parts.next().ok_or(LineError::BadFormat)?;
            let amount = parts.next().unwrap_or("");
            if parts.next().is_some() {
                return Err(LineError::BadFormat);
            }
            (a, amount)
        }
    };
    if amount.is_empty() {
        return Err(LineError::MissingAmount);
    }
    if amount.contains(',') || amount.split_whitespace().count() > 1 {
        return Err(LineError::BadFormat);
    }
    let address = Address::from_b58(addr).map_err(|_| LineError::InvalidAddress(addr.to_string()))?;
    let amount = parse_token_amount(amount, decimals)?;
    Ok(RecipientEntry { address, amount })
}

/// Convert decimal text such as `50.5` into base units for a token with
/// `decimals` places. Trailing fractional zeros do not count as precision.
pub fn parse_token_amount(text: &str, decimals: u8) -> Result<Amount, LineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(LineError::MissingAmount);
    }
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f.trim_end_matches('0')),
        None => (text, ""),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty() && !text.contains('.'))
        || !digits(whole)
        || !digits(frac)
        || text == "."
    {
        return Err(LineError::InvalidAmount(text.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(LineError::TooPrecise { decimals });
    }

    let overflow = || LineError::InvalidAmount(format!("{text} is too large"));
    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(overflow)?;
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().map_err(|_| overflow())?
    };
    let value = whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(overflow)?;
    if value == 0 {
        return Err(LineError::ZeroAmount);
    }
    Ok(value)
}
