pub mod constants;
pub mod error;
pub mod instruction;
pub mod token;
pub mod types;
pub mod wallet;

pub use constants::*;
pub use error::{EncodingError, TreasuryError};
pub use instruction::*;
pub use token::*;
pub use types::*;
pub use wallet::WalletRecord;
