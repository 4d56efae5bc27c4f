use std::fmt;

use crate::service::RecoveryError;

/// A verified-contact identifier in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Trimmed and lowercased.
    Email(String),
    /// All whitespace removed.
    Phone(String),
}

impl Identifier {
    /// Anything containing `@` is an email; everything else a phone number.
    pub fn parse(raw: &str) -> Result<Self, RecoveryError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RecoveryError::InvalidIdentifier("empty identifier".into()));
        }
        if raw.contains('@') {
            let email = raw.to_lowercase();
            let valid = match email.split_once('@') {
                Some((local, domain)) => {
                    !local.is_empty()
                        && !domain.is_empty()
                        && !domain.contains('@')
                        && !email.chars().any(char::is_whitespace)
                }
                None => false,
            };
            if !valid {
                return Err(RecoveryError::InvalidIdentifier(format!("not an email address: {raw}")));
            }
            return Ok(Identifier::Email(email));
        }

        let phone: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let allowed = |(i, c): (usize, char)| {
            c.is_ascii_digit() || matches!(c, '-' | '(' | ')') || (c == '+' && i == 0)
        };
        if !phone.chars().enumerate().all(allowed) || !phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(RecoveryError::InvalidIdentifier(format!("not a phone number: {raw}")));
        }
        Ok(Identifier::Phone(phone))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Email(s) | Identifier::Phone(s) => s,
        }
    }

    /// `"email"` or `"phone"`, as the verification service expects.
    pub fn kind(&self) -> &'static str {
        match self {
            Identifier::Email(_) => "email",
            Identifier::Phone(_) => "phone",
        }
    }

    pub fn is_email(&self) -> bool {
        matches!(self, Identifier::Email(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
