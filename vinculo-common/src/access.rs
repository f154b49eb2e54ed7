//! Access decision table for paid reports
//!
//! Pure decision logic only. The store lookup and payment provider calls that feed
//! these types live in the server crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::questions::ProductTier;
use crate::Error;

/// Access a visitor holds, ordered from least to most
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Quick,
    Deep,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Quick => "quick",
            AccessLevel::Deep => "deep",
        }
    }
}

impl From<ProductTier> for AccessLevel {
    fn from(tier: ProductTier) -> Self {
        match tier {
            ProductTier::Quick => AccessLevel::Quick,
            ProductTier::Deep => AccessLevel::Deep,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of a stored access record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Completed => "completed",
        }
    }

    /// Whether this status unlocks content
    pub fn grants_access(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Completed)
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(Error::InvalidInput(format!("Unknown payment status: {}", other))),
        }
    }
}

/// Product code sold through checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCode {
    Quick,
    Deep,
    /// Quick buyers upgrading to the deep report
    Upgrade,
}

impl ProductCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCode::Quick => "quick",
            ProductCode::Deep => "deep",
            ProductCode::Upgrade => "upgrade",
        }
    }

    /// Tier stored once this product is paid; upgrades become deep
    pub fn tier(&self) -> ProductTier {
        match self {
            ProductCode::Quick => ProductTier::Quick,
            ProductCode::Deep | ProductCode::Upgrade => ProductTier::Deep,
        }
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(ProductCode::Quick),
            "deep" => Ok(ProductCode::Deep),
            "upgrade" => Ok(ProductCode::Upgrade),
            other => Err(Error::InvalidInput(format!("Unknown product code: {}", other))),
        }
    }
}

/// What the visitor gets to see for a requested report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    FullReport,
    Paywall,
}

/// Report gating decision table
///
/// | Requested | Stored        | Outcome     |
/// |-----------|---------------|-------------|
/// | deep      | deep          | full report |
/// | deep      | quick / none  | paywall     |
/// | quick     | quick / deep  | full report |
/// | quick     | none          | paywall     |
pub fn gate(requested: ProductTier, stored: AccessLevel) -> GateOutcome {
    if stored >= AccessLevel::from(requested) {
        GateOutcome::FullReport
    } else {
        GateOutcome::Paywall
    }
}

/// Key used to look up stored access
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Payment provider checkout session id
    Session(String),
    /// Normalised buyer email
    Email(String),
}

impl IdentityKey {
    /// Build an email key, or `None` for blank input
    pub fn email(raw: &str) -> Option<Self> {
        let normalised = normalise_email(raw)?;
        Some(IdentityKey::Email(normalised))
    }

    /// Build a session key, or `None` for blank input
    pub fn session(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(IdentityKey::Session(trimmed.to_string()))
        }
    }

    /// Parse a cookie value of the form `session:<id>` or `email:<address>`
    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let (kind, rest) = value.split_once(':')?;
        match kind {
            "session" => Self::session(rest),
            "email" => Self::email(rest),
            _ => None,
        }
    }

    pub fn to_cookie_value(&self) -> String {
        match self {
            IdentityKey::Session(id) => format!("session:{}", id),
            IdentityKey::Email(email) => format!("email:{}", email),
        }
    }
}

/// Trim and lower-case an email; blank or `@`-less input yields `None`
pub fn normalise_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Pick the identity to check
///
/// Explicit request identity beats a cached one; explicit session beats explicit
/// email. No identity means no access.
pub fn resolve_identity(
    explicit_session: Option<&str>,
    explicit_email: Option<&str>,
    cached: Option<IdentityKey>,
) -> Option<IdentityKey> {
    explicit_session
        .and_then(IdentityKey::session)
        .or_else(|| explicit_email.and_then(IdentityKey::email))
        .or(cached)
}

/// Why an access level was produced
///
/// Logged for operators. Visitors see the same paywall for every reason other than
/// `Granted`, so an infrastructure failure looks like "not paid yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessResolution {
    Granted,
    NotPaid,
    NoIdentity,
    LookupFailed,
    TimedOut,
}
