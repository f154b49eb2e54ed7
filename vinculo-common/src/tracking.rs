//! Analytics event allow-list
//!
//! Tracking is fire-and-forget: anything that fails validation is dropped without an
//! error so analytics problems never reach the visitor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::access::ProductCode;

/// Accepted event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    QuizStarted,
    QuizCompleted,
    PaywallViewed,
    CheckoutStarted,
    PurchaseCompleted,
    ReportViewed,
    LeadCaptured,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::QuizStarted => "quiz_started",
            EventName::QuizCompleted => "quiz_completed",
            EventName::PaywallViewed => "paywall_viewed",
            EventName::CheckoutStarted => "checkout_started",
            EventName::PurchaseCompleted => "purchase_completed",
            EventName::ReportViewed => "report_viewed",
            EventName::LeadCaptured => "lead_captured",
        }
    }

    /// Events that are meaningless without a product code
    pub fn requires_product(&self) -> bool {
        matches!(self, EventName::CheckoutStarted | EventName::PurchaseCompleted)
    }
}

impl FromStr for EventName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiz_started" => Ok(EventName::QuizStarted),
            "quiz_completed" => Ok(EventName::QuizCompleted),
            "paywall_viewed" => Ok(EventName::PaywallViewed),
            "checkout_started" => Ok(EventName::CheckoutStarted),
            "purchase_completed" => Ok(EventName::PurchaseCompleted),
            "report_viewed" => Ok(EventName::ReportViewed),
            "lead_captured" => Ok(EventName::LeadCaptured),
            _ => Err(()),
        }
    }
}

/// Event as posted by the client, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    pub name: Option<String>,
    pub session_id: Option<String>,
    pub product: Option<String>,
    #[serde(default)]
    pub props: Option<Value>,
}

/// Event that passed the allow-list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEvent {
    pub name: EventName,
    pub session_id: String,
    pub product: Option<ProductCode>,
    pub props: Option<Value>,
}

/// Validate a raw event; `None` means drop it
pub fn validate_event(raw: RawEvent) -> Option<TrackedEvent> {
    let name: EventName = raw.name.as_deref()?.trim().parse().ok()?;

    let session_id = raw.session_id.as_deref().map(str::trim).unwrap_or_default();
    if session_id.is_empty() {
        return None;
    }

    let product = match raw.product.as_deref() {
        Some(code) => Some(code.parse::<ProductCode>().ok()?),
        None => None,
    };
    if name.requires_product() && product.is_none() {
        return None;
    }

    Some(TrackedEvent {
        name,
        session_id: session_id.to_string(),
        product,
        props: raw.props.filter(|p| p.is_object()),
    })
}
