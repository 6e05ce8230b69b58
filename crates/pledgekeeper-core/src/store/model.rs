//! Durable store data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Default `type` of an offline donation when the payload does not name one.
pub const DEFAULT_DONATION_TYPE: &str = "one_time";

/// Replay status of an offline donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    /// Captured, waiting for a sync cycle.
    PendingOnline,
    /// Accepted by the processing endpoint.
    Processed,
    /// Rejected by the processing endpoint as invalid; not retried.
    Failed,
}

impl DonationStatus {
    /// Returns the stored name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingOnline => "pending_online",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Returns true if a record may move from `self` to `next`.
    ///
    /// Allowed: `pending_online → processed`, `pending_online → failed`,
    /// and the manual retry `failed → pending_online`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingOnline, Self::Processed | Self::Failed)
                | (Self::Failed, Self::PendingOnline)
        )
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_online" => Ok(Self::PendingOnline),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Config(format!("unknown donation status {other:?}"))),
        }
    }
}

/// A donation the user began while offline, before any form was submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationIntent {
    /// Client-generated unique id.
    pub id: String,
    /// URL of the navigation that started the donation.
    pub source_url: String,
    /// Preset amount, if one was chosen.
    pub amount: Option<f64>,
    /// Whether a recurring donation was chosen.
    pub recurring: bool,
    /// When the intent was captured.
    pub created_at: DateTime<Utc>,
}

/// Fields of an intent about to be recorded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewDonationIntent {
    /// URL of the navigation that started the donation.
    pub source_url: String,
    /// Preset amount, if one was chosen.
    pub amount: Option<f64>,
    /// Whether a recurring donation was chosen.
    pub recurring: bool,
}

/// A donation form submitted while offline, awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineDonationRecord {
    /// Auto-sequenced store id.
    pub id: i64,
    /// Client-generated id; the replay idempotency key.
    pub client_id: String,
    /// Donation amount, if the payload carried a readable one.
    pub amount: Option<f64>,
    /// Donation type (`one_time`, `monthly`, ...).
    #[serde(rename = "type")]
    pub donation_type: String,
    /// Donor email, if given.
    pub donor_email: Option<String>,
    /// Raw submitted body.
    pub payload: String,
    /// Replay status.
    pub status: DonationStatus,
    /// Replay attempts so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the submission was captured.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

/// Fields of an offline donation about to be captured.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewOfflineDonation {
    /// Donation amount.
    pub amount: Option<f64>,
    /// Donation type.
    pub donation_type: String,
    /// Donor email.
    pub donor_email: Option<String>,
    /// Raw submitted body.
    pub payload: String,
}

impl NewOfflineDonation {
    /// Builds a capture from a submitted body.
    ///
    /// Parsing is best effort: an unreadable body still yields a capture
    /// holding the raw payload, so that nothing the donor sent is lost.
    #[must_use]
    pub fn from_payload(body: &[u8]) -> Self {
        let payload = String::from_utf8_lossy(body).into_owned();
        let parsed: Option<Value> = serde_json::from_slice(body).ok();

        let field = |name: &str| parsed.as_ref().and_then(|v| v.get(name));

        let amount = field("amount").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        let donation_type = field("type")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DONATION_TYPE)
            .to_string();
        let donor_email = field("donorEmail")
            .or_else(|| field("email"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            amount,
            donation_type,
            donor_email,
            payload,
        }
    }
}

/// Number of offline donations per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// Records waiting for replay.
    pub pending_online: u64,
    /// Records accepted by the server.
    pub processed: u64,
    /// Records rejected by the server.
    pub failed: u64,
}

impl StatusCounts {
    /// Total number of records.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending_online + self.processed + self.failed
    }
}
