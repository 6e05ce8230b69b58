//! Notification data models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Something the user should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A donation form was captured while offline.
    DonationQueued {
        /// Client id of the captured record.
        client_id: String,
        /// Donation amount, if known.
        amount: Option<f64>,
    },
    /// A donation was started while offline and saved for later.
    IntentCaptured {
        /// Intent id.
        intent_id: String,
        /// Preset amount, if one was chosen.
        amount: Option<f64>,
    },
    /// A captured donation was accepted by the server.
    DonationProcessed {
        /// Client id of the record.
        client_id: String,
        /// Donation amount, if known.
        amount: Option<f64>,
    },
    /// A captured donation was rejected by the server.
    DonationRejected {
        /// Client id of the record.
        client_id: String,
        /// Donation amount, if known.
        amount: Option<f64>,
        /// Server-provided reason.
        reason: String,
    },
}

/// The two responses a user can give to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    /// Resume or complete the donation now.
    Complete,
    /// Close the notification.
    Dismiss,
}

impl NotificationAction {
    /// Identifier sent back when the action is chosen.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Dismiss => "dismiss",
        }
    }

    /// Button label shown to the user.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Complete => "Complete now",
            Self::Dismiss => "Dismiss",
        }
    }
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete" => Ok(Self::Complete),
            "dismiss" => Ok(Self::Dismiss),
            other => Err(Error::Notification(format!("unknown action {other:?}"))),
        }
    }
}

/// A notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Replacement tag; showing a notification with the same tag replaces it.
    pub tag: String,
    /// Available actions, always `complete` then `dismiss`.
    pub actions: [NotificationAction; 2],
}

fn describe_amount(amount: Option<f64>) -> String {
    amount.map_or_else(|| "Your donation".to_string(), |a| format!("Your donation of {a:.2}"))
}

impl Notification {
    /// Builds the notification for an outcome.
    #[must_use]
    pub fn for_outcome(outcome: &Outcome) -> Self {
        let (title, body, tag) = match outcome {
            Outcome::DonationQueued { client_id, amount } => (
                "Donation saved offline",
                format!(
                    "{} will be submitted automatically when you're back online.",
                    describe_amount(*amount)
                ),
                format!("donation-{client_id}"),
            ),
            Outcome::IntentCaptured { intent_id, amount } => (
                "Finish your donation later",
                format!(
                    "{} was saved. Complete it once you're connected.",
                    describe_amount(*amount)
                ),
                format!("intent-{intent_id}"),
            ),
            Outcome::DonationProcessed { client_id, amount } => (
                "Donation received",
                format!("{} has been processed. Thank you!", describe_amount(*amount)),
                format!("donation-{client_id}"),
            ),
            Outcome::DonationRejected {
                client_id,
                amount,
                reason,
            } => (
                "Donation could not be processed",
                format!("{} was declined: {reason}", describe_amount(*amount)),
                format!("donation-{client_id}"),
            ),
        };

        Self {
            title: title.to_string(),
            body,
            tag,
            actions: [NotificationAction::Complete, NotificationAction::Dismiss],
        }
    }
}
