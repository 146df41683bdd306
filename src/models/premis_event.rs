//! PREMIS provenance events written back to the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generic_file::{ALG_SHA256, GenericFile};

pub const EVENT_FIXITY_CHECK: &str = "fixity check";

const FIXITY_AGENT: &str = "https://docs.rs/sha2";
const FIXITY_OBJECT: &str = "Rust sha2 crate (SHA-256)";
const FIXITY_DETAIL: &str = "Fixity check against registered hash";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    Failed,
}

/// An immutable record of an action taken against a preserved file.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PremisEvent {
    pub identifier: Uuid,
    pub event_type: String,
    pub date_time: DateTime<Utc>,
    pub detail: String,
    pub outcome: EventOutcome,
    /// `<algorithm>:<digest>` of the freshly computed digest.
    pub outcome_detail: String,
    pub outcome_information: String,
    pub object: String,
    pub agent: String,
    pub generic_file_id: i64,
    pub generic_file_identifier: String,
    pub institution_id: i64,
    pub intellectual_object_id: i64,
    pub intellectual_object_identifier: String,
}

impl PremisEvent {
    /// Build the fixity-check event for `gf` read from `url`.
    pub fn fixity_check(gf: &GenericFile, url: &str, expected: &str, actual: &str) -> Self {
        let (outcome, outcome_information) = if expected == actual {
            (
                EventOutcome::Success,
                format!("Fixity matches at {}: {}", url, actual),
            )
        } else {
            (
                EventOutcome::Failed,
                format!(
                    "Fixity did not match at {}. Expected {}, got {}",
                    url, expected, actual
                ),
            )
        };

        Self {
            identifier: Uuid::new_v4(),
            event_type: EVENT_FIXITY_CHECK.into(),
            date_time: Utc::now(),
            detail: FIXITY_DETAIL.into(),
            outcome,
            outcome_detail: format!("{}:{}", ALG_SHA256, actual),
            outcome_information,
            object: FIXITY_OBJECT.into(),
            agent: FIXITY_AGENT.into(),
            generic_file_id: gf.id,
            generic_file_identifier: gf.identifier.clone(),
            institution_id: gf.institution_id,
            intellectual_object_id: gf.intellectual_object_id,
            intellectual_object_identifier: gf.intellectual_object_identifier().unwrap_or_default(),
        }
    }
}
