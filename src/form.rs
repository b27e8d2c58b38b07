//!
//! Form definition model and lifecycle
//! -----------------------------------
//! `FormDefinition` is the persisted record for one ingested definition. The
//! raw XML is the canonical source of truth and never changes after creation;
//! identity (`xml_form_id`, `version`) and the content hash are derived from
//! it once and are likewise immutable. Only `name` and `state` are mutable
//! through the update surface, and soft deletion is an orthogonal
//! `deleted_at` marker rather than a state value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Lifecycle state of a form. `open` is the initial state; `closing` and
/// `closed` forms stop appearing in listings and in the OpenRosa formList.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormState {
    Open,
    Draft,
    Closing,
    Closed,
}

impl FormState {
    /// Parse an externally supplied state value. Anything outside the
    /// enumerated set is rejected; transitions between enumerated states are
    /// otherwise unrestricted through the update surface.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "open" => Ok(FormState::Open),
            "draft" => Ok(FormState::Draft),
            "closing" => Ok(FormState::Closing),
            "closed" => Ok(FormState::Closed),
            other => Err(AppError::invalid_state(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormState::Open => "open",
            FormState::Draft => "draft",
            FormState::Closing => "closing",
            FormState::Closed => "closed",
        }
    }
}

/// One ingested form definition, including soft-deleted history rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    /// Storage row id, assigned at insert.
    pub id: i64,
    pub xml_form_id: String,
    /// Blank is a valid, distinct version value.
    pub version: String,
    pub name: String,
    /// Lowercase hex digest of the raw definition bytes.
    pub hash: String,
    pub state: FormState,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Raw definition text, verbatim as uploaded.
    pub xml: String,
}

impl FormDefinition {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Visibility rule for listings and the OpenRosa formList: not deleted,
    /// and neither closing nor closed.
    pub fn is_listable(&self) -> bool {
        !self.is_deleted() && !matches!(self.state, FormState::Closing | FormState::Closed)
    }
}
