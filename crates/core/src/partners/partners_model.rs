//! Partner domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::partners_constants::MIN_PROMO_CODE_LIMIT;
use super::partners_errors::PartnerError;
use crate::{errors::ValidationError, Error, Result};

/// Domain model representing a partner allowed to issue promo codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub number_issued_promo_codes: i32,
    /// Limits in insertion order, the most recent one last.
    pub limits: Vec<PartnerPromoCodeLimit>,
    /// Optimistic concurrency token, bumped by storage on every update.
    pub version: i32,
}

impl Partner {
    /// Returns the first limit that has not been cancelled.
    pub fn active_limit(&self) -> Option<&PartnerPromoCodeLimit> {
        self.limits.iter().find(|limit| limit.is_active())
    }

    /// Iterates over every limit that has not been cancelled.
    ///
    /// A consistent partner yields at most one item.
    pub fn active_limits(&self) -> impl Iterator<Item = &PartnerPromoCodeLimit> {
        self.limits.iter().filter(|limit| limit.is_active())
    }

    pub fn find_limit(&self, limit_id: &str) -> Option<&PartnerPromoCodeLimit> {
        self.limits.iter().find(|limit| limit.id == limit_id)
    }

    /// Cancels every active limit at `cancelled_at` and returns how many were cancelled.
    pub fn cancel_active_limits(&mut self, cancelled_at: NaiveDateTime) -> usize {
        let mut cancelled = 0;
        for limit in self.limits.iter_mut().filter(|limit| limit.is_active()) {
            limit.cancel_date = Some(cancelled_at);
            cancelled += 1;
        }
        cancelled
    }
}

/// Domain model for a promo-code issuance limit owned by a partner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPromoCodeLimit {
    pub id: String,
    pub partner_id: String,
    pub limit: i32,
    pub create_date: NaiveDateTime,
    /// `None` while the limit is in force.
    pub cancel_date: Option<NaiveDateTime>,
}

impl PartnerPromoCodeLimit {
    /// Creates a fresh, active limit with a generated id.
    pub fn new(partner_id: &str, limit: i32, create_date: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            partner_id: partner_id.to_string(),
            limit,
            create_date,
            cancel_date: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel_date.is_none()
    }
}

/// Input model for registering a new partner.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewPartner {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
}

impl NewPartner {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Partner name cannot be empty".to_string(),
            )));
        }
        if matches!(&self.id, Some(id) if id.trim().is_empty()) {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Partner ID cannot be blank".to_string(),
            )));
        }
        Ok(())
    }
}

/// Request to replace a partner's promo-code limit.
///
/// A missing request body is equivalent to `Default::default()`, i.e. no limit.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetPartnerPromoCodeLimitRequest {
    #[serde(default)]
    pub limit: Option<i32>,
}

impl SetPartnerPromoCodeLimitRequest {
    pub fn new(limit: i32) -> Self {
        Self { limit: Some(limit) }
    }

    /// Returns the requested limit if it is present and positive.
    pub fn validated_limit(&self) -> std::result::Result<i32, PartnerError> {
        match self.limit {
            Some(limit) if limit >= MIN_PROMO_CODE_LIMIT => Ok(limit),
            _ => Err(PartnerError::InvalidLimit),
        }
    }
}
