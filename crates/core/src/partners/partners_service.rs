use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

use super::partners_errors::PartnerError;
use super::partners_model::{
    NewPartner, Partner, PartnerPromoCodeLimit, SetPartnerPromoCodeLimitRequest,
};
use super::partners_traits::{PartnerRepositoryTrait, PartnerServiceTrait};
use crate::errors::Result;

/// Service for managing partners and their promo-code limits.
pub struct PartnerService {
    repository: Arc<dyn PartnerRepositoryTrait>,
}

impl PartnerService {
    /// Creates a new PartnerService instance
    pub fn new(repository: Arc<dyn PartnerRepositoryTrait>) -> Self {
        Self { repository }
    }

    fn require_partner(&self, partner_id: &str) -> Result<Partner> {
        self.repository
            .get_by_id(partner_id)?
            .ok_or_else(|| PartnerError::NotFound(partner_id.to_string()).into())
    }
}

#[async_trait::async_trait]
impl PartnerServiceTrait for PartnerService {
    fn get_partners(&self) -> Result<Vec<Partner>> {
        self.repository.list()
    }

    fn get_partner(&self, partner_id: &str) -> Result<Partner> {
        self.require_partner(partner_id)
    }

    fn get_partner_limit(
        &self,
        partner_id: &str,
        limit_id: &str,
    ) -> Result<PartnerPromoCodeLimit> {
        let partner = self.require_partner(partner_id)?;
        partner
            .find_limit(limit_id)
            .cloned()
            .ok_or_else(|| PartnerError::LimitNotFound(limit_id.to_string()).into())
    }

    async fn create_partner(&self, new_partner: NewPartner) -> Result<Partner> {
        new_partner.validate()?;
        debug!("Creating partner '{}'", new_partner.name);
        self.repository.create(new_partner).await
    }

    /// Checks run in a fixed order (existence, active status, limit value) and
    /// the partner is only touched once all of them pass.
    async fn set_partner_promo_code_limit(
        &self,
        partner_id: &str,
        request: SetPartnerPromoCodeLimitRequest,
    ) -> Result<PartnerPromoCodeLimit> {
        let Some(mut partner) = self.repository.get_by_id(partner_id)? else {
            debug!(
                "Cannot set promo code limit: partner {} not found",
                partner_id
            );
            return Err(PartnerError::NotFound(partner_id.to_string()).into());
        };

        if !partner.is_active {
            debug!(
                "Cannot set promo code limit: partner {} is inactive",
                partner_id
            );
            return Err(PartnerError::Inactive(partner_id.to_string()).into());
        }

        let limit = request.validated_limit().inspect_err(|_| {
            debug!(
                "Rejected promo code limit {:?} for partner {}",
                request.limit, partner_id
            );
        })?;

        let now = Utc::now().naive_utc();
        let cancelled = partner.cancel_active_limits(now);
        if cancelled > 1 {
            warn!(
                "Partner {} had {} active promo code limits; all of them were cancelled",
                partner_id, cancelled
            );
        }

        let new_limit = PartnerPromoCodeLimit::new(&partner.id, limit, now);
        partner.limits.push(new_limit.clone());
        partner.number_issued_promo_codes = 0;

        self.repository.update(partner).await?;

        info!(
            "Set promo code limit {} for partner {} (limit id {})",
            limit, partner_id, new_limit.id
        );
        Ok(new_limit)
    }
}
