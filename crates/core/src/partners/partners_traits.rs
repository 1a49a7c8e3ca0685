//! Partner repository and service traits.
//!
//! These traits define the contract for partner operations without any
//! database-specific types, allowing for different storage implementations.

use async_trait::async_trait;

use super::partners_model::{
    NewPartner, Partner, PartnerPromoCodeLimit, SetPartnerPromoCodeLimitRequest,
};
use crate::errors::Result;

/// Trait defining the contract for Partner repository operations.
///
/// A partner is loaded and stored together with its promo-code limits.
#[async_trait]
pub trait PartnerRepositoryTrait: Send + Sync {
    /// Retrieves a partner and its limits by ID, `None` if it does not exist.
    fn get_by_id(&self, partner_id: &str) -> Result<Option<Partner>>;

    /// Lists all partners.
    fn list(&self) -> Result<Vec<Partner>>;

    /// Registers a new partner with no limits and no issued codes.
    async fn create(&self, new_partner: NewPartner) -> Result<Partner>;

    /// Persists the partner's state and limits.
    ///
    /// Implementations must reject the write when the stored version differs
    /// from `partner.version`, and return the partner as stored afterwards.
    async fn update(&self, partner: Partner) -> Result<Partner>;
}

/// Trait defining the contract for Partner service operations.
#[async_trait]
pub trait PartnerServiceTrait: Send + Sync {
    /// Lists all partners.
    fn get_partners(&self) -> Result<Vec<Partner>>;

    /// Retrieves a partner by ID.
    fn get_partner(&self, partner_id: &str) -> Result<Partner>;

    /// Retrieves a single limit of a partner.
    fn get_partner_limit(
        &self,
        partner_id: &str,
        limit_id: &str,
    ) -> Result<PartnerPromoCodeLimit>;

    /// Registers a new partner after validating its input.
    async fn create_partner(&self, new_partner: NewPartner) -> Result<Partner>;

    /// Replaces the partner's active promo-code limit and resets its issued-code counter.
    ///
    /// Returns the newly created limit.
    async fn set_partner_promo_code_limit(
        &self,
        partner_id: &str,
        request: SetPartnerPromoCodeLimitRequest,
    ) -> Result<PartnerPromoCodeLimit>;
}
