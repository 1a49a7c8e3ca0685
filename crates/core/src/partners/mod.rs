//! Partners module - domain models, services, and traits.

mod partners_constants;
mod partners_errors;
mod partners_model;
mod partners_service;
mod partners_traits;



pub use partners_constants::*;
pub use partners_errors::PartnerError;
pub use partners_model::{
    NewPartner, Partner, PartnerPromoCodeLimit, SetPartnerPromoCodeLimitRequest,
};
pub use partners_service::PartnerService;
pub use partners_traits::{PartnerRepositoryTrait, PartnerServiceTrait};
