//! Database models for partners and their promo-code limits.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use promocode_core::partners::{Partner, PartnerPromoCodeLimit};

/// Database model for partners
#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::partners)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PartnerDB {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub number_issued_promo_codes: i32,
    pub version: i32,
}

/// Database model for promo-code limits.
///
/// `position` keeps the order of the partner's limit list.
#[derive(Queryable, Selectable, Identifiable, Insertable, Associations, Debug, Clone)]
#[diesel(table_name = crate::schema::partner_promo_code_limits)]
#[diesel(belongs_to(PartnerDB, foreign_key = partner_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PartnerPromoCodeLimitDB {
    pub id: String,
    pub partner_id: String,
    pub promo_code_limit: i32,
    pub create_date: NaiveDateTime,
    pub cancel_date: Option<NaiveDateTime>,
    pub position: i32,
}

impl PartnerPromoCodeLimitDB {
    pub fn from_domain(limit: &PartnerPromoCodeLimit, position: i32) -> Self {
        Self {
            id: limit.id.clone(),
            partner_id: limit.partner_id.clone(),
            promo_code_limit: limit.limit,
            create_date: limit.create_date,
            cancel_date: limit.cancel_date,
            position,
        }
    }
}

impl From<PartnerPromoCodeLimitDB> for PartnerPromoCodeLimit {
    fn from(db: PartnerPromoCodeLimitDB) -> Self {
        Self {
            id: db.id,
            partner_id: db.partner_id,
            limit: db.promo_code_limit,
            create_date: db.create_date,
            cancel_date: db.cancel_date,
        }
    }
}

/// Assembles a domain partner from its row and its limits, already ordered by position.
pub fn partner_from_db(partner: PartnerDB, limits: Vec<PartnerPromoCodeLimitDB>) -> Partner {
    Partner {
        id: partner.id,
        name: partner.name,
        is_active: partner.is_active,
        number_issued_promo_codes: partner.number_issued_promo_codes,
        limits: limits.into_iter().map(PartnerPromoCodeLimit::from).collect(),
        version: partner.version,
    }
}
