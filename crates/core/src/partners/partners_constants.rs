/// Message returned when a requested promo-code limit is missing or not positive.
pub const INVALID_LIMIT_MESSAGE: &str = "Limit must be greater than 0";

/// Smallest promo-code limit a partner may be given.
pub const MIN_PROMO_CODE_LIMIT: i32 = 1;
