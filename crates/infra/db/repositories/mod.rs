pub mod entitlements;
pub mod rate_limits;
pub mod trials;
pub mod verification_codes;
