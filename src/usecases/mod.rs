pub mod accounts;
pub mod entitlements;
pub mod gateway;
pub mod trials;
pub mod verification_codes;
