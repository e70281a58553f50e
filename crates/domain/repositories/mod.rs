pub mod entitlements;
pub mod equation_ocr;
pub mod identity;
pub mod llm_gateway;
pub mod notifications;
pub mod rate_limits;
pub mod trials;
pub mod verification_codes;
pub mod vision;
