pub mod catalog;
pub mod chat;
pub mod credits;
pub mod enums;
pub mod identity;
pub mod notifications;
pub mod ocr;
pub mod pricing;
pub mod rate_limits;
pub mod subscription_events;
pub mod trials;
pub mod verification;
