pub mod account;
pub mod chat;
pub mod credits;
pub mod ocr;
pub mod subscriptions;
pub mod trial;
