pub mod ledger_keys;
pub mod plan_models;
pub mod rate_limit_scopes;
pub mod request_types;
pub mod stores;
pub mod subscription_event_types;
pub mod trial_statuses;
pub mod verification_purposes;
