pub mod credit_usage_history;
pub mod trial_records;
pub mod user_credits;
pub mod verification_codes;
