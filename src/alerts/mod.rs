//! Cloud Monitoring alert policies: model, API client and replacement logic
pub mod alert_manager;
pub mod auth;
pub mod client;
pub mod policy;

pub use alert_manager::{AlertPolicyManager, PolicyOutcome, PolicySettings, ReplaceStrategy};
pub use auth::Credentials;
pub use client::{AlertPolicyService, MonitoringClient, ServiceFuture};
pub use policy::{AlertPolicy, AlertStrategy, Combiner, Condition, LogMatch};
