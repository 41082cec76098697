use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Circuit breaker guarding the CRM API.
pub type CrmCircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Breaker shared by every clone of a `KommoClient`.
///
/// Opens after 5 consecutive failed Kommo calls. While open, calls are
/// rejected without touching the network; the first probe is allowed after
/// 10s, doubling up to 60s while probes keep failing. Calls are never
/// retried: a rejection surfaces as a CRM error and the user resubmits.
pub fn create_crm_circuit_breaker() -> CrmCircuitBreaker {
    let probe_delay = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));
    Config::new()
        .failure_policy(failure_policy::consecutive_failures(5, probe_delay))
        .build()
}
