//! Solar Leasing Lead API Library
//!
//! Backend for the solar leasing marketing site: lead capture,
//! pre-qualification and forwarding of leads to e-mail, the Kommo CRM and
//! WhatsApp.
//!
//! # Modules
//!
//! - `attachment`: Energy-bill upload validation.
//! - `circuit_breaker`: Circuit breaker for CRM calls.
//! - `config`: Configuration management.
//! - `crm_handler`: Rate-limited CRM submission endpoint.
//! - `crm_models`: CRM payloads and lead mapping.
//! - `eligibility`: Lead eligibility evaluator.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `intake`: Form normalization and validation.
//! - `kommo_client`: Kommo CRM client.
//! - `lead_registry`: Duplicate-submission registry.
//! - `models`: Form and response models.
//! - `notifications`: E-mail and WhatsApp message bodies.
//! - `rate_limiter`: Sliding-window rate limiter.
//! - `services`: CEP lookup, e-mail and WhatsApp clients.
//! - `validation`: Field validators.

pub mod attachment;
pub mod circuit_breaker;
pub mod config;
pub mod crm_handler;
pub mod crm_models;
pub mod eligibility;
pub mod errors;
pub mod handlers;
pub mod intake;
pub mod kommo_client;
pub mod lead_registry;
pub mod models;
pub mod notifications;
pub mod rate_limiter;
pub mod services;
pub mod validation;
