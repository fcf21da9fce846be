// --- File: crates/aquapay_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error taxonomy shared by all crates
pub mod http; // Shared reqwest client with explicit timeouts
pub mod logging; // Tracing initialization
pub mod models; // Domain data structures
pub mod services; // Payment provider abstraction

// Re-export error types and utilities for easier access
pub use error::{
    conflict, config_error, internal_error, not_found, validation_error, AquapayError,
    HttpStatusCode,
};

// Re-export HTTP utilities for easier access
pub use http::{create_client, HTTP_CLIENT};

// Re-export the provider abstraction
pub use services::{
    BoxFuture, OutcomeStatus, PaymentInitResult, PaymentProvider, ProviderError, ProviderRegistry,
    RefundResult, TransactionOutcome,
};

// Re-export the domain models
pub use models::{mask_account, CartItem, CartSnapshot, Customer, PaymentRequest, ProviderKind};
