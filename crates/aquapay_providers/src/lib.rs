// --- File: crates/aquapay_providers/src/lib.rs ---
//! Payment provider adapters.
//!
//! One module per provider, each translating the generic
//! [`aquapay_common::PaymentRequest`] into that provider's wire protocol
//! and the provider's confirmation payloads back into generic
//! [`aquapay_common::TransactionOutcome`]s. Adapters are stateless; all
//! transaction state lives in the checkout ledger.

pub mod mach;
pub mod mercadopago;
pub mod paypal;
pub mod registry;
pub mod webpay;

pub use mach::MachWallet;
pub use mercadopago::MercadoPagoGateway;
pub use paypal::PaypalWallet;
pub use registry::build_registry;
pub use webpay::WebpayGateway;

use aquapay_common::{ProviderError, ProviderKind};

/// Read a provider credential from the environment.
///
/// Secrets are deliberately not part of the config tree; a missing secret
/// is a deployment defect surfaced as a config-class error.
pub(crate) fn require_env(
    provider: ProviderKind,
    name: &'static str,
) -> Result<String, ProviderError> {
    std::env::var(name).map_err(|_| ProviderError::MissingCredentials { provider, name })
}
