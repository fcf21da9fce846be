// --- File: crates/aquapay_providers/src/registry.rs ---
//! Builds the runtime provider registry from configuration.

use std::sync::Arc;

use aquapay_common::{config_error, AquapayError, ProviderRegistry};
use aquapay_config::AppConfig;
use tracing::info;

use crate::{MachWallet, MercadoPagoGateway, PaypalWallet, WebpayGateway};

/// Construct the registry of enabled provider adapters.
///
/// A `use_*` flag without its matching config section is a deployment
/// defect and fails loudly instead of silently disabling the provider.
pub fn build_registry(config: &AppConfig) -> Result<ProviderRegistry, AquapayError> {
    let mut registry = ProviderRegistry::new();

    if config.use_webpay {
        let webpay = config
            .webpay
            .clone()
            .ok_or_else(|| config_error("use_webpay is set but [webpay] is missing"))?;
        registry.register(Arc::new(WebpayGateway::new(webpay)));
    }
    if config.use_mach {
        let mach = config
            .mach
            .clone()
            .ok_or_else(|| config_error("use_mach is set but [mach] is missing"))?;
        registry.register(Arc::new(MachWallet::new(mach)));
    }
    if config.use_paypal {
        let paypal = config
            .paypal
            .clone()
            .ok_or_else(|| config_error("use_paypal is set but [paypal] is missing"))?;
        registry.register(Arc::new(PaypalWallet::new(paypal)));
    }
    if config.use_mercado_pago {
        let mp = config
            .mercado_pago
            .clone()
            .ok_or_else(|| config_error("use_mercado_pago is set but [mercado_pago] is missing"))?;
        registry.register(Arc::new(MercadoPagoGateway::new(mp)));
    }

    info!(providers = ?registry.enabled_kinds(), "Payment providers enabled");
    Ok(registry)
}
