// --- File: crates/aquapay_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}

// --- Checkout policy ---
/// Sliding-window throttling policy. The 5 attempts / 60s defaults come
/// from the storefront's original checkout throttle and are a tunable
/// business decision, not a protocol constant.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct RateLimitPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: i64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        RateLimitPolicy {
            max_attempts: default_max_attempts(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_window_ms() -> i64 {
    60_000
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CheckoutConfig {
    /// Checkout currency; amounts are integers in its minor unit.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Throttle for checkout attempts, keyed by customer id.
    #[serde(default)]
    pub checkout_rate_limit: RateLimitPolicy,
    /// Throttle for confirmation replays, keyed by return token.
    #[serde(default = "default_confirm_rate_limit")]
    pub confirm_rate_limit: RateLimitPolicy,
    /// Age after which an abandoned OPEN/INITIATED transaction may be
    /// swept to EXPIRED (the storefront's original 24h session window).
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            currency: default_currency(),
            checkout_rate_limit: RateLimitPolicy::default(),
            confirm_rate_limit: default_confirm_rate_limit(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_currency() -> String {
    "CLP".to_string()
}
fn default_confirm_rate_limit() -> RateLimitPolicy {
    RateLimitPolicy {
        max_attempts: 10,
        window_ms: 60_000,
    }
}
fn default_stale_after_secs() -> i64 {
    86_400
}

// --- Webpay (bank gateway) Config ---
// Holds non-secret Webpay config. API secret loaded directly from env var:
// WEBPAY_API_KEY_SECRET.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebpayConfig {
    pub commerce_code: String, // Mandatory, doubles as Tbk-Api-Key-Id
    pub base_url: String,      // Mandatory
    pub return_url: String,    // Mandatory
    #[serde(default = "default_webpay_max_amount")]
    pub max_amount: i64,
}

fn default_webpay_max_amount() -> i64 {
    999_999_999
}

// --- Mach (wallet) Config ---
// Client secret loaded directly from env var: MACH_CLIENT_SECRET.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MachConfig {
    pub client_id: String,    // Mandatory
    pub base_url: String,     // Mandatory
    pub return_url: String,   // Mandatory
    pub callback_url: String, // Mandatory
    #[serde(default = "default_wallet_max_amount")]
    pub max_amount: i64,
}

fn default_wallet_max_amount() -> i64 {
    2_000_000
}

// --- PayPal (international wallet) Config ---
// Client secret loaded directly from env var: PAYPAL_CLIENT_SECRET.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaypalConfig {
    pub client_id: String,  // Mandatory
    pub base_url: String,   // Mandatory
    pub return_url: String, // Mandatory
    pub cancel_url: String, // Mandatory
    pub brand_name: Option<String>,
    /// CLP per USD conversion rate used at the single conversion point in
    /// the PayPal adapter (the storefront hardcoded 800).
    #[serde(default = "default_clp_per_usd")]
    pub clp_per_usd: i64,
    #[serde(default = "default_wallet_max_amount")]
    pub max_amount: i64,
}

fn default_clp_per_usd() -> i64 {
    800
}

// --- Mercado Pago (aggregator) Config ---
// Access token loaded directly from env var: MP_ACCESS_TOKEN.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MercadoPagoConfig {
    pub base_url: String,         // Mandatory
    pub success_url: String,      // Mandatory
    pub failure_url: String,      // Mandatory
    pub pending_url: String,      // Mandatory
    pub notification_url: String, // Mandatory
    #[serde(default = "default_wallet_max_amount")]
    pub max_amount: i64,
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub checkout: CheckoutConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_webpay: bool,
    #[serde(default)]
    pub use_mach: bool,
    #[serde(default)]
    pub use_paypal: bool,
    #[serde(default)]
    pub use_mercado_pago: bool,

    // --- Optional Provider Configurations ---
    #[serde(default)]
    pub webpay: Option<WebpayConfig>,
    #[serde(default)]
    pub mach: Option<MachConfig>,
    #[serde(default)]
    pub paypal: Option<PaypalConfig>,
    #[serde(default)]
    pub mercado_pago: Option<MercadoPagoConfig>,
}
