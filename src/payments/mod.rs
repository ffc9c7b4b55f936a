
// Payment gateway client and the checkout/completion operations. The
// gateway hosts the card form itself; this side only creates the payment
// request, hands the browser the redirect URL, and settles the order when
// the gateway calls back.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::PaymentsConfig;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{AccountTier, NewOrder, Order, User};
use crate::database::sqlite::queries::{OrderQueries, UserQueries};
use uuid::Uuid;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Client for the hosted payment gateway's server-side API.
#[derive(Debug, Clone)]
pub struct PaymentClient {
    base_url: String,
    partner_id: String,
    partner_key: String,
    auth_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

/// A created checkout: where to send the browser, and which order to
/// settle afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub url: String,
    pub order_num: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PayRequestResponse {
    next_redirect_pc_url: String,
}

impl PaymentClient {
    #[inline]
    pub fn new(config: &PaymentsConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            partner_id: config.partner_id.clone(),
            partner_key: config.partner_key.clone(),
            auth_key: config.auth_key.clone(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Obtain a short-lived access token from the gateway.
    fn request_token(&self) -> Result<String> {
        let body = json!({
            "cst_id": self.partner_id,
            "custKey": self.partner_key,
        });

        let request_json =
            serde_json::to_string(&body).context("Failed to serialize token request")?;
        let url = format!("{}/gpay/oauth/1.0/token", self.base_url);
        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to request gateway token")?;

        let token: TokenResponse = serde_json::from_str(&response_text)
            .context("Failed to parse gateway token response")?;
        Ok(token.access_token)
    }

    /// Create a payment request and return the gateway redirect URL.
    #[inline]
    pub fn create_payment_request(
        &self,
        config: &PaymentsConfig,
        order_num: &str,
    ) -> Result<String> {
        let access_token = self.request_token()?;
        debug!("Creating payment request for order {order_num}");

        let body = json!({
            "cst_id": self.partner_id,
            "custKey": self.partner_key,
            "AuthKey": self.auth_key,
            "pay_type": "card",
            "currency": config.currency,
            "product": config.product,
            "price": config.price,
            "order_num": order_num,
            "return_url": config.return_url(),
        });

        let request_json =
            serde_json::to_string(&body).context("Failed to serialize payment request")?;
        let url = format!("{}/gpay/payrequest", self.base_url);
        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .header("Authorization", &access_token)
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to create payment request")?;

        let payment: PayRequestResponse = serde_json::from_str(&response_text)
            .context("Failed to parse payment request response")?;
        Ok(payment.next_redirect_pc_url)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Gateway error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                return Err(anyhow::anyhow!("Gateway error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => return Err(anyhow::anyhow!("Non-retryable error: {}", error)),
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        error!("All retry attempts failed for gateway request");
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

/// Millisecond-timestamp order number, matching the gateway's expected
/// `order_<unix-millis>` shape.
#[inline]
pub fn new_order_num() -> String {
    format!("order_{}", chrono::Utc::now().timestamp_millis())
}

/// Start a checkout: record a pending order, then ask the gateway for the
/// hosted payment page URL.
#[inline]
pub async fn start_checkout(
    database: &Database,
    client: &PaymentClient,
    config: &PaymentsConfig,
    user_id: &str,
) -> Result<Checkout> {
    let order_num = new_order_num();
    OrderQueries::create(
        database.pool(),
        &NewOrder {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            order_num: order_num.clone(),
            product: config.product.clone(),
            amount: config.price as i64,
            currency: config.currency.clone(),
        },
    )
    .await
    .context("Failed to record pending order")?;

    let url = client.create_payment_request(config, &order_num)?;

    info!("Checkout started for user {user_id} (order {order_num})");
    Ok(Checkout { url, order_num })
}

/// Settle a completed payment: flip the pending order to paid and upgrade
/// the user's tier. `None` when the order is missing, already paid, or
/// belongs to someone else.
#[inline]
pub async fn complete_payment(
    database: &Database,
    user_id: &str,
    order_num: &str,
) -> Result<Option<(Order, User)>> {
    let Some(order) = OrderQueries::mark_paid_owned(database.pool(), order_num, user_id).await?
    else {
        warn!("Payment completion rejected for order {order_num} (user {user_id})");
        return Ok(None);
    };

    let user = UserQueries::set_tier(database.pool(), user_id, AccountTier::Pro)
        .await
        .context("Failed to upgrade user tier")?;

    info!("Order {order_num} paid, user {user_id} upgraded to {}", user.tier);
    Ok(Some((order, user)))
}
