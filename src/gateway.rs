use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::GatewayError;

/// Payment instruction sent to the external processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInstruction {
    pub account_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub account_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    #[serde(default)]
    pub processor_reference: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submits a payment. `deadline` bounds how long the processor may take.
    async fn pay(
        &self,
        instruction: &PaymentInstruction,
        deadline: Duration,
    ) -> Result<PaymentReceipt, GatewayError>;

    /// Asks the processor whether a payment with `reference` went through.
    async fn lookup(&self, reference: &str) -> Result<Option<PaymentReceipt>, GatewayError>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Client for a processor speaking JSON over HTTP.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| GatewayError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so a reference holding `/`, `?` or `#` stays one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn pay(
        &self,
        instruction: &PaymentInstruction,
        deadline: Duration,
    ) -> Result<PaymentReceipt, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(&["payments"])?)
            .timeout(deadline)
            .json(instruction)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout(deadline)
                } else {
                    GatewayError::Transport(err)
                }
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::Declined(format!(
                "unexpected status code: {}",
                response.status()
            )));
        }

        Ok(response.json::<PaymentReceipt>().await?)
    }

    async fn lookup(&self, reference: &str) -> Result<Option<PaymentReceipt>, GatewayError> {
        let response = self
            .client
            .get(self.endpoint(&["payments", reference])?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<PaymentReceipt>().await?)),
            status => Err(GatewayError::Declined(format!(
                "unexpected status code: {status}"
            ))),
        }
    }
}

/// In-process processor that approves every instruction.
///
/// Approved payments are remembered so that `lookup` can answer for them.
#[derive(Default, Clone)]
pub struct SandboxGateway {
    payments: Arc<RwLock<HashMap<String, PaymentReceipt>>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn pay(
        &self,
        instruction: &PaymentInstruction,
        _deadline: Duration,
    ) -> Result<PaymentReceipt, GatewayError> {
        let receipt = PaymentReceipt {
            account_id: instruction.account_id,
            reference: instruction.reference.clone(),
            amount: instruction.amount,
            processor_reference: Some(generate_processor_reference()),
        };
        self.payments
            .write()
            .await
            .insert(receipt.reference.clone(), receipt.clone());
        Ok(receipt)
    }

    async fn lookup(&self, reference: &str) -> Result<Option<PaymentReceipt>, GatewayError> {
        Ok(self.payments.read().await.get(reference).cloned())
    }
}

/// 11 upper-case alphanumeric characters, the shape processors hand back.
pub fn generate_processor_reference() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(11)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}
