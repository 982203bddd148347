//! In-process gateway for tests and local development.

use super::{AdvanceCharge, ChargeSession, GatewayError, PaymentGateway};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Gateway that records every charge and hands back a fake redirect URL.
#[derive(Default)]
pub struct MockGateway {
    charges: Mutex<Vec<AdvanceCharge>>,
    failing: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent charge requests fail with a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Charges requested so far.
    pub fn charges(&self) -> Vec<AdvanceCharge> {
        self.charges
            .lock()
            .map(|charges| charges.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_advance_charge(
        &self,
        charge: &AdvanceCharge,
    ) -> Result<ChargeSession, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Connection(
                "mock gateway unavailable".to_string(),
            ));
        }

        if let Ok(mut charges) = self.charges.lock() {
            charges.push(charge.clone());
        }

        let token = format!("mock-{}", charge.order_id);
        Ok(ChargeSession {
            redirect_url: format!("https://mock-gateway.local/snap/v2/vtweb/{}", token),
            token,
        })
    }

    fn is_configured(&self) -> bool {
        true
    }
}
