//! In-process collaborators for replay and tests
//!
//! `ScriptedProvider` stands in for the payout rail: it records every
//! instruction and answers with whatever acknowledgement and status it was
//! scripted with. `StaticMpinVerifier` checks MPINs against a fixed table.

use crate::core::traits::{MpinVerifier, PayoutProvider};
use crate::types::{
    AccountId, CorrelationId, PayoutInstruction, ProviderAck, ProviderError, ProviderStatus,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

pub struct ScriptedProvider {
    /// Answer returned by every `submit`
    ack: Mutex<Result<ProviderAck, ProviderError>>,
    /// Answer returned by `query_status` for ids without a scripted status
    query_error: Mutex<Option<ProviderError>>,
    statuses: DashMap<CorrelationId, ProviderStatus>,
    submitted: Mutex<Vec<PayoutInstruction>>,
    submit_count: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(ack: Result<ProviderAck, ProviderError>) -> Self {
        Self {
            ack: Mutex::new(ack),
            query_error: Mutex::new(None),
            statuses: DashMap::new(),
            submitted: Mutex::new(Vec::new()),
            submit_count: AtomicUsize::new(0),
        }
    }

    /// Accept every payout and leave the outcome to a later callback
    pub fn pending() -> Self {
        Self::new(Ok(ProviderAck::Accepted { order_id: None }))
    }

    pub fn set_ack(&self, ack: Result<ProviderAck, ProviderError>) {
        *self.ack.lock().unwrap_or_else(PoisonError::into_inner) = ack;
    }

    /// Make `query_status` fail for every payout without a scripted status
    pub fn set_query_error(&self, error: Option<ProviderError>) {
        *self.query_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    pub fn set_status(&self, correlation_id: CorrelationId, status: ProviderStatus) {
        self.statuses.insert(correlation_id, status);
    }

    pub fn submissions(&self) -> Vec<PayoutInstruction> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    fn was_submitted(&self, correlation_id: CorrelationId) -> bool {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|instruction| instruction.correlation_id == correlation_id)
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::pending()
    }
}

#[async_trait]
impl PayoutProvider for ScriptedProvider {
    async fn submit(&self, instruction: &PayoutInstruction) -> Result<ProviderAck, ProviderError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instruction.clone());
        self.ack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn query_status(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<ProviderStatus, ProviderError> {
        if let Some(status) = self.statuses.get(&correlation_id) {
            return Ok(status.clone());
        }
        if let Some(error) = self
            .query_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        if self.was_submitted(correlation_id) {
            Ok(ProviderStatus::Pending)
        } else {
            Ok(ProviderStatus::Unknown)
        }
    }
}

#[derive(Debug, Default)]
pub struct StaticMpinVerifier {
    mpins: DashMap<AccountId, String>,
    accept_any: bool,
}

impl StaticMpinVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A verifier that accepts every MPIN
    pub fn accept_any() -> Self {
        Self {
            mpins: DashMap::new(),
            accept_any: true,
        }
    }

    pub fn with_mpin(self, account: AccountId, mpin: impl Into<String>) -> Self {
        self.set_mpin(account, mpin);
        self
    }

    pub fn set_mpin(&self, account: AccountId, mpin: impl Into<String>) {
        self.mpins.insert(account, mpin.into());
    }
}

#[async_trait]
impl MpinVerifier for StaticMpinVerifier {
    async fn verify(&self, account: AccountId, mpin: &str) -> bool {
        if self.accept_any {
            return true;
        }
        self.mpins
            .get(&account)
            .map(|expected| expected.value() == mpin)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Beneficiary, TransferType};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn instruction() -> PayoutInstruction {
        PayoutInstruction {
            correlation_id: Uuid::new_v4(),
            beneficiary: Beneficiary::default(),
            amount: Decimal::new(100, 0),
            transfer_type: TransferType::Imps,
        }
    }

    #[tokio::test]
    async fn test_scripted_provider_records_and_acks() {
        let provider = ScriptedProvider::pending();
        let sent = instruction();

        let ack = provider.submit(&sent).await.unwrap();

        assert_eq!(ack, ProviderAck::Accepted { order_id: None });
        assert_eq!(provider.submissions(), vec![sent.clone()]);
        assert_eq!(
            provider.query_status(sent.correlation_id).await.unwrap(),
            ProviderStatus::Pending
        );
        assert_eq!(
            provider.query_status(Uuid::new_v4()).await.unwrap(),
            ProviderStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_scripted_provider_errors() {
        let provider = ScriptedProvider::new(Err(ProviderError::Unavailable("down".into())));
        assert!(provider.submit(&instruction()).await.is_err());

        provider.set_query_error(Some(ProviderError::Unavailable("down".into())));
        assert!(provider.query_status(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_static_mpin_verifier() {
        let verifier = StaticMpinVerifier::new().with_mpin(4, "1234");
        assert!(verifier.verify(4, "1234").await);
        assert!(!verifier.verify(4, "0000").await);
        assert!(!verifier.verify(5, "1234").await);
        assert!(StaticMpinVerifier::accept_any().verify(5, "").await);
    }
}
