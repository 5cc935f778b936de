//! Collaborator traits for the payout reconciler
//!
//! The engine never talks to a bank rail or a credential store directly. It is
//! handed implementations of these traits, so the same reconciler runs against
//! a real provider adapter, the scripted replay provider, or a test double.

use crate::types::{
    AccountId, CorrelationId, PayoutInstruction, ProviderAck, ProviderError, ProviderStatus,
};
use async_trait::async_trait;

/// External payout rail
///
/// The correlation id inside every instruction is the idempotency key: the rail
/// must treat a resubmission with a known correlation id as the same payout.
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Submit a payout and return the rail's synchronous acknowledgement
    async fn submit(&self, instruction: &PayoutInstruction) -> Result<ProviderAck, ProviderError>;

    /// Ask the rail for the current state of a submitted payout
    async fn query_status(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<ProviderStatus, ProviderError>;
}

/// Secondary authorization factor check
#[async_trait]
pub trait MpinVerifier: Send + Sync {
    async fn verify(&self, account: AccountId, mpin: &str) -> bool;
}
