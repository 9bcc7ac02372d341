//! MigrationService: the handle the HTTP layer holds.
//!
//! Owns the provider sessions built at startup and hands them by reference
//! to the listing and transfer operations. Cloning is cheap; every clone
//! shares the same sessions and shutdown token.

use super::{
    listing,
    transfer::{self, TransferLimits},
};
use crate::{
    errors::MigrationResult,
    models::{
        descriptor::ObjectDescriptor,
        transfer::{TransferOutcome, TransferRequest},
    },
    providers::{Provider, session::Sessions},
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct MigrationService {
    sessions: Arc<Sessions>,
    limits: TransferLimits,
}

impl MigrationService {
    pub fn new(sessions: Sessions, transfer_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            sessions: Arc::new(sessions),
            limits: TransferLimits {
                deadline: transfer_timeout,
                cancel,
            },
        }
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// List the configured source folder (single page).
    pub async fn list_source(&self) -> MigrationResult<Vec<ObjectDescriptor>> {
        let drive = self.sessions.source.get()?;
        listing::list(Provider::Hierarchical(drive)).await
    }

    /// List the destination container, creating it first if needed.
    pub async fn list_destination(&self) -> MigrationResult<Vec<ObjectDescriptor>> {
        let blob = self.sessions.destination.get()?;
        listing::list(Provider::Flat(blob)).await
    }

    pub async fn transfer(&self, request: TransferRequest) -> TransferOutcome {
        transfer::run(&self.sessions, request, &self.limits).await
    }
}
