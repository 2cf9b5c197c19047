//! Request orchestrator
//!
//! One facade over the engine of every family. It routes requests by type, aggregates the pending
//! counts and is the only component deciding about the shared popup and the icon badge.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use confirm_common::pub_sub::ActiveSubscription;
use confirm_common::{
    CompletionReport, ConfirmationReply, Error, FingerprintPolicy, IconUpdater, KeyringGate,
    PopupController, PresentationOptions, SettingsProvider, Signer, Validator,
};
use tokio::sync::Mutex;

use crate::engine::{
    ConfirmationEngine, EngineContext, PendingConfirmation, QueueSnapshot, QueueSpec,
};
use crate::family::{
    AccountSigning, ConfirmationKind, Family, FamilyName, SiteAuthorization,
    TransactionBroadcast, WalletSession,
};

/// Output of the family of kind `K`
type OutputOf<K> = <<K as ConfirmationKind>::Family as Family>::Output;

/// Payload of the family of kind `K`
type PayloadOf<K> = <<K as ConfirmationKind>::Family as Family>::Payload;

/// Access to the engine serving the family `F`
pub trait Route<F: Family> {
    /// Engine of the family
    fn route(&self) -> &ConfirmationEngine<F>;
}

/// Facade over the engines of every family
pub struct RequestOrchestrator {
    signing: ConfirmationEngine<AccountSigning>,
    transaction: ConfirmationEngine<TransactionBroadcast>,
    authorize: ConfirmationEngine<SiteAuthorization>,
    session: ConfirmationEngine<WalletSession>,
    popup: Arc<dyn PopupController>,
    icon: Arc<dyn IconUpdater>,
    /// Whether the approval popup is open, also serializes open, focus and close
    popup_open: Mutex<bool>,
}

impl fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("signing", &self.signing)
            .field("transaction", &self.transaction)
            .field("authorize", &self.authorize)
            .field("session", &self.session)
            .finish()
    }
}

impl Route<AccountSigning> for RequestOrchestrator {
    fn route(&self) -> &ConfirmationEngine<AccountSigning> {
        &self.signing
    }
}

impl Route<TransactionBroadcast> for RequestOrchestrator {
    fn route(&self) -> &ConfirmationEngine<TransactionBroadcast> {
        &self.transaction
    }
}

impl Route<SiteAuthorization> for RequestOrchestrator {
    fn route(&self) -> &ConfirmationEngine<SiteAuthorization> {
        &self.authorize
    }
}

impl Route<WalletSession> for RequestOrchestrator {
    fn route(&self) -> &ConfirmationEngine<WalletSession> {
        &self.session
    }
}

impl RequestOrchestrator {
    /// Start building an orchestrator
    pub fn builder() -> RequestOrchestratorBuilder {
        RequestOrchestratorBuilder::default()
    }

    /// Engine of the family `F`
    pub fn engine<F: Family>(&self) -> &ConfirmationEngine<F>
    where
        Self: Route<F>,
    {
        <Self as Route<F>>::route(self)
    }

    /// Queue a request with the engine owning its type.
    ///
    /// Once queued, an external request opens the approval popup (or focuses the open one) and
    /// the icon badge is refreshed. Failures of the popup or the icon are logged, the request
    /// stays queued.
    #[tracing::instrument(skip_all, fields(kind = %kind))]
    pub async fn add_confirmation<K>(
        &self,
        id: impl Into<String>,
        url: impl Into<String>,
        kind: K,
        payload: PayloadOf<K>,
        options: PresentationOptions,
        validator: Option<Validator<OutputOf<K>>>,
    ) -> Result<PendingConfirmation<OutputOf<K>>, Error>
    where
        K: ConfirmationKind,
        Self: Route<K::Family>,
    {
        let engine = self.engine::<K::Family>();
        let url = url.into();
        let is_internal = engine.context().is_internal(&url);

        let pending = engine
            .add_confirmation(id, url, kind, payload, options, validator)
            .await?;

        if !is_internal {
            self.show_popup().await;
        }
        self.sync_ui().await;

        Ok(pending)
    }

    /// Settle replies with the engine owning their type
    #[tracing::instrument(skip_all)]
    pub async fn complete_confirmation<K, I>(&self, replies: I) -> Result<CompletionReport, Error>
    where
        K: ConfirmationKind,
        I: IntoIterator<Item = (K, ConfirmationReply<OutputOf<K>>)>,
        Self: Route<K::Family>,
    {
        let engine = self.engine::<K::Family>();
        let report = engine.complete_confirmation(replies).await;
        self.sync_ui().await;
        report
    }

    /// Reject every pending request of every family, returns how many were rejected
    #[tracing::instrument(skip_all)]
    pub async fn reset_wallet(&self) -> usize {
        let rejected = self.signing.reset_wallet()
            + self.transaction.reset_wallet()
            + self.authorize.reset_wallet()
            + self.session.reset_wallet();

        tracing::info!("Wallet reset rejected {} pending requests", rejected);
        self.sync_ui().await;

        rejected
    }

    /// Pending requests per family
    pub fn num_requests_by_family(&self) -> BTreeMap<FamilyName, usize> {
        BTreeMap::from([
            (FamilyName::Signing, self.signing.len()),
            (FamilyName::Transaction, self.transaction.len()),
            (FamilyName::Authorize, self.authorize.len()),
            (FamilyName::Session, self.session.len()),
        ])
    }

    /// Pending requests across every family
    pub fn num_all_requests(&self) -> usize {
        self.num_requests_by_family().values().sum()
    }

    /// Content of the queue of the family `F`
    pub fn snapshot<F: Family>(&self) -> QueueSnapshot<F::Kind, F::Payload>
    where
        Self: Route<F>,
    {
        self.engine::<F>().snapshot()
    }

    /// Observe the queue of the family `F`, every bucket when `kinds` is empty
    pub fn subscribe<F: Family>(
        &self,
        kinds: Vec<F::Kind>,
    ) -> Result<ActiveSubscription<QueueSpec<F>>, Error>
    where
        Self: Route<F>,
    {
        self.engine::<F>().subscribe(kinds)
    }

    async fn show_popup(&self) {
        let mut open = self.popup_open.lock().await;

        if *open {
            match self.popup.focus_existing().await {
                Ok(()) => return,
                Err(err) => tracing::warn!("Could not focus popup, opening a new one: {}", err),
            }
        }

        match self.popup.open().await {
            Ok(()) => *open = true,
            Err(err) => {
                tracing::error!("Could not open popup: {}", err);
                *open = false;
            }
        }
    }

    /// Push the aggregate count to the badge, close the popup once nothing is pending
    async fn sync_ui(&self) {
        let pending = self.num_all_requests();
        if let Err(err) = self.icon.update(pending).await {
            tracing::error!("Could not update icon: {}", err);
        }

        if pending > 0 {
            return;
        }

        let mut open = self.popup_open.lock().await;
        // a request may have been queued since the count was read
        if *open && self.num_all_requests() == 0 {
            if let Err(err) = self.popup.close().await {
                tracing::error!("Could not close popup: {}", err);
            }
            *open = false;
        }
    }
}

/// Builder for [`RequestOrchestrator`]
#[derive(Default)]
pub struct RequestOrchestratorBuilder {
    keyring: Option<Arc<dyn KeyringGate>>,
    settings: Option<Arc<dyn SettingsProvider>>,
    popup: Option<Arc<dyn PopupController>>,
    icon: Option<Arc<dyn IconUpdater>>,
    signing_signer: Option<Arc<dyn Signer>>,
    transaction_signer: Option<Arc<dyn Signer>>,
    internal_origin: Option<String>,
    signing_fingerprint: FingerprintPolicy,
}

impl fmt::Debug for RequestOrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOrchestratorBuilder")
            .field("internal_origin", &self.internal_origin)
            .field("signing_fingerprint", &self.signing_fingerprint)
            .finish()
    }
}

impl RequestOrchestratorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyring gate
    pub fn keyring(mut self, keyring: Arc<dyn KeyringGate>) -> Self {
        self.keyring = Some(keyring);
        self
    }

    /// Settings provider
    pub fn settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Popup controller
    pub fn popup(mut self, popup: Arc<dyn PopupController>) -> Self {
        self.popup = Some(popup);
        self
    }

    /// Icon updater
    pub fn icon(mut self, icon: Arc<dyn IconUpdater>) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Signer of the account signing family
    pub fn signing_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signing_signer = Some(signer);
        self
    }

    /// Signer of the transaction family
    pub fn transaction_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.transaction_signer = Some(signer);
        self
    }

    /// Origin of the wallet's own requests
    pub fn internal_origin(mut self, internal_origin: impl Into<String>) -> Self {
        self.internal_origin = Some(internal_origin.into());
        self
    }

    /// Fingerprint policy of the account signing family
    pub fn signing_fingerprint(mut self, policy: FingerprintPolicy) -> Self {
        self.signing_fingerprint = policy;
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<RequestOrchestrator, Error> {
        let keyring = self
            .keyring
            .ok_or(Error::Custom("Keyring required".to_string()))?;
        let settings = self
            .settings
            .ok_or(Error::Custom("Settings required".to_string()))?;
        let popup = self
            .popup
            .ok_or(Error::Custom("Popup controller required".to_string()))?;
        let icon = self
            .icon
            .ok_or(Error::Custom("Icon updater required".to_string()))?;
        let signing_signer = self
            .signing_signer
            .ok_or(Error::Custom("Signing signer required".to_string()))?;
        let transaction_signer = self
            .transaction_signer
            .ok_or(Error::Custom("Transaction signer required".to_string()))?;

        let mut context = EngineContext::new(keyring, settings);
        if let Some(internal_origin) = self.internal_origin {
            context = context.with_internal_origin(internal_origin);
        }

        Ok(RequestOrchestrator {
            signing: ConfirmationEngine::new(
                AccountSigning::new(signing_signer)
                    .with_fingerprint_policy(self.signing_fingerprint),
                context.clone(),
            ),
            transaction: ConfirmationEngine::new(
                TransactionBroadcast::new(transaction_signer),
                context.clone(),
            ),
            authorize: ConfirmationEngine::new(SiteAuthorization, context.clone()),
            session: ConfirmationEngine::new(WalletSession, context),
            popup,
            icon,
            popup_open: Mutex::new(false),
        })
    }
}
