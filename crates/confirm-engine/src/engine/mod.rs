//! Confirmation engine of one family
//!
//! The engine owns the bucket store and the correlation table of a family. Every change to them
//! happens under one lock that is never held across an `.await`, so the duplicate scan and the
//! insert of a new request can not interleave with another enqueue.
use std::fmt;
use std::sync::Arc;

use confirm_common::parking_lot::Mutex;
use confirm_common::pub_sub::{ActiveSubscription, Pubsub};
use confirm_common::{
    CompletionReport, ConfirmationReply, ConfirmationRequest, ConfirmationResult, Error,
    KeyringGate, PresentationOptions, SettingsProvider, Settlement, Validator,
};
use tokio::sync::oneshot;

use crate::family::{ConfirmationKind, Family, RequestOf};

mod pending;
mod queue;
mod subscription;

pub use self::pending::PendingConfirmation;
pub use self::queue::{BucketEvent, QueueSnapshot};
pub use self::subscription::QueueSpec;
use self::queue::{PendingResolution, Queue};
use self::subscription::BucketSubscription;

/// Origin used by requests raised by the wallet itself
pub const DEFAULT_INTERNAL_ORIGIN: &str = "wallet://internal";

/// Collaborators shared by every engine
#[derive(Clone)]
pub struct EngineContext {
    keyring: Arc<dyn KeyringGate>,
    settings: Arc<dyn SettingsProvider>,
    internal_origin: String,
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("internal_origin", &self.internal_origin)
            .finish()
    }
}

impl EngineContext {
    /// Create a new context with the default internal origin
    pub fn new(keyring: Arc<dyn KeyringGate>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            keyring,
            settings,
            internal_origin: DEFAULT_INTERNAL_ORIGIN.to_owned(),
        }
    }

    /// Set the origin of the wallet's own requests
    pub fn with_internal_origin(mut self, internal_origin: impl Into<String>) -> Self {
        self.internal_origin = internal_origin.into();
        self
    }

    /// Keyring gate
    pub fn keyring(&self) -> &dyn KeyringGate {
        self.keyring.as_ref()
    }

    /// Settings provider
    pub fn settings(&self) -> &dyn SettingsProvider {
        self.settings.as_ref()
    }

    /// Origin of the wallet's own requests
    pub fn internal_origin(&self) -> &str {
        &self.internal_origin
    }

    /// Whether a request from `url` was raised by the wallet itself
    pub fn is_internal(&self, url: &str) -> bool {
        url.is_empty() || url.starts_with(&self.internal_origin)
    }
}

/// Confirmation engine of the family `F`
pub struct ConfirmationEngine<F: Family> {
    family: F,
    context: EngineContext,
    queue: Mutex<Queue<F>>,
    pubsub: Pubsub<QueueSpec<F>>,
}

impl<F: Family + fmt::Debug> fmt::Debug for ConfirmationEngine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationEngine")
            .field("family", &self.family)
            .field("pending", &self.len())
            .field("subscribers", &self.pubsub.active_subscribers())
            .finish()
    }
}

impl<F: Family> ConfirmationEngine<F> {
    /// Create an engine with an empty queue
    pub fn new(family: F, context: EngineContext) -> Self {
        Self {
            family,
            context,
            queue: Mutex::new(Queue::default()),
            pubsub: Pubsub::new(),
        }
    }

    /// The family served by this engine
    pub fn family(&self) -> &F {
        &self.family
    }

    /// Shared collaborators
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Queue a request and return the future the caller waits on.
    ///
    /// Duplicates, by id or by origin and fingerprint, are refused before anything is queued.
    /// Types requiring authentication lock the keyring afterwards when the wallet is set to always
    /// require the password; if that fails the request is withdrawn and the error returned.
    #[tracing::instrument(skip_all, fields(family = %self.family.name(), kind = %kind))]
    pub async fn add_confirmation(
        &self,
        id: impl Into<String>,
        url: impl Into<String>,
        kind: F::Kind,
        payload: F::Payload,
        options: PresentationOptions,
        validator: Option<Validator<F::Output>>,
    ) -> Result<PendingConfirmation<F::Output>, Error> {
        let pending = self.enqueue(id.into(), url.into(), kind, payload, options, validator)?;

        if self.family.requires_authentication(kind) {
            if let Err(err) = self.require_authentication().await {
                tracing::error!(
                    "Could not lock keyring for request {}: {}",
                    pending.id(),
                    err
                );
                self.withdraw(kind, pending.id());
                return Err(err);
            }
        }

        Ok(pending)
    }

    /// Fingerprint, duplicate scan, insert and publication, all under the queue lock
    fn enqueue(
        &self,
        id: String,
        url: String,
        kind: F::Kind,
        payload: F::Payload,
        options: PresentationOptions,
        validator: Option<Validator<F::Output>>,
    ) -> Result<PendingConfirmation<F::Output>, Error> {
        let fingerprint = self.family.fingerprint_policy().fingerprint(&kind, &payload)?;
        let is_internal = self.context.is_internal(&url);

        let mut queue = self.queue.lock();

        if queue.contains_id(&id) {
            tracing::warn!("Request id {} is already pending", id);
            return Err(Error::DuplicateId(id));
        }

        if let Some(existing) = queue.find_duplicate(kind, &url, &fingerprint) {
            tracing::warn!(
                "Rejecting {} from {}, request {} is already pending",
                kind,
                url,
                existing.id
            );
            return Err(Error::DuplicateRequest {
                kind: kind.to_string(),
                url,
            });
        }

        let (sender, receiver) = oneshot::channel();
        let request = ConfirmationRequest {
            id: id.clone(),
            url,
            is_internal,
            kind,
            payload,
            fingerprint,
            options,
        };

        queue.insert(request, PendingResolution::new(sender, validator));
        self.pubsub.publish_now(queue.bucket_event(kind));

        tracing::debug!("Queued {} request {}", kind, id);

        Ok(PendingConfirmation::new(id, receiver))
    }

    async fn require_authentication(&self) -> Result<(), Error> {
        if self.context.settings().is_always_require_password().await? {
            self.context.keyring().lock().await?;
        }
        Ok(())
    }

    fn withdraw(&self, kind: F::Kind, id: &str) {
        let mut queue = self.queue.lock();
        if queue.take(kind, id).is_ok() {
            queue.finish(id);
            self.pubsub.publish_now(queue.bucket_event(kind));
        }
    }

    /// Settle a batch of replies from the approval UI.
    ///
    /// Every reply is handled on its own: a missing id does not stop the rest of the batch, the
    /// first [`Error::NotFound`] is returned once the whole batch was processed. Declines,
    /// decoration and validation failures reject the original caller and are counted in the
    /// report.
    #[tracing::instrument(skip_all, fields(family = %self.family.name()))]
    pub async fn complete_confirmation<I>(&self, replies: I) -> Result<CompletionReport, Error>
    where
        I: IntoIterator<Item = (F::Kind, ConfirmationReply<F::Output>)>,
    {
        let replies: Vec<_> = replies.into_iter().collect();
        let mut report = CompletionReport::default();
        let mut failure = None;

        for (kind, reply) in replies {
            match self.complete_one(kind, reply).await {
                Ok(true) => report.resolved += 1,
                Ok(false) => report.rejected += 1,
                Err(err) => {
                    tracing::error!("Unable to complete {} request: {}", kind, err);
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    async fn complete_one(
        &self,
        kind: F::Kind,
        reply: ConfirmationReply<F::Output>,
    ) -> Result<bool, Error> {
        let claim = {
            let mut queue = self.queue.lock();
            let claim = queue.take(kind, &reply.id)?;
            self.pubsub.publish_now(queue.bucket_event(kind));
            claim
        };

        let id = &claim.request.id;
        let settlement = self
            .settle(&claim.request, claim.validator.as_ref(), reply)
            .await;

        let Some(resolution) = self.queue.lock().finish(id) else {
            tracing::debug!("Request {} was reset while being completed, result dropped", id);
            return Ok(false);
        };

        match &settlement {
            Ok(_) => tracing::debug!("Resolved {} request {}", kind, id),
            Err(err) => tracing::debug!("Rejected {} request {}: {}", kind, id, err),
        }

        Ok(resolution.settle(id, settlement))
    }

    /// Decorate, then validate, the reply of the user
    async fn settle(
        &self,
        request: &RequestOf<F>,
        validator: Option<&Validator<F::Output>>,
        reply: ConfirmationReply<F::Output>,
    ) -> Settlement<F::Output> {
        if !reply.is_approved {
            return Err(Error::UserRejected);
        }

        let payload = self
            .family
            .decorate(request, reply.payload, &self.context)
            .await
            .map_err(|err| match err {
                Error::MissingPayload(_) => err,
                err => Error::Decoration(Box::new(err)),
            })?;

        let result = ConfirmationResult {
            id: request.id.clone(),
            payload,
        };

        if let Some(validator) = validator {
            validator(&result).map_err(Error::ValidationFailed)?;
        }

        Ok(result)
    }

    /// Drop every pending request, rejecting its caller with [`Error::WalletReset`].
    ///
    /// Requests whose reply is still being decorated are rejected too; their result is dropped
    /// once decoration ends. Returns the number of rejected callers.
    #[tracing::instrument(skip_all, fields(family = %self.family.name()))]
    pub fn reset_wallet(&self) -> usize {
        let callers = {
            let mut queue = self.queue.lock();
            let callers = queue.drain();
            for kind in <F::Kind as ConfirmationKind>::ALL {
                self.pubsub.publish_now(queue.bucket_event(*kind));
            }
            callers
        };

        let rejected = callers.len();
        for (id, resolution) in callers {
            resolution.settle(&id, Err(Error::WalletReset));
        }

        if rejected > 0 {
            tracing::debug!("Rejected {} pending requests on reset", rejected);
        }

        rejected
    }

    /// Observe buckets, all of them when `kinds` is empty.
    ///
    /// The current content of each bucket is delivered first, then its new content after every
    /// change.
    pub fn subscribe(
        &self,
        kinds: Vec<F::Kind>,
    ) -> Result<ActiveSubscription<QueueSpec<F>>, Error> {
        let mut kinds = if kinds.is_empty() {
            <F::Kind as ConfirmationKind>::ALL.to_vec()
        } else {
            kinds
        };
        kinds.sort();
        kinds.dedup();

        let queue = self.queue.lock();
        let backfill = kinds.iter().map(|kind| queue.bucket_event(*kind)).collect();
        let subscription = self
            .pubsub
            .subscribe(BucketSubscription::new(kinds), backfill)?;
        drop(queue);

        Ok(subscription)
    }

    /// Content of every bucket
    pub fn snapshot(&self) -> QueueSnapshot<F::Kind, F::Payload> {
        self.queue.lock().snapshot()
    }

    /// A pending request
    pub fn get(&self, id: &str) -> Option<RequestOf<F>> {
        self.queue.lock().get(id).cloned()
    }

    /// Number of pending requests of one type
    pub fn bucket_len(&self, kind: F::Kind) -> usize {
        self.queue.lock().bucket_len(kind)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use confirm_common::FingerprintPolicy;
    use confirm_fake::{FakeKeyring, FakeSigner, SignGate, StaticSettings};

    use super::*;
    use crate::family::{
        AccountSigning, AuthorizeKind, AuthorizeRequest, AuthorizeResponse, SignRequest,
        SigningKind, SiteAuthorization, TransactionBroadcast, TransactionKind, TransactionRequest,
    };

    const DAPP: &str = "https://dapp.example";

    fn context(keyring: Arc<FakeKeyring>, always_require_password: bool) -> EngineContext {
        EngineContext::new(keyring, Arc::new(StaticSettings::new(always_require_password)))
    }

    fn signing_engine(always_require_password: bool) -> (ConfirmationEngine<AccountSigning>, Arc<FakeKeyring>) {
        let keyring = Arc::new(FakeKeyring::unlocked());
        let engine = ConfirmationEngine::new(
            AccountSigning::new(Arc::new(FakeSigner::random())),
            context(keyring.clone(), always_require_password),
        );
        (engine, keyring)
    }

    fn gated_signing_engine() -> (ConfirmationEngine<AccountSigning>, Arc<SignGate>) {
        let (signer, gate) = FakeSigner::gated();
        let engine = ConfirmationEngine::new(
            AccountSigning::new(Arc::new(signer)),
            context(Arc::new(FakeKeyring::unlocked()), false),
        );
        (engine, gate)
    }

    fn authorize_engine() -> ConfirmationEngine<SiteAuthorization> {
        ConfirmationEngine::new(
            SiteAuthorization,
            context(Arc::new(FakeKeyring::unlocked()), false),
        )
    }

    fn sign_request(message: &str) -> SignRequest {
        SignRequest {
            address: "acct-1".to_owned(),
            payload: message.to_owned(),
        }
    }

    fn connect(origin: &str) -> AuthorizeRequest {
        AuthorizeRequest {
            origin: origin.to_owned(),
            account_types: vec!["evm".to_owned()],
        }
    }

    #[tokio::test]
    async fn add_then_complete_resolves_once() {
        let engine = authorize_engine();
        let pending = engine
            .add_confirmation(
                "r1",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(engine.bucket_len(AuthorizeKind::ConnectSite), 1);
        assert!(!engine.get("r1").unwrap().is_internal);

        let response = AuthorizeResponse {
            accounts: vec!["acct-1".to_owned()],
        };
        let report = engine
            .complete_confirmation([(
                AuthorizeKind::ConnectSite,
                ConfirmationReply::approve("r1", response.clone()),
            )])
            .await
            .unwrap();
        assert_eq!(report.resolved, 1);

        let result = pending.await.unwrap();
        assert_eq!(result.id, "r1");
        assert_eq!(result.payload, response);
        assert!(engine.is_empty());

        let again = engine
            .complete_confirmation([(
                AuthorizeKind::ConnectSite,
                ConfirmationReply::approve("r1", response),
            )])
            .await;
        assert!(matches!(again, Err(Error::NotFound(id)) if id == "r1"));
    }

    #[tokio::test]
    async fn duplicate_request_is_refused() {
        let engine = authorize_engine();
        let _first = engine
            .add_confirmation(
                "r1",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        let second = engine
            .add_confirmation(
                "r2",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await;
        assert!(matches!(second, Err(Error::DuplicateRequest { .. })));

        let other_origin = engine
            .add_confirmation(
                "r3",
                "https://other.example",
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await;
        assert!(other_origin.is_ok());

        let reused_id = engine
            .add_confirmation(
                "r1",
                "https://third.example",
                AuthorizeKind::ConnectSite,
                connect("https://third.example"),
                PresentationOptions::new(),
                None,
            )
            .await;
        assert!(matches!(reused_id, Err(Error::DuplicateId(_))));
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn constant_fingerprint_allows_one_request_per_origin() {
        let keyring = Arc::new(FakeKeyring::unlocked());
        let engine = ConfirmationEngine::new(
            AccountSigning::new(Arc::new(FakeSigner::random()))
                .with_fingerprint_policy(FingerprintPolicy::Constant),
            context(keyring, false),
        );

        let _first = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("hello"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();
        let second = engine
            .add_confirmation(
                "s2",
                DAPP,
                SigningKind::Sign,
                sign_request("something else"),
                PresentationOptions::new(),
                None,
            )
            .await;
        assert!(second.unwrap_err().is_duplicate());
    }

    #[tokio::test]
    async fn always_require_password_locks_on_enqueue() {
        let (engine, keyring) = signing_engine(true);
        assert!(!keyring.is_locked_now());

        let _pending = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("hello"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();
        assert!(keyring.is_locked_now());
        assert_eq!(keyring.lock_count(), 1);
    }

    #[tokio::test]
    async fn failed_lock_withdraws_the_request() {
        let keyring = Arc::new(FakeKeyring::unlocked());
        keyring.fail_lock(true);
        let engine = ConfirmationEngine::new(
            AccountSigning::new(Arc::new(FakeSigner::random())),
            context(keyring, true),
        );

        let result = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("hello"),
                PresentationOptions::new(),
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::Keyring(_))));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_signed_by_the_backend() {
        let (engine, keyring) = signing_engine(true);
        let pending = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("0xdeadbeef"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        engine
            .complete_confirmation([(SigningKind::Sign, ConfirmationReply::compute("s1"))])
            .await
            .unwrap();

        let signature = pending.await.unwrap().payload;
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 2 + 128);
        assert_eq!(keyring.unlocked_addresses(), vec!["acct-1".to_owned()]);
        assert!(keyring.is_locked_now());
    }

    #[tokio::test]
    async fn validator_sees_decorated_result_and_request_is_consumed() {
        let keyring = Arc::new(FakeKeyring::unlocked());
        let engine = ConfirmationEngine::new(
            TransactionBroadcast::new(Arc::new(FakeSigner::random())),
            context(keyring, false),
        );
        let validator: Validator<String> = Box::new(|result: &ConfirmationResult<String>| {
            if result.payload.starts_with("0x") {
                Err("signature must not be hex".to_owned())
            } else {
                Ok(())
            }
        });

        let pending = engine
            .add_confirmation(
                "t1",
                DAPP,
                TransactionKind::SendTransaction,
                TransactionRequest {
                    chain: "eip155:1".to_owned(),
                    from: "acct-1".to_owned(),
                    to: "acct-2".to_owned(),
                    value: "1000".to_owned(),
                    data: None,
                },
                PresentationOptions::new(),
                Some(validator),
            )
            .await
            .unwrap();

        let report = engine
            .complete_confirmation([(
                TransactionKind::SendTransaction,
                ConfirmationReply::compute("t1"),
            )])
            .await
            .unwrap();
        assert_eq!(report.rejected, 1);
        assert!(matches!(pending.await, Err(Error::ValidationFailed(_))));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn family_without_backend_value_refuses_empty_reply() {
        let engine = authorize_engine();
        let pending = engine
            .add_confirmation(
                "r1",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        engine
            .complete_confirmation([(AuthorizeKind::ConnectSite, ConfirmationReply::compute("r1"))])
            .await
            .unwrap();

        assert!(matches!(pending.await, Err(Error::MissingPayload(_))));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn signer_failure_is_a_decoration_error() {
        let keyring = Arc::new(FakeKeyring::unlocked());
        let engine = ConfirmationEngine::new(
            AccountSigning::new(Arc::new(FakeSigner::failing())),
            context(keyring, false),
        );
        let pending = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::SignTransaction,
                sign_request("0x00"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        engine
            .complete_confirmation([(SigningKind::SignTransaction, ConfirmationReply::compute("s1"))])
            .await
            .unwrap();

        match pending.await {
            Err(Error::Decoration(inner)) => assert!(matches!(*inner, Error::Signer(_))),
            other => panic!("unexpected settlement {other:?}"),
        }
    }

    #[tokio::test]
    async fn decline_rejects_the_caller() {
        let engine = authorize_engine();
        let pending = engine
            .add_confirmation(
                "r1",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        engine
            .complete_confirmation([(AuthorizeKind::ConnectSite, ConfirmationReply::reject("r1"))])
            .await
            .unwrap();

        assert!(pending.await.unwrap_err().is_user_rejected());
    }

    #[tokio::test]
    async fn unknown_id_does_not_stop_the_batch() {
        let engine = authorize_engine();
        let pending = engine
            .add_confirmation(
                "r1",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        let response = AuthorizeResponse { accounts: vec![] };
        let result = engine
            .complete_confirmation(vec![
                (
                    AuthorizeKind::ConnectSite,
                    ConfirmationReply::approve("missing", response.clone()),
                ),
                (
                    AuthorizeKind::ConnectSite,
                    ConfirmationReply::approve("r1", response),
                ),
            ])
            .await;

        assert!(matches!(result, Err(Error::NotFound(id)) if id == "missing"));
        assert!(pending.await.is_ok());
    }

    #[tokio::test]
    async fn reset_rejects_every_caller() {
        let engine = authorize_engine();
        let mut pending = Vec::new();
        for (id, origin) in [("r1", "https://a.example"), ("r2", "https://b.example")] {
            pending.push(
                engine
                    .add_confirmation(
                        id,
                        origin,
                        AuthorizeKind::ConnectSite,
                        connect(origin),
                        PresentationOptions::new(),
                        None,
                    )
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(engine.reset_wallet(), 2);
        assert!(engine.is_empty());
        for pending in pending {
            assert!(pending.await.unwrap_err().is_reset());
        }
    }

    #[tokio::test]
    async fn subscription_replays_then_follows_the_bucket() {
        let engine = authorize_engine();
        let _pending = engine
            .add_confirmation(
                "r1",
                DAPP,
                AuthorizeKind::ConnectSite,
                connect(DAPP),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        let mut subscription = engine.subscribe(vec![]).unwrap();
        let current = subscription.recv().await.unwrap();
        assert_eq!(current.kind, AuthorizeKind::ConnectSite);
        assert_eq!(current.requests.len(), 1);

        engine.reset_wallet();
        let emptied = subscription.recv().await.unwrap();
        assert!(emptied.requests.is_empty());
    }

    #[tokio::test]
    async fn internal_requests_are_flagged() {
        let engine = authorize_engine();
        let _pending = engine
            .add_confirmation(
                "r1",
                format!("{DEFAULT_INTERNAL_ORIGIN}/settings"),
                AuthorizeKind::ConnectSite,
                connect("wallet"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        assert!(engine.get("r1").unwrap().is_internal);
        assert!(engine.context().is_internal(""));
    }

    #[tokio::test]
    async fn reset_during_decoration_rejects_the_caller() {
        let (engine, gate) = gated_signing_engine();
        let pending = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("hello"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        let (report, rejected) = tokio::join!(
            engine.complete_confirmation([(SigningKind::Sign, ConfirmationReply::compute("s1"))]),
            async {
                gate.entered().await;
                let rejected = engine.reset_wallet();
                gate.release();
                rejected
            }
        );

        assert_eq!(rejected, 1);
        let report = report.unwrap();
        assert_eq!(report.resolved, 0);
        assert_eq!(report.rejected, 1);
        assert!(pending.await.unwrap_err().is_reset());
        assert!(engine.is_empty());
        assert!(!engine.queue.lock().contains_id("s1"));
    }

    #[tokio::test]
    async fn second_completion_during_decoration_is_not_found() {
        let (engine, gate) = gated_signing_engine();
        let pending = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("hello"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            engine.complete_confirmation([(SigningKind::Sign, ConfirmationReply::compute("s1"))]),
            async {
                gate.entered().await;
                let second = engine
                    .complete_confirmation([(SigningKind::Sign, ConfirmationReply::compute("s1"))])
                    .await;
                gate.release();
                second
            }
        );

        assert!(matches!(second, Err(Error::NotFound(id)) if id == "s1"));
        assert_eq!(first.unwrap().resolved, 1);
        assert!(pending.await.unwrap().payload.starts_with("0x"));
    }

    #[tokio::test]
    async fn id_stays_reserved_while_decorating() {
        let (engine, gate) = gated_signing_engine();
        let _pending = engine
            .add_confirmation(
                "s1",
                DAPP,
                SigningKind::Sign,
                sign_request("hello"),
                PresentationOptions::new(),
                None,
            )
            .await
            .unwrap();

        let (_, reused) = tokio::join!(
            engine.complete_confirmation([(SigningKind::Sign, ConfirmationReply::compute("s1"))]),
            async {
                gate.entered().await;
                let reused = engine
                    .add_confirmation(
                        "s1",
                        "https://other.example",
                        SigningKind::Sign,
                        sign_request("other"),
                        PresentationOptions::new(),
                        None,
                    )
                    .await;
                gate.release();
                reused
            }
        );

        assert!(matches!(reused, Err(Error::DuplicateId(_))));
        assert!(engine.is_empty());
    }
}
