//! Bucket store and correlation table of one family
use std::collections::{BTreeMap, HashMap};

use confirm_common::pub_sub::Event;
use confirm_common::{ConfirmationRequest, Error, Fingerprint, Settlement, Validator};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::family::{Family, RequestOf};

/// Current content of every bucket of a family, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "K: Serialize + Ord, P: Serialize",
    deserialize = "K: Deserialize<'de> + Ord, P: Deserialize<'de>"
))]
pub struct QueueSnapshot<K, P> {
    buckets: BTreeMap<K, Vec<ConfirmationRequest<K, P>>>,
}

impl<K, P> Default for QueueSnapshot<K, P> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<K: Ord, P> QueueSnapshot<K, P> {
    /// Pending requests of one type
    pub fn bucket(&self, kind: &K) -> &[ConfirmationRequest<K, P>] {
        self.buckets.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Buckets with at least one pending request
    pub fn buckets(&self) -> impl Iterator<Item = (&K, &[ConfirmationRequest<K, P>])> {
        self.buckets
            .iter()
            .map(|(kind, requests)| (kind, requests.as_slice()))
    }

    /// Find a pending request by id
    pub fn get(&self, id: &str) -> Option<&ConfirmationRequest<K, P>> {
        self.buckets
            .values()
            .flatten()
            .find(|request| request.id == id)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Published on every change of a bucket, carrying its whole new content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEvent<K, P> {
    /// Type of the bucket
    pub kind: K,
    /// Pending requests, in insertion order
    pub requests: Vec<ConfirmationRequest<K, P>>,
}

impl<K, P> Event for BucketEvent<K, P>
where
    K: Clone + Send + Sync + PartialEq,
    P: Clone + Send + Sync + PartialEq,
{
    type Topic = K;

    fn get_topics(&self) -> Vec<Self::Topic> {
        vec![self.kind.clone()]
    }
}

/// Settlement half of a pending request
pub(crate) struct PendingResolution<O> {
    sender: oneshot::Sender<Settlement<O>>,
    validator: Option<Validator<O>>,
}

impl<O> PendingResolution<O> {
    pub(crate) fn new(sender: oneshot::Sender<Settlement<O>>, validator: Option<Validator<O>>) -> Self {
        Self { sender, validator }
    }

    /// Deliver the settlement, returns whether the caller was resolved with a result
    pub(crate) fn settle(self, id: &str, settlement: Settlement<O>) -> bool {
        let resolved = settlement.is_ok();
        if self.sender.send(settlement).is_err() {
            tracing::warn!("Caller of request {} is gone, settlement dropped", id);
        }
        resolved
    }
}

/// A request removed from its bucket while its reply is being decorated.
///
/// The caller's sender stays in the queue until [`Queue::finish`], so a reset in the meantime
/// still rejects it.
pub(crate) struct Claim<F: Family> {
    pub(crate) request: RequestOf<F>,
    pub(crate) validator: Option<Validator<F::Output>>,
}

/// Buckets plus correlation table. Both are only changed together.
pub(crate) struct Queue<F: Family> {
    buckets: BTreeMap<F::Kind, Vec<RequestOf<F>>>,
    correlation: HashMap<String, PendingResolution<F::Output>>,
    in_flight: HashMap<String, PendingResolution<F::Output>>,
}

impl<F: Family> Default for Queue<F> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            correlation: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }
}

impl<F: Family> Queue<F> {
    pub(crate) fn contains_id(&self, id: &str) -> bool {
        self.correlation.contains_key(id) || self.in_flight.contains_key(id)
    }

    pub(crate) fn find_duplicate(
        &self,
        kind: F::Kind,
        url: &str,
        fingerprint: &Fingerprint,
    ) -> Option<&RequestOf<F>> {
        self.buckets
            .get(&kind)?
            .iter()
            .find(|request| request.is_duplicate_of(url, fingerprint))
    }

    pub(crate) fn insert(&mut self, request: RequestOf<F>, resolution: PendingResolution<F::Output>) {
        self.correlation.insert(request.id.clone(), resolution);
        self.buckets.entry(request.kind).or_default().push(request);
    }

    /// Remove a request from its bucket and the correlation table at once, parking its caller
    /// until [`Queue::finish`]
    pub(crate) fn take(&mut self, kind: F::Kind, id: &str) -> Result<Claim<F>, Error> {
        let position = self
            .buckets
            .get(&kind)
            .and_then(|bucket| bucket.iter().position(|request| request.id == id))
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;

        let resolution = self
            .correlation
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;

        let bucket = self
            .buckets
            .get_mut(&kind)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        let request = bucket.remove(position);
        if bucket.is_empty() {
            self.buckets.remove(&kind);
        }

        let PendingResolution { sender, validator } = resolution;
        self.in_flight
            .insert(request.id.clone(), PendingResolution::new(sender, None));

        Ok(Claim { request, validator })
    }

    /// Caller of a claimed request, `None` when a reset already rejected it
    pub(crate) fn finish(&mut self, id: &str) -> Option<PendingResolution<F::Output>> {
        self.in_flight.remove(id)
    }

    /// Empty every bucket, returning every caller still waiting, claimed ones included
    pub(crate) fn drain(&mut self) -> Vec<(String, PendingResolution<F::Output>)> {
        let buckets = std::mem::take(&mut self.buckets);
        let mut callers = Vec::new();

        for request in buckets.into_values().flatten() {
            match self.correlation.remove(&request.id) {
                Some(resolution) => callers.push((request.id, resolution)),
                None => tracing::error!("Request {} had no pending caller", request.id),
            }
        }

        for (id, _) in self.correlation.drain() {
            tracing::error!("Pending caller {} had no queued request", id);
        }

        callers.extend(self.in_flight.drain());
        callers
    }

    pub(crate) fn get(&self, id: &str) -> Option<&RequestOf<F>> {
        self.buckets
            .values()
            .flatten()
            .find(|request| request.id == id)
    }

    pub(crate) fn bucket_len(&self, kind: F::Kind) -> usize {
        self.buckets.get(&kind).map(Vec::len).unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.correlation.len()
    }

    pub(crate) fn bucket_event(&self, kind: F::Kind) -> BucketEvent<F::Kind, F::Payload> {
        BucketEvent {
            kind,
            requests: self.buckets.get(&kind).cloned().unwrap_or_default(),
        }
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot<F::Kind, F::Payload> {
        QueueSnapshot {
            buckets: self.buckets.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use confirm_common::PresentationOptions;

    use super::*;
    use crate::family::{SessionKind, SessionProposal, WalletSession};

    fn request(id: &str, url: &str) -> RequestOf<WalletSession> {
        ConfirmationRequest {
            id: id.to_owned(),
            url: url.to_owned(),
            is_internal: false,
            kind: SessionKind::OpenSession,
            payload: SessionProposal {
                peer: url.to_owned(),
                chains: vec![],
                methods: vec![],
            },
            fingerprint: Fingerprint::constant(),
            options: PresentationOptions::new(),
        }
    }

    fn push(queue: &mut Queue<WalletSession>, id: &str, url: &str) {
        let (sender, _) = oneshot::channel();
        queue.insert(request(id, url), PendingResolution::new(sender, None));
    }

    #[test]
    fn take_removes_from_both_stores() {
        let mut queue = Queue::<WalletSession>::default();
        push(&mut queue, "a", "https://one.example");
        push(&mut queue, "b", "https://two.example");

        let claim = queue.take(SessionKind::OpenSession, "a").unwrap();
        assert_eq!(claim.request.id, "a");
        assert!(queue.contains_id("a"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.bucket_len(SessionKind::OpenSession), 1);

        assert!(matches!(
            queue.take(SessionKind::OpenSession, "a"),
            Err(Error::NotFound(_))
        ));

        assert!(queue.finish("a").is_some());
        assert!(!queue.contains_id("a"));
        assert!(queue.finish("a").is_none());
    }

    #[test]
    fn drain_reaches_claimed_requests() {
        let mut queue = Queue::<WalletSession>::default();
        push(&mut queue, "a", "https://one.example");
        push(&mut queue, "b", "https://two.example");

        let _claim = queue.take(SessionKind::OpenSession, "a").unwrap();

        let mut ids: Vec<_> = queue.drain().into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, ["a", "b"]);
        assert!(queue.finish("a").is_none());
    }

    #[test]
    fn buckets_keep_insertion_order() {
        let mut queue = Queue::<WalletSession>::default();
        for id in ["c", "a", "b"] {
            push(&mut queue, id, id);
        }

        let ids: Vec<_> = queue
            .bucket_event(SessionKind::OpenSession)
            .requests
            .into_iter()
            .map(|request| request.id)
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn duplicate_lookup_matches_origin_and_fingerprint() {
        let mut queue = Queue::<WalletSession>::default();
        push(&mut queue, "a", "https://one.example");

        let constant = Fingerprint::constant();
        assert!(queue
            .find_duplicate(SessionKind::OpenSession, "https://one.example", &constant)
            .is_some());
        assert!(queue
            .find_duplicate(SessionKind::OpenSession, "https://two.example", &constant)
            .is_none());
    }

    #[test]
    fn drain_empties_everything() {
        let mut queue = Queue::<WalletSession>::default();
        push(&mut queue, "a", "https://one.example");
        push(&mut queue, "b", "https://two.example");

        assert_eq!(queue.drain().len(), 2);
        assert_eq!(queue.len(), 0);
        assert!(queue.snapshot().is_empty());
    }
}
