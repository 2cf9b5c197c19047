//! Queue observers
use std::marker::PhantomData;
use std::sync::Arc;

use confirm_common::pub_sub::{self, Spec, SubId, SubscriptionRequest};

use super::queue::BucketEvent;
use crate::family::Family;

/// Pubsub settings of the queue of a family
pub struct QueueSpec<F>(PhantomData<fn() -> F>);

impl<F: Family> Spec for QueueSpec<F> {
    type Topic = F::Kind;
    type Event = BucketEvent<F::Kind, F::Payload>;
    type SubscriptionId = SubId;
}

/// Subscription to a set of buckets
pub(crate) struct BucketSubscription<K> {
    name: Arc<SubId>,
    kinds: Vec<K>,
}

impl<K> BucketSubscription<K> {
    pub(crate) fn new(kinds: Vec<K>) -> Self {
        Self {
            name: Arc::new(uuid::Uuid::new_v4().to_string().into()),
            kinds,
        }
    }
}

impl<K: Clone> SubscriptionRequest for BucketSubscription<K> {
    type Topic = K;
    type SubscriptionId = SubId;

    fn try_get_topics(&self) -> Result<Vec<Self::Topic>, pub_sub::Error> {
        Ok(self.kinds.clone())
    }

    fn subscription_name(&self) -> Arc<Self::SubscriptionId> {
        self.name.clone()
    }
}
