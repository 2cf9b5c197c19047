//! Pub-sub producer

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{self, AtomicUsize};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::subscriber::{ActiveSubscription, Subscriber, SubscriptionRequest};
use super::{Error, Event, Spec};

/// Default channel size for subscription buffering
pub const DEFAULT_CHANNEL_SIZE: usize = 10_000;

/// Subscriber Receiver
pub type SubReceiver<S> = mpsc::Receiver<(Arc<<S as Spec>::SubscriptionId>, <S as Spec>::Event)>;

/// Internal Index Tree
pub type TopicTree<T> = Arc<
    RwLock<
        BTreeMap<
            // Index with a subscription unique ID
            (<T as Spec>::Topic, usize),
            Subscriber<T>,
        >,
    >,
>;

/// Manager
pub struct Pubsub<S>
where
    S: Spec + 'static,
{
    listeners_topics: TopicTree<S>,
    unique_subscription_counter: AtomicUsize,
    active_subscribers: Arc<AtomicUsize>,
}

impl<S> fmt::Debug for Pubsub<S>
where
    S: Spec + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pubsub")
            .field("active_subscribers", &self.active_subscribers())
            .finish()
    }
}

impl<S> Default for Pubsub<S>
where
    S: Spec + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Pubsub<S>
where
    S: Spec + 'static,
{
    /// Create a new instance
    pub fn new() -> Self {
        Self {
            listeners_topics: Default::default(),
            unique_subscription_counter: 0.into(),
            active_subscribers: Arc::new(0.into()),
        }
    }

    /// Total number of active subscribers, it is not the number of active topics being subscribed
    pub fn active_subscribers(&self) -> usize {
        self.active_subscribers.load(atomic::Ordering::Relaxed)
    }

    /// Broadcast an event to all listeners right away
    ///
    /// Listeners subscribed to several topics of the event receive it once.
    pub fn publish_now<E>(&self, event: E)
    where
        E: Into<S::Event>,
    {
        let event = event.into();
        let index_storage = self.listeners_topics.read();

        let mut sent = HashSet::new();
        for topic in event.get_topics() {
            for ((subscription_index, unique_id), sender) in
                index_storage.range((topic.clone(), 0)..)
            {
                if subscription_index.cmp(&topic) != Ordering::Equal {
                    break;
                }
                if !sent.insert(*unique_id) {
                    continue;
                }
                sender.send(event.clone());
            }
        }
    }

    /// Subscribe proving custom sender/receiver mpsc
    ///
    /// The `backfill` events are delivered to the new subscriber before any event published
    /// after this call returns.
    pub fn subscribe_with<I>(
        &self,
        request: I,
        sender: &mpsc::Sender<(Arc<I::SubscriptionId>, S::Event)>,
        receiver: Option<SubReceiver<S>>,
        backfill: Vec<S::Event>,
    ) -> Result<ActiveSubscription<S>, Error>
    where
        I: SubscriptionRequest<Topic = S::Topic, SubscriptionId = S::SubscriptionId>,
    {
        let subscribed_to = request.try_get_topics()?;
        if subscribed_to.is_empty() {
            return Err(Error::NoTopics);
        }

        let subscription_name = request.subscription_name();
        let sender = Subscriber::new(subscription_name.clone(), sender);
        let mut index_storage = self.listeners_topics.write();
        let subscription_internal_id = self
            .unique_subscription_counter
            .fetch_add(1, atomic::Ordering::Relaxed);

        self.active_subscribers
            .fetch_add(1, atomic::Ordering::Relaxed);

        for index in subscribed_to.iter() {
            index_storage.insert((index.clone(), subscription_internal_id), sender.clone());
        }

        // still holding the write lock, no live event can overtake the backfill
        for event in backfill {
            sender.send(event);
        }
        drop(index_storage);

        Ok(ActiveSubscription::new(
            subscription_internal_id,
            subscription_name,
            self.active_subscribers.clone(),
            self.listeners_topics.clone(),
            subscribed_to,
            receiver,
        ))
    }

    /// Subscribe
    pub fn subscribe<I>(
        &self,
        request: I,
        backfill: Vec<S::Event>,
    ) -> Result<ActiveSubscription<S>, Error>
    where
        I: SubscriptionRequest<Topic = S::Topic, SubscriptionId = S::SubscriptionId>,
    {
        let (sender, receiver) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
        self.subscribe_with(request, &sender, Some(receiver), backfill)
    }
}
