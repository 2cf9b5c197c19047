//! Pubsub Event definition
//!
//! The Pubsub Event defines the Topic struct and how an event can be converted to Topics.

use std::fmt::Debug;
use std::hash::Hash;

/// Pubsub settings
pub trait Spec: Send + Sync {
    /// Topic
    type Topic: Send + Sync + Clone + Eq + Ord + Hash + Debug;

    /// Event
    type Event: Event<Topic = Self::Topic> + Send + Sync;

    /// Subscription Id
    type SubscriptionId: Clone + Default + Eq + Ord + Hash + Send + Sync + Debug;
}

/// Event trait
pub trait Event: Clone + Send + Sync + PartialEq {
    /// Generic Topic
    ///
    /// Sorted in a BTree for in-memory matching
    type Topic;

    /// To topics
    fn get_topics(&self) -> Vec<Self::Topic>;
}
