//! Property-based tests over the runtime's universal guarantees.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use futures::executor::block_on;
use proptest::collection::vec;
use proptest::prelude::*;

use lattice_rt::correlation::CorrelationManager;
use lattice_rt::directory::LocationCache;
use lattice_rt::mailbox::{EnqueueVerdict, Mailbox, OverflowPolicy};
use lattice_rt::message::{Envelope, Message};
use lattice_rt::util::{Address, SystemClock};
use serde_json::json;

fn tagged_envelope(tag: u64) -> Envelope {
    Envelope::new(Message::new("SEQ", json!({ "tag": tag })))
}

fn tag_of(envelope: &Envelope) -> u64 {
    envelope.message.body()["tag"].as_u64().unwrap_or(u64::MAX)
}

proptest! {
    /// Accepted envelopes come out in the order they were accepted,
    /// regardless of capacity.
    #[test]
    fn mailbox_preserves_fifo_order(
        tags in vec(any::<u64>(), 1..64),
        capacity in 1usize..128,
    ) {
        let mailbox = Mailbox::new(capacity, OverflowPolicy::Fail);
        let mut accepted = Vec::new();
        for tag in &tags {
            let outcome = block_on(mailbox.enqueue(tagged_envelope(*tag)));
            if outcome.verdict == EnqueueVerdict::Enqueued {
                accepted.push(*tag);
            }
        }

        let mut drained = Vec::new();
        while let Some(envelope) = mailbox.try_dequeue() {
            drained.push(tag_of(&envelope));
        }
        prop_assert_eq!(drained, accepted);
    }

    /// The queue never exceeds capacity, whatever the policy.
    #[test]
    fn mailbox_respects_capacity(
        count in 1usize..200,
        capacity in 1usize..32,
        policy_index in 0usize..3,
    ) {
        // Block is exercised separately; it suspends rather than refusing.
        let policy = [
            OverflowPolicy::DropNewest,
            OverflowPolicy::DropOldest,
            OverflowPolicy::Fail,
        ][policy_index];

        let mailbox = Mailbox::new(capacity, policy);
        for tag in 0..count as u64 {
            block_on(mailbox.enqueue(tagged_envelope(tag)));
            prop_assert!(mailbox.size() <= capacity);
        }
    }

    /// DropOldest keeps the newest window; DropNewest keeps the oldest.
    #[test]
    fn overflow_policies_keep_the_right_window(count in 1usize..64, capacity in 1usize..16) {
        let newest = Mailbox::new(capacity, OverflowPolicy::DropOldest);
        let oldest = Mailbox::new(capacity, OverflowPolicy::DropNewest);
        for tag in 0..count as u64 {
            block_on(newest.enqueue(tagged_envelope(tag)));
            block_on(oldest.enqueue(tagged_envelope(tag)));
        }

        let expect_kept = count.min(capacity) as u64;
        if let Some(head) = newest.try_dequeue() {
            prop_assert_eq!(tag_of(&head), count as u64 - expect_kept);
        }
        if let Some(head) = oldest.try_dequeue() {
            prop_assert_eq!(tag_of(&head), 0);
        }
    }

    /// Generated correlation tokens are never reused while pending.
    #[test]
    fn correlation_tokens_are_unique(count in 1usize..500) {
        let manager = CorrelationManager::new(Arc::new(SystemClock));
        let mut futures = Vec::new();
        for _ in 0..count {
            let token = manager.generate_id();
            let future = manager.register(token, Duration::from_secs(60), "t", "GET");
            prop_assert!(future.is_ok(), "a fresh token must register");
            futures.push(future);
        }
        prop_assert_eq!(manager.pending_count(), count);
        manager.clear_all("test over");
    }

    /// The cache never exceeds its bound under arbitrary insert/lookup mixes.
    #[test]
    fn cache_size_stays_bounded(
        operations in vec((0usize..64, prop::bool::ANY), 1..256),
        max_size in 1usize..16,
    ) {
        let cache = LocationCache::new(max_size, Duration::from_secs(300), Arc::new(SystemClock));
        for (key, is_insert) in operations {
            let address = Address::new("n", "t", format!("a-{key}"));
            if is_insert {
                cache.insert(address, "loc");
            } else {
                cache.get_fresh(address.path());
            }
            prop_assert!(cache.len() <= max_size);
        }
    }

    /// Address construction and parsing agree for any valid components.
    #[test]
    fn address_parse_round_trips(
        node in "[a-z][a-z0-9-]{0,8}",
        actor_type in "[a-z][a-z0-9-]{0,8}",
        id in "[a-z0-9][a-z0-9-]{0,12}",
    ) {
        let address = Address::new(&node, &actor_type, &id);
        let parsed = Address::parse(address.path()).expect("canonical paths parse");
        prop_assert_eq!(parsed.node(), node.as_str());
        prop_assert_eq!(parsed.actor_type(), actor_type.as_str());
        prop_assert_eq!(parsed.id(), id.as_str());
        prop_assert_eq!(&parsed, &address);
    }
}
