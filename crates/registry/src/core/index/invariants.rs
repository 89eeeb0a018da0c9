//! Machine-checkable invariant catalog for registry storage and publication.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::test_fixtures::{coords, facade, install, loc, set};
use crate::core::{Capability, GenerationClock, ProjectRegistry, RequiredCapability};

/// Invariant: the reverse index is the exact inverse of the per-location requirement sets.
///
/// Holds after any interleaving of `set_requirements`, `remove_requirements` and
/// destructive dependent lookups.
pub(crate) fn inv_reverse_index_inverse() {
	let registry = ProjectRegistry::new("test");
	let clock = GenerationClock::new();
	let mut copy = registry.open();

	let on_a = RequiredCapability::artifact("g:a", "[1.0,)");
	let on_a_exact = RequiredCapability::artifact("g:a", "[1.0]").resolved_to("1.0");
	let on_b = RequiredCapability::artifact("g:b", "2.0");

	install(&mut copy, &clock, "a", "1.0", &[]);
	install(&mut copy, &clock, "b", "2.0", &[on_a.clone()]);
	install(&mut copy, &clock, "c", "1.0", &[on_a.clone(), on_b.clone()]);
	install(&mut copy, &clock, "d", "1.0", &[on_a_exact.clone()]);
	assert!(copy.reverse_index_consistent());

	copy.set_requirements(&loc("c"), Some(set(&[on_b.clone()])));
	assert!(copy.reverse_index_consistent());

	let hit = copy.dependents(&Capability::artifact(&coords("a", "1.0")), true, true);
	assert_eq!(hit, set(&[loc("d")]));
	assert!(copy.reverse_index_consistent());
	assert!(copy.requirements(&loc("d")).is_none(), "destructive lookup detaches the forward entry too");

	copy.remove_requirements(&loc("b"));
	copy.set_requirements(&loc("c"), None);
	assert!(copy.reverse_index_consistent());
	assert_eq!(copy.indexed_key_count(), 0, "no empty buckets may remain");
}

#[cfg_attr(test, test)]
pub(crate) fn test_reverse_index_inverse() {
	inv_reverse_index_inverse()
}

/// Invariant: removing the last requirement of a key drops the whole bucket.
pub(crate) fn inv_reverse_index_has_no_empty_buckets() {
	let registry = ProjectRegistry::new("test");
	let clock = GenerationClock::new();
	let mut copy = registry.open();

	let req = RequiredCapability::artifact("g:x", "1");
	install(&mut copy, &clock, "a", "1.0", &[req.clone()]);
	install(&mut copy, &clock, "b", "1.0", &[req]);
	copy.set_requirements(&loc("a"), None);
	assert_eq!(copy.indexed_key_count(), 1);
	copy.set_requirements(&loc("b"), Some(Default::default()));
	assert_eq!(copy.indexed_key_count(), 0);
	assert!(!copy.dependents.has_empty_buckets());
}

#[cfg_attr(test, test)]
pub(crate) fn test_reverse_index_has_no_empty_buckets() {
	inv_reverse_index_has_no_empty_buckets()
}

/// Invariant: a working copy opened before another apply MUST NOT be published.
pub(crate) fn inv_stale_apply_is_rejected() {
	let registry = ProjectRegistry::new("test");
	let clock = GenerationClock::new();

	let mut first = registry.open();
	let mut second = registry.open();
	install(&mut second, &clock, "b", "1.0", &[]);
	registry.apply(&mut second).expect("fresh copy applies");
	assert_eq!(registry.version(), 1);
	assert!(first.is_stale());

	install(&mut first, &clock, "a", "1.0", &[]);
	let err = registry.apply(&mut first).expect_err("stale copy must be rejected");
	assert_eq!((err.expected, err.actual), (0, 1));

	let snap = registry.snapshot();
	assert_eq!(snap.version(), 1);
	assert!(snap.facade(&loc("a")).is_none());
	assert!(snap.facade(&loc("b")).is_some());
}

#[cfg_attr(test, test)]
pub(crate) fn test_stale_apply_is_rejected() {
	inv_stale_apply_is_rejected()
}

/// Invariant: an applied working copy rejects further mutation.
pub(crate) fn inv_closed_copy_rejects_mutation() {
	let registry = ProjectRegistry::new("test");
	let clock = GenerationClock::new();
	let mut copy = registry.open();
	install(&mut copy, &clock, "a", "1.0", &[]);
	registry.apply(&mut copy).expect("apply");
	assert!(copy.is_closed());
	copy.set_facade(&loc("a"), None);
}

#[cfg_attr(test, test)]
#[cfg_attr(test, should_panic(expected = "working copy is closed"))]
pub(crate) fn test_closed_copy_rejects_mutation() {
	inv_closed_copy_rejects_mutation()
}

/// Invariant: readers holding a snapshot keep its facades alive and unchanged across applies.
pub(crate) fn inv_snapshot_liveness_across_apply() {
	let registry = ProjectRegistry::new("test");
	let clock = GenerationClock::new();
	let mut copy = registry.open();
	install(&mut copy, &clock, "a", "1.0", &[]);
	registry.apply(&mut copy).expect("apply");

	let held = registry.snapshot();
	let held_facade = Arc::clone(held.facade(&loc("a")).expect("a present"));

	let mut next = registry.open();
	next.set_facade(&loc("a"), Some(facade(&clock, "a", "2.0")));
	registry.apply(&mut next).expect("apply");

	assert_eq!(held.version(), 1);
	assert_eq!(held.facade(&loc("a")).map(|f| f.identity().version.as_str()), Some("1.0"));
	assert_eq!(held_facade.identity().version, "1.0");
	assert_eq!(registry.snapshot().facade(&loc("a")).map(|f| f.identity().version.clone()), Some("2.0".into()));
}

#[cfg_attr(test, test)]
pub(crate) fn test_snapshot_liveness_across_apply() {
	inv_snapshot_liveness_across_apply()
}

/// Invariant: concurrent applies from copies of one version linearize; exactly one wins.
pub(crate) fn inv_single_winner_per_version() {
	let registry = ProjectRegistry::new("test");
	let wins = AtomicUsize::new(0);
	let copies: Vec<_> = (0..8).map(|_| registry.open()).collect();

	std::thread::scope(|scope| {
		for (idx, mut copy) in copies.into_iter().enumerate() {
			let (registry, wins) = (&registry, &wins);
			scope.spawn(move || {
				let clock = GenerationClock::new();
				install(&mut copy, &clock, &format!("u{idx}"), "1.0", &[]);
				if registry.apply(&mut copy).is_ok() {
					wins.fetch_add(1, Ordering::SeqCst);
				}
			});
		}
	});

	assert_eq!(wins.load(Ordering::SeqCst), 1);
	assert_eq!(registry.version(), 1);
	assert_eq!(registry.snapshot().len(), 1);
}

#[cfg_attr(test, test)]
pub(crate) fn test_single_winner_per_version() {
	inv_single_winner_per_version()
}
