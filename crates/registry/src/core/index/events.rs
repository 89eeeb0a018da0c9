use std::sync::Arc;

use crate::core::{Facade, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
	Added,
	Changed,
	Removed,
}

/// One unit-level difference between two consecutive snapshots.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
	pub kind: ChangeKind,
	pub location: Location,
	pub old: Option<Arc<Facade>>,
	pub new: Option<Arc<Facade>>,
	/// Set on [`ChangeKind::Changed`] when the unit's requirement set differs.
	pub dependencies_changed: bool,
}

impl ChangeEvent {
	pub(crate) fn added(location: Location, new: Arc<Facade>) -> Self {
		Self {
			kind: ChangeKind::Added,
			location,
			old: None,
			new: Some(new),
			dependencies_changed: false,
		}
	}

	pub(crate) fn changed(location: Location, old: Arc<Facade>, new: Arc<Facade>, dependencies_changed: bool) -> Self {
		Self {
			kind: ChangeKind::Changed,
			location,
			old: Some(old),
			new: Some(new),
			dependencies_changed,
		}
	}

	pub(crate) fn removed(location: Location, old: Arc<Facade>) -> Self {
		Self {
			kind: ChangeKind::Removed,
			location,
			old: Some(old),
			new: None,
			dependencies_changed: false,
		}
	}

	/// The most recent facade this event carries.
	pub fn facade(&self) -> Option<&Arc<Facade>> {
		self.new.as_ref().or(self.old.as_ref())
	}
}
