//! Version ordering and range containment.
//!
//! Versions compare item by item after splitting on `.`, `-` and digit/letter
//! transitions. Qualifiers order by release rank
//! (`alpha < beta < milestone < rc < snapshot < release < sp`), unknown
//! qualifiers sort after known ones, and any non-zero number sorts after every
//! qualifier. Zeros, release qualifiers and missing items are interchangeable,
//! so `1`, `1.0` and `1.0-final` are all equal. Trailing zeros are also dropped
//! where a `-` or a qualifier begins, so `1.0-alpha` equals `1-alpha`.
//!
//! Ranges use the bracket syntax `[1.0,2.0)`, `(,1.5]`, `[1.0]` and unions of
//! such restrictions separated by commas. A spec without brackets is a soft
//! requirement that every version satisfies.

use std::cmp::Ordering;
use std::fmt;

/// One comparable component of a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
	/// Decimal digits with leading zeros stripped.
	Int(String),
	Qualifier(String),
}

const PRE_RELEASE: [&str; 5] = ["alpha", "beta", "milestone", "rc", "snapshot"];

fn qualifier_alias(q: &str) -> &str {
	match q {
		"a" => "alpha",
		"b" => "beta",
		"m" => "milestone",
		"cr" => "rc",
		"ga" | "final" | "release" => "",
		other => other,
	}
}

/// Ordering class of one item; a missing item sorts like zero or a release qualifier.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Class<'a> {
	PreRelease(usize),
	Null,
	ServicePack,
	Unknown(&'a str),
	Number(usize, &'a str),
}

fn class(item: Option<&Item>) -> Class<'_> {
	match item {
		None => Class::Null,
		Some(Item::Int(digits)) if digits.is_empty() => Class::Null,
		Some(Item::Int(digits)) => Class::Number(digits.len(), digits),
		Some(Item::Qualifier(q)) if q.is_empty() => Class::Null,
		Some(Item::Qualifier(q)) if q == "sp" => Class::ServicePack,
		Some(Item::Qualifier(q)) => match PRE_RELEASE.iter().position(|k| k == q) {
			Some(rank) => Class::PreRelease(rank),
			None => Class::Unknown(q),
		},
	}
}

impl Item {
	fn is_null(&self) -> bool {
		class(Some(self)) == Class::Null
	}
}

fn flush(current: &mut String, digits: bool, items: &mut Vec<Item>) {
	if digits {
		items.push(Item::Int(current.trim_start_matches('0').to_string()));
	} else {
		items.push(Item::Qualifier(qualifier_alias(current.as_str()).to_string()));
	}
	current.clear();
}

fn trim_nulls(items: &mut Vec<Item>) {
	while items.last().is_some_and(Item::is_null) {
		items.pop();
	}
}

/// A version string with a total order.
#[derive(Debug, Clone)]
pub struct ComparableVersion {
	original: String,
	items: Vec<Item>,
}

impl ComparableVersion {
	pub fn new(version: &str) -> Self {
		let lowered = version.trim().to_ascii_lowercase();
		let mut items = Vec::new();
		let mut current = String::new();
		let mut digits = false;

		for ch in lowered.chars() {
			if ch == '.' || ch == '-' {
				flush(&mut current, digits, &mut items);
				if ch == '-' {
					trim_nulls(&mut items);
				}
				digits = false;
				continue;
			}
			let is_digit = ch.is_ascii_digit();
			if !current.is_empty() && is_digit != digits {
				flush(&mut current, digits, &mut items);
				// a qualifier starts a sub-list, so zeros before it carry no weight
				if digits {
					trim_nulls(&mut items);
				}
			}
			if current.is_empty() {
				digits = is_digit;
			}
			current.push(ch);
		}
		flush(&mut current, digits, &mut items);
		trim_nulls(&mut items);

		Self {
			original: version.to_string(),
			items,
		}
	}

	pub fn as_str(&self) -> &str {
		&self.original
	}
}

impl Ord for ComparableVersion {
	fn cmp(&self, other: &Self) -> Ordering {
		let len = self.items.len().max(other.items.len());
		for idx in 0..len {
			let ord = class(self.items.get(idx)).cmp(&class(other.items.get(idx)));
			if ord != Ordering::Equal {
				return ord;
			}
		}
		Ordering::Equal
	}
}

impl PartialOrd for ComparableVersion {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for ComparableVersion {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for ComparableVersion {}

impl fmt::Display for ComparableVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.original)
	}
}

/// Malformed version range specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionRangeError {
	#[error("empty version specification")]
	Empty,
	#[error("unbalanced brackets in {0:?}")]
	Unbalanced(String),
	#[error("single version must be closed on both sides: {0:?}")]
	InvalidExact(String),
	#[error("lower bound exceeds upper bound in {0:?}")]
	ReversedBounds(String),
	#[error("ranges overlap or are out of order in {0:?}")]
	Overlapping(String),
	#[error("unexpected trailing input in {0:?}")]
	Trailing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Restriction {
	lower: Option<ComparableVersion>,
	lower_inclusive: bool,
	upper: Option<ComparableVersion>,
	upper_inclusive: bool,
}

impl Restriction {
	fn contains(&self, version: &ComparableVersion) -> bool {
		if let Some(lower) = &self.lower {
			match version.cmp(lower) {
				Ordering::Less => return false,
				Ordering::Equal if !self.lower_inclusive => return false,
				_ => {}
			}
		}
		if let Some(upper) = &self.upper {
			match version.cmp(upper) {
				Ordering::Greater => return false,
				Ordering::Equal if !self.upper_inclusive => return false,
				_ => {}
			}
		}
		true
	}

	fn parse(spec: &str, whole: &str) -> Result<Self, VersionRangeError> {
		let lower_inclusive = spec.starts_with('[');
		let upper_inclusive = spec.ends_with(']');
		let inner = spec[1..spec.len() - 1].trim();

		let Some((lo, hi)) = inner.split_once(',') else {
			if !lower_inclusive || !upper_inclusive || inner.is_empty() {
				return Err(VersionRangeError::InvalidExact(whole.to_string()));
			}
			let exact = ComparableVersion::new(inner);
			return Ok(Self {
				lower: Some(exact.clone()),
				lower_inclusive: true,
				upper: Some(exact),
				upper_inclusive: true,
			});
		};

		let (lo, hi) = (lo.trim(), hi.trim());
		if hi.contains(',') {
			return Err(VersionRangeError::Unbalanced(whole.to_string()));
		}
		let lower = (!lo.is_empty()).then(|| ComparableVersion::new(lo));
		let upper = (!hi.is_empty()).then(|| ComparableVersion::new(hi));
		if let (Some(l), Some(u)) = (&lower, &upper) {
			match l.cmp(u) {
				Ordering::Greater => return Err(VersionRangeError::ReversedBounds(whole.to_string())),
				Ordering::Equal if !(lower_inclusive && upper_inclusive) => {
					return Err(VersionRangeError::ReversedBounds(whole.to_string()));
				}
				_ => {}
			}
		}
		Ok(Self {
			lower,
			lower_inclusive,
			upper,
			upper_inclusive,
		})
	}
}

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
	recommended: Option<ComparableVersion>,
	restrictions: Vec<Restriction>,
}

impl VersionRange {
	pub fn parse(spec: &str) -> Result<Self, VersionRangeError> {
		let spec = spec.trim();
		if spec.is_empty() {
			return Err(VersionRangeError::Empty);
		}
		if !spec.starts_with(['[', '(']) {
			return Ok(Self {
				recommended: Some(ComparableVersion::new(spec)),
				restrictions: Vec::new(),
			});
		}

		let mut restrictions: Vec<Restriction> = Vec::new();
		let mut rest = spec;
		while !rest.is_empty() {
			if !rest.starts_with(['[', '(']) {
				return Err(VersionRangeError::Trailing(spec.to_string()));
			}
			let close = rest
				.find([']', ')'])
				.ok_or_else(|| VersionRangeError::Unbalanced(spec.to_string()))?;
			if rest[1..close].contains(['[', '(']) {
				return Err(VersionRangeError::Unbalanced(spec.to_string()));
			}
			let restriction = Restriction::parse(&rest[..=close], spec)?;

			if let Some(prev) = restrictions.last() {
				let ordered = match (&prev.upper, &restriction.lower) {
					(Some(u), Some(l)) => match u.cmp(l) {
						Ordering::Less => true,
						Ordering::Equal => !(prev.upper_inclusive && restriction.lower_inclusive),
						Ordering::Greater => false,
					},
					_ => false,
				};
				if !ordered {
					return Err(VersionRangeError::Overlapping(spec.to_string()));
				}
			}
			restrictions.push(restriction);

			rest = rest[close + 1..].trim_start();
			if let Some(stripped) = rest.strip_prefix(',') {
				rest = stripped.trim_start();
				if rest.is_empty() {
					return Err(VersionRangeError::Trailing(spec.to_string()));
				}
			}
		}

		Ok(Self {
			recommended: None,
			restrictions,
		})
	}

	/// Returns true if `version` satisfies this constraint.
	///
	/// A soft requirement (bare version) is satisfied by every version.
	pub fn contains(&self, version: &ComparableVersion) -> bool {
		if self.restrictions.is_empty() {
			return true;
		}
		self.restrictions.iter().any(|r| r.contains(version))
	}

	/// The bare version of a soft requirement, if this is one.
	pub fn recommended(&self) -> Option<&ComparableVersion> {
		self.recommended.as_ref()
	}
}
