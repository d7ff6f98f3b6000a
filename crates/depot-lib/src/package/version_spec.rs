use serde::de::Error as _;

use super::SemanticVersion;

/// A range of acceptable versions described by optional inclusive or
/// exclusive bounds. A spec with no bounds matches every version.
///
/// Specs parse from the bracket range notation: `"1.0"` means at least 1.0,
/// `"[1.0]"` means exactly 1.0, `"[1.0,2.0)"` means 1.0 inclusive through
/// 2.0 exclusive and `"(,1.0]"` means anything up to and including 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSpec {
	min_version: Option<SemanticVersion>,
	is_min_inclusive: bool,
	max_version: Option<SemanticVersion>,
	is_max_inclusive: bool,
}

impl VersionSpec {
	/// Bounds that cannot be satisfied by any version are rejected here
	/// rather than silently matching nothing.
	pub fn new(
		min_version: Option<SemanticVersion>,
		is_min_inclusive: bool,
		max_version: Option<SemanticVersion>,
		is_max_inclusive: bool,
	) -> crate::Result<Self> {
		if let (Some(min), Some(max)) = (&min_version, &max_version) {
			if min > max {
				return Err(crate::Error::Format(format!("version spec minimum '{}' is above maximum '{}'", min, max)))
			}
			if min == max && !(is_min_inclusive && is_max_inclusive) {
				return Err(crate::Error::Format(format!("version spec with equal exclusive bounds '{}' matches nothing", min)))
			}
		}
		Ok(VersionSpec { min_version, is_min_inclusive, max_version, is_max_inclusive })
	}

	pub fn any() -> Self {
		VersionSpec { min_version: None, is_min_inclusive: false, max_version: None, is_max_inclusive: false }
	}

	pub fn exact(version: SemanticVersion) -> Self {
		VersionSpec {
			min_version: Some(version.clone()),
			is_min_inclusive: true,
			max_version: Some(version),
			is_max_inclusive: true,
		}
	}

	pub fn at_least(version: SemanticVersion) -> Self {
		VersionSpec { min_version: Some(version), is_min_inclusive: true, max_version: None, is_max_inclusive: false }
	}

	pub fn min_version(&self) -> Option<&SemanticVersion> { self.min_version.as_ref() }
	pub fn is_min_inclusive(&self) -> bool { self.is_min_inclusive }
	pub fn max_version(&self) -> Option<&SemanticVersion> { self.max_version.as_ref() }
	pub fn is_max_inclusive(&self) -> bool { self.is_max_inclusive }

	pub fn is_exact(&self) -> bool {
		matches!((&self.min_version, &self.max_version), (Some(min), Some(max)) if min == max)
	}

	pub fn satisfies(&self, version: &SemanticVersion) -> bool {
		if let Some(min) = &self.min_version {
			let ok = version > min || (version == min && self.is_min_inclusive);
			if !ok { return false }
		}
		if let Some(max) = &self.max_version {
			let ok = version < max || (version == max && self.is_max_inclusive);
			if !ok { return false }
		}
		true
	}

	pub fn parse(text: &str) -> crate::Result<Self> {
		let err = || crate::Error::Format(format!("invalid version spec '{}'", text));

		let trimmed = text.trim();
		if trimmed.is_empty() { return Err(err()) }

		let starts_bracketed = trimmed.starts_with('[') || trimmed.starts_with('(');
		let ends_bracketed = trimmed.ends_with(']') || trimmed.ends_with(')');

		if !starts_bracketed && !ends_bracketed {
			/* A bare version is a floor */
			return Ok(Self::at_least(SemanticVersion::parse(trimmed)?))
		}
		if !starts_bracketed || !ends_bracketed || trimmed.len() < 3 {
			return Err(err())
		}

		let is_min_inclusive = trimmed.starts_with('[');
		let is_max_inclusive = trimmed.ends_with(']');
		let inner = &trimmed[1..trimmed.len() - 1];

		match inner.split_once(',') {
			None => {
				/* A single bracketed version is only meaningful as an exact pin */
				if !(is_min_inclusive && is_max_inclusive) { return Err(err()) }
				Ok(Self::exact(SemanticVersion::parse(inner)?))
			}
			Some((min, max)) => {
				let parse_bound = |s: &str| -> crate::Result<Option<SemanticVersion>> {
					let s = s.trim();
					if s.is_empty() { Ok(None) } else { SemanticVersion::parse(s).map(Some) }
				};
				Self::new(parse_bound(min)?, is_min_inclusive, parse_bound(max)?, is_max_inclusive)
			}
		}
	}

	/// The bracket notation form, parseable by [`VersionSpec::parse`].
	pub fn to_range_string(&self) -> String {
		if self.is_exact() {
			return format!("[{}]", self.min_version.as_ref().expect("exact spec has a minimum"))
		}
		match (&self.min_version, &self.max_version) {
			(Some(min), None) if self.is_min_inclusive => min.to_string(),
			(min, max) => format!(
				"{}{},{}{}",
				if self.is_min_inclusive { '[' } else { '(' },
				min.as_ref().map(|v| v.to_string()).unwrap_or_default(),
				max.as_ref().map(|v| v.to_string()).unwrap_or_default(),
				if self.is_max_inclusive { ']' } else { ')' },
			),
		}
	}
}

/// Human readable form used in error messages, e.g. `≥ 1.5` or `≥ 1.0 && < 2.0`.
impl std::fmt::Display for VersionSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.is_exact() {
			return write!(f, "= {}", self.min_version.as_ref().expect("exact spec has a minimum"))
		}
		match (&self.min_version, &self.max_version) {
			(None, None) => write!(f, "any version"),
			(Some(min), None) => write!(f, "{} {}", if self.is_min_inclusive { "≥" } else { ">" }, min),
			(None, Some(max)) => write!(f, "{} {}", if self.is_max_inclusive { "≤" } else { "<" }, max),
			(Some(min), Some(max)) => write!(
				f,
				"{} {} && {} {}",
				if self.is_min_inclusive { "≥" } else { ">" },
				min,
				if self.is_max_inclusive { "≤" } else { "<" },
				max,
			),
		}
	}
}

impl std::str::FromStr for VersionSpec {
	type Err = crate::Error;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl serde::Serialize for VersionSpec {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_range_string())
	}
}

impl<'de> serde::Deserialize<'de> for VersionSpec {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		VersionSpec::parse(&s).map_err(D::Error::custom)
	}
}
