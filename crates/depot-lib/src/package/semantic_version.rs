use serde::de::Error as _;

/// A four part numeric version with an optional pre-release label and build metadata.
///
/// Comparison uses the numeric parts (missing parts count as zero) then the
/// pre-release label, with a released version ordering after any pre-release
/// of the same numeric version. Build metadata never affects comparison.
/// `Display` reproduces the text the version was parsed from.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
	parts: [u64; 4],
	release_label: Option<String>,
	metadata: Option<String>,
	original: String,
}

impl SemanticVersion {
	pub fn parse(text: &str) -> crate::Result<Self> {
		let err = || crate::Error::Format(format!("invalid version '{}'", text));

		let trimmed = text.trim();
		if trimmed.is_empty() { return Err(err()) }

		let (body, metadata) = match trimmed.split_once('+') {
			Some((body, meta)) => {
				if !is_valid_label(meta) { return Err(err()) }
				(body, Some(meta.to_string()))
			}
			None => (trimmed, None),
		};

		let (numeric, release_label) = match body.split_once('-') {
			Some((numeric, label)) => {
				if !is_valid_label(label) { return Err(err()) }
				(numeric, Some(label.to_string()))
			}
			None => (body, None),
		};

		let segments: Vec<&str> = numeric.split('.').collect();
		if segments.is_empty() || segments.len() > 4 { return Err(err()) }

		let mut parts = [0u64; 4];
		for (i, segment) in segments.iter().enumerate() {
			if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
				return Err(err())
			}
			parts[i] = segment.parse::<u64>().map_err(|_| err())?;
		}

		Ok(SemanticVersion {
			parts,
			release_label,
			metadata,
			original: trimmed.to_string(),
		})
	}

	pub fn major(&self) -> u64 { self.parts[0] }
	pub fn minor(&self) -> u64 { self.parts[1] }
	pub fn patch(&self) -> u64 { self.parts[2] }
	pub fn revision(&self) -> u64 { self.parts[3] }

	pub fn release_label(&self) -> Option<&str> {
		self.release_label.as_deref()
	}

	pub fn metadata(&self) -> Option<&str> {
		self.metadata.as_deref()
	}

	pub fn is_prerelease(&self) -> bool {
		self.release_label.is_some()
	}

	/// Canonical textual form, independent of how the version was written.
	///
	/// Used for map keys and log output where `1.0` and `1.0.0` must agree.
	pub fn normalized_string(&self) -> String {
		let mut s = format!("{}.{}.{}", self.parts[0], self.parts[1], self.parts[2]);
		if self.parts[3] > 0 {
			s.push_str(&format!(".{}", self.parts[3]));
		}
		if let Some(label) = &self.release_label {
			s.push('-');
			s.push_str(label);
		}
		s
	}
}

fn is_valid_label(label: &str) -> bool {
	!label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

impl std::cmp::Ord for SemanticVersion {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		match self.parts.cmp(&other.parts) {
			std::cmp::Ordering::Equal => {}
			ord => return ord,
		}
		match (&self.release_label, &other.release_label) {
			(None, None) => std::cmp::Ordering::Equal,
			/* Release sorts after any pre-release of the same numeric version */
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(Some(_), None) => std::cmp::Ordering::Less,
			(Some(lhs), Some(rhs)) => lhs.to_lowercase().cmp(&rhs.to_lowercase()),
		}
	}
}

impl std::cmp::PartialOrd for SemanticVersion {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::cmp::PartialEq for SemanticVersion {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == std::cmp::Ordering::Equal
	}
}

impl std::cmp::Eq for SemanticVersion {}

impl std::hash::Hash for SemanticVersion {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.parts.hash(state);
		self.release_label.as_ref().map(|l| l.to_lowercase()).hash(state);
	}
}

impl std::fmt::Display for SemanticVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.original)
	}
}

impl std::str::FromStr for SemanticVersion {
	type Err = crate::Error;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl serde::Serialize for SemanticVersion {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.original)
	}
}

impl<'de> serde::Deserialize<'de> for SemanticVersion {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		SemanticVersion::parse(&s).map_err(D::Error::custom)
	}
}
