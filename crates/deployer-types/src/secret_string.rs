//! String wrapper for sensitive configuration values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A string that never appears in logs or serialized output.
///
/// Debug, Display and Serialize all print a redaction marker; the value is
/// only reachable through [`SecretString::expose_secret`].
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

const REDACTED: &str = "[REDACTED]";

impl SecretString {
	pub fn expose_secret(&self) -> &str {
		&self.0
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({REDACTED})")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl Serialize for SecretString {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_secret_is_redacted() {
		let secret = SecretString::from("0xdeadbeef");
		assert_eq!(format!("{secret}"), REDACTED);
		assert!(!format!("{secret:?}").contains("deadbeef"));
		assert_eq!(
			serde_json::to_string(&secret).unwrap(),
			format!("\"{REDACTED}\"")
		);
		assert_eq!(secret.expose_secret(), "0xdeadbeef");
	}
}
