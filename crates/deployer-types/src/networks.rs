//! Network configuration types.
//!
//! A network is a named environment ("development", "test", a public chain)
//! with the connection parameters used to reach it and a matcher for the
//! chain id the connected node must report. A network is reached either by a
//! direct `host`/`port` connection to a node that holds unlocked accounts, or
//! through a signing provider that signs locally and relays through an RPC
//! URL. The two are mutually exclusive.

use crate::SecretString;
use alloy_primitives::Address;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Chain id a network must report: an exact value or any value (`"*"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NetworkIdMatcher {
	#[default]
	Any,
	Exact(u64),
}

impl NetworkIdMatcher {
	/// Checks whether the given chain id is acceptable.
	pub fn matches(&self, chain_id: u64) -> bool {
		match self {
			Self::Any => true,
			Self::Exact(expected) => *expected == chain_id,
		}
	}
}

impl fmt::Display for NetworkIdMatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Any => write!(f, "*"),
			Self::Exact(id) => write!(f, "{id}"),
		}
	}
}

impl Serialize for NetworkIdMatcher {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Any => serializer.serialize_str("*"),
			Self::Exact(id) => serializer.serialize_u64(*id),
		}
	}
}

impl<'de> Deserialize<'de> for NetworkIdMatcher {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct MatcherVisitor;

		impl<'de> Visitor<'de> for MatcherVisitor {
			type Value = NetworkIdMatcher;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a chain id or \"*\"")
			}

			fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
				Ok(NetworkIdMatcher::Exact(value))
			}

			fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
				u64::try_from(value)
					.map(NetworkIdMatcher::Exact)
					.map_err(|_| E::custom(format!("negative chain id: {value}")))
			}

			fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
				if value == "*" {
					return Ok(NetworkIdMatcher::Any);
				}
				value
					.parse::<u64>()
					.map(NetworkIdMatcher::Exact)
					.map_err(|e| E::custom(format!("invalid chain id '{value}': {e}")))
			}
		}

		deserializer.deserialize_any(MatcherVisitor)
	}
}

/// Signing-and-relay provider: transactions are signed with `private_key`
/// and sent through `url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SigningProvider {
	pub url: String,
	pub private_key: SecretString,
}

/// How a network is reached, derived from a validated [`NetworkConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection<'a> {
	/// Node at `url` sends from one of its own unlocked accounts.
	Direct { url: String, from: Option<Address> },
	/// Transactions are signed locally and relayed through `url`.
	Signing {
		url: &'a str,
		private_key: &'a SecretString,
	},
}

/// Problems with a network's connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkConfigError {
	#[error("host/port and provider are mutually exclusive")]
	Ambiguous,
	#[error("either host and port or a provider must be set")]
	Missing,
	#[error("host and port must be set together")]
	IncompleteHost,
}

/// Configuration for a single named network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub provider: Option<SigningProvider>,
	#[serde(default)]
	pub network_id: NetworkIdMatcher,
	/// Gas limit for every deployment transaction; estimated when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas: Option<u64>,
	/// Gas price in wei; queried from the node when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<u64>,
	/// Unlocked account used on direct connections; the node's first
	/// account when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub from: Option<Address>,
	/// Confirmations required before a deployment counts as confirmed.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Upper bound on the wait for a deployment's confirmation.
	#[serde(default = "default_receipt_timeout_seconds")]
	pub receipt_timeout_seconds: u64,
}

fn default_confirmations() -> u64 {
	1
}

fn default_receipt_timeout_seconds() -> u64 {
	120
}

impl NetworkConfig {
	/// Creates a direct connection to `host:port` matching any chain id.
	pub fn direct(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: Some(host.into()),
			port: Some(port),
			provider: None,
			network_id: NetworkIdMatcher::Any,
			gas: None,
			gas_price: None,
			from: None,
			confirmations: default_confirmations(),
			receipt_timeout_seconds: default_receipt_timeout_seconds(),
		}
	}

	/// Creates a signing-provider connection matching any chain id.
	pub fn signing(url: impl Into<String>, private_key: SecretString) -> Self {
		Self {
			host: None,
			port: None,
			provider: Some(SigningProvider {
				url: url.into(),
				private_key,
			}),
			..Self::direct("", 0)
		}
	}

	pub fn with_network_id(mut self, network_id: NetworkIdMatcher) -> Self {
		self.network_id = network_id;
		self
	}

	/// Resolves the connection parameters, enforcing that exactly one of
	/// host/port or provider is configured.
	pub fn connection(&self) -> Result<Connection<'_>, NetworkConfigError> {
		match (&self.host, self.port, &self.provider) {
			(Some(_), _, Some(_)) | (_, Some(_), Some(_)) => Err(NetworkConfigError::Ambiguous),
			(None, None, Some(provider)) => Ok(Connection::Signing {
				url: &provider.url,
				private_key: &provider.private_key,
			}),
			(Some(host), Some(port), None) => Ok(Connection::Direct {
				url: direct_url(host, port),
				from: self.from,
			}),
			(Some(_), None, None) | (None, Some(_), None) => Err(NetworkConfigError::IncompleteHost),
			(None, None, None) => Err(NetworkConfigError::Missing),
		}
	}

	/// RPC endpoint this network is reached through.
	pub fn rpc_url(&self) -> Result<String, NetworkConfigError> {
		Ok(match self.connection()? {
			Connection::Direct { url, .. } => url,
			Connection::Signing { url, .. } => url.to_string(),
		})
	}

	pub fn receipt_timeout(&self) -> Duration {
		Duration::from_secs(self.receipt_timeout_seconds)
	}
}

fn direct_url(host: &str, port: u16) -> String {
	if host.starts_with("http://") || host.starts_with("https://") {
		format!("{host}:{port}")
	} else {
		format!("http://{host}:{port}")
	}
}

/// Named networks, ordered by name.
pub type NetworksConfig = BTreeMap<String, NetworkConfig>;
