//! Library linking for unlinked creation bytecode.
//!
//! Compilers leave a 40-character placeholder wherever a contract calls an
//! external library. Two placeholder forms are in use:
//!
//! - legacy: `__` followed by the library name, truncated to 36 characters
//!   and right-padded with `_` to 40 characters;
//! - hashed: `__$` followed by the first 17 bytes of
//!   `keccak256(fully qualified name)` as 34 hex characters and `$__`.
//!
//! Linking replaces every placeholder for a library with its address.

use alloy_primitives::{keccak256, Address, Bytes};
use deployer_types::without_0x_prefix;
use thiserror::Error;

/// Width of a placeholder and of a hex-encoded address.
const PLACEHOLDER_LEN: usize = 40;

/// Errors that can occur while linking bytecode.
#[derive(Debug, Error)]
pub enum LinkError {
	/// Placeholders remain after linking.
	#[error("Bytecode still references unlinked libraries: {}", .0.join(", "))]
	Unlinked(Vec<String>),
	#[error("Invalid bytecode hex: {0}")]
	InvalidHex(String),
}

/// Legacy placeholder for `name`.
pub fn legacy_placeholder(name: &str) -> String {
	let truncated: String = name.chars().take(PLACEHOLDER_LEN - 4).collect();
	format!("__{truncated:_<width$}", width = PLACEHOLDER_LEN - 2)
}

/// Hashed placeholder for the fully qualified library name `name`.
pub fn hashed_placeholder(name: &str) -> String {
	let hash = keccak256(name.as_bytes());
	format!("__${}$__", hex::encode(&hash[..17]))
}

/// Hex creation bytecode that may still contain library placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linker {
	code: String,
}

impl Linker {
	/// Wraps hex bytecode, with or without a `0x` prefix.
	pub fn new(bytecode: &str) -> Self {
		let code = without_0x_prefix(bytecode.trim());
		Self {
			code: code.to_string(),
		}
	}

	/// Replaces every placeholder for `name` with `address`.
	///
	/// Returns the number of placeholders replaced.
	pub fn link(&mut self, name: &str, address: Address) -> usize {
		let encoded = hex::encode(address.as_slice());
		let mut replaced = 0;
		for placeholder in [legacy_placeholder(name), hashed_placeholder(name)] {
			replaced += self.code.matches(placeholder.as_str()).count();
			self.code = self.code.replace(placeholder.as_str(), &encoded);
		}
		replaced
	}

	/// Placeholders still present, in order of first appearance.
	///
	/// Legacy placeholders are reported as the library name they carry,
	/// hashed ones as `$<hash>$`. Slots holding non-ASCII text are not
	/// placeholders and are left for [`Linker::into_bytes`] to reject.
	pub fn unlinked_libraries(&self) -> Vec<String> {
		let code = self.code.as_bytes();
		let mut unlinked = Vec::new();
		let mut pos = 0;
		while let Some(offset) = code[pos..].windows(2).position(|pair| pair == b"__") {
			let start = pos + offset;
			let end = (start + PLACEHOLDER_LEN).min(code.len());
			let slot = std::str::from_utf8(&code[start..end])
				.ok()
				.filter(|slot| slot.is_ascii());
			if let Some(slot) = slot {
				let label = slot.trim_matches('_').to_string();
				if !label.is_empty() && !unlinked.contains(&label) {
					unlinked.push(label);
				}
			}
			pos = end;
		}
		unlinked
	}

	/// Decodes the linked bytecode.
	///
	/// # Errors
	///
	/// Returns [`LinkError::Unlinked`] while placeholders remain, and
	/// [`LinkError::InvalidHex`] if the code is not valid hex.
	pub fn into_bytes(self) -> Result<Bytes, LinkError> {
		let unlinked = self.unlinked_libraries();
		if !unlinked.is_empty() {
			return Err(LinkError::Unlinked(unlinked));
		}
		hex::decode(&self.code)
			.map(Bytes::from)
			.map_err(|e| LinkError::InvalidHex(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn library_address() -> Address {
		Address::repeat_byte(0xab)
	}

	#[test]
	fn test_legacy_placeholder_shape() {
		let placeholder = legacy_placeholder("ECRecovery");
		assert_eq!(placeholder.len(), PLACEHOLDER_LEN);
		assert_eq!(placeholder, "__ECRecovery____________________________");

		let long = legacy_placeholder("contracts/lib/ChannelLibrary.sol:ChannelLibrary");
		assert_eq!(long.len(), PLACEHOLDER_LEN);
		assert!(long.starts_with("__contracts/lib/ChannelLibrary.sol:C"));
	}

	#[test]
	fn test_hashed_placeholder_shape() {
		let placeholder = hashed_placeholder("contracts/ECRecovery.sol:ECRecovery");
		assert_eq!(placeholder.len(), PLACEHOLDER_LEN);
		assert!(placeholder.starts_with("__$"));
		assert!(placeholder.ends_with("$__"));
	}

	#[test]
	fn test_link_replaces_every_occurrence() {
		let placeholder = legacy_placeholder("ECRecovery");
		let code = format!("0x6080{placeholder}6000{placeholder}00");
		let mut linker = Linker::new(&code);
		assert_eq!(linker.unlinked_libraries(), vec!["ECRecovery"]);

		assert_eq!(linker.link("ECRecovery", library_address()), 2);
		assert!(linker.unlinked_libraries().is_empty());

		let bytes = linker.into_bytes().unwrap();
		let address = library_address();
		assert_eq!(&bytes[2..22], address.as_slice());
		assert_eq!(&bytes[24..44], address.as_slice());
	}

	#[test]
	fn test_link_hashed_placeholder() {
		let name = "contracts/ECRecovery.sol:ECRecovery";
		let code = format!("73{}", hashed_placeholder(name));
		let mut linker = Linker::new(&code);
		assert_eq!(linker.link(name, library_address()), 1);

		let bytes = linker.into_bytes().unwrap();
		assert_eq!(bytes[0], 0x73);
		assert_eq!(&bytes[1..], library_address().as_slice());
	}

	#[test]
	fn test_other_library_left_unlinked() {
		let code = format!(
			"73{}73{}",
			legacy_placeholder("ECRecovery"),
			legacy_placeholder("ChannelLibrary")
		);
		let mut linker = Linker::new(&code);
		assert_eq!(linker.link("ECRecovery", library_address()), 1);
		assert_eq!(linker.unlinked_libraries(), vec!["ChannelLibrary"]);

		let err = linker.into_bytes().unwrap_err();
		assert!(matches!(err, LinkError::Unlinked(names) if names == vec!["ChannelLibrary"]));
	}

	#[test]
	fn test_plain_bytecode_is_linked() {
		let linker = Linker::new("0x60806040");
		assert!(linker.unlinked_libraries().is_empty());
		assert_eq!(
			linker.into_bytes().unwrap(),
			Bytes::from_static(&[0x60, 0x80, 0x60, 0x40])
		);
	}

	#[test]
	fn test_invalid_hex() {
		let err = Linker::new("0x6080zz").into_bytes().unwrap_err();
		assert!(matches!(err, LinkError::InvalidHex(_)));
	}

	#[test]
	fn test_non_ascii_after_underscores_is_invalid_hex() {
		let linker = Linker::new(&format!("6080__a{}", "é".repeat(20)));
		assert!(linker.unlinked_libraries().is_empty());

		let err = linker.into_bytes().unwrap_err();
		assert!(matches!(err, LinkError::InvalidHex(_)));
	}
}
