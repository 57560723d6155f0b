// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Human-readable payment names in the `user@domain` form defined by BIP 353, as reflected
//! into invoice requests resolved from DNS.

use core::fmt;
use std::io::{self, Read};

use crate::parse::Bolt12SemanticError;
use crate::ser::{DecodeError, Readable, Writeable, Writer};

/// A `user@domain` payment name. Both parts are restricted to one to 255 characters from
/// `[0-9A-Za-z._-]`, keeping the name unambiguous when rendered or embedded in DNS queries.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct HumanReadableName {
	user: String,
	domain: String,
}

fn is_valid_part(part: &str) -> bool {
	!part.is_empty()
		&& part.len() <= 255
		&& part.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

impl HumanReadableName {
	/// Constructs a new [`HumanReadableName`] from the `user` and `domain` parts. See the
	/// struct-level documentation for the requirements on each.
	pub fn new(user: String, domain: String) -> Result<HumanReadableName, Bolt12SemanticError> {
		if !is_valid_part(&user) || !is_valid_part(&domain) {
			return Err(Bolt12SemanticError::InvalidBip353Name);
		}
		Ok(HumanReadableName { user, domain })
	}

	/// Constructs a new [`HumanReadableName`] from the standard encoding `user`@`domain`.
	///
	/// If `user` includes the standard BIP 353 ₿ prefix it is removed, as required by BIP 353.
	pub fn from_encoded(encoded: &str) -> Result<HumanReadableName, Bolt12SemanticError> {
		match encoded.strip_prefix('₿').unwrap_or(encoded).split_once('@') {
			Some((user, domain)) => Self::new(user.to_string(), domain.to_string()),
			None => Err(Bolt12SemanticError::InvalidBip353Name),
		}
	}

	/// Gets the `user` part of this human-readable name.
	pub fn user(&self) -> &str {
		&self.user
	}

	/// Gets the `domain` part of this human-readable name.
	pub fn domain(&self) -> &str {
		&self.domain
	}
}

impl fmt::Display for HumanReadableName {
	fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
		write!(f, "{}@{}", self.user, self.domain)
	}
}

// Serialized per the requirements for inclusion in an `invoice_request`: each part prefixed by
// its byte length.
impl Writeable for HumanReadableName {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		(self.user.len() as u8).write(writer)?;
		writer.write_all(self.user.as_bytes())?;
		(self.domain.len() as u8).write(writer)?;
		writer.write_all(self.domain.as_bytes())
	}
}

impl Readable for HumanReadableName {
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let mut read_part = |reader: &mut R| -> Result<String, DecodeError> {
			let len: u8 = Readable::read(reader)?;
			let mut bytes = vec![0; len as usize];
			reader.read_exact(&mut bytes)?;
			String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
		};
		let user = read_part(reader)?;
		let domain = read_part(reader)?;
		HumanReadableName::new(user, domain).map_err(|_| DecodeError::InvalidValue)
	}
}

#[cfg(test)]
mod tests {
	use super::HumanReadableName;
	use crate::parse::Bolt12SemanticError;
	use crate::ser::{DecodeError, Readable, Writeable};
	use std::io::Cursor;

	#[test]
	fn parses_and_displays_encoded_names() {
		let name = HumanReadableName::from_encoded("user_1@example-node.com").unwrap();
		assert_eq!(name.user(), "user_1");
		assert_eq!(name.domain(), "example-node.com");
		assert_eq!(name.to_string(), "user_1@example-node.com");

		let name = HumanReadableName::from_encoded("₿donations@example.com").unwrap();
		assert_eq!(name.user(), "donations");

		assert_eq!(
			HumanReadableName::from_encoded("no-separator"),
			Err(Bolt12SemanticError::InvalidBip353Name),
		);
	}

	#[test]
	fn rejects_disallowed_characters_and_lengths() {
		let cases = [
			("with space", "example.com"),
			("user", "exa mple.com"),
			("us€r", "example.com"),
			("", "example.com"),
			("user", ""),
		];
		for (user, domain) in cases {
			assert_eq!(
				HumanReadableName::new(user.to_string(), domain.to_string()),
				Err(Bolt12SemanticError::InvalidBip353Name),
			);
		}

		let too_long = "a".repeat(256);
		assert_eq!(
			HumanReadableName::new(too_long, "example.com".to_string()),
			Err(Bolt12SemanticError::InvalidBip353Name),
		);
	}

	#[test]
	fn name_round_trips() {
		let name = HumanReadableName::from_encoded("user@example.com").unwrap();
		let encoded = name.encode();
		assert_eq!(encoded.len(), 1 + 4 + 1 + 11);
		assert_eq!(HumanReadableName::read(&mut Cursor::new(&encoded)).unwrap(), name);
	}

	#[test]
	fn decoding_rejects_disallowed_characters() {
		let mut encoded = Vec::new();
		(4u8).write(&mut encoded).unwrap();
		encoded.extend_from_slice(b"u..r"); // valid
		(7u8).write(&mut encoded).unwrap();
		encoded.extend_from_slice(b"exa mple");
		// Length prefix of 7 with 8 bytes appended: the name decodes 7 bytes, including the
		// space, and fails on it.
		assert_eq!(
			HumanReadableName::read(&mut Cursor::new(&encoded)),
			Err(DecodeError::InvalidValue),
		);
	}

	#[test]
	fn truncated_name_fails() {
		let name = HumanReadableName::from_encoded("user@example.com").unwrap();
		let mut encoded = name.encode();
		encoded.pop();
		assert_eq!(
			HumanReadableName::read(&mut Cursor::new(&encoded)),
			Err(DecodeError::ShortRead),
		);
	}
}
