// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Parsing and formatting for the bech32 message envelope, and the error types surfaced at the
//! crate boundary.

use core::fmt;

use crate::bech32::{decode_without_checksum, encode_without_checksum, Bech32Error};
use crate::ser::DecodeError;
use crate::MAX_MESSAGE_SIZE;

/// Indicates a message can be encoded using the checksum-less bech32 envelope.
pub(crate) trait Bech32Encode: AsRef<[u8]> + TryFrom<Vec<u8>, Error = Bolt12ParseError> {
	/// Human readable part of the message's bech32 encoding.
	const BECH32_HRP: &'static str;

	/// Parses a bech32-encoded message into its TLV stream representation.
	fn from_bech32_str(s: &str) -> Result<Self, Bolt12ParseError> {
		if s.len() > MAX_MESSAGE_SIZE {
			return Err(Bolt12ParseError::Decode(DecodeError::InvalidValue));
		}

		let encoded = strip_continuations(s)?;
		let (hrp, data) = decode_without_checksum(&encoded)?;

		if hrp != Self::BECH32_HRP {
			return Err(Bolt12ParseError::InvalidBech32Hrp);
		}

		Self::try_from(data)
	}

	/// Formats the message using the checksum-less bech32 envelope.
	fn fmt_bech32_str(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
		f.write_str(&encode_without_checksum(Self::BECH32_HRP, self.as_ref()))
	}
}

/// Removes transport line wrapping from a message: a `+` between two message characters marks a
/// continuation and is dropped along with the run of ASCII whitespace following it.
///
/// A marker at either end of the string, or immediately after another marker, has no message
/// characters to join and fails. Whitespace that is not consumed by a marker stays in the
/// output for the character-set check to reject.
fn strip_continuations(s: &str) -> Result<String, Bolt12ParseError> {
	let mut stripped = String::with_capacity(s.len());
	let mut continuing = false;
	for c in s.chars() {
		if c == '+' {
			if continuing || stripped.is_empty() {
				return Err(Bolt12ParseError::InvalidContinuation);
			}
			continuing = true;
		} else if continuing && c.is_ascii_whitespace() {
			// Part of the continuation marker's whitespace run.
		} else {
			continuing = false;
			stripped.push(c);
		}
	}
	if continuing {
		return Err(Bolt12ParseError::InvalidContinuation);
	}

	Ok(stripped)
}

/// Error when parsing a BOLT 12 message from its textual or binary form.
#[derive(Debug, PartialEq)]
pub enum Bolt12ParseError {
	/// The bech32 encoding does not conform to the BOLT 12 requirements for continuing messages
	/// across multiple parts (i.e., '+' followed by whitespace).
	InvalidContinuation,
	/// The bech32 encoding's human-readable part does not match what was expected for the
	/// message being parsed.
	InvalidBech32Hrp,
	/// The string could not be bech32 decoded.
	Bech32(Bech32Error),
	/// The bech32 decoded string could not be decoded as the expected message's TLV stream.
	Decode(DecodeError),
	/// The parsed TLV stream has invalid semantics for the message kind.
	InvalidSemantics(Bolt12SemanticError),
}

impl fmt::Display for Bolt12ParseError {
	fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
		match self {
			Bolt12ParseError::InvalidContinuation => {
				f.write_str("invalid '+' continuation marker")
			},
			Bolt12ParseError::InvalidBech32Hrp => f.write_str("unexpected bech32 prefix"),
			Bolt12ParseError::Bech32(e) => write!(f, "bech32 decoding failed: {}", e),
			Bolt12ParseError::Decode(e) => write!(f, "TLV stream decoding failed: {}", e),
			Bolt12ParseError::InvalidSemantics(e) => write!(f, "invalid message: {}", e),
		}
	}
}

impl std::error::Error for Bolt12ParseError {}

impl From<Bech32Error> for Bolt12ParseError {
	fn from(error: Bech32Error) -> Self {
		Self::Bech32(error)
	}
}

impl From<DecodeError> for Bolt12ParseError {
	fn from(error: DecodeError) -> Self {
		Self::Decode(error)
	}
}

impl From<Bolt12SemanticError> for Bolt12ParseError {
	fn from(error: Bolt12SemanticError) -> Self {
		Self::InvalidSemantics(error)
	}
}

/// Error when interpreting a TLV stream as a specific message kind, or when building a message
/// that would violate the kind's rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bolt12SemanticError {
	/// An amount was expected but was missing.
	MissingAmount,
	/// The amount exceeded the total bitcoin supply.
	InvalidAmount,
	/// An amount was set without the required description.
	MissingDescription,
	/// The chain is not among the chains the mirrored offer declared.
	UnsupportedChain,
	/// An offer lacked both an issuer id and blinded paths.
	MissingIssuerId,
	/// Payer metadata was expected but was missing or empty.
	MissingPayerMetadata,
	/// A payer id was expected but was missing.
	MissingPayerId,
	/// An invoice creation time was expected but was missing.
	MissingCreationTime,
	/// An invoice payment hash was expected but was missing.
	MissingPaymentHash,
	/// An invoice signing pubkey (node id) was expected but was missing.
	MissingSigningPubkey,
	/// A signature was expected but was missing.
	MissingSignature,
	/// The blinded pay-info entries do not match the blinded paths count, or one of them
	/// cannot be represented on the wire.
	InvalidPayInfo,
	/// A public key had a length other than 33 (compressed) or 32 (x-only) bytes.
	InvalidPubkey,
	/// A blinded path cannot be represented on the wire (no hops, too many hops, or an
	/// oversized hop payload).
	InvalidPath,
	/// A fallback address program does not fit its length prefix.
	InvalidFallbackAddress,
	/// A human-readable payment name part was empty, too long, or used a disallowed character.
	InvalidBip353Name,
	/// A suggested value was given without naming the erroneous field it replaces.
	MissingErroneousField,
	/// An invoice error lacked the required error message.
	MissingErrorMessage,
}

impl fmt::Display for Bolt12SemanticError {
	fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
		let message = match self {
			Bolt12SemanticError::MissingAmount => "currency requires an amount",
			Bolt12SemanticError::InvalidAmount => "amount exceeds the total bitcoin supply",
			Bolt12SemanticError::MissingDescription => "amount requires a description",
			Bolt12SemanticError::UnsupportedChain => "chain not offered",
			Bolt12SemanticError::MissingIssuerId => "offer has neither issuer id nor paths",
			Bolt12SemanticError::MissingPayerMetadata => "missing or empty invreq_metadata",
			Bolt12SemanticError::MissingPayerId => "missing invreq_payer_id",
			Bolt12SemanticError::MissingCreationTime => "missing invoice_created_at",
			Bolt12SemanticError::MissingPaymentHash => "missing invoice_payment_hash",
			Bolt12SemanticError::MissingSigningPubkey => "missing invoice_node_id",
			Bolt12SemanticError::MissingSignature => "missing signature",
			Bolt12SemanticError::InvalidPayInfo => {
				"invoice_blindedpay count does not match invoice_paths count"
			},
			Bolt12SemanticError::InvalidPubkey => "public key must be 33 or 32 bytes",
			Bolt12SemanticError::InvalidPath => "blinded path does not fit the wire encoding",
			Bolt12SemanticError::InvalidFallbackAddress => "fallback address program too long",
			Bolt12SemanticError::InvalidBip353Name => {
				"bip 353 name parts must be 1-255 characters from [0-9A-Za-z._-]"
			},
			Bolt12SemanticError::MissingErroneousField => {
				"suggested_value requires erroneous_field"
			},
			Bolt12SemanticError::MissingErrorMessage => "missing error message",
		};
		f.write_str(message)
	}
}

impl std::error::Error for Bolt12SemanticError {}
