// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A codec for Lightning Offers
//! ([BOLT 12](https://github.com/lightning/bolts/blob/master/12-offer-encoding.md)) messages.
//!
//! This crate encodes and decodes the four BOLT 12 message kinds and implements the merkle
//! tree construction their BIP-340 Schnorr signatures commit to. It is purely a codec: the
//! same input bytes always produce the same output bytes, nothing is retried or recovered,
//! and there is no I/O, no clock, and no randomness. All keys and nonces are supplied by the
//! caller, who is responsible for zeroising secret material after use.
//!
//!   * For offers (`lno`) use [`offer::Offer`] and [`offer::OfferBuilder`]
//!   * For invoice requests (`lnr`) use [`invoice_request::InvoiceRequest`], built from a
//!     parsed offer via [`offer::Offer::request_invoice`]
//!   * For invoices (`lni`) use [`invoice::Invoice`], built from a parsed request via
//!     [`invoice_request::InvoiceRequest::respond_with`]
//!   * For invoice errors, a bare TLV stream, use [`invoice_error::InvoiceError`]
//!
//! Textual parsing uses `str::parse` and encoding uses the `Display` trait; binary parsing
//! uses `TryFrom<Vec<u8>>` and encoding uses [`ser::Writeable`]. Signed message kinds are
//! decoded without verifying their signature; verification is an explicit, boolean-returning
//! call so that callers choose the key they trust.

pub mod bech32;
pub mod bip353;
pub mod blinded_path;
pub mod fallback;
pub mod invoice;
pub mod invoice_error;
pub mod invoice_request;
mod merkle;
pub mod offer;
pub mod parse;
pub mod ser;
mod tlv;

pub use crate::merkle::SignError;

/// The maximum length, in characters, of an accepted bech32-enveloped message. Decoding longer
/// inputs fails before any of the input is inspected.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// The total supply of bitcoin in millisatoshi, an upper bound for any bitcoin-denominated
/// amount field.
pub const MAX_VALUE_MSAT: u64 = 21_000_000_0000_0000_000;

/// The payment hash of an invoice: the SHA256 hash of the payment preimage whose release the
/// payment buys.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct PaymentHash(pub [u8; 32]);

/// Counterparty-chosen text carried in a decoded message: descriptions, issuers, payer notes,
/// and error explanations.
///
/// The wire format places no restriction on these fields, so displaying one substitutes
/// [`core::char::REPLACEMENT_CHARACTER`] for control characters instead of passing them
/// through to a terminal. The raw text remains available through [`UntrustedString::as_str`].
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct UntrustedString(pub String);

impl UntrustedString {
	/// The raw text, which may contain control characters.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl core::fmt::Display for UntrustedString {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		use core::fmt::Write;
		self.0
			.chars()
			.map(|c| if c.is_control() { core::char::REPLACEMENT_CHARACTER } else { c })
			.try_for_each(|c| f.write_char(c))
	}
}

#[cfg(test)]
mod tests {
	use super::UntrustedString;

	#[test]
	fn untrusted_text_displays_without_control_characters() {
		let text = UntrustedString("pay me\u{7} now\r\n".to_string());
		assert_eq!(text.as_str(), "pay me\u{7} now\r\n");
		assert_eq!(text.to_string(), "pay me\u{FFFD} now\u{FFFD}\u{FFFD}");
	}
}
