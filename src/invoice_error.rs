// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Data structures and encoding for `invoice_error` messages.
//!
//! An [`InvoiceError`] is sent in reply to an [`InvoiceRequest`] or an [`Invoice`] that could
//! not be handled. Unlike the other message kinds it travels as a bare TLV stream over the
//! messaging transport and has no bech32 envelope and no signature.
//!
//! [`InvoiceRequest`]: crate::invoice_request::InvoiceRequest
//! [`Invoice`]: crate::invoice::Invoice

use std::io;

use crate::parse::{Bolt12ParseError, Bolt12SemanticError};
use crate::ser::{Tu64, Writeable, Writer, WithoutLength};
use crate::tlv::{self, write_tlv_record};
use crate::UntrustedString;

const ERROR_TYPE_ERRONEOUS_FIELD: u64 = 1;
const ERROR_TYPE_SUGGESTED_VALUE: u64 = 3;
const ERROR_TYPE_MESSAGE: u64 = 5;

/// An error in response to an invoice request or an invoice.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceError {
	erroneous_field: Option<u64>,
	suggested_value: Option<Vec<u8>>,
	message: UntrustedString,
}

impl InvoiceError {
	/// Creates an `InvoiceError` with the given explanation, optionally naming the TLV type of
	/// the field that caused it and a value to use instead.
	///
	/// Errors when a suggested value is given without naming the erroneous field it replaces.
	pub fn new(
		erroneous_field: Option<u64>, suggested_value: Option<Vec<u8>>, message: String,
	) -> Result<Self, Bolt12SemanticError> {
		if suggested_value.is_some() && erroneous_field.is_none() {
			return Err(Bolt12SemanticError::MissingErroneousField);
		}

		Ok(InvoiceError { erroneous_field, suggested_value, message: UntrustedString(message) })
	}

	/// Creates an `InvoiceError` carrying only an explanation.
	pub fn from_string(message: String) -> Self {
		InvoiceError {
			erroneous_field: None,
			suggested_value: None,
			message: UntrustedString(message),
		}
	}

	/// The TLV type of the field in the replied-to message that caused the error, if the error
	/// pertains to a specific field.
	pub fn erroneous_field(&self) -> Option<u64> {
		self.erroneous_field
	}

	/// A value the sender would have accepted for the erroneous field.
	pub fn suggested_value(&self) -> Option<&Vec<u8>> {
		self.suggested_value.as_ref()
	}

	/// An explanation of the error. Intended to be displayed to the user but with the caveat
	/// that it has not been verified in any way.
	pub fn message(&self) -> &UntrustedString {
		&self.message
	}
}

impl Writeable for InvoiceError {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		if let Some(erroneous_field) = self.erroneous_field {
			write_tlv_record(writer, ERROR_TYPE_ERRONEOUS_FIELD, &Tu64(erroneous_field))?;
		}
		if let Some(suggested_value) = &self.suggested_value {
			write_tlv_record(writer, ERROR_TYPE_SUGGESTED_VALUE, &WithoutLength(suggested_value))?;
		}
		write_tlv_record(writer, ERROR_TYPE_MESSAGE, &WithoutLength(&self.message.0))
	}
}

impl TryFrom<Vec<u8>> for InvoiceError {
	type Error = Bolt12ParseError;

	fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
		let mut erroneous_field = None;
		let mut suggested_value = None;
		let mut message = None;
		tlv::parse_stream(&bytes, |record| {
			match record.r#type {
				ERROR_TYPE_ERRONEOUS_FIELD => {
					erroneous_field = Some(record.decode::<Tu64>()?.0);
				},
				ERROR_TYPE_SUGGESTED_VALUE => {
					suggested_value = Some(record.decode::<WithoutLength<Vec<u8>>>()?.0);
				},
				ERROR_TYPE_MESSAGE => {
					message = Some(record.decode::<WithoutLength<String>>()?.0);
				},
				_ => return Ok(false),
			}
			Ok(true)
		})?;

		let message = match message {
			None => {
				return Err(Bolt12ParseError::InvalidSemantics(
					Bolt12SemanticError::MissingErrorMessage,
				));
			},
			Some(message) => message,
		};

		InvoiceError::new(erroneous_field, suggested_value, message).map_err(Into::into)
	}
}

impl core::fmt::Display for InvoiceError {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		core::fmt::Display::fmt(&self.message, f)
	}
}

#[cfg(test)]
mod tests {
	use super::InvoiceError;
	use crate::parse::{Bolt12ParseError, Bolt12SemanticError};
	use crate::ser::{DecodeError, Tu64, Writeable, WithoutLength};
	use crate::tlv::write_tlv_record;

	#[test]
	fn invoice_error_round_trips() {
		let error = InvoiceError::new(
			Some(170),
			Some(vec![0x01, 0x02]),
			"amount too low".to_string(),
		)
		.unwrap();

		let encoded = error.encode();
		let decoded = InvoiceError::try_from(encoded).unwrap();
		assert_eq!(decoded, error);
		assert_eq!(decoded.erroneous_field(), Some(170));
		assert_eq!(decoded.suggested_value(), Some(&vec![0x01, 0x02]));
		assert_eq!(decoded.message().to_string(), "amount too low");

		let minimal = InvoiceError::from_string("no".to_string());
		assert_eq!(InvoiceError::try_from(minimal.encode()).unwrap(), minimal);
	}

	#[test]
	fn suggested_value_requires_erroneous_field_when_building() {
		match InvoiceError::new(None, Some(vec![0x01]), "x".to_string()) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12SemanticError::MissingErroneousField),
		}
	}

	#[test]
	fn suggested_value_requires_erroneous_field_when_parsing() {
		let mut bytes = Vec::new();
		write_tlv_record(&mut bytes, 3, &WithoutLength(&vec![0x01u8])).unwrap();
		write_tlv_record(&mut bytes, 5, &WithoutLength(&"x".to_string())).unwrap();

		match InvoiceError::try_from(bytes) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(
				e,
				Bolt12ParseError::InvalidSemantics(Bolt12SemanticError::MissingErroneousField),
			),
		}
	}

	#[test]
	fn message_is_required_when_parsing() {
		let mut bytes = Vec::new();
		write_tlv_record(&mut bytes, 1, &Tu64(170)).unwrap();

		match InvoiceError::try_from(bytes) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(
				e,
				Bolt12ParseError::InvalidSemantics(Bolt12SemanticError::MissingErrorMessage),
			),
		}
	}

	#[test]
	fn unknown_records_follow_the_oddness_rule() {
		let mut bytes = InvoiceError::from_string("x".to_string()).encode();
		write_tlv_record(&mut bytes, 7, &WithoutLength(&vec![0x01u8])).unwrap();
		assert!(InvoiceError::try_from(bytes).is_ok());

		let mut bytes = Vec::new();
		write_tlv_record(&mut bytes, 2, &WithoutLength(&vec![0x01u8])).unwrap();
		write_tlv_record(&mut bytes, 5, &WithoutLength(&"x".to_string())).unwrap();
		match InvoiceError::try_from(bytes) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::Decode(DecodeError::UnknownEvenType(2))),
		}
	}
}
