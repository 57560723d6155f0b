// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Wire representation for on-chain fallback addresses carried in invoices.

use std::io::{self, Read};

use crate::parse::Bolt12SemanticError;
use crate::ser::{DecodeError, Readable, Writeable, Writer};

/// An on-chain address a payer may fall back to if paying the invoice over lightning fails:
/// a segwit witness version and witness program. The codec does not interpret the program;
/// address reconstruction is up to the caller and its chain.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct FallbackAddress {
	/// The witness version of the address.
	pub version: u8,
	/// The witness program of the address.
	pub program: Vec<u8>,
}

impl FallbackAddress {
	pub(crate) fn check_encodable(&self) -> Result<(), Bolt12SemanticError> {
		if self.program.len() > u16::max_value() as usize {
			return Err(Bolt12SemanticError::InvalidFallbackAddress);
		}
		Ok(())
	}
}

impl Writeable for FallbackAddress {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.version.write(w)?;
		self.program.write(w)
	}
}

impl Readable for FallbackAddress {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let version = Readable::read(r)?;
		let program = Readable::read(r)?;
		Ok(FallbackAddress { version, program })
	}
}

#[cfg(test)]
mod tests {
	use super::FallbackAddress;
	use crate::ser::{DecodeError, Readable, Writeable, WithoutLength};
	use std::io::Cursor;

	#[test]
	fn fallback_address_round_trips() {
		let address = FallbackAddress { version: 1, program: vec![0x51; 32] };
		let encoded = address.encode();
		assert_eq!(encoded.len(), 1 + 2 + 32);
		assert_eq!(FallbackAddress::read(&mut Cursor::new(&encoded)).unwrap(), address);
	}

	#[test]
	fn concatenated_fallbacks_decode_to_end_of_value() {
		let fallbacks = vec![
			FallbackAddress { version: 0, program: vec![0x00; 20] },
			FallbackAddress { version: 1, program: vec![0x51; 32] },
		];
		let encoded = WithoutLength(&fallbacks).encode();
		let decoded: WithoutLength<Vec<FallbackAddress>> =
			Readable::read(&mut Cursor::new(&encoded)).unwrap();
		assert_eq!(decoded.0, fallbacks);
	}

	#[test]
	fn truncated_fallback_fails() {
		let mut encoded = FallbackAddress { version: 0, program: vec![0x00; 20] }.encode();
		encoded.pop();
		assert_eq!(
			FallbackAddress::read(&mut Cursor::new(&encoded)),
			Err(DecodeError::ShortRead),
		);
	}
}
