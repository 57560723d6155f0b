// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! TLV record framing: [`BigSize`] type and length prefixes around raw values.

use std::io;

use crate::ser::{BigSize, DecodeError, LengthCalculatingWriter, Readable, Writeable, Writer};

/// A view of one TLV record within an encoded stream.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TlvRecord<'a> {
	/// The record's type.
	pub r#type: u64,
	/// The full serialized record: type, length, and value bytes.
	pub record_bytes: &'a [u8],
	/// The record's value bytes.
	pub value: &'a [u8],
}

impl<'a> TlvRecord<'a> {
	/// Decodes the record's value, requiring that it is consumed in full.
	pub fn decode<T: Readable>(&self) -> Result<T, DecodeError> {
		let mut reader = io::Cursor::new(self.value);
		let value = T::read(&mut reader)?;
		if (reader.position() as usize) != self.value.len() {
			return Err(DecodeError::InvalidValue);
		}
		Ok(value)
	}
}

/// An [`Iterator`] over a byte buffer yielding [`TlvRecord`]s, checking the framing as it goes.
/// Truncated type, length, or value bytes surface as [`DecodeError::ShortRead`].
pub(crate) struct TlvStream<'a> {
	data: io::Cursor<&'a [u8]>,
}

impl<'a> TlvStream<'a> {
	pub fn new(data: &'a [u8]) -> Self {
		Self { data: io::Cursor::new(data) }
	}
}

impl<'a> Iterator for TlvStream<'a> {
	type Item = Result<TlvRecord<'a>, DecodeError>;

	fn next(&mut self) -> Option<Self::Item> {
		let buffer: &'a [u8] = *self.data.get_ref();
		let start = self.data.position() as usize;
		if start >= buffer.len() {
			return None;
		}

		let r#type = match BigSize::read(&mut self.data) {
			Ok(r#type) => r#type.0,
			Err(e) => return Some(Err(e)),
		};
		let length = match BigSize::read(&mut self.data) {
			Ok(length) => length.0,
			Err(e) => return Some(Err(e)),
		};

		let value_start = self.data.position() as usize;
		let remaining = (buffer.len() - value_start) as u64;
		if length > remaining {
			// Leave the cursor at the end so that iteration stops after the error.
			self.data.set_position(buffer.len() as u64);
			return Some(Err(DecodeError::ShortRead));
		}
		let value_end = value_start + length as usize;
		self.data.set_position(value_end as u64);

		Some(Ok(TlvRecord {
			r#type,
			record_bytes: &buffer[start..value_end],
			value: &buffer[value_start..value_end],
		}))
	}
}

/// Writes one TLV record: `BigSize(type)`, `BigSize(length)`, then the value's serialization.
/// Callers are responsible for emitting records in ascending type order.
pub(crate) fn write_tlv_record<W: Writer, V: Writeable>(
	writer: &mut W, r#type: u64, value: &V,
) -> Result<(), io::Error> {
	let mut length = LengthCalculatingWriter(0);
	value.write(&mut length).expect("length calculation cannot fail");
	BigSize(r#type).write(writer)?;
	BigSize(length.0 as u64).write(writer)?;
	value.write(writer)
}

/// Walks a TLV stream once, enforcing the stream invariants shared by every message kind:
/// strictly ascending unique types and the "it's OK to be odd" rule. `handle_record` returns
/// whether it recognized the record; unrecognized even types fail decoding while unrecognized
/// odd types are skipped.
pub(crate) fn parse_stream<F>(bytes: &[u8], mut handle_record: F) -> Result<(), DecodeError>
where
	F: FnMut(&TlvRecord) -> Result<bool, DecodeError>,
{
	let mut last_type = None;
	for record in TlvStream::new(bytes) {
		let record = record?;
		if let Some(last_type) = last_type {
			if record.r#type <= last_type {
				return Err(DecodeError::UnorderedTlvStream);
			}
		}
		last_type = Some(record.r#type);

		if !handle_record(&record)? && record.r#type % 2 == 0 {
			return Err(DecodeError::UnknownEvenType(record.r#type));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::{parse_stream, write_tlv_record, TlvStream};
	use crate::ser::{DecodeError, Tu64, WithoutLength};

	fn stream_of(records: &[(u64, &[u8])]) -> Vec<u8> {
		let mut bytes = Vec::new();
		for (r#type, value) in records {
			write_tlv_record(&mut bytes, *r#type, &WithoutLength(&value.to_vec())).unwrap();
		}
		bytes
	}

	#[test]
	fn records_round_trip() {
		let bytes = stream_of(&[(1, &[0xAA]), (2, &[]), (0xFD00, &[0xBB, 0xCC])]);
		let records = TlvStream::new(&bytes)
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		assert_eq!(records.len(), 3);
		assert_eq!(records[0].r#type, 1);
		assert_eq!(records[0].value, &[0xAA]);
		assert_eq!(records[1].r#type, 2);
		assert_eq!(records[1].value, &[] as &[u8]);
		assert_eq!(records[2].r#type, 0xFD00);
		assert_eq!(records[2].value, &[0xBB, 0xCC]);

		let rewritten: Vec<u8> = records.iter().flat_map(|r| r.record_bytes.to_vec()).collect();
		assert_eq!(rewritten, bytes);
	}

	#[test]
	fn truncated_value_fails() {
		let mut bytes = stream_of(&[(1, &[0xAA, 0xBB])]);
		bytes.pop();
		let result = TlvStream::new(&bytes).collect::<Result<Vec<_>, _>>();
		assert_eq!(result.unwrap_err(), DecodeError::ShortRead);
	}

	#[test]
	fn truncated_length_fails() {
		// Type 1, then a 0xFD length prefix missing its two payload bytes.
		let bytes = vec![0x01, 0xFD];
		let result = TlvStream::new(&bytes).collect::<Result<Vec<_>, _>>();
		assert_eq!(result.unwrap_err(), DecodeError::ShortRead);
	}

	#[test]
	fn record_value_must_be_fully_consumed() {
		let bytes = stream_of(&[(1, &[0x01; 9])]);
		let records = TlvStream::new(&bytes).collect::<Result<Vec<_>, _>>().unwrap();
		// Nine bytes cannot be a truncated u64.
		assert_eq!(records[0].decode::<Tu64>(), Err(DecodeError::InvalidValue));
	}

	#[test]
	fn parse_stream_enforces_ascending_types() {
		let bytes = stream_of(&[(3, &[]), (1, &[])]);
		let result = parse_stream(&bytes, |_| Ok(true));
		assert_eq!(result.unwrap_err(), DecodeError::UnorderedTlvStream);

		let bytes = stream_of(&[(1, &[]), (1, &[])]);
		let result = parse_stream(&bytes, |_| Ok(true));
		assert_eq!(result.unwrap_err(), DecodeError::UnorderedTlvStream);
	}

	#[test]
	fn parse_stream_applies_the_oddness_rule() {
		let bytes = stream_of(&[(9, &[0x01])]);
		assert!(parse_stream(&bytes, |_| Ok(false)).is_ok());

		let bytes = stream_of(&[(8, &[0x01])]);
		let result = parse_stream(&bytes, |_| Ok(false));
		assert_eq!(result.unwrap_err(), DecodeError::UnknownEvenType(8));
	}
}
