// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! A small serialization framework for the primitive wire encodings used by BOLT 12 messages:
//! fixed-width big-endian integers, variable-width [`BigSize`] integers, truncated [`Tu64`]
//! integers, and raw values framed by an enclosing TLV record.

use bitcoin::blockdata::constants::ChainHash;
use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::PublicKey;
use std::io::{self, Read};

use crate::PaymentHash;

/// An error when decoding bytes into a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
	/// The input ended before the value was complete.
	ShortRead,
	/// A [`BigSize`] integer used a longer form than its value requires.
	NonMinimalBigSize,
	/// A value was malformed: wrong length for the field, invalid key material, trailing bytes
	/// inside a TLV value, or a similar structural defect.
	InvalidValue,
	/// A TLV record used an even type which is not defined for the message being decoded.
	///
	/// Even types are required to be understood, so these fail decoding. Integrators wanting to
	/// accept such records anyway can match on this variant.
	UnknownEvenType(u64),
	/// The TLV records were not in strictly ascending type order, or a type was duplicated.
	UnorderedTlvStream,
	/// A text field did not contain valid UTF-8.
	InvalidUtf8,
	/// An error from the underlying reader.
	Io(io::ErrorKind),
}

impl core::fmt::Display for DecodeError {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		match self {
			DecodeError::ShortRead => f.write_str("input truncated mid-value"),
			DecodeError::NonMinimalBigSize => f.write_str("non-minimally encoded bigsize integer"),
			DecodeError::InvalidValue => f.write_str("malformed value"),
			DecodeError::UnknownEvenType(t) => write!(f, "unknown even TLV type {}", t),
			DecodeError::UnorderedTlvStream => {
				f.write_str("TLV types not strictly ascending")
			},
			DecodeError::InvalidUtf8 => f.write_str("text field is not valid UTF-8"),
			DecodeError::Io(kind) => write!(f, "read failed: {:?}", kind),
		}
	}
}

impl std::error::Error for DecodeError {}

impl From<io::Error> for DecodeError {
	fn from(e: io::Error) -> Self {
		if e.kind() == io::ErrorKind::UnexpectedEof {
			DecodeError::ShortRead
		} else {
			DecodeError::Io(e.kind())
		}
	}
}

/// A sink for serialized bytes.
///
/// Implemented for anything implementing [`std::io::Write`]. Separate from that trait so that
/// non-IO sinks, such as the length-calculating writer used to size TLV values, can be
/// targeted as well.
pub trait Writer {
	/// Writes the given buf out. See [`std::io::Write::write_all`] for more.
	fn write_all(&mut self, buf: &[u8]) -> Result<(), io::Error>;
}

impl<W: io::Write> Writer for W {
	#[inline]
	fn write_all(&mut self, buf: &[u8]) -> Result<(), io::Error> {
		<Self as io::Write>::write_all(self, buf)
	}
}

/// Tracks the length of data written into it without storing the data. Used to size a TLV value
/// before emitting its length prefix.
pub(crate) struct LengthCalculatingWriter(pub usize);

impl Writer for LengthCalculatingWriter {
	#[inline]
	fn write_all(&mut self, buf: &[u8]) -> Result<(), io::Error> {
		self.0 += buf.len();
		Ok(())
	}
}

/// A value which can be serialized into a [`Writer`].
pub trait Writeable {
	/// Writes `self` out to the given [`Writer`].
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error>;

	/// Writes `self` out to a `Vec<u8>`.
	fn encode(&self) -> Vec<u8> {
		let mut buffer = Vec::new();
		self.write(&mut buffer).expect("in-memory writes cannot fail");
		buffer
	}
}

impl<'a, T: Writeable> Writeable for &'a T {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		(*self).write(writer)
	}
}

/// A value which can be deserialized from a [`Read`] stream.
pub trait Readable
where
	Self: Sized,
{
	/// Reads a `Self` in from the given [`Read`].
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError>;
}

macro_rules! impl_writeable_int {
	($val_type:ty, $len:expr) => {
		impl Writeable for $val_type {
			#[inline]
			fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
				writer.write_all(&self.to_be_bytes())
			}
		}

		impl Readable for $val_type {
			#[inline]
			fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
				let mut buf = [0; $len];
				reader.read_exact(&mut buf)?;
				Ok(<$val_type>::from_be_bytes(buf))
			}
		}
	};
}

impl_writeable_int!(u8, 1);
impl_writeable_int!(u16, 2);
impl_writeable_int!(u32, 4);
impl_writeable_int!(u64, 8);

macro_rules! impl_writeable_array {
	($len:expr) => {
		impl Writeable for [u8; $len] {
			#[inline]
			fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
				writer.write_all(self)
			}
		}

		impl Readable for [u8; $len] {
			#[inline]
			fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
				let mut buf = [0u8; $len];
				reader.read_exact(&mut buf)?;
				Ok(buf)
			}
		}
	};
}

impl_writeable_array!(3); // ISO 4217 currency codes
impl_writeable_array!(32); // chain hashes and payment hashes
impl_writeable_array!(33); // compressed public keys
impl_writeable_array!(64); // Schnorr signatures

// Byte strings inside composite values carry a 16-bit big-endian length prefix.
impl Writeable for Vec<u8> {
	#[inline]
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		(self.len() as u16).write(w)?;
		w.write_all(self)
	}
}

impl Readable for Vec<u8> {
	#[inline]
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let len: u16 = Readable::read(r)?;
		let mut buf = vec![0; len as usize];
		r.read_exact(&mut buf)?;
		Ok(buf)
	}
}

impl Writeable for PublicKey {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.serialize().write(w)
	}
}

impl Readable for PublicKey {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let buf: [u8; 33] = Readable::read(r)?;
		PublicKey::from_slice(&buf).map_err(|_| DecodeError::InvalidValue)
	}
}

impl Writeable for Signature {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.as_ref().write(w)
	}
}

impl Readable for Signature {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let buf: [u8; 64] = Readable::read(r)?;
		Signature::from_slice(&buf).map_err(|_| DecodeError::InvalidValue)
	}
}

impl Writeable for ChainHash {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		w.write_all(self.as_bytes())
	}
}

impl Readable for ChainHash {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let buf: [u8; 32] = Readable::read(r)?;
		Ok(ChainHash::from(buf))
	}
}

impl Writeable for PaymentHash {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.0.write(w)
	}
}

impl Readable for PaymentHash {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let buf: [u8; 32] = Readable::read(r)?;
		Ok(PaymentHash(buf))
	}
}

/// Lightning TLV uses a custom variable-length integer called `BigSize`. It is similar to
/// Bitcoin's variable-length integer except that it is serialized big-endian instead of
/// little-endian and non-minimal encodings are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BigSize(pub u64);

impl Writeable for BigSize {
	#[inline]
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		match self.0 {
			0..=0xFC => (self.0 as u8).write(writer),
			0xFD..=0xFFFF => {
				0xFDu8.write(writer)?;
				(self.0 as u16).write(writer)
			},
			0x10000..=0xFFFFFFFF => {
				0xFEu8.write(writer)?;
				(self.0 as u32).write(writer)
			},
			_ => {
				0xFFu8.write(writer)?;
				self.0.write(writer)
			},
		}
	}
}

impl Readable for BigSize {
	#[inline]
	fn read<R: Read>(reader: &mut R) -> Result<BigSize, DecodeError> {
		let n: u8 = Readable::read(reader)?;
		match n {
			0xFF => {
				let x: u64 = Readable::read(reader)?;
				if x < 0x100000000 {
					Err(DecodeError::NonMinimalBigSize)
				} else {
					Ok(BigSize(x))
				}
			},
			0xFE => {
				let x: u32 = Readable::read(reader)?;
				if x < 0x10000 {
					Err(DecodeError::NonMinimalBigSize)
				} else {
					Ok(BigSize(x as u64))
				}
			},
			0xFD => {
				let x: u16 = Readable::read(reader)?;
				if x < 0xFD {
					Err(DecodeError::NonMinimalBigSize)
				} else {
					Ok(BigSize(x as u64))
				}
			},
			n => Ok(BigSize(n as u64)),
		}
	}
}

/// A `u64` serialized big-endian with all leading zero bytes stripped, as used for TLV values
/// holding integers. Zero occupies no bytes at all.
///
/// Decoding accepts zero through eight bytes and tolerates redundant leading zero bytes; nine or
/// more bytes cannot fit a `u64` and fail. Reads to the end of the (TLV-bounded) stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tu64(pub u64);

impl Writeable for Tu64 {
	#[inline]
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		let leading_zero_bytes = (self.0.leading_zeros() / 8) as usize;
		writer.write_all(&self.0.to_be_bytes()[leading_zero_bytes..])
	}
}

impl Readable for Tu64 {
	#[inline]
	fn read<R: Read>(reader: &mut R) -> Result<Tu64, DecodeError> {
		let mut buf = Vec::with_capacity(8);
		reader.read_to_end(&mut buf)?;
		if buf.len() > 8 {
			return Err(DecodeError::InvalidValue);
		}
		let mut value = 0u64;
		for byte in buf {
			value = (value << 8) | byte as u64;
		}
		Ok(Tu64(value))
	}
}

/// Wrapper for a value whose length is supplied by the enclosing TLV record rather than a
/// length prefix of its own: raw UTF-8 strings, raw byte strings, and concatenated arrays of
/// composite values. Reading consumes the stream to its end.
pub(crate) struct WithoutLength<T>(pub T);

impl<'a> Writeable for WithoutLength<&'a String> {
	#[inline]
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		writer.write_all(self.0.as_bytes())
	}
}

impl Readable for WithoutLength<String> {
	#[inline]
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let mut buf = Vec::new();
		reader.read_to_end(&mut buf)?;
		String::from_utf8(buf).map(WithoutLength).map_err(|_| DecodeError::InvalidUtf8)
	}
}

impl<'a, T: Writeable> Writeable for WithoutLength<&'a Vec<T>> {
	#[inline]
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		for value in self.0.iter() {
			value.write(writer)?;
		}
		Ok(())
	}
}

// Note for `T = u8` this reads the raw byte string; for composite values it consumes whole
// elements until the value is exhausted, failing on a partial trailing element.
impl<T: Readable> Readable for WithoutLength<Vec<T>> {
	#[inline]
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let mut buf = Vec::new();
		reader.read_to_end(&mut buf)?;
		let len = buf.len() as u64;
		let mut cursor = io::Cursor::new(buf);
		let mut values = Vec::new();
		while cursor.position() < len {
			values.push(T::read(&mut cursor)?);
		}
		Ok(WithoutLength(values))
	}
}

#[cfg(test)]
mod tests {
	use super::{BigSize, DecodeError, Readable, Tu64, Writeable};
	use std::io::Cursor;

	fn decode<T: Readable>(bytes: &[u8]) -> Result<T, DecodeError> {
		T::read(&mut Cursor::new(bytes))
	}

	#[test]
	fn bigsize_round_trips_at_boundaries() {
		let cases: &[(u64, usize)] = &[
			(0, 1),
			(0xFC, 1),
			(0xFD, 3),
			(0xFFFF, 3),
			(0x10000, 5),
			(0xFFFFFFFF, 5),
			(0x100000000, 9),
			(u64::max_value(), 9),
		];
		for &(value, encoded_len) in cases {
			let encoded = BigSize(value).encode();
			assert_eq!(encoded.len(), encoded_len, "length for {}", value);
			assert_eq!(decode::<BigSize>(&encoded), Ok(BigSize(value)));
		}
	}

	#[test]
	fn bigsize_rejects_non_minimal_encodings() {
		let cases: &[&[u8]] = &[
			&[0xFD, 0x00, 0xFC],
			&[0xFE, 0x00, 0x00, 0xFF, 0xFF],
			&[0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF],
		];
		for bytes in cases {
			assert_eq!(decode::<BigSize>(bytes), Err(DecodeError::NonMinimalBigSize));
		}
	}

	#[test]
	fn bigsize_rejects_truncation() {
		let cases: &[&[u8]] = &[&[], &[0xFD], &[0xFD, 0x01], &[0xFE, 0x01, 0x02], &[0xFF, 0x01]];
		for bytes in cases {
			assert_eq!(decode::<BigSize>(bytes), Err(DecodeError::ShortRead));
		}
	}

	#[test]
	fn tu64_zero_encodes_to_nothing() {
		assert_eq!(Tu64(0).encode(), Vec::<u8>::new());
		assert_eq!(decode::<Tu64>(&[]), Ok(Tu64(0)));
	}

	#[test]
	fn tu64_strips_leading_zero_bytes() {
		assert_eq!(Tu64(1).encode(), vec![0x01]);
		assert_eq!(Tu64(0x0102).encode(), vec![0x01, 0x02]);
		assert_eq!(Tu64(u64::max_value()).encode(), vec![0xFF; 8]);
	}

	#[test]
	fn tu64_tolerates_leading_zero_bytes_on_decode() {
		assert_eq!(decode::<Tu64>(&[0x00, 0x01]), Ok(Tu64(1)));
		assert_eq!(decode::<Tu64>(&[0x00, 0x00, 0x00]), Ok(Tu64(0)));
	}

	#[test]
	fn tu64_rejects_more_than_eight_bytes() {
		assert_eq!(decode::<Tu64>(&[0x01; 9]), Err(DecodeError::InvalidValue));
	}
}
