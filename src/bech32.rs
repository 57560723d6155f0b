//! The bech32-derived character encoding used by BOLT 12 messages.
//!
//! BOLT 12 strings use the bech32 character set and 5-bit data words but deliberately omit the
//! checksum, as the messages are long-lived and already signed where integrity matters. The
//! ecosystem `bech32` crate only offers checksummed encodings, so the checksum-less codec is
//! implemented here; [`encode_bech32m`] and [`decode_bech32m`] expose the crate-backed
//! checksummed variant as a companion utility for tests and tooling.

use core::fmt;

/// An unsigned 5-bit value, the basic data word of bech32 encoding. Always in the range 0..=31.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[allow(non_camel_case_types)]
pub struct u5(u8);

/// Errors from encoding or decoding the checksum-less textual envelope.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Bech32Error {
	/// The string has no `1` separating the human-readable prefix from the data.
	MissingSeparator,
	/// The string mixes upper and lower case characters.
	MixedCase,
	/// The string has a separator but no data characters after it.
	EmptyPayload,
	/// A character is not part of the bech32 character set.
	InvalidCharacter(char),
	/// The trailing padding bits were non-zero, or a whole superfluous padding word was present.
	InvalidPadding,
	/// A value larger than 31 cannot be a 5-bit word.
	ValueOutOfRange(u8),
}

impl fmt::Display for Bech32Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
		match self {
			Bech32Error::MissingSeparator => f.write_str("missing '1' separator"),
			Bech32Error::MixedCase => f.write_str("string mixes upper and lower case"),
			Bech32Error::EmptyPayload => f.write_str("no data after the separator"),
			Bech32Error::InvalidCharacter(c) => write!(f, "invalid character ({})", c),
			Bech32Error::InvalidPadding => f.write_str("invalid padding"),
			Bech32Error::ValueOutOfRange(v) => write!(f, "out-of-range word value ({})", v),
		}
	}
}

impl std::error::Error for Bech32Error {}

/// Mapping from numeric value to bech32 character.
#[rustfmt::skip]
const CHARS_LOWER: [char; 32] = [
	'q', 'p', 'z', 'r', 'y', '9', 'x', '8', //  +0
	'g', 'f', '2', 't', 'v', 'd', 'w', '0', //  +8
	's', '3', 'j', 'n', '5', '4', 'k', 'h', // +16
	'c', 'e', '6', 'm', 'u', 'a', '7', 'l', // +24
];

/// Mapping from bech32 character (either case) to numeric value, -1 for invalid characters.
#[rustfmt::skip]
const CHARS_INV: [i8; 128] = [
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	15, -1, 10, 17, 21, 20, 26, 30,  7,  5, -1, -1, -1, -1, -1, -1,
	-1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
	 1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
	-1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
	 1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
];

impl u5 {
	/// Creates a word from a `u8` value, which must be in the range 0..=31.
	pub fn try_from_u8(n: u8) -> Result<Self, Bech32Error> {
		if n > 31 {
			Err(Bech32Error::ValueOutOfRange(n))
		} else {
			Ok(Self(n))
		}
	}

	/// Accesses the word as a `u8`, guaranteed to be in the range 0..=31.
	#[inline]
	pub fn as_u8(&self) -> u8 {
		self.0
	}

	/// Decodes a bech32 character of either case into its word value.
	pub fn try_from_char(c: char) -> Result<Self, Bech32Error> {
		let index = u32::from(c);
		if index < 128 && CHARS_INV[index as usize] >= 0 {
			Ok(Self(CHARS_INV[index as usize] as u8))
		} else {
			Err(Bech32Error::InvalidCharacter(c))
		}
	}

	/// Encodes the word as its lowercase bech32 character.
	pub fn to_char(&self) -> char {
		CHARS_LOWER[self.0 as usize]
	}
}

/// Regroups 8-bit bytes into 5-bit words, zero-padding a final partial word.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u5> {
	let mut words = Vec::with_capacity((bytes.len() * 8 + 4) / 5);
	let mut buffer = 0u32;
	let mut buffered_bits = 0u32;
	for byte in bytes {
		buffer = (buffer << 8) | *byte as u32;
		buffered_bits += 8;
		while buffered_bits >= 5 {
			words.push(u5(((buffer >> (buffered_bits - 5)) & 0x1F) as u8));
			buffered_bits -= 5;
		}
	}
	if buffered_bits > 0 {
		words.push(u5(((buffer << (5 - buffered_bits)) & 0x1F) as u8));
	}
	words
}

/// Regroups 5-bit words back into 8-bit bytes, with no padding permitted: a trailing partial
/// byte must consist entirely of zero bits and be shorter than a word, otherwise the input
/// carried either dirty or superfluous padding.
pub fn words_to_bytes(words: &[u5]) -> Result<Vec<u8>, Bech32Error> {
	let mut bytes = Vec::with_capacity(words.len() * 5 / 8);
	let mut buffer = 0u32;
	let mut buffered_bits = 0u32;
	for word in words {
		buffer = (buffer << 5) | word.as_u8() as u32;
		buffered_bits += 5;
		if buffered_bits >= 8 {
			bytes.push(((buffer >> (buffered_bits - 8)) & 0xFF) as u8);
			buffered_bits -= 8;
		}
	}
	if buffered_bits >= 5 || buffer & ((1 << buffered_bits) - 1) != 0 {
		return Err(Bech32Error::InvalidPadding);
	}
	Ok(bytes)
}

/// Encodes `data` as `hrp + '1' + data characters`, without a checksum.
///
/// This is the BOLT 12 textual envelope. For the standard checksummed encoding see
/// [`encode_bech32m`].
pub fn encode_without_checksum(hrp: &str, data: &[u8]) -> String {
	let words = bytes_to_words(data);
	let mut encoded = String::with_capacity(hrp.len() + 1 + words.len());
	encoded.push_str(hrp);
	encoded.push('1');
	for word in words {
		encoded.push(word.to_char());
	}
	encoded
}

/// Decodes a checksum-less bech32 string into its human-readable prefix and data bytes.
///
/// Accepts all-lowercase or all-uppercase input (the prefix is returned lowercased) and splits
/// on the first `1`. Any continuation markers must be stripped by the caller beforehand.
pub fn decode_without_checksum(s: &str) -> Result<(String, Vec<u8>), Bech32Error> {
	let has_lower = s.chars().any(|c| c.is_lowercase());
	let has_upper = s.chars().any(|c| c.is_uppercase());
	if has_lower && has_upper {
		return Err(Bech32Error::MixedCase);
	}
	let normalized;
	let s = if has_upper {
		normalized = s.to_lowercase();
		&normalized
	} else {
		s
	};

	let separator = s.find('1').ok_or(Bech32Error::MissingSeparator)?;
	let (hrp, payload) = (&s[..separator], &s[separator + 1..]);
	if payload.is_empty() {
		return Err(Bech32Error::EmptyPayload);
	}

	let mut words = Vec::with_capacity(payload.len());
	for c in payload.chars() {
		words.push(u5::try_from_char(c)?);
	}
	let data = words_to_bytes(&words)?;

	Ok((hrp.to_string(), data))
}

/// Encodes `data` as a checksummed bech32m string. A test and tooling companion to the
/// checksum-less envelope; BOLT 12 messages never use it.
///
/// `hrp` must be a valid human-readable prefix (1..=83 ASCII characters in the range 33..=126).
pub fn encode_bech32m(hrp: &str, data: &[u8]) -> Result<String, ::bech32::EncodeError> {
	let hrp = ::bech32::Hrp::parse_unchecked(hrp);
	::bech32::encode::<::bech32::Bech32m>(hrp, data)
}

/// Decodes a checksummed bech32m string into its human-readable prefix and data bytes. A test
/// and tooling companion to the checksum-less envelope; BOLT 12 messages never use it.
pub fn decode_bech32m(s: &str) -> Result<(String, Vec<u8>), ::bech32::DecodeError> {
	let (hrp, data) = ::bech32::decode(s)?;
	Ok((hrp.to_lowercase(), data))
}

#[cfg(test)]
mod tests {
	use super::{
		bytes_to_words, decode_bech32m, decode_without_checksum, encode_bech32m,
		encode_without_checksum, u5, words_to_bytes, Bech32Error,
	};

	#[test]
	fn words_round_trip_through_characters() {
		for value in 0..32 {
			let word = u5::try_from_u8(value).unwrap();
			assert_eq!(u5::try_from_char(word.to_char()).unwrap(), word);
		}
		assert_eq!(u5::try_from_u8(32), Err(Bech32Error::ValueOutOfRange(32)));
		assert_eq!(u5::try_from_char('q').unwrap().as_u8(), 0);
		assert_eq!(u5::try_from_char('p').unwrap().as_u8(), 1);
		assert_eq!(u5::try_from_char('l').unwrap().as_u8(), 31);
		assert_eq!(u5::try_from_char('A').unwrap().as_u8(), 29);
		assert_eq!(u5::try_from_char('b'), Err(Bech32Error::InvalidCharacter('b')));
		assert_eq!(u5::try_from_char('1'), Err(Bech32Error::InvalidCharacter('1')));
	}

	#[test]
	fn regrouping_round_trips() {
		let cases: &[&[u8]] = &[&[], &[0x00], &[0xFF], &[0x01, 0x02, 0x03, 0x04, 0x05], &[0xAB; 64]];
		for bytes in cases {
			let words = bytes_to_words(bytes);
			assert_eq!(words_to_bytes(&words).unwrap(), *bytes);
		}
	}

	#[test]
	fn regrouping_pads_with_zero_bits() {
		// A single byte becomes two words, the second carrying two padding bits.
		let words = bytes_to_words(&[0xFF]);
		assert_eq!(words.len(), 2);
		assert_eq!(words[0].as_u8(), 0b11111);
		assert_eq!(words[1].as_u8(), 0b11100);
	}

	#[test]
	fn regrouping_rejects_dirty_padding() {
		// 0b11111 0b11101: the final bit should be zero padding.
		let words = [u5::try_from_u8(0b11111).unwrap(), u5::try_from_u8(0b11101).unwrap()];
		assert_eq!(words_to_bytes(&words), Err(Bech32Error::InvalidPadding));
	}

	#[test]
	fn regrouping_rejects_excess_padding() {
		// Three bytes fit in five words; five zero bits of a sixth word could only be padding.
		let mut words = bytes_to_words(&[0xFF, 0xFF, 0xFF]);
		assert_eq!(words.len(), 5);
		words.push(u5::try_from_u8(0).unwrap());
		assert_eq!(words_to_bytes(&words), Err(Bech32Error::InvalidPadding));

		// A single word cannot even hold one byte.
		let single = [u5::try_from_u8(0).unwrap()];
		assert_eq!(words_to_bytes(&single), Err(Bech32Error::InvalidPadding));
	}

	#[test]
	fn encodes_and_decodes_without_checksum() {
		assert_eq!(encode_without_checksum("lno", &[0x00]), "lno1qq");

		for data in [&[0x00][..], &[0x01, 0x02, 0x03][..], &[0xFF; 41][..]] {
			let encoded = encode_without_checksum("lnr", data);
			assert_eq!(decode_without_checksum(&encoded).unwrap(), ("lnr".to_string(), data.to_vec()));
		}
	}

	#[test]
	fn decoding_accepts_uppercase_but_not_mixed_case() {
		let encoded = encode_without_checksum("lno", &[0x01, 0x02, 0x03]);
		let uppercased = encoded.to_uppercase();
		assert_eq!(
			decode_without_checksum(&uppercased).unwrap(),
			("lno".to_string(), vec![0x01, 0x02, 0x03]),
		);
		assert_eq!(decode_without_checksum("Lno1pq"), Err(Bech32Error::MixedCase));
	}

	#[test]
	fn decoding_splits_on_the_first_separator() {
		// 'l', 'n', and 'o' are data characters too; only the first '1' delimits the hrp.
		let (hrp, data) = decode_without_checksum("lno1llllllll").unwrap();
		assert_eq!(hrp, "lno");
		assert_eq!(data, vec![0xFF; 5]);
	}

	#[test]
	fn decoding_rejects_malformed_envelopes() {
		assert_eq!(decode_without_checksum("lno"), Err(Bech32Error::MissingSeparator));
		assert_eq!(decode_without_checksum("lno1"), Err(Bech32Error::EmptyPayload));
		assert_eq!(decode_without_checksum("lno1qb"), Err(Bech32Error::InvalidCharacter('b')));
		assert_eq!(decode_without_checksum("lno1p"), Err(Bech32Error::InvalidPadding));
	}

	#[test]
	fn bech32m_companion_round_trips() {
		let encoded = encode_bech32m("bc", &[0x00, 0x01, 0x02]).unwrap();
		assert_eq!(decode_bech32m(&encoded).unwrap(), ("bc".to_string(), vec![0x00, 0x01, 0x02]));
		assert!(decode_bech32m("bc1qqqsyqcyq5rqwzqf").is_err());
	}
}
