// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Wire encodings for blinded paths and the payment parameters attached to them.
//!
//! The codec carries these structures opaquely: deriving blinded paths and unwrapping their
//! encrypted payloads belongs to onion messaging, not to message encoding.

use bitcoin::secp256k1::PublicKey;
use std::io::{self, Read};

use crate::parse::Bolt12SemanticError;
use crate::ser::{DecodeError, Readable, Writeable, Writer};

/// One hop of a [`BlindedPath`]. The hop cannot be identified by outside observers, hiding the
/// identity of the path's destination.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BlindedHop {
	/// The blinded node id of this hop in a blinded path.
	pub blinded_node_id: PublicKey,
	/// The encrypted payload intended for this hop in a blinded path.
	pub encrypted_payload: Vec<u8>,
}

/// An onion route whose hops are opaque to all parties except its builder, providing recipient
/// privacy for offers and invoices.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BlindedPath {
	/// Used by the introduction point to decrypt the first hop's [`encrypted_payload`].
	///
	/// [`encrypted_payload`]: BlindedHop::encrypted_payload
	pub blinding_point: PublicKey,
	/// The hops composing the blinded path.
	pub blinded_hops: Vec<BlindedHop>,
}

impl BlindedPath {
	/// Checks that the path fits the wire encoding: one to 255 hops, each with a payload short
	/// enough for its length prefix. Applied when building messages so that encoding itself is
	/// infallible.
	pub(crate) fn check_encodable(&self) -> Result<(), Bolt12SemanticError> {
		if self.blinded_hops.is_empty() || self.blinded_hops.len() > u8::max_value() as usize {
			return Err(Bolt12SemanticError::InvalidPath);
		}
		for hop in &self.blinded_hops {
			if hop.encrypted_payload.len() > u16::max_value() as usize {
				return Err(Bolt12SemanticError::InvalidPath);
			}
		}
		Ok(())
	}
}

impl Writeable for BlindedHop {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.blinded_node_id.write(w)?;
		self.encrypted_payload.write(w)
	}
}

impl Readable for BlindedHop {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let blinded_node_id = Readable::read(r)?;
		let encrypted_payload = Readable::read(r)?;
		Ok(BlindedHop { blinded_node_id, encrypted_payload })
	}
}

impl Writeable for BlindedPath {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.blinding_point.write(w)?;
		(self.blinded_hops.len() as u8).write(w)?;
		for hop in &self.blinded_hops {
			hop.write(w)?;
		}
		Ok(())
	}
}

impl Readable for BlindedPath {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let blinding_point = Readable::read(r)?;
		let num_hops: u8 = Readable::read(r)?;
		if num_hops == 0 {
			return Err(DecodeError::InvalidValue);
		}
		let mut blinded_hops: Vec<BlindedHop> = Vec::with_capacity(num_hops.into());
		for _ in 0..num_hops {
			blinded_hops.push(Readable::read(r)?);
		}
		Ok(BlindedPath { blinding_point, blinded_hops })
	}
}

/// Information needed to route a payment across a [`BlindedPath`]: the aggregate fees, CLTV
/// delta, and HTLC limits of the path's hops.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BlindedPayInfo {
	/// Base fee charged (in millisatoshi) for the entire blinded path.
	pub fee_base_msat: u32,
	/// Liquidity fee charged (in millionths of the amount transferred) for the entire blinded
	/// path (i.e., 10,000 is 1%).
	pub fee_proportional_millionths: u32,
	/// Number of blocks subtracted from an incoming HTLC's `cltv_expiry` for the entire
	/// blinded path.
	pub cltv_expiry_delta: u16,
	/// The minimum HTLC value (in millisatoshi) that is acceptable to all the nodes in the
	/// path.
	pub htlc_minimum_msat: u64,
	/// The maximum HTLC value (in millisatoshi) that is acceptable to all the nodes in the
	/// path.
	pub htlc_maximum_msat: u64,
	/// Feature bits relevant to paying over the path, carried opaquely.
	pub features: Vec<u8>,
}

impl BlindedPayInfo {
	pub(crate) fn check_encodable(&self) -> Result<(), Bolt12SemanticError> {
		if self.features.len() > u16::max_value() as usize {
			return Err(Bolt12SemanticError::InvalidPayInfo);
		}
		Ok(())
	}
}

impl Writeable for BlindedPayInfo {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), io::Error> {
		self.fee_base_msat.write(w)?;
		self.fee_proportional_millionths.write(w)?;
		self.cltv_expiry_delta.write(w)?;
		self.htlc_minimum_msat.write(w)?;
		self.htlc_maximum_msat.write(w)?;
		self.features.write(w)
	}
}

impl Readable for BlindedPayInfo {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let fee_base_msat = Readable::read(r)?;
		let fee_proportional_millionths = Readable::read(r)?;
		let cltv_expiry_delta = Readable::read(r)?;
		let htlc_minimum_msat = Readable::read(r)?;
		let htlc_maximum_msat = Readable::read(r)?;
		let features = Readable::read(r)?;
		Ok(BlindedPayInfo {
			fee_base_msat,
			fee_proportional_millionths,
			cltv_expiry_delta,
			htlc_minimum_msat,
			htlc_maximum_msat,
			features,
		})
	}
}
