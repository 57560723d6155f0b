// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Tagged hashes and merkle tree construction for BOLT 12 signature calculation and
//! verification.

use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::{self, Message, PublicKey, Secp256k1, XOnlyPublicKey};
use std::io;

use crate::parse::Bolt12SemanticError;
use crate::ser::{BigSize, Writeable, Writer};
use crate::tlv::TlvStream;

/// Valid type range for signature TLV records. Records in this range are excluded from the
/// merkle root; the range is wider than the single type in use so that future signature-like
/// records are excluded identically.
pub(crate) const SIGNATURE_TYPES: core::ops::RangeInclusive<u64> = 240..=1000;

/// The TLV type used for a message's signature record.
pub(crate) const SIGNATURE_TYPE: u64 = 240;

/// Error when signing a message.
#[derive(Debug, PartialEq)]
pub enum SignError<E> {
	/// User-defined error when signing the message digest.
	Signing(E),
	/// The produced signature did not verify under the expected public key.
	Verification(secp256k1::Error),
}

impl<E: core::fmt::Debug> core::fmt::Display for SignError<E> {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		match self {
			SignError::Signing(e) => write!(f, "error signing message digest: {:?}", e),
			SignError::Verification(e) => write!(f, "produced signature is invalid: {}", e),
		}
	}
}

impl<E: core::fmt::Debug> std::error::Error for SignError<E> {}

/// Computes the merkle root hash of a well-formed TLV stream containing at least one record
/// outside [`SIGNATURE_TYPES`].
///
/// Each included record contributes two leaves: a hash of the record itself and a nonce hash
/// whose tag commits to the serialized form of the stream's first included record.
pub(crate) fn root_hash(data: &[u8]) -> sha256::Hash {
	let leaf_tag = tagged_hash_engine(sha256::Hash::hash("LnLeaf".as_bytes()));
	let branch_tag = tagged_hash_engine(sha256::Hash::hash("LnBranch".as_bytes()));
	let mut nonce_tag = None;

	let mut leaves = Vec::new();
	for record in TlvStream::new(data) {
		let record = record.expect("merkle root computed over an already-validated TLV stream");
		if SIGNATURE_TYPES.contains(&record.r#type) {
			continue;
		}
		let nonce_tag = nonce_tag.get_or_insert_with(|| {
			let mut engine = sha256::Hash::engine();
			engine.input("LnNonce".as_bytes());
			engine.input(record.record_bytes);
			tagged_hash_engine(sha256::Hash::from_engine(engine))
		});

		leaves.push(tagged_hash_from_engine(leaf_tag.clone(), record.record_bytes));
		leaves.push(tagged_hash_from_engine(nonce_tag.clone(), &BigSize(record.r#type).encode()));
	}
	debug_assert!(!leaves.is_empty());

	// Reduce adjacent pairs level by level, promoting an odd trailing hash unchanged. Branch
	// hashes order their children lexicographically, so the tree is position-independent.
	let mut hashes = leaves;
	while hashes.len() > 1 {
		let mut parents = Vec::with_capacity((hashes.len() + 1) / 2);
		for pair in hashes.chunks(2) {
			match pair {
				&[a, b] => parents.push(tagged_branch_hash_from_engine(branch_tag.clone(), a, b)),
				&[a] => parents.push(a),
				_ => unreachable!(),
			}
		}
		hashes = parents;
	}
	hashes[0]
}

fn tagged_hash<T: AsRef<[u8]>>(tag: sha256::Hash, msg: T) -> sha256::Hash {
	let engine = tagged_hash_engine(tag);
	tagged_hash_from_engine(engine, msg)
}

fn tagged_hash_engine(tag: sha256::Hash) -> sha256::HashEngine {
	let mut engine = sha256::Hash::engine();
	engine.input(tag.as_ref());
	engine.input(tag.as_ref());
	engine
}

fn tagged_hash_from_engine<T: AsRef<[u8]>>(
	mut engine: sha256::HashEngine, msg: T,
) -> sha256::Hash {
	engine.input(msg.as_ref());
	sha256::Hash::from_engine(engine)
}

fn tagged_branch_hash_from_engine(
	mut engine: sha256::HashEngine, leaf1: sha256::Hash, leaf2: sha256::Hash,
) -> sha256::Hash {
	if leaf1 < leaf2 {
		engine.input(leaf1.as_ref());
		engine.input(leaf2.as_ref());
	} else {
		engine.input(leaf2.as_ref());
		engine.input(leaf1.as_ref());
	}
	sha256::Hash::from_engine(engine)
}

/// Computes the signed digest for a message: the tagged hash, under the message kind's
/// signature tag, of the merkle root of its non-signature TLV records.
pub(crate) fn message_digest(tag: &str, bytes: &[u8]) -> Message {
	let tag = sha256::Hash::hash(tag.as_bytes());
	Message::from_slice(tagged_hash(tag, root_hash(bytes)).as_ref())
		.expect("digests are 32 bytes")
}

/// Signs the digest of the given TLV stream bytes using the given function, checking the result
/// against `pubkey` before returning it.
pub(crate) fn sign_message<F, E>(
	sign: F, tag: &str, bytes: &[u8], pubkey: PublicKey,
) -> Result<Signature, SignError<E>>
where
	F: FnOnce(&Message) -> Result<Signature, E>,
{
	let digest = message_digest(tag, bytes);
	let signature = sign(&digest).map_err(|e| SignError::Signing(e))?;

	let secp_ctx = Secp256k1::verification_only();
	let (pubkey, _parity) = pubkey.x_only_public_key();
	secp_ctx
		.verify_schnorr(&signature, &digest, &pubkey)
		.map_err(|e| SignError::Verification(e))?;

	Ok(signature)
}

/// Verifies the signature over the digest of the given TLV stream bytes.
///
/// `pubkey` may be a 33-byte compressed key, whose leading byte is stripped, or a 32-byte
/// x-only key; any other length is an error. A well-formed key that simply does not match the
/// signature yields `Ok(false)`.
pub(crate) fn verify_signature(
	signature: &Signature, tag: &str, bytes: &[u8], pubkey: &[u8],
) -> Result<bool, Bolt12SemanticError> {
	let pubkey = match pubkey.len() {
		32 => XOnlyPublicKey::from_slice(pubkey),
		33 => XOnlyPublicKey::from_slice(&pubkey[1..]),
		_ => return Err(Bolt12SemanticError::InvalidPubkey),
	}
	.map_err(|_| Bolt12SemanticError::InvalidPubkey)?;

	let digest = message_digest(tag, bytes);
	let secp_ctx = Secp256k1::verification_only();
	Ok(secp_ctx.verify_schnorr(signature, &digest, &pubkey).is_ok())
}

/// Wrapper re-serializing a TLV stream with any records in [`SIGNATURE_TYPES`] removed. Used
/// when one signed message embeds the records of another, which must be mirrored unsigned.
pub(crate) struct WithoutSignatures<'a>(pub &'a [u8]);

impl<'a> Writeable for WithoutSignatures<'a> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		for record in TlvStream::new(self.0) {
			let record = record.expect("stripping signatures from an already-validated stream");
			if !SIGNATURE_TYPES.contains(&record.r#type) {
				writer.write_all(record.record_bytes)?;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::{
		message_digest, root_hash, sign_message, tagged_branch_hash_from_engine, tagged_hash,
		tagged_hash_engine, tagged_hash_from_engine, verify_signature, SignError,
		WithoutSignatures,
	};
	use crate::ser::{BigSize, Tu64, Writeable, WithoutLength};
	use crate::tlv::write_tlv_record;

	use bitcoin::hashes::{sha256, Hash, HashEngine};
	use bitcoin::secp256k1::schnorr::Signature;
	use bitcoin::secp256k1::{KeyPair, Message, Secp256k1, SecretKey};
	use core::convert::Infallible;

	fn keys(byte: u8) -> KeyPair {
		let secp_ctx = Secp256k1::new();
		KeyPair::from_secret_key(&secp_ctx, &SecretKey::from_slice(&[byte; 32]).unwrap())
	}

	fn sign_with(byte: u8) -> impl Fn(&Message) -> Result<Signature, Infallible> {
		move |digest| {
			let secp_ctx = Secp256k1::new();
			Ok(secp_ctx.sign_schnorr_no_aux_rand(digest, &keys(byte)))
		}
	}

	fn two_record_stream() -> Vec<u8> {
		let mut bytes = Vec::new();
		write_tlv_record(&mut bytes, 1, &WithoutLength(&vec![0x21u8, 0x22])).unwrap();
		write_tlv_record(&mut bytes, 4, &Tu64(500)).unwrap();
		bytes
	}

	#[test]
	fn root_hash_is_deterministic() {
		let bytes = two_record_stream();
		assert_eq!(root_hash(&bytes), root_hash(&bytes));
	}

	#[test]
	fn single_record_root_is_branch_of_leaf_and_nonce() {
		let mut bytes = Vec::new();
		write_tlv_record(&mut bytes, 2, &WithoutLength(&vec![0x42u8])).unwrap();

		let leaf_tag = tagged_hash_engine(sha256::Hash::hash("LnLeaf".as_bytes()));
		let leaf = tagged_hash_from_engine(leaf_tag, &bytes);

		let nonce_tag = tagged_hash_engine(sha256::Hash::from_engine({
			let mut engine = sha256::Hash::engine();
			engine.input("LnNonce".as_bytes());
			engine.input(&bytes);
			engine
		}));
		let nonce = tagged_hash_from_engine(nonce_tag, &BigSize(2).encode());

		let branch_tag = tagged_hash_engine(sha256::Hash::hash("LnBranch".as_bytes()));
		let expected = tagged_branch_hash_from_engine(branch_tag, leaf, nonce);

		assert_eq!(root_hash(&bytes), expected);
	}

	#[test]
	fn branch_hash_ignores_argument_order() {
		let branch_tag = tagged_hash_engine(sha256::Hash::hash("LnBranch".as_bytes()));
		let a = sha256::Hash::hash(&[0x01]);
		let b = sha256::Hash::hash(&[0x02]);
		assert_eq!(
			tagged_branch_hash_from_engine(branch_tag.clone(), a, b),
			tagged_branch_hash_from_engine(branch_tag, b, a),
		);
	}

	#[test]
	fn tagged_hash_is_domain_separated() {
		let message = [0x55u8; 32];
		let hash_a = tagged_hash(sha256::Hash::hash("TagA".as_bytes()), &message);
		let hash_b = tagged_hash(sha256::Hash::hash("TagB".as_bytes()), &message);
		assert_ne!(hash_a, hash_b);
	}

	#[test]
	fn signature_records_are_excluded_from_the_root() {
		let bytes = two_record_stream();
		let root_without_signature = root_hash(&bytes);

		let mut signed_bytes = bytes.clone();
		write_tlv_record(&mut signed_bytes, 240, &[0x5Au8; 64]).unwrap();
		assert_eq!(root_hash(&signed_bytes), root_without_signature);

		// The whole reserved range is excluded, not just the type in use.
		let mut signed_bytes = bytes.clone();
		write_tlv_record(&mut signed_bytes, 1000, &[0x5Au8; 64]).unwrap();
		assert_eq!(root_hash(&signed_bytes), root_without_signature);

		// Records past the reserved range are included again.
		let mut extended_bytes = bytes;
		write_tlv_record(&mut extended_bytes, 1001, &WithoutLength(&vec![0x01u8])).unwrap();
		assert_ne!(root_hash(&extended_bytes), root_without_signature);
	}

	#[test]
	fn stripping_signatures_preserves_other_records() {
		let bytes = two_record_stream();
		let mut signed_bytes = bytes.clone();
		write_tlv_record(&mut signed_bytes, 240, &[0x5Au8; 64]).unwrap();
		assert_eq!(WithoutSignatures(&signed_bytes).encode(), bytes);
	}

	#[test]
	fn signed_digest_verifies_under_both_key_forms() {
		let bytes = two_record_stream();
		let tag = concat!("lightning", "invoice_request", "signature");
		let pubkey = keys(42).public_key();

		let signature = sign_message(sign_with(42), tag, &bytes, pubkey).unwrap();

		let compressed = pubkey.serialize();
		assert_eq!(verify_signature(&signature, tag, &bytes, &compressed), Ok(true));
		assert_eq!(verify_signature(&signature, tag, &bytes, &compressed[1..]), Ok(true));
	}

	#[test]
	fn verification_failure_is_a_boolean() {
		let bytes = two_record_stream();
		let tag = concat!("lightning", "invoice_request", "signature");
		let signature = sign_message(sign_with(42), tag, &bytes, keys(42).public_key()).unwrap();

		// Wrong key.
		let other_key = keys(43).public_key().serialize();
		assert_eq!(verify_signature(&signature, tag, &bytes, &other_key), Ok(false));

		// Wrong tag.
		let tag_for_invoices = concat!("lightning", "invoice", "signature");
		let pubkey = keys(42).public_key().serialize();
		assert_eq!(verify_signature(&signature, tag_for_invoices, &bytes, &pubkey), Ok(false));

		// Tampered signature.
		let mut tampered = *signature.as_ref();
		tampered[0] ^= 0x80;
		let tampered = Signature::from_slice(&tampered).unwrap();
		assert_eq!(verify_signature(&tampered, tag, &bytes, &pubkey), Ok(false));
	}

	#[test]
	fn malformed_keys_are_errors() {
		use crate::parse::Bolt12SemanticError;

		let bytes = two_record_stream();
		let tag = concat!("lightning", "invoice_request", "signature");
		let signature = sign_message(sign_with(42), tag, &bytes, keys(42).public_key()).unwrap();

		assert_eq!(
			verify_signature(&signature, tag, &bytes, &[0x02; 31]),
			Err(Bolt12SemanticError::InvalidPubkey),
		);
		assert_eq!(
			verify_signature(&signature, tag, &bytes, &[0x02; 34]),
			Err(Bolt12SemanticError::InvalidPubkey),
		);
	}

	#[test]
	fn signing_with_the_wrong_key_is_rejected() {
		let bytes = two_record_stream();
		let tag = concat!("lightning", "invoice_request", "signature");
		match sign_message(sign_with(43), tag, &bytes, keys(42).public_key()) {
			Ok(_) => panic!("expected error"),
			Err(SignError::Verification(_)) => {},
			Err(e) => panic!("unexpected error: {:?}", e),
		}
	}

	#[test]
	fn message_digest_commits_to_the_tag() {
		let bytes = two_record_stream();
		let digest_a = message_digest(concat!("lightning", "invoice_request", "signature"), &bytes);
		let digest_b = message_digest(concat!("lightning", "invoice", "signature"), &bytes);
		assert_ne!(digest_a, digest_b);
	}
}
