// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Data structures and encoding for `invoice_request` messages.
//!
//! An [`InvoiceRequest`] is built from a parsed [`Offer`]. It is typically constructed by a
//! customer and sent to the merchant who had published the corresponding offer. The recipient
//! of the request responds with an [`Invoice`].
//!
//! [`Offer`]: crate::offer::Offer
//! [`Invoice`]: crate::invoice::Invoice

use bitcoin::blockdata::constants::ChainHash;
use bitcoin::network::constants::Network;
use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::{Message, PublicKey};
use core::str::FromStr;
use core::time::Duration;
use std::io;

use crate::bip353::HumanReadableName;
use crate::blinded_path::{BlindedPath, BlindedPayInfo};
use crate::invoice::InvoiceBuilder;
use crate::merkle::{self, SignError, SIGNATURE_TYPE};
use crate::offer::{Offer, OfferContents, OFFER_TYPES};
use crate::parse::{Bech32Encode, Bolt12ParseError, Bolt12SemanticError};
use crate::ser::{DecodeError, Tu64, Writeable, Writer, WithoutLength};
use crate::tlv::{self, write_tlv_record, TlvRecord};
use crate::{PaymentHash, UntrustedString, MAX_VALUE_MSAT};

/// The TLV type range specific to invoice requests. Invoice requests additionally mirror the
/// offer's records and carry the payer metadata record below both ranges.
pub(crate) const INVOICE_REQUEST_TYPES: core::ops::Range<u64> = 80..160;

pub(crate) const INVREQ_TYPE_METADATA: u64 = 0;
const INVREQ_TYPE_CHAIN: u64 = 80;
const INVREQ_TYPE_AMOUNT: u64 = 82;
const INVREQ_TYPE_FEATURES: u64 = 84;
const INVREQ_TYPE_QUANTITY: u64 = 86;
const INVREQ_TYPE_PAYER_ID: u64 = 88;
const INVREQ_TYPE_PAYER_NOTE: u64 = 89;
const INVREQ_TYPE_PATHS: u64 = 90;
const INVREQ_TYPE_BIP_353_NAME: u64 = 91;

const SIGNATURE_TAG: &'static str = concat!("lightning", "invoice_request", "signature");

/// An `InvoiceRequest` is a request for an [`Invoice`] formulated from an [`Offer`].
///
/// An offer may provide choices such as quantity, amount, chain, features, etc. An invoice
/// request specifies these such that its recipient can send an invoice for payment.
///
/// [`Offer`]: crate::offer::Offer
/// [`Invoice`]: crate::invoice::Invoice
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceRequest {
	pub(crate) bytes: Vec<u8>,
	pub(crate) contents: InvoiceRequestContents,
	pub(crate) signature: Signature,
}

/// The contents of an [`InvoiceRequest`], which are mirrored into an [`Invoice`].
///
/// [`Invoice`]: crate::invoice::Invoice
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InvoiceRequestContents {
	pub(crate) metadata: Vec<u8>,
	pub(crate) offer: OfferContents,
	pub(crate) chain: Option<ChainHash>,
	pub(crate) amount_msats: Option<u64>,
	pub(crate) features: Option<Vec<u8>>,
	pub(crate) quantity: Option<u64>,
	pub(crate) payer_id: PublicKey,
	pub(crate) payer_note: Option<UntrustedString>,
	pub(crate) paths: Option<Vec<BlindedPath>>,
	pub(crate) bip_353_name: Option<HumanReadableName>,
}

/// The invoice-request-specific records as read off the wire, before the required fields have
/// been checked for presence.
#[derive(Default)]
pub(crate) struct InvoiceRequestTlvStream {
	pub metadata: Option<Vec<u8>>,
	pub chain: Option<ChainHash>,
	pub amount: Option<u64>,
	pub features: Option<Vec<u8>>,
	pub quantity: Option<u64>,
	pub payer_id: Option<PublicKey>,
	pub payer_note: Option<UntrustedString>,
	pub paths: Option<Vec<BlindedPath>>,
	pub bip_353_name: Option<HumanReadableName>,
}

impl InvoiceRequestTlvStream {
	/// Applies a payer metadata or [`INVOICE_REQUEST_TYPES`] record, returning whether its
	/// type was recognized.
	pub(crate) fn set_record(&mut self, record: &TlvRecord) -> Result<bool, DecodeError> {
		match record.r#type {
			INVREQ_TYPE_METADATA => {
				self.metadata = Some(record.decode::<WithoutLength<Vec<u8>>>()?.0);
			},
			INVREQ_TYPE_CHAIN => self.chain = Some(record.decode()?),
			INVREQ_TYPE_AMOUNT => self.amount = Some(record.decode::<Tu64>()?.0),
			INVREQ_TYPE_FEATURES => {
				self.features = Some(record.decode::<WithoutLength<Vec<u8>>>()?.0);
			},
			INVREQ_TYPE_QUANTITY => self.quantity = Some(record.decode::<Tu64>()?.0),
			INVREQ_TYPE_PAYER_ID => self.payer_id = Some(record.decode()?),
			INVREQ_TYPE_PAYER_NOTE => {
				self.payer_note =
					Some(UntrustedString(record.decode::<WithoutLength<String>>()?.0));
			},
			INVREQ_TYPE_PATHS => {
				self.paths = Some(record.decode::<WithoutLength<Vec<BlindedPath>>>()?.0);
			},
			INVREQ_TYPE_BIP_353_NAME => self.bip_353_name = Some(record.decode()?),
			_ => return Ok(false),
		}
		Ok(true)
	}
}

/// Builds an [`InvoiceRequest`] from an [`Offer`] for the "offer to be paid" flow.
///
/// [`Offer`]: crate::offer::Offer
pub struct InvoiceRequestBuilder<'a> {
	offer: &'a Offer,
	invoice_request: InvoiceRequestContents,
}

impl<'a> InvoiceRequestBuilder<'a> {
	pub(crate) fn new(offer: &'a Offer, metadata: Vec<u8>, payer_id: PublicKey) -> Self {
		Self {
			offer,
			invoice_request: InvoiceRequestContents {
				metadata,
				offer: offer.contents.clone(),
				chain: None,
				amount_msats: None,
				features: None,
				quantity: None,
				payer_id,
				payer_note: None,
				paths: None,
				bip_353_name: None,
			},
		}
	}

	/// Sets the [`InvoiceRequest::chain`] of the given [`Network`] for paying an invoice. If
	/// not called, [`Network::Bitcoin`] is assumed. Errors if the chain for `network` is not
	/// supported by the offer.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn chain(mut self, network: Network) -> Result<Self, Bolt12SemanticError> {
		let chain = ChainHash::using_genesis_block(network);
		if !self.offer.supports_chain(chain) {
			return Err(Bolt12SemanticError::UnsupportedChain);
		}

		self.invoice_request.chain = Some(chain);
		Ok(self)
	}

	/// Sets the [`InvoiceRequest::amount_msats`] for paying an invoice.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn amount_msats(mut self, amount_msats: u64) -> Self {
		self.invoice_request.amount_msats = Some(amount_msats);
		self
	}

	/// Sets the [`InvoiceRequest::features`], carried as opaque bytes.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn features(mut self, features: Vec<u8>) -> Self {
		self.invoice_request.features = Some(features);
		self
	}

	/// Sets [`InvoiceRequest::quantity`] of items.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn quantity(mut self, quantity: u64) -> Self {
		self.invoice_request.quantity = Some(quantity);
		self
	}

	/// Sets the [`InvoiceRequest::payer_note`].
	///
	/// Successive calls to this method will override the previous setting.
	pub fn payer_note(mut self, payer_note: String) -> Self {
		self.invoice_request.payer_note = Some(UntrustedString(payer_note));
		self
	}

	/// Adds a blinded path to [`InvoiceRequest::paths`], for routing the invoice response back
	/// to the payer.
	///
	/// Successive calls to this method will add another blinded path.
	pub fn path(mut self, path: BlindedPath) -> Self {
		self.invoice_request.paths.get_or_insert_with(Vec::new).push(path);
		self
	}

	/// Sets the [`InvoiceRequest::bip_353_name`] the offer was resolved from.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn bip_353_name(mut self, bip_353_name: HumanReadableName) -> Self {
		self.invoice_request.bip_353_name = Some(bip_353_name);
		self
	}

	/// Builds an unsigned [`InvoiceRequest`] after checking for valid semantics. It can be
	/// signed by [`UnsignedInvoiceRequest::sign`].
	pub fn build(mut self) -> Result<UnsignedInvoiceRequest<'a>, Bolt12SemanticError> {
		if self.invoice_request.chain == Some(self.invoice_request.offer.implied_chain()) {
			self.invoice_request.chain = None;
		}

		self.invoice_request.validate()?;
		if let Some(paths) = &self.invoice_request.paths {
			for path in paths {
				path.check_encodable()?;
			}
		}

		let InvoiceRequestBuilder { offer, invoice_request } = self;
		Ok(UnsignedInvoiceRequest { offer, invoice_request })
	}
}

/// A semantically valid [`InvoiceRequest`] that hasn't been signed.
pub struct UnsignedInvoiceRequest<'a> {
	offer: &'a Offer,
	invoice_request: InvoiceRequestContents,
}

impl<'a> UnsignedInvoiceRequest<'a> {
	/// Signs the invoice request using the given function, which is passed the digest to sign
	/// with the payer's key. The produced signature is checked against
	/// [`InvoiceRequest::payer_id`] before the request is returned.
	pub fn sign<F, E>(self, sign: F) -> Result<InvoiceRequest, SignError<E>>
	where
		F: FnOnce(&Message) -> Result<Signature, E>,
	{
		// Mirror the offer's raw bytes rather than re-encoding its contents, as the offer may
		// have contained unknown odd records which must be reflected byte-for-byte.
		let mut bytes = Vec::new();
		write_tlv_record(
			&mut bytes,
			INVREQ_TYPE_METADATA,
			&WithoutLength(&self.invoice_request.metadata),
		)
		.expect("in-memory writes cannot fail");
		bytes.extend_from_slice(&self.offer.bytes);
		self.invoice_request.write_records(&mut bytes).expect("in-memory writes cannot fail");

		let pubkey = self.invoice_request.payer_id;
		let signature = merkle::sign_message(sign, SIGNATURE_TAG, &bytes, pubkey)?;

		// Append the signature record to the bytes.
		write_tlv_record(&mut bytes, SIGNATURE_TYPE, &signature)
			.expect("in-memory writes cannot fail");

		Ok(InvoiceRequest { bytes, contents: self.invoice_request, signature })
	}
}

impl InvoiceRequest {
	/// An unpredictable series of bytes, typically containing information about the derivation
	/// of [`payer_id`].
	///
	/// [`payer_id`]: Self::payer_id
	pub fn metadata(&self) -> &[u8] {
		&self.contents.metadata[..]
	}

	/// A chain from [`Offer::chains`] that the offer is valid for.
	///
	/// [`Offer::chains`]: crate::offer::Offer::chains
	pub fn chain(&self) -> ChainHash {
		self.contents.chain()
	}

	/// The amount to pay in msats (i.e., the minimum lightning-payable unit for [`chain`]).
	///
	/// [`chain`]: Self::chain
	pub fn amount_msats(&self) -> Option<u64> {
		self.contents.amount_msats
	}

	/// Feature bits pertaining to requesting an invoice, carried opaquely.
	pub fn features(&self) -> &[u8] {
		self.contents.features.as_ref().map(|features| features.as_slice()).unwrap_or(&[])
	}

	/// The quantity of the offer's item being requested.
	pub fn quantity(&self) -> Option<u64> {
		self.contents.quantity
	}

	/// A possibly transient pubkey used to sign the invoice request.
	pub fn payer_id(&self) -> PublicKey {
		self.contents.payer_id
	}

	/// A payer-provided note which will be seen by the recipient and reflected back in the
	/// invoice response.
	pub fn payer_note(&self) -> Option<&UntrustedString> {
		self.contents.payer_note.as_ref()
	}

	/// Blinded paths for routing the invoice response back to the payer.
	pub fn paths(&self) -> &[BlindedPath] {
		self.contents.paths.as_ref().map(|paths| paths.as_slice()).unwrap_or(&[])
	}

	/// The human-readable name the offer was resolved from, if any.
	pub fn bip_353_name(&self) -> Option<&HumanReadableName> {
		self.contents.bip_353_name.as_ref()
	}

	/// The public key the mirrored offer designated for signing invoices.
	pub fn issuer_id(&self) -> Option<PublicKey> {
		self.contents.offer.issuer_id()
	}

	/// Signature of the invoice request using [`payer_id`].
	///
	/// [`payer_id`]: Self::payer_id
	pub fn signature(&self) -> Signature {
		self.signature
	}

	/// Verifies the request's signature, normally against [`payer_id`]. `pubkey` may be a
	/// 33-byte compressed key, whose leading byte is stripped, or a 32-byte x-only key; any
	/// other length is an error.
	///
	/// Returns `Ok(false)`, not an error, when the signature simply does not match.
	///
	/// [`payer_id`]: Self::payer_id
	pub fn verify_signature(&self, pubkey: &[u8]) -> Result<bool, Bolt12SemanticError> {
		merkle::verify_signature(&self.signature, SIGNATURE_TAG, &self.bytes, pubkey)
	}

	/// Creates an [`InvoiceBuilder`] for responding to the request with the given required
	/// invoice fields. `created_at` is the duration since the Unix epoch at which the invoice
	/// is created; the codec consults no clock of its own.
	///
	/// The caller is expected to remember the preimage of `payment_hash` in order to claim a
	/// payment for the invoice.
	pub fn respond_with(
		&self, payment_paths: Vec<(BlindedPath, BlindedPayInfo)>, created_at: Duration,
		payment_hash: PaymentHash,
	) -> Result<InvoiceBuilder, Bolt12SemanticError> {
		InvoiceBuilder::for_request(self, payment_paths, created_at, payment_hash)
	}
}

impl InvoiceRequestContents {
	pub(crate) fn chain(&self) -> ChainHash {
		self.chain.unwrap_or_else(|| self.offer.implied_chain())
	}

	pub(crate) fn validate(&self) -> Result<(), Bolt12SemanticError> {
		self.offer.validate()?;

		if self.metadata.is_empty() {
			return Err(Bolt12SemanticError::MissingPayerMetadata);
		}

		if !self.offer.supports_chain(self.chain()) {
			return Err(Bolt12SemanticError::UnsupportedChain);
		}

		if let Some(amount_msats) = self.amount_msats {
			if amount_msats > MAX_VALUE_MSAT {
				return Err(Bolt12SemanticError::InvalidAmount);
			}
		}

		Ok(())
	}

	/// Emits the records in [`INVOICE_REQUEST_TYPES`], in ascending type order. The metadata
	/// record and the mirrored offer records sort below them and are written separately.
	pub(crate) fn write_records<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		if let Some(chain) = &self.chain {
			write_tlv_record(writer, INVREQ_TYPE_CHAIN, chain)?;
		}
		if let Some(amount_msats) = self.amount_msats {
			write_tlv_record(writer, INVREQ_TYPE_AMOUNT, &Tu64(amount_msats))?;
		}
		if let Some(features) = &self.features {
			write_tlv_record(writer, INVREQ_TYPE_FEATURES, &WithoutLength(features))?;
		}
		if let Some(quantity) = self.quantity {
			write_tlv_record(writer, INVREQ_TYPE_QUANTITY, &Tu64(quantity))?;
		}
		write_tlv_record(writer, INVREQ_TYPE_PAYER_ID, &self.payer_id)?;
		if let Some(payer_note) = &self.payer_note {
			write_tlv_record(writer, INVREQ_TYPE_PAYER_NOTE, &WithoutLength(&payer_note.0))?;
		}
		if let Some(paths) = &self.paths {
			write_tlv_record(writer, INVREQ_TYPE_PATHS, &WithoutLength(paths))?;
		}
		if let Some(bip_353_name) = &self.bip_353_name {
			write_tlv_record(writer, INVREQ_TYPE_BIP_353_NAME, bip_353_name)?;
		}
		Ok(())
	}
}

impl TryFrom<(OfferContents, InvoiceRequestTlvStream)> for InvoiceRequestContents {
	type Error = Bolt12SemanticError;

	fn try_from(
		parts: (OfferContents, InvoiceRequestTlvStream),
	) -> Result<Self, Self::Error> {
		let (
			offer,
			InvoiceRequestTlvStream {
				metadata,
				chain,
				amount,
				features,
				quantity,
				payer_id,
				payer_note,
				paths,
				bip_353_name,
			},
		) = parts;

		let metadata = match metadata {
			None => return Err(Bolt12SemanticError::MissingPayerMetadata),
			Some(metadata) => metadata,
		};

		let payer_id = match payer_id {
			None => return Err(Bolt12SemanticError::MissingPayerId),
			Some(payer_id) => payer_id,
		};

		let contents = InvoiceRequestContents {
			metadata,
			offer,
			chain,
			amount_msats: amount,
			features,
			quantity,
			payer_id,
			payer_note,
			paths,
			bip_353_name,
		};
		contents.validate()?;

		Ok(contents)
	}
}

impl AsRef<[u8]> for InvoiceRequest {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

impl Writeable for InvoiceRequest {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		WithoutLength(&self.bytes).write(writer)
	}
}

impl TryFrom<Vec<u8>> for InvoiceRequest {
	type Error = Bolt12ParseError;

	fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
		let mut offer = OfferContents::empty();
		let mut stream = InvoiceRequestTlvStream::default();
		let mut signature = None;
		tlv::parse_stream(&bytes, |record| {
			if OFFER_TYPES.contains(&record.r#type) {
				return offer.set_record(record);
			}
			if record.r#type == SIGNATURE_TYPE {
				signature = Some(record.decode::<Signature>()?);
				return Ok(true);
			}
			stream.set_record(record)
		})?;

		let contents = InvoiceRequestContents::try_from((offer, stream))?;
		let signature = match signature {
			None => {
				return Err(Bolt12ParseError::InvalidSemantics(
					Bolt12SemanticError::MissingSignature,
				));
			},
			Some(signature) => signature,
		};

		Ok(InvoiceRequest { bytes, contents, signature })
	}
}

impl Bech32Encode for InvoiceRequest {
	const BECH32_HRP: &'static str = "lnr";
}

impl FromStr for InvoiceRequest {
	type Err = Bolt12ParseError;

	fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
		Self::from_bech32_str(s)
	}
}

impl core::fmt::Display for InvoiceRequest {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		self.fmt_bech32_str(f)
	}
}

#[cfg(feature = "serde")]
impl serde::Serialize for InvoiceRequest {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for InvoiceRequest {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s: String = serde::Deserialize::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
