// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Data structures and encoding for `invoice` messages.
//!
//! An [`Invoice`] is a payment request corresponding to an [`Offer`]. It is sent in response to
//! an [`InvoiceRequest`] and includes all the information needed to pay the recipient.
//!
//! [`Offer`]: crate::offer::Offer
//! [`InvoiceRequest`]: crate::invoice_request::InvoiceRequest

use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::{Message, PublicKey};
use core::str::FromStr;
use core::time::Duration;
use std::io;

use crate::blinded_path::{BlindedPath, BlindedPayInfo};
use crate::fallback::FallbackAddress;
use crate::invoice_request::{
	InvoiceRequest, InvoiceRequestContents, InvoiceRequestTlvStream, INVOICE_REQUEST_TYPES,
	INVREQ_TYPE_METADATA,
};
use crate::merkle::{self, SignError, WithoutSignatures, SIGNATURE_TYPE};
use crate::offer::{Amount, OfferContents, OFFER_TYPES};
use crate::parse::{Bech32Encode, Bolt12ParseError, Bolt12SemanticError};
use crate::ser::{DecodeError, Tu64, Writeable, Writer, WithoutLength};
use crate::tlv::{self, write_tlv_record, TlvRecord};
use crate::{PaymentHash, MAX_VALUE_MSAT};

/// The TLV type range specific to invoices. Invoices additionally mirror the records of the
/// invoice request they respond to.
pub(crate) const INVOICE_TYPES: core::ops::Range<u64> = 160..240;

const INVOICE_TYPE_PATHS: u64 = 160;
const INVOICE_TYPE_BLINDEDPAY: u64 = 162;
const INVOICE_TYPE_CREATED_AT: u64 = 164;
const INVOICE_TYPE_RELATIVE_EXPIRY: u64 = 166;
const INVOICE_TYPE_PAYMENT_HASH: u64 = 168;
const INVOICE_TYPE_AMOUNT: u64 = 170;
const INVOICE_TYPE_FALLBACKS: u64 = 172;
const INVOICE_TYPE_FEATURES: u64 = 174;
const INVOICE_TYPE_NODE_ID: u64 = 176;

const SIGNATURE_TAG: &'static str = concat!("lightning", "invoice", "signature");

/// An invoice expires two hours after its creation time when it does not say otherwise.
pub const DEFAULT_RELATIVE_EXPIRY: Duration = Duration::from_secs(7200);

/// An `Invoice` is a payment request built in response to an [`InvoiceRequest`]. It includes
/// all the information needed to pay the recipient.
///
/// [`InvoiceRequest`]: crate::invoice_request::InvoiceRequest
#[derive(Clone, Debug, PartialEq)]
pub struct Invoice {
	pub(crate) bytes: Vec<u8>,
	pub(crate) contents: InvoiceContents,
	pub(crate) signature: Signature,
}

/// The contents of an [`Invoice`]: the mirrored invoice request plus the invoice-specific
/// fields.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InvoiceContents {
	pub(crate) invoice_request: InvoiceRequestContents,
	pub(crate) fields: InvoiceFields,
}

/// Invoice-specific fields for an `invoice` message.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InvoiceFields {
	pub(crate) payment_paths: Vec<(BlindedPath, BlindedPayInfo)>,
	pub(crate) created_at: Duration,
	pub(crate) relative_expiry: Option<Duration>,
	pub(crate) payment_hash: PaymentHash,
	pub(crate) amount_msats: u64,
	pub(crate) fallbacks: Option<Vec<FallbackAddress>>,
	pub(crate) features: Option<Vec<u8>>,
	pub(crate) signing_pubkey: PublicKey,
}

/// The invoice-specific records as read off the wire, before the required fields have been
/// checked for presence.
#[derive(Default)]
struct InvoiceTlvStream {
	paths: Option<Vec<BlindedPath>>,
	blindedpay: Option<Vec<BlindedPayInfo>>,
	created_at: Option<u64>,
	relative_expiry: Option<u64>,
	payment_hash: Option<PaymentHash>,
	amount: Option<u64>,
	fallbacks: Option<Vec<FallbackAddress>>,
	features: Option<Vec<u8>>,
	node_id: Option<PublicKey>,
}

impl InvoiceTlvStream {
	fn set_record(&mut self, record: &TlvRecord) -> Result<bool, DecodeError> {
		match record.r#type {
			INVOICE_TYPE_PATHS => {
				self.paths = Some(record.decode::<WithoutLength<Vec<BlindedPath>>>()?.0);
			},
			INVOICE_TYPE_BLINDEDPAY => {
				self.blindedpay = Some(record.decode::<WithoutLength<Vec<BlindedPayInfo>>>()?.0);
			},
			INVOICE_TYPE_CREATED_AT => self.created_at = Some(record.decode::<Tu64>()?.0),
			INVOICE_TYPE_RELATIVE_EXPIRY => {
				self.relative_expiry = Some(record.decode::<Tu64>()?.0);
			},
			INVOICE_TYPE_PAYMENT_HASH => self.payment_hash = Some(record.decode()?),
			INVOICE_TYPE_AMOUNT => self.amount = Some(record.decode::<Tu64>()?.0),
			INVOICE_TYPE_FALLBACKS => {
				self.fallbacks = Some(record.decode::<WithoutLength<Vec<FallbackAddress>>>()?.0);
			},
			INVOICE_TYPE_FEATURES => {
				self.features = Some(record.decode::<WithoutLength<Vec<u8>>>()?.0);
			},
			INVOICE_TYPE_NODE_ID => self.node_id = Some(record.decode()?),
			_ => return Ok(false),
		}
		Ok(true)
	}
}

/// Builds an [`Invoice`] in response to an [`InvoiceRequest`].
///
/// [`InvoiceRequest`]: crate::invoice_request::InvoiceRequest
pub struct InvoiceBuilder<'a> {
	invoice_request: &'a InvoiceRequest,
	payment_paths: Vec<(BlindedPath, BlindedPayInfo)>,
	created_at: Duration,
	relative_expiry: Option<Duration>,
	payment_hash: PaymentHash,
	amount_msats: u64,
	fallbacks: Option<Vec<FallbackAddress>>,
	features: Option<Vec<u8>>,
	signing_pubkey: Option<PublicKey>,
}

impl<'a> InvoiceBuilder<'a> {
	pub(crate) fn for_request(
		invoice_request: &'a InvoiceRequest, payment_paths: Vec<(BlindedPath, BlindedPayInfo)>,
		created_at: Duration, payment_hash: PaymentHash,
	) -> Result<Self, Bolt12SemanticError> {
		let amount_msats = Self::amount_msats(&invoice_request.contents)?;

		Ok(Self {
			invoice_request,
			payment_paths,
			created_at,
			relative_expiry: None,
			payment_hash,
			amount_msats,
			fallbacks: None,
			features: None,
			signing_pubkey: invoice_request.contents.offer.issuer_id(),
		})
	}

	/// The amount to invoice: the requested amount, or the offer's amount scaled by the
	/// requested quantity. Currency-denominated offers cannot be invoiced without a requested
	/// amount, as conversion is outside the codec's scope.
	fn amount_msats(
		invoice_request: &InvoiceRequestContents,
	) -> Result<u64, Bolt12SemanticError> {
		match invoice_request.amount_msats {
			Some(amount_msats) => Ok(amount_msats),
			None => match invoice_request.offer.amount() {
				Some(Amount::Bitcoin { amount_msats }) => amount_msats
					.checked_mul(invoice_request.quantity.unwrap_or(1))
					.ok_or(Bolt12SemanticError::InvalidAmount),
				Some(Amount::Currency { .. }) => Err(Bolt12SemanticError::MissingAmount),
				None => Err(Bolt12SemanticError::MissingAmount),
			},
		}
	}

	/// Sets the [`Invoice::relative_expiry`] as seconds since [`Invoice::created_at`].
	///
	/// Successive calls to this method will override the previous setting.
	pub fn relative_expiry(mut self, relative_expiry: Duration) -> Self {
		self.relative_expiry = Some(relative_expiry);
		self
	}

	/// Adds a fallback on-chain address to [`Invoice::fallbacks`] for paying the invoice in
	/// case it expires.
	///
	/// Successive calls to this method will add another fallback address.
	pub fn fallback(mut self, version: u8, program: Vec<u8>) -> Self {
		let fallback = FallbackAddress { version, program };
		self.fallbacks.get_or_insert_with(Vec::new).push(fallback);
		self
	}

	/// Sets the [`Invoice::features`], carried as opaque bytes.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn features(mut self, features: Vec<u8>) -> Self {
		self.features = Some(features);
		self
	}

	/// Sets the [`Invoice::signing_pubkey`]. Only needed when responding to an offer that is
	/// reachable through blinded paths alone and therefore does not name an issuer id.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn signing_pubkey(mut self, signing_pubkey: PublicKey) -> Self {
		self.signing_pubkey = Some(signing_pubkey);
		self
	}

	/// Builds an unsigned [`Invoice`] after checking for valid semantics. It can be signed by
	/// [`UnsignedInvoice::sign`].
	pub fn build(self) -> Result<UnsignedInvoice<'a>, Bolt12SemanticError> {
		if self.amount_msats > MAX_VALUE_MSAT {
			return Err(Bolt12SemanticError::InvalidAmount);
		}
		for (path, payinfo) in &self.payment_paths {
			path.check_encodable()?;
			payinfo.check_encodable()?;
		}
		if let Some(fallbacks) = &self.fallbacks {
			for fallback in fallbacks {
				fallback.check_encodable()?;
			}
		}

		// An offer reachable only through blinded paths names no issuer id; the recipient must
		// have supplied the signing key through `signing_pubkey`.
		let signing_pubkey = match self.signing_pubkey {
			None => return Err(Bolt12SemanticError::MissingSigningPubkey),
			Some(signing_pubkey) => signing_pubkey,
		};

		let InvoiceBuilder {
			invoice_request,
			payment_paths,
			created_at,
			relative_expiry,
			payment_hash,
			amount_msats,
			fallbacks,
			features,
			..
		} = self;
		let fields = InvoiceFields {
			payment_paths,
			created_at,
			relative_expiry,
			payment_hash,
			amount_msats,
			fallbacks,
			features,
			signing_pubkey,
		};
		Ok(UnsignedInvoice { invoice_request, fields })
	}
}

/// A semantically valid [`Invoice`] that hasn't been signed.
pub struct UnsignedInvoice<'a> {
	invoice_request: &'a InvoiceRequest,
	fields: InvoiceFields,
}

impl<'a> UnsignedInvoice<'a> {
	/// Signs the invoice using the given function, which is passed the digest to sign with the
	/// recipient's key. The produced signature is checked against
	/// [`Invoice::signing_pubkey`] before the invoice is returned.
	pub fn sign<F, E>(self, sign: F) -> Result<Invoice, SignError<E>>
	where
		F: FnOnce(&Message) -> Result<Signature, E>,
	{
		// Mirror the request's raw bytes, minus its signature record, so that unknown odd
		// records survive byte-for-byte.
		let mut bytes = Vec::new();
		WithoutSignatures(&self.invoice_request.bytes)
			.write(&mut bytes)
			.expect("in-memory writes cannot fail");
		self.fields.write_records(&mut bytes).expect("in-memory writes cannot fail");

		let pubkey = self.fields.signing_pubkey;
		let signature = merkle::sign_message(sign, SIGNATURE_TAG, &bytes, pubkey)?;

		// Append the signature record to the bytes.
		write_tlv_record(&mut bytes, SIGNATURE_TYPE, &signature)
			.expect("in-memory writes cannot fail");

		let contents = InvoiceContents {
			invoice_request: self.invoice_request.contents.clone(),
			fields: self.fields,
		};
		Ok(Invoice { bytes, contents, signature })
	}
}

impl Invoice {
	/// Paths to the recipient originating from publicly reachable nodes, including information
	/// needed for routing payments across them. May be empty for a recipient reachable
	/// directly.
	pub fn payment_paths(&self) -> &[(BlindedPath, BlindedPayInfo)] {
		&self.contents.fields.payment_paths[..]
	}

	/// Duration since the Unix epoch when the invoice was created.
	pub fn created_at(&self) -> Duration {
		self.contents.fields.created_at
	}

	/// Duration since [`Invoice::created_at`] when the invoice has expired and therefore
	/// should no longer be paid, defaulting to [`DEFAULT_RELATIVE_EXPIRY`]. The codec consults
	/// no clock; expiry is the caller's concern.
	pub fn relative_expiry(&self) -> Duration {
		self.contents.fields.relative_expiry.unwrap_or(DEFAULT_RELATIVE_EXPIRY)
	}

	/// SHA256 hash of the payment preimage that will be given in return for paying the
	/// invoice.
	pub fn payment_hash(&self) -> PaymentHash {
		self.contents.fields.payment_hash
	}

	/// The minimum amount required for a successful payment of the invoice, in millisatoshi.
	pub fn amount_msats(&self) -> u64 {
		self.contents.fields.amount_msats
	}

	/// Fallback addresses for paying the invoice on-chain, in order of most-preferred to
	/// least-preferred.
	pub fn fallbacks(&self) -> &[FallbackAddress] {
		self.contents.fields.fallbacks.as_ref().map(|f| f.as_slice()).unwrap_or(&[])
	}

	/// Feature bits pertaining to paying the invoice, carried opaquely.
	pub fn features(&self) -> &[u8] {
		self.contents.fields.features.as_ref().map(|f| f.as_slice()).unwrap_or(&[])
	}

	/// The public key used to sign the invoice, normally the mirrored offer's issuer id.
	pub fn signing_pubkey(&self) -> PublicKey {
		self.contents.fields.signing_pubkey
	}

	/// The payer id mirrored from the invoice request the invoice responds to.
	pub fn payer_id(&self) -> PublicKey {
		self.contents.invoice_request.payer_id
	}

	/// Signature of the invoice using [`Invoice::signing_pubkey`].
	pub fn signature(&self) -> Signature {
		self.signature
	}

	/// Verifies the invoice's signature, normally against [`Invoice::signing_pubkey`].
	/// `pubkey` may be a 33-byte compressed key, whose leading byte is stripped, or a 32-byte
	/// x-only key; any other length is an error.
	///
	/// Returns `Ok(false)`, not an error, when the signature simply does not match.
	pub fn verify_signature(&self, pubkey: &[u8]) -> Result<bool, Bolt12SemanticError> {
		merkle::verify_signature(&self.signature, SIGNATURE_TAG, &self.bytes, pubkey)
	}
}

impl InvoiceFields {
	/// Emits the records in [`INVOICE_TYPES`], in ascending type order.
	fn write_records<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		if !self.payment_paths.is_empty() {
			let paths: Vec<&BlindedPath> =
				self.payment_paths.iter().map(|(path, _)| path).collect();
			let blindedpay: Vec<&BlindedPayInfo> =
				self.payment_paths.iter().map(|(_, payinfo)| payinfo).collect();
			write_tlv_record(writer, INVOICE_TYPE_PATHS, &WithoutLength(&paths))?;
			write_tlv_record(writer, INVOICE_TYPE_BLINDEDPAY, &WithoutLength(&blindedpay))?;
		}
		write_tlv_record(writer, INVOICE_TYPE_CREATED_AT, &Tu64(self.created_at.as_secs()))?;
		if let Some(relative_expiry) = self.relative_expiry {
			write_tlv_record(
				writer,
				INVOICE_TYPE_RELATIVE_EXPIRY,
				&Tu64(relative_expiry.as_secs()),
			)?;
		}
		write_tlv_record(writer, INVOICE_TYPE_PAYMENT_HASH, &self.payment_hash)?;
		write_tlv_record(writer, INVOICE_TYPE_AMOUNT, &Tu64(self.amount_msats))?;
		if let Some(fallbacks) = &self.fallbacks {
			write_tlv_record(writer, INVOICE_TYPE_FALLBACKS, &WithoutLength(fallbacks))?;
		}
		if let Some(features) = &self.features {
			write_tlv_record(writer, INVOICE_TYPE_FEATURES, &WithoutLength(features))?;
		}
		write_tlv_record(writer, INVOICE_TYPE_NODE_ID, &self.signing_pubkey)?;
		Ok(())
	}
}

impl TryFrom<InvoiceTlvStream> for InvoiceFields {
	type Error = Bolt12SemanticError;

	fn try_from(tlv_stream: InvoiceTlvStream) -> Result<Self, Self::Error> {
		let InvoiceTlvStream {
			paths,
			blindedpay,
			created_at,
			relative_expiry,
			payment_hash,
			amount,
			fallbacks,
			features,
			node_id,
		} = tlv_stream;

		let paths = paths.unwrap_or_default();
		let blindedpay = blindedpay.unwrap_or_default();
		if paths.len() != blindedpay.len() {
			return Err(Bolt12SemanticError::InvalidPayInfo);
		}
		let payment_paths = paths.into_iter().zip(blindedpay.into_iter()).collect();

		let created_at = match created_at {
			None => return Err(Bolt12SemanticError::MissingCreationTime),
			Some(timestamp) => Duration::from_secs(timestamp),
		};

		let relative_expiry = relative_expiry.map(Duration::from_secs);

		let payment_hash = match payment_hash {
			None => return Err(Bolt12SemanticError::MissingPaymentHash),
			Some(payment_hash) => payment_hash,
		};

		let amount_msats = match amount {
			None => return Err(Bolt12SemanticError::MissingAmount),
			Some(amount_msats) if amount_msats > MAX_VALUE_MSAT => {
				return Err(Bolt12SemanticError::InvalidAmount);
			},
			Some(amount_msats) => amount_msats,
		};

		let signing_pubkey = match node_id {
			None => return Err(Bolt12SemanticError::MissingSigningPubkey),
			Some(node_id) => node_id,
		};

		Ok(InvoiceFields {
			payment_paths,
			created_at,
			relative_expiry,
			payment_hash,
			amount_msats,
			fallbacks,
			features,
			signing_pubkey,
		})
	}
}

impl AsRef<[u8]> for Invoice {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

impl Writeable for Invoice {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		WithoutLength(&self.bytes).write(writer)
	}
}

impl TryFrom<Vec<u8>> for Invoice {
	type Error = Bolt12ParseError;

	fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
		let mut offer = OfferContents::empty();
		let mut invoice_request_stream = InvoiceRequestTlvStream::default();
		let mut invoice_stream = InvoiceTlvStream::default();
		let mut signature = None;
		tlv::parse_stream(&bytes, |record| {
			if OFFER_TYPES.contains(&record.r#type) {
				return offer.set_record(record);
			}
			if record.r#type == INVREQ_TYPE_METADATA
				|| INVOICE_REQUEST_TYPES.contains(&record.r#type)
			{
				return invoice_request_stream.set_record(record);
			}
			if INVOICE_TYPES.contains(&record.r#type) {
				return invoice_stream.set_record(record);
			}
			if record.r#type == SIGNATURE_TYPE {
				signature = Some(record.decode::<Signature>()?);
				return Ok(true);
			}
			Ok(false)
		})?;

		let invoice_request =
			InvoiceRequestContents::try_from((offer, invoice_request_stream))?;
		let fields = InvoiceFields::try_from(invoice_stream)?;
		let contents = InvoiceContents { invoice_request, fields };

		let signature = match signature {
			None => {
				return Err(Bolt12ParseError::InvalidSemantics(
					Bolt12SemanticError::MissingSignature,
				));
			},
			Some(signature) => signature,
		};

		Ok(Invoice { bytes, contents, signature })
	}
}

impl Bech32Encode for Invoice {
	const BECH32_HRP: &'static str = "lni";
}

impl FromStr for Invoice {
	type Err = Bolt12ParseError;

	fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
		Self::from_bech32_str(s)
	}
}

impl core::fmt::Display for Invoice {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		self.fmt_bech32_str(f)
	}
}

#[cfg(feature = "serde")]
impl serde::Serialize for Invoice {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Invoice {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s: String = serde::Deserialize::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
