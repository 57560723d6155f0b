// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Data structures and encoding for `offer` messages.
//!
//! An [`Offer`] is an "offer to be paid". It is typically constructed by a merchant and
//! published as a QR code to be scanned by a customer. The customer uses the offer to request
//! an invoice from the merchant to be paid.
//!
//! ```
//! use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
//! use lightning_bolt12::offer::{Offer, OfferBuilder};
//!
//! # fn build() -> Result<(), lightning_bolt12::parse::Bolt12ParseError> {
//! let secp_ctx = Secp256k1::new();
//! let issuer_id =
//!     PublicKey::from_secret_key(&secp_ctx, &SecretKey::from_slice(&[42; 32]).unwrap());
//!
//! let offer = OfferBuilder::new()
//!     .description("coffee, large".to_string())
//!     .amount(20_000)
//!     .issuer_id(issuer_id)
//!     .build()?;
//!
//! // Encode as a bech32 string for use in a QR code.
//! let encoded_offer = offer.to_string();
//!
//! // Parse from a bech32 string after scanning from a QR code.
//! let offer = encoded_offer.parse::<Offer>()?;
//! # Ok(())
//! # }
//! ```

use bitcoin::blockdata::constants::ChainHash;
use bitcoin::network::constants::Network;
use bitcoin::secp256k1::PublicKey;
use core::str::FromStr;
use core::time::Duration;
use std::io;

use crate::blinded_path::BlindedPath;
use crate::invoice_request::InvoiceRequestBuilder;
use crate::parse::{Bech32Encode, Bolt12ParseError, Bolt12SemanticError};
use crate::ser::{DecodeError, Tu64, Writeable, Writer, WithoutLength};
use crate::tlv::{self, write_tlv_record, TlvRecord};
use crate::{UntrustedString, MAX_VALUE_MSAT};

/// The TLV type range an offer's records must lie in. Also used for the offer records mirrored
/// into invoice requests and invoices.
pub(crate) const OFFER_TYPES: core::ops::Range<u64> = 1..80;

const OFFER_TYPE_CHAINS: u64 = 2;
const OFFER_TYPE_METADATA: u64 = 4;
const OFFER_TYPE_CURRENCY: u64 = 6;
const OFFER_TYPE_AMOUNT: u64 = 8;
const OFFER_TYPE_DESCRIPTION: u64 = 10;
const OFFER_TYPE_FEATURES: u64 = 12;
const OFFER_TYPE_ABSOLUTE_EXPIRY: u64 = 14;
const OFFER_TYPE_PATHS: u64 = 16;
const OFFER_TYPE_ISSUER: u64 = 18;
const OFFER_TYPE_QUANTITY_MAX: u64 = 20;
const OFFER_TYPE_ISSUER_ID: u64 = 22;

/// An `Offer` is a potentially long-lived proposal for payment of a good or service.
///
/// An offer is a precursor to an [`InvoiceRequest`]. A merchant publishes an offer from which a
/// customer may request an [`Invoice`] for a specific quantity and using an amount sufficient
/// to cover that quantity.
///
/// Offers may be denominated in currency other than bitcoin but are ultimately paid using the
/// latter.
///
/// [`InvoiceRequest`]: crate::invoice_request::InvoiceRequest
/// [`Invoice`]: crate::invoice::Invoice
#[derive(Clone, Debug, PartialEq)]
pub struct Offer {
	// The serialized offer. Records not understood by this crate, permitted for odd types, are
	// only retained here, so encoding reuses these bytes rather than the parsed contents.
	pub(crate) bytes: Vec<u8>,
	pub(crate) contents: OfferContents,
}

/// The contents of an [`Offer`], which are mirrored into an [`InvoiceRequest`] and an
/// [`Invoice`].
///
/// [`InvoiceRequest`]: crate::invoice_request::InvoiceRequest
/// [`Invoice`]: crate::invoice::Invoice
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OfferContents {
	chains: Option<Vec<ChainHash>>,
	metadata: Option<Vec<u8>>,
	currency: Option<CurrencyCode>,
	amount: Option<u64>,
	description: Option<UntrustedString>,
	features: Option<Vec<u8>>,
	absolute_expiry: Option<Duration>,
	paths: Option<Vec<BlindedPath>>,
	issuer: Option<UntrustedString>,
	quantity_max: Option<u64>,
	issuer_id: Option<PublicKey>,
}

/// The minimum amount required for an item in an [`Offer`], denominated in either bitcoin or
/// another currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Amount {
	/// An amount of bitcoin.
	Bitcoin {
		/// The amount in millisatoshi.
		amount_msats: u64,
	},
	/// An amount of currency specified using ISO 4217.
	Currency {
		/// The currency that the amount is denominated in.
		iso4217_code: CurrencyCode,
		/// The amount in the currency unit adjusted by the ISO 4217 exponent (e.g., USD
		/// cents).
		amount: u64,
	},
}

/// An ISO 4217 three-letter currency code (e.g., USD).
pub type CurrencyCode = [u8; 3];

/// Builds an [`Offer`] for the "offer to be paid" flow.
///
/// See [module-level documentation] for usage.
///
/// [module-level documentation]: self
pub struct OfferBuilder {
	offer: OfferContents,
}

impl OfferBuilder {
	/// Creates a new builder with no fields set. A buildable offer needs at least an
	/// [`issuer_id`] or a [`path`].
	///
	/// [`issuer_id`]: Self::issuer_id
	/// [`path`]: Self::path
	pub fn new() -> Self {
		OfferBuilder { offer: OfferContents::empty() }
	}

	/// Adds the chain hash of the given [`Network`] to [`Offer::chains`]. If not called, the
	/// chain hash of [`Network::Bitcoin`] is assumed to be the only one supported.
	///
	/// Successive calls to this method will add another chain hash.
	pub fn chain(mut self, network: Network) -> Self {
		let chains = self.offer.chains.get_or_insert_with(Vec::new);
		let chain = ChainHash::using_genesis_block(network);
		if !chains.contains(&chain) {
			chains.push(chain);
		}

		self
	}

	/// Sets the [`Offer::metadata`].
	///
	/// Successive calls to this method will override the previous setting.
	pub fn metadata(mut self, metadata: Vec<u8>) -> Self {
		self.offer.metadata = Some(metadata);
		self
	}

	/// Sets the currency [`Offer::amount`] is denominated in. An offer with a currency must
	/// also have an [`amount`].
	///
	/// Successive calls to this method will override the previous setting.
	///
	/// [`amount`]: Self::amount
	pub fn currency(mut self, iso4217_code: CurrencyCode) -> Self {
		self.offer.currency = Some(iso4217_code);
		self
	}

	/// Sets the [`Offer::amount`]: in millisatoshi unless a [`currency`] is set, in which case
	/// it is in the currency's minimal unit. An offer with an amount must also have a
	/// [`description`].
	///
	/// Successive calls to this method will override the previous setting.
	///
	/// [`currency`]: Self::currency
	/// [`description`]: Self::description
	pub fn amount(mut self, amount: u64) -> Self {
		self.offer.amount = Some(amount);
		self
	}

	/// Sets the [`Offer::description`].
	///
	/// Successive calls to this method will override the previous setting.
	pub fn description(mut self, description: String) -> Self {
		self.offer.description = Some(UntrustedString(description));
		self
	}

	/// Sets the [`Offer::features`], carried as opaque bytes.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn features(mut self, features: Vec<u8>) -> Self {
		self.offer.features = Some(features);
		self
	}

	/// Sets the [`Offer::absolute_expiry`] as seconds since the Unix epoch.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn absolute_expiry(mut self, absolute_expiry: Duration) -> Self {
		self.offer.absolute_expiry = Some(absolute_expiry);
		self
	}

	/// Adds a blinded path to [`Offer::paths`]. Must include at least one path if
	/// [`Offer::issuer_id`] is not set.
	///
	/// Successive calls to this method will add another blinded path. Caller is responsible
	/// for not adding duplicate paths.
	pub fn path(mut self, path: BlindedPath) -> Self {
		self.offer.paths.get_or_insert_with(Vec::new).push(path);
		self
	}

	/// Sets the [`Offer::issuer`].
	///
	/// Successive calls to this method will override the previous setting.
	pub fn issuer(mut self, issuer: String) -> Self {
		self.offer.issuer = Some(UntrustedString(issuer));
		self
	}

	/// Sets the [`Offer::quantity_max`]: the maximum quantity of items supported, with zero
	/// indicating no upper bound.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn quantity_max(mut self, quantity_max: u64) -> Self {
		self.offer.quantity_max = Some(quantity_max);
		self
	}

	/// Sets the [`Offer::issuer_id`]: the public key invoices will be signed with. The
	/// associated secret key must be remembered while the offer is valid.
	///
	/// Use a different key per offer to avoid correlating offers.
	///
	/// Successive calls to this method will override the previous setting.
	pub fn issuer_id(mut self, issuer_id: PublicKey) -> Self {
		self.offer.issuer_id = Some(issuer_id);
		self
	}

	/// Builds an [`Offer`] from the builder's settings, after checking them for valid
	/// semantics.
	pub fn build(mut self) -> Result<Offer, Bolt12SemanticError> {
		self.offer.validate()?;
		if let Some(paths) = &self.offer.paths {
			for path in paths {
				path.check_encodable()?;
			}
		}

		if let Some(chains) = &self.offer.chains {
			if chains.len() == 1 && chains[0] == self.offer.implied_chain() {
				self.offer.chains = None;
			}
		}

		let mut bytes = Vec::new();
		self.offer.write(&mut bytes).expect("in-memory writes cannot fail");

		Ok(Offer { bytes, contents: self.offer })
	}
}

impl Offer {
	/// The chains that may be used when paying a requested invoice (e.g., bitcoin mainnet).
	/// Payments must be denominated in units of the minimal lightning-payable unit (e.g.,
	/// msats) for the selected chain.
	pub fn chains(&self) -> Vec<ChainHash> {
		self.contents.chains()
	}

	/// Returns whether the given chain is supported by the offer.
	pub fn supports_chain(&self, chain: ChainHash) -> bool {
		self.contents.supports_chain(chain)
	}

	/// Opaque bytes set by the originator. Useful for authentication and validating fields
	/// since it is reflected in `invoice_request` messages along with all the other fields
	/// from the offer.
	pub fn metadata(&self) -> Option<&Vec<u8>> {
		self.contents.metadata.as_ref()
	}

	/// The minimum amount required for a successful payment of a single item.
	pub fn amount(&self) -> Option<Amount> {
		self.contents.amount()
	}

	/// A complete description of the purpose of the payment. Intended to be displayed to the
	/// user but with the caveat that it has not been verified in any way.
	pub fn description(&self) -> Option<&UntrustedString> {
		self.contents.description.as_ref()
	}

	/// Feature bits pertaining to the offer, carried opaquely.
	pub fn features(&self) -> &[u8] {
		self.contents.features.as_ref().map(|features| features.as_slice()).unwrap_or(&[])
	}

	/// Duration since the Unix epoch when an invoice should no longer be requested.
	///
	/// If `None`, the offer does not expire.
	pub fn absolute_expiry(&self) -> Option<Duration> {
		self.contents.absolute_expiry
	}

	/// Paths to the recipient originating from publicly reachable nodes. Blinded paths provide
	/// recipient privacy by obfuscating its node id.
	pub fn paths(&self) -> &[BlindedPath] {
		self.contents.paths.as_ref().map(|paths| paths.as_slice()).unwrap_or(&[])
	}

	/// The issuer of the offer, possibly beginning with `user@domain` or `domain`. Intended to
	/// be displayed to the user but with the caveat that it has not been verified in any way.
	pub fn issuer(&self) -> Option<&UntrustedString> {
		self.contents.issuer.as_ref()
	}

	/// The maximum quantity of items supported, with zero indicating no upper bound. If
	/// `None`, only one item is supported.
	pub fn quantity_max(&self) -> Option<u64> {
		self.contents.quantity_max
	}

	/// The public key used by the recipient to sign invoices.
	pub fn issuer_id(&self) -> Option<PublicKey> {
		self.contents.issuer_id
	}

	/// Creates an [`InvoiceRequestBuilder`] for the offer with the given `metadata` and
	/// `payer_id`, which will be reflected in the `Invoice` response.
	///
	/// The `metadata` must be non-empty and is useful for including information about the
	/// derivation of `payer_id` such that invoice response handling can be stateless. Also
	/// serves as payer-provided entropy while hashing in the signature calculation.
	///
	/// This should not leak any information such as by using a simple BIP-32 derivation path.
	/// Otherwise, payments may be correlated.
	pub fn request_invoice(
		&self, metadata: Vec<u8>, payer_id: PublicKey,
	) -> Result<InvoiceRequestBuilder, Bolt12SemanticError> {
		if metadata.is_empty() {
			return Err(Bolt12SemanticError::MissingPayerMetadata);
		}

		Ok(InvoiceRequestBuilder::new(self, metadata, payer_id))
	}
}

impl AsRef<[u8]> for Offer {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

impl OfferContents {
	pub(crate) fn empty() -> Self {
		OfferContents {
			chains: None,
			metadata: None,
			currency: None,
			amount: None,
			description: None,
			features: None,
			absolute_expiry: None,
			paths: None,
			issuer: None,
			quantity_max: None,
			issuer_id: None,
		}
	}

	pub(crate) fn chains(&self) -> Vec<ChainHash> {
		self.chains.as_ref().cloned().unwrap_or_else(|| vec![self.implied_chain()])
	}

	pub(crate) fn implied_chain(&self) -> ChainHash {
		ChainHash::using_genesis_block(Network::Bitcoin)
	}

	pub(crate) fn supports_chain(&self, chain: ChainHash) -> bool {
		self.chains().contains(&chain)
	}

	pub(crate) fn issuer_id(&self) -> Option<PublicKey> {
		self.issuer_id
	}

	pub(crate) fn amount(&self) -> Option<Amount> {
		match (self.currency, self.amount) {
			(None, Some(amount_msats)) => Some(Amount::Bitcoin { amount_msats }),
			(Some(iso4217_code), Some(amount)) => Some(Amount::Currency { iso4217_code, amount }),
			(_, None) => None,
		}
	}

	/// Checks the cross-field rules an offer (or the offer records mirrored into another
	/// message) must satisfy.
	pub(crate) fn validate(&self) -> Result<(), Bolt12SemanticError> {
		match (self.currency, self.amount) {
			(Some(_), None) => return Err(Bolt12SemanticError::MissingAmount),
			(None, Some(amount_msats)) if amount_msats > MAX_VALUE_MSAT => {
				return Err(Bolt12SemanticError::InvalidAmount);
			},
			_ => {},
		}

		if self.amount.is_some() && self.description.is_none() {
			return Err(Bolt12SemanticError::MissingDescription);
		}

		if self.issuer_id.is_none() && self.paths.as_ref().map_or(true, |paths| paths.is_empty())
		{
			return Err(Bolt12SemanticError::MissingIssuerId);
		}

		Ok(())
	}

	/// Applies a TLV record from [`OFFER_TYPES`], returning whether its type was recognized.
	pub(crate) fn set_record(&mut self, record: &TlvRecord) -> Result<bool, DecodeError> {
		match record.r#type {
			OFFER_TYPE_CHAINS => {
				self.chains = Some(record.decode::<WithoutLength<Vec<ChainHash>>>()?.0);
			},
			OFFER_TYPE_METADATA => {
				self.metadata = Some(record.decode::<WithoutLength<Vec<u8>>>()?.0);
			},
			OFFER_TYPE_CURRENCY => self.currency = Some(record.decode()?),
			OFFER_TYPE_AMOUNT => self.amount = Some(record.decode::<Tu64>()?.0),
			OFFER_TYPE_DESCRIPTION => {
				self.description = Some(UntrustedString(record.decode::<WithoutLength<String>>()?.0));
			},
			OFFER_TYPE_FEATURES => {
				self.features = Some(record.decode::<WithoutLength<Vec<u8>>>()?.0);
			},
			OFFER_TYPE_ABSOLUTE_EXPIRY => {
				self.absolute_expiry = Some(Duration::from_secs(record.decode::<Tu64>()?.0));
			},
			OFFER_TYPE_PATHS => {
				self.paths = Some(record.decode::<WithoutLength<Vec<BlindedPath>>>()?.0);
			},
			OFFER_TYPE_ISSUER => {
				self.issuer = Some(UntrustedString(record.decode::<WithoutLength<String>>()?.0));
			},
			OFFER_TYPE_QUANTITY_MAX => self.quantity_max = Some(record.decode::<Tu64>()?.0),
			OFFER_TYPE_ISSUER_ID => self.issuer_id = Some(record.decode()?),
			_ => return Ok(false),
		}
		Ok(true)
	}
}

impl Writeable for Offer {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		WithoutLength(&self.bytes).write(writer)
	}
}

// Emits the offer's records in ascending type order, as the stream invariants require.
impl Writeable for OfferContents {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		if let Some(chains) = &self.chains {
			write_tlv_record(writer, OFFER_TYPE_CHAINS, &WithoutLength(chains))?;
		}
		if let Some(metadata) = &self.metadata {
			write_tlv_record(writer, OFFER_TYPE_METADATA, &WithoutLength(metadata))?;
		}
		if let Some(currency) = &self.currency {
			write_tlv_record(writer, OFFER_TYPE_CURRENCY, currency)?;
		}
		if let Some(amount) = self.amount {
			write_tlv_record(writer, OFFER_TYPE_AMOUNT, &Tu64(amount))?;
		}
		if let Some(description) = &self.description {
			write_tlv_record(writer, OFFER_TYPE_DESCRIPTION, &WithoutLength(&description.0))?;
		}
		if let Some(features) = &self.features {
			write_tlv_record(writer, OFFER_TYPE_FEATURES, &WithoutLength(features))?;
		}
		if let Some(absolute_expiry) = self.absolute_expiry {
			write_tlv_record(writer, OFFER_TYPE_ABSOLUTE_EXPIRY, &Tu64(absolute_expiry.as_secs()))?;
		}
		if let Some(paths) = &self.paths {
			write_tlv_record(writer, OFFER_TYPE_PATHS, &WithoutLength(paths))?;
		}
		if let Some(issuer) = &self.issuer {
			write_tlv_record(writer, OFFER_TYPE_ISSUER, &WithoutLength(&issuer.0))?;
		}
		if let Some(quantity_max) = self.quantity_max {
			write_tlv_record(writer, OFFER_TYPE_QUANTITY_MAX, &Tu64(quantity_max))?;
		}
		if let Some(issuer_id) = &self.issuer_id {
			write_tlv_record(writer, OFFER_TYPE_ISSUER_ID, issuer_id)?;
		}
		Ok(())
	}
}

impl TryFrom<Vec<u8>> for Offer {
	type Error = Bolt12ParseError;

	fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
		let mut contents = OfferContents::empty();
		tlv::parse_stream(&bytes, |record| {
			if !OFFER_TYPES.contains(&record.r#type) {
				return Ok(false);
			}
			contents.set_record(record)
		})?;
		contents.validate()?;

		Ok(Offer { bytes, contents })
	}
}

impl Bech32Encode for Offer {
	const BECH32_HRP: &'static str = "lno";
}

impl FromStr for Offer {
	type Err = Bolt12ParseError;

	fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
		Self::from_bech32_str(s)
	}
}

impl core::fmt::Display for Offer {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		self.fmt_bech32_str(f)
	}
}

#[cfg(feature = "serde")]
impl serde::Serialize for Offer {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Offer {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s: String = serde::Deserialize::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::{Amount, Offer, OfferBuilder};
	use crate::blinded_path::{BlindedHop, BlindedPath};
	use crate::parse::{Bolt12ParseError, Bolt12SemanticError};
	use crate::ser::{DecodeError, Writeable, WithoutLength};
	use crate::UntrustedString;
	use crate::tlv::write_tlv_record;

	use bitcoin::blockdata::constants::ChainHash;
	use bitcoin::network::constants::Network;
	use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
	use core::time::Duration;

	fn pubkey(byte: u8) -> PublicKey {
		let secp_ctx = Secp256k1::new();
		PublicKey::from_secret_key(&secp_ctx, &SecretKey::from_slice(&[byte; 32]).unwrap())
	}

	fn blinded_path(byte: u8) -> BlindedPath {
		BlindedPath {
			blinding_point: pubkey(byte),
			blinded_hops: vec![BlindedHop {
				blinded_node_id: pubkey(byte + 1),
				encrypted_payload: vec![0; 44],
			}],
		}
	}

	#[test]
	fn builds_minimal_offer_and_round_trips() {
		let issuer_key = hex::decode(
			"e126f68f7eafcc8b74f54d269fe206be715000f94dac067d1c04a8ca3b2db734",
		)
		.unwrap();
		let issuer_id = PublicKey::from_secret_key(
			&Secp256k1::new(),
			&SecretKey::from_slice(&issuer_key).unwrap(),
		);

		let offer = OfferBuilder::new()
			.description("Test offer".to_string())
			.issuer_id(issuer_id)
			.build()
			.unwrap();

		let encoded = offer.to_string();
		assert!(encoded.starts_with("lno1"));

		let parsed = encoded.parse::<Offer>().unwrap();
		assert_eq!(parsed, offer);
		assert_eq!(parsed.description(), Some(&UntrustedString("Test offer".to_string())));
		assert_eq!(parsed.issuer_id(), Some(issuer_id));
		assert_eq!(parsed.contents.chains, None);
		assert_eq!(parsed.amount(), None);
		assert_eq!(parsed.metadata(), None);
		assert_eq!(parsed.features(), &[] as &[u8]);
		assert_eq!(parsed.absolute_expiry(), None);
		assert_eq!(parsed.paths(), &[] as &[BlindedPath]);
		assert_eq!(parsed.issuer(), None);
		assert_eq!(parsed.quantity_max(), None);
	}

	#[test]
	fn fails_building_offer_with_amount_but_no_description() {
		match OfferBuilder::new().amount(1000).issuer_id(pubkey(42)).build() {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12SemanticError::MissingDescription),
		}
	}

	#[test]
	fn fails_building_offer_with_currency_but_no_amount() {
		match OfferBuilder::new()
			.currency(*b"USD")
			.description("x".to_string())
			.issuer_id(pubkey(42))
			.build()
		{
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12SemanticError::MissingAmount),
		}
	}

	#[test]
	fn fails_building_offer_without_issuer_id_or_paths() {
		match OfferBuilder::new().description("foo".to_string()).build() {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12SemanticError::MissingIssuerId),
		}

		assert!(OfferBuilder::new().path(blinded_path(40)).build().is_ok());
	}

	#[test]
	fn fails_building_offer_with_excessive_amount() {
		match OfferBuilder::new()
			.description("foo".to_string())
			.amount(crate::MAX_VALUE_MSAT + 1)
			.issuer_id(pubkey(42))
			.build()
		{
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12SemanticError::InvalidAmount),
		}

		// Currency amounts are not interpreted and have no msat cap.
		assert!(OfferBuilder::new()
			.description("foo".to_string())
			.currency(*b"USD")
			.amount(crate::MAX_VALUE_MSAT + 1)
			.issuer_id(pubkey(42))
			.build()
			.is_ok());
	}

	#[test]
	fn builds_offer_with_chains() {
		let mainnet = ChainHash::using_genesis_block(Network::Bitcoin);
		let testnet = ChainHash::using_genesis_block(Network::Testnet);

		// The implied chain alone is normalized away.
		let offer =
			OfferBuilder::new().chain(Network::Bitcoin).issuer_id(pubkey(42)).build().unwrap();
		assert_eq!(offer.contents.chains, None);
		assert!(offer.supports_chain(mainnet));
		assert_eq!(offer.chains(), vec![mainnet]);

		let offer = OfferBuilder::new()
			.chain(Network::Testnet)
			.chain(Network::Testnet)
			.issuer_id(pubkey(42))
			.build()
			.unwrap();
		assert!(offer.supports_chain(testnet));
		assert!(!offer.supports_chain(mainnet));
		assert_eq!(offer.chains(), vec![testnet]);

		let parsed = offer.to_string().parse::<Offer>().unwrap();
		assert_eq!(parsed.chains(), vec![testnet]);
	}

	#[test]
	fn builds_offer_with_all_fields() {
		let offer = OfferBuilder::new()
			.chain(Network::Testnet)
			.metadata(vec![0x2A; 16])
			.amount(10)
			.currency(*b"USD")
			.description("an offer".to_string())
			.features(vec![0x01])
			.absolute_expiry(Duration::from_secs(100_000_000))
			.path(blinded_path(40))
			.issuer("merchant".to_string())
			.quantity_max(10)
			.issuer_id(pubkey(42))
			.build()
			.unwrap();

		let parsed = offer.to_string().parse::<Offer>().unwrap();
		assert_eq!(parsed, offer);
		assert_eq!(
			parsed.amount(),
			Some(Amount::Currency { iso4217_code: *b"USD", amount: 10 }),
		);
		assert_eq!(parsed.metadata(), Some(&vec![0x2A; 16]));
		assert_eq!(parsed.features(), &[0x01]);
		assert_eq!(parsed.absolute_expiry(), Some(Duration::from_secs(100_000_000)));
		assert_eq!(parsed.paths().len(), 1);
		assert_eq!(parsed.issuer(), Some(&UntrustedString("merchant".to_string())));
		assert_eq!(parsed.quantity_max(), Some(10));
	}

	#[test]
	fn parsing_applies_offer_rules() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.amount(1000)
			.issuer_id(pubkey(42))
			.build()
			.unwrap();

		// Rewrite the offer without its description record (type 10).
		let mut contents = offer.contents.clone();
		contents.description = None;
		let encoded = contents.encode();
		match Offer::try_from(encoded) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(
				e,
				Bolt12ParseError::InvalidSemantics(Bolt12SemanticError::MissingDescription),
			),
		}

		let mut contents = offer.contents.clone();
		contents.currency = Some(*b"USD");
		contents.amount = None;
		let encoded = contents.encode();
		match Offer::try_from(encoded) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(
				e,
				Bolt12ParseError::InvalidSemantics(Bolt12SemanticError::MissingAmount),
			),
		}
	}

	#[test]
	fn parsing_preserves_unknown_odd_records() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.issuer_id(pubkey(42))
			.build()
			.unwrap();

		let mut encoded = offer.bytes.clone();
		write_tlv_record(&mut encoded, 79, &WithoutLength(&vec![0x11u8, 0x22])).unwrap();

		let parsed = Offer::try_from(encoded.clone()).unwrap();
		// The unknown record does not surface in the contents but survives re-encoding
		// bit-for-bit.
		assert_eq!(parsed.contents, offer.contents);
		assert_eq!(parsed.to_string().parse::<Offer>().unwrap().bytes, encoded);
	}

	#[test]
	fn parsing_rejects_unknown_even_records() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.issuer_id(pubkey(42))
			.build()
			.unwrap();

		let mut encoded = offer.bytes.clone();
		write_tlv_record(&mut encoded, 24, &WithoutLength(&vec![0x11u8])).unwrap();
		match Offer::try_from(encoded) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::Decode(DecodeError::UnknownEvenType(24))),
		}

		// Types past the offer range are unknown to offers, including signature records.
		let mut encoded = offer.bytes.clone();
		write_tlv_record(&mut encoded, 240, &[0x5A; 64]).unwrap();
		match Offer::try_from(encoded) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::Decode(DecodeError::UnknownEvenType(240))),
		}
	}

	#[test]
	fn parsing_rejects_out_of_order_records() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.issuer_id(pubkey(42))
			.build()
			.unwrap();

		// Repeat the description record (type 10) after the issuer id (type 22).
		let mut encoded = offer.bytes.clone();
		write_tlv_record(&mut encoded, 10, &WithoutLength(&"bar".to_string())).unwrap();
		match Offer::try_from(encoded) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::Decode(DecodeError::UnorderedTlvStream)),
		}
	}

	#[test]
	fn parsing_rejects_malformed_chains_value() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.issuer_id(pubkey(42))
			.build()
			.unwrap();

		// A chains value must be a whole number of 32-byte hashes.
		let mut encoded = Vec::new();
		write_tlv_record(&mut encoded, 2, &WithoutLength(&vec![0xFFu8; 33])).unwrap();
		encoded.extend_from_slice(&offer.bytes);
		match Offer::try_from(encoded) {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::Decode(DecodeError::ShortRead)),
		}
	}

	#[test]
	fn envelope_accepts_continuations_and_case() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.issuer_id(pubkey(42))
			.build()
			.unwrap();
		let encoded = offer.to_string();

		let (head, tail) = encoded.split_at(10);
		for separator in ["+", "+ ", "+\n  ", "+\t", "+\r\n "] {
			let wrapped = format!("{}{}{}", head, separator, tail);
			assert_eq!(wrapped.parse::<Offer>().unwrap(), offer);
		}

		// A continuation is valid at any interior position, including within the prefix.
		for k in 1..encoded.len() {
			let wrapped = format!("{}+\n  {}", &encoded[..k], &encoded[k..]);
			assert_eq!(wrapped.parse::<Offer>().unwrap(), offer);
		}

		assert_eq!(encoded.to_uppercase().parse::<Offer>().unwrap(), offer);

		for invalid in [
			format!("+{}", encoded),
			format!("{}+", encoded),
			format!("{}+ ", encoded),
			format!("{}++{}", head, tail),
		] {
			match invalid.parse::<Offer>() {
				Ok(_) => panic!("expected error for {:?}", invalid),
				Err(e) => assert_eq!(e, Bolt12ParseError::InvalidContinuation),
			}
		}
	}

	#[test]
	fn envelope_rejects_oversized_messages() {
		let mut encoded = String::with_capacity(crate::MAX_MESSAGE_SIZE + 4);
		encoded.push_str("lno1");
		while encoded.len() <= crate::MAX_MESSAGE_SIZE {
			encoded.push('q');
		}
		match encoded.parse::<Offer>() {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::Decode(DecodeError::InvalidValue)),
		}
	}

	#[test]
	fn envelope_rejects_foreign_prefixes_and_mixed_case() {
		let offer = OfferBuilder::new()
			.description("foo".to_string())
			.issuer_id(pubkey(42))
			.build()
			.unwrap();
		let encoded = offer.to_string();

		let with_invoice_hrp = format!("lni{}", &encoded[3..]);
		match with_invoice_hrp.parse::<Offer>() {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(e, Bolt12ParseError::InvalidBech32Hrp),
		}

		match "Lno1pq".parse::<Offer>() {
			Ok(_) => panic!("expected error"),
			Err(e) => assert_eq!(
				e,
				Bolt12ParseError::Bech32(crate::bech32::Bech32Error::MixedCase),
			),
		}
	}
}
