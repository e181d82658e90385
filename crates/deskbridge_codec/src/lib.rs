//! # DeskBridge Codec
//!
//! Payload model and storage codec for DeskBridge.
//!
//! Staged records are schemaless field maps ([`Record`]) whose values form
//! a small closed tree ([`Value`]). A storage blob always holds a **batch**
//! of records, encoded as a CBOR array; a single staged record is simply a
//! batch of one.
//!
//! Round-trips are lossless for scalar and arbitrarily nested map/array
//! fields - the staging layer must hand the request builder exactly the
//! payload the origin submitted.
//!
//! ## Usage
//!
//! ```
//! use deskbridge_codec::{decode_records, encode_records, Record};
//!
//! let mut record = Record::new();
//! record.set("id", "ORD-1");
//!
//! let bytes = encode_records(std::slice::from_ref(&record)).unwrap();
//! let decoded = decode_records(&bytes).unwrap();
//! assert_eq!(decoded, vec![record]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;
mod value;

pub use error::{CodecError, CodecResult};
pub use record::Record;
pub use value::Value;

/// File extension used for encoded blobs in storage keys.
pub const FILE_EXTENSION: &str = "cbor";

/// Encode a batch of records to CBOR bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_records(records: &[Record]) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(records, &mut buffer)
        .map_err(|err| CodecError::encoding_failed(err.to_string()))?;
    Ok(buffer)
}

/// Encode a single record as a batch of one.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_record(record: &Record) -> CodecResult<Vec<u8>> {
    encode_records(std::slice::from_ref(record))
}

/// Decode a batch of records from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a CBOR array of records.
pub fn decode_records(bytes: &[u8]) -> CodecResult<Vec<Record>> {
    ciborium::from_reader(bytes).map_err(|err| CodecError::decoding_failed(err.to_string()))
}

/// Decode a blob expected to hold exactly one record.
///
/// Blobs written by the staging engine hold one record each; batch blobs
/// (polling) hold several. This returns the first record and errors on an
/// empty batch.
///
/// # Errors
///
/// Returns an error if the bytes do not decode, or decode to zero records.
pub fn decode_first_record(bytes: &[u8]) -> CodecResult<Record> {
    decode_records(bytes)?
        .into_iter()
        .next()
        .ok_or_else(|| CodecError::decoding_failed("empty record batch"))
}
