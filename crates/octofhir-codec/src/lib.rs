//! Binary record codec for FHIR resources.
//!
//! [`FhirBinaryCodec`] turns a resource into a [`BinaryRecord`] tree using
//! only the schema's child descriptors, and [`format`] lays that tree out
//! as bytes for the grid.

pub mod codec;
pub mod error;
pub mod format;
pub mod record;

pub use codec::FhirBinaryCodec;
pub use error::{CodecError, CodecResult};
pub use format::{from_bytes, record_to_bytes, to_bytes};
pub use record::{BinaryRecord, RecordBody, RecordValue};
