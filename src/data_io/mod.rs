pub mod decoder;
pub mod source;
pub mod sources;

pub use decoder::{DecodeError, DecoderContext, NetcdfReader, RecordReader};
pub use source::{normalize_longitude, SourceError, SourceField};
pub use sources::{MetVariable, Scaling, SourceKind, VariableGroup};
