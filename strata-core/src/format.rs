//! Serialization format seam.
//!
//! Values cross the tier boundary as raw bytes produced by a [`Format`].
//! The trait is object-safe (the engine holds a `dyn Format`), so typed
//! access goes through the erased-serde bridge; [`FormatExt`] restores the
//! generic `encode`/`decode` surface on top of it.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::value::Raw;

/// Error produced by serialization or deserialization.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Serialization failed.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    /// Deserialization failed.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Object-safe serialization format for cache values.
pub trait Format: Send + Sync {
    /// Serializes an erased value into raw bytes.
    fn serialize(&self, value: &dyn erased_serde::Serialize) -> Result<Raw, FormatError>;

    /// Runs `f` with an erased deserializer over `data`.
    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), FormatError>,
    ) -> Result<(), FormatError>;
}

/// Typed helpers over any [`Format`], including `dyn Format`.
pub trait FormatExt: Format {
    /// Serializes `value` into raw bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Raw, FormatError> {
        self.serialize(&value)
    }

    /// Deserializes raw bytes into `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FormatError> {
        let mut out: Option<T> = None;
        self.with_deserializer(data, &mut |deserializer| {
            out = Some(
                erased_serde::deserialize::<T>(deserializer)
                    .map_err(|e| FormatError::Deserialize(Box::new(e)))?,
            );
            Ok(())
        })?;
        out.ok_or_else(|| FormatError::Deserialize("deserializer produced no value".into()))
    }
}

impl<F: Format + ?Sized> FormatExt for F {}

/// JSON format (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn serialize(&self, value: &dyn erased_serde::Serialize) -> Result<Raw, FormatError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| FormatError::Serialize(Box::new(e)))
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), FormatError>,
    ) -> Result<(), FormatError> {
        let mut deserializer = serde_json::Deserializer::from_slice(data);
        let mut erased = <dyn erased_serde::Deserializer>::erase(&mut deserializer);
        f(&mut erased)
    }
}
