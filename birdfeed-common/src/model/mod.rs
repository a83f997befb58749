pub mod post;
pub mod user;

use crate::{model::post::InvalidPostTextError, util::NonPositiveDurationError};
use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    str::FromStr,
};
use thiserror::Error;

pub const ID_MAX_LEN: usize = 128;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Id(#[from] InvalidIdError),
    #[error(transparent)]
    PostText(#[from] InvalidPostTextError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidIdError {
    #[error("Ids must not be blank")]
    Blank,
    #[error("Id is longer than {max} characters: {0:?}", max = ID_MAX_LEN)]
    TooLong(String),
}

/// Opaque, client-chosen identifier tagged with the kind of object it names.
///
/// The marker keeps user ids and post ids apart at compile time; both are plain
/// strings on the wire, in the database and in the feed cache.
#[derive_where(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Id<Marker>(String, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    pub fn new(id: String) -> Result<Self, InvalidIdError> {
        if id.trim().is_empty() {
            Err(InvalidIdError::Blank)
        } else if id.chars().count() > ID_MAX_LEN {
            Err(InvalidIdError::TooLong(id))
        } else {
            Ok(Self(id, PhantomData))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl<Marker> TryFrom<String> for Id<Marker> {
    type Error = InvalidIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<Marker> AsRef<str> for Id<Marker> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de, Marker> Deserialize<'de> for Id<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Id::new(inner).map_err(|err| match err {
            InvalidIdError::Blank => Error::invalid_value(Unexpected::Str(""), &"a non-blank id"),
            InvalidIdError::TooLong(id) => Error::invalid_length(id.chars().count(), &"a short id"),
        })
    }
}
