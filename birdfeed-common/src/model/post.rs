use crate::model::{Id, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as _, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TEXT_MAX_LEN: usize = 280;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A published post. Never mutated after it has been stored.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    /// Client supplied, doubles as the idempotency key of the publish request.
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub text: PostText,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidPostTextError {
    #[error("Post text cannot be empty")]
    Empty,
    #[error("Post text has {0} characters, the maximum is {max}", max = POST_TEXT_MAX_LEN)]
    TooLong(usize),
}

impl PostText {
    /// Trims surrounding whitespace and checks the length in characters, not bytes.
    pub fn new(text: &str) -> Result<Self, InvalidPostTextError> {
        let trimmed = text.trim();
        let len = trimmed.chars().count();

        if len == 0 {
            Err(InvalidPostTextError::Empty)
        } else if len > POST_TEXT_MAX_LEN {
            Err(InvalidPostTextError::TooLong(len))
        } else {
            Ok(PostText(trimmed.to_owned()))
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

impl<'de> Deserialize<'de> for PostText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostText::new(&inner)
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(&inner), &"PostText"))
    }
}
