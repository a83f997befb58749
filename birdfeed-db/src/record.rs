use birdfeed_common::model::{
    Id, ModelValidationError,
    post::{Post, PostText},
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::new(value.id)?,
            author_id: Id::new(value.author_id)?,
            text: PostText::new(&value.text)?,
            created_at: value.created_at,
        })
    }
}
