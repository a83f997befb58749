use crate::server::ServerError;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::TypedHeader;
use birdfeed_common::model::{Id, user::UserMarker};
use headers::{Header, HeaderName, HeaderValue};

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// `X-User-ID`: the account a request acts as. Identity is taken on trust from
/// the caller.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserIdHeader(pub Id<UserMarker>);

impl Header for UserIdHeader {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        if values.next().is_some() {
            return Err(headers::Error::invalid());
        }

        let id = value.to_str().map_err(|_| headers::Error::invalid())?;
        Id::new(id.to_owned())
            .map(Self)
            .map_err(|_| headers::Error::invalid())
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(self.0.get()) {
            values.extend(std::iter::once(value));
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct RequestingUser {
    id: Id<UserMarker>,
}

impl RequestingUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for RequestingUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(UserIdHeader(id)) =
            TypedHeader::<UserIdHeader>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidUserHeader)?;

        Ok(Self { id })
    }
}
