use crate::model::Id;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// `follower_id` sees the posts of `followed_id` in their home timeline.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct FollowEdge {
    pub follower_id: Id<UserMarker>,
    pub followed_id: Id<UserMarker>,
}
