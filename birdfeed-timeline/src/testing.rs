//! In-memory store, cache and event sink for exercising the engine.

use crate::{FanOutReport, Timeline, TimelineEvents};
use birdfeed_common::{
    model::{
        Id,
        post::{Post, PostMarker, PostText},
        user::{FollowEdge, UserMarker},
    },
    store::{FeedCache, PostStore},
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio_util::task::TaskTracker;

pub fn user(id: &str) -> Id<UserMarker> {
    id.parse().unwrap()
}

pub fn post_id(id: &str) -> Id<PostMarker> {
    id.parse().unwrap()
}

pub fn post(id: &str, author: &str, text: &str, created_at: OffsetDateTime) -> Post {
    Post {
        id: post_id(id),
        author_id: user(author),
        text: PostText::new(text).unwrap(),
        created_at,
    }
}

pub fn timeline(
    store: MemoryStore,
    cache: MemoryCache,
) -> (Timeline<MemoryStore, MemoryCache, RecordingEvents>, TaskTracker) {
    let tasks = TaskTracker::new();
    let timeline = Timeline::new(store, cache, RecordingEvents::default(), tasks.clone());
    (timeline, tasks)
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("{0} is unavailable")]
pub struct FakeError(&'static str);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Op {
    CreatePost,
    FindPostById,
    ListFollowerIds,
    ListFollowedIds,
    ListLatestPostPerAccount,
    ListPostsByIds,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Calls {
    pub create_post: usize,
    pub find_post_by_id: usize,
    pub list_follower_ids: usize,
    pub list_followed_ids: usize,
    pub list_latest_post_per_account: usize,
    pub list_posts_by_ids: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    posts: Vec<Post>,
    follows: Vec<FollowEdge>,
    hidden_from_next_lookup: HashSet<String>,
    failing: HashSet<Op>,
    calls: Calls,
}

impl StoreState {
    fn check(&self, op: Op) -> Result<(), FakeError> {
        if self.failing.contains(&op) {
            Err(FakeError("post store"))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn insert(&self, post: Post) {
        self.state.lock().unwrap().posts.push(post);
    }

    /// Stores `post` but lets the next id lookup miss it, as if a concurrent
    /// publish inserted it right after the lookup.
    pub fn insert_hidden_from_first_lookup(&self, post: Post) {
        let mut state = self.state.lock().unwrap();
        state.hidden_from_next_lookup.insert(post.id.get().to_owned());
        state.posts.push(post);
    }

    pub fn follow(&self, follower: &str, followed: &str) {
        self.state.lock().unwrap().follows.push(FollowEdge {
            follower_id: user(follower),
            followed_id: user(followed),
        });
    }

    pub fn fail(&self, op: Op) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .posts
            .iter()
            .any(|post| post.id.get() == id)
    }

    pub fn follower_ids(&self, followed: &str) -> Vec<Id<UserMarker>> {
        self.state
            .lock()
            .unwrap()
            .follows
            .iter()
            .filter(|edge| edge.followed_id.get() == followed)
            .map(|edge| edge.follower_id.clone())
            .collect()
    }
}

impl PostStore for MemoryStore {
    type Error = FakeError;

    async fn create_post(&self, post: &Post) -> Result<Option<Post>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_post += 1;
        state.check(Op::CreatePost)?;

        if state.posts.iter().any(|stored| stored.id == post.id) {
            return Ok(None);
        }
        state.posts.push(post.clone());
        Ok(Some(post.clone()))
    }

    async fn find_post_by_id(&self, id: &Id<PostMarker>) -> Result<Option<Post>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.find_post_by_id += 1;
        state.check(Op::FindPostById)?;

        if state.hidden_from_next_lookup.remove(id.get()) {
            return Ok(None);
        }
        Ok(state.posts.iter().find(|post| &post.id == id).cloned())
    }

    async fn list_follower_ids(
        &self,
        user_id: &Id<UserMarker>,
    ) -> Result<Vec<Id<UserMarker>>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_follower_ids += 1;
        state.check(Op::ListFollowerIds)?;

        Ok(state
            .follows
            .iter()
            .filter(|edge| &edge.followed_id == user_id)
            .map(|edge| edge.follower_id.clone())
            .collect())
    }

    async fn list_followed_ids(
        &self,
        user_id: &Id<UserMarker>,
    ) -> Result<Vec<Id<UserMarker>>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_followed_ids += 1;
        state.check(Op::ListFollowedIds)?;

        Ok(state
            .follows
            .iter()
            .filter(|edge| &edge.follower_id == user_id)
            .map(|edge| edge.followed_id.clone())
            .collect())
    }

    async fn list_latest_post_per_account(
        &self,
        user_ids: &[Id<UserMarker>],
    ) -> Result<Vec<Post>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_latest_post_per_account += 1;
        state.check(Op::ListLatestPostPerAccount)?;

        let mut latest: HashMap<&Id<UserMarker>, &Post> = HashMap::new();
        for post in state.posts.iter().filter(|post| user_ids.contains(&post.author_id)) {
            let newest = latest.entry(&post.author_id).or_insert(post);
            if post.created_at > newest.created_at {
                *newest = post;
            }
        }
        // Ordered by author, like the SQL query.
        let mut posts: Vec<Post> = latest.into_values().cloned().collect();
        posts.sort_by(|a, b| a.author_id.cmp(&b.author_id));
        Ok(posts)
    }

    async fn list_posts_by_ids(&self, ids: &[Id<PostMarker>]) -> Result<Vec<Post>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_posts_by_ids += 1;
        state.check(Op::ListPostsByIds)?;

        // Deliberately not in the requested order.
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| ids.contains(&post.id))
            .cloned()
            .collect();
        posts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(posts)
    }

    async fn create_follow_edge(&self, edge: &FollowEdge) -> Result<(), FakeError> {
        let mut state = self.state.lock().unwrap();
        if !state.follows.contains(edge) {
            state.follows.push(edge.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    lists: HashMap<String, VecDeque<String>>,
    failing_keys: HashSet<String>,
    panicking_keys: HashSet<String>,
    unavailable: bool,
    gate: Option<Arc<Notify>>,
    pushes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
}

impl MemoryCache {
    /// Replaces the list at `key`, head first.
    pub fn seed(&self, key: &str, values: &[&str]) {
        self.state.lock().unwrap().lists.insert(
            key.to_owned(),
            values.iter().map(|value| (*value).to_owned()).collect(),
        );
    }

    pub fn fail_pushes_to(&self, key: &str) {
        self.state.lock().unwrap().failing_keys.insert(key.to_owned());
    }

    pub fn panic_on_push_to(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .panicking_keys
            .insert(key.to_owned());
    }

    pub fn set_unavailable(&self) {
        self.state.lock().unwrap().unavailable = true;
    }

    /// Holds every push until the returned gate is notified once per push.
    pub fn block_pushes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn entries(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn push_count(&self) -> usize {
        self.state.lock().unwrap().pushes
    }
}

impl FeedCache for MemoryCache {
    type Error = FakeError;

    async fn push_front(&self, key: &str, value: &str) -> Result<(), FakeError> {
        let (gate, panics) = {
            let state = self.state.lock().unwrap();
            (state.gate.clone(), state.panicking_keys.contains(key))
        };
        // Outside the lock, so the fake stays usable afterwards.
        assert!(!panics, "push to {key} panicked");
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.unavailable || state.failing_keys.contains(key) {
            return Err(FakeError("feed cache"));
        }
        state.pushes += 1;
        state
            .lists
            .entry(key.to_owned())
            .or_default()
            .push_front(value.to_owned());
        Ok(())
    }

    async fn range_from_head(
        &self,
        key: &str,
        count: NonZeroUsize,
    ) -> Result<Vec<String>, FakeError> {
        let state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(FakeError("feed cache"));
        }

        Ok(state
            .lists
            .get(key)
            .map(|list| list.iter().take(count.get()).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct EventLog {
    deduplicated: usize,
    cache_hits: usize,
    fallbacks: usize,
    lookup_failures: usize,
    push_failures: Vec<Id<UserMarker>>,
    finished: Vec<FanOutReport>,
    panicked: Vec<Id<PostMarker>>,
}

#[derive(Debug, Default)]
pub struct RecordingEvents {
    log: Mutex<EventLog>,
}

impl RecordingEvents {
    pub fn deduplicated(&self) -> usize {
        self.log.lock().unwrap().deduplicated
    }

    pub fn cache_hits(&self) -> usize {
        self.log.lock().unwrap().cache_hits
    }

    pub fn fallbacks(&self) -> usize {
        self.log.lock().unwrap().fallbacks
    }

    pub fn lookup_failures(&self) -> usize {
        self.log.lock().unwrap().lookup_failures
    }

    pub fn push_failures(&self) -> Vec<Id<UserMarker>> {
        self.log.lock().unwrap().push_failures.clone()
    }

    pub fn finished_reports(&self) -> Vec<FanOutReport> {
        self.log.lock().unwrap().finished.clone()
    }

    pub fn panicked_fan_outs(&self) -> Vec<Id<PostMarker>> {
        self.log.lock().unwrap().panicked.clone()
    }
}

impl TimelineEvents for RecordingEvents {
    fn publish_deduplicated(&self, _stored: &Post) {
        self.log.lock().unwrap().deduplicated += 1;
    }

    fn cache_hit(&self, _user_id: &Id<UserMarker>, _cached_ids: usize, _hydrated: usize) {
        self.log.lock().unwrap().cache_hits += 1;
    }

    fn cache_fallback(&self, _user_id: &Id<UserMarker>, _followed: usize, _posts: usize) {
        self.log.lock().unwrap().fallbacks += 1;
    }

    fn fan_out_lookup_failed(
        &self,
        _author_id: &Id<UserMarker>,
        _post_id: &Id<PostMarker>,
        _error: &dyn std::error::Error,
    ) {
        self.log.lock().unwrap().lookup_failures += 1;
    }

    fn fan_out_push_failed(
        &self,
        _post_id: &Id<PostMarker>,
        follower_id: &Id<UserMarker>,
        _error: &dyn std::error::Error,
    ) {
        self.log
            .lock()
            .unwrap()
            .push_failures
            .push(follower_id.clone());
    }

    fn fan_out_finished(&self, report: &FanOutReport) {
        self.log.lock().unwrap().finished.push(report.clone());
    }

    fn fan_out_panicked(
        &self,
        _author_id: &Id<UserMarker>,
        post_id: &Id<PostMarker>,
        _error: &dyn std::error::Error,
    ) {
        self.log.lock().unwrap().panicked.push(post_id.clone());
    }
}
