//! Cache entry and artifact types.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// An opaque, pre-loaded view payload associated with a route.
///
/// Artifacts are immutable once built. Cloning one is cheap (the body is a
/// reference-counted [`Bytes`]), so [`RouteCache::read`](super::RouteCache::read)
/// hands out clones instead of references into the store.
///
/// # Examples
///
/// ```
/// use navcache::Artifact;
///
/// let artifact = Artifact::new("<main>KYC</main>");
/// assert_eq!(artifact.body().as_ref(), b"<main>KYC</main>");
/// assert_eq!(artifact.len(), 16);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Artifact {
    body: Bytes,
}

impl Artifact {
    /// Creates an artifact from anything convertible into [`Bytes`].
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Creates an artifact from a `'static` byte slice without copying.
    pub const fn from_static(body: &'static [u8]) -> Self {
        Self {
            body: Bytes::from_static(body),
        }
    }

    /// Returns the raw payload.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Returns `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Consumes the artifact and returns its payload.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("len", &self.body.len())
            .finish()
    }
}

impl From<Bytes> for Artifact {
    fn from(body: Bytes) -> Self {
        Self { body }
    }
}

impl From<&'static str> for Artifact {
    fn from(body: &'static str) -> Self {
        Self::new(body)
    }
}

impl From<String> for Artifact {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

impl From<Vec<u8>> for Artifact {
    fn from(body: Vec<u8>) -> Self {
        Self::new(body)
    }
}

/// How an entry got into the cache. Bookkeeping only; it never changes
/// lookup or expiry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Stored explicitly through [`RouteCache::store`](super::RouteCache::store).
    Cached,
    /// Populated speculatively by a preload.
    Preloaded,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Cached => f.write_str("cached"),
            Origin::Preloaded => f.write_str("preloaded"),
        }
    }
}

/// A single stored route view.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    artifact: Artifact,
    created_at: Instant,
    origin: Origin,
}

impl CacheEntry {
    pub(crate) fn new(artifact: Artifact, origin: Origin, created_at: Instant) -> Self {
        Self {
            artifact,
            created_at,
            origin,
        }
    }

    /// The stored view.
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// When the entry was inserted. Overwrites reset it.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether the entry came from an explicit store or a preload.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Age of the entry at `now`. Saturates to zero if `now` precedes insertion.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// An entry is expired once it is strictly older than `ttl`.
    pub fn is_expired_at(&self, now: Instant, ttl: Duration) -> bool {
        self.age_at(now) > ttl
    }
}
