//! Time-bounded cache of completed GET responses.
//!
//! Entries are keyed by request path and expire a fixed window after they
//! were stored. Expiry is enforced lazily on lookup; to keep memory bounded
//! the cache also caps its entry count and can run a periodic sweep (see
//! [`ResponseCache::spawn_sweeper`]).

use http::{Method, Request};

mod response_cache;
mod sweeper;

pub use response_cache::CacheEntry;
pub use response_cache::ResponseCache;
pub use sweeper::CacheSweeper;

/// Cache key for `req`, `None` when the request is not eligible for caching.
///
/// Only GET requests are cached, keyed by path; the query string is not part of the key.
pub fn cache_key<B>(req: &Request<B>) -> Option<String> {
    (req.method() == Method::GET).then(|| req.uri().path().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_get_is_eligible() {
        let get = Request::get("/x?page=2").body(()).unwrap();
        let post = Request::post("/x").body(()).unwrap();
        let head = Request::head("/x").body(()).unwrap();

        assert_eq!(cache_key(&get).as_deref(), Some("/x"));
        assert_eq!(cache_key(&post), None);
        assert_eq!(cache_key(&head), None);
    }
}
