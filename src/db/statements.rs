//! Query texts for the joined feed reads. Each text is defined exactly once,
//! so diesel's per-connection statement cache (keyed by query text) reuses
//! the compiled handle on every execution. There is no shared mutable cache
//! and therefore nothing to guard.

/// One feed page: newest article ids first, joined back to their rows and
/// their authors. Binds: limit, offset (both i64).
pub const FEED_PAGE: &str = "\
SELECT a.id, a.title, a.user_id, a.content, u.id AS author_id, u.name AS author_name
  FROM (SELECT id FROM articles ORDER BY id DESC LIMIT ? OFFSET ?) AS page
  JOIN articles AS a ON a.id = page.id
  JOIN users AS u ON a.user_id = u.id
 ORDER BY a.id DESC";

/// Favorite rows for one article, joined with the favoriting user.
/// Bind: article id.
pub const ARTICLE_FAVORITERS: &str = "\
SELECT f.id, f.article_id, f.user_id, u.id AS favoriter_id, u.name AS favoriter_name
  FROM favorites AS f
  JOIN users AS u ON f.user_id = u.id
 WHERE f.article_id = ?
 ORDER BY f.id";
