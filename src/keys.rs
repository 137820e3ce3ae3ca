//! Every key the counter store knows about is spelled out here, and only here.
//!
//! ```text
//! video:{video_id}:views                → buffered view count, reset by each drain
//! video:view:{video_id}:{viewer_id}     → dedupe marker, expires after the dedupe window
//! videos:dirty                          → set of video ids with unflushed views
//! ```
//!
//! Ids never contain [SEPARATOR] (see [crate::model::is_valid_id]), which is what makes
//! [parse_views] unambiguous.

use crate::model::{VideoId, ViewerId};

pub const SEPARATOR: char = ':';

/// Set of video ids whose counters may hold views the sweeper has not flushed yet.
pub const DIRTY_VIDEOS: &str = "videos:dirty";

/// Glob matching every counter key, for cursor-based scans.
pub const VIEWS_PATTERN: &str = "video:*:views";

const VIDEO: &str = "video";
const VIEWS: &str = "views";
const VIEWED: &str = "view";

/// Key of the buffered view counter of `video`.
pub fn views(video: &VideoId) -> String {
    format!("{VIDEO}{SEPARATOR}{video}{SEPARATOR}{VIEWS}")
}

/// Key of the marker recording that `viewer` has been counted for `video`.
pub fn viewed(video: &VideoId, viewer: &ViewerId) -> String {
    format!("{VIDEO}{SEPARATOR}{VIEWED}{SEPARATOR}{video}{SEPARATOR}{viewer}")
}

/// Extracts the video id from a counter key.
///
/// Returns `None` for anything [views] could not have produced, including dedupe markers that
/// happen to match [VIEWS_PATTERN].
pub fn parse_views(key: &str) -> Option<VideoId> {
    let mut parts = key.split(SEPARATOR);

    let (Some(VIDEO), Some(video), Some(VIEWS), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    video.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str) -> VideoId {
        id.parse().unwrap()
    }

    fn viewer(id: &str) -> ViewerId {
        id.parse().unwrap()
    }

    #[test]
    fn key_formats() {
        assert_eq!(views(&video("v1")), "video:v1:views");
        assert_eq!(viewed(&video("v1"), &viewer("u1")), "video:view:v1:u1");
    }

    #[test]
    fn counter_keys_parse_back() {
        let key = views(&video("65f1c2a9e4b0"));
        assert_eq!(parse_views(&key), Some(video("65f1c2a9e4b0")));
    }

    #[test]
    fn marker_matching_the_counter_glob_is_not_a_counter() {
        // `video:view:abc:views` matches `video:*:views`
        let key = viewed(&video("abc"), &viewer("views"));
        assert_eq!(parse_views(&key), None);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for key in ["", "video", "video::views", "video:v1", "video:v1:likes", "clip:v1:views", DIRTY_VIDEOS] {
            assert_eq!(parse_views(key), None, "`{key}` should not parse");
        }
    }
}
