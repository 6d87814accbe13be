// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "kr.tapgol.Talk";
pub const APP_NAME: &str = "탑골톡";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";

/// Environment override for the configured Firestore project
pub const PROJECT_ID_ENV: &str = "TAPGOL_PROJECT_ID";

pub const COMMENTS_COLLECTION: &str = "comments";
pub const LIKE_COUNT_FIELD: &str = "likes";
/// Older documents keep their counter under this name instead
pub const LIKE_COUNT_ALIAS_FIELD: &str = "likeCount";
pub const LIKED_BY_FIELD: &str = "likedBy";

/// Items whose comment counts are computed right after a refresh
pub const DEFAULT_EAGER_COMMENT_PREFIX: usize = 15;
pub const DEFAULT_MUTATION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_COUNT_TIMEOUT_SECS: u64 = 10;

/// Documents requested per list page
pub const LIST_PAGE_SIZE: u32 = 300;
