use chrono::{DateTime, Utc};

use super::{AlbumId, AlbumMembershipId, PhotoId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Album {
    pub id: AlbumId,
    pub account_name: String,
    /// Unique per account
    pub name: String,
    pub remote_album_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Confirmed reconciliation of one photo into one album. This mirrors remote
/// truth as last observed, never a desired or pending state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumMembership {
    pub id: AlbumMembershipId,
    pub album_id: AlbumId,
    pub photo_id: PhotoId,
    pub added_at: DateTime<Utc>,
}
