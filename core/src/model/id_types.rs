use serde::Serialize;
use std::fmt::Display;

macro_rules! impl_id {
    ($ident:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash, Serialize)]
        pub struct $ident(pub i64);

        impl From<i64> for $ident {
            fn from(value: i64) -> Self {
                $ident(value)
            }
        }

        impl Display for $ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_fmt(format_args!(concat!(stringify!($ident), "({})"), self.0))
            }
        }
    };
}

impl_id!(AlbumId);
impl_id!(AlbumMembershipId);

/// Catalog key of a photo record. Unlike the integer ids above it is derived
/// from the record's identity (source, account and content digest or remote
/// photo id) and never changes after insert.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PhotoId(pub String);

impl PhotoId {
    pub fn for_archive(account_name: &str, content_hash: &str) -> PhotoId {
        PhotoId(format!("archive:{}:{}", account_name, content_hash))
    }

    pub fn for_remote(account_name: &str, remote_photo_id: &str) -> PhotoId {
        PhotoId(format!("remote:{}:{}", account_name, remote_photo_id))
    }
}

impl From<String> for PhotoId {
    fn from(value: String) -> Self {
        PhotoId(value)
    }
}

impl Display for PhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("PhotoId({})", self.0))
    }
}
