pub use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level body of a VK API method call. Exactly one of the two fields is
/// present; `error` can arrive with an HTTP 200.
#[derive(Serialize, Deserialize)]
pub struct Envelope {
    pub response: Option<PhotoPage>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error_code", default)]
    pub code: i64,
    #[serde(rename = "error_msg")]
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct PhotoPage {
    #[serde(default)]
    pub count: i64,
    pub items: Vec<Photo>,
}

#[derive(Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    #[serde(default)]
    pub date: i64,
    pub likes: Likes,
    pub sizes: Vec<SizeVariant>,
}

#[derive(Serialize, Deserialize)]
pub struct Likes {
    pub count: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SizeVariant {
    #[serde(rename = "type")]
    pub tag: String,
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl SizeVariant {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A profile photo as the backup sees it: its like count and its renditions,
/// smallest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub id: i64,
    pub like_count: i64,
    pub taken_at: Option<DateTime<Utc>>,
    pub size_variants: Vec<SizeVariant>,
}

impl PhotoRecord {
    pub fn largest_variant(&self) -> Option<&SizeVariant> {
        self.size_variants.last()
    }
}

impl From<Photo> for PhotoRecord {
    fn from(photo: Photo) -> Self {
        let mut size_variants = photo.sizes;
        // stable: keeps API order when dimensions are missing
        size_variants.sort_by_key(SizeVariant::area);

        PhotoRecord {
            id: photo.id,
            like_count: photo.likes.count,
            taken_at: match photo.date {
                0 => None,
                date => DateTime::from_timestamp(date, 0),
            },
            size_variants,
        }
    }
}

/// One uploaded photo. Shared by the ledger file and the per-photo sidecar.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub file_name: String,
    #[serde(rename = "size")]
    pub size_tag: String,
}
