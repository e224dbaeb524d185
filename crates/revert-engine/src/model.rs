//! Data model shared by the formatter, reconciler and queues
//!
//! Records read from a log are immutable input. Everything downstream
//! (work items, batches) is a fresh projection created per run and dropped
//! once dispatched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of work items in one batch
pub const BATCH_CAPACITY: usize = 10;

/// Kind of content a log describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Localized entries of a content type
    Entry,
    /// Assets, which are not partitioned by locale
    Asset,
}

impl ContentKind {
    /// Parse a log kind tag (`entry` / `asset`, case-insensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "entry" => Some(Self::Entry),
            "asset" => Some(Self::Asset),
            _ => None,
        }
    }

    /// Tag as written to logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Asset => "asset",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (environment, version[, locale]) at which an item was published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDetail {
    /// Environment uid
    pub environment: String,
    /// Locale code, present for entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Published version
    pub version: u64,
}

/// An entry or asset as recorded in a publish log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Item uid
    pub uid: String,
    /// Content type uid (entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Locale code (entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Where the item was published when the log was written
    #[serde(default)]
    pub publish_details: Vec<PublishDetail>,
}

impl ContentItem {
    /// Publish details that target the given environment uid
    pub fn details_in<'a>(
        &'a self,
        environment_uid: &'a str,
    ) -> impl Iterator<Item = &'a PublishDetail> + 'a {
        self.publish_details
            .iter()
            .filter(move |detail| detail.environment == environment_uid)
    }
}

/// An environment that still exists in the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedEnvironment {
    /// Environment name, as used in publish requests
    pub name: String,
    /// Environment uid, as used in publish details
    pub uid: String,
}

/// Direction of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Re-publish at a recorded version
    Publish,
    /// Remove from the environment
    Unpublish,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish => f.write_str("publish"),
            Self::Unpublish => f.write_str("unpublish"),
        }
    }
}

/// Common surface of the two work item shapes
pub trait WorkItem {
    /// Direction every batch of this item type has
    const KIND: BatchKind;

    /// Uid of the item this work targets
    fn uid(&self) -> &str;
}

/// Re-publish an item at a recorded version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishWorkItem {
    pub uid: String,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// The single detail this work item was derived from
    pub publish_detail: PublishDetail,
}

impl PublishWorkItem {
    /// Build a work item from a matching publish detail
    pub fn from_detail(item: &ContentItem, detail: &PublishDetail, locale: Option<&str>) -> Self {
        Self {
            uid: item.uid.clone(),
            version: detail.version,
            locale: item.locale.clone().or_else(|| locale.map(str::to_owned)),
            content_type: item.content_type.clone(),
            publish_detail: detail.clone(),
        }
    }
}

impl WorkItem for PublishWorkItem {
    const KIND: BatchKind = BatchKind::Publish;

    fn uid(&self) -> &str {
        &self.uid
    }
}

/// Remove an item from an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishWorkItem {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl UnpublishWorkItem {
    pub fn for_item(item: &ContentItem, locale: Option<&str>) -> Self {
        Self {
            uid: item.uid.clone(),
            locale: item.locale.clone().or_else(|| locale.map(str::to_owned)),
            content_type: item.content_type.clone(),
        }
    }
}

impl WorkItem for UnpublishWorkItem {
    const KIND: BatchKind = BatchKind::Unpublish;

    fn uid(&self) -> &str {
        &self.uid
    }
}

/// A homogeneous group of at most [`BATCH_CAPACITY`] work items
///
/// All items share the batch's environment, locale and direction; the
/// direction is fixed by the item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch<T> {
    /// Entry or asset batch
    #[serde(rename = "Type")]
    pub content_kind: ContentKind,
    /// Environment name the batch targets
    pub environment: String,
    /// Locale partition (entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub items: Vec<T>,
}

impl<T: WorkItem> Batch<T> {
    /// Direction of this batch
    pub fn kind(&self) -> BatchKind {
        T::KIND
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Batch of versioned re-publishes
pub type PublishBatch = Batch<PublishWorkItem>;

/// Batch of unpublishes
pub type UnpublishBatch = Batch<UnpublishWorkItem>;

#[cfg(test)]
mod tests {
    use super::*;

    fn item(uid: &str, details: Vec<PublishDetail>) -> ContentItem {
        ContentItem {
            uid: uid.into(),
            content_type: Some("blog".into()),
            locale: None,
            publish_details: details,
        }
    }

    #[test]
    fn kind_tag_parsing() {
        assert_eq!(ContentKind::from_tag("entry"), Some(ContentKind::Entry));
        assert_eq!(ContentKind::from_tag(" Asset "), Some(ContentKind::Asset));
        assert_eq!(ContentKind::from_tag("bulk"), None);
    }

    #[test]
    fn details_in_matches_environment_uid() {
        let detail = PublishDetail {
            environment: "env-prod".into(),
            locale: None,
            version: 4,
        };
        let other = PublishDetail {
            environment: "env-dev".into(),
            locale: None,
            version: 2,
        };
        let item = item("blt1", vec![detail.clone(), other]);

        let found: Vec<_> = item.details_in("env-prod").collect();
        assert_eq!(found, vec![&detail]);
    }

    #[test]
    fn work_item_prefers_item_locale() {
        let mut entry = item("blt1", vec![]);
        entry.locale = Some("fr-fr".into());
        let work = UnpublishWorkItem::for_item(&entry, Some("en-us"));
        assert_eq!(work.locale.as_deref(), Some("fr-fr"));

        entry.locale = None;
        let work = UnpublishWorkItem::for_item(&entry, Some("en-us"));
        assert_eq!(work.locale.as_deref(), Some("en-us"));
    }

    #[test]
    fn batch_kind_follows_item_type() {
        let batch: UnpublishBatch = Batch {
            content_kind: ContentKind::Asset,
            environment: "prod".into(),
            locale: None,
            items: vec![],
        };
        assert_eq!(batch.kind(), BatchKind::Unpublish);
        assert!(batch.is_empty());
    }

    #[test]
    fn batch_serializes_kind_tag() {
        let batch: PublishBatch = Batch {
            content_kind: ContentKind::Entry,
            environment: "prod".into(),
            locale: Some("en-us".into()),
            items: vec![],
        };
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["Type"], "entry");
        assert_eq!(value["locale"], "en-us");
    }
}
