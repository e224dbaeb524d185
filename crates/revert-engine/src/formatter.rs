//! Log classification and grouping
//!
//! A publish log is turned into a single typed aggregate: entries grouped by
//! locale, or one flat list of assets. The kind is decided once, from the
//! first record, and carried explicitly from then on.

use crate::environment::{resolve_environments, EnvironmentDirectory};
use crate::error::{Result, RevertError};
use crate::filter;
use crate::log::{LogOptions, RawLogRecord};
use crate::model::{ContentItem, ContentKind, ResolvedEnvironment};
use tracing::{debug, warn};

/// Entries that share a locale, in first-seen order
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleGroup {
    pub locale: String,
    pub items: Vec<ContentItem>,
}

/// Items of a log, shaped by its kind
#[derive(Debug, Clone, PartialEq)]
pub enum LogItems {
    /// Locale groups in first-seen locale order
    Entries(Vec<LocaleGroup>),
    /// Assets in log order
    Assets(Vec<ContentItem>),
}

impl LogItems {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Entries(_) => ContentKind::Entry,
            Self::Assets(_) => ContentKind::Asset,
        }
    }

    /// Total number of items across all groups
    pub fn item_count(&self) -> usize {
        match self {
            Self::Entries(groups) => groups.iter().map(|g| g.items.len()).sum(),
            Self::Assets(items) => items.len(),
        }
    }
}

/// Log records grouped by kind, before environments are resolved
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedLog {
    pub api_key: Option<String>,
    /// Environment names declared by the first record that has any
    pub environment_names: Vec<String>,
    pub items: LogItems,
}

/// The aggregate the reconciler works on
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedLog {
    pub api_key: Option<String>,
    /// Environments still present in the directory, in directory order
    pub environments: Vec<ResolvedEnvironment>,
    pub items: LogItems,
}

impl FormattedLog {
    pub fn kind(&self) -> ContentKind {
        self.items.kind()
    }

    /// Locales in first-seen order; empty for assets
    pub fn locales(&self) -> Vec<&str> {
        match &self.items {
            LogItems::Entries(groups) => groups.iter().map(|g| g.locale.as_str()).collect(),
            LogItems::Assets(_) => Vec::new(),
        }
    }
}

/// Decide the kind of a log from its first record
///
/// An explicit `Type` tag wins, then an `entryUid` means entries. Anything
/// else is treated as assets.
pub fn classify(first: &LogOptions) -> Result<ContentKind> {
    if let Some(tag) = &first.kind_tag {
        return ContentKind::from_tag(tag).ok_or_else(|| RevertError::UnknownKind(tag.clone()));
    }
    if first.entry_uid.is_some() {
        return Ok(ContentKind::Entry);
    }
    if first.asset_uid.is_none() && first.assets.is_none() {
        // A bulk entry record without a tag lands here too.
        warn!("First log record has no kind tag, entryUid or asset fields; treating log as assets");
    }
    Ok(ContentKind::Asset)
}

/// Group raw records into entries-by-locale or a flat asset list
pub fn group_records(records: &[RawLogRecord]) -> Result<GroupedLog> {
    let first = records.first().ok_or_else(|| RevertError::MalformedRecord {
        index: 0,
        reason: "log has no records".into(),
    })?;
    let kind = classify(&first.options(0)?)?;

    let mut api_key = None;
    let mut environment_names: Option<Vec<String>> = None;
    let mut groups: Vec<LocaleGroup> = Vec::new();
    let mut assets: Vec<ContentItem> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let options = record.options(index)?;

        if environment_names.is_none() {
            environment_names = options.environments.clone();
        }
        if api_key.is_none() {
            api_key = record.message.api_key.clone();
        }

        match kind {
            ContentKind::Entry => push_entry(&mut groups, index, options)?,
            ContentKind::Asset => push_asset(&mut assets, index, options)?,
        }
    }

    let items = match kind {
        ContentKind::Entry => LogItems::Entries(groups),
        ContentKind::Asset => LogItems::Assets(assets),
    };

    debug!(
        kind = %kind,
        records = records.len(),
        items = items.item_count(),
        "Log records grouped"
    );

    Ok(GroupedLog {
        api_key,
        environment_names: environment_names.unwrap_or_default(),
        items,
    })
}

fn push_entry(groups: &mut Vec<LocaleGroup>, index: usize, options: LogOptions) -> Result<()> {
    let locale = options.locale.ok_or_else(|| RevertError::MalformedRecord {
        index,
        reason: "entry record has no locale".into(),
    })?;

    let pos = match groups.iter().position(|g| g.locale == locale) {
        Some(pos) => pos,
        None => {
            groups.push(LocaleGroup {
                locale: locale.clone(),
                items: Vec::new(),
            });
            groups.len() - 1
        }
    };
    let group = &mut groups[pos];

    if let Some(entries) = options.entries {
        group.items.extend(entries);
        return Ok(());
    }

    let uid = options.entry_uid.ok_or_else(|| RevertError::MalformedRecord {
        index,
        reason: "entry record has neither entryUid nor entries".into(),
    })?;
    group.items.push(ContentItem {
        uid,
        content_type: options.content_type,
        locale: Some(locale),
        publish_details: options.publish_details.unwrap_or_default(),
    });
    Ok(())
}

fn push_asset(assets: &mut Vec<ContentItem>, index: usize, options: LogOptions) -> Result<()> {
    if let Some(bulk) = options.assets {
        assets.extend(bulk);
        return Ok(());
    }

    let Some(uid) = options.asset_uid else {
        let reason = if options.entries.is_some() || options.entry_uid.is_some() {
            "asset record has neither assetUid nor assets but carries entries; \
             the log may be an untagged bulk entry log, add \"Type\": \"entry\" to its first record"
        } else {
            "asset record has neither assetUid nor assets"
        };
        return Err(RevertError::MalformedRecord {
            index,
            reason: reason.into(),
        });
    };
    assets.push(ContentItem {
        uid,
        content_type: None,
        locale: None,
        publish_details: options.publish_details.unwrap_or_default(),
    });
    Ok(())
}

/// Classify, group, resolve environments and filter publish details
///
/// Performs exactly one directory lookup.
pub async fn format_log(
    records: &[RawLogRecord],
    directory: &dyn EnvironmentDirectory,
) -> Result<FormattedLog> {
    let grouped = group_records(records)?;
    let environments = resolve_environments(directory, &grouped.environment_names).await?;

    let mut log = FormattedLog {
        api_key: grouped.api_key,
        environments,
        items: grouped.items,
    };
    filter::apply(&mut log);
    Ok(log)
}
