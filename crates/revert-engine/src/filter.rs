//! Narrow publish details to the environments (and locale) being reverted

use crate::formatter::{FormattedLog, LogItems};
use crate::model::PublishDetail;

/// Keep only details whose environment uid is in `environment_uids` and, when
/// `locale` is given, whose locale equals it
pub fn filter_publish_details(
    details: &[PublishDetail],
    environment_uids: &[&str],
    locale: Option<&str>,
) -> Vec<PublishDetail> {
    details
        .iter()
        .filter(|detail| environment_uids.contains(&detail.environment.as_str()))
        .filter(|detail| match locale {
            Some(locale) => detail.locale.as_deref() == Some(locale),
            None => true,
        })
        .cloned()
        .collect()
}

/// Filter every item of a formatted log in place
///
/// Entries are filtered per locale group, assets by environment only.
pub fn apply(log: &mut FormattedLog) {
    let uids: Vec<String> = log.environments.iter().map(|env| env.uid.clone()).collect();
    let uids: Vec<&str> = uids.iter().map(String::as_str).collect();

    match &mut log.items {
        LogItems::Entries(groups) => {
            for group in groups.iter_mut() {
                for item in group.items.iter_mut() {
                    item.publish_details =
                        filter_publish_details(&item.publish_details, &uids, Some(&group.locale));
                }
            }
        }
        LogItems::Assets(items) => {
            for item in items.iter_mut() {
                item.publish_details = filter_publish_details(&item.publish_details, &uids, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(env: &str, locale: Option<&str>, version: u64) -> PublishDetail {
        PublishDetail {
            environment: env.into(),
            locale: locale.map(str::to_owned),
            version,
        }
    }

    #[test]
    fn keeps_resolved_environments_only() {
        let details = vec![detail("u-prod", None, 3), detail("u-gone", None, 2)];
        let filtered = filter_publish_details(&details, &["u-prod"], None);
        assert_eq!(filtered, vec![detail("u-prod", None, 3)]);
    }

    #[test]
    fn locale_must_match_when_given() {
        let details = vec![
            detail("u-prod", Some("en-us"), 3),
            detail("u-prod", Some("fr-fr"), 5),
            detail("u-prod", None, 1),
        ];
        let filtered = filter_publish_details(&details, &["u-prod"], Some("fr-fr"));
        assert_eq!(filtered, vec![detail("u-prod", Some("fr-fr"), 5)]);
    }

    #[test]
    fn empty_details_stay_empty() {
        assert!(filter_publish_details(&[], &["u-prod"], Some("en-us")).is_empty());
    }
}
