//! Output formatting utilities

use colored::*;
use revert_engine::{QueueReport, RetryCounts, RevertSummary};
use std::path::Path;

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

fn queue_line(report: &QueueReport) -> String {
    format!(
        "{:<10} {} processed, {} succeeded, {} failed",
        report.name, report.processed, report.succeeded, report.failed
    )
}

/// Lines describing a finished revert run
pub fn summary_lines(summary: &RevertSummary) -> Vec<String> {
    let environments = if summary.environments.is_empty() {
        "none".to_string()
    } else {
        summary.environments.join(", ")
    };
    vec![
        format!("Run:          {}", summary.run_id),
        format!("Kind:         {}", summary.kind),
        format!("Environments: {}", environments),
        format!("Items:        {}", summary.items),
        format!(
            "Batches:      {} unpublish, {} publish",
            summary.unpublish_batches, summary.publish_batches
        ),
        queue_line(&summary.dispatch.unpublish),
        queue_line(&summary.dispatch.publish),
    ]
}

/// One line per queue with failures, naming the log they were written to
pub fn failure_lines(queues: &[(&QueueReport, &Path)]) -> Vec<String> {
    queues
        .iter()
        .filter(|(report, _)| report.failed > 0)
        .map(|(report, path)| {
            format!(
                "{} of {} {} jobs failed, see {}",
                report.failed,
                report.processed,
                report.name,
                path.display()
            )
        })
        .collect()
}

/// Print a finished revert run
///
/// `failure_logs` are the unpublish and publish failure logs, in that order.
pub fn print_summary(summary: &RevertSummary, failure_logs: [&Path; 2]) {
    println!("{}", "Revert Summary".bold());
    println!("{}", "--------------".dimmed());
    for line in summary_lines(summary) {
        println!("  {}", line);
    }

    if summary.dispatch.failed() == 0 {
        print_success("All batches completed");
        return;
    }
    let [unpublish, publish] = failure_logs;
    for line in failure_lines(&[
        (&summary.dispatch.unpublish, unpublish),
        (&summary.dispatch.publish, publish),
    ]) {
        print_warning(&line);
    }
}

/// Print what a retry enqueued
pub fn print_retry(counts: &RetryCounts) {
    if counts.raw > 0 {
        print_info(&format!("Replayed {} failed batches", counts.raw));
    }
    if counts.entries > 0 || counts.assets > 0 {
        print_info(&format!(
            "Replayed {} entries and {} assets",
            counts.entries, counts.assets
        ));
    }
    if counts.skipped > 0 {
        print_warning(&format!(
            "Skipped {} malformed failure records",
            counts.skipped
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revert_engine::{ContentKind, DispatchReport};

    #[test]
    fn test_summary_lines() {
        let summary = RevertSummary {
            run_id: Default::default(),
            kind: ContentKind::Entry,
            environments: vec!["development".into(), "prod".into()],
            items: 15,
            partitions: 2,
            unpublish_batches: 2,
            publish_batches: 1,
            dispatch: DispatchReport {
                unpublish: QueueReport {
                    name: "unpublish".into(),
                    processed: 2,
                    succeeded: 1,
                    failed: 1,
                },
                publish: QueueReport {
                    name: "publish".into(),
                    processed: 1,
                    succeeded: 1,
                    failed: 0,
                },
                paced_batches: 1,
            },
        };

        let lines = summary_lines(&summary);
        assert_eq!(lines[2], "Environments: development, prod");
        assert_eq!(lines[4], "Batches:      2 unpublish, 1 publish");
        assert!(lines[5].starts_with("unpublish"));
        assert!(lines[5].ends_with("1 failed"));
    }

    #[test]
    fn test_no_environments_left() {
        let summary = RevertSummary {
            run_id: Default::default(),
            kind: ContentKind::Asset,
            environments: vec![],
            items: 1,
            partitions: 0,
            unpublish_batches: 0,
            publish_batches: 0,
            dispatch: DispatchReport::default(),
        };
        assert_eq!(summary_lines(&summary)[2], "Environments: none");
    }

    #[test]
    fn test_failure_lines_name_the_log() {
        let failed = QueueReport {
            name: "unpublish".into(),
            processed: 3,
            succeeded: 1,
            failed: 2,
        };
        let clean = QueueReport {
            name: "publish".into(),
            processed: 1,
            succeeded: 1,
            failed: 0,
        };

        let lines = failure_lines(&[
            (&failed, Path::new("logs/revert-unpublish.error")),
            (&clean, Path::new("logs/revert-publish.error")),
        ]);
        assert_eq!(
            lines,
            vec!["2 of 3 unpublish jobs failed, see logs/revert-unpublish.error"]
        );
    }
}
