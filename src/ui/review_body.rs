//! ui::review_body
//!
//! Pure functions for building and reading review request bodies.
//!
//! # Design
//!
//! The deferred-file list lives in the review request body between
//! HTML comment markers so it can be regenerated on subsequent sync
//! cycles while preserving anything a reviewer wrote around it. The
//! markers always occupy their own line, which is also how they are
//! recognized; a marker quoted inside a fenced code block is ignored.
//!
//! # Example Output
//!
//! ```markdown
//! <!-- collab:files:start -->
//!
//! ### Files awaiting review
//!
//! - `instructions/onboarding.md`
//! - `schema/events.yaml`
//!
//! <!-- collab:files:end -->
//! ```

use crate::core::types::VaultPath;

/// Marker line starting the deferred-file list.
pub const FILES_MARKER_START: &str = "<!-- collab:files:start -->";

/// Marker line ending the deferred-file list.
pub const FILES_MARKER_END: &str = "<!-- collab:files:end -->";

/// Introduction used when the tool writes a body from scratch.
const BODY_INTRO: &str = "Sync set aside local changes to shared vault files. \
A master can apply them with `collab merge` after review.";

/// Render the marked file-list block.
///
/// Files are sorted and deduplicated so the same set always renders
/// the same bytes, which is what lets the gateway skip no-op updates.
pub fn render_file_block(files: &[VaultPath]) -> String {
    let mut sorted: Vec<&VaultPath> = files.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut lines = vec![
        FILES_MARKER_START.to_string(),
        String::new(),
        "### Files awaiting review".to_string(),
        String::new(),
    ];
    for file in sorted {
        lines.push(format!("- `{}`", file));
    }
    lines.push(String::new());
    lines.push(FILES_MARKER_END.to_string());

    lines.join("\n")
}

/// Build a review body carrying the given file list.
///
/// If `existing` already has a marked block, only that block is
/// replaced; reviewer-written text before and after it survives. With
/// no existing body (or no markers), a fresh body with an introduction
/// is produced.
pub fn render_body(existing: Option<&str>, files: &[VaultPath]) -> String {
    let block = render_file_block(files);

    let body = match existing {
        Some(b) if !b.trim().is_empty() => b,
        _ => return format!("{}\n\n{}", BODY_INTRO, block),
    };

    match marker_bounds(body) {
        Some((start_line, end_line)) => {
            let lines: Vec<&str> = body.lines().collect();
            let mut out: Vec<String> = lines[..start_line].iter().map(|s| s.to_string()).collect();
            out.push(block);
            out.extend(lines[end_line + 1..].iter().map(|s| s.to_string()));
            out.join("\n")
        }
        None => format!("{}\n\n{}", body.trim_end(), block),
    }
}

/// Extract the deferred-file list from a review body.
///
/// Returns an empty list when the body has no marked block. Lines that
/// don't look like file bullets are skipped, so reviewer edits inside
/// the block degrade gracefully.
pub fn parse_file_block(body: &str) -> Vec<VaultPath> {
    let Some((start_line, end_line)) = marker_bounds(body) else {
        return Vec::new();
    };

    let mut files = Vec::new();
    for line in body.lines().take(end_line).skip(start_line + 1) {
        let trimmed = line.trim();
        if let Some(inner) = trimmed
            .strip_prefix("- `")
            .and_then(|rest| rest.strip_suffix('`'))
        {
            if let Ok(path) = VaultPath::new(inner) {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Find the line indices of the start and end markers.
///
/// Markers must be alone on their line and outside fenced code blocks.
fn marker_bounds(body: &str) -> Option<(usize, usize)> {
    let mut in_fence = false;
    let mut start_line = None;

    for (index, line) in body.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if start_line.is_none() {
            if trimmed == FILES_MARKER_START {
                start_line = Some(index);
            }
        } else if trimmed == FILES_MARKER_END {
            return start_line.map(|start| (start, index));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<VaultPath> {
        names.iter().map(|n| VaultPath::new(*n).unwrap()).collect()
    }

    #[test]
    fn render_sorts_and_dedups() {
        let block = render_file_block(&paths(&[
            "schema/events.yaml",
            "instructions/setup.md",
            "schema/events.yaml",
        ]));

        let setup = block.find("instructions/setup.md").unwrap();
        let events = block.find("schema/events.yaml").unwrap();
        assert!(setup < events);
        assert_eq!(block.matches("schema/events.yaml").count(), 1);
    }

    #[test]
    fn render_and_parse_round_trip() {
        let files = paths(&["schema/events.yaml", "instructions/setup.md"]);
        let body = render_body(None, &files);

        let mut expected = files.clone();
        expected.sort();
        assert_eq!(parse_file_block(&body), expected);
    }

    #[test]
    fn fresh_body_has_intro() {
        let body = render_body(None, &paths(&["schema/events.yaml"]));
        assert!(body.contains("collab merge"));
        assert!(body.starts_with("Sync set aside"));
    }

    #[test]
    fn upsert_preserves_surrounding_text() {
        let files = paths(&["schema/events.yaml"]);
        let original = format!(
            "Please look at this carefully.\n\n{}\n\nThanks!",
            render_file_block(&files)
        );

        let updated = render_body(
            Some(&original),
            &paths(&["schema/events.yaml", "metrics/latency.csv"]),
        );

        assert!(updated.starts_with("Please look at this carefully."));
        assert!(updated.ends_with("Thanks!"));
        assert_eq!(
            parse_file_block(&updated),
            paths(&["metrics/latency.csv", "schema/events.yaml"])
        );
    }

    #[test]
    fn upsert_replaces_old_list() {
        let body = render_body(None, &paths(&["schema/old.yaml"]));
        let updated = render_body(Some(&body), &paths(&["schema/new.yaml"]));

        assert_eq!(parse_file_block(&updated), paths(&["schema/new.yaml"]));
        assert!(!updated.contains("old.yaml"));
    }

    #[test]
    fn body_without_markers_gets_block_appended() {
        let updated = render_body(Some("Hand-written description."), &paths(&["schema/e.yaml"]));
        assert!(updated.starts_with("Hand-written description."));
        assert_eq!(parse_file_block(&updated), paths(&["schema/e.yaml"]));
    }

    #[test]
    fn markers_inside_code_fences_are_ignored() {
        let body = format!(
            "Example of the marker:\n```\n{}\n- `fake/file.md`\n{}\n```\n\n{}",
            FILES_MARKER_START,
            FILES_MARKER_END,
            render_file_block(&paths(&["schema/real.yaml"]))
        );

        assert_eq!(parse_file_block(&body), paths(&["schema/real.yaml"]));
    }

    #[test]
    fn parse_skips_non_bullet_lines() {
        let body = format!(
            "{}\n\n### Files awaiting review\n\nreviewer note\n- `schema/events.yaml`\n- not a path\n\n{}",
            FILES_MARKER_START, FILES_MARKER_END
        );

        assert_eq!(parse_file_block(&body), paths(&["schema/events.yaml"]));
    }

    #[test]
    fn parse_empty_body_is_empty() {
        assert!(parse_file_block("").is_empty());
        assert!(parse_file_block("no markers here").is_empty());
    }

    #[test]
    fn identical_sets_render_identical_bodies() {
        let a = render_body(None, &paths(&["b/x.md", "a/y.md"]));
        let b = render_body(None, &paths(&["a/y.md", "b/x.md"]));
        assert_eq!(a, b);
    }
}
