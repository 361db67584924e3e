use std::ops::Range;

use tracing::warn;

use super::super::domain::{Item, Match};
use super::super::matcher::{self, PatternError};
use super::super::ruleset::Ruleset;
use super::SuppressionScope;

/// Scans the blacklist in ruleset order and keeps the highest-scoring hit.
///
/// A later entry only replaces the current best when its points are strictly
/// greater, so equal scores resolve to the earliest entry.
pub(crate) fn best_match(item: &Item, ruleset: &Ruleset, scope: SuppressionScope) -> Option<Match> {
    let lname = item.name.to_ascii_lowercase();
    let mut allowed_spans: Option<Vec<Range<usize>>> = None;
    let mut best: Option<Match> = None;

    for entry in &ruleset.blacklist {
        let lpattern = entry.text.to_ascii_lowercase();
        let span = match matcher::find(&lname, &lpattern) {
            Ok(Some(span)) => span,
            Ok(None) => continue,
            Err(error) => {
                report_malformed("blacklist", &entry.text, &error);
                continue;
            }
        };

        let allowed =
            allowed_spans.get_or_insert_with(|| whitelist_spans(&lname, &ruleset.whitelist));
        let suppressed = match scope {
            SuppressionScope::Name => !allowed.is_empty(),
            SuppressionScope::Span => allowed.iter().any(|allow| overlaps(allow, &span)),
        };
        if suppressed {
            continue;
        }

        if best
            .as_ref()
            .is_some_and(|current| entry.points <= current.score)
        {
            continue;
        }

        let matched_text = item
            .name
            .get(span)
            .map(str::to_string)
            .unwrap_or(lpattern);

        best = Some(Match {
            item: item.clone(),
            pattern: entry.text.clone(),
            matched_text,
            score: entry.points,
        });
    }

    best
}

/// First-occurrence spans of every whitelist entry found in the name.
fn whitelist_spans(lname: &str, whitelist: &[String]) -> Vec<Range<usize>> {
    whitelist
        .iter()
        .filter_map(
            |allowed| match matcher::find(lname, &allowed.to_ascii_lowercase()) {
                Ok(span) => span,
                Err(error) => {
                    report_malformed("whitelist", allowed, &error);
                    None
                }
            },
        )
        .collect()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn report_malformed(list: &'static str, pattern: &str, error: &PatternError) {
    warn!(list, pattern, %error, "skipping malformed ruleset pattern");
}
