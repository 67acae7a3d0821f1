// Expression matching over raw skin XML text
//
// Matching is line-oriented and textual: `$KEYWORD[payload]` where the
// payload runs to the nearest closing bracket. Nested brackets inside a
// payload are not supported; `$VAR[$INFO[X]]` yields the VAR payload
// `$INFO[X`. That least-greedy close is a documented limitation of the
// matcher, and also exactly what makes wrapped expressions detectable by
// position: a match that starts inside a `$VAR[...]` payload is "cached".
use crate::models::{ExpressionCategory, NUM_CATEGORIES};
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

lazy_static! {
    static ref PATTERNS: [Regex; NUM_CATEGORIES] = {
        ExpressionCategory::ALL.map(|category| {
            let pattern = format!(r"\${}\[([^\]]*)\]", category.keyword());
            Regex::new(&pattern).expect("category pattern is valid")
        })
    };
}

/// Compiled pattern for one category.
pub fn pattern(category: ExpressionCategory) -> &'static Regex {
    &PATTERNS[category.index()]
}

/// One matched expression on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub payload: String,
    /// Byte offset of the `$` within the line.
    pub start: usize,
    /// True when the match starts inside a `$VAR[...]` payload on the
    /// same line. Textual containment, not semantic equivalence, so
    /// overlapping substrings can misclassify; accepted imprecision.
    pub cached: bool,
}

/// Payload spans of every Variable match on the line.
fn variable_payload_spans(line: &str) -> Vec<Range<usize>> {
    pattern(ExpressionCategory::Variable)
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).map(|m| m.range()))
        .collect()
}

/// All occurrences of `category` on a single line, classified as cached or
/// not. Order follows position in the line.
pub fn match_line(line: &str, category: ExpressionCategory) -> Vec<Occurrence> {
    let wrap_spans = variable_payload_spans(line);

    pattern(category)
        .captures_iter(line)
        .map(|caps| {
            let whole = caps.get(0).expect("match has full capture");
            let payload = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let start = whole.start();
            let cached = wrap_spans.iter().any(|span| span.contains(&start));
            Occurrence {
                payload: payload.to_string(),
                start,
                cached,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_info_lookup_is_not_cached() {
        let hits = match_line(
            "<label>$INFO[Player.Title]</label>",
            ExpressionCategory::InfoLookup,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "Player.Title");
        assert!(!hits[0].cached);
    }

    #[test]
    fn test_info_wrapped_in_var_is_cached() {
        let hits = match_line(
            "<label>$VAR[Cache_Player_Title,$INFO[Player.Title]]</label>",
            ExpressionCategory::InfoLookup,
        );
        assert_eq!(hits.len(), 1);
        assert!(hits[0].cached);
    }

    #[test]
    fn test_var_payload_stops_at_first_closing_bracket() {
        // Least-greedy close: the payload never spans a `]`
        let spans = variable_payload_spans("$VAR[$INFO[X]]");
        assert_eq!(spans.len(), 1);
        let line = "$VAR[$INFO[X]]";
        assert_eq!(&line[spans[0].clone()], "$INFO[X");
    }

    #[test]
    fn test_multiple_occurrences_counted_independently() {
        let line = "$INFO[A] $VAR[W,$INFO[B]] $INFO[C]";
        let hits = match_line(line, ExpressionCategory::InfoLookup);
        assert_eq!(hits.len(), 3);
        assert!(!hits[0].cached);
        assert!(hits[1].cached);
        assert!(!hits[2].cached);
        assert_eq!(hits[0].start, 0);
        assert!(hits[1].start < hits[2].start);
    }

    #[test]
    fn test_categories_do_not_cross_match() {
        let line = "$LOCALIZE[31000] $INFO[Player.Title]";
        assert_eq!(match_line(line, ExpressionCategory::Localization).len(), 1);
        assert_eq!(match_line(line, ExpressionCategory::InfoLookup).len(), 1);
        assert!(match_line(line, ExpressionCategory::Variable).is_empty());
    }

    #[test]
    fn test_empty_payload_matches() {
        let hits = match_line("$INFO[]", ExpressionCategory::InfoLookup);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "");
    }

    #[test]
    fn test_unclosed_bracket_does_not_match() {
        assert!(match_line("$INFO[Player.Title", ExpressionCategory::InfoLookup).is_empty());
    }

    #[test]
    fn test_nested_var_is_swallowed_by_outer_match() {
        // Matches never overlap: the inner $VAR sits inside the outer
        // match and is not counted separately
        let hits = match_line("$VAR[A,$VAR[B]]", ExpressionCategory::Variable);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "A,$VAR[B");
        assert!(!hits[0].cached);
    }

    #[test]
    fn test_sibling_vars_count_separately() {
        let hits = match_line("$VAR[A] $VAR[B]", ExpressionCategory::Variable);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| !h.cached));
    }
}
