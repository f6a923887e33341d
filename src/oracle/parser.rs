//! Parsing for the two ad-hoc string formats the external belief-exploration
//! oracle hands back (§6 "Label conventions", §9 "Cutoff scheduler walk"):
//! a cut-off scheduler's choice rendering `"{p:a, p:a, ...}"`, and a cut-off
//! state's `sched_<k>` choice label referencing `cutoff_schedulers[k]`.
//!
//! Grounded in `storm_pomdp_control.py::parse_choice_string` and the
//! `'sched_' in label` / `label.split('_')` handling inline in
//! `parse_storm_result`. Kept as its own small component with its own unit
//! tests, per the Design Note ("do not scatter parsing through the core").

use thiserror::Error;

use crate::family::OptionId;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed choice string {0:?}: expected \"prob:action\" entries")]
    MalformedChoice(String),
    #[error("could not parse action id in choice entry {0:?}")]
    InvalidAction(String),
    #[error("could not parse scheduler index in label {0:?}")]
    InvalidSchedulerIndex(String),
}

/// Parses a cut-off scheduler's choice rendering, e.g. `"{0.5:1, 0.5:2}"`,
/// into the list of action ids it assigns nonzero probability to. Brace and
/// bracket characters are stripped first since different renderings use
/// either; probabilities themselves are discarded (§9: "bound to restrict
/// some action if needed" is left for a future conflict generator).
pub fn parse_choice_string(choice_string: &str) -> Result<Vec<OptionId>, ParseError> {
    let cleaned: String = choice_string
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '[' | ']'))
        .collect();
    let trimmed = cleaned.trim().trim_matches(',').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|entry| {
            let (_, action) = entry
                .split_once(':')
                .ok_or_else(|| ParseError::MalformedChoice(choice_string.to_string()))?;
            action
                .trim()
                .parse::<OptionId>()
                .map_err(|_| ParseError::InvalidAction(entry.to_string()))
        })
        .collect()
}

/// If `label` names a cut-off scheduler (starts with `sched_<k>`, per §6),
/// returns its index into `cutoff_schedulers`; otherwise `None`. `"cutoff"`
/// and `"clipping"` (the other two conventional cut-off markers) never
/// match this prefix and correctly return `None`.
pub fn cutoff_scheduler_index(label: &str) -> Result<Option<usize>, ParseError> {
    match label.strip_prefix("sched_") {
        None => Ok(None),
        Some(rest) => rest
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ParseError::InvalidSchedulerIndex(label.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_choice_string_with_multiple_entries() {
        let actions = parse_choice_string("{0.5:1, 0.5:2}").unwrap();
        assert_eq!(actions, vec![1, 2]);
    }

    #[test]
    fn parses_choice_string_with_brackets_instead_of_braces() {
        let actions = parse_choice_string("[1.0:0]").unwrap();
        assert_eq!(actions, vec![0]);
    }

    #[test]
    fn parses_empty_choice_string() {
        assert_eq!(parse_choice_string("{}").unwrap(), Vec::<OptionId>::new());
    }

    #[test]
    fn rejects_choice_entry_without_colon() {
        assert!(parse_choice_string("{garbage}").is_err());
    }

    #[test]
    fn recognizes_scheduler_label() {
        assert_eq!(cutoff_scheduler_index("sched_3").unwrap(), Some(3));
    }

    #[test]
    fn cutoff_and_clipping_labels_are_not_scheduler_labels() {
        assert_eq!(cutoff_scheduler_index("cutoff").unwrap(), None);
        assert_eq!(cutoff_scheduler_index("clipping").unwrap(), None);
    }

    #[test]
    fn rejects_non_numeric_scheduler_index() {
        assert!(cutoff_scheduler_index("sched_x").is_err());
    }
}
