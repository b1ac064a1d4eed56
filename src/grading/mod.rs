use regex::Regex;

use crate::models::CannedResponse;

/// Feedback text recorded for a correct submission.
pub const CORRECT_RESPONSE: &str = "Correct!";

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub is_correct: bool,
    /// Empty when no automatic feedback applies; staff fill those in later.
    pub response_text: String,
}

/// Answers match ASCII-case-insensitively, whitespace-trimmed.
pub fn is_correct(submission: &str, answer: &str) -> bool {
    submission.trim().eq_ignore_ascii_case(answer.trim())
}

/// Grade a submission against the stored answer and the puzzle's canned
/// responses. Correct submissions always answer "Correct!"; otherwise the
/// first canned regex matching the submission supplies the feedback.
pub fn grade(submission: &str, answer: &str, canned: &[CannedResponse]) -> Grade {
    if is_correct(submission, answer) {
        return Grade {
            is_correct: true,
            response_text: CORRECT_RESPONSE.to_string(),
        };
    }

    let normalized = submission.trim().to_lowercase();
    for response in canned {
        // A bad pattern entered by staff skips that row rather than
        // poisoning grading for the whole puzzle.
        match Regex::new(&response.regex) {
            Ok(re) => {
                if re.is_match(&normalized) {
                    return Grade {
                        is_correct: false,
                        response_text: response.text.clone(),
                    };
                }
            }
            Err(e) => {
                tracing::warn!(
                    "skipping invalid canned response pattern {:?}: {}",
                    response.regex,
                    e
                );
            }
        }
    }

    Grade {
        is_correct: false,
        response_text: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canned(regex: &str, text: &str) -> CannedResponse {
        CannedResponse {
            response_id: 0,
            puzzle_id: 1,
            regex: regex.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_answers_match_case_insensitively() {
        assert!(is_correct("solder", "SOLDER"));
        assert!(is_correct("Solder", "solder"));
        assert!(!is_correct("soldier", "solder"));
    }

    #[test]
    fn test_answers_are_trimmed() {
        assert!(is_correct("  solder ", "SOLDER"));
    }

    #[test]
    fn test_correct_submission_gets_fixed_response() {
        let grade = grade("SOLDER", "solder", &[canned("sold", "So close")]);
        assert!(grade.is_correct);
        assert_eq!(grade.response_text, CORRECT_RESPONSE);
    }

    #[test]
    fn test_first_matching_canned_response_wins() {
        let responses = vec![
            canned("^keep", "Keep going"),
            canned("keep", "Second rule never fires"),
        ];

        let grade = grade("keep trying", "answer", &responses);
        assert!(!grade.is_correct);
        assert_eq!(grade.response_text, "Keep going");
    }

    #[test]
    fn test_canned_match_is_against_lowercased_submission() {
        let responses = vec![canned("^partial$", "You are halfway there")];

        let grade = grade("  PARTIAL ", "answer", &responses);
        assert_eq!(grade.response_text, "You are halfway there");
    }

    #[test]
    fn test_no_match_leaves_response_empty_for_staff() {
        let responses = vec![canned("^nope$", "Not this")];

        let grade = grade("something else", "answer", &responses);
        assert!(!grade.is_correct);
        assert!(grade.response_text.is_empty());
    }

    #[test]
    fn test_invalid_regex_is_skipped() {
        let responses = vec![
            canned("(unclosed", "never"),
            canned("else", "Matched anyway"),
        ];

        let grade = grade("something else", "answer", &responses);
        assert_eq!(grade.response_text, "Matched anyway");
    }
}
