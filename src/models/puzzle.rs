use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Puzzle {
    pub puzzle_id: i32,
    pub hunt_id: i32,
    pub puzzle_number: i32,
    pub puzzle_name: String,
    /// Short hex identifier used in URLs (e.g. "1a2b3c4d")
    pub puzzle_key: String,
    pub answer: String,
    pub link: String,
    /// Solved-prerequisite count needed before this puzzle unlocks
    pub num_required_to_unlock: i32,
    pub num_pages: i32,
}

/// Compact puzzle shape embedded in poll payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PuzzleInfo {
    pub id: String,
    pub number: i32,
    pub name: String,
}

impl Puzzle {
    pub fn info(&self) -> PuzzleInfo {
        PuzzleInfo {
            id: self.puzzle_key.clone(),
            number: self.puzzle_number,
            name: self.puzzle_name.clone(),
        }
    }
}

/// Per-puzzle regex -> canned text pairs for automatic grading feedback.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CannedResponse {
    pub response_id: i32,
    pub puzzle_id: i32,
    pub regex: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Img,
    Pdf,
    Txt,
    Web,
}

/// A reward revealed to a team when the owning puzzle is solved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unlockable {
    pub unlockable_id: i32,
    pub puzzle_id: i32,
    pub content_type: ContentType,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_puzzle_info_shape() {
        let puzzle = Puzzle {
            puzzle_id: 3,
            hunt_id: 1,
            puzzle_number: 4,
            puzzle_name: "Crossed Wires".to_string(),
            puzzle_key: "1a2b3c4d".to_string(),
            answer: "SOLDER".to_string(),
            link: "https://example.edu/puzzles/4.pdf".to_string(),
            num_required_to_unlock: 2,
            num_pages: 1,
        };

        let info = puzzle.info();
        assert_eq!(info.id, "1a2b3c4d");
        assert_eq!(info.number, 4);
        assert_eq!(info.name, "Crossed Wires");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["id"], "1a2b3c4d");
        assert_eq!(json["number"], 4);
        assert_eq!(json["name"], "Crossed Wires");
    }

    #[test]
    fn test_content_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&ContentType::Img).unwrap(), "\"IMG\"");
        assert_eq!(serde_json::to_string(&ContentType::Pdf).unwrap(), "\"PDF\"");
        assert_eq!(serde_json::to_string(&ContentType::Txt).unwrap(), "\"TXT\"");
        assert_eq!(serde_json::to_string(&ContentType::Web).unwrap(), "\"WEB\"");
    }

    #[test]
    fn test_content_type_round_trip() {
        let ct: ContentType = serde_json::from_str("\"PDF\"").unwrap();
        assert_eq!(ct, ContentType::Pdf);
    }
}
