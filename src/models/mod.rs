pub mod hunt;
pub mod message;
pub mod person;
pub mod puzzle;
pub mod submission;
pub mod team;

pub use hunt::{Hunt, HuntState};
pub use message::{Message, MessageView};
pub use person::Person;
pub use puzzle::{CannedResponse, ContentType, Puzzle, PuzzleInfo, Unlockable};
pub use submission::{StatusUpdate, Submission, SubmissionView, Unlock};
pub use team::{Team, TeamMember};
