use serde::{Deserialize, Serialize};

/// Lifecycle phase of one practice attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Reading the prompt; nothing captured yet
    Instruction,
    /// Recording or typing under the countdown
    Capturing,
    /// Capture finished; the artifact can be replayed, retaken or submitted
    Review,
    /// Submission in flight
    Submitting,
    /// Scored; the evaluation id is available
    Result,
    /// Access denied for the current identity
    Locked,
}

impl Phase {
    /// Phases in which the captured artifact exists
    pub fn holds_artifact(&self) -> bool {
        matches!(self, Phase::Review | Phase::Submitting | Phase::Result)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Instruction => "instruction",
            Phase::Capturing => "capturing",
            Phase::Review => "review",
            Phase::Submitting => "submitting",
            Phase::Result => "result",
            Phase::Locked => "locked",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
