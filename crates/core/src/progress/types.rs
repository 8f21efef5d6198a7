//! Types for progress tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ProgressError;

/// Reserved percentage accepted for the error stage, meaning "not a
/// percentage". Stored records carry no percentage instead.
pub const ERROR_SENTINEL: f32 = -1.0;

/// Maximum length of a progress id.
pub const MAX_ID_LEN: usize = 128;

/// Lifecycle stage of one conversion item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Starting,
    Downloading,
    Converting,
    Completed,
    Error,
    Cancelled,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Self::Starting,
        Self::Downloading,
        Self::Converting,
        Self::Completed,
        Self::Error,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Converting => "converting",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// No further transition is allowed once a terminal stage is reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Downloading => 1,
            Self::Converting => 2,
            Self::Completed => 3,
            Self::Error | Self::Cancelled => 4,
        }
    }

    /// Whether an item in this stage may move to `next`.
    ///
    /// Stages advance along starting, downloading, converting, completed
    /// (repeating the current stage is allowed for incremental updates).
    /// Any non-terminal stage may jump to error or cancelled.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Error | Self::Cancelled => true,
            _ => next.rank() >= self.rank(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ProgressError::UnknownStage {
                stage: s.to_string(),
            })
    }
}

/// The latest progress of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    id: String,
    stage: Stage,
    percentage: Option<f32>,
    message: String,
    timestamp: DateTime<Utc>,
}

impl ProgressRecord {
    /// Creates a validated record stamped with the current time.
    ///
    /// For [`Stage::Error`] the percentage may be [`ERROR_SENTINEL`] or any
    /// value in [0, 100]; it is dropped either way. Every other stage needs
    /// a value in [0, 100].
    pub fn new(
        id: impl Into<String>,
        stage: Stage,
        percentage: f32,
        message: impl Into<String>,
    ) -> Result<Self, ProgressError> {
        let id = id.into();
        validate_id(&id)?;
        let percentage = validate_percentage(stage, percentage)?;
        Ok(Self {
            id,
            stage,
            percentage,
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    /// Returns the record re-stamped with the given time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// `None` exactly when the stage is [`Stage::Error`].
    pub fn percentage(&self) -> Option<f32> {
        self.percentage
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Age relative to `now`, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.timestamp).max(chrono::Duration::zero())
    }
}

/// Checks that an id can be used as a storage key.
pub fn validate_id(id: &str) -> Result<(), ProgressError> {
    if id.is_empty() {
        return Err(ProgressError::invalid_id(id, "must not be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(ProgressError::invalid_id(
            id,
            format!("must be at most {} characters", MAX_ID_LEN),
        ));
    }
    if id.starts_with('.') {
        return Err(ProgressError::invalid_id(id, "must not start with '.'"));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ProgressError::invalid_id(
            id,
            format!("contains invalid character {:?}", bad),
        ));
    }
    Ok(())
}

fn validate_percentage(stage: Stage, percentage: f32) -> Result<Option<f32>, ProgressError> {
    let in_range = percentage.is_finite() && (0.0..=100.0).contains(&percentage);
    match stage {
        Stage::Error if in_range || percentage == ERROR_SENTINEL => Ok(None),
        _ if in_range => Ok(Some(percentage)),
        _ => Err(ProgressError::InvalidPercentage { stage, percentage }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_str() {
        assert_eq!("downloading".parse::<Stage>().unwrap(), Stage::Downloading);
        assert_eq!(" Completed ".parse::<Stage>().unwrap(), Stage::Completed);
        let err = "paused".parse::<Stage>().unwrap_err();
        assert!(matches!(err, ProgressError::UnknownStage { .. }));
    }

    #[test]
    fn test_transitions() {
        assert!(Stage::Starting.can_transition_to(Stage::Downloading));
        assert!(Stage::Downloading.can_transition_to(Stage::Downloading));
        assert!(Stage::Starting.can_transition_to(Stage::Converting));
        assert!(Stage::Converting.can_transition_to(Stage::Completed));
        assert!(Stage::Downloading.can_transition_to(Stage::Error));
        assert!(Stage::Starting.can_transition_to(Stage::Cancelled));

        assert!(!Stage::Converting.can_transition_to(Stage::Downloading));
        assert!(!Stage::Completed.can_transition_to(Stage::Error));
        assert!(!Stage::Error.can_transition_to(Stage::Starting));
        assert!(!Stage::Cancelled.can_transition_to(Stage::Cancelled));
    }

    #[test]
    fn test_percentage_validation() {
        assert!(ProgressRecord::new("a", Stage::Downloading, 0.0, "").is_ok());
        assert!(ProgressRecord::new("a", Stage::Downloading, 100.0, "").is_ok());
        assert!(ProgressRecord::new("a", Stage::Downloading, 100.5, "").is_err());
        assert!(ProgressRecord::new("a", Stage::Downloading, -0.1, "").is_err());
        assert!(ProgressRecord::new("a", Stage::Converting, f32::NAN, "").is_err());
        assert!(ProgressRecord::new("a", Stage::Starting, ERROR_SENTINEL, "").is_err());

        let err = ProgressRecord::new("a", Stage::Error, ERROR_SENTINEL, "boom").unwrap();
        assert_eq!(err.percentage(), None);
        assert!(ProgressRecord::new("a", Stage::Error, -5.0, "").is_err());
    }

    #[test]
    fn test_id_validation() {
        assert!(validate_id("job-1_a.b").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id(".hidden").is_err());
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id(&"x".repeat(129)).is_err());
        assert!(validate_id(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_record_serialization_shape() {
        let record = ProgressRecord::new("job", Stage::Error, ERROR_SENTINEL, "failed").unwrap();
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "error");
        assert!(json["percentage"].is_null());
        assert_eq!(json["message"], "failed");
    }
}
