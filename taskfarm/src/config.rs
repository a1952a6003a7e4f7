//! Run configuration, passed explicitly into everything that needs it.
use std::num::NonZeroUsize;

use error::ConfigError;

/// Environment variable the demos read the participant count from.
pub const PARTICIPANTS_VAR: &str = "TASKFARM_PARTICIPANTS";

pub const DEFAULT_PARTICIPANTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmConfig {
    // Coordinator included, so there are always `participants - 1` workers.
    participants: NonZeroUsize,
}

impl FarmConfig {
    /// A farm needs a coordinator and at least one worker.
    pub fn new(participants: usize) -> Result<Self, ConfigError> {
        match NonZeroUsize::new(participants) {
            Some(participants) if participants.get() >= 2 => Ok(Self { participants }),
            _ => Err(ConfigError::TooFewParticipants { participants }),
        }
    }

    /// Reads the participant count from [`PARTICIPANTS_VAR`], falling back
    /// to [`DEFAULT_PARTICIPANTS`] when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(std::env::var(PARTICIPANTS_VAR).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Result<Self, ConfigError> {
        let Some(value) = value else {
            return Self::new(DEFAULT_PARTICIPANTS);
        };

        let participants = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid {
                var: PARTICIPANTS_VAR,
                value: value.to_string(),
            })?;

        Self::new(participants)
    }

    pub fn participants(&self) -> NonZeroUsize {
        self.participants
    }

    pub fn workers(&self) -> usize {
        self.participants.get() - 1
    }
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            participants: NonZeroUsize::MIN.saturating_add(DEFAULT_PARTICIPANTS - 1),
        }
    }
}

pub mod error {
    //! Configuration related errors

    use thiserror::Error;

    #[derive(Debug, Error, PartialEq, Eq, Clone)]
    pub enum ConfigError {
        #[error("a farm needs a coordinator and at least one worker, got {participants} participants")]
        TooFewParticipants { participants: usize },

        #[error("invalid value {value:?} for {var}")]
        Invalid { var: &'static str, value: String },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_farm_without_workers() {
        assert_eq!(
            FarmConfig::new(1),
            Err(ConfigError::TooFewParticipants { participants: 1 })
        );
        assert!(FarmConfig::new(0).is_err());
    }

    #[test]
    fn workers_exclude_coordinator() {
        let config = FarmConfig::new(2).unwrap();
        assert_eq!(config.participants().get(), 2);
        assert_eq!(config.workers(), 1);
    }

    #[test]
    fn parse_falls_back_to_default() {
        assert_eq!(FarmConfig::parse(None).unwrap(), FarmConfig::default());
        assert_eq!(FarmConfig::default().workers(), DEFAULT_PARTICIPANTS - 1);
    }

    #[test]
    fn parse_reads_participants() {
        assert_eq!(FarmConfig::parse(Some(" 6 ")).unwrap().workers(), 5);
        assert!(matches!(
            FarmConfig::parse(Some("many")),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            FarmConfig::parse(Some("1")),
            Err(ConfigError::TooFewParticipants { participants: 1 })
        ));
    }
}
