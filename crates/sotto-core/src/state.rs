//! Session state, in its live and persisted forms.

/// Where the session is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    /// Waiting for a toggle.
    Idle,
    /// The microphone is hot.
    Recording,
    /// A finished capture is being transcribed.
    Processing,
}

/// The coarse state persisted for external readers (status bars, toggle
/// scripts). Processing projects to `Idle`: the file answers "is the mic
/// hot", not "is the pipeline busy".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredState {
    Idle,
    Recording,
}

impl StoredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoredState::Idle => "idle",
            StoredState::Recording => "recording",
        }
    }

    /// Parses the persisted form. Anything unrecognized is `None`; readers
    /// must treat that as unknown rather than assume idle.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "idle" => Some(StoredState::Idle),
            "recording" => Some(StoredState::Recording),
            _ => None,
        }
    }
}

impl From<MicState> for StoredState {
    fn from(state: MicState) -> Self {
        match state {
            MicState::Recording => StoredState::Recording,
            MicState::Idle | MicState::Processing => StoredState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_state_parse() {
        assert_eq!(StoredState::parse("idle"), Some(StoredState::Idle));
        assert_eq!(StoredState::parse("recording\n"), Some(StoredState::Recording));
        assert_eq!(StoredState::parse(""), None);
        assert_eq!(StoredState::parse("paused"), None);
    }

    #[test]
    fn test_processing_projects_to_idle() {
        assert_eq!(StoredState::from(MicState::Processing), StoredState::Idle);
        assert_eq!(StoredState::from(MicState::Recording), StoredState::Recording);
    }
}
