//! Desired window configuration for a session.

use crate::error::SessionError;
use crate::lifecycle::SessionState;
use crate::protocol::{Setting, SettingKind};

/// What the caller must do after a setting was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Recorded; it goes out with the replay when the session starts.
    Deferred,
    /// Recorded; the renderer is live and the setting must be sent now.
    Immediate,
}

/// Ordered map of the latest value per setting kind.
///
/// Order is the order in which each kind was first applied; overwriting a
/// kind keeps its original slot.
#[derive(Debug, Default, Clone)]
pub struct SettingsStore {
    entries: Vec<Setting>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record `setting` given the session's current state.
    pub fn apply(
        &mut self,
        setting: Setting,
        state: &SessionState,
    ) -> Result<Applied, SessionError> {
        let applied = match state {
            SessionState::Idle => Applied::Deferred,
            SessionState::Running => Applied::Immediate,
            _ => return Err(SessionError::ChannelClosed),
        };
        setting
            .validate()
            .map_err(|reason| SessionError::InvalidSetting {
                kind: setting.kind(),
                reason,
            })?;
        self.record(setting);
        Ok(applied)
    }

    fn record(&mut self, setting: Setting) {
        let kind = setting.kind();
        match self.entries.iter_mut().find(|entry| entry.kind() == kind) {
            Some(slot) => *slot = setting,
            None => self.entries.push(setting),
        }
    }

    pub fn get(&self, kind: SettingKind) -> Option<&Setting> {
        self.entries.iter().find(|entry| entry.kind() == kind)
    }

    /// Current title, used for the launch arguments.
    pub fn title(&self) -> Option<&str> {
        match self.get(SettingKind::Title) {
            Some(Setting::Title { title }) => Some(title),
            _ => None,
        }
    }

    /// Settings in replay order.
    pub fn replay(&self) -> impl Iterator<Item = &Setting> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
