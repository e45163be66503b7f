use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AlertPhase {
    #[default]
    Armed,
    Cooling,
}

/// Emitted once per above-threshold episode.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub live: usize,
    pub threshold: u32,
}

/// One-shot threshold crossing detector.
///
/// `Armed -> Cooling` fires when `live >= threshold`. `Cooling -> Armed`
/// happens silently as soon as `live < threshold`.
#[derive(Debug, Clone, Default)]
pub struct AlertDebouncer {
    phase: AlertPhase,
}

impl AlertDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    pub fn evaluate(&mut self, live: usize, threshold: u32) -> Option<AlertEvent> {
        let above = live >= threshold as usize;
        match (self.phase, above) {
            (AlertPhase::Armed, true) => {
                self.phase = AlertPhase::Cooling;
                Some(AlertEvent { live, threshold })
            }
            (AlertPhase::Cooling, false) => {
                self.phase = AlertPhase::Armed;
                None
            }
            _ => None,
        }
    }
}
