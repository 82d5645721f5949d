use npc_core::agent::{Animator, Effect};
use npc_core::transcript::Transcript;
use tracing::info;

/// Animator for a headless scene: every trigger becomes a log line.
#[derive(Debug)]
pub struct LogAnimator {
    npc: String,
    walking: bool,
    attacks: u32,
}

impl LogAnimator {
    pub fn new(npc: impl Into<String>) -> Self {
        Self {
            npc: npc.into(),
            walking: false,
            attacks: 0,
        }
    }

    pub fn is_walking(&self) -> bool {
        self.walking
    }

    pub fn attacks(&self) -> u32 {
        self.attacks
    }
}

impl Animator for LogAnimator {
    fn set_locomotion(&mut self, moving: bool) {
        // The state machine re-asserts the flag freely; only log edges.
        if self.walking != moving {
            self.walking = moving;
            info!(npc = %self.npc, walking = moving, "Locomotion changed");
        }
    }

    fn trigger_attack(&mut self) {
        self.attacks += 1;
        info!(npc = %self.npc, "Attack animation triggered");
    }

    fn play_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Flame { radius } => info!(npc = %self.npc, radius, "Flame effect"),
        }
    }
}

/// Tracks how much of a transcript has been shown already.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    seen: u64,
}

impl TranscriptPrinter {
    /// Formats entries appended since the previous call.
    pub fn fresh_lines(&mut self, transcript: &Transcript) -> Vec<String> {
        let lines = transcript
            .since(self.seen)
            .map(|entry| format!("{}: {}", entry.sender, entry.text))
            .collect();
        self.seen = transcript.total_appended();
        lines
    }
}
