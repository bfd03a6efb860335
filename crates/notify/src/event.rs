use relay_core::MeetingRecord;

/// Something worth telling a human about.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Delivered {
        meeting: MeetingRecord,
        organization: String,
    },
    Skipped {
        meeting: MeetingRecord,
        reason: String,
    },
    Failed {
        meeting: MeetingRecord,
        error: String,
        attempt: u32,
    },
    StreakAlert {
        count: u32,
    },
    /// The ledger file was unusable and a fresh one was started.
    LedgerRecovered {
        path: String,
        error: String,
    },
}

impl NotificationEvent {
    /// Stable identifier, also the key for template overrides.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::StreakAlert { .. } => "streakAlert",
            Self::LedgerRecovered { .. } => "ledgerRecovered",
        }
    }

    pub fn meeting(&self) -> Option<&MeetingRecord> {
        match self {
            Self::Delivered { meeting, .. }
            | Self::Skipped { meeting, .. }
            | Self::Failed { meeting, .. } => Some(meeting),
            Self::StreakAlert { .. } | Self::LedgerRecovered { .. } => None,
        }
    }
}
