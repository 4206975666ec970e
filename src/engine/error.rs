// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::samples::{LoadError, ResolveError};

/// Reasons a single trigger produced no audio. None of these affect other triggers.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("hap value is a {found}, not a control record; give it a sound or a note")]
    ValueShape { found: &'static str },

    #[error("invalid value for '{field}': {reason}")]
    InvalidControl { field: &'static str, reason: String },

    #[error("sample not found: '{name}', try one of: {}", known.join(", "))]
    MissingSampleBank { name: String, known: Vec<String> },

    #[error("soundfont '{name}' has no samples")]
    MissingSoundfont { name: String },

    #[error("'{sound}' was still loading {late_by:.3}s after its start time")]
    LateTrigger { sound: String, late_by: f64 },

    #[error("sample load failed: {0}")]
    Load(#[from] LoadError),
}

impl From<ResolveError> for TriggerError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingSampleBank { name, known } => {
                TriggerError::MissingSampleBank { name, known }
            }
            ResolveError::MissingSoundfont { name } => TriggerError::MissingSoundfont { name },
        }
    }
}

impl TriggerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> TriggerError {
        TriggerError::InvalidControl {
            field,
            reason: reason.into(),
        }
    }
}
