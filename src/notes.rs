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

//! Note names and MIDI pitch.

/// Octave assumed when a note name omits one (`c` is `c3`).
const DEFAULT_OCTAVE: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid note name '{0}'")]
pub struct NoteError(pub String);

/// Parses a note name such as `c3`, `Eb4`, `f#`, `as2` or `gf` to a MIDI note
/// number, with `c3` = 48. `#`/`s` raise by a semitone, `b`/`f` lower.
pub fn note_to_midi(name: &str) -> Result<f64, NoteError> {
    let invalid = || NoteError(name.to_string());
    let mut chars = name.trim().chars().peekable();

    let chroma = match chars.next().map(|c| c.to_ascii_lowercase()) {
        Some('c') => 0,
        Some('d') => 2,
        Some('e') => 4,
        Some('f') => 5,
        Some('g') => 7,
        Some('a') => 9,
        Some('b') => 11,
        _ => return Err(invalid()),
    };

    let mut offset = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' | 's' => offset += 1,
            'b' | 'f' => offset -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: String = chars.collect();
    let octave = if octave.is_empty() {
        DEFAULT_OCTAVE
    } else {
        octave.parse::<i32>().map_err(|_| invalid())?
    };

    Ok(((octave + 1) * 12 + chroma + offset) as f64)
}

/// Frequency in Hz of a (possibly fractional) MIDI note, A4 = 69 = 440 Hz.
pub fn midi_to_freq(midi: f64) -> f64 {
    440.0 * 2f64.powf((midi - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_midi() {
        assert_eq!(note_to_midi("c3"), Ok(48.0));
        assert_eq!(note_to_midi("C3"), Ok(48.0));
        assert_eq!(note_to_midi("a4"), Ok(69.0));
        assert_eq!(note_to_midi("c#3"), Ok(49.0));
        assert_eq!(note_to_midi("cs3"), Ok(49.0));
        assert_eq!(note_to_midi("eb3"), Ok(51.0));
        assert_eq!(note_to_midi("ef3"), Ok(51.0));
        assert_eq!(note_to_midi("d"), Ok(50.0));
        assert_eq!(note_to_midi("c0"), Ok(12.0));
    }

    #[test]
    fn test_invalid_notes() {
        assert!(note_to_midi("h3").is_err());
        assert!(note_to_midi("").is_err());
        assert!(note_to_midi("c3x").is_err());
    }

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_freq(81.0) - 880.0).abs() < 1e-9);
        assert!((midi_to_freq(57.0) - 220.0).abs() < 1e-9);
    }
}
