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

use std::fmt;

use serde::{Deserialize, Serialize};

use super::rational::Rational;

/// A half-open interval of cyclic time. `begin <= end` always holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TimeSpan {
    pub begin: Rational,
    pub end: Rational,
}

impl TimeSpan {
    /// Creates a new span. Callers must pass `begin <= end`.
    pub fn new(begin: Rational, end: Rational) -> TimeSpan {
        debug_assert!(begin <= end, "span begins after it ends: {begin} -> {end}");
        TimeSpan { begin, end }
    }

    pub fn duration(&self) -> Rational {
        self.end - self.begin
    }

    pub fn midpoint(&self) -> Rational {
        self.begin + self.duration() / Rational::from_integer(2)
    }

    /// Applies `f` to both ends of the span.
    pub fn with_time(&self, f: impl Fn(Rational) -> Rational) -> TimeSpan {
        TimeSpan::new(f(self.begin), f(self.end))
    }

    /// Applies `f` to the end of the span only.
    pub fn with_end(&self, f: impl Fn(Rational) -> Rational) -> TimeSpan {
        TimeSpan::new(self.begin, f(self.end))
    }

    /// Splits the span at every cycle boundary it crosses.
    ///
    /// A zero-width span yields itself.
    pub fn span_cycles(&self) -> Vec<TimeSpan> {
        if self.begin == self.end {
            return vec![*self];
        }

        let mut spans = Vec::new();
        let end_sam = self.end.sam();
        let mut begin = self.begin;
        while self.end > begin {
            if begin.sam() == end_sam {
                spans.push(TimeSpan::new(begin, self.end));
                break;
            }
            let next_begin = begin.next_sam();
            spans.push(TimeSpan::new(begin, next_begin));
            begin = next_begin;
        }
        spans
    }

    /// Shifts the span so that it begins within the first cycle.
    pub fn cycle_arc(&self) -> TimeSpan {
        let begin = self.begin.cycle_pos();
        TimeSpan::new(begin, begin + self.duration())
    }

    /// The overlap of two spans, if they overlap or touch.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        (begin <= end).then(|| TimeSpan::new(begin, end))
    }

    /// True when `other` lies entirely within this span.
    pub fn contains(&self, other: &TimeSpan) -> bool {
        other.begin >= self.begin && other.end <= self.end
    }

    pub fn show(&self) -> String {
        format!("{} -> {}", self.begin.show(), self.end.show())
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(b: (i64, i64), e: (i64, i64)) -> TimeSpan {
        TimeSpan::new(Rational::new(b.0, b.1), Rational::new(e.0, e.1))
    }

    #[test]
    fn test_duration_and_midpoint() {
        let s = span((1, 4), (3, 4));
        assert_eq!(s.duration(), Rational::new(1, 2));
        assert_eq!(s.midpoint(), Rational::new(1, 2));
    }

    #[test]
    fn test_span_cycles_splits_at_boundaries() {
        let s = span((1, 2), (5, 2));
        assert_eq!(
            s.span_cycles(),
            vec![span((1, 2), (1, 1)), span((1, 1), (2, 1)), span((2, 1), (5, 2))]
        );
    }

    #[test]
    fn test_span_cycles_within_one_cycle() {
        let s = span((1, 4), (1, 2));
        assert_eq!(s.span_cycles(), vec![s]);
    }

    #[test]
    fn test_span_cycles_ending_on_boundary() {
        let s = span((1, 2), (2, 1));
        assert_eq!(
            s.span_cycles(),
            vec![span((1, 2), (1, 1)), span((1, 1), (2, 1))]
        );
    }

    #[test]
    fn test_span_cycles_zero_width() {
        let s = span((3, 2), (3, 2));
        assert_eq!(s.span_cycles(), vec![s]);
    }

    #[test]
    fn test_cycle_arc() {
        let s = span((9, 4), (11, 4));
        assert_eq!(s.cycle_arc(), span((1, 4), (3, 4)));
    }

    #[test]
    fn test_intersection_and_contains() {
        let a = span((0, 1), (1, 2));
        let b = span((1, 4), (1, 1));
        assert_eq!(a.intersection(&b), Some(span((1, 4), (1, 2))));
        assert_eq!(a.intersection(&span((3, 4), (1, 1))), None);
        assert!(span((0, 1), (1, 1)).contains(&b));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_show() {
        assert_eq!(span((0, 1), (1, 2)).show(), "0/1 -> 1/2");
    }
}
