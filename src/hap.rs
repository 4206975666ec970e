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

//! Discrete pattern events.
//!
//! A hap is a value active during its `part` span. The `part` may be a fragment
//! of a longer logical event described by `whole`; the part never extends past
//! the whole. A hap without a whole is a sample of a continuously varying value
//! taken at the midpoint of its part.

mod context;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::time::{Rational, TimeSpan};

pub use context::{Context, Location};

/// Accumulator state threaded through stateful haps.
pub type State = Map<String, Value>;

/// A deferred value: given the current state, returns the new state and the value.
pub type StateFn<T> = Arc<dyn Fn(State) -> (State, T) + Send + Sync>;

/// The payload of a hap: either a plain value or one that is resolved at onset.
#[derive(Clone)]
pub enum HapValue<T> {
    Ready(T),
    Stateful(StateFn<T>),
}

impl<T: fmt::Debug> fmt::Debug for HapValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HapValue::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            HapValue::Stateful(_) => f.write_str("Stateful(<fn>)"),
        }
    }
}

/// A discrete event.
#[derive(Clone, Debug)]
pub struct Hap<T> {
    pub whole: Option<TimeSpan>,
    pub part: TimeSpan,
    pub value: HapValue<T>,
    pub context: Context,
}

impl<T> Hap<T> {
    /// Creates a hap with a plain value and an empty context.
    pub fn new(whole: Option<TimeSpan>, part: TimeSpan, value: T) -> Hap<T> {
        Hap::with_context(whole, part, value, Context::default())
    }

    pub fn with_context(
        whole: Option<TimeSpan>,
        part: TimeSpan,
        value: T,
        context: Context,
    ) -> Hap<T> {
        debug_assert!(
            whole.map_or(true, |whole| whole.contains(&part)),
            "hap part extends outside its whole"
        );
        Hap {
            whole,
            part,
            value: HapValue::Ready(value),
            context,
        }
    }

    /// Creates a hap whose value is produced from the pattern state at onset.
    pub fn stateful(
        whole: Option<TimeSpan>,
        part: TimeSpan,
        resolve: impl Fn(State) -> (State, T) + Send + Sync + 'static,
        context: Context,
    ) -> Hap<T> {
        debug_assert!(
            whole.map_or(true, |whole| whole.contains(&part)),
            "hap part extends outside its whole"
        );
        Hap {
            whole,
            part,
            value: HapValue::Stateful(Arc::new(resolve)),
            context,
        }
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self.value, HapValue::Stateful(_))
    }

    /// Returns the plain value, or None if it is still deferred.
    pub fn value(&self) -> Option<&T> {
        match &self.value {
            HapValue::Ready(value) => Some(value),
            HapValue::Stateful(_) => None,
        }
    }

    /// The whole span of a discrete event, or the part of a continuous one.
    pub fn whole_or_part(&self) -> &TimeSpan {
        self.whole.as_ref().unwrap_or(&self.part)
    }

    /// Length of the whole event. Continuous haps have none.
    pub fn duration(&self) -> Option<Rational> {
        self.whole.map(|whole| whole.duration())
    }

    /// True if this fragment contains the start of its event.
    pub fn has_onset(&self) -> bool {
        self.whole
            .is_some_and(|whole| whole.begin == self.part.begin)
    }

    /// True if the part lies within the whole (always true for continuous haps).
    pub fn part_within_whole(&self) -> bool {
        self.whole.map_or(true, |whole| whole.contains(&self.part))
    }

    /// Maps both spans, keeping value and context.
    pub fn with_span(self, f: impl Fn(TimeSpan) -> TimeSpan) -> Hap<T> {
        Hap {
            whole: self.whole.map(&f),
            part: f(self.part),
            value: self.value,
            context: self.context,
        }
    }

    /// Maps the value. Deferred values get `f` applied after they resolve.
    pub fn with_value<U, F>(self, f: F) -> Hap<U>
    where
        T: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let value = match self.value {
            HapValue::Ready(value) => HapValue::Ready(f(value)),
            HapValue::Stateful(resolve) => HapValue::Stateful(Arc::new(move |state| {
                let (state, value) = resolve(state);
                (state, f(value))
            })),
        };
        Hap {
            whole: self.whole,
            part: self.part,
            value,
            context: self.context,
        }
    }

    /// Resolves a deferred value against `state`.
    ///
    /// The deferred function only runs for fragments that contain the onset, so
    /// an accumulator advances once per event no matter how it is fragmented.
    /// Everything else is returned unchanged along with the untouched state.
    pub fn resolve_state(self, state: State) -> (State, Hap<T>) {
        if !self.has_onset() {
            return (state, self);
        }
        match self.value {
            HapValue::Stateful(resolve) => {
                let (state, value) = resolve(state);
                let hap = Hap {
                    whole: self.whole,
                    part: self.part,
                    value: HapValue::Ready(value),
                    context: self.context,
                };
                (state, hap)
            }
            value @ HapValue::Ready(_) => (
                state,
                Hap {
                    value,
                    ..self
                },
            ),
        }
    }

    /// True if both haps have the same whole (or both lack one).
    pub fn span_equals<U>(&self, other: &Hap<U>) -> bool {
        self.whole == other.whole
    }

    /// Merged context of two haps being combined into one.
    pub fn combine_context<U>(&self, other: &Hap<U>) -> Context {
        self.context.combine(&other.context)
    }

    pub fn set_context(self, context: Context) -> Hap<T> {
        Hap { context, ..self }
    }
}

impl<T: PartialEq> Hap<T> {
    /// Structural equality on spans and value. Deferred values compare by identity.
    pub fn equals(&self, other: &Hap<T>) -> bool {
        self.span_equals(other)
            && self.part == other.part
            && match (&self.value, &other.value) {
                (HapValue::Ready(a), HapValue::Ready(b)) => a == b,
                (HapValue::Stateful(a), HapValue::Stateful(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

impl<T: PartialEq> PartialEq for Hap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<T: fmt::Display> Hap<T> {
    /// Renders `(whole, part, value)`, with `~` for a missing whole.
    pub fn show(&self) -> String {
        let whole = self
            .whole
            .map(|whole| whole.show())
            .unwrap_or_else(|| "~".to_string());
        let value = match &self.value {
            HapValue::Ready(value) => value.to_string(),
            HapValue::Stateful(_) => "<stateful>".to_string(),
        };
        format!("({}, {}, {})", whole, self.part.show(), value)
    }
}
