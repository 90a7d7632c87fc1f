use std::collections::BTreeSet;

use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatingType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Recurrence rule of an appointment.
///
/// An occurrence is generated for every step of `interval` units starting at
/// the appointment start. The series ends after `number` occurrences or on
/// the `end` date (inclusive); with neither it is unbounded. Exceptions are
/// calendar days on which an otherwise generated occurrence is dropped.
/// Excepted occurrences still count towards `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repeating {
    repeating_type: RepeatingType,
    interval: u32,
    number: Option<u32>,
    end: Option<NaiveDate>,
    exceptions: BTreeSet<NaiveDate>,
}

impl Repeating {
    pub fn new(repeating_type: RepeatingType) -> Self {
        Self {
            repeating_type,
            interval: 1,
            number: None,
            end: None,
            exceptions: BTreeSet::new(),
        }
    }

    /// A series ending after `number` occurrences.
    pub fn with_number(repeating_type: RepeatingType, number: u32) -> Self {
        let mut repeating = Self::new(repeating_type);
        repeating.number = Some(number);
        repeating
    }

    pub fn repeating_type(&self) -> RepeatingType {
        self.repeating_type
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: u32) -> Result<(), CoreError> {
        if interval == 0 {
            return Err(CoreError::InvalidRecurrence("interval must be at least 1".into()));
        }
        self.interval = interval;
        Ok(())
    }

    pub fn number(&self) -> Option<u32> {
        self.number
    }

    /// Bound the series by occurrence count. Clears any end date.
    pub fn set_number(&mut self, number: Option<u32>) {
        self.number = number;
        if number.is_some() {
            self.end = None;
        }
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    /// Bound the series by an inclusive end date. Clears any count.
    pub fn set_end(&mut self, end: Option<NaiveDate>) {
        self.end = end;
        if end.is_some() {
            self.number = None;
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.number.is_some() || self.end.is_some()
    }

    pub fn exceptions(&self) -> &BTreeSet<NaiveDate> {
        &self.exceptions
    }

    /// Add the day `at` falls on as an exception. Returns false if that day
    /// was already excepted.
    pub fn add_exception(&mut self, at: NaiveDateTime) -> bool {
        self.exceptions.insert(at.date())
    }

    pub fn remove_exception(&mut self, at: NaiveDateTime) -> bool {
        self.exceptions.remove(&at.date())
    }

    pub fn is_exception(&self, date: NaiveDate) -> bool {
        self.exceptions.contains(&date)
    }

    /// Start of the occurrence with the given zero-based index, ignoring
    /// exceptions and bounds.
    pub fn occurrence_start(&self, first: NaiveDateTime, index: u32) -> Option<NaiveDateTime> {
        let steps = index.checked_mul(self.interval)?;
        match self.repeating_type {
            RepeatingType::Daily => first.checked_add_signed(Duration::days(i64::from(steps))),
            RepeatingType::Weekly => {
                first.checked_add_signed(Duration::weeks(i64::from(steps)))
            }
            RepeatingType::Monthly => first.checked_add_months(Months::new(steps)),
            RepeatingType::Yearly => {
                first.checked_add_months(Months::new(steps.checked_mul(12)?))
            }
        }
    }

    /// All occurrence starts within the series bounds, exceptions included.
    pub fn occurrences(&self, first: NaiveDateTime) -> Occurrences<'_> {
        Occurrences {
            repeating: self,
            first,
            index: 0,
        }
    }

    /// Start of the last occurrence, if the series is bounded.
    pub fn last_occurrence(&self, first: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.is_bounded() {
            return None;
        }
        self.occurrences(first).last()
    }
}

pub struct Occurrences<'a> {
    repeating: &'a Repeating,
    first: NaiveDateTime,
    index: u32,
}

impl Iterator for Occurrences<'_> {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(number) = self.repeating.number
            && self.index >= number
        {
            return None;
        }
        let start = self.repeating.occurrence_start(self.first, self.index)?;
        if let Some(end) = self.repeating.end
            && start.date() > end
        {
            return None;
        }
        self.index += 1;
        Some(start)
    }
}
