use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::model::common::{days_between, one_year_after, one_year_before};

/// One grid column per calendar day, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayAxis {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSpan {
    pub year: i32,
    pub month: u32,
    pub first_column: usize,
    pub span: usize,
}

impl DayAxis {
    /// Widens `[window_start, window_end]` so it always reaches one year
    /// before and after `today`.
    pub fn around(window_start: NaiveDate, window_end: NaiveDate, today: NaiveDate) -> Self {
        let (low, high) = if window_start <= window_end {
            (window_start, window_end)
        } else {
            (window_end, window_start)
        };

        Self {
            start: low.min(one_year_before(today)),
            end: high.max(one_year_after(today)),
        }
    }

    pub fn column_count(&self) -> usize {
        days_between(self.start, self.end) as usize + 1
    }

    pub fn column_of(&self, date: NaiveDate) -> Option<usize> {
        if date < self.start || date > self.end {
            return None;
        }
        Some(days_between(self.start, date) as usize)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day <= self.end)
    }

    /// Consecutive days sharing (month, year) merge into one header cell.
    pub fn month_headers(&self) -> Vec<MonthSpan> {
        let mut spans: Vec<MonthSpan> = Vec::new();

        for (column, day) in self.days().enumerate() {
            match spans.last_mut() {
                Some(current) if current.year == day.year() && current.month == day.month() => {
                    current.span += 1;
                }
                _ => spans.push(MonthSpan {
                    year: day.year(),
                    month: day.month(),
                    first_column: column,
                    span: 1,
                }),
            }
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn around_widens_to_a_year_on_each_side_of_today() {
        let axis = DayAxis::around(date(2024, 3, 1), date(2024, 3, 10), date(2024, 3, 5));
        assert_eq!(axis.start, date(2023, 3, 5));
        assert_eq!(axis.end, date(2025, 3, 5));
    }

    #[test]
    fn around_keeps_wider_windows_and_swaps_inverted_ones() {
        let axis = DayAxis::around(date(2027, 1, 1), date(2020, 1, 1), date(2024, 6, 1));
        assert_eq!(axis.start, date(2020, 1, 1));
        assert_eq!(axis.end, date(2027, 1, 1));
    }

    #[test]
    fn columns_are_whole_days_from_start() {
        let axis = DayAxis {
            start: date(2024, 1, 1),
            end: date(2024, 1, 31),
        };
        assert_eq!(axis.column_count(), 31);
        assert_eq!(axis.column_of(date(2024, 1, 5)), Some(4));
        assert_eq!(axis.column_of(date(2024, 2, 1)), None);
        assert_eq!(axis.days().nth(30), Some(date(2024, 1, 31)));
        assert_eq!(axis.days().nth(31), None);
        assert_eq!(axis.days().count(), 31);
    }

    #[test]
    fn month_headers_merge_consecutive_days() {
        let axis = DayAxis {
            start: date(2023, 12, 30),
            end: date(2024, 2, 2),
        };
        let headers = axis.month_headers();

        assert_eq!(
            headers,
            vec![
                MonthSpan { year: 2023, month: 12, first_column: 0, span: 2 },
                MonthSpan { year: 2024, month: 1, first_column: 2, span: 31 },
                MonthSpan { year: 2024, month: 2, first_column: 33, span: 2 },
            ]
        );
        assert_eq!(headers.iter().map(|span| span.span).sum::<usize>(), axis.column_count());
    }
}
