use chrono::{NaiveDate, NaiveDateTime};

/// The one date format used for input parsing and output formatting:
/// 4-digit year, zero-padded month and day, 24-hour clock with an unpadded
/// hour, 2-digit minute.
pub const DATE_FORMAT: &str = "yyyy-MM-dd H:mm";

/// Parses `text` against [`DATE_FORMAT`] exactly. The hour accepts one or
/// two digits; every other field is fixed width, and trailing input is
/// rejected. Returns `None` for anything that is not a valid timestamp.
pub fn parse_event_datetime(text: &str) -> Option<NaiveDateTime> {
    let mut scanner = Scanner::new(text);

    let year = scanner.digits(4, 4)?;
    scanner.literal('-')?;
    let month = scanner.digits(2, 2)?;
    scanner.literal('-')?;
    let day = scanner.digits(2, 2)?;
    scanner.literal(' ')?;
    let hour = scanner.digits(1, 2)?;
    scanner.literal(':')?;
    let minute = scanner.digits(2, 2)?;
    if !scanner.is_done() {
        return None;
    }

    NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_opt(hour, minute, 0)
}

/// Formats a timestamp with [`DATE_FORMAT`]. Formatting then re-parsing a
/// minute-resolution timestamp yields the same value.
pub fn format_event_datetime(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%d %-H:%M").to_string()
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn digits(&mut self, min: usize, max: usize) -> Option<u32> {
        let len = self
            .rest
            .bytes()
            .take(max)
            .take_while(u8::is_ascii_digit)
            .count();
        if len < min {
            return None;
        }
        let (digits, rest) = self.rest.split_at(len);
        self.rest = rest;
        digits.parse().ok()
    }

    fn literal(&mut self, expected: char) -> Option<()> {
        self.rest = self.rest.strip_prefix(expected)?;
        Some(())
    }

    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }
}
