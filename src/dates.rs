use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Calendar day before `now` as seen from `tz`.
pub fn target_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    let local = now.with_timezone(&tz).date_naive();
    local.pred_opt().unwrap_or(NaiveDate::MIN)
}

/// Parses the date forms the stats service and the exchange produce:
/// `OCT 22, 2024`, `2024-10-22` and `2024-10-22T00:00:00`.
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%b %d, %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Provider form of a date, e.g. `OCT 22, 2024`.
pub fn format_game_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string().to_uppercase()
}

/// Season label containing `date`; seasons roll over on October 1st.
pub fn season_for_date(date: NaiveDate) -> String {
    let start = if date.month() >= 10 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{start}-{:02}", (start + 1).rem_euclid(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn target_date_uses_local_calendar_day() {
        // 02:00 UTC is still the previous evening in Sao Paulo.
        let now = Utc.with_ymd_and_hms(2024, 10, 23, 2, 0, 0).unwrap();
        assert_eq!(target_date(now, DEFAULT_TIMEZONE), ymd(2024, 10, 21));

        let now = Utc.with_ymd_and_hms(2024, 10, 23, 11, 0, 0).unwrap();
        assert_eq!(target_date(now, DEFAULT_TIMEZONE), ymd(2024, 10, 22));
    }

    #[test]
    fn target_date_crosses_month_and_year() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(target_date(now, chrono_tz::UTC), ymd(2024, 12, 31));
    }

    #[test]
    fn parses_provider_and_iso_forms() {
        assert_eq!(parse_game_date("OCT 22, 2024"), Some(ymd(2024, 10, 22)));
        assert_eq!(parse_game_date("Oct 22, 2024"), Some(ymd(2024, 10, 22)));
        assert_eq!(parse_game_date(" 2024-10-22 "), Some(ymd(2024, 10, 22)));
        assert_eq!(
            parse_game_date("2024-10-22T00:00:00"),
            Some(ymd(2024, 10, 22))
        );
        assert_eq!(parse_game_date("22/10/2024"), None);
    }

    #[test]
    fn format_round_trips_through_parse() {
        let date = ymd(2025, 4, 3);
        assert_eq!(format_game_date(date), "APR 03, 2025");
        assert_eq!(parse_game_date(&format_game_date(date)), Some(date));
    }

    #[test]
    fn season_rolls_over_in_october() {
        assert_eq!(season_for_date(ymd(2024, 10, 22)), "2024-25");
        assert_eq!(season_for_date(ymd(2025, 4, 13)), "2024-25");
        assert_eq!(season_for_date(ymd(2025, 9, 30)), "2024-25");
        assert_eq!(season_for_date(ymd(2099, 10, 1)), "2099-00");
    }
}
