use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::Id;
use crate::types::{ApiError, ApiResult};

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_id(raw: &str) -> Option<Id> {
    // `str::parse` would also take a sign.
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Article slugs are the decimal article id.
pub fn parse_slug(slug: &str) -> ApiResult<Id> {
    parse_id(slug).ok_or(ApiError::InvalidArgument("invalid article id"))
}

pub fn parse_comment_id(id: &str) -> ApiResult<Id> {
    parse_id(id).ok_or(ApiError::InvalidArgument("invalid comment id"))
}

pub fn slug(id: Id) -> String {
    id.to_string()
}

/// Page size used when a request leaves `limit` unset.
pub const DEFAULT_LIMIT: i64 = 20;

pub fn page(limit: i32, offset: i32) -> (i64, i64) {
    let limit = if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        i64::from(limit)
    };
    (limit, i64::from(offset.max(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slugs_are_plain_decimal_ids() {
        assert_eq!(parse_slug("1").unwrap(), 1);
        assert_eq!(parse_slug("0042").unwrap(), 42);
        assert_eq!(slug(17), "17");
        for bad in ["", "abc", "how-to-train-your-dragon", "-1", "+1", "1.0", " 1", "99999999999"] {
            let err = parse_slug(bad).unwrap_err();
            assert_eq!(err.to_string(), "invalid article id", "slug {:?}", bad);
        }
    }

    #[test]
    fn comment_ids_have_their_own_message() {
        assert_eq!(parse_comment_id("3").unwrap(), 3);
        assert_eq!(parse_comment_id("x").unwrap_err().to_string(), "invalid comment id");
    }

    #[test]
    fn dates_use_millisecond_rfc3339() {
        let date = Utc.with_ymd_and_hms(2018, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(format_date(&date), "2018-06-01T12:30:00.000Z");
    }

    #[test]
    fn paging_defaults() {
        assert_eq!(page(0, 0), (20, 0));
        assert_eq!(page(-3, -1), (20, 0));
        assert_eq!(page(5, 10), (5, 10));
    }
}
