use sqlx::error::ErrorKind;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => RepoError::Duplicate {
                constraint: db
                    .message()
                    .rsplit(": ")
                    .next()
                    .unwrap_or("unknown")
                    .to_string(),
            },
            ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            _ => RepoError::from_persistence(db.message()),
        },
        other => RepoError::from_persistence(other),
    }
}

/// Timestamps are stored as RFC 3339 text, normalized to UTC so that
/// lexicographic order is chronological order. The neighbor queries depend
/// on this. Fractional seconds are dropped: `...56.5Z` would sort before
/// `...56Z` as text while being later in time.
pub fn encode_ts(at: OffsetDateTime) -> Result<String, RepoError> {
    at.to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(RepoError::from_persistence)?
        .format(&Rfc3339)
        .map_err(RepoError::from_persistence)
}

pub fn decode_ts(raw: &str) -> Result<OffsetDateTime, RepoError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(RepoError::from_persistence)
}

pub fn decode_ts_opt(raw: Option<&str>) -> Result<Option<OffsetDateTime>, RepoError> {
    raw.map(decode_ts).transpose()
}

pub fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}

pub fn decode_tags(raw: &str) -> Result<Vec<String>, RepoError> {
    serde_json::from_str(raw).map_err(RepoError::from_persistence)
}

pub fn encode_tags(tags: &[String]) -> Result<String, RepoError> {
    serde_json::to_string(tags).map_err(RepoError::from_persistence)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn timestamps_round_trip_in_utc() {
        let at = datetime!(2024-03-10 12:34:56 +09:00);
        let encoded = encode_ts(at).expect("encode");
        assert_eq!(encoded, "2024-03-10T03:34:56Z");
        assert_eq!(decode_ts(&encoded).expect("decode"), at);
    }

    #[test]
    fn encoding_drops_fractional_seconds() {
        let at = datetime!(2024-03-10 03:34:56.5 UTC);
        assert_eq!(encode_ts(at).expect("encode"), "2024-03-10T03:34:56Z");
    }

    #[test]
    fn utc_encoding_preserves_order_lexicographically() {
        let older = encode_ts(datetime!(2024-03-10 23:59 +09:00)).expect("encode");
        let newer = encode_ts(datetime!(2024-03-10 23:00 UTC)).expect("encode");
        assert!(older < newer);
    }

    #[test]
    fn tags_round_trip() {
        let tags = vec!["rust".to_string(), "日記".to_string()];
        let encoded = encode_tags(&tags).expect("encode");
        assert_eq!(decode_tags(&encoded).expect("decode"), tags);
    }
}
