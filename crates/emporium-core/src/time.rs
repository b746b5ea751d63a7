use time::OffsetDateTime;

/// Current time truncated to microseconds, the precision Postgres keeps.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let micros = now.microsecond();
    now.replace_microsecond(micros).unwrap_or(now)
}
