// timestamps are kept as fixed width RFC 3339 text so that
// `ORDER BY` on the column is chronological

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

pub type Timestamp = DateTime<Utc>;

/// Wall clock time, truncated to what the store keeps.
pub fn now() -> Timestamp {
	Utc::now().trunc_subsecs(6)
}

pub fn to_sql(stamp: &Timestamp) -> String {
	stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
