use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Calendar date of `now` as seen from `offset`.
pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

pub fn today_in(offset: FixedOffset) -> NaiveDate {
    local_date(Utc::now(), offset)
}
