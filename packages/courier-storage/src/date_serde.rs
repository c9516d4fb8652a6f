//! Optional e-mail dates: written as RFC 3339, read from RFC 3339 or epoch milliseconds.

use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
	Millis(i64),
	Text(String),
}

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let Some(value) = value else {
		return serializer.serialize_none();
	};
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

/// Nulls and blank strings read as `None`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<RawDate>::deserialize(deserializer)? {
		None => Ok(None),
		Some(RawDate::Millis(millis)) =>
			OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
				.map(Some)
				.map_err(serde::de::Error::custom),
		Some(RawDate::Text(text)) if text.trim().is_empty() => Ok(None),
		Some(RawDate::Text(text)) =>
			OffsetDateTime::parse(text.trim(), &Rfc3339).map(Some).map_err(serde::de::Error::custom),
	}
}
