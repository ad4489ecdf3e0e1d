//! Query parameter helpers for the backup endpoints.
//!
//! The preview endpoint is a GET and takes its selection from the query
//! string; these types provide strongly-typed parsing following Rocket's
//! `FromForm` conventions while deriving `JsonSchema` so the generated
//! OpenAPI documentation reflects the parameters.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rocket::form::{self, FromFormField, ValueField};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::backup::{EntityKind, SelectionPolicy};

/// Wrapper for parsing ISO-8601 dates from query parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DateParam(pub NaiveDate);

impl<'r> FromFormField<'r> for DateParam {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        let trimmed = field.value.trim();
        match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            Ok(date) => Ok(DateParam(date)),
            Err(_) => Err(form::Error::validation(format!(
                "invalid date '{}', expected YYYY-MM-DD",
                field.value
            )))?,
        }
    }
}

impl DateParam {
    /// Midnight at the start of the day, UTC.
    pub fn start_of_day(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_hms_opt(0, 0, 0).expect("valid time"))
    }

    /// Last second of the day, UTC.
    pub fn end_of_day(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_hms_opt(23, 59, 59).expect("valid time"))
    }
}

impl<'r> FromFormField<'r> for EntityKind {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        EntityKind::from_wire(field.value.trim()).ok_or_else(|| {
            form::Error::validation(format!("unknown entity kind '{}'", field.value)).into()
        })
    }
}

/// Query-string form of a [`SelectionPolicy`]: repeat `kinds` per collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct BackupSelectionParams {
    /// Collections to include, by wire name (e.g. `kinds=users&kinds=posts`).
    #[field(default = Vec::new())]
    pub kinds: Vec<EntityKind>,
    #[field(name = "dateFrom")]
    pub date_from: Option<DateParam>,
    #[field(name = "dateTo")]
    pub date_to: Option<DateParam>,
    #[field(name = "authorId")]
    pub author_id: Option<i32>,
    #[field(name = "maxRecords")]
    pub max_records: Option<i64>,
}

impl BackupSelectionParams {
    pub fn into_policy(self) -> SelectionPolicy {
        SelectionPolicy {
            entities: self.kinds.iter().map(|&kind| (kind, true)).collect(),
            date_from: self.date_from.as_ref().map(DateParam::start_of_day),
            date_to: self.date_to.as_ref().map(DateParam::end_of_day),
            author_id: self.author_id,
            max_records: self.max_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::form::Form;

    #[test]
    fn parses_kinds_and_dates_from_the_query_string() {
        let parsed: BackupSelectionParams =
            Form::parse("kinds=users&kinds=jobOffers&dateFrom=2025-01-01&maxRecords=10")
                .expect("valid query");

        assert_eq!(parsed.kinds, vec![EntityKind::Users, EntityKind::JobOffers]);
        assert_eq!(parsed.max_records, Some(10));
        assert!(parsed.date_to.is_none());
        assert_eq!(
            parsed.date_from.expect("date").start_of_day().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );

        let empty: BackupSelectionParams = Form::parse("").expect("empty query");
        assert!(empty.kinds.is_empty());

        assert!(Form::<BackupSelectionParams>::parse("kinds=widgets").is_err());
    }

    #[test]
    fn params_convert_into_a_policy() {
        let params = BackupSelectionParams {
            kinds: vec![EntityKind::Users, EntityKind::Categories],
            date_from: Some(DateParam(
                NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            )),
            date_to: None,
            author_id: Some(7),
            max_records: Some(25),
        };

        let policy = params.into_policy();
        assert!(policy.includes(EntityKind::Users));
        assert!(policy.includes(EntityKind::Categories));
        assert!(!policy.includes(EntityKind::Posts));
        assert_eq!(policy.author_id, Some(7));
        assert_eq!(policy.max_records(), 25);
        assert_eq!(
            policy.date_from.expect("date").to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
    }
}
