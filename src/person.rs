use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single family record.
///
/// Records are stored flat; relationships are expressed through
/// `mother_id`, `father_id` and the `spouses` list rather than through
/// nesting. All fields travel as camelCase JSON, and existing files may
/// omit any of them, so everything defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub person_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spouses: Vec<SpouseLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// One marriage edge. Every link is directional and stored on the
/// person that owns it; a well formed tree carries the reciprocal link
/// on the spouse as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseLink {
    #[serde(default)]
    pub spouse_id: String,
    #[serde(default, alias = "marriage", skip_serializing_if = "Option::is_none")]
    pub marriage_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divorce_date: Option<String>,
}

impl Person {
    /// Mother's id, or `None` when the slot is empty or whitespace.
    pub fn mother(&self) -> Option<&str> {
        ref_id(self.mother_id.as_deref())
    }

    /// Father's id, or `None` when the slot is empty or whitespace.
    pub fn father(&self) -> Option<&str> {
        ref_id(self.father_id.as_deref())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// A person counts as deceased only when `dod` parses as a real
    /// date. Placeholder text in the field means the person is living.
    pub fn is_deceased(&self) -> bool {
        self.dod.as_deref().and_then(parse_person_date).is_some()
    }
}

fn ref_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty())
}

/// Parse a stored date field.
///
/// Dates are kept as `YYYY-MM-DD` strings, but hand edited files carry
/// empty strings and the literal texts `"null"` and `"undefined"` in
/// date slots. Those sentinels, and anything else that does not parse,
/// all mean "no date".
pub fn parse_person_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered == "null" || lowered == "undefined" {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_record() {
        let raw = r#"{
            "personId": "p1",
            "firstName": "John",
            "lastName": "Doe",
            "gender": "male",
            "dob": "1950-05-20",
            "dod": null,
            "motherId": "",
            "spouses": [{"spouseId": "p2", "marriage": "1972-06-10"}]
        }"#;
        let person: Person = serde_json::from_str(raw).unwrap();
        assert_eq!(person.person_id, "p1");
        assert_eq!(person.gender, Gender::Male);
        assert_eq!(person.dob.as_deref(), Some("1950-05-20"));
        assert_eq!(person.dod, None);
        assert_eq!(person.father_id, None);
        assert_eq!(person.spouses.len(), 1);
        assert_eq!(
            person.spouses[0].marriage_date.as_deref(),
            Some("1972-06-10")
        );
    }

    #[test]
    fn unknown_gender_defaults_to_other_on_missing_field() {
        let person: Person = serde_json::from_str(r#"{"personId": "p1"}"#).unwrap();
        assert_eq!(person.gender, Gender::Other);
    }

    #[test]
    fn parent_accessors_normalize_blank_ids() {
        let person = Person {
            mother_id: Some("  ".to_string()),
            father_id: Some(" p9 ".to_string()),
            ..Person::default()
        };
        assert_eq!(person.mother(), None);
        assert_eq!(person.father(), Some("p9"));
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let person = Person {
            last_name: "Doe".to_string(),
            ..Person::default()
        };
        assert_eq!(person.full_name(), "Doe");
    }

    #[test]
    fn sentinel_dates_parse_as_none() {
        for raw in ["", "  ", "null", "NULL", " Undefined ", "not-a-date", "1990-13-40"] {
            assert_eq!(parse_person_date(raw), None, "{raw:?} should not parse");
        }
        assert_eq!(
            parse_person_date("1950-05-20"),
            NaiveDate::from_ymd_opt(1950, 5, 20)
        );
    }

    #[test]
    fn deceased_requires_parseable_dod() {
        let mut person = Person {
            dod: Some("null".to_string()),
            ..Person::default()
        };
        assert!(!person.is_deceased());
        person.dod = Some("2020-01-03".to_string());
        assert!(person.is_deceased());
    }
}
