use std::collections::HashSet;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::person::{Person, parse_person_date};

/// How [`siblings`] decides that two people are siblings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SiblingPolicy {
    /// Both parent ids must be present on both records and equal.
    #[default]
    FullOnly,
    /// Sharing either parent is enough.
    SharedParent,
}

pub fn person_by_id<'a>(person_id: &str, people: &'a [Person]) -> Option<&'a Person> {
    people.iter().find(|p| p.person_id == person_id)
}

/// Resolved parents, mother first. Unresolved ids are skipped.
pub fn parents<'a>(person: &Person, people: &'a [Person]) -> Vec<&'a Person> {
    let mut found = Vec::new();
    if let Some(id) = person.mother() {
        if let Some(mother) = person_by_id(id, people) {
            found.push(mother);
        }
    }
    if let Some(id) = person.father() {
        if let Some(father) = person_by_id(id, people) {
            found.push(father);
        }
    }
    found
}

/// Everyone whose mother or father slot points at `person_id`, in
/// collection order.
pub fn children<'a>(person_id: &str, people: &'a [Person]) -> Vec<&'a Person> {
    people
        .iter()
        .filter(|p| p.mother() == Some(person_id) || p.father() == Some(person_id))
        .collect()
}

/// Full siblings of `person` under the default policy.
pub fn siblings<'a>(person: &Person, people: &'a [Person]) -> Vec<&'a Person> {
    siblings_with_policy(person, people, SiblingPolicy::default())
}

pub fn siblings_with_policy<'a>(
    person: &Person,
    people: &'a [Person],
    policy: SiblingPolicy,
) -> Vec<&'a Person> {
    people
        .iter()
        .filter(|candidate| {
            if candidate.person_id == person.person_id {
                return false;
            }
            match policy {
                SiblingPolicy::FullOnly => {
                    let (Some(mother), Some(father)) = (person.mother(), person.father()) else {
                        return false;
                    };
                    candidate.mother() == Some(mother) && candidate.father() == Some(father)
                }
                SiblingPolicy::SharedParent => {
                    let shares_mother = matches!(
                        (person.mother(), candidate.mother()),
                        (Some(a), Some(b)) if a == b
                    );
                    let shares_father = matches!(
                        (person.father(), candidate.father()),
                        (Some(a), Some(b)) if a == b
                    );
                    shares_mother || shares_father
                }
            }
        })
        .collect()
}

/// Spouses resolved in link order. Links to unknown ids are skipped.
pub fn spouses<'a>(person: &Person, people: &'a [Person]) -> Vec<&'a Person> {
    person
        .spouses
        .iter()
        .filter_map(|link| person_by_id(&link.spouse_id, people))
        .collect()
}

/// Ancestors up to `depth` generations: parents first, then each
/// parent's own ancestors in turn. The list is not deduplicated, so a
/// person reachable along two lines appears twice.
pub fn ancestors<'a>(person: &Person, people: &'a [Person], depth: usize) -> Vec<&'a Person> {
    if depth == 0 {
        return Vec::new();
    }
    let direct = parents(person, people);
    let mut found = direct.clone();
    for parent in direct {
        found.extend(ancestors(parent, people, depth - 1));
    }
    found
}

/// Descendants up to `depth` generations, children first. Like
/// [`ancestors`] the list keeps duplicates.
pub fn descendants<'a>(person_id: &str, people: &'a [Person], depth: usize) -> Vec<&'a Person> {
    if person_id.is_empty() || depth == 0 {
        return Vec::new();
    }
    let direct = children(person_id, people);
    let mut found = direct.clone();
    for child in direct {
        found.extend(descendants(&child.person_id, people, depth - 1));
    }
    found
}

/// Age in completed years as of today, or as of the death date for the
/// deceased. `None` when the birth date is missing or unparseable.
pub fn calculate_age(dob: Option<&str>, dod: Option<&str>) -> Option<i32> {
    let end = dod
        .and_then(parse_person_date)
        .unwrap_or_else(|| Local::now().date_naive());
    calculate_age_on(dob, end)
}

/// Age in completed years on an explicit end date.
pub fn calculate_age_on(dob: Option<&str>, end: NaiveDate) -> Option<i32> {
    let birth = dob.and_then(parse_person_date)?;
    let mut age = end.year() - birth.year();
    if (end.month(), end.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    Some(age)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayEntry {
    pub person_id: String,
    pub name: String,
    pub dob: String,
    pub day: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnniversaryEntry {
    pub person_ids: [String; 2],
    pub couple: String,
    pub marriage_date: String,
    pub day: u32,
}

/// Birthdays falling in `month` (0 = January), or in the current month
/// when `month` is `None`. Sorted by day of month; people without a
/// parseable birth date are left out.
pub fn upcoming_birthdays(people: &[Person], month: Option<u32>) -> Vec<BirthdayEntry> {
    let month0 = month.unwrap_or_else(|| Local::now().date_naive().month0());
    upcoming_birthdays_in(people, month0)
}

pub fn upcoming_birthdays_in(people: &[Person], month0: u32) -> Vec<BirthdayEntry> {
    let mut entries: Vec<BirthdayEntry> = people
        .iter()
        .filter_map(|person| {
            let raw = person.dob.as_deref()?;
            let date = parse_person_date(raw)?;
            if date.month0() != month0 {
                return None;
            }
            Some(BirthdayEntry {
                person_id: person.person_id.clone(),
                name: person.full_name(),
                dob: raw.to_string(),
                day: date.day(),
            })
        })
        .collect();
    entries.sort_by_key(|entry| entry.day);
    entries
}

/// Wedding anniversaries falling in `month` (0 = January), one entry
/// per couple. The scan walks every spouse link, so a couple recorded
/// on both sides is reported once, from whichever link carries a usable
/// marriage date.
pub fn upcoming_anniversaries(people: &[Person], month: Option<u32>) -> Vec<AnniversaryEntry> {
    let month0 = month.unwrap_or_else(|| Local::now().date_naive().month0());
    upcoming_anniversaries_in(people, month0)
}

pub fn upcoming_anniversaries_in(people: &[Person], month0: u32) -> Vec<AnniversaryEntry> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut entries = Vec::new();

    for person in people {
        for link in &person.spouses {
            if link.spouse_id.is_empty() {
                continue;
            }
            let key = pair_key(&person.person_id, &link.spouse_id);
            if seen.contains(&key) {
                continue;
            }
            let Some(raw) = link.marriage_date.as_deref() else {
                continue;
            };
            let Some(date) = parse_person_date(raw) else {
                continue;
            };
            if date.month0() != month0 {
                continue;
            }
            let spouse_name = person_by_id(&link.spouse_id, people)
                .map(|spouse| spouse.full_name())
                .unwrap_or_else(|| link.spouse_id.clone());
            entries.push(AnniversaryEntry {
                person_ids: [person.person_id.clone(), link.spouse_id.clone()],
                couple: format!("{} & {}", person.full_name(), spouse_name),
                marriage_date: raw.to_string(),
                day: date.day(),
            });
            seen.insert(key);
        }
    }

    entries.sort_by_key(|entry| entry.day);
    entries
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::SpouseLink;

    fn person(id: &str, first: &str, mother: Option<&str>, father: Option<&str>) -> Person {
        Person {
            person_id: id.to_string(),
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            mother_id: mother.map(str::to_string),
            father_id: father.map(str::to_string),
            ..Person::default()
        }
    }

    fn family() -> Vec<Person> {
        vec![
            person("gm", "Grace", None, None),
            person("gf", "George", None, None),
            person("mom", "Jane", Some("gm"), Some("gf")),
            person("dad", "John", None, None),
            person("kid1", "Alex", Some("mom"), Some("dad")),
            person("kid2", "Emma", Some("mom"), Some("dad")),
            person("half", "Ryan", Some("mom"), None),
        ]
    }

    #[test]
    fn parents_resolve_mother_then_father() {
        let people = family();
        let kid = person_by_id("kid1", &people).unwrap();
        let found = parents(kid, &people);
        let ids: Vec<&str> = found.iter().map(|p| p.person_id.as_str()).collect();
        assert_eq!(ids, ["mom", "dad"]);
    }

    #[test]
    fn parents_skip_dangling_ids() {
        let people = vec![person("a", "A", Some("missing"), None)];
        assert!(parents(&people[0], &people).is_empty());
    }

    #[test]
    fn children_follow_collection_order() {
        let people = family();
        let ids: Vec<&str> = children("mom", &people)
            .iter()
            .map(|p| p.person_id.as_str())
            .collect();
        assert_eq!(ids, ["kid1", "kid2", "half"]);
    }

    #[test]
    fn siblings_default_requires_both_parents_shared() {
        let people = family();
        let kid = person_by_id("kid1", &people).unwrap();
        let ids: Vec<&str> = siblings(kid, &people)
            .iter()
            .map(|p| p.person_id.as_str())
            .collect();
        assert_eq!(ids, ["kid2"], "half sibling must not appear");
    }

    #[test]
    fn siblings_shared_parent_policy_includes_half_siblings() {
        let people = family();
        let kid = person_by_id("kid1", &people).unwrap();
        let ids: Vec<&str> =
            siblings_with_policy(kid, &people, SiblingPolicy::SharedParent)
                .iter()
                .map(|p| p.person_id.as_str())
                .collect();
        assert_eq!(ids, ["kid2", "half"]);
    }

    #[test]
    fn sibling_with_no_parents_has_no_siblings() {
        let people = family();
        let dad = person_by_id("dad", &people).unwrap();
        assert!(siblings(dad, &people).is_empty());
    }

    #[test]
    fn ancestors_walk_generation_by_generation() {
        let people = family();
        let kid = person_by_id("kid1", &people).unwrap();
        let ids: Vec<&str> = ancestors(kid, &people, 3)
            .iter()
            .map(|p| p.person_id.as_str())
            .collect();
        assert_eq!(ids, ["mom", "dad", "gm", "gf"]);
    }

    #[test]
    fn ancestors_depth_limits_the_walk() {
        let people = family();
        let kid = person_by_id("kid1", &people).unwrap();
        assert!(ancestors(kid, &people, 0).is_empty());
        let ids: Vec<&str> = ancestors(kid, &people, 1)
            .iter()
            .map(|p| p.person_id.as_str())
            .collect();
        assert_eq!(ids, ["mom", "dad"]);
    }

    #[test]
    fn ancestors_keep_duplicate_lines() {
        // kid's parents are cousins sharing a grandmother.
        let people = vec![
            person("shared", "Grace", None, None),
            person("mom", "Jane", Some("shared"), None),
            person("dad", "John", Some("shared"), None),
            person("kid", "Alex", Some("mom"), Some("dad")),
        ];
        let kid = person_by_id("kid", &people).unwrap();
        let ids: Vec<&str> = ancestors(kid, &people, 4)
            .iter()
            .map(|p| p.person_id.as_str())
            .collect();
        assert_eq!(ids, ["mom", "dad", "shared", "shared"]);
    }

    #[test]
    fn descendants_walk_children_first() {
        let people = family();
        let ids: Vec<&str> = descendants("gm", &people, 3)
            .iter()
            .map(|p| p.person_id.as_str())
            .collect();
        assert_eq!(ids, ["mom", "kid1", "kid2", "half"]);
    }

    #[test]
    fn age_counts_completed_years_only() {
        let end = NaiveDate::from_ymd_opt(2020, 5, 19).unwrap();
        assert_eq!(calculate_age_on(Some("1950-05-20"), end), Some(69));
        let end = NaiveDate::from_ymd_opt(2020, 5, 20).unwrap();
        assert_eq!(calculate_age_on(Some("1950-05-20"), end), Some(70));
    }

    #[test]
    fn age_is_none_without_a_parseable_birth_date() {
        let end = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(calculate_age_on(None, end), None);
        assert_eq!(calculate_age_on(Some("null"), end), None);
        assert_eq!(calculate_age_on(Some("garbage"), end), None);
    }

    #[test]
    fn age_uses_death_date_for_the_deceased() {
        assert_eq!(
            calculate_age(Some("1950-05-20"), Some("2000-05-19")),
            Some(49)
        );
        assert_eq!(
            calculate_age(Some("1950-05-20"), Some("2000-05-20")),
            Some(50)
        );
    }

    #[test]
    fn birthdays_filter_by_month_and_sort_by_day() {
        let mut people = family();
        people[4].dob = Some("2000-09-08".to_string());
        people[5].dob = Some("2003-09-02".to_string());
        people[6].dob = Some("2005-07-14".to_string());
        people[0].dob = Some("bad-date".to_string());

        let entries = upcoming_birthdays_in(&people, 8);
        let days: Vec<u32> = entries.iter().map(|e| e.day).collect();
        assert_eq!(days, [2, 8]);
        assert_eq!(entries[0].name, "Emma Doe");
        assert_eq!(entries[1].person_id, "kid1");
    }

    #[test]
    fn anniversaries_report_each_couple_once() {
        let mut people = family();
        let link = |id: &str, date: &str| SpouseLink {
            spouse_id: id.to_string(),
            marriage_date: Some(date.to_string()),
            divorce_date: None,
        };
        people[2].spouses = vec![link("dad", "1972-06-10")];
        people[3].spouses = vec![link("mom", "1972-06-10")];

        let entries = upcoming_anniversaries_in(&people, 5);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].couple, "Jane Doe & John Doe");
        assert_eq!(entries[0].day, 10);
    }

    #[test]
    fn anniversary_falls_back_to_the_reciprocal_link() {
        // The first link in scan order has no usable date; the couple
        // must still be reported from the other side.
        let mut people = family();
        people[2].spouses = vec![SpouseLink {
            spouse_id: "dad".to_string(),
            marriage_date: None,
            divorce_date: None,
        }];
        people[3].spouses = vec![SpouseLink {
            spouse_id: "mom".to_string(),
            marriage_date: Some("1972-06-10".to_string()),
            divorce_date: None,
        }];

        let entries = upcoming_anniversaries_in(&people, 5);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].person_ids, ["dad".to_string(), "mom".to_string()]);
    }

    #[test]
    fn anniversary_names_fall_back_to_the_raw_id() {
        let mut people = family();
        people[2].spouses = vec![SpouseLink {
            spouse_id: "stranger".to_string(),
            marriage_date: Some("1972-06-10".to_string()),
            divorce_date: None,
        }];
        let entries = upcoming_anniversaries_in(&people, 5);
        assert_eq!(entries[0].couple, "Jane Doe & stranger");
    }
}
