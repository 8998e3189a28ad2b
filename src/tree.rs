use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::person::{Gender, Person, SpouseLink};

/// One stored family tree: a little metadata plus the flat person
/// collection. Serializes to the camelCase document kept on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyTree {
    #[serde(default)]
    pub tree_id: String,
    #[serde(default)]
    pub tree_name: String,
    #[serde(default)]
    pub creator_email_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<String>,
    #[serde(default)]
    pub tree_data: Vec<Person>,
}

/// Partial update for one person. Absent fields keep their value; an
/// empty string in an optional slot clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub dod: Option<String>,
    #[serde(default)]
    pub mother_id: Option<String>,
    #[serde(default)]
    pub father_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseDates {
    #[serde(default, alias = "marriage")]
    pub marriage_date: Option<String>,
    #[serde(default)]
    pub divorce_date: Option<String>,
}

impl FamilyTree {
    pub fn person(&self, person_id: &str) -> Option<&Person> {
        self.tree_data.iter().find(|p| p.person_id == person_id)
    }

    pub fn person_mut(&mut self, person_id: &str) -> Option<&mut Person> {
        self.tree_data.iter_mut().find(|p| p.person_id == person_id)
    }

    /// Append a person to the collection. The id must be set and free.
    pub fn add_person(&mut self, person: Person) -> Result<()> {
        if person.person_id.trim().is_empty() {
            bail!("person must have a personId");
        }
        if self.person(&person.person_id).is_some() {
            bail!("person '{}' already exists", person.person_id);
        }
        self.tree_data.push(person);
        Ok(())
    }

    /// Merge `update` into an existing person. Returns `false` when the
    /// id does not match anyone.
    pub fn update_person(&mut self, person_id: &str, update: PersonUpdate) -> bool {
        let Some(person) = self.person_mut(person_id) else {
            return false;
        };
        if let Some(first_name) = update.first_name {
            person.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            person.last_name = last_name;
        }
        if let Some(gender) = update.gender {
            person.gender = gender;
        }
        set_opt(&mut person.dob, update.dob);
        set_opt(&mut person.dod, update.dod);
        set_opt(&mut person.mother_id, update.mother_id);
        set_opt(&mut person.father_id, update.father_id);
        set_opt(&mut person.address, update.address);
        set_opt(&mut person.occupation, update.occupation);
        set_opt(&mut person.location, update.location);
        set_opt(&mut person.notes, update.notes);
        true
    }

    /// Drop a person from the collection. Parent and spouse ids held by
    /// other people are left alone; the audit reports them as dangling.
    pub fn remove_person(&mut self, person_id: &str) -> bool {
        let before = self.tree_data.len();
        self.tree_data.retain(|p| p.person_id != person_id);
        self.tree_data.len() != before
    }

    /// Record a marriage on `person_id` and mirror it onto the spouse
    /// when that record exists.
    pub fn add_spouse(&mut self, person_id: &str, link: SpouseLink) -> bool {
        if self.person(person_id).is_none() {
            return false;
        }
        let spouse_id = link.spouse_id.clone();
        let reciprocal = SpouseLink {
            spouse_id: person_id.to_string(),
            marriage_date: link.marriage_date.clone(),
            divorce_date: link.divorce_date.clone(),
        };
        if let Some(person) = self.person_mut(person_id) {
            person.spouses.push(link);
        }
        if spouse_id != person_id {
            if let Some(spouse) = self.person_mut(&spouse_id) {
                spouse.spouses.push(reciprocal);
            }
        }
        true
    }

    /// Replace the dates on an existing marriage link, keeping the
    /// reciprocal link in step when present. Returns `false` when the
    /// person or the link is missing.
    pub fn update_spouse(&mut self, person_id: &str, spouse_id: &str, dates: SpouseDates) -> bool {
        let Some(person) = self.person_mut(person_id) else {
            return false;
        };
        let Some(link) = person.spouses.iter_mut().find(|l| l.spouse_id == spouse_id) else {
            return false;
        };
        link.marriage_date = dates.marriage_date.clone();
        link.divorce_date = dates.divorce_date.clone();

        if spouse_id != person_id {
            if let Some(spouse) = self.person_mut(spouse_id) {
                if let Some(reciprocal) =
                    spouse.spouses.iter_mut().find(|l| l.spouse_id == person_id)
                {
                    reciprocal.marriage_date = dates.marriage_date;
                    reciprocal.divorce_date = dates.divorce_date;
                }
            }
        }
        true
    }

    /// Remove a marriage link from both sides.
    pub fn remove_spouse(&mut self, person_id: &str, spouse_id: &str) -> bool {
        let Some(person) = self.person_mut(person_id) else {
            return false;
        };
        let before = person.spouses.len();
        person.spouses.retain(|l| l.spouse_id != spouse_id);
        let removed = person.spouses.len() != before;

        if removed && spouse_id != person_id {
            if let Some(spouse) = self.person_mut(spouse_id) {
                spouse.spouses.retain(|l| l.spouse_id != person_id);
            }
        }
        removed
    }

    pub fn new_person_id() -> String {
        format!("p{}", Uuid::new_v4().simple())
    }

    /// The single-person tree a fresh install starts from.
    pub fn starter() -> Self {
        Self {
            tree_data: vec![Person {
                person_id: "p1".to_string(),
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                gender: Gender::Male,
                dob: Some("1950-05-20".to_string()),
                address: Some("123 Main St, City".to_string()),
                notes: Some("Loved gardening".to_string()),
                ..Person::default()
            }],
            ..Self::default()
        }
    }

    /// A three generation demo family, used by `kintree new --sample`.
    pub fn sample() -> Self {
        let married = |id: &str, date: &str| {
            vec![SpouseLink {
                spouse_id: id.to_string(),
                marriage_date: Some(date.to_string()),
                divorce_date: None,
            }]
        };
        let person = |id: &str, first: &str, last: &str, gender: Gender| Person {
            person_id: id.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            gender,
            ..Person::default()
        };

        let mut john = person("p1", "John", "Doe", Gender::Male);
        john.dob = Some("1950-01-15".to_string());
        john.address = Some("123 Main St, City".to_string());
        john.notes = Some("Loved gardening".to_string());
        john.spouses = married("p2", "1972-06-10");

        let mut jane = person("p2", "Jane", "Doe", Gender::Female);
        jane.spouses = married("p1", "1972-06-10");

        let mut michael = person("p3", "Michael", "Doe", Gender::Male);
        michael.dob = Some("1975-06-20".to_string());
        michael.mother_id = Some("p2".to_string());
        michael.father_id = Some("p1".to_string());
        michael.spouses = married("p4", "1998-09-05");

        let mut sarah = person("p4", "Sarah", "Doe", Gender::Female);
        sarah.spouses = married("p3", "1998-09-05");

        let mut lisa = person("p5", "Lisa", "Smith", Gender::Female);
        lisa.dob = Some("1978-03-12".to_string());
        lisa.mother_id = Some("p2".to_string());
        lisa.father_id = Some("p1".to_string());
        lisa.spouses = married("p6", "2002-04-18");

        let mut david = person("p6", "David", "Smith", Gender::Male);
        david.spouses = married("p5", "2002-04-18");

        let mut alex = person("p7", "Alex", "Doe", Gender::Male);
        alex.dob = Some("2000-09-08".to_string());
        alex.mother_id = Some("p4".to_string());
        alex.father_id = Some("p3".to_string());

        let mut emma = person("p8", "Emma", "Doe", Gender::Female);
        emma.dob = Some("2003-12-25".to_string());
        emma.mother_id = Some("p4".to_string());
        emma.father_id = Some("p3".to_string());

        let mut ryan = person("p9", "Ryan", "Smith", Gender::Male);
        ryan.dob = Some("2005-07-14".to_string());
        ryan.mother_id = Some("p5".to_string());
        ryan.father_id = Some("p6".to_string());

        Self {
            tree_name: "Sample Family".to_string(),
            creator_email_id: "sample@example.com".to_string(),
            tree_data: vec![john, jane, michael, sarah, lisa, david, alex, emma, ryan],
            ..Self::default()
        }
    }
}

fn set_opt(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        if value.trim().is_empty() {
            *slot = None;
        } else {
            *slot = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_person_rejects_duplicate_ids() {
        let mut tree = FamilyTree::starter();
        let dup = Person {
            person_id: "p1".to_string(),
            ..Person::default()
        };
        assert!(tree.add_person(dup).is_err());
        assert_eq!(tree.tree_data.len(), 1);
    }

    #[test]
    fn add_person_requires_an_id() {
        let mut tree = FamilyTree::starter();
        assert!(tree.add_person(Person::default()).is_err());
    }

    #[test]
    fn update_person_merges_and_clears_fields() {
        let mut tree = FamilyTree::starter();
        let ok = tree.update_person(
            "p1",
            PersonUpdate {
                first_name: Some("Johnny".to_string()),
                notes: Some(String::new()),
                dod: Some("2020-01-03".to_string()),
                ..PersonUpdate::default()
            },
        );
        assert!(ok);
        let person = tree.person("p1").unwrap();
        assert_eq!(person.first_name, "Johnny");
        assert_eq!(person.last_name, "Doe", "untouched field survives");
        assert_eq!(person.notes, None, "empty string clears the field");
        assert_eq!(person.dod.as_deref(), Some("2020-01-03"));
    }

    #[test]
    fn update_person_misses_unknown_ids() {
        let mut tree = FamilyTree::starter();
        assert!(!tree.update_person("ghost", PersonUpdate::default()));
    }

    #[test]
    fn add_spouse_mirrors_the_link() {
        let mut tree = FamilyTree::starter();
        tree.add_person(Person {
            person_id: "p2".to_string(),
            first_name: "Jane".to_string(),
            ..Person::default()
        })
        .unwrap();

        let ok = tree.add_spouse(
            "p1",
            SpouseLink {
                spouse_id: "p2".to_string(),
                marriage_date: Some("1972-06-10".to_string()),
                divorce_date: None,
            },
        );
        assert!(ok);
        assert_eq!(tree.person("p1").unwrap().spouses[0].spouse_id, "p2");
        let reciprocal = &tree.person("p2").unwrap().spouses[0];
        assert_eq!(reciprocal.spouse_id, "p1");
        assert_eq!(reciprocal.marriage_date.as_deref(), Some("1972-06-10"));
    }

    #[test]
    fn add_spouse_tolerates_an_absent_spouse_record() {
        let mut tree = FamilyTree::starter();
        let ok = tree.add_spouse(
            "p1",
            SpouseLink {
                spouse_id: "elsewhere".to_string(),
                marriage_date: None,
                divorce_date: None,
            },
        );
        assert!(ok, "the owning side still records the link");
        assert_eq!(tree.person("p1").unwrap().spouses.len(), 1);
    }

    #[test]
    fn self_marriage_stores_a_single_link() {
        let mut tree = FamilyTree::starter();
        tree.add_spouse(
            "p1",
            SpouseLink {
                spouse_id: "p1".to_string(),
                marriage_date: None,
                divorce_date: None,
            },
        );
        assert_eq!(tree.person("p1").unwrap().spouses.len(), 1);
    }

    #[test]
    fn update_spouse_changes_both_sides() {
        let mut tree = FamilyTree::sample();
        let ok = tree.update_spouse(
            "p1",
            "p2",
            SpouseDates {
                marriage_date: Some("1973-01-01".to_string()),
                divorce_date: Some("1990-02-02".to_string()),
            },
        );
        assert!(ok);
        for (owner, other) in [("p1", "p2"), ("p2", "p1")] {
            let link = tree
                .person(owner)
                .unwrap()
                .spouses
                .iter()
                .find(|l| l.spouse_id == other)
                .unwrap();
            assert_eq!(link.marriage_date.as_deref(), Some("1973-01-01"));
            assert_eq!(link.divorce_date.as_deref(), Some("1990-02-02"));
        }
    }

    #[test]
    fn update_spouse_misses_absent_links() {
        let mut tree = FamilyTree::sample();
        assert!(!tree.update_spouse("p1", "p9", SpouseDates::default()));
    }

    #[test]
    fn remove_spouse_clears_both_sides() {
        let mut tree = FamilyTree::sample();
        assert!(tree.remove_spouse("p1", "p2"));
        assert!(tree.person("p1").unwrap().spouses.is_empty());
        assert!(tree.person("p2").unwrap().spouses.is_empty());
    }

    #[test]
    fn remove_person_leaves_references_behind() {
        let mut tree = FamilyTree::sample();
        assert!(tree.remove_person("p1"));
        assert!(tree.person("p1").is_none());
        // Children still point at the removed father.
        assert_eq!(
            tree.person("p3").unwrap().father_id.as_deref(),
            Some("p1")
        );
        assert!(!tree.remove_person("p1"), "second removal finds nothing");
    }

    #[test]
    fn generated_person_ids_are_unique_and_prefixed() {
        let a = FamilyTree::new_person_id();
        let b = FamilyTree::new_person_id();
        assert!(a.starts_with('p'));
        assert_ne!(a, b);
    }

    #[test]
    fn sample_family_is_consistent() {
        let tree = FamilyTree::sample();
        assert_eq!(tree.tree_data.len(), 9);
        assert!(crate::audit::audit(&tree.tree_data).is_empty());
    }
}
