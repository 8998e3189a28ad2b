use std::collections::HashSet;
use std::fmt;

use crate::person::{Gender, Person};
use crate::query::person_by_id;

/// One problem found in a person collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub person_id: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    DuplicateId,
    DanglingMother(String),
    DanglingFather(String),
    MotherNotFemale(String),
    FatherNotMale(String),
    SelfParent,
    DanglingSpouse(String),
    AsymmetricSpouse(String),
    SelfSpouse,
    AncestryCycle,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.person_id)?;
        match &self.kind {
            IssueKind::DuplicateId => write!(f, "personId appears more than once"),
            IssueKind::DanglingMother(id) => {
                write!(f, "motherId '{id}' does not match any person")
            }
            IssueKind::DanglingFather(id) => {
                write!(f, "fatherId '{id}' does not match any person")
            }
            IssueKind::MotherNotFemale(id) => {
                write!(f, "mother '{id}' is not recorded as female")
            }
            IssueKind::FatherNotMale(id) => write!(f, "father '{id}' is not recorded as male"),
            IssueKind::SelfParent => write!(f, "person is listed as their own parent"),
            IssueKind::DanglingSpouse(id) => {
                write!(f, "spouse '{id}' does not match any person")
            }
            IssueKind::AsymmetricSpouse(id) => {
                write!(f, "spouse '{id}' does not link back")
            }
            IssueKind::SelfSpouse => write!(f, "person is listed as their own spouse"),
            IssueKind::AncestryCycle => write!(f, "ancestry loops back to this person"),
        }
    }
}

/// Scan a person collection for referential problems. Issues come back
/// grouped by person, in collection order. The checks only report;
/// nothing is repaired.
pub fn audit(people: &[Person]) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for person in people {
        let pid = person.person_id.as_str();
        let push = |kind: IssueKind, issues: &mut Vec<Issue>| {
            issues.push(Issue {
                person_id: pid.to_string(),
                kind,
            });
        };

        if !seen_ids.insert(pid) {
            push(IssueKind::DuplicateId, &mut issues);
        }

        if let Some(mother_id) = person.mother() {
            if mother_id == pid {
                push(IssueKind::SelfParent, &mut issues);
            } else {
                match person_by_id(mother_id, people) {
                    None => push(IssueKind::DanglingMother(mother_id.to_string()), &mut issues),
                    Some(mother) if mother.gender != Gender::Female => {
                        push(IssueKind::MotherNotFemale(mother_id.to_string()), &mut issues);
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(father_id) = person.father() {
            if father_id == pid {
                push(IssueKind::SelfParent, &mut issues);
            } else {
                match person_by_id(father_id, people) {
                    None => push(IssueKind::DanglingFather(father_id.to_string()), &mut issues),
                    Some(father) if father.gender != Gender::Male => {
                        push(IssueKind::FatherNotMale(father_id.to_string()), &mut issues);
                    }
                    Some(_) => {}
                }
            }
        }

        for link in &person.spouses {
            let spouse_id = link.spouse_id.trim();
            if spouse_id.is_empty() {
                continue;
            }
            if spouse_id == pid {
                push(IssueKind::SelfSpouse, &mut issues);
                continue;
            }
            match person_by_id(spouse_id, people) {
                None => push(IssueKind::DanglingSpouse(spouse_id.to_string()), &mut issues),
                Some(spouse) => {
                    if !spouse.spouses.iter().any(|l| l.spouse_id == pid) {
                        push(IssueKind::AsymmetricSpouse(spouse_id.to_string()), &mut issues);
                    }
                }
            }
        }

        if in_ancestry_cycle(person, people) {
            push(IssueKind::AncestryCycle, &mut issues);
        }
    }

    issues
}

/// Walk the parent graph upward from `start` and look for a path that
/// returns to it. The trivial self parent edge is excluded; it is
/// already reported on its own.
fn in_ancestry_cycle<'a>(start: &'a Person, people: &'a [Person]) -> bool {
    let mut stack: Vec<&Person> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for parent_id in [start.mother(), start.father()].into_iter().flatten() {
        if parent_id != start.person_id {
            if visited.insert(parent_id) {
                if let Some(parent) = person_by_id(parent_id, people) {
                    stack.push(parent);
                }
            }
        }
    }

    while let Some(person) = stack.pop() {
        for parent_id in [person.mother(), person.father()].into_iter().flatten() {
            if parent_id == start.person_id {
                return true;
            }
            if visited.insert(parent_id) {
                if let Some(parent) = person_by_id(parent_id, people) {
                    stack.push(parent);
                }
            }
        }
    }
    false
}
