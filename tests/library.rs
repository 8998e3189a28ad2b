use anyhow::Result;
use chrono::NaiveDate;
use kintree::store::{NewTree, StoreError, TreeStore};
use kintree::tree::FamilyTree;
use kintree::{
    LayoutConfig, Person, SpouseLink, TreeLayout, ancestors, calculate_age_on, children, parents,
    render_svg, siblings, spouses, upcoming_anniversaries_in, upcoming_birthdays_in,
};
use tempfile::tempdir;

fn person(id: &str, first: &str, last: &str, dob: &str) -> Person {
    Person {
        person_id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        dob: Some(dob.to_string()),
        ..Person::default()
    }
}

fn three_generations() -> Vec<Person> {
    let mut grandpa = person("g1", "Arthur", "Hale", "1940-02-11");
    let mut grandma = person("g2", "Iris", "Hale", "1943-07-30");
    grandpa.spouses.push(SpouseLink {
        spouse_id: "g2".to_string(),
        marriage_date: Some("1962-06-09".to_string()),
        divorce_date: None,
    });
    grandma.spouses.push(SpouseLink {
        spouse_id: "g1".to_string(),
        marriage_date: Some("1962-06-09".to_string()),
        divorce_date: None,
    });

    let mut father = person("f1", "Tom", "Hale", "1965-03-18");
    father.mother_id = Some("g2".to_string());
    father.father_id = Some("g1".to_string());

    let mut aunt = person("f2", "Ruth", "Hale", "1968-11-02");
    aunt.mother_id = Some("g2".to_string());
    aunt.father_id = Some("g1".to_string());

    let mother = person("m1", "Dana", "Hale", "1967-09-25");

    let mut child = person("c1", "Evie", "Hale", "1995-03-05");
    child.mother_id = Some("m1".to_string());
    child.father_id = Some("f1".to_string());

    vec![grandpa, grandma, father, aunt, mother, child]
}

#[test]
fn relationship_queries_walk_three_generations() {
    let people = three_generations();

    let child = &people[5];
    let parent_ids: Vec<&str> = parents(child, &people)
        .iter()
        .map(|p| p.person_id.as_str())
        .collect();
    assert_eq!(
        parent_ids,
        vec!["m1", "f1"],
        "mother should come before father"
    );

    let father = &people[2];
    let child_ids: Vec<&str> = children(&father.person_id, &people)
        .iter()
        .map(|p| p.person_id.as_str())
        .collect();
    assert_eq!(child_ids, vec!["c1"]);

    let sibling_ids: Vec<&str> = siblings(father, &people)
        .iter()
        .map(|p| p.person_id.as_str())
        .collect();
    assert_eq!(sibling_ids, vec!["f2"]);

    let spouse_ids: Vec<&str> = spouses(&people[0], &people)
        .iter()
        .map(|p| p.person_id.as_str())
        .collect();
    assert_eq!(spouse_ids, vec!["g2"]);

    let ancestor_ids: Vec<&str> = ancestors(child, &people, 2)
        .iter()
        .map(|p| p.person_id.as_str())
        .collect();
    assert_eq!(
        ancestor_ids,
        vec!["m1", "f1", "g2", "g1"],
        "parents first, then each parent's own parents"
    );
}

#[test]
fn age_counts_completed_years_only() {
    let day_before = NaiveDate::from_ymd_opt(2020, 6, 14).unwrap();
    let birthday = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
    assert_eq!(calculate_age_on(Some("1990-06-15"), day_before), Some(29));
    assert_eq!(calculate_age_on(Some("1990-06-15"), birthday), Some(30));
    assert_eq!(calculate_age_on(Some("not-a-date"), birthday), None);
}

#[test]
fn layout_and_render_produce_a_complete_svg() -> Result<()> {
    let people = three_generations();
    let layout = TreeLayout::compute("c1", &people, &LayoutConfig::default());

    assert_eq!(
        layout.nodes.len(),
        5,
        "center, both parents and the paternal grandparents; the aunt is neither ancestor nor descendant"
    );
    assert!(
        layout.links.iter().any(|link| link.child_id == "c1"),
        "center person should be linked to a parent"
    );

    let svg = render_svg(&layout, "c1", "#ffffff")?;
    assert!(svg.contains("<svg"), "output should be an svg document");
    assert!(svg.ends_with("</svg>\n"), "svg should be closed");
    assert!(svg.contains("Evie Hale"), "names should appear in output");

    Ok(())
}

#[test]
fn month_events_cover_birthdays_and_anniversaries() {
    let people = three_generations();

    let march = upcoming_birthdays_in(&people, 2);
    let names: Vec<&str> = march.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["Evie Hale", "Tom Hale"], "sorted by day of month");

    let june = upcoming_anniversaries_in(&people, 5);
    assert_eq!(june.len(), 1, "a couple should be reported once");
    assert_eq!(june[0].couple, "Arthur Hale & Iris Hale");
    assert_eq!(june[0].day, 9);
}

#[test]
fn store_round_trips_a_tree_on_disk() -> Result<()> {
    let tmp = tempdir()?;
    let store = TreeStore::open(tmp.path())?;

    let created = store.create(NewTree {
        tree_name: "Hale Family".to_string(),
        creator_email_id: "iris@example.com".to_string(),
        tree_data: three_generations(),
    })?;
    assert_eq!(created.tree_id, "tree_10000");
    assert!(created.create_date.is_some(), "create date should be set");

    let loaded = store.load(&created.tree_id)?;
    assert_eq!(loaded.tree_name, "Hale Family");
    assert_eq!(loaded.tree_data.len(), 6);

    let summaries = store.list()?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].member_count, 6);

    match store.load("tree_99999") {
        Err(StoreError::NotFound(id)) => assert_eq!(id, "tree_99999"),
        other => panic!("expected NotFound, got {other:?}"),
    }

    Ok(())
}

#[test]
fn sample_tree_survives_mutation_and_reserialization() -> Result<()> {
    let mut tree = FamilyTree::sample();
    let count = tree.tree_data.len();

    let new_id = FamilyTree::new_person_id();
    tree.add_person(Person {
        person_id: new_id.clone(),
        first_name: "Noah".to_string(),
        last_name: "Doe".to_string(),
        mother_id: Some("p4".to_string()),
        father_id: Some("p3".to_string()),
        ..Person::default()
    })?;
    assert!(tree.add_spouse(
        &new_id,
        SpouseLink {
            spouse_id: "p9".to_string(),
            marriage_date: Some("2024-05-11".to_string()),
            divorce_date: None,
        },
    ));

    let json = serde_json::to_string(&tree)?;
    let reparsed: FamilyTree = serde_json::from_str(&json)?;
    assert_eq!(reparsed.tree_data.len(), count + 1);
    assert!(
        kintree::audit(&reparsed.tree_data).is_empty(),
        "mutated sample tree should stay consistent"
    );

    Ok(())
}
