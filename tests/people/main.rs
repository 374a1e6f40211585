//! Integration tests for the person list scenario.

mod person;

use person::PeopleApp;
use std::sync::{Arc, Mutex};

#[test]
fn seeded_people_are_listed() {
    let app = PeopleApp::new();
    assert_eq!(app.names(), vec!["Tim", "Ida", "Rob"]);
}

#[test]
fn create_person_adds_a_live_instance() {
    let app = PeopleApp::new();
    app.create_person("Ada");

    assert_eq!(app.names(), vec!["Tim", "Ida", "Rob", "Ada"]);
    let ada = app
        .persons
        .snapshot()
        .into_iter()
        .find(|person| person.personname == "Ada")
        .unwrap();
    let live = app.persons.get(&ada.id).unwrap();
    assert!(live.is_bound());
}

#[test]
fn change_person_updates_only_that_person() {
    let app = PeopleApp::new();
    let ids = app.persons.ids();

    app.change_person(&ids[1], "Ida Maria");

    assert_eq!(app.names(), vec!["Tim", "Ida Maria", "Rob"]);
}

#[test]
fn created_person_follows_later_changes() {
    let app = PeopleApp::new();
    app.create_person("Ada");
    let id = app.persons.ids().pop().unwrap();

    app.change_person(&id, "Ada L.");

    assert_eq!(app.persons.get(&id).unwrap().snapshot().personname, "Ada L.");
}

#[test]
fn creator_can_await_the_answer() {
    let app = PeopleApp::new();
    let answered = Arc::new(Mutex::new(None));

    let cmd = cqrs_hub::Command::new("createPerson", serde_json::json!({ "personname": "Bo" }))
        .with_new_id();
    let slot = Arc::clone(&answered);
    cmd.observe(app.router.registry(), move |event| {
        *slot.lock().unwrap() = event
            .get("payload.id")
            .and_then(|id| id.as_str())
            .map(str::to_string);
    })
    .unwrap();
    cmd.emit(app.router.hub()).unwrap();

    let id = answered.lock().unwrap().clone().unwrap();
    assert_eq!(app.persons.get(&id).unwrap().snapshot().personname, "Bo");
}

#[test]
fn removed_person_stops_receiving_changes() {
    let app = PeopleApp::new();
    let id = app.persons.ids()[0].clone();
    let tim = app.persons.remove(&id).unwrap();

    app.change_person(&id, "Timothy");

    assert_eq!(tim.snapshot().personname, "Tim");
    assert_eq!(app.names(), vec!["Ida", "Rob"]);
}
