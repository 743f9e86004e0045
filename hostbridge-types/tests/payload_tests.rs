use hostbridge_types::Payload;
use serde_json::json;

#[test]
fn empty_payload() {
    let payload = Payload::new();
    assert!(payload.is_empty());
    assert_eq!(payload.len(), 0);
    assert_eq!(payload.get::<u32>("damage").unwrap(), None);
}

#[test]
fn put_and_get_typed() {
    let mut payload = Payload::new();
    payload.put("damage", 3u32).unwrap();
    payload.put("name", "Furnace").unwrap();

    assert_eq!(payload.get::<u32>("damage").unwrap(), Some(3));
    assert_eq!(payload.get::<String>("name").unwrap().as_deref(), Some("Furnace"));
    assert_eq!(payload.len(), 2);
}

#[test]
fn get_with_wrong_shape_is_an_error() {
    let payload = Payload::new().with("damage", "lots").unwrap();
    assert!(payload.get::<u32>("damage").is_err());
}

#[test]
fn put_replaces_previous_value() {
    let mut payload = Payload::new().with("damage", 1).unwrap();
    payload.put("damage", 2).unwrap();
    assert_eq!(payload.get_raw("damage"), Some(&json!(2)));
}

#[test]
fn remove_and_contains() {
    let mut payload = Payload::new().with("a", true).unwrap();
    assert!(payload.contains_key("a"));
    assert_eq!(payload.remove("a"), Some(json!(true)));
    assert!(!payload.contains_key("a"));
}

#[test]
fn merge_prefers_other() {
    let mut base = Payload::new().with("a", 1).unwrap().with("b", 1).unwrap();
    let other = Payload::new().with("b", 2).unwrap().with("c", 3).unwrap();
    base.merge(&other);

    assert_eq!(base.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    assert_eq!(base.get::<i32>("b").unwrap(), Some(2));
}

#[test]
fn payload_is_a_transparent_json_object() {
    let payload = Payload::new().with("damage", 5).unwrap();
    assert_eq!(serde_json::to_value(&payload).unwrap(), json!({"damage": 5}));
    let back: Payload = serde_json::from_value(json!({"damage": 5})).unwrap();
    assert_eq!(back, payload);
}
