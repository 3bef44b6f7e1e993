//! End-to-end runs of the store through the query layer.

use lookback_core::query::{parse_script, run_script};
use lookback_core::{ScriptFormat, Store};

fn replies(store: &Store, script: &str) -> Vec<String> {
    let queries = parse_script(script, ScriptFormat::Auto).expect("script should parse");
    run_script(store, &queries)
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn user_age_lifecycle_json() {
    let script = r#"[
        ["SET", 1000, "user1", "age", "30"],
        ["SET", 1500, "user1", "age", "31"],
        ["LOOK_BACK", 1100, "user1", "age"],
        ["GET", 1600, "user1", "age"],
        ["COMPARE_AND_SET", 1700, "user1", "age", "31", "32"],
        ["GET", 1800, "user1", "age"],
        ["COMPARE_AND_DELETE", 1900, "user1", "age", "32"],
        ["GET", 2000, "user1", "age"]
    ]"#;

    let store = Store::new();
    assert_eq!(
        replies(&store, script),
        vec!["", "", "30", "31", "true", "32", "true", ""]
    );
    assert!(store.is_empty());
}

#[test]
fn user_age_lifecycle_text() {
    let script = "\
SET 1000 user1 age 30
SET 1500 user1 age 31
LOOK_BACK 1100 user1 age
GET 1600 user1 age
COMPARE_AND_SET 1700 user1 age 31 32
GET 1800 user1 age
COMPARE_AND_DELETE 1900 user1 age 32
GET 2000 user1 age
";

    let store = Store::new();
    assert_eq!(
        replies(&store, script),
        vec!["", "", "30", "31", "true", "32", "true", ""]
    );
}

#[test]
fn look_back_tracks_greatest_timestamp_at_or_before_bound() {
    let store = Store::new();
    for (ts, value) in [(10, "a"), (20, "b"), (20, "c"), (40, "d")] {
        store.set("k", "f", value, ts);
    }

    let expected = [
        (0, None),
        (9, None),
        (10, Some("a")),
        (19, Some("a")),
        (20, Some("c")),
        (39, Some("c")),
        (40, Some("d")),
        (1_000, Some("d")),
    ];
    for (past, want) in expected {
        assert_eq!(
            store.look_back("k", "f", past).as_deref(),
            want,
            "look_back at {}",
            past
        );
    }
}

#[test]
fn expiry_cutoff_and_look_back_asymmetry() {
    let store = Store::new();
    store.set("session", "token", "abc", 100);
    store.set("session", "user", "ann", 100);
    store.set_expiry("session", 500);

    // Before the cutoff everything is visible
    assert_eq!(store.get("session", "token", 499), Some("abc".to_string()));

    // Untouched past the cutoff, look_back still sees the record
    assert_eq!(store.look_back("session", "token", 600), Some("abc".to_string()));
    assert_eq!(store.len(), 1);

    // The first evicting operation at T >= E removes the whole key
    store.set("session", "token", "late", 500);
    assert_eq!(store.look_back("session", "token", 600), None);
    assert_eq!(store.look_back("session", "user", 600), None);
    assert!(store.is_empty());
    assert_eq!(store.expiry_of("session"), None);
}

#[test]
fn absent_expired_and_unset_are_indistinguishable() {
    let store = Store::new();
    store.set("present", "f", "v", 1);
    store.set("expired", "f", "v", 1);
    store.set_expiry("expired", 5);

    let never = store.get("never", "f", 10);
    let expired = store.get("expired", "f", 10);
    let unset = store.get("present", "other", 10);
    assert_eq!(never, None);
    assert_eq!(never, expired);
    assert_eq!(expired, unset);

    assert_eq!(
        store.compare_and_set("never", "f", "v", "w", 10),
        store.compare_and_set("present", "other", "v", "w", 10)
    );
}

#[test]
fn malformed_timestamp_fails_fast() {
    let err = parse_script("SET 1 k f v\nGET later k f", ScriptFormat::Text).unwrap_err();
    assert!(err.is_invalid_timestamp());
    assert_eq!(
        err.to_string(),
        "query 2: invalid timestamp `later`: expected a non-negative integer"
    );
}
