//! Integration tests for record types declared in Rust
//!
//! Covers the full pipeline through the public API:
//! - Construction with transforms, validators and aggregated errors
//! - Nested records inside lists and maps
//! - Round-trips through mappings and JSON
//! - Aliases, exclusions, extra-field modes and computed fields
//! - Assignment after construction

use recast_core::value::mapping;
use recast_core::{
    AliasStyle, ComputedField, Config, Encoder, ExtraFieldsMode, Extras, Field, FieldKind,
    GlobalValidator, JsonOptions, ListSpec, MapSpec, Mapping, ROOT, Schema, Value, builtins,
};
use rstest::rstest;
use serde_json::json;

fn contact() -> Schema {
    Schema::builder("Contact")
        .field(
            Field::string("email")
                .transforms([builtins::trim(), builtins::lower()])
                .validate(builtins::email()),
        )
        .field(Field::int("age").validate(builtins::range(Some(0.0), Some(120.0))))
        .build()
        .unwrap()
}

fn address() -> Schema {
    Schema::builder("Address")
        .field(Field::string("street"))
        .field(Field::string("city").validate(builtins::non_empty()))
        .build()
        .unwrap()
}

fn employee(address: &Schema) -> Schema {
    Schema::builder("Employee")
        .config(Config::new().alias_style(AliasStyle::Camel))
        .field(Field::string("first_name"))
        .field(Field::string("last_name"))
        .field(Field::model("address", address).optional())
        .computed(ComputedField::new("full_name", |e| {
            let first = e.get("first_name").and_then(Value::as_str).unwrap_or_default();
            let last = e.get("last_name").and_then(Value::as_str).unwrap_or_default();
            Value::from(format!("{first} {last}"))
        }))
        .build()
        .unwrap()
}

fn company() -> Schema {
    let employee = employee(&address());
    Schema::builder("Company")
        .field(Field::string("name"))
        .field(Field::list(
            "employees",
            ListSpec::new()
                .item_type(FieldKind::Model(employee.clone()))
                .min_length(1),
        ))
        .field(
            Field::map("offices", MapSpec::new().value_type(FieldKind::Model(address())))
                .default(Value::Map(Mapping::new())),
        )
        .build()
        .unwrap()
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_contact_is_normalized_and_accepted() {
    let contact = contact()
        .construct(mapping(json!({"email": "  A@B.com  ", "age": 25})))
        .unwrap();
    assert_eq!(contact.get("email"), Some(&Value::from("a@b.com")));
    assert_eq!(contact.get("age"), Some(&Value::Int(25)));
}

#[test]
fn test_contact_with_bad_email_names_the_field() {
    let err = contact()
        .construct(mapping(json!({"email": "bad", "age": 25})))
        .unwrap_err();
    assert_eq!(err.model, "Contact");
    assert_eq!(err.fields(), vec!["email"]);
    assert!(err.to_string().contains("email: invalid email address"));
}

#[test]
fn test_reported_value_is_post_transform() {
    let err = contact()
        .construct(mapping(json!({"email": "  NOT-AN-EMAIL  ", "age": 25})))
        .unwrap_err();
    assert_eq!(err.find("email").unwrap().value, Value::from("not-an-email"));
}

#[rstest]
#[case::string_age(json!({"email": "a@b.com", "age": "42"}), 42)]
#[case::float_age(json!({"email": "a@b.com", "age": 42.9}), 42)]
fn test_age_is_coerced(#[case] raw: serde_json::Value, #[case] expected: i64) {
    let contact = contact().construct(mapping(raw)).unwrap();
    assert_eq!(contact.get("age"), Some(&Value::Int(expected)));
}

#[test]
fn test_every_failing_field_is_reported_together() {
    let err = contact()
        .construct(mapping(json!({"email": "bad", "age": "old"})))
        .unwrap_err();
    assert_eq!(err.len(), 2);
    assert_eq!(err.fields(), vec!["email", "age"]);
    assert_eq!(err.find("age").unwrap().message, "cannot convert \"old\" to int");
}

// =============================================================================
// Nested records
// =============================================================================

#[test]
fn test_list_of_nested_records() {
    let company = company()
        .construct(mapping(json!({
            "name": "Acme",
            "employees": [
                {"firstName": "Alice", "lastName": "A"},
                {"firstName": "Bob", "lastName": "B", "address": {"street": "1 Main", "city": "Oslo"}}
            ]
        })))
        .unwrap();
    let employees = company.get("employees").and_then(Value::as_list).unwrap();
    assert_eq!(employees.len(), 2);
    let bob = employees[1].as_model().unwrap();
    assert_eq!(bob.schema().name(), "Employee");
    assert_eq!(bob.computed("full_name"), Some(Value::from("Bob B")));
    let city = bob
        .get("address")
        .and_then(Value::as_model)
        .and_then(|a| a.get("city"))
        .cloned();
    assert_eq!(city, Some(Value::from("Oslo")));
}

#[test]
fn test_nested_failure_carries_index_bearing_path() {
    let err = company()
        .construct(mapping(json!({
            "name": "Acme",
            "employees": [
                {"firstName": "Alice", "lastName": "A"},
                {"firstName": "Bob", "lastName": "B", "address": {"street": "1 Main", "city": ""}}
            ],
            "offices": {"hq": {"street": "x"}}
        })))
        .unwrap_err();
    assert_eq!(
        err.fields(),
        vec!["employees[1].address.city", "offices['hq'].city"]
    );
}

#[test]
fn test_empty_list_violates_min_length() {
    let err = company()
        .construct(mapping(json!({"name": "Acme", "employees": []})))
        .unwrap_err();
    assert_eq!(err.fields(), vec!["employees"]);
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_mapping_round_trip_with_nested_records() {
    let schema = company();
    let original = schema
        .construct(mapping(json!({
            "name": "Acme",
            "employees": [{"firstName": "Alice", "lastName": "A", "address": {"street": "s", "city": "c"}}],
            "offices": {"hq": {"street": "s", "city": "c"}}
        })))
        .unwrap();
    let flattened = original.to_mapping();
    let employees = flattened["employees"].as_list().unwrap();
    assert_eq!(employees[0].as_map().unwrap()["fullName"], Value::from("Alice A"));

    let again = schema.from_mapping(flattened).unwrap();
    assert_eq!(again, original);
}

#[test]
fn test_json_round_trip_with_nested_records() {
    let schema = company();
    let original = schema
        .construct(mapping(json!({
            "name": "Acme",
            "employees": [{"firstName": "Alice", "lastName": "A"}]
        })))
        .unwrap();
    let text = original.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["employees"][0]["fullName"], "Alice A");
    assert_eq!(parsed["employees"][0]["address"], serde_json::Value::Null);

    assert_eq!(schema.from_json(&text).unwrap(), original);
}

// =============================================================================
// Aliases
// =============================================================================

#[test]
fn test_alias_and_declared_name_are_interchangeable() {
    let schema = employee(&address());
    let by_alias = schema
        .from_mapping(mapping(json!({"firstName": "A", "lastName": "B"})))
        .unwrap();
    let by_name = schema
        .from_mapping(mapping(json!({"first_name": "A", "last_name": "B"})))
        .unwrap();
    assert_eq!(by_alias, by_name);
}

#[rstest]
#[case::alias_first(json!({"firstName": "alias", "first_name": "name", "lastName": "B"}))]
#[case::name_first(json!({"first_name": "name", "firstName": "alias", "lastName": "B"}))]
fn test_alias_wins_when_both_are_supplied(#[case] raw: serde_json::Value) {
    let instance = employee(&address()).from_mapping(mapping(raw)).unwrap();
    assert_eq!(instance.get("first_name"), Some(&Value::from("alias")));
}

// =============================================================================
// Exclusions
// =============================================================================

#[test]
fn test_exclude_from_text_keeps_field_in_mapping() {
    let schema = Schema::builder("Account")
        .field(Field::string("login"))
        .field(Field::string("token").exclude_from_text())
        .field(Field::string("internal").exclude_from_structured())
        .field(Field::string("secret").exclude())
        .build()
        .unwrap();
    let account = schema
        .construct(mapping(json!({"login": "l", "token": "t", "internal": "i", "secret": "s"})))
        .unwrap();

    let structured = account.to_mapping();
    assert!(structured.contains_key("token"));
    assert!(!structured.contains_key("internal"));
    assert!(!structured.contains_key("secret"));

    let text: serde_json::Value = serde_json::from_str(&account.to_json().unwrap()).unwrap();
    assert!(text.get("token").is_none());
    assert_eq!(text["internal"], "i");
    assert!(text.get("secret").is_none());
}

#[test]
fn test_json_options_exclude_none_and_fields() {
    let schema = Schema::builder("Profile")
        .field(Field::string("name"))
        .field(Field::string("bio").optional())
        .build()
        .unwrap();
    let profile = schema.construct(mapping(json!({"name": "n"}))).unwrap();
    assert_eq!(profile.to_json().unwrap(), r#"{"name":"n","bio":null}"#);
    assert_eq!(
        profile
            .to_json_with(&JsonOptions::new().exclude_none())
            .unwrap(),
        r#"{"name":"n"}"#
    );
    assert_eq!(
        profile
            .to_json_with(&JsonOptions::new().exclude("name"))
            .unwrap(),
        r#"{"bio":null}"#
    );
}

// =============================================================================
// Extra fields and computed fields
// =============================================================================

#[test]
fn test_extra_fields_modes() {
    let build = |mode: ExtraFieldsMode| {
        Schema::builder("Event")
            .config(Config::new().extra_fields_mode(mode))
            .field(Field::string("kind"))
            .build()
            .unwrap()
    };
    let raw = mapping(json!({"kind": "click", "x": 1, "y": 2}));

    let stored = build(ExtraFieldsMode::Store).construct(raw.clone()).unwrap();
    assert_eq!(stored.extra("x"), Some(&Value::Int(1)));
    assert!(!stored.to_mapping().contains_key("x"));

    let err = build(ExtraFieldsMode::Strict).construct(raw.clone()).unwrap_err();
    assert_eq!(err.fields(), vec!["x", "y"]);

    let ignored = build(ExtraFieldsMode::Ignore).construct(raw).unwrap();
    assert_eq!(ignored.extras(), &Extras::Ignored);
}

#[test]
fn test_computed_field_is_output_only() {
    let strict = Schema::builder("Person")
        .config(Config::new().extra_fields_mode(ExtraFieldsMode::Strict))
        .field(Field::string("first_name"))
        .field(Field::string("last_name"))
        .computed(ComputedField::new("full_name", |p| {
            let first = p.get("first_name").and_then(Value::as_str).unwrap_or_default();
            let last = p.get("last_name").and_then(Value::as_str).unwrap_or_default();
            Value::from(format!("{first} {last}"))
        }))
        .build()
        .unwrap();
    let person = strict
        .construct(mapping(json!({"first_name": "Ada", "last_name": "L", "full_name": "ignored"})))
        .unwrap();
    assert_eq!(person.to_mapping()["full_name"], Value::from("Ada L"));

    let mut person = person;
    person.set("last_name", "Lovelace").unwrap();
    let json: serde_json::Value = serde_json::from_str(&person.to_json().unwrap()).unwrap();
    assert_eq!(json["full_name"], "Ada Lovelace");

    let err = person.set("full_name", "x").unwrap_err();
    assert_eq!(err.errors[0].message, "computed field 'full_name' is read-only");
}

// =============================================================================
// Config surface
// =============================================================================

#[test]
fn test_bulk_units_and_global_validators() {
    let schema = Schema::builder("Signup")
        .config(
            Config::new()
                .apply_transforms(["username", "email"], vec![builtins::trim(), builtins::lower()])
                .apply_validators(["username"], vec![builtins::min_length(3)])
                .global_validator(
                    GlobalValidator::check("distinct", |values| {
                        values.get("username") != values.get("email")
                    })
                    .message("username and email must differ"),
                ),
        )
        .field(Field::string("username"))
        .field(Field::string("email"))
        .build()
        .unwrap();

    let signup = schema
        .construct(mapping(json!({"username": "  Ada ", "email": " ADA@X.ORG"})))
        .unwrap();
    assert_eq!(signup.get("username"), Some(&Value::from("ada")));
    assert_eq!(signup.get("email"), Some(&Value::from("ada@x.org")));

    let err = schema
        .construct(mapping(json!({"username": " Al ", "email": "x@y.z"})))
        .unwrap_err();
    assert_eq!(err.fields(), vec!["username"]);

    let err = schema
        .construct(mapping(json!({"username": "same", "email": "SAME"})))
        .unwrap_err();
    assert_eq!(err.fields(), vec![ROOT]);
}

#[test]
fn test_schema_encoder_handles_nested_objects() {
    #[derive(Debug)]
    struct Money(i64);

    impl recast_core::CustomValue for Money {
        fn type_name(&self) -> &str {
            "Money"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    let schema = Schema::builder("Invoice")
        .config(Config::new().json_encoder(Encoder::new(|value| {
            value
                .as_object()
                .and_then(|o| o.as_any().downcast_ref::<Money>())
                .map(|m| Value::from(format!("{}.{:02} EUR", m.0 / 100, m.0 % 100)))
        })))
        .field(Field::any("total"))
        .build()
        .unwrap();
    let invoice = schema
        .construct(Mapping::from_iter([("total".to_string(), Value::object(Money(1999)))]))
        .unwrap();
    assert_eq!(invoice.to_json().unwrap(), r#"{"total":"19.99 EUR"}"#);
}
