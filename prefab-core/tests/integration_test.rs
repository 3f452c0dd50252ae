//! Integration tests for prefab-core

use prefab_core::*;
use std::sync::Arc;

fn resolver_for(configs: Vec<Config>, project_env_id: Option<i64>) -> Resolver {
    Resolver::new(Arc::new(MemoryConfigStore::from_configs(configs, project_env_id)))
}

fn string_value(found: &ConfigMatch) -> Option<String> {
    found
        .value
        .as_ref()
        .and_then(|v| v.as_str().map(String::from))
}

fn greeting() -> Config {
    Config::new(10, "greeting", ConfigType::Config)
        .with_value_type(ValueType::String)
        .with_row(ConfigRow::for_env(101, vec![ConditionalValue::always("hi")]))
        .with_row(ConfigRow::fallback(vec![ConditionalValue::always("hello")]))
}

#[test]
fn test_simple_string_lookup() {
    let resolver = resolver_for(vec![Config::constant(10, "greeting", "hello")], None);

    let found = resolver.resolve("greeting", &ContextSet::new()).unwrap();
    assert!(found.is_match);
    assert_eq!(string_value(&found).as_deref(), Some("hello"));
    assert_eq!(found.row_index, Some(0));
    assert_eq!(found.conditional_value_index, Some(0));
}

#[test]
fn test_env_aware_override() {
    let bound = resolver_for(vec![greeting()], Some(101));
    let found = bound.resolve("greeting", &ContextSet::new()).unwrap();
    assert_eq!(string_value(&found).as_deref(), Some("hi"));

    let other = resolver_for(vec![greeting()], Some(102));
    let found = other.resolve("greeting", &ContextSet::new()).unwrap();
    assert_eq!(string_value(&found).as_deref(), Some("hello"));
}

#[test]
fn test_ends_with_targeting() {
    let targeted = |operator| {
        Config::new(1, "internal", ConfigType::FeatureFlag).with_row(ConfigRow::fallback(vec![
            ConditionalValue::new(
                vec![Criterion::new(
                    operator,
                    "user.email",
                    ConfigValue::string_list(["example.com"]),
                )],
                true,
            ),
        ]))
    };
    let email = |address: &str| {
        ContextSet::new().with_context(Context::new("user").with("email", address))
    };

    let resolver = resolver_for(vec![targeted(Operator::PropEndsWithOneOf)], None);
    assert!(resolver.resolve("internal", &email("me@example.com")).unwrap().is_match);
    assert!(!resolver.resolve("internal", &email("me@other.com")).unwrap().is_match);
    assert!(!resolver.resolve("internal", &ContextSet::new()).unwrap().is_match);

    let negated = resolver_for(vec![targeted(Operator::PropDoesNotEndWithOneOf)], None);
    assert!(negated.resolve("internal", &ContextSet::new()).unwrap().is_match);
}

#[test]
fn test_weighted_bucketing() {
    let entry = |weight, letter: &str| WeightedValue {
        weight,
        value: ConfigValue::string(letter),
    };
    let weighted = WeightedValues::new(
        vec![entry(100, "A"), entry(50, "B"), entry(50, "C")],
        Some("user.id".to_string()),
    )
    .unwrap();
    let config = Config::new(1, "experiment", ConfigType::Config).with_row(ConfigRow::fallback(
        vec![ConditionalValue::always(ConfigValue::weighted(weighted))],
    ));
    let resolver = resolver_for(vec![config], None);
    let ctx = ContextSet::new().with_context(Context::new("user").with("id", "u1"));

    let first = resolver.resolve("experiment", &ctx).unwrap();
    for _ in 0..10 {
        let again = resolver.resolve("experiment", &ctx).unwrap();
        assert_eq!(again.weighted_value_index, first.weighted_value_index);
        assert_eq!(again.value, first.value);
    }

    assert_eq!(weighted::pick_index(&[100, 50, 50], 0.1), 0);
    assert_eq!(weighted::pick_index(&[100, 50, 50], 0.51), 1);
    assert_eq!(weighted::pick_index(&[100, 50, 50], 0.99), 2);
}

#[test]
fn test_segment_membership() {
    let segment = Config::new(20, "small-teams", ConfigType::Segment).with_row(
        ConfigRow::fallback(vec![
            ConditionalValue::new(
                vec![Criterion::new(
                    Operator::InIntRange,
                    "team.size",
                    ConfigValue::int_range(Some(0), Some(100)),
                )],
                true,
            ),
            ConditionalValue::always(false),
        ]),
    );
    let gated = |criterion: Criterion| {
        Config::new(21, "team-feature", ConfigType::FeatureFlag).with_row(ConfigRow::fallback(
            vec![
                ConditionalValue::new(vec![criterion], true),
                ConditionalValue::always(false),
            ],
        ))
    };
    let team = |size: i64| ContextSet::new().with_context(Context::new("team").with("size", size));
    let flag = |resolver: &Resolver, ctx: &ContextSet| {
        resolver
            .resolve("team-feature", ctx)
            .unwrap()
            .value
            .and_then(|v| v.as_bool())
    };

    let resolver = resolver_for(
        vec![segment, gated(Criterion::in_segment("small-teams"))],
        None,
    );
    assert_eq!(flag(&resolver, &team(10)), Some(true));
    assert_eq!(flag(&resolver, &team(1000)), Some(false));

    let missing_in = resolver_for(vec![gated(Criterion::in_segment("small-teams"))], None);
    assert_eq!(flag(&missing_in, &team(10)), Some(false));

    let missing_not_in =
        resolver_for(vec![gated(Criterion::not_in_segment("small-teams"))], None);
    assert_eq!(flag(&missing_not_in, &team(10)), Some(true));
}

#[test]
fn test_decrypted_secret() {
    let key = "e657e0406fc22e17d3145966396b2130d33dcb30ac0edd62a77235cdd01fc49d";
    let payload = AesGcmDecrypter::encrypt(key, "database-password", &[9u8; 12]).unwrap();
    let secret = Config::constant(
        1,
        "A",
        ConfigValue::string(payload).with_decrypt_with("secrets.key"),
    );

    let resolver = resolver_for(
        vec![secret.clone(), Config::constant(2, "secrets.key", key)],
        None,
    );
    let value = resolver
        .resolve("A", &ContextSet::new())
        .unwrap()
        .value
        .unwrap();
    assert_eq!(value.as_str(), Some("database-password"));
    assert!(value.confidential);
    assert!(!value.to_string().contains("database-password"));

    let broken = resolver_for(
        vec![secret, Config::constant(2, "secrets.key", "ff".repeat(32))],
        None,
    );
    assert!(matches!(
        broken.resolve("A", &ContextSet::new()),
        Err(PrefabError::DecryptionFailed(_))
    ));
}

#[test]
fn test_api_default_context_backs_caller_context() {
    let api = Arc::new(ApiConfigStore::new());
    api.set_from_snapshot(
        Snapshot::new(vec![Config::new(1, "plan-gate", ConfigType::FeatureFlag).with_row(
            ConfigRow::fallback(vec![
                ConditionalValue::new(
                    vec![Criterion::new(
                        Operator::PropIsOneOf,
                        "prefab.plan",
                        ConfigValue::string_list(["pro"]),
                    )],
                    true,
                ),
                ConditionalValue::always(false),
            ]),
        )])
        .with_default_context(
            ContextSet::new().with_context(Context::new("prefab").with("plan", "pro")),
        ),
    );
    let resolver = Resolver::new(api);

    let found = resolver.resolve("plan-gate", &ContextSet::new()).unwrap();
    assert_eq!(found.value.and_then(|v| v.as_bool()), Some(true));

    let overridden = ContextSet::new().with_context(Context::new("prefab").with("plan", "free"));
    let found = resolver.resolve("plan-gate", &overridden).unwrap();
    assert_eq!(found.value.and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn test_wire_snapshot_feeds_api_store() {
    let snapshot = Snapshot::new(vec![greeting(), Config::constant(11, "limit", 25i64)])
        .with_project_env_id(101);
    let decoded = Snapshot::decode(&snapshot.encode_to_vec()).unwrap();
    assert_eq!(decoded, snapshot);

    let api = Arc::new(ApiConfigStore::new());
    let outcome = api.set_from_snapshot(decoded);
    assert_eq!(outcome.updated, 2);
    assert_eq!(outcome.high_watermark, 11);

    let resolver = Resolver::new(api);
    let found = resolver.resolve("greeting", &ContextSet::new()).unwrap();
    assert_eq!(string_value(&found).as_deref(), Some("hi"));
}
