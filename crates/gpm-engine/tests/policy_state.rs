mod common;

use common::{policy, KEY};
use gpm_admx::{ElementKind, PolicyClass};
use gpm_engine::action::{
    compile_all, evaluate, PolicyValueAction, PolicyValueDeleteType, Quantifier,
};
use gpm_engine::{
    parse_command_line, to_command_line, EngineError, ElementValue, ElementValues, GpoContext,
    MemoryPolicySource, PolicyJob, PolicySession, PolicySource, PolicyState, RegistryData,
    ValueSource,
};

fn session() -> PolicySession {
    PolicySession::in_memory()
}

fn edited(p: &gpm_admx::Policy, class: PolicyClass) -> ElementValues {
    ElementValues::new(p, class, ValueSource::Edited)
}

#[test]
fn simple_policy_cycles_through_states() {
    let p = policy("Simple");
    let mut s = session();
    let m = PolicyClass::Machine;

    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::NotConfigured);

    s.enable(&p, m, &edited(&p, m)).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);
    assert_eq!(
        s.source(m).unwrap().get_value(KEY, "Simple").unwrap(),
        Some(RegistryData::DWord(1))
    );

    s.disable(&p, m).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Disabled);
    let src = s.source(m).unwrap();
    assert_eq!(src.get_value(KEY, "Simple").unwrap(), None);
    assert_eq!(
        src.get_value(KEY, "**del.Simple").unwrap(),
        Some(RegistryData::String(" ".into()))
    );

    s.not_configure(&p, m).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::NotConfigured);
    assert!(s.source(m).unwrap().value_names(KEY).unwrap().is_empty());
}

#[test]
fn marker_counts_whatever_its_payload() {
    let p = policy("Simple");
    let mut machine = MemoryPolicySource::new();
    machine.create_key(KEY).unwrap();
    machine
        .set_value(KEY, "**del.Simple", RegistryData::String(String::new()))
        .unwrap();
    let mut s = PolicySession::new(Box::new(machine), Box::new(MemoryPolicySource::new()), false);
    assert_eq!(s.get_state(&p, PolicyClass::Machine).unwrap(), PolicyState::Disabled);
}

#[test]
fn decimal_element_writes_dword_and_text() {
    let p = policy("Limit");
    let m = PolicyClass::Machine;
    let mut s = session();

    let mut v = edited(&p, m);
    v.set(&p, "Limit", ElementValue::Decimal(42)).unwrap();
    assert!(matches!(s.enable(&p, m, &v), Err(EngineError::MissingElementValue { .. })));
    v.set(&p, "LimitText", ElementValue::Decimal(7)).unwrap();
    s.enable(&p, m, &v).unwrap();

    let src = s.source(m).unwrap();
    assert_eq!(src.get_value(KEY, "LimitOn").unwrap(), Some(RegistryData::DWord(1)));
    assert_eq!(src.get_value(KEY, "Limit").unwrap(), Some(RegistryData::DWord(42)));
    assert_eq!(src.get_value(KEY, "LimitText").unwrap(), Some(RegistryData::String("7".into())));
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);

    let back = s.get_values(&p, m).unwrap();
    assert_eq!(back.source, ValueSource::CurrentOnSystem);
    assert_eq!(back.get("Limit"), Some(&ElementValue::Decimal(42)));
    assert_eq!(back.get("LimitText"), Some(&ElementValue::Decimal(7)));

    s.disable(&p, m).unwrap();
    let src = s.source(m).unwrap();
    assert_eq!(src.get_value(KEY, "LimitOn").unwrap(), Some(RegistryData::DWord(0)));
    assert_eq!(src.get_value(KEY, "Limit").unwrap(), None);
    assert!(src.get_value(KEY, "**del.Limit").unwrap().is_some());
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Disabled);
}

#[test]
fn optional_decimal_may_be_left_blank() {
    let p = policy("Limit");
    let m = PolicyClass::Machine;
    let mut s = session();

    let mut v = edited(&p, m);
    v.set(&p, "LimitText", ElementValue::Decimal(7)).unwrap();
    s.enable(&p, m, &v).unwrap();

    let src = s.source(m).unwrap();
    assert_eq!(src.get_value(KEY, "LimitOn").unwrap(), Some(RegistryData::DWord(1)));
    assert_eq!(src.get_value(KEY, "Limit").unwrap(), None);
    assert_eq!(src.get_value(KEY, "**del.Limit").unwrap(), None);
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);

    let back = s.get_values(&p, m).unwrap();
    assert_eq!(back.get("Limit"), None);
    assert_eq!(back.get("LimitText"), Some(&ElementValue::Decimal(7)));

    s.not_configure(&p, m).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::NotConfigured);
}

#[test]
fn out_of_range_values_are_rejected_before_writing() {
    let p = policy("Limit");
    let m = PolicyClass::Machine;
    let mut s = session();
    let err = parse_command_line(&p, m, "Limit=101 LimitText=1").unwrap_err();
    assert!(matches!(err, EngineError::OutOfRange { .. }));

    let v = parse_command_line(&p, m, "Limit=100 LimitText=1").unwrap();
    s.enable(&p, m, &v).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);
}

#[test]
fn boolean_without_values_uses_defaults() {
    let p = policy("Checkbox");
    let u = PolicyClass::User;
    let box_key = format!(r"{KEY}\Box");
    let mut s = session();

    let mut v = edited(&p, u);
    v.set(&p, "Flag", ElementValue::Boolean(true)).unwrap();
    s.enable(&p, u, &v).unwrap();
    assert_eq!(
        s.source(u).unwrap().get_value(&box_key, "Flag").unwrap(),
        Some(RegistryData::DWord(1))
    );
    assert_eq!(s.get_state(&p, u).unwrap(), PolicyState::Enabled);
    assert_eq!(s.get_values(&p, u).unwrap().get("Flag"), Some(&ElementValue::Boolean(true)));

    s.disable(&p, u).unwrap();
    assert_eq!(s.source(u).unwrap().get_value(&box_key, "Flag").unwrap(), None);
    assert_eq!(s.get_state(&p, u).unwrap(), PolicyState::Disabled);

    s.not_configure(&p, u).unwrap();
    assert_eq!(s.get_state(&p, u).unwrap(), PolicyState::NotConfigured);
}

#[test]
fn boolean_with_both_footprints_is_suspect() {
    let p = policy("Checkbox");
    let box_key = format!(r"{KEY}\Box");
    let mut user = MemoryPolicySource::new();
    user.create_key(&box_key).unwrap();
    user.set_value(&box_key, "Flag", RegistryData::DWord(1)).unwrap();
    user.set_value(&box_key, "**del.Flag", RegistryData::String(" ".into())).unwrap();
    let mut s = PolicySession::new(Box::new(MemoryPolicySource::new()), Box::new(user), false);
    assert_eq!(s.get_state(&p, PolicyClass::User).unwrap(), PolicyState::Suspect);
}

#[test]
fn enum_switches_items_cleanly() {
    let p = policy("Mode");
    let mode_key = format!(r"{KEY}\Mode");
    let m = PolicyClass::Machine;
    let mut s = session();

    let mut v = edited(&p, m);
    v.set(&p, "Mode", ElementValue::Enum(0)).unwrap();
    s.enable(&p, m, &v).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);
    assert_eq!(
        s.source(m).unwrap().get_value(&mode_key, "Extra").unwrap(),
        Some(RegistryData::String("fast".into()))
    );
    assert_eq!(s.get_values(&p, m).unwrap().get("Mode"), Some(&ElementValue::Enum(0)));

    v.set(&p, "Mode", ElementValue::Enum(1)).unwrap();
    s.enable(&p, m, &v).unwrap();
    let src = s.source(m).unwrap();
    assert_eq!(src.get_value(&mode_key, "Mode").unwrap(), Some(RegistryData::DWord(2)));
    assert_eq!(src.get_value(&mode_key, "Extra").unwrap(), None);
    assert_eq!(s.get_values(&p, m).unwrap().get("Mode"), Some(&ElementValue::Enum(1)));

    // The user hive is independent.
    assert_eq!(s.get_state(&p, PolicyClass::User).unwrap(), PolicyState::NotConfigured);

    s.disable(&p, m).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Disabled);
}

#[test]
fn enum_with_unknown_value_is_suspect() {
    let p = policy("Mode");
    let mode_key = format!(r"{KEY}\Mode");
    let mut machine = MemoryPolicySource::new();
    machine.create_key(&mode_key).unwrap();
    machine.set_value(&mode_key, "Mode", RegistryData::DWord(9)).unwrap();
    let mut s = PolicySession::new(Box::new(machine), Box::new(MemoryPolicySource::new()), false);
    assert_eq!(s.get_state(&p, PolicyClass::Machine).unwrap(), PolicyState::Suspect);
    assert_eq!(s.get_values(&p, PolicyClass::Machine).unwrap().get("Mode"), None);
}

#[test]
fn enum_item_leaves_other_items_unmatched() {
    let p = policy("Route");
    let m = PolicyClass::Machine;
    let items = match &p.element("Route").unwrap().kind {
        ElementKind::Enum(e) => e.items.clone(),
        other => panic!("unexpected element kind {other:?}"),
    };
    let job = PolicyJob::new(&p, m).unwrap();
    let mut src = MemoryPolicySource::new();

    for chosen in 0..items.len() {
        let mut ctx = GpoContext::new(&mut src, m, false).unwrap();
        let mut v = edited(&p, m);
        v.set(&p, "Route", ElementValue::Enum(chosen)).unwrap();
        job.enable(&mut ctx, &v).unwrap();
        assert_eq!(job.state(&mut ctx).unwrap(), PolicyState::Enabled);

        for (i, item) in items.iter().enumerate() {
            let checks = compile_all(
                &item.values,
                PolicyValueAction::ValueShouldExist,
                PolicyValueDeleteType::Value,
            );
            assert_eq!(
                evaluate(&checks, Quantifier::All, &mut ctx).unwrap(),
                i == chosen,
                "item {i} after enabling item {chosen}"
            );
        }
    }
}

#[test]
fn enum_with_two_item_footprints_is_suspect() {
    let p = policy("Route");
    let key = format!(r"{KEY}\Route");
    let mut machine = MemoryPolicySource::new();
    machine.create_key(&key).unwrap();
    machine.set_value(&key, "Route", RegistryData::DWord(1)).unwrap();
    machine.set_value(&key, "Direct", RegistryData::DWord(1)).unwrap();
    machine
        .set_value(&key, "Proxy", RegistryData::String("proxy.contoso.com".into()))
        .unwrap();
    let mut s = PolicySession::new(Box::new(machine), Box::new(MemoryPolicySource::new()), false);
    assert_eq!(s.get_state(&p, PolicyClass::Machine).unwrap(), PolicyState::Suspect);
    assert_eq!(s.get_values(&p, PolicyClass::Machine).unwrap().get("Route"), None);
}

#[test]
fn boolean_enabled_false_reads_back_disabled() {
    let p = policy("Checkbox");
    let u = PolicyClass::User;
    let box_key = format!(r"{KEY}\Box");
    let mut s = session();

    let mut v = edited(&p, u);
    v.set(&p, "Flag", ElementValue::Boolean(false)).unwrap();
    s.enable(&p, u, &v).unwrap();

    let src = s.source(u).unwrap();
    assert_eq!(src.get_value(&box_key, "Flag").unwrap(), None);
    assert!(src.get_value(&box_key, "**del.Flag").unwrap().is_some());
    assert_eq!(s.get_state(&p, u).unwrap(), PolicyState::Disabled);
    assert_eq!(s.get_values(&p, u).unwrap().get("Flag"), Some(&ElementValue::Boolean(false)));
}

#[test]
fn both_class_is_never_an_operating_class() {
    let p = policy("Mode");
    let mut s = session();
    assert!(matches!(s.get_state(&p, PolicyClass::Both), Err(EngineError::InvalidClass)));
    assert!(matches!(s.disable(&p, PolicyClass::Both), Err(EngineError::InvalidClass)));

    let machine_only = policy("Simple");
    assert!(matches!(
        s.get_state(&machine_only, PolicyClass::User),
        Err(EngineError::ClassNotApplicable { .. })
    ));
}

#[test]
fn replace_list_clears_before_writing() {
    let p = policy("Servers");
    let key = format!(r"{KEY}\Servers");
    let m = PolicyClass::Machine;
    let mut s = session();

    let mut v = edited(&p, m);
    v.set(&p, "Servers", ElementValue::List(vec!["a".into(), "b".into()])).unwrap();
    s.enable(&p, m, &v).unwrap();
    v.set(&p, "Servers", ElementValue::List(vec!["c".into()])).unwrap();
    s.enable(&p, m, &v).unwrap();

    let names = s.source(m).unwrap().value_names(&key).unwrap();
    assert_eq!(names, vec!["**delvals.".to_string(), "c".to_string()]);
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);
    assert_eq!(
        s.get_values(&p, m).unwrap().get("Servers"),
        Some(&ElementValue::List(vec!["c".into()]))
    );

    s.disable(&p, m).unwrap();
    let names = s.source(m).unwrap().value_names(&key).unwrap();
    assert_eq!(names, vec!["**delvals.".to_string()]);
    // A replace list enabled empty leaves the same footprint.
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Disabled);
}

#[test]
fn list_has_no_value_unless_enabled() {
    let p = policy("Servers");
    let key = format!(r"{KEY}\Servers");
    let m = PolicyClass::Machine;
    let mut s = session();

    assert_eq!(s.get_values(&p, m).unwrap().get("Servers"), None);

    let mut v = edited(&p, m);
    v.set(&p, "Servers", ElementValue::List(vec!["a".into()])).unwrap();
    s.enable(&p, m, &v).unwrap();
    s.disable(&p, m).unwrap();
    let back = s.get_values(&p, m).unwrap();
    assert_eq!(back.get("Servers"), None);
    assert_eq!(to_command_line(&p, &back), "");

    s.enable(&p, m, &v).unwrap();
    s.not_configure(&p, m).unwrap();
    assert!(s.source(m).unwrap().value_names(&key).unwrap().is_empty());
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::NotConfigured);
    assert_eq!(s.get_values(&p, m).unwrap().get("Servers"), None);
}

#[test]
fn additive_list_writes_prefixed_names_without_clearing() {
    let p = policy("Extras");
    let key = format!(r"{KEY}\Extras");
    let m = PolicyClass::Machine;
    let mut s = session();

    let mut v = edited(&p, m);
    v.set(&p, "Extras", ElementValue::List(vec!["a".into(), "b".into()])).unwrap();
    s.enable(&p, m, &v).unwrap();
    s.enable(&p, m, &v).unwrap();

    let src = s.source(m).unwrap();
    assert_eq!(src.get_value(&key, "**delvals.").unwrap(), None);
    assert_eq!(src.get_value(&key, "Item1").unwrap(), Some(RegistryData::String("a".into())));
    assert_eq!(src.get_value(&key, "Item2").unwrap(), Some(RegistryData::String("b".into())));
    assert_eq!(src.get_value(&key, "ExtrasOn").unwrap(), Some(RegistryData::DWord(1)));
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);
    assert_eq!(
        s.get_values(&p, m).unwrap().get("Extras"),
        Some(&ElementValue::List(vec!["a".into(), "b".into()]))
    );

    s.disable(&p, m).unwrap();
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Disabled);
    // The policy's own value is not part of the list.
    assert!(s.source(m).unwrap().get_value(&key, "**del.ExtrasOn").unwrap().is_some());
}

#[test]
fn additive_list_with_clear_marker_and_entries_is_suspect() {
    let p = policy("Extras");
    let key = format!(r"{KEY}\Extras");
    let mut machine = MemoryPolicySource::new();
    machine.create_key(&key).unwrap();
    machine.set_value(&key, "ExtrasOn", RegistryData::DWord(1)).unwrap();
    machine.set_value(&key, "**delvals.", RegistryData::String(" ".into())).unwrap();
    machine.set_value(&key, "Item1", RegistryData::String("a".into())).unwrap();
    let mut s = PolicySession::new(Box::new(machine), Box::new(MemoryPolicySource::new()), false);
    assert_eq!(s.get_state(&p, PolicyClass::Machine).unwrap(), PolicyState::Suspect);
}

#[test]
fn explicit_list_stores_pairs() {
    let p = policy("Pairs");
    let key = format!(r"{KEY}\Pairs");
    let m = PolicyClass::Machine;
    let mut s = session();

    let v = parse_command_line(&p, m, r#"Pairs=alpha=one,beta="%TEMP% dir""#).unwrap();
    s.enable(&p, m, &v).unwrap();
    let src = s.source(m).unwrap();
    assert_eq!(
        src.get_value(&key, "alpha").unwrap(),
        Some(RegistryData::ExpandString("one".into()))
    );
    assert_eq!(
        src.get_value(&key, "beta").unwrap(),
        Some(RegistryData::ExpandString("%TEMP% dir".into()))
    );
    assert_eq!(s.get_values(&p, m).unwrap().get("Pairs"), v.get("Pairs"));
    assert_eq!(s.get_state(&p, m).unwrap(), PolicyState::Enabled);
}

#[test]
fn optional_text_may_be_omitted() {
    let p = policy("Banner");
    let key = format!(r"{KEY}\Banner");
    let u = PolicyClass::User;
    let mut s = session();

    let empty = edited(&p, u);
    assert!(matches!(
        s.enable(&p, u, &empty),
        Err(EngineError::MissingElementValue { element, .. }) if element == "Message"
    ));

    let v = parse_command_line(&p, u, r#"Message="Hello %USERNAME%""#).unwrap();
    s.enable(&p, u, &v).unwrap();
    let src = s.source(u).unwrap();
    assert_eq!(
        src.get_value(&key, "Message").unwrap(),
        Some(RegistryData::ExpandString("Hello %USERNAME%".into()))
    );
    assert_eq!(src.get_value(&key, "Lines").unwrap(), Some(RegistryData::MultiString(vec![])));
    assert_eq!(s.get_state(&p, u).unwrap(), PolicyState::Enabled);

    s.disable(&p, u).unwrap();
    assert_eq!(s.get_state(&p, u).unwrap(), PolicyState::Disabled);
}
