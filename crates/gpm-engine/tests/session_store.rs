mod common;

use common::{policy, KEY};
use gpm_admx::PolicyClass;
use gpm_engine::{
    parse_command_line, PolFile, PolicyAction, PolicyApartment, PolicySession, PolicySource,
    PolicyState, RegistryData,
};
use tempfile::TempDir;

#[test]
fn pol_files_persist_across_sessions() {
    let dir = TempDir::new().unwrap();
    let machine = dir.path().join("Machine").join("Registry.pol");
    let user = dir.path().join("User").join("Registry.pol");
    let limit = policy("Limit");
    let banner = policy("Banner");

    {
        let mut s = PolicySession::open_pol_files(&machine, &user, false).unwrap();
        let v = parse_command_line(&limit, PolicyClass::Machine, "Limit=42 LimitText=3").unwrap();
        s.enable(&limit, PolicyClass::Machine, &v).unwrap();
        s.disable(&banner, PolicyClass::User).unwrap();
        s.save().unwrap();
    }

    let pol = PolFile::open(&machine).unwrap();
    assert_eq!(pol.get_value(KEY, "Limit").unwrap(), Some(RegistryData::DWord(42)));
    assert_eq!(pol.get_value(KEY, "LimitText").unwrap(), Some(RegistryData::String("3".into())));

    let mut s = PolicySession::open_pol_files(&machine, &user, false).unwrap();
    assert_eq!(s.get_state(&limit, PolicyClass::Machine).unwrap(), PolicyState::Enabled);
    assert_eq!(s.get_state(&banner, PolicyClass::User).unwrap(), PolicyState::Disabled);
}

#[test]
fn discard_reverts_to_last_save() {
    let dir = TempDir::new().unwrap();
    let machine = dir.path().join("machine.pol");
    let user = dir.path().join("user.pol");
    let simple = policy("Simple");
    let servers = policy("Servers");

    let mut s = PolicySession::open_pol_files(&machine, &user, false).unwrap();
    s.disable(&simple, PolicyClass::Machine).unwrap();
    s.save().unwrap();
    s.disable(&servers, PolicyClass::Machine).unwrap();
    s.not_configure(&simple, PolicyClass::Machine).unwrap();

    s.discard().unwrap();
    assert_eq!(s.get_state(&simple, PolicyClass::Machine).unwrap(), PolicyState::Disabled);
    assert_eq!(s.get_state(&servers, PolicyClass::Machine).unwrap(), PolicyState::NotConfigured);
}

#[test]
fn dry_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let machine = dir.path().join("machine.pol");
    let user = dir.path().join("user.pol");
    let simple = policy("Simple");

    let mut s = PolicySession::open_pol_files(&machine, &user, true).unwrap();
    assert!(s.is_dry_run());
    s.apply(
        &simple,
        PolicyClass::Machine,
        &PolicyAction::Enable(gpm_engine::ElementValues::new(
            &simple,
            PolicyClass::Machine,
            gpm_engine::ValueSource::Edited,
        )),
    )
    .unwrap();
    assert_eq!(s.get_state(&simple, PolicyClass::Machine).unwrap(), PolicyState::NotConfigured);
    assert!(!s.source(PolicyClass::Machine).unwrap().key_exists(KEY).unwrap());
    s.save().unwrap();
    assert!(!machine.exists());
}

#[test]
fn actions_serialize_for_batch_files() {
    let json = serde_json::to_string(&PolicyAction::Disable).unwrap();
    let back: PolicyAction = serde_json::from_str(&json).unwrap();
    assert_eq!(back, PolicyAction::Disable);
}

#[tokio::test]
async fn apartment_drives_a_session_from_async_code() {
    let dir = TempDir::new().unwrap();
    let machine = dir.path().join("machine.pol");
    let user = dir.path().join("user.pol");
    let (m, u) = (machine.clone(), user.clone());

    let apartment = PolicyApartment::start(move || PolicySession::open_pol_files(m, u, false))
        .await
        .unwrap();

    let simple = policy("Simple");
    let state = apartment
        .run(move |s| {
            s.apply(&simple, PolicyClass::Machine, &PolicyAction::Disable)?;
            s.save()?;
            s.get_state(&simple, PolicyClass::Machine)
        })
        .await
        .unwrap();
    assert_eq!(state, PolicyState::Disabled);
    drop(apartment);

    let pol = PolFile::open(&machine).unwrap();
    assert!(pol.get_value(KEY, "**del.Simple").unwrap().is_some());
}
