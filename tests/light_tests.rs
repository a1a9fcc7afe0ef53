use std::sync::Arc;

use roomlight::lights::{LightActuator, LightBank, LightSource};

#[test]
fn test_bank_starts_off() {
    let bank = LightBank::new(["hall", "kitchen"]);
    assert_eq!(bank.channels(), vec!["hall".to_string(), "kitchen".to_string()]);
    assert!(bank.snapshot().values().all(|on| !on));
}

#[test]
fn test_set_light_is_idempotent() {
    let bank = LightBank::new(["hall"]);

    assert!(bank.set_light("hall", true, LightSource::Automation));
    assert!(bank.set_light("hall", true, LightSource::Automation));
    assert_eq!(bank.get_light_state("hall"), Some(true));

    assert!(bank.set_light("hall", false, LightSource::Button));
    assert_eq!(bank.get_light_state("hall"), Some(false));
}

#[test]
fn test_unknown_channel_is_not_a_fault() {
    let bank = LightBank::new(["hall"]);

    assert!(!bank.set_light("attic", true, LightSource::Web));
    assert_eq!(bank.get_light_state("attic"), None);
    assert_eq!(bank.toggle_light("attic", LightSource::Button), None);
    assert_eq!(bank.snapshot().len(), 1, "unknown channel is not created");
}

#[test]
fn test_toggle_and_bulk() {
    let bank = Arc::new(LightBank::new(["hall", "kitchen", "bedroom"]));

    assert_eq!(bank.toggle_light("kitchen", LightSource::Button), Some(true));
    assert_eq!(bank.toggle_light("kitchen", LightSource::Button), Some(false));

    bank.all_on(LightSource::Chat);
    assert!(bank.snapshot().values().all(|on| *on));

    // Through the shared handle as the state machines use it.
    let shared: Arc<LightBank> = Arc::clone(&bank);
    LightActuator::all_off(&shared, LightSource::System);
    assert!(bank.snapshot().values().all(|on| !on));
}

#[test]
fn test_source_tags() {
    assert_eq!(LightSource::Automation.to_string(), "automation");
    assert_eq!(serde_json::to_string(&LightSource::Button).unwrap(), "\"button\"");
}
