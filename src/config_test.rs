use std::sync::Mutex;

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK`, so no other test in this binary touches these vars.
unsafe fn clear_env() {
    unsafe {
        std::env::remove_var(ENV_TOKEN);
        std::env::remove_var(ENV_HOST);
        std::env::remove_var(ENV_PORT);
    }
}

#[test]
fn ws_uri_uses_host_port_and_notifications_path() {
    let params = ConnectionParams::new("jwt", "10.0.0.5", 9000);
    assert_eq!(params.ws_uri(), "ws://10.0.0.5:9000/notifications/websocket");
}

#[test]
fn authorization_is_bearer_token() {
    let params = ConnectionParams::new("abc.def.ghi", DEFAULT_HOST, DEFAULT_PORT);
    assert_eq!(params.authorization(), "Bearer abc.def.ghi");
}

#[test]
fn debug_output_redacts_token() {
    let params = ConnectionParams::new("super-secret", "localhost", 1);
    let rendered = format!("{params:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("localhost"));
}

#[test]
fn default_subscription_targets_alert_queue() {
    let sub = Subscription::default();
    assert_eq!(sub.destination, "/user/queue/alert");
    assert_eq!(sub.id, "MyuniqueId");
    assert_eq!(sub.ack, AckMode::Auto);
}

#[test]
fn from_env_applies_defaults() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    unsafe {
        clear_env();
        std::env::set_var(ENV_TOKEN, "token-1");
    }

    let params = ConnectionParams::from_env().expect("config");
    assert_eq!(params.host(), DEFAULT_HOST);
    assert_eq!(params.port(), DEFAULT_PORT);
    assert_eq!(params.authorization(), "Bearer token-1");

    unsafe { clear_env() };
}

#[test]
fn from_env_reads_overrides() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    unsafe {
        clear_env();
        std::env::set_var(ENV_TOKEN, "token-2");
        std::env::set_var(ENV_HOST, "pc.example.test");
        std::env::set_var(ENV_PORT, " 9443 ");
    }

    let params = ConnectionParams::from_env().expect("config");
    assert_eq!(params.ws_uri(), "ws://pc.example.test:9443/notifications/websocket");

    unsafe { clear_env() };
}

#[test]
fn from_env_requires_token() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    unsafe { clear_env() };

    let err = ConnectionParams::from_env().expect_err("token should be required");
    assert!(matches!(err, ConfigError::MissingVar(ENV_TOKEN)));
}

#[test]
fn from_env_rejects_bad_port() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    unsafe {
        clear_env();
        std::env::set_var(ENV_TOKEN, "token-3");
        std::env::set_var(ENV_PORT, "70000");
    }

    let err = ConnectionParams::from_env().expect_err("port should be invalid");
    assert!(err.to_string().contains(ENV_PORT));

    unsafe { clear_env() };
}

#[test]
fn from_env_treats_empty_values_as_unset() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    unsafe {
        clear_env();
        std::env::set_var(ENV_TOKEN, "token-4");
        std::env::set_var(ENV_HOST, "");
        std::env::set_var(ENV_PORT, " ");
    }

    let params = ConnectionParams::from_env().expect("config");
    assert_eq!(params.host(), DEFAULT_HOST);
    assert_eq!(params.port(), DEFAULT_PORT);

    unsafe { clear_env() };
}
