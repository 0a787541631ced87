//! Tests for configuration loading from files and environment overrides.

use daq_handoff::config::{HandoffConfig, ENV_PREFIX};
use daq_handoff::{BufferedQueue, GrowableRingBuffer, HandoffError, PriorityChannel};
use serial_test::serial;
use std::env;
use std::fs;

fn clear_env() {
    for (key, _) in env::vars() {
        if key.starts_with(ENV_PREFIX) {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_load_from_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handoff.toml");
    fs::write(
        &path,
        r#"
        [logging]
        level = "debug"

        [ring]
        chunk_size = 32
        max_size = 128

        [queue]
        capacity = 64

        [bridge]
        thread_name = "xml-reader"
        "#,
    )
    .unwrap();

    let config = HandoffConfig::load_from(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.ring.chunk_size, 32);
    assert_eq!(config.ring.max_size, 128);
    assert_eq!(config.queue.capacity, 64);
    assert_eq!(config.bridge.thread_name, "xml-reader");
    // Untouched sections keep their defaults.
    assert_eq!(config.channel.classes, 4);
    assert_eq!(config.bridge.queue_capacity, 512);
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = HandoffConfig::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, HandoffConfig::default());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handoff.toml");
    fs::write(&path, "[ring]\nchunk_size = 32\n").unwrap();

    env::set_var("DAQ_HANDOFF_RING__CHUNK_SIZE", "8");
    env::set_var("DAQ_HANDOFF_CHANNEL__CLASSES", "2");
    let result = HandoffConfig::load_from(&path);
    clear_env();

    let config = result.unwrap();
    assert_eq!(config.ring.chunk_size, 8);
    assert_eq!(config.channel.classes, 2);
}

#[test]
#[serial]
fn test_bad_env_value_is_config_error() {
    clear_env();
    env::set_var("DAQ_HANDOFF_QUEUE__CAPACITY", "lots");
    let result = HandoffConfig::load_from("does/not/exist.toml");
    clear_env();

    assert!(matches!(result, Err(HandoffError::Config(_))));
}

#[test]
fn test_structures_from_config() {
    let mut config = HandoffConfig::default();
    config.ring.chunk_size = 16;
    config.ring.max_size = 64;
    config.channel.classes = 3;

    let ring = GrowableRingBuffer::<u8>::from_config(&config.ring).unwrap();
    assert_eq!(ring.chunk_size(), 16);
    assert_eq!(ring.max_size(), 64);

    let queue = BufferedQueue::<u8>::from_config(&config.queue).unwrap();
    assert_eq!(queue.capacity(), 1024);

    let channel = PriorityChannel::<u8>::from_config(&config.channel).unwrap();
    assert_eq!(channel.num_classes(), 3);
    assert_eq!(channel.per_class_capacity(), 256);
}

#[test]
fn test_invalid_config_rejected_by_constructor() {
    let mut config = HandoffConfig::default();
    config.ring.chunk_size = 0;
    assert!(config.validate().is_err());
    assert!(matches!(
        GrowableRingBuffer::<u8>::from_config(&config.ring),
        Err(HandoffError::InvalidChunkSize(0))
    ));
}

#[test]
fn test_sample_config_file_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/handoff.toml");
    let text = fs::read_to_string(path).unwrap();
    let config = HandoffConfig::from_toml_str(&text).unwrap();
    config.validate().unwrap();
}
