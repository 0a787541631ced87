//! Integration tests for the priority channel.

use daq_handoff::config::ChannelConfig;
use daq_handoff::{CancelToken, HandoffError, Prioritized, PriorityChannel};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Message type used by acquisition control loops.
#[derive(Debug, PartialEq)]
enum Command {
    Abort,
    SetRate(u32),
    Log(&'static str),
}

impl Prioritized for Command {
    fn priority_class(&self) -> usize {
        match self {
            Command::Abort => 0,
            Command::SetRate(_) => 1,
            Command::Log(_) => 2,
        }
    }
}

#[test]
fn test_invalid_construction_rejected() {
    assert!(matches!(
        PriorityChannel::<u8>::new(0, 4),
        Err(HandoffError::InvalidCapacity(0))
    ));
    assert!(PriorityChannel::<u8>::new(2, 0).is_err());
}

#[test]
fn test_invalid_class_rejected_without_blocking() {
    let channel = PriorityChannel::new(2, 1).unwrap();
    let err = channel.put("x", 2).unwrap_err();
    assert!(matches!(
        err,
        HandoffError::InvalidPriorityClass {
            class: 2,
            classes: 2
        }
    ));
    assert!(channel.is_empty());
}

#[test]
fn test_higher_class_taken_first() {
    let channel = PriorityChannel::new(3, 4).unwrap();
    channel.send(Command::Log("started")).unwrap();
    channel.send(Command::SetRate(100)).unwrap();
    channel.send(Command::Log("armed")).unwrap();
    channel.send(Command::Abort).unwrap();

    assert_eq!(channel.len(), 4);
    assert_eq!(channel.class_len(2), 2);
    assert_eq!(channel.take().unwrap(), Command::Abort);
    assert_eq!(channel.take().unwrap(), Command::SetRate(100));
    assert_eq!(channel.take().unwrap(), Command::Log("started"));
    assert_eq!(channel.take().unwrap(), Command::Log("armed"));
    assert!(channel.is_empty());
}

#[test]
fn test_full_class_blocks_only_that_class() {
    let channel = PriorityChannel::new(2, 1).unwrap();
    channel.put(10, 1).unwrap();

    // Class 1 is full, class 0 still accepts.
    assert!(!channel.put_timeout(11, 1, Duration::from_millis(20)).unwrap());
    assert!(channel.put_timeout(0, 0, Duration::from_millis(20)).unwrap());

    let blocked = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || channel.put(11, 1))
    };
    thread::sleep(Duration::from_millis(50));
    assert_eq!(channel.class_len(1), 1);

    assert_eq!(channel.take().unwrap(), 0);
    assert_eq!(channel.take().unwrap(), 10);
    blocked.join().unwrap().unwrap();
    assert_eq!(channel.take().unwrap(), 11);
}

#[test]
fn test_poll_times_out_on_empty() {
    let channel = PriorityChannel::<u8>::new(2, 2).unwrap();
    assert_eq!(channel.poll(Duration::from_millis(20)).unwrap(), None);
    channel.put(3, 1).unwrap();
    assert_eq!(channel.poll(Duration::from_millis(20)).unwrap(), Some(3));
}

#[test]
fn test_clear_wakes_blocked_producer() {
    let channel = PriorityChannel::from_config(&ChannelConfig {
        classes: 1,
        per_class_capacity: 2,
    })
    .unwrap();
    channel.put('a', 0).unwrap();
    channel.put('b', 0).unwrap();

    let producer = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || channel.put('c', 0))
    };
    thread::sleep(Duration::from_millis(50));
    assert_eq!(channel.clear(), 2);

    producer.join().unwrap().unwrap();
    assert_eq!(channel.try_take(), Some('c'));
    assert_eq!(channel.try_take(), None);
}

#[test]
fn test_cancel_releases_blocked_take() {
    let token = CancelToken::new();
    let channel = PriorityChannel::<u32>::new_with_cancel(3, 2, &token).unwrap();

    let consumer = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || channel.take())
    };
    thread::sleep(Duration::from_millis(50));
    token.cancel();
    assert!(consumer.join().unwrap().unwrap_err().is_cancelled());
}

#[test]
fn test_concurrent_producers_per_class_fifo() {
    let channel = PriorityChannel::new(3, 8).unwrap();
    let producers: Vec<_> = (0..3usize)
        .map(|class| {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                for seq in 0..500u32 {
                    channel.put((class, seq), class).unwrap();
                }
            })
        })
        .collect();

    let mut next_seq = [0u32; 3];
    for _ in 0..1_500 {
        let (class, seq) = channel.take().unwrap();
        assert_eq!(seq, next_seq[class], "class {class} out of order");
        next_seq[class] += 1;
    }
    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(next_seq, [500, 500, 500]);
}
