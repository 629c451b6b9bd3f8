//! 并发与监控线程集成测试
//!
//! - 前台指令与监控查询不交错
//! - disconnect 等待进行中的交换，且不再发起新的交换
//! - 监控失败后的事件与状态

mod common;

use common::{MockLink, fast_config, manager_with, states, wait_for};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tmcl_driver::{ConnectionState, DriverError, MonitorExit, StatusEvent};
use tmcl_protocol::{AxisParameter, Opcode};

#[test]
fn test_foreground_and_monitor_never_interleave() {
    let link = MockLink::new();
    link.reply_delay_us.store(500, Ordering::SeqCst);
    let (mut manager, _rx) = manager_with(&link, fast_config(1));
    let session = manager.connect("sim", 1).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let session = session.clone();
            thread::spawn(move || {
                for n in 0..20 {
                    session.move_absolute(i * 100 + n).unwrap();
                    session.stop().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    manager.disconnect().unwrap();
    assert!(!link.overlap_detected.load(Ordering::SeqCst));
    assert!(link.exchanges() >= 1 + 4 * 20 * 2);
}

#[test]
fn test_status_query_is_not_split() {
    let link = MockLink::new();
    link.reply_delay_us.store(300, Ordering::SeqCst);
    let (mut manager, _rx) = manager_with(&link, fast_config(1));
    let session = manager.connect("sim", 1).unwrap();

    let worker = {
        let session = session.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                session.stop().unwrap();
            }
        })
    };
    worker.join().unwrap();
    manager.disconnect().unwrap();

    let position = (Opcode::GetAxisParameter, u8::from(AxisParameter::ActualPosition));
    let speed = (Opcode::GetAxisParameter, u8::from(AxisParameter::ActualSpeed));
    let opcodes = link.opcodes();

    // 第一个请求是连接探测；其后每个位置查询都紧跟速度查询。
    // 最后一个位置查询可能因 disconnect 取消而没有速度查询。
    assert_eq!(opcodes[0], position);
    let last = opcodes.len() - 1;
    for (i, request) in opcodes.iter().enumerate().take(last).skip(1) {
        if *request == position {
            assert_eq!(opcodes.get(i + 1), Some(&speed), "split status query at {}", i);
        }
    }
}

#[test]
fn test_disconnect_waits_for_in_flight_exchange() {
    let link = MockLink::new();
    let config = fast_config(10);
    let (mut manager, _rx) = manager_with(&link, config);
    manager.connect("sim", 1).unwrap();

    // 让监控线程的下一次交换挂起
    link.set_hang(true);
    assert!(wait_for(Duration::from_secs(2), || {
        link.hanging.load(Ordering::SeqCst) > 0
    }));

    let releaser = {
        let link = link.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            link.set_hang(false);
        })
    };

    let start = Instant::now();
    manager.disconnect().unwrap();
    // 挂起的交换结束后才关闭链路
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert_eq!(link.hanging.load(Ordering::SeqCst), 0);
    assert!(link.closed.load(Ordering::SeqCst));
    assert_eq!(link.sends_after_close.load(Ordering::SeqCst), 0);
    assert!(matches!(manager.monitor_exit(), Some(MonitorExit::Cancelled)));

    releaser.join().unwrap();
}

#[test]
fn test_disconnect_bounded_by_timeout_when_reply_never_comes() {
    let link = MockLink::new();
    let (mut manager, _rx) = manager_with(&link, fast_config(10));
    manager.connect("sim", 1).unwrap();

    link.set_hang(true);
    assert!(wait_for(Duration::from_secs(2), || {
        link.hanging.load(Ordering::SeqCst) > 0
    }));

    let start = Instant::now();
    manager.disconnect().unwrap();
    // 超时 200 ms；失败发生在取消之后，按取消处理
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(matches!(manager.monitor_exit(), Some(MonitorExit::Cancelled)));
    link.set_hang(false);
}

#[test]
fn test_disconnect_during_slow_status_query_skips_speed_read() {
    let link = MockLink::new();
    // 每个应答都在 200 ms 超时之内到达
    link.reply_delay_us.store(180_000, Ordering::SeqCst);
    let config = fast_config(10);
    let timeout = config.timeout();
    let (mut manager, _rx) = manager_with(&link, config);
    manager.connect("sim", 1).unwrap();

    // 探测之后，监控线程的位置查询已发出
    assert!(wait_for(Duration::from_secs(2), || link.exchanges() >= 2));

    let start = Instant::now();
    manager.disconnect().unwrap();
    let elapsed = start.elapsed();

    // 取消只等待进行中的那一次交换
    assert!(
        elapsed < timeout + Duration::from_millis(50),
        "disconnect took {:?}",
        elapsed
    );
    assert_eq!(link.exchanges(), 2);
    let speed = (Opcode::GetAxisParameter, u8::from(AxisParameter::ActualSpeed));
    assert!(!link.opcodes().contains(&speed));
    assert!(matches!(manager.monitor_exit(), Some(MonitorExit::Cancelled)));
    assert_eq!(link.sends_after_close.load(Ordering::SeqCst), 0);
}

#[test]
fn test_disconnect_interrupts_long_poll_interval() {
    let link = MockLink::new();
    let (mut manager, _rx) = manager_with(&link, fast_config(60_000));
    manager.connect("sim", 1).unwrap();
    assert!(wait_for(Duration::from_secs(2), || link.exchanges() >= 3));

    let start = Instant::now();
    manager.disconnect().unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_monitor_failure_after_third_tick() {
    let link = MockLink::new();
    // 探测 1 次 + 每个周期 2 次：第 4 个周期的第一次交换失败
    link.fail_after.store(1 + 3 * 2, Ordering::SeqCst);
    let (mut manager, rx) = manager_with(&link, fast_config(10));
    manager.connect("sim", 1).unwrap();

    let mut events = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                let done = matches!(event, StatusEvent::StateChanged(ConnectionState::Disconnecting));
                events.push(event);
                if done {
                    break;
                }
            },
            Err(_) => continue,
        }
    }

    let positions = events
        .iter()
        .filter(|event| matches!(event, StatusEvent::Position(_)))
        .count();
    assert_eq!(positions, 3);
    assert!(
        events
            .iter()
            .any(|event| matches!(event, StatusEvent::ConnectionLost(_)))
    );
    assert_eq!(manager.state(), ConnectionState::Disconnecting);
    assert!(manager.is_link_lost());

    // 终止后不再有交换
    let exchanges = link.exchanges();
    assert_eq!(exchanges, 8);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(link.exchanges(), exchanges);
    assert!(!manager.is_monitor_running());

    // 所有者完成拆除
    manager.disconnect().unwrap();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    match manager.monitor_exit() {
        Some(MonitorExit::Failed(err)) => assert!(err.is_timeout()),
        other => panic!("unexpected monitor exit: {:?}", other),
    }

    let tail: Vec<_> = rx.try_iter().collect();
    assert_eq!(states(&tail), [ConnectionState::Disconnected]);
}

#[test]
fn test_commands_after_link_lost_still_serialized() {
    let link = MockLink::new();
    link.fail_after.store(1, Ordering::SeqCst);
    let (mut manager, _rx) = manager_with(&link, fast_config(10));
    let session = manager.connect("sim", 1).unwrap();

    assert!(wait_for(Duration::from_secs(2), || manager.is_link_lost()));
    // 会话仍打开（拆除由所有者完成），但交换失败
    assert!(matches!(session.stop(), Err(DriverError::Protocol(_))));

    manager.disconnect().unwrap();
    assert!(matches!(session.stop(), Err(DriverError::NotConnected)));
}
