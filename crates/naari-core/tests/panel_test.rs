#![allow(clippy::unwrap_used)]
// End-to-end panel flows against wiremock devices.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use naari_core::{
    CoreError, Device, DeviceId, Panel, PanelSignal, Registry, Settings, Theme, ThemePreset,
    TickOutcome, Timing,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_settings() -> Settings {
    Settings {
        retries: 0,
        retry_backoff: Duration::from_millis(1),
        polling_rate: Duration::from_millis(20),
        ..Settings::default()
    }
}

async fn lamp(on: bool, sync: bool) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": { "on": on, "bri": 200, "udpn": { "send": sync } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/presets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "0": {},
            "2": { "n": "reading", "bri": 255 },
            "1": { "n": "Campfire", "bri": 60 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/json/state"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn posted_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

fn panel(devices: Vec<Device>, themes: Vec<Theme>) -> Panel {
    Panel::with_timing(
        Registry::new(devices).unwrap(),
        themes,
        fast_settings(),
        Timing::immediate(),
    )
    .unwrap()
}

// ── Readiness ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_operations_before_initialize_are_not_ready() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());

    assert!(matches!(panel.preset_options(), Err(CoreError::NotReady)));
    assert!(matches!(
        panel.toggle_power(&DeviceId::Number(1)).await,
        Err(CoreError::NotReady)
    ));
    assert!(matches!(panel.start_polling().await, Err(CoreError::NotReady)));
    assert!(posted_bodies(&desk).await.is_empty());
}

#[tokio::test]
async fn test_initialize_loads_status_and_presets_once() {
    let desk = lamp(true, false).await;
    let panel = panel(
        vec![
            Device::new(1, desk.address().to_string()).named("Desk"),
            Device::new(2, "127.0.0.1:9").inactive(),
        ],
        Vec::new(),
    );

    let snapshot = panel.initialize().await.unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.status.len(), 1);
    assert_eq!(snapshot.status[0].device_id(), Some(&DeviceId::Number(1)));

    // Second call reuses the cached load.
    panel.initialize().await.unwrap();
    let status_gets = desk
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/json")
        .count();
    assert_eq!(status_gets, 1);

    let options = panel.preset_options().unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].options, vec!["1: Campfire", "2: reading", "0: None"]);
    assert_eq!(
        panel.preset_brightness(&DeviceId::Number(1), 1).unwrap(),
        Some(60)
    );
}

#[tokio::test]
async fn test_startup_repolls_missing_devices_then_gives_up() {
    let desk = lamp(true, false).await;
    let dead = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&dead)
        .await;

    let panel = panel(
        vec![
            Device::new(1, desk.address().to_string()),
            Device::new(2, dead.address().to_string()),
        ],
        Vec::new(),
    );

    let snapshot = panel.initialize().await.unwrap();
    assert!(!snapshot.complete);
    assert!(panel.is_ready());

    let dead_status_gets = dead
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/json")
        .count();
    assert_eq!(dead_status_gets, 3);
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_status_publishes_snapshot_and_failure_signals() {
    let desk = lamp(false, false).await;
    let panel = panel(
        vec![
            Device::new(1, desk.address().to_string()),
            Device::new(2, "127.0.0.1:9"),
        ],
        Vec::new(),
    );
    panel.initialize().await.unwrap();
    let mut signals = panel.signals();
    let mut status = panel.subscribe_status();
    status.mark_unchanged();

    let cycle = panel.poll_status().await.unwrap();
    assert_eq!(cycle.results.len(), 2);
    assert!(status.has_changed().unwrap());

    match signals.recv().await.unwrap() {
        PanelSignal::PollFailed {
            address, device_id, ..
        } => {
            assert_eq!(address, "127.0.0.1:9");
            assert_eq!(device_id, Some(DeviceId::Number(2)));
        }
        other => panic!("unexpected signal {other:?}"),
    }
    assert_eq!(
        panel.device_status(&DeviceId::Number(1)).unwrap().on,
        Some(false)
    );
}

#[tokio::test]
async fn test_tick_is_rejected_while_a_cycle_holds_the_guard() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();
    let mut signals = panel.signals();

    let guard = panel.scheduler().try_acquire().unwrap();
    assert!(matches!(panel.tick().await, TickOutcome::Busy { consecutive: 1 }));
    assert_eq!(
        signals.recv().await.unwrap(),
        PanelSignal::PollRejected { consecutive: 1 }
    );
    drop(guard);

    assert!(panel.tick().await.completed().is_some());
}

#[tokio::test]
async fn test_repeated_poll_rejections_escalate_to_stalled() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();
    let threshold = panel.scheduler().conflict_threshold();
    let mut signals = panel.signals();

    let guard = panel.scheduler().try_acquire().unwrap();
    for consecutive in 1..threshold {
        let err = panel.poll_status().await.unwrap_err();
        assert!(matches!(err, CoreError::PollInProgress), "{err:?}");
        assert_eq!(
            signals.recv().await.unwrap(),
            PanelSignal::PollRejected { consecutive }
        );
    }

    let err = panel.poll_status().await.unwrap_err();
    assert!(
        matches!(err, CoreError::PollStalled { consecutive } if consecutive == threshold),
        "{err:?}"
    );
    assert!(err.is_conflict());
    assert_eq!(
        signals.recv().await.unwrap(),
        PanelSignal::PollStalled {
            consecutive: threshold
        }
    );

    drop(guard);
    assert!(panel.poll_status().await.is_ok());
    assert_eq!(panel.scheduler().consecutive_conflicts(), 0);
}

#[tokio::test]
async fn test_background_loop_polls_until_stopped() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();
    let mut status = panel.subscribe_status();
    status.mark_unchanged();

    panel.start_polling().await.unwrap();
    assert!(panel.is_polling().await);
    tokio::time::timeout(Duration::from_secs(5), status.changed())
        .await
        .unwrap()
        .unwrap();

    panel.stop_polling().await;
    assert!(!panel.is_polling().await);
}

#[tokio::test]
async fn test_dropping_last_handle_stops_background_loop() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();
    let mut status = panel.subscribe_status();

    panel.start_polling().await.unwrap();
    drop(panel);

    // The sender lives inside the panel; it closes once the loop lets go.
    tokio::time::timeout(Duration::from_secs(5), async {
        while status.changed().await.is_ok() {}
    })
    .await
    .unwrap();
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_power_flips_last_polled_state() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();

    let (now_on, outcome) = panel.toggle_power(&DeviceId::Number(1)).await.unwrap();

    assert!(!now_on);
    assert_eq!(outcome.status, 200);
    assert_eq!(
        posted_bodies(&desk).await,
        vec![json!({"on": false, "udpn": {"send": false}})]
    );
}

#[tokio::test]
async fn test_toggle_power_without_state_is_unknown() {
    let panel = panel(vec![Device::new(1, "127.0.0.1:9")], Vec::new());
    panel.initialize().await.unwrap();

    let err = panel.toggle_power(&DeviceId::Number(1)).await.unwrap_err();
    assert!(matches!(err, CoreError::UnknownDeviceState { .. }));
}

#[tokio::test]
async fn test_commands_reset_idle_clock() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();

    for _ in 0..3 {
        let _ = panel.tick().await;
    }
    assert_eq!(panel.scheduler().elapsed_ticks(), 3);

    panel.set_brightness(&DeviceId::Number(1), 42).await.unwrap();
    assert_eq!(panel.scheduler().elapsed_ticks(), 0);
}

#[tokio::test]
async fn test_theme_sends_presets_to_every_selected_device() {
    let desk = lamp(true, false).await;
    let shelf = lamp(true, false).await;
    let theme = Theme {
        id: 1,
        name: "Evening".into(),
        presets: vec![
            ThemePreset {
                device_id: DeviceId::Number(1),
                device_address: None,
                preset_name: "1: Campfire".into(),
            },
            ThemePreset {
                device_id: DeviceId::Number(2),
                device_address: None,
                preset_name: "2: reading".into(),
            },
            ThemePreset {
                device_id: DeviceId::Number(3),
                device_address: None,
                preset_name: "0: None".into(),
            },
        ],
    };
    let panel = panel(
        vec![
            Device::new(1, desk.address().to_string()),
            Device::new(2, shelf.address().to_string()),
            Device::new(3, "127.0.0.1:9"),
        ],
        vec![theme],
    );
    panel.initialize().await.unwrap();

    let sends = panel.apply_theme("evening").await.unwrap();

    assert_eq!(sends.len(), 2);
    assert!(sends.iter().all(|s| s.result.is_ok()));
    assert_eq!(
        posted_bodies(&desk).await,
        vec![json!({"ps": 1, "udpn": {"send": false}})]
    );
    assert_eq!(
        posted_bodies(&shelf).await,
        vec![json!({"ps": 2, "udpn": {"send": false}})]
    );

    assert!(matches!(
        panel.apply_theme("nope").await,
        Err(CoreError::ThemeNotFound { .. })
    ));
}

#[tokio::test]
async fn test_master_power_sends_plain_toggle() {
    let master = lamp(true, true).await;
    let panel = panel(
        vec![Device::new(1, master.address().to_string()).master()],
        Vec::new(),
    );
    panel.initialize().await.unwrap();

    let now_on = panel.toggle_master_power().await.unwrap();

    assert!(!now_on);
    assert_eq!(posted_bodies(&master).await, vec![json!({"on": false})]);
}

#[tokio::test]
async fn test_master_power_without_master_device() {
    let desk = lamp(true, false).await;
    let panel = panel(vec![Device::new(1, desk.address().to_string())], Vec::new());
    panel.initialize().await.unwrap();

    assert!(matches!(
        panel.toggle_master_power().await,
        Err(CoreError::NoMasterDevice)
    ));
}
