//! Pruebas del transporte en tiempo real sobre el enlace simulado.
//!
//! El reloj pausado de tokio hace determinista el calendario de backoff
//! (1, 2, 4, 8, 16 s) y el heartbeat de 30 s.

mod common;

use std::sync::Arc;
use std::time::Duration;

use ride_session::{
    ChannelMessage, ConnectConfig, ConnectionState, ControlCommand, ControlPayload, CoreError,
    EnvironmentConfig, MockVehicleLink, RealtimeTransport, TelemetryFrame, TransportEvent,
    VehicleLink,
};
use uuid::Uuid;

fn test_transport() -> (Arc<MockVehicleLink>, RealtimeTransport, ConnectConfig) {
    let link = Arc::new(MockVehicleLink::new());
    let config = EnvironmentConfig::for_testing();
    let transport = RealtimeTransport::new(link.clone() as Arc<dyn VehicleLink>, &config);
    let connect = ConnectConfig {
        vehicle_id: Uuid::new_v4(),
        signaling_url: config.signaling_url.clone(),
        ice_servers: config.ice_servers.clone(),
    };
    (link, transport, connect)
}

fn telemetry_frame() -> TelemetryFrame {
    TelemetryFrame {
        speed_kph: 18.0,
        battery_pct: 72.0,
        lat: 40.4168,
        lon: -3.7038,
        orientation: [0.0, 0.0, 1.0],
        temperature_c: 29.0,
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test(start_paused = true)]
async fn connect_reaches_connected_through_connecting() {
    let (_link, transport, config) = test_transport();
    let mut events = transport.subscribe();

    transport.connect(config).await.unwrap();
    assert_eq!(transport.state().await, ConnectionState::Connected);

    assert_eq!(
        events.try_recv().unwrap(),
        TransportEvent::StateChanged(ConnectionState::Connecting)
    );
    assert_eq!(
        events.try_recv().unwrap(),
        TransportEvent::StateChanged(ConnectionState::Connected)
    );
}

#[tokio::test(start_paused = true)]
async fn connect_to_a_second_vehicle_fails_fast() {
    let (link, transport, config) = test_transport();
    transport.connect(config.clone()).await.unwrap();

    let other = ConnectConfig { vehicle_id: Uuid::new_v4(), ..config };
    let err = transport.connect(other).await.unwrap_err();
    assert!(matches!(err, CoreError::TransportBusy(_)));
    assert_eq!(link.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_same_vehicle_is_idempotent() {
    let (link, transport, config) = test_transport();
    transport.connect(config.clone()).await.unwrap();
    transport.connect(config).await.unwrap();

    assert_eq!(link.open_count(), 1, "no second signaling session");
    assert_eq!(transport.state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn signaling_failure_rejects_connect() {
    let (link, transport, config) = test_transport();
    link.fail_next_opens(1);

    let err = transport.connect(config.clone()).await.unwrap_err();
    assert!(matches!(err, CoreError::Signaling(_)));
    assert_eq!(transport.state().await, ConnectionState::Failed);

    // tras un disconnect explícito se puede volver a intentar
    transport.disconnect().await;
    transport.connect(config).await.unwrap();
    assert_eq!(transport.state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_unconditional_and_idempotent() {
    let (_link, transport, config) = test_transport();

    // desconectar sin haber conectado nunca: no-op seguro
    transport.disconnect().await;
    assert_eq!(transport.state().await, ConnectionState::Disconnected);

    transport.connect(config).await.unwrap();
    let mut events = transport.subscribe();

    transport.disconnect().await;
    transport.disconnect().await;

    assert_eq!(transport.state().await, ConnectionState::Disconnected);
    // una sola transición a disconnected, sin duplicados
    assert_eq!(
        events.try_recv().unwrap(),
        TransportEvent::StateChanged(ConnectionState::Disconnected)
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn commands_flow_only_while_connected() {
    let (link, transport, config) = test_transport();

    // antes de conectar: descartado con warning, nunca encolado
    transport
        .send_control_command(ControlCommand::now(ControlPayload::Horn))
        .await;

    transport.connect(config).await.unwrap();
    let mut peer = link.take_peer().unwrap();

    let command = ControlCommand::now(ControlPayload::Movement { x: 0.4, y: -0.9 });
    transport.send_control_command(command.clone()).await;

    match peer.from_client.recv().await {
        Some(ChannelMessage::Control(received)) => assert_eq!(received, command),
        other => panic!("expected the movement command, got {:?}", other),
    }

    // el comando descartado de antes jamás llega
    assert!(peer.from_client.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn inbound_telemetry_is_published_to_subscribers() {
    let (link, transport, config) = test_transport();
    let mut events = transport.subscribe();

    transport.connect(config).await.unwrap();
    let peer = link.take_peer().unwrap();

    let frame = telemetry_frame();
    peer.to_client.send(ChannelMessage::Telemetry(frame.clone())).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // saltar los eventos de estado de la conexión
    let telemetry = loop {
        match events.try_recv().unwrap() {
            TransportEvent::Telemetry(f) => break f,
            _ => continue,
        }
    };
    assert_eq!(telemetry, frame);
    assert!(transport.last_telemetry_at().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn link_loss_reconnects_with_backoff() {
    let (link, transport, config) = test_transport();
    transport.connect(config).await.unwrap();

    let peer = link.take_peer().unwrap();
    peer.drop_link();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.state().await, ConnectionState::Reconnecting);

    // primer reintento al segundo de backoff
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.state().await, ConnectionState::Connected);
    assert_eq!(link.open_count(), 2);

    // la sesión nueva transporta telemetría con normalidad
    let mut events = transport.subscribe();
    let peer = link.take_peer().unwrap();
    peer.to_client.send(ChannelMessage::Telemetry(telemetry_frame())).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(events.try_recv(), Ok(TransportEvent::Telemetry(_))));
}

#[tokio::test(start_paused = true)]
async fn reconnect_gives_up_after_the_attempt_cap() {
    let (link, transport, config) = test_transport();
    let mut events = transport.subscribe();
    transport.connect(config).await.unwrap();

    link.fail_next_opens(10);
    let peer = link.take_peer().unwrap();
    peer.drop_link();

    // backoff completo: 1 + 2 + 4 + 8 + 16 s
    tokio::time::sleep(Duration::from_secs(40)).await;

    assert_eq!(transport.state().await, ConnectionState::Failed);
    assert_eq!(link.open_count(), 1 + 5, "exactly five reconnect attempts");

    let mut saw_terminal = false;
    while let Ok(event) = events.try_recv() {
        if event == TransportEvent::ReconnectFailed {
            saw_terminal = true;
        }
    }
    assert!(saw_terminal, "terminal reconnectFailed signal raised");

    // failed es permanente hasta el disconnect
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(link.open_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect_backoff() {
    let (link, transport, config) = test_transport();
    transport.connect(config).await.unwrap();

    let peer = link.take_peer().unwrap();
    peer.drop_link();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.state().await, ConnectionState::Reconnecting);

    // el usuario abandona la sesión durante el backoff
    transport.disconnect().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    // la reconexión obsoleta no resucita la sesión
    assert_eq!(link.open_count(), 1);
    assert_eq!(transport.state().await, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_is_sent_every_interval_while_connected() {
    let (link, transport, config) = test_transport();
    transport.connect(config).await.unwrap();
    let mut peer = link.take_peer().unwrap();

    tokio::time::sleep(Duration::from_secs(95)).await;

    let mut heartbeats = 0;
    while let Ok(frame) = peer.from_client.try_recv() {
        if frame == ChannelMessage::Heartbeat {
            heartbeats += 1;
        }
    }
    assert_eq!(heartbeats, 3, "one heartbeat per 30 s interval");
}
