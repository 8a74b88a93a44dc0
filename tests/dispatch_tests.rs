use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::oneshot;
use tokio::time::timeout;

use acm_gateway::config::CanIds;
use acm_gateway::mux::SPEED_NORMAL;
use acm_gateway::protocol::{command_byte, NOTIFICATION_LEN, WIRE_FRAME_LEN};
use acm_gateway::*;

const WAIT: Duration = Duration::from_secs(5);

fn loopback_config(peer: std::net::SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.bus.bind = "127.0.0.1:0".parse().unwrap();
    config.bus.peer = peer;
    config.wireless.listen = "127.0.0.1:0".parse().unwrap();
    config.timers.bus_send_period_ms = 10;
    config.timers.governor_period_ms = 20;
    config.timers.camera_period_ms = 40;
    config
}

async fn wait_for_speed(peer: &UdpSocket, ids: CanIds, expected: u16) {
    let mut buf = [0u8; WIRE_FRAME_LEN];
    loop {
        let (len, _) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
        let frame = CanFrame::from_wire(&buf[..len]).unwrap();
        if frame.id == ids.speed_cmd && frame.command_value().unwrap() == expected {
            return;
        }
    }
}

#[tokio::test]
async fn test_gateway_round_trip_over_loopback() {
    let ids = CanIds::default();
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = loopback_config(peer.local_addr().unwrap());

    let dispatcher = Dispatcher::bind(&config).await.unwrap();
    let bus_addr = dispatcher.bus().local_addr().unwrap();
    let link_addr = dispatcher.wireless().local_addr();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let reactor = tokio::spawn(dispatcher.run(async move {
        let _ = stop_rx.await;
    }));

    // Operator asks for manual forward motion
    let mut client = TcpStream::connect(link_addr).await.unwrap();
    client.write_all(&[command_byte(2, 1)]).await.unwrap();
    wait_for_speed(&peer, ids, SPEED_NORMAL).await;

    // Vehicle reports speed; the operator gets a notification
    let speed = CanFrame::new(ids.speed_data, &[30]).unwrap();
    peer.send_to(&speed.to_wire(), bus_addr).await.unwrap();

    let mut notification = [0u8; NOTIFICATION_LEN];
    timeout(WAIT, client.read_exact(&mut notification)).await.unwrap().unwrap();
    let fields = Notification(notification).decode();
    assert_eq!(fields.speed, 3);
    assert_eq!(fields.mode, DriveMode::Manual);

    stop_tx.send(()).unwrap();
    let controller = timeout(WAIT, reactor).await.unwrap().unwrap().unwrap();

    let stats = controller.stats();
    assert_eq!(stats.commands_applied, 1);
    assert_eq!(stats.frames_received, 1);
    assert!(stats.frames_sent >= 2);
    assert!(stats.governor_cycles >= 1);
}

#[tokio::test]
async fn test_obstacle_stops_vehicle_over_loopback() {
    let ids = CanIds::default();
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = loopback_config(peer.local_addr().unwrap());

    let dispatcher = Dispatcher::bind(&config).await.unwrap();
    let bus_addr = dispatcher.bus().local_addr().unwrap();
    let link_addr = dispatcher.wireless().local_addr();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let reactor = tokio::spawn(dispatcher.run(async move {
        let _ = stop_rx.await;
    }));

    let mut client = TcpStream::connect(link_addr).await.unwrap();
    client.write_all(&[command_byte(4, 1)]).await.unwrap();
    wait_for_speed(&peer, ids, 2).await;

    let ultrasound = CanFrame::new(ids.ultrasound, &[15, 0, 0, 0, 0, 0]).unwrap();
    peer.send_to(&ultrasound.to_wire(), bus_addr).await.unwrap();
    wait_for_speed(&peer, ids, 0).await;

    stop_tx.send(()).unwrap();
    let controller = timeout(WAIT, reactor).await.unwrap().unwrap().unwrap();
    assert!(controller.command_state().autonomous_locked());
    assert!(controller.stats().interlock_transitions >= 1);
}

#[tokio::test]
async fn test_malformed_bus_frame_ends_reactor() {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = loopback_config(peer.local_addr().unwrap());

    let dispatcher = Dispatcher::bind(&config).await.unwrap();
    let bus_addr = dispatcher.bus().local_addr().unwrap();

    let reactor = tokio::spawn(dispatcher.run(std::future::pending::<()>()));

    peer.send_to(&[0u8; 5], bus_addr).await.unwrap();

    let result = timeout(WAIT, reactor).await.unwrap().unwrap();
    match result {
        Err(e) => {
            assert_eq!(e.exit_code(), 1);
            assert!(matches!(e, GatewayError::Transport(TransportError::FrameLength { got: 5, .. })));
        }
        Ok(_) => panic!("reactor should stop on a malformed frame"),
    }
}

#[tokio::test]
async fn test_bind_rejects_zero_timer_period() {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut config = loopback_config(peer.local_addr().unwrap());
    config.timers.governor_period_ms = 0;

    match Dispatcher::bind(&config).await {
        Err(e) => {
            assert_eq!(e.exit_code(), 2);
            assert!(matches!(e, GatewayError::Config(_)));
        }
        Ok(_) => panic!("a zero timer period should be rejected before binding"),
    }
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut config = loopback_config("127.0.0.1:9".parse().unwrap());
    config.bus.bind = taken.local_addr().unwrap();

    match Dispatcher::bind(&config).await {
        Err(GatewayError::Transport(TransportError::Open { addr, .. })) => {
            assert_eq!(addr, config.bus.bind);
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("binding a used port should fail"),
    }
}
