use acm_gateway::notification::encode;
use acm_gateway::state::{Obstacle, SENSOR_COUNT};
use acm_gateway::*;

#[test]
fn test_notification_layout() {
    let mut telemetry = VehicleTelemetryState::new();
    telemetry.speed_raw = 3;
    telemetry.direction = 1;
    telemetry.battery_level = 2;
    let mut obstacles = [Obstacle::NONE; SENSOR_COUNT];
    obstacles[0] = Obstacle::at(20);
    obstacles[5] = Obstacle::at(20);
    telemetry.set_obstacles(obstacles);
    assert_eq!(telemetry.obstacle_bitmask, 0b101);

    let command = VehicleCommandState::new();
    let notification = encode(&telemetry, &command);

    assert_eq!(notification.as_bytes(), &[0x1A, 0x16]);
}

#[test]
fn test_notification_masks_wide_fields() {
    let mut telemetry = VehicleTelemetryState::new();
    telemetry.speed_raw = 25;
    telemetry.direction = 7;
    telemetry.battery_level = 0xFF;

    let mut command = VehicleCommandState::new();
    command.mode = DriveMode::Autonomous;

    let Notification([byte0, byte1]) = encode(&telemetry, &command);
    assert_eq!(byte0 & 0xC0, 0);
    assert_eq!(byte1 & 0xE0, 0);

    let fields = Notification([byte0, byte1]).decode();
    assert_eq!(fields.speed, 25 & 0x07);
    assert_eq!(fields.direction, 3);
    assert_eq!(fields.mode, DriveMode::Autonomous);
    assert_eq!(fields.battery_level, 3);
}

#[test]
fn test_notification_decode_matches_encode() {
    let mut telemetry = VehicleTelemetryState::new();
    telemetry.speed_raw = 5;
    telemetry.direction = 2;
    telemetry.battery_level = 1;
    let mut obstacles = [Obstacle::NONE; SENSOR_COUNT];
    obstacles[3] = Obstacle::at(40);
    telemetry.set_obstacles(obstacles);

    let fields = encode(&telemetry, &VehicleCommandState::new()).decode();
    assert_eq!(fields.speed, 5);
    assert_eq!(fields.direction, 2);
    assert_eq!(fields.mode, DriveMode::Manual);
    assert_eq!(fields.obstacle_bitmask, 0b010);
    assert_eq!(fields.battery_level, 1);
}
