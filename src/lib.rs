//! # ACM Gateway
//!
//! Reactive control core of a small remote-controlled / autonomous vehicle.
//! It bridges a wireless command link to the vehicle CAN bus, fuses ultrasound
//! and camera input, and enforces a safety interlock that can override the
//! operator.
//!
//! ## Quick Start
//!
//! ```rust
//! use acm_gateway::{GatewayConfig, VehicleController};
//! use acm_gateway::protocol::{command_byte, CanFrame};
//!
//! let config = GatewayConfig::default();
//! let mut controller = VehicleController::from_config(&config);
//!
//! // Operator asks for manual forward motion
//! controller.on_command_write(&[command_byte(2, 1)]).unwrap();
//!
//! // Vehicle reports its speed; the returned payload goes to the operator
//! let frame = CanFrame::new(config.bus.ids.speed_data, &[30]).unwrap();
//! let notification = controller.on_bus_frame(&frame).unwrap();
//! assert_eq!(notification.decode().speed, 3);
//!
//! // Timers drive the governor and the outgoing command frames
//! controller.on_governor_tick();
//! let _direction_frame = controller.on_bus_send_tick();
//! ```
//!
//! ## Architecture
//!
//! - [`state`] - Command and telemetry records shared by all callbacks
//! - [`command`] - Operator command byte decoding
//! - [`telemetry`] - Bus frame decoding into telemetry state
//! - [`safety`] - Obstacle and road hazard governor driving the interlock
//! - [`mux`] - Alternating direction/speed command frames
//! - [`notification`] - Two-byte operator notification packing
//! - [`controller`] - Owner of the state and of every component
//! - [`dispatch`] - Single-threaded reactor loop and signal handling
//! - [`transport`] - UDP bus bridge and TCP wireless link

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod command;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod mux;
pub mod notification;
pub mod protocol;
pub mod safety;
pub mod sensors;
pub mod state;
pub mod telemetry;
pub mod transport;

// Re-export main public types for convenience
pub use config::GatewayConfig;
pub use controller::VehicleController;
pub use dispatch::Dispatcher;
pub use error::{DecodeError, GatewayError, TransportError};
pub use protocol::{CanFrame, Notification};
pub use state::{DriveMode, RoadHazard, VehicleCommandState, VehicleTelemetryState};
