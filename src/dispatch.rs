//! Reactor wiring.
//!
//! Every event source becomes one arm of a single `select!` loop, so
//! callbacks never overlap. The dispatcher holds no vehicle logic of its
//! own; it moves bytes between the transports and the controller.

use std::future::Future;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::{GatewayConfig, TimerConfig};
use crate::controller::VehicleController;
use crate::error::{GatewayError, TransportError};
use crate::transport::{CanBus, WirelessLink};

pub struct Dispatcher {
    controller: VehicleController,
    bus: CanBus,
    wireless: WirelessLink,
    timers: TimerConfig,
}

impl Dispatcher {
    pub fn new(controller: VehicleController, bus: CanBus, wireless: WirelessLink, timers: TimerConfig) -> Self {
        Self {
            controller,
            bus,
            wireless,
            timers,
        }
    }

    /// Validates `config` and opens both transports it describes. Failing to open either is fatal.
    pub async fn bind(config: &GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let bus = CanBus::open(config.bus.bind, config.bus.peer).await?;
        let wireless = WirelessLink::open(config.wireless.listen)
            .await
            .map_err(GatewayError::Wireless)?;

        Ok(Self::new(
            VehicleController::from_config(config),
            bus,
            wireless,
            config.timers.clone(),
        ))
    }

    pub fn bus(&self) -> &CanBus {
        &self.bus
    }

    pub fn wireless(&self) -> &WirelessLink {
        &self.wireless
    }

    /// Runs until `shutdown` resolves or a transport error occurs.
    ///
    /// On a clean stop the controller is handed back for inspection.
    pub async fn run<S>(mut self, shutdown: S) -> Result<VehicleController, GatewayError>
    where
        S: Future<Output = ()>,
    {
        let mut governor_timer = periodic(self.timers.governor_period());
        let mut bus_send_timer = periodic(self.timers.bus_send_period());
        let mut camera_timer = periodic(self.timers.camera_period());
        tokio::pin!(shutdown);

        info!(
            "Dispatcher running: bus send {}ms, governor {}ms, camera {}ms",
            self.timers.bus_send_period_ms, self.timers.governor_period_ms, self.timers.camera_period_ms
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping reactor");
                    break;
                }
                ready = self.bus.readable() => {
                    ready?;
                    self.drain_bus()?;
                }
                Some(write) = self.wireless.next_write() => {
                    trace!("Command write {:02x?} from {}", write.value, write.client);
                    // Decode errors are logged by the controller and otherwise dropped.
                    let _ = self.controller.on_command_write(&write.value);
                }
                _ = governor_timer.tick() => {
                    self.controller.on_governor_tick();
                }
                _ = bus_send_timer.tick() => {
                    let frame = self.controller.on_bus_send_tick();
                    self.bus.send(&frame).await?;
                }
                _ = camera_timer.tick() => {
                    self.controller.on_camera_tick();
                }
            }
        }

        Ok(self.controller)
    }

    fn drain_bus(&mut self) -> Result<(), TransportError> {
        loop {
            match self.bus.try_recv() {
                Ok(frame) => {
                    let notification = self.controller.on_bus_frame(&frame)?;
                    if let Err(e) = self.wireless.notify(notification) {
                        debug!("Notification {:02x?} dropped: {}", notification.as_bytes(), e);
                    }
                }
                Err(nb::Error::WouldBlock) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
    }
}

fn periodic(period: std::time::Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
