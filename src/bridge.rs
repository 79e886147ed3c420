//! Synchronous facade for hosts that drive the simulation from a plain
//! per-frame callback.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info};

use crate::config::BridgeConfig;
use crate::consumer::CommandConsumer;
use crate::handshake::startup_handshake;
use crate::producer::FrameProducer;
use crate::simulation::{Cameras, Vehicle};
use crate::types::{ConnectionState, ControlSnapshot};
use crate::{BridgeError, Result};

/// One worker per long-lived loop: the frame sender and the command listener
const IO_WORKER_THREADS: usize = 2;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// What one [`Bridge::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    /// Values written to the vehicle, if the consumer is running
    pub applied: Option<ControlSnapshot>,
    /// Sequence number of a frame captured this tick
    pub captured: Option<u64>,
}

/// Owns the I/O runtime and both channels.
///
/// All socket I/O runs on the runtime's worker threads; [`Bridge::tick`] only
/// touches the two shared slots and the simulation, so it never blocks on the
/// network. `start`, `shutdown` and `drop` block the calling thread and must
/// not be called from inside an async context.
pub struct Bridge {
    runtime: Option<Runtime>,
    producer: Option<FrameProducer>,
    consumer: Option<CommandConsumer>,
    handshake_response: Option<String>,
}

impl Bridge {
    /// Start every component enabled in `config`.
    ///
    /// A component that cannot start is logged and left out; the simulation
    /// keeps running without it. Only an invalid configuration or a failure to
    /// create the runtime is an error.
    pub fn start(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(IO_WORKER_THREADS)
            .thread_name("simbridge-io")
            .enable_all()
            .build()
            .map_err(|e| BridgeError::Runtime { details: e.to_string() })?;

        let (handshake_response, producer, consumer) = runtime.block_on(async {
            let handshake_response = if config.handshake.enabled {
                startup_handshake(&config.handshake).await
            } else {
                None
            };

            let producer = if config.producer.enabled {
                // Failures are logged by connect according to the policy
                FrameProducer::connect(&config.capture, &config.producer).await.ok()
            } else {
                info!("Frame producer disabled by configuration");
                None
            };

            let consumer = if config.consumer.enabled {
                match CommandConsumer::bind(&config.consumer).await {
                    Ok(consumer) => Some(consumer),
                    Err(e) => {
                        error!(error = %e, "Command consumer unavailable");
                        None
                    }
                }
            } else {
                info!("Command consumer disabled by configuration");
                None
            };

            (handshake_response, producer, consumer)
        });

        info!(
            producer = ?producer.as_ref().map(FrameProducer::state),
            consumer = ?consumer.as_ref().map(CommandConsumer::local_addr),
            "Bridge started"
        );

        Ok(Self { runtime: Some(runtime), producer, consumer, handshake_response })
    }

    /// Run the per-tick work on the caller's thread: apply the latest command,
    /// then capture a frame if one is due.
    pub fn tick<C, V>(&mut self, dt: Duration, cameras: &mut C, vehicle: &mut V) -> TickReport
    where
        C: Cameras + ?Sized,
        V: Vehicle + ?Sized,
    {
        let applied = self.consumer.as_ref().map(|consumer| consumer.apply_tick(vehicle));
        let captured = self.producer.as_mut().and_then(|producer| producer.tick(dt, cameras, vehicle));
        TickReport { applied, captured }
    }

    pub fn producer(&self) -> Option<&FrameProducer> {
        self.producer.as_ref()
    }

    pub fn consumer(&self) -> Option<&CommandConsumer> {
        self.consumer.as_ref()
    }

    /// Outbound channel state, `None` when the producer is not running
    pub fn producer_state(&self) -> Option<ConnectionState> {
        self.producer.as_ref().map(FrameProducer::state)
    }

    /// Address the command listener is bound to
    pub fn command_addr(&self) -> Option<SocketAddr> {
        self.consumer.as_ref().map(CommandConsumer::local_addr)
    }

    /// Peer response to the startup handshake, if one was made and answered
    pub fn handshake_response(&self) -> Option<&str> {
        self.handshake_response.as_deref()
    }

    /// Whether background I/O is still running
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Stop both background loops, close their sockets and join them.
    ///
    /// The components stay in place: [`Bridge::tick`] keeps applying the last
    /// command and capturing, but nothing crosses the process boundary any more.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        info!("Shutting down bridge");
        runtime.block_on(async {
            if let Some(producer) = self.producer.as_mut() {
                producer.shutdown().await;
            }
            if let Some(consumer) = self.consumer.as_mut() {
                consumer.shutdown().await;
            }
        });
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        info!("Bridge stopped");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            // Cannot block inside an async context; the components cancel their
            // tasks when dropped and the runtime is torn down in the background.
            if let Some(runtime) = self.runtime.take() {
                self.producer.take();
                self.consumer.take();
                runtime.shutdown_background();
            }
        } else {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectFailurePolicy;
    use crate::test_utils::{MockVehicle, SolidCameras};
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(25);

    fn quiet_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.capture.width = 16;
        config.capture.height = 8;
        config.capture.target_fps = 50.0;
        config.producer.enabled = false;
        config.consumer.enabled = false;
        config.consumer.listen_address = "127.0.0.1:0".to_string();
        config.consumer.retry_backoff_ms = 50;
        config
    }

    fn unused_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    fn tick_until(
        bridge: &mut Bridge,
        vehicle: &mut MockVehicle,
        mut done: impl FnMut(&MockVehicle) -> bool,
    ) {
        let mut cameras = SolidCameras::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(vehicle) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            bridge.tick(TICK, &mut cameras, vehicle);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn disabled_components_make_tick_a_no_op() {
        let _ = tracing_subscriber::fmt::try_init();

        let mut bridge = Bridge::start(&quiet_config()).unwrap();
        assert!(bridge.producer().is_none());
        assert!(bridge.consumer().is_none());
        assert!(bridge.is_running());

        let mut vehicle = MockVehicle::new();
        let report = bridge.tick(TICK, &mut SolidCameras::new(), &mut vehicle);
        assert_eq!(report, TickReport::default());
        assert_eq!(vehicle.external_control_asserts, 0);

        bridge.shutdown();
        bridge.shutdown();
        assert!(!bridge.is_running());
    }

    #[test]
    fn invalid_configuration_is_rejected_before_any_io() {
        let mut config = quiet_config();
        config.capture.jpeg_quality = 0;

        let result = Bridge::start(&config);
        assert!(matches!(result, Err(BridgeError::Config { .. })));
    }

    #[test]
    fn unreachable_peer_degrades_to_capture_only() {
        let _ = tracing_subscriber::fmt::try_init();

        let mut config = quiet_config();
        config.producer.enabled = true;
        config.producer.address = unused_address();
        config.producer.connect_timeout_ms = 500;

        let mut bridge = Bridge::start(&config).unwrap();
        assert_eq!(bridge.producer_state(), Some(ConnectionState::Faulted));

        let mut vehicle = MockVehicle::new();
        let report = bridge.tick(TICK, &mut SolidCameras::new(), &mut vehicle);
        assert_eq!(report.captured, Some(1));
    }

    #[test]
    fn disable_policy_leaves_the_producer_out() {
        let mut config = quiet_config();
        config.producer.enabled = true;
        config.producer.address = unused_address();
        config.producer.connect_timeout_ms = 500;
        config.producer.on_connect_failure = ConnectFailurePolicy::Disable;

        let bridge = Bridge::start(&config).unwrap();
        assert!(bridge.producer().is_none());
        assert_eq!(bridge.producer_state(), None);
    }

    #[test]
    fn busy_command_port_leaves_the_consumer_out() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();

        let mut config = quiet_config();
        config.consumer.enabled = true;
        config.consumer.listen_address = taken.local_addr().unwrap().to_string();

        let bridge = Bridge::start(&config).unwrap();
        assert!(bridge.consumer().is_none());
        assert_eq!(bridge.command_addr(), None);
    }

    #[test]
    fn last_command_stays_applied_after_shutdown() {
        let _ = tracing_subscriber::fmt::try_init();

        let mut config = quiet_config();
        config.consumer.enabled = true;
        let mut bridge = Bridge::start(&config).unwrap();
        let addr = bridge.command_addr().unwrap();

        let mut peer = TcpStream::connect(addr).unwrap();
        peer.write_all(b"-0.5,0.75,0.0\n").unwrap();

        let mut vehicle = MockVehicle::new();
        tick_until(&mut bridge, &mut vehicle, |v| v.controls.throttle == 0.75);
        assert_eq!(vehicle.controls, ControlSnapshot::new(-0.5, 0.75, 0.0));

        bridge.shutdown();
        vehicle.controls = ControlSnapshot::default();
        vehicle.reclaim_input();

        let report = bridge.tick(TICK, &mut SolidCameras::new(), &mut vehicle);
        assert_eq!(report.applied, Some(ControlSnapshot::new(-0.5, 0.75, 0.0)));
        assert!(vehicle.external_control);
    }

    #[test]
    fn handshake_response_is_kept() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let peer = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 64];
            let n = std::io::Read::read(&mut stream, &mut buf).unwrap();
            assert_eq!(&buf[..n], b"ping");
            stream.write_all(b"pong").unwrap();
        });

        let mut config = quiet_config();
        config.handshake.enabled = true;
        config.handshake.address = address;
        config.handshake.greeting = "ping".to_string();

        let bridge = Bridge::start(&config).unwrap();
        peer.join().unwrap();
        assert_eq!(bridge.handshake_response(), Some("pong"));
    }
}
