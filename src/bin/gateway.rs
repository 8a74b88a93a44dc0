use acm_gateway::config::GatewayConfig;
use acm_gateway::dispatch::{shutdown_signal, Dispatcher};
use acm_gateway::GatewayError;
use clap::{App, Arg, ArgMatches};
use std::net::SocketAddr;
use std::path::Path;
use tracing::{error, info, Level};

fn main() {
    let matches = App::new("acm-gateway")
        .version("0.1.0")
        .about("Bridges the wireless operator link to the vehicle CAN bus with an obstacle interlock")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("bus-bind")
                .long("bus-bind")
                .value_name("ADDR")
                .help("Local address of the bus bridge")
                .takes_value(true)
                .validator(validate_addr),
        )
        .arg(
            Arg::with_name("bus-peer")
                .long("bus-peer")
                .value_name("ADDR")
                .help("Address outgoing drive frames are sent to")
                .takes_value(true)
                .validator(validate_addr),
        )
        .arg(
            Arg::with_name("listen")
                .short("l")
                .long("listen")
                .value_name("ADDR")
                .help("Address the wireless link listens on")
                .takes_value(true)
                .validator(validate_addr),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .conflicts_with("verbose")
                .help("Only log warnings and errors"),
        )
        .get_matches();

    tracing_subscriber::fmt().with_max_level(log_level(&matches)).init();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start reactor: {}", e);
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(run(config)) {
        Ok(()) => 0,
        Err(e) => {
            error!("Fatal: {}", e);
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(config: GatewayConfig) -> Result<(), GatewayError> {
    let dispatcher = Dispatcher::bind(&config).await?;
    info!("ACM gateway started");

    let controller = dispatcher.run(shutdown_signal()).await?;

    let stats = controller.stats();
    info!(
        "ACM gateway stopped: {} commands ({} rejected), {} frames in, {} frames out, {} interlock transitions",
        stats.commands_applied,
        stats.commands_rejected,
        stats.frames_received,
        stats.frames_sent,
        stats.interlock_transitions
    );
    for event in controller.governor().get_event_history() {
        info!(
            "Interlock {} at {}ms: {:?}",
            if event.locked { "engaged" } else { "released" },
            event.timestamp,
            event.trigger
        );
    }
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<GatewayConfig, GatewayError> {
    let mut config = match matches.value_of("config") {
        Some(path) => GatewayConfig::load(Path::new(path))?,
        None => GatewayConfig::default(),
    };

    if let Some(addr) = parse_addr(matches, "bus-bind") {
        config.bus.bind = addr;
    }
    if let Some(addr) = parse_addr(matches, "bus-peer") {
        config.bus.peer = addr;
    }
    if let Some(addr) = parse_addr(matches, "listen") {
        config.wireless.listen = addr;
    }

    config.validate()?;
    Ok(config)
}

fn parse_addr(matches: &ArgMatches, name: &str) -> Option<SocketAddr> {
    // Already checked by the validator.
    matches.value_of(name).and_then(|v| v.parse().ok())
}

fn validate_addr(value: String) -> Result<(), String> {
    value
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| format!("'{}' is not a valid socket address", value))
}

fn log_level(matches: &ArgMatches) -> Level {
    if matches.is_present("quiet") {
        return Level::WARN;
    }
    match matches.occurrences_of("verbose") {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
