use acm_gateway::config::CanIds;
use acm_gateway::protocol::{command_byte, CanFrame, Notification, NotificationFields, NOTIFICATION_LEN, WIRE_FRAME_LEN};
use acm_gateway::state::{DriveMode, SENSOR_COUNT};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

const DEFAULT_LINK: &str = "127.0.0.1:8090";
const DEFAULT_BUS: &str = "127.0.0.1:9000";
const DEFAULT_BUS_PEER: &str = "127.0.0.1:9001";

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> CliResult {
    let matches = App::new("acm-ctl")
        .version("0.1.0")
        .about("🚗 Operator and bench tool for the ACM gateway")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("link")
                .long("link")
                .value_name("ADDR")
                .help("Wireless link address of the gateway")
                .takes_value(true)
                .default_value(DEFAULT_LINK)
                .global(true),
        )
        .arg(
            Arg::with_name("bus")
                .long("bus")
                .value_name("ADDR")
                .help("Bus bridge address of the gateway")
                .takes_value(true)
                .default_value(DEFAULT_BUS)
                .global(true),
        )
        .arg(
            Arg::with_name("bus-peer")
                .long("bus-peer")
                .value_name("ADDR")
                .help("Address the gateway sends drive frames to")
                .takes_value(true)
                .default_value(DEFAULT_BUS_PEER)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["table", "json", "compact"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("send")
                .about("📨 Write one operator command byte")
                .arg(
                    Arg::with_name("state")
                        .long("state")
                        .short("s")
                        .help("Operator state code (0-6, 7 is undefined)")
                        .takes_value(true)
                        .required(true)
                        .validator(|v| validate_range(&v, 7)),
                )
                .arg(
                    Arg::with_name("direction")
                        .long("direction")
                        .short("d")
                        .help("Direction code (0-7)")
                        .takes_value(true)
                        .default_value("0")
                        .validator(|v| validate_range(&v, 7)),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📈 Print notifications pushed by the gateway")
                .arg(
                    Arg::with_name("count")
                        .long("count")
                        .short("n")
                        .help("Stop after this many notifications")
                        .takes_value(true)
                        .validator(|v| validate_range(&v, u32::MAX.into())),
                ),
        )
        .subcommand(
            SubCommand::with_name("bus")
                .about("🔌 Vehicle bus bench tools")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("speed")
                        .about("Inject a speed frame (raw bus byte)")
                        .arg(Arg::with_name("value").required(true).validator(|v| validate_range(&v, 255))),
                )
                .subcommand(
                    SubCommand::with_name("direction")
                        .about("Inject a direction frame")
                        .arg(Arg::with_name("value").required(true).validator(|v| validate_range(&v, 255))),
                )
                .subcommand(
                    SubCommand::with_name("battery")
                        .about("Inject a battery frame")
                        .arg(Arg::with_name("value").required(true).validator(|v| validate_range(&v, 255))),
                )
                .subcommand(
                    SubCommand::with_name("ultrasound")
                        .about("Inject an ultrasound frame (six ranges in cm, 0 = no echo)")
                        .arg(
                            Arg::with_name("ranges")
                                .required(true)
                                .multiple(true)
                                .number_of_values(SENSOR_COUNT as u64)
                                .validator(|v| validate_range(&v, 255)),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("listen")
                        .about("Print drive frames sent by the gateway")
                        .arg(
                            Arg::with_name("count")
                                .long("count")
                                .short("n")
                                .help("Stop after this many frames")
                                .takes_value(true)
                                .validator(|v| validate_range(&v, u32::MAX.into())),
                        ),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("send", Some(sub)) => send_command(&matches, sub).await,
        ("monitor", Some(sub)) => monitor(&matches, sub).await,
        ("bus", Some(sub)) => bus_command(&matches, sub).await,
        _ => Ok(()),
    }
}

async fn send_command(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>) -> CliResult {
    let link = addr_arg(matches, sub, "link")?;
    let state = u8_arg(sub, "state")?;
    let direction = u8_arg(sub, "direction")?;
    let byte = command_byte(state, direction);

    let mut stream = TcpStream::connect(link).await?;
    stream.write_all(&[byte]).await?;
    stream.flush().await?;

    println!(
        "{} state {} direction {} (byte {:#04x}) -> {}",
        "✓".green().bold(),
        state,
        direction,
        byte,
        link
    );
    if state == 7 {
        println!("{}", "  state code 7 is undefined; the gateway will ignore it".yellow());
    }
    Ok(())
}

async fn monitor(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>) -> CliResult {
    let link = addr_arg(matches, sub, "link")?;
    let format = sub.value_of("format").or_else(|| matches.value_of("format")).unwrap_or("table");
    let limit = count_arg(sub)?;

    let mut stream = TcpStream::connect(link).await?;
    println!("{} {}", "📡 Monitoring notifications from".cyan().bold(), link);

    let mut buf = [0u8; NOTIFICATION_LEN];
    let mut seen: u64 = 0;
    while limit.map_or(true, |limit| seen < limit) {
        stream.read_exact(&mut buf).await?;
        let fields = Notification(buf).decode();
        print_notification(&buf, &fields, format)?;
        seen += 1;
    }
    Ok(())
}

fn print_notification(raw: &[u8; NOTIFICATION_LEN], fields: &NotificationFields, format: &str) -> CliResult {
    match format {
        "json" => println!("{}", serde_json::to_string(fields)?),
        "compact" => println!("{:02x} {:02x}", raw[0], raw[1]),
        _ => {
            let mode = match fields.mode {
                DriveMode::Manual => "manual".normal(),
                DriveMode::Autonomous => "autonomous".magenta(),
            };
            let obstacles = if fields.obstacle_bitmask == 0 {
                format!("{:03b}", fields.obstacle_bitmask).as_str().green()
            } else {
                format!("{:03b}", fields.obstacle_bitmask).as_str().red().bold()
            };
            println!(
                "speed {:>2}  dir {}  mode {:<10}  obstacles {}  battery {}",
                fields.speed, fields.direction, mode, obstacles, fields.battery_level
            );
        }
    }
    Ok(())
}

async fn bus_command(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>) -> CliResult {
    let ids = CanIds::default();

    let frame = match sub.subcommand() {
        ("speed", Some(args)) => CanFrame::new(ids.speed_data, &[u8_arg(args, "value")?])?,
        ("direction", Some(args)) => CanFrame::new(ids.direction_data, &[u8_arg(args, "value")?])?,
        ("battery", Some(args)) => CanFrame::new(ids.battery, &[u8_arg(args, "value")?])?,
        ("ultrasound", Some(args)) => {
            let ranges = args
                .values_of("ranges")
                .map(|values| values.map(str::parse::<u8>).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            CanFrame::new(ids.ultrasound, &ranges)?
        }
        ("listen", Some(args)) => return listen(matches, args, ids).await,
        _ => return Ok(()),
    };

    let gateway = addr_arg(matches, sub, "bus")?;
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    socket.send_to(&frame.to_wire(), gateway).await?;
    println!("{} frame {:#05x} {:02x?} -> {}", "✓".green().bold(), frame.id, frame.data.as_slice(), gateway);
    Ok(())
}

async fn listen(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>, ids: CanIds) -> CliResult {
    let peer = addr_arg(matches, sub, "bus-peer")?;
    let limit = count_arg(sub)?;
    let socket = UdpSocket::bind(peer).await?;
    println!("{} {}", "🔌 Listening for drive frames on".cyan().bold(), peer);

    let mut buf = [0u8; WIRE_FRAME_LEN];
    let mut seen: u64 = 0;
    while limit.map_or(true, |limit| seen < limit) {
        let (len, _) = socket.recv_from(&mut buf).await?;
        let frame = CanFrame::from_wire(&buf[..len])?;
        let value = frame.command_value().unwrap_or_default();
        if frame.id == ids.direction_cmd {
            println!("{} {}", "direction".blue(), value);
        } else if frame.id == ids.speed_cmd {
            let text = value.to_string();
            let speed = if value == 0 { text.as_str().red().bold() } else { text.as_str().green() };
            println!("{}     {}", "speed".yellow(), speed);
        } else {
            println!("{:#05x} {:02x?}", frame.id, frame.data.as_slice());
        }
        seen += 1;
    }
    Ok(())
}

fn addr_arg(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>, name: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    // Global args land on the subcommand when given after it.
    let value = sub.value_of(name).or_else(|| matches.value_of(name)).unwrap_or_default();
    value
        .parse()
        .map_err(|_| format!("invalid address for --{}: '{}'", name, value).into())
}

fn u8_arg(matches: &ArgMatches<'_>, name: &str) -> Result<u8, Box<dyn std::error::Error>> {
    let value = matches.value_of(name).ok_or_else(|| format!("missing {}", name))?;
    Ok(value.parse::<u8>()?)
}

fn count_arg(matches: &ArgMatches<'_>) -> Result<Option<u64>, Box<dyn std::error::Error>> {
    match matches.value_of("count") {
        Some(value) => Ok(Some(value.parse::<u64>()?)),
        None => Ok(None),
    }
}

fn validate_range(value: &str, max: u64) -> Result<(), String> {
    match value.parse::<u64>() {
        Ok(v) if v <= max => Ok(()),
        _ => Err(format!("expected an integer between 0 and {}", max)),
    }
}
