//! `softap run`: bring the hotspot up, report notifications and accept
//! line commands on stdin until stopped.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use softap_core::{
    ApStatus, Backends, ClientFilter, Command as CoreCommand, CommandResult, HotspotClient,
    HotspotEvent, SoftApConfiguration, SoftApController, SoftApStatus, StartFailure, WpsConfig,
};
use softap_hal::local::LocalHal;
use tabled::Tabled;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::acl::AclRow;
use super::util;

// ── Line commands ───────────────────────────────────────────────────

/// Commands accepted on stdin while the hotspot runs.
#[derive(Debug, Parser)]
#[command(name = "softap>", no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: LineCommand,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum LineCommand {
    /// List tracked clients
    Clients {
        #[arg(value_enum, default_value = "all")]
        filter: LineFilter,
    },
    /// Show the hotspot status
    Status,
    /// Kick a station and keep it out
    Block { mac: String },
    /// Let a blocked station back in
    Unblock { mac: String },
    /// Add a device to the allow-list
    Allow {
        mac: String,
        /// Display name (may contain spaces)
        #[arg(trailing_var_arg = true)]
        name: Vec<String>,
    },
    /// Remove a device from the allow-list
    Disallow { mac: String },
    /// Show the allow-list
    Allowed,
    /// Let every device join, or only allow-listed ones
    AllowAll {
        #[arg(value_enum)]
        state: Toggle,
        /// When turning off, first allow-list the clients connected now
        #[arg(long)]
        keep_connected: bool,
    },
    /// Start a WPS session
    Wps {
        #[command(subcommand)]
        mode: WpsMode,
    },
    /// Stop after this long without clients ("0s" never stops)
    AutoDisable { duration: String },
    /// Stop the hotspot and exit
    #[command(alias = "quit", alias = "exit")]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LineFilter {
    All,
    Connected,
    Blocked,
}

impl From<LineFilter> for ClientFilter {
    fn from(f: LineFilter) -> Self {
        match f {
            LineFilter::All => Self::All,
            LineFilter::Connected => Self::Connected,
            LineFilter::Blocked => Self::Blocked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum WpsMode {
    /// Push-button configuration
    Pbc,
    /// PIN read from the enrollee
    Pin { pin: String },
}

fn parse_line(text: &str) -> Result<Option<LineCommand>, clap::Error> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    Line::try_parse_from(words).map(|l| Some(l.command))
}

enum Flow {
    Continue,
    Stop,
}

// ── Table rows ──────────────────────────────────────────────────────

fn local_time(t: chrono::DateTime<chrono::Utc>) -> String {
    t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string()
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Blocked")]
    blocked: String,
    #[tabled(rename = "Connected")]
    connected: String,
}

impl ClientRow {
    fn new(c: &HotspotClient, color: bool) -> Self {
        Self {
            mac: c.mac.to_string(),
            name: c.display_name().unwrap_or("-").to_owned(),
            ip: c.ip.map_or_else(|| "-".into(), |ip| ip.to_string()),
            blocked: output::yes_no(c.blocked, color),
            connected: c
                .connected_at
                .map_or_else(|| "-".into(), local_time),
        }
    }
}

fn status_detail(s: &SoftApStatus, color: bool) -> String {
    [
        format!("State:        {}", s.state),
        format!("AP:           {}", output::paint_status(s.ap, color)),
        format!("Interface:    {}", s.interface.as_deref().unwrap_or("-")),
        format!("Link up:      {}", s.interface_up),
        format!("Connected:    {}", s.connected),
        format!(
            "Auto-disable: {}",
            s.auto_disable_deadline
                .map_or_else(|| "-".into(), local_time)
        ),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let active = config::resolve(global)?;
    let ap_config = softap_config::profile_to_soft_ap_config(&active.profile, &active.name)?;
    let manager_config =
        softap_config::profile_to_manager_config(&active.profile, &active.defaults)?;
    let auto_disable = args
        .auto_disable
        .as_deref()
        .map(|raw| util::parse_duration("auto-disable", raw))
        .transpose()?;

    let hal = LocalHal::new(softap_config::profile_to_local_hal_config(
        &active.profile,
        &active.defaults,
    ));
    // The auto-disable alarm asks the host to tear the hotspot down.
    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    let backends = Backends {
        registry: hal.registry(),
        ap_interface: hal.ap_interface(),
        network: hal.network(),
        tethering: Arc::new(move || {
            let _ = stop_tx.send(());
        }),
    };

    let controller = SoftApController::new(manager_config, backends);
    controller.launch()?;
    let outcome = bring_up(&controller, ap_config, auto_disable, &args, &mut stop_rx, global).await;
    controller.shutdown().await;
    outcome
}

async fn bring_up(
    controller: &SoftApController,
    ap_config: SoftApConfiguration,
    auto_disable: Option<Duration>,
    args: &RunArgs,
    stop_rx: &mut mpsc::UnboundedReceiver<()>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut events = controller.events();
    let mut status = controller.status();

    if let Some(duration) = auto_disable {
        controller
            .execute(CoreCommand::SetAutoDisable(duration))
            .await?;
    }
    let ssid = ap_config.ssid.clone();
    controller.start(ap_config).await?;
    wait_until_enabled(&mut status, args.start_timeout).await?;

    let iface = controller.current_status().interface.unwrap_or_default();
    info!(%ssid, %iface, "hotspot is up");
    if !global.quiet {
        eprintln!("Hotspot '{ssid}' is up on {iface}. Type `help` for commands.");
    }
    serve(controller, &mut events, stop_rx, !args.no_stdin, global).await
}

async fn wait_until_enabled(
    status: &mut watch::Receiver<SoftApStatus>,
    seconds: u64,
) -> Result<(), CliError> {
    let waited = tokio::time::timeout(
        Duration::from_secs(seconds),
        status.wait_for(|s| matches!(s.ap, ApStatus::Enabled | ApStatus::Failed)),
    )
    .await;
    let snapshot = match waited {
        Err(_) => return Err(CliError::Timeout { seconds }),
        Ok(Err(_)) => {
            return Err(CliError::Daemon {
                message: "controller stopped".into(),
            });
        }
        Ok(Ok(s)) => s.clone(),
    };
    if snapshot.ap == ApStatus::Failed {
        return Err(CliError::StartFailed {
            reason: snapshot.failure.unwrap_or(StartFailure::General),
        });
    }
    Ok(())
}

async fn next_line(lines: &mut Option<Lines<BufReader<Stdin>>>) -> Option<String> {
    match lines {
        Some(lines) => match lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "cannot read stdin");
                None
            }
        },
        None => std::future::pending().await,
    }
}

async fn serve(
    controller: &SoftApController,
    events: &mut broadcast::Receiver<HotspotEvent>,
    stop_rx: &mut mpsc::UnboundedReceiver<()>,
    read_stdin: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut lines = read_stdin.then(|| BufReader::new(tokio::io::stdin()).lines());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, stopping hotspot");
                return Ok(());
            }
            Some(()) = stop_rx.recv() => {
                info!("no clients for the auto-disable period, stopping hotspot");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => report_event(controller, &event, color, global.quiet)?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "missed notifications");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            line = next_line(&mut lines) => match line {
                Some(text) => match parse_line(&text) {
                    Ok(None) => {}
                    Ok(Some(command)) => match run_line(controller, command, global, color).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Stop) => return Ok(()),
                        Err(e) => eprintln!("{:?}", miette::Report::new(e)),
                    },
                    Err(e) => eprintln!("{e}"),
                },
                None => {
                    debug!("stdin closed");
                    lines = None;
                }
            },
        }
    }
}

/// Print a notification. A failed AP ends the session with an error.
fn report_event(
    controller: &SoftApController,
    event: &HotspotEvent,
    color: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let line = match event {
        HotspotEvent::StatusChanged {
            status: ApStatus::Failed,
            failure,
            ..
        } => {
            return Err(CliError::StartFailed {
                reason: failure.unwrap_or(StartFailure::General),
            });
        }
        HotspotEvent::StatusChanged { status, .. } => {
            format!("status: {}", output::paint_status(*status, color))
        }
        HotspotEvent::ClientsChanged => {
            format!("clients: {} connected", controller.current_status().connected)
        }
        HotspotEvent::ClientIpReady { mac, ip, name } => match name {
            Some(name) => format!("{mac} ({name}) got {ip}"),
            None => format!("{mac} got {ip}"),
        },
        HotspotEvent::WpsOverlap => "WPS: more than one device is pushing the button".into(),
        HotspotEvent::WpsCheckPinFailed => "WPS: PIN rejected".into(),
    };
    output::print_output(&line, quiet);
    Ok(())
}

fn expect_remote(result: &CommandResult, what: &str) -> Result<(), CliError> {
    if result.succeeded() {
        Ok(())
    } else {
        Err(CliError::Daemon {
            message: format!("{what} was refused"),
        })
    }
}

async fn run_line(
    controller: &SoftApController,
    command: LineCommand,
    global: &GlobalOpts,
    color: bool,
) -> Result<Flow, CliError> {
    match command {
        LineCommand::Clients { filter } => {
            let clients = ClientFilter::from(filter).apply(&controller.clients().latest());
            let out = output::render_list(
                &global.output,
                &clients,
                |c| ClientRow::new(c, color),
                |c| c.mac.to_string(),
            )?;
            output::print_output(&out, false);
        }

        LineCommand::Status => {
            let out = output::render_single(
                &global.output,
                &controller.current_status(),
                |s| status_detail(s, color),
                |s| s.ap.to_string(),
            )?;
            output::print_output(&out, false);
        }

        LineCommand::Block { mac } => {
            let mac = util::parse_mac(&mac)?;
            let result = controller.execute(CoreCommand::BlockClient(mac)).await?;
            expect_remote(&result, "block")?;
        }

        LineCommand::Unblock { mac } => {
            let mac = util::parse_mac(&mac)?;
            let result = controller.execute(CoreCommand::UnblockClient(mac)).await?;
            expect_remote(&result, "unblock")?;
        }

        LineCommand::Allow { mac, name } => {
            let mac = util::parse_mac(&mac)?;
            let name = (!name.is_empty()).then(|| name.join(" "));
            let result = controller
                .execute(CoreCommand::AllowDevice { mac, name })
                .await?;
            expect_remote(&result, "allow-list update")?;
        }

        LineCommand::Disallow { mac } => {
            let mac = util::parse_mac(&mac)?;
            let result = controller.execute(CoreCommand::DisallowDevice(mac)).await?;
            expect_remote(&result, "allow-list update")?;
        }

        LineCommand::Allowed => {
            if let CommandResult::AllowedDevices(entries) =
                controller.execute(CoreCommand::GetAllowedDevices).await?
            {
                let out = output::render_list(
                    &global.output,
                    &entries,
                    |e| AclRow::new(e, color),
                    |e| e.mac.to_string(),
                )?;
                output::print_output(&out, false);
            }
        }

        LineCommand::AllowAll {
            state,
            keep_connected,
        } => {
            let result = controller
                .execute(CoreCommand::SetAllDevicesAllowed {
                    enabled: state == Toggle::On,
                    allow_connected: keep_connected,
                })
                .await?;
            expect_remote(&result, "access policy change")?;
        }

        LineCommand::Wps { mode } => {
            let config = match mode {
                WpsMode::Pbc => WpsConfig::PushButton,
                WpsMode::Pin { pin } => WpsConfig::Pin(pin),
            };
            let result = controller.execute(CoreCommand::StartWps(config)).await?;
            expect_remote(&result, "WPS start")?;
        }

        LineCommand::AutoDisable { duration } => {
            let duration = util::parse_duration("auto-disable", &duration)?;
            controller
                .execute(CoreCommand::SetAutoDisable(duration))
                .await?;
        }

        LineCommand::Stop => return Ok(Flow::Stop),
    }
    Ok(Flow::Continue)
}
