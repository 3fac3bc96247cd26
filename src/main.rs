extern crate clap;

mod errors;
mod map;
mod network;
mod random;
mod results;
mod run;
mod stats;
mod storage;
mod timer;
mod tui;

use std::future::Future;
use std::io::{self, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use colored::Colorize;
use log::{debug, info, warn, LevelFilter};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::errors::{exit_codes, format_error_for_display, ErrorKind, SpeedTestError};
use crate::map::MapView;
use crate::network::connectivity::{
    probe_online, watch_connectivity, DEFAULT_PROBE_ADDR, DEFAULT_PROBE_TIMEOUT,
};
use crate::network::geolocation::{source_from, Coordinates};
use crate::network::{
    local_timezone, ConnectionHint, NetworkInfo, NetworkInfoResolver,
    ResolverConfig, ResolverContext,
};
use crate::random::SeededRandom;
use crate::results::{RunReport, SessionReport};
use crate::run::{RunOutcome, SimulationConfig, TestRunController};
use crate::storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::tui::{spawn_key_reader, Command, DisplayMode, TuiController};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (rev ",
    env!("SPEEDSTREAM_BUILD_GIT_HASH"),
    ")"
);

/// Redraw rate of the interactive screen.
const FRAME_INTERVAL: Duration = Duration::from_millis(50);
/// How often connectivity is re-probed while the TUI is open.
const CONNECTIVITY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity,

    /// Print a JSON session report instead of the interactive screen
    #[arg(long)]
    json: bool,

    /// Run without the interactive screen and print a plain summary
    #[arg(long)]
    batch: bool,

    /// Runs to perform in batch or JSON mode
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=100))]
    runs: u32,

    /// Seed for the simulated metrics and mock identity
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the IP lookup services and use only local fallbacks
    #[arg(long)]
    offline_lookup: bool,

    /// Timeout in seconds for each lookup request
    #[arg(long, default_value_t = 8)]
    lookup_timeout: u64,

    /// Effective connection type hint: slow-2g, 2g, 3g or 4g
    #[arg(long)]
    effective_type: Option<String>,

    /// Downlink estimate hint in Mbps
    #[arg(long)]
    downlink: Option<f64>,

    /// Interface type hint, e.g. wifi or ethernet
    #[arg(long)]
    interface_type: Option<String>,

    /// Device latitude, used for reverse geocoding and the map
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    latitude: Option<f64>,

    /// Device longitude, used for reverse geocoding and the map
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    longitude: Option<f64>,

    /// IANA timezone used when a lookup does not report one
    #[arg(long)]
    timezone: Option<String>,

    /// Save a map access token, then continue
    #[arg(long)]
    map_token: Option<String>,

    /// Remove the saved map access token, then continue
    #[arg(long, conflicts_with = "map_token")]
    forget_map_token: bool,

    /// Hide the map panel
    #[arg(long)]
    no_map: bool,
}

impl Cli {
    fn coordinates(&self) -> Result<Option<Coordinates>, SpeedTestError> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude)
        else {
            return Ok(None);
        };

        let coordinates = Coordinates::new(latitude, longitude);
        if !coordinates.is_valid() {
            return Err(SpeedTestError::config(format!(
                "invalid coordinates {}, {}",
                latitude, longitude
            ))
            .with_suggestion(
                "Latitude must be within ±90 and longitude within ±180.",
            ));
        }

        Ok(Some(coordinates))
    }

    fn connection_hint(&self) -> Option<ConnectionHint> {
        let hint = ConnectionHint {
            effective_type: self.effective_type.clone(),
            downlink_mbps: self.downlink,
            interface_type: self.interface_type.clone(),
        };

        (!hint.is_empty()).then_some(hint)
    }

    fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            lookup_timeout: Duration::from_secs(self.lookup_timeout.max(1)),
            offline_lookup: self.offline_lookup,
            ..ResolverConfig::default()
        }
    }

    /// Seeds for the resolver and the run controller, kept apart so the
    /// two random streams differ.
    fn seeds(&self) -> (Option<u64>, Option<u64>) {
        (self.seed.map(|seed| seed.wrapping_add(1)), self.seed)
    }
}

/// Inputs for building a resolver, kept so a lost one can be rebuilt.
struct ResolverBlueprint {
    config: ResolverConfig,
    coordinates: Option<Coordinates>,
    seed: Option<u64>,
}

impl ResolverBlueprint {
    fn build(&self) -> Result<NetworkInfoResolver, SpeedTestError> {
        NetworkInfoResolver::from_config(
            &self.config,
            source_from(self.coordinates),
            Box::new(SeededRandom::new(self.seed)),
        )
    }
}

/// Everything both front ends need, built before either starts.
struct Session {
    resolver: NetworkInfoResolver,
    blueprint: ResolverBlueprint,
    context: ResolverContext,
    map: Option<MapView>,
    map_error: Option<SpeedTestError>,
    run_seed: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mode =
        DisplayMode::detect(cli.json, cli.batch, io::stdout().is_terminal());

    init_logging(&cli, mode);

    let code = match run(cli, mode).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error_for_display(&e));
            e.exit_code()
        }
    };

    std::process::exit(code);
}

/// Log to stderr; silenced in TUI mode where it would tear the screen.
fn init_logging(cli: &Cli, mode: DisplayMode) {
    let level = if mode.is_interactive() {
        LevelFilter::Off
    } else {
        cli.verbose.log_level_filter()
    };

    env_logger::Builder::new().filter_level(level).init();
}

async fn run(cli: Cli, mode: DisplayMode) -> Result<i32, SpeedTestError> {
    let session = prepare(&cli).await?;

    match mode {
        DisplayMode::Tui => run_interactive(session).await,
        DisplayMode::Silent | DisplayMode::Json => {
            run_batch(session, cli.runs, mode).await
        }
    }
}

async fn prepare(cli: &Cli) -> Result<Session, SpeedTestError> {
    let coordinates = cli.coordinates()?;
    let store = credential_store();

    if let Some(ref token) = cli.map_token {
        map::save_token(&*store, token)?;
    }
    if cli.forget_map_token {
        map::forget_token(&*store)?;
    }

    let online = probe_online(DEFAULT_PROBE_ADDR, DEFAULT_PROBE_TIMEOUT).await;
    debug!("Initial connectivity: {}", online);

    let context = ResolverContext {
        online,
        connection_hint: cli.connection_hint(),
        timezone: cli.timezone.clone().unwrap_or_else(local_timezone),
    };

    let (resolver_seed, run_seed) = cli.seeds();
    let blueprint = ResolverBlueprint {
        config: cli.resolver_config(),
        coordinates,
        seed: resolver_seed,
    };
    let resolver = blueprint.build()?;

    let (map, map_error) = if cli.no_map {
        (None, None)
    } else {
        match MapView::prepare(&*store, &*source_from(coordinates)).await {
            Ok(view) => (Some(view), None),
            Err(e) => {
                warn!("Map unavailable: {}", e);
                (None, Some(e))
            }
        }
    };

    Ok(Session { resolver, blueprint, context, map, map_error, run_seed })
}

/// The config-directory store, or a session-only one when there is no
/// config directory.
fn credential_store() -> Box<dyn CredentialStore> {
    match FileCredentialStore::default_location() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("{}; the map token will not be saved", e);
            Box::new(MemoryCredentialStore::new())
        }
    }
}

/// What the batch loop produced.
struct BatchOutcome {
    reports: Vec<RunReport>,
    cancelled: bool,
}

impl BatchOutcome {
    fn exit_code(&self) -> i32 {
        if self.cancelled {
            exit_codes::INTERRUPTED
        } else {
            exit_codes::SUCCESS
        }
    }
}

/// Perform up to `runs` runs back to back.
///
/// When `interrupt` resolves, the active run is cancelled through `reset`,
/// nothing is recorded for it, and no further runs start.
async fn perform_runs<F, Fut>(
    controller: &TestRunController,
    runs: u32,
    mut interrupt: F,
) -> BatchOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut reports = Vec::new();

    for index in 1..=runs {
        info!("Run {}/{}", index, runs);

        let outcome = tokio::select! {
            biased;
            _ = interrupt() => {
                controller.reset();
                RunOutcome::Cancelled
            }
            outcome = controller.start() => outcome,
        };

        match outcome {
            RunOutcome::Completed(result) => {
                reports.push(RunReport::from_state(result, &controller.state()));
            }
            RunOutcome::Cancelled => {
                info!("Interrupted during run {}", index);
                return BatchOutcome { reports, cancelled: true };
            }
            RunOutcome::AlreadyRunning => debug!("Run {} skipped", index),
        }
    }

    BatchOutcome { reports, cancelled: false }
}

/// Resolves on Ctrl-C; never, when the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run_batch(
    mut session: Session,
    runs: u32,
    mode: DisplayMode,
) -> Result<i32, SpeedTestError> {
    let network = session.resolver.resolve(&session.context).await;

    let controller = TestRunController::new(SimulationConfig::default())
        .with_random(Box::new(SeededRandom::new(session.run_seed)));

    let outcome = perform_runs(&controller, runs, ctrl_c).await;
    let code = outcome.exit_code();

    let report = SessionReport::new(
        network,
        outcome.reports,
        &controller.history(),
        session.map,
        outcome.cancelled,
    );

    match mode {
        DisplayMode::Json => {
            println!("{}", report.to_json()?);
            // stdout stays pure JSON.
            if let Some(warning) = report.warning() {
                eprintln!("{} {}", "Warning:".bold().yellow(), warning);
            }
        }
        _ => println!("{}", report.to_text()),
    }

    if let Some(e) = session.map_error {
        eprintln!("{}", format_error_for_display(&e));
    }

    Ok(code)
}

type Resolution = (NetworkInfoResolver, NetworkInfo);

/// Refresh `network` in place on a background task; the resolver comes
/// back with the result.
fn spawn_resolution(
    mut resolver: NetworkInfoResolver,
    context: ResolverContext,
    mut network: NetworkInfo,
) -> JoinHandle<Resolution> {
    tokio::spawn(async move {
        resolver.refresh(&context, &mut network).await;
        (resolver, network)
    })
}

/// Split a finished resolution into the resolver for the next refresh and
/// the record to show.
///
/// A task that panicked loses its resolver; a new one is built from
/// `blueprint` so refresh keeps working.
fn settle_resolution(
    joined: Result<Resolution, JoinError>,
    blueprint: &ResolverBlueprint,
) -> (Option<NetworkInfoResolver>, Result<NetworkInfo, SpeedTestError>) {
    let e = match joined {
        Ok((resolver, network)) => return (Some(resolver), Ok(network)),
        Err(e) => e,
    };

    warn!("Network resolution task failed: {}", e);
    let failure = SpeedTestError::new(
        ErrorKind::Unknown,
        "network details could not be resolved",
    );

    match blueprint.build() {
        Ok(resolver) => (
            Some(resolver),
            Err(failure.with_suggestion("Press f to try again.")),
        ),
        Err(rebuild) => {
            warn!("Could not rebuild the resolver: {}", rebuild);
            (
                None,
                Err(failure.with_suggestion(
                    "Refresh is unavailable; restart speedstream to retry.",
                )),
            )
        }
    }
}

/// Completes when the in-flight resolution does; never, when there is none.
async fn next_resolution(
    task: &mut Option<JoinHandle<Resolution>>,
) -> Result<Resolution, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn run_interactive(session: Session) -> Result<i32, SpeedTestError> {
    let Session { resolver, blueprint, mut context, map, map_error, run_seed } =
        session;

    let mut tui = TuiController::new(DisplayMode::Tui);
    if let Some(map) = map {
        tui.set_map(map);
    }
    if let Some(e) = map_error {
        tui.set_error(e.message, e.suggestion);
    }
    tui.set_online(context.online);

    let controller = Arc::new(
        TestRunController::new(SimulationConfig::default())
            .with_random(Box::new(SeededRandom::new(run_seed)))
            .with_progress(tui.progress_callback()),
    );

    tui.init().map_err(SpeedTestError::terminal)?;

    let stop = Arc::new(AtomicBool::new(false));
    let (command_tx, mut commands) = mpsc::unbounded_channel();
    let key_reader = spawn_key_reader(command_tx, Arc::clone(&stop));

    let (mut online_rx, watcher) = watch_connectivity(
        DEFAULT_PROBE_ADDR,
        CONNECTIVITY_INTERVAL,
        DEFAULT_PROBE_TIMEOUT,
    );
    let mut watching = true;

    let mut idle_resolver = None;
    let mut resolution = Some(spawn_resolution(
        resolver,
        context.clone(),
        NetworkInfo::placeholder(context.online),
    ));
    let mut frames = tokio::time::interval(FRAME_INTERVAL);

    let result = loop {
        tokio::select! {
            _ = frames.tick() => {
                if let Err(e) = tui.render() {
                    break Err(SpeedTestError::terminal(e));
                }
            }
            Some(command) = commands.recv() => match command {
                Command::Quit => break Ok(exit_codes::SUCCESS),
                Command::Start => {
                    if controller.is_running() {
                        debug!("Start ignored: a run is active");
                        continue;
                    }
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move { controller.start().await });
                }
                Command::Reset => controller.reset(),
                Command::Refresh => match idle_resolver.take() {
                    Some(resolver) => {
                        tui.clear_error();
                        tui.set_resolving();
                        resolution = Some(spawn_resolution(
                            resolver,
                            context.clone(),
                            tui.snapshot().network,
                        ));
                    }
                    None => debug!("Refresh ignored: no resolver available"),
                },
            },
            changed = online_rx.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let online = *online_rx.borrow_and_update();
                context.online = online;
                tui.set_online(online);
            }
            joined = next_resolution(&mut resolution) => {
                resolution = None;
                let (resolver, network) = settle_resolution(joined, &blueprint);
                idle_resolver = resolver;
                match network {
                    // Connectivity may have changed while resolving.
                    Ok(network) => tui.set_network(network.with_online(context.online)),
                    Err(e) => {
                        tui.set_network(tui.snapshot().network);
                        tui.set_error(e.message, e.suggestion);
                    }
                }
            }
        }
    };

    controller.reset();
    stop.store(true, Ordering::SeqCst);
    watcher.abort();
    tui.cleanup().map_err(SpeedTestError::terminal)?;
    let _ = key_reader.await;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::InstantTicker;

    fn controller() -> TestRunController {
        TestRunController::new(SimulationConfig::default())
            .with_ticker(Arc::new(InstantTicker::new()))
            .with_random(Box::new(SeededRandom::new(Some(3))))
    }

    fn offline_blueprint() -> ResolverBlueprint {
        ResolverBlueprint {
            config: ResolverConfig {
                offline_lookup: true,
                ..ResolverConfig::default()
            },
            coordinates: None,
            seed: Some(7),
        }
    }

    #[tokio::test]
    async fn test_batch_completes_every_run() {
        let controller = controller();

        let outcome =
            perform_runs(&controller, 2, std::future::pending::<()>).await;

        assert!(!outcome.cancelled);
        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(outcome.exit_code(), exit_codes::SUCCESS);
        assert_eq!(controller.history().entries().len(), 2);
    }

    #[tokio::test]
    async fn test_interrupt_before_first_run() {
        let controller = controller();

        let outcome = perform_runs(&controller, 3, || std::future::ready(())).await;

        assert!(outcome.cancelled);
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.exit_code(), exit_codes::INTERRUPTED);
    }

    #[tokio::test]
    async fn test_interrupt_cancels_run_and_exits_130() {
        let controller = controller();

        // Fires a few scheduler turns into the ping phase.
        let outcome = perform_runs(&controller, 3, || async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        })
        .await;

        assert!(outcome.cancelled);
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.exit_code(), exit_codes::INTERRUPTED);
        assert!(controller.state().is_idle_zero());
        assert!(!controller.is_running());

        let report = SessionReport::new(
            NetworkInfo::placeholder(true),
            outcome.reports,
            &controller.history(),
            None,
            outcome.cancelled,
        );
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["cancelled"], true);
        assert_eq!(json["runs"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_interrupt_keeps_finished_runs() {
        let controller = controller();
        let mut calls = 0;

        let outcome = perform_runs(&controller, 3, || {
            calls += 1;
            let fire = calls > 1;
            async move {
                if !fire {
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(controller.history().entries().len(), 1);
        assert_eq!(outcome.exit_code(), exit_codes::INTERRUPTED);
    }

    #[tokio::test]
    async fn test_panicked_resolution_rebuilds_resolver() {
        let handle: JoinHandle<Resolution> =
            tokio::spawn(async { panic!("resolver crashed") });
        let joined = handle.await;
        assert!(joined.is_err());

        let (resolver, network) = settle_resolution(joined, &offline_blueprint());

        assert!(resolver.is_some());
        let error = network.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert_eq!(error.suggestion.as_deref(), Some("Press f to try again."));
    }

    #[tokio::test]
    async fn test_finished_resolution_returns_resolver_and_record() {
        let resolver = offline_blueprint().build().unwrap();
        let mut network = NetworkInfo::placeholder(true);
        network.source = crate::network::InfoSource::Mock;

        let (resolver, settled) =
            settle_resolution(Ok((resolver, network.clone())), &offline_blueprint());

        assert!(resolver.is_some());
        assert_eq!(settled.unwrap(), network);
    }

    #[test]
    fn test_forget_map_token_conflicts_with_map_token() {
        let parsed = Cli::try_parse_from([
            "speedstream",
            "--map-token",
            "pk.test",
            "--forget-map-token",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from(["speedstream", "--forget-map-token"]).unwrap();
        assert!(cli.forget_map_token);
    }
}
