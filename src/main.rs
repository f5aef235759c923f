use std::io::Stdout;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use palaksa::api::fetch_walking_route;
use palaksa::codec;
use palaksa::config::Config;
use palaksa::db::SqliteStore;
use palaksa::engine::{Engine, EngineHandle, Snapshot};
use palaksa::entities::GeoPoint;
use palaksa::error::{invalid_input_error, Error};
use palaksa::external::{location::ManualLocation, openrouteservice::OpenRouteService};
use palaksa::map::{MapView, TerminalSurface, Viewport};
use palaksa::persistence::PersistenceStore;

type Screen = Arc<Mutex<MapView<TerminalSurface<Stdout>>>>;

#[derive(Parser, Debug)]
#[command(version, about = "Walking routes on a terminal map", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the walking route between two points and exit
    Route {
        /// Start point as `lat,lon`
        #[arg(value_parser = parse_point, allow_hyphen_values = true)]
        start: GeoPoint,
        /// End point as `lat,lon`
        #[arg(value_parser = parse_point, allow_hyphen_values = true)]
        end: GeoPoint,
    },
}

fn parse_point(value: &str) -> Result<GeoPoint, String> {
    codec::decode(value).ok_or_else(|| format!("expected `lat,lon`, got `{}`", value))
}

const HELP: &str = "commands: grant | deny | locate [lat,lon] | tap <x> <y> | pick <lat>,<lon> | route | clear | show | quit";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::from_env()?;
    tracing::info!(?config, "starting");

    if let Some(Command::Route { start, end }) = cli.command {
        return print_route(&config, start, end).await;
    }

    let store = SqliteStore::new(&config.database_url, 1, &config.namespace).await?;
    let location = Arc::new(ManualLocation::new(config.location));
    let routes = Arc::new(OpenRouteService::from_config(&config));

    let (engine, handle) = Engine::new(
        false,
        PersistenceStore::new(Arc::new(store)),
        routes,
        location.clone(),
    )
    .await;
    let engine_task = tokio::spawn(engine.run());

    let center = config
        .location
        .or(handle.snapshot().route.origin)
        .unwrap_or(GeoPoint::new_unchecked(0.0, 0.0));
    let mut view = MapView::new(
        TerminalSurface::new(std::io::stdout()),
        Viewport::new(center, 16.0, 1080.0, 1920.0),
    );
    let tap_handle = handle.clone();
    view.on_tap(move |point| {
        if let Err(err) = tap_handle.try_tap(point) {
            tracing::warn!("tap dropped: {}", err);
        }
    });

    let screen: Screen = Arc::new(Mutex::new(view));
    tokio::spawn(render_loop(handle.clone(), screen.clone()));

    println!("{}", HELP);
    let input = BufReader::new(tokio::io::stdin());

    serve(input, handle, engine_task, &screen, &location).await
}

/// Runs the command loop, then stops the engine whether or not reading input
/// failed.
async fn serve<R>(
    input: R,
    handle: EngineHandle,
    engine_task: JoinHandle<()>,
    screen: &Screen,
    location: &ManualLocation,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    let result = repl(input, &handle, screen, location).await;

    handle.shutdown().await?;
    if engine_task.await.is_err() {
        tracing::error!("engine task panicked");
    }

    result
}

async fn repl<R>(
    input: R,
    handle: &EngineHandle,
    screen: &Screen,
    location: &ManualLocation,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();

        let result = match words.as_slice() {
            [] => Ok(()),
            ["quit"] | ["exit"] => break,
            ["help"] => {
                println!("{}", HELP);
                Ok(())
            }
            ["grant"] => handle.grant_permission().await,
            ["deny"] => handle.deny_permission().await,
            ["locate"] => handle.request_location().await,
            ["locate", point] => match codec::decode(point) {
                Some(point) => {
                    location.set(point).await;
                    handle.request_location().await
                }
                None => Err(invalid_input_error()),
            },
            ["tap", x, y] => match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => {
                    screen.lock().await.tap(x, y);
                    Ok(())
                }
                _ => Err(invalid_input_error()),
            },
            ["pick", point] => match codec::decode(point) {
                Some(point) => handle.tap(point).await,
                None => Err(invalid_input_error()),
            },
            ["route"] => match handle.snapshot().route.can_compute_route() {
                true => handle.compute_route().await,
                false => {
                    println!("pick a destination first");
                    Ok(())
                }
            },
            ["clear"] => handle.clear().await,
            ["show"] => {
                print_status(&handle.snapshot());
                Ok(())
            }
            _ => {
                println!("{}", HELP);
                Ok(())
            }
        };

        if let Err(err) = result {
            println!("error: {}", err);
        }
    }

    Ok(())
}

async fn render_loop(handle: EngineHandle, screen: Screen) {
    let mut snapshots = handle.subscribe();

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        screen.lock().await.render_snapshot(&snapshot);
        print_status(&snapshot);

        if snapshots.changed().await.is_err() {
            break;
        }
    }
}

fn print_status(snapshot: &Snapshot) {
    let mut line = format!("status: {}", snapshot.status.name());

    if snapshot.routing {
        line.push_str(", calculating route");
    }
    if let Some(kind) = snapshot.last_route_error {
        line.push_str(&format!(", no route ({:?})", kind));
    }

    println!("{}", line);
}

async fn print_route(config: &Config, start: GeoPoint, end: GeoPoint) -> Result<(), Error> {
    let service = OpenRouteService::from_config(config);
    let points = fetch_walking_route(&service, start, end).await;

    println!("{}", codec::encode_list(&points));

    Ok(())
}

#[test]
fn route_subcommand_takes_two_points() {
    let cli = Cli::try_parse_from(["palaksa", "route", "40.4168,-3.7038", "-33.9,18.4"]).unwrap();
    match cli.command {
        Some(Command::Route { start, end }) => {
            assert_eq!(start, GeoPoint::new_unchecked(40.4168, -3.7038));
            assert_eq!(end, GeoPoint::new_unchecked(-33.9, 18.4));
        }
        None => panic!("route subcommand not parsed"),
    }

    assert!(Cli::try_parse_from(["palaksa"]).unwrap().command.is_none());
    assert!(Cli::try_parse_from(["palaksa", "route", "nowhere", "1,1"]).is_err());
    assert!(Cli::try_parse_from(["palaksa", "route", "1,1"]).is_err());
}

#[tokio::test]
async fn input_error_still_saves_on_the_way_out() {
    use palaksa::db::MemoryStore;
    use palaksa::entities::RouteState;

    let origin = GeoPoint::new_unchecked(40.0, -3.0);
    let destination = GeoPoint::new_unchecked(40.01, -3.01);
    let memory = Arc::new(MemoryStore::new());
    PersistenceStore::new(memory.clone())
        .save(&RouteState::new(Some(origin), Some(destination), None))
        .await
        .unwrap();

    let location = Arc::new(ManualLocation::new(None));
    let (engine, handle) = Engine::new(
        false,
        PersistenceStore::new(memory.clone()),
        Arc::new(OpenRouteService::new("http://127.0.0.1:9", "unused")),
        location.clone(),
    )
    .await;
    let engine_task = tokio::spawn(engine.run());
    let screen: Screen = Arc::new(Mutex::new(MapView::new(
        TerminalSurface::new(std::io::stdout()),
        Viewport::new(origin, 16.0, 100.0, 100.0),
    )));

    let input = tokio_test::io::Builder::new()
        .read(b"clear\n")
        .read_error(std::io::Error::new(std::io::ErrorKind::Other, "stdin closed"))
        .build();

    let result = serve(BufReader::new(input), handle, engine_task, &screen, &location).await;

    assert!(result.is_err());
    assert_eq!(
        PersistenceStore::new(memory).load().await.unwrap(),
        RouteState::new(Some(origin), None, None)
    );
}
