use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, Subcommand};
use log::debug;

use college_transport::client::pages::{Dashboard, LoginPage, MyBooking, Profile};
use college_transport::client::{
    resolve, ApiClient, ApiError, AuthContext, Resolution, Route, SessionFile, DEFAULT_API_BASE,
};
use college_transport::models::{StudentResponse, TripType};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("could not read input: {0}")]
    Io(#[from] io::Error),
    #[error("not logged in; run `transport login --email <email>` first")]
    LoginRequired,
    #[error("{0}")]
    Failed(String),
}

#[derive(Parser, Debug)]
#[command(name = "transport", about = "Book a seat on the college bus")]
struct Cli {
    #[arg(long, env = "TRANSPORT_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    #[arg(long, env = "TRANSPORT_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "TRANSPORT_PASSWORD")]
        password: Option<String>,
    },
    Logout,
    /// Show the screen at a path: /, /login, /profile or /my-booking.
    Open { path: String },
    Dashboard,
    Profile,
    Booking,
    Book {
        bus_id: String,
        /// Trip date, YYYY-MM-DD. Defaults to next Monday.
        #[arg(long)]
        date: Option<String>,
        /// Departure time, HH:MM.
        #[arg(long)]
        time: Option<String>,
        /// Pickup stop id.
        #[arg(long)]
        stop: Option<i64>,
        #[arg(long)]
        weekend: bool,
    },
    Verify { code: String },
    Resend,
    Cancel,
}

impl Command {
    fn route(&self) -> Route {
        match self {
            Command::Login { .. } => Route::Login,
            Command::Profile => Route::Profile,
            Command::Booking => Route::MyBooking,
            _ => Route::Dashboard,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    exit_code(execute(Cli::parse()).await)
}

fn exit_code(result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    let sessions = SessionFile::new(cli.session_file.unwrap_or_else(SessionFile::default_path));
    let api = ApiClient::new(&cli.api_base)?;
    let mut auth = AuthContext::new(api, sessions);
    auth.restore().await;
    debug!("Auth state after restore: {:?}", auth.state());

    match cli.command {
        Command::Logout => {
            auth.logout().await;
            println!("Logged out.");
            Ok(())
        }
        Command::Open { path } => match resolve(&path, auth.is_authenticated()) {
            Resolution::Show(route) => show(&auth, route).await,
            Resolution::Redirect(route) => {
                println!("Redirecting to {}\n", route.path());
                show(&auth, route).await
            }
        },
        Command::Login { email, password } => {
            if let Some(user) = auth.user() {
                println!("Already logged in as {}.", user.email);
                return Ok(());
            }
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            let mut page = LoginPage::new();
            match page.submit(&mut auth, &email, &password).await {
                Some(user) => {
                    println!("Welcome, {}!", user.full_name());
                    Ok(())
                }
                None => Err(CliError::Failed(
                    page.error().unwrap_or("Invalid email or password").to_string(),
                )),
            }
        }
        command => {
            let Resolution::Show(_) = resolve(command.route().path(), auth.is_authenticated())
            else {
                return Err(CliError::LoginRequired);
            };
            run(&auth, command).await
        }
    }
}

fn prompt(label: &str) -> Result<String, CliError> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn student(auth: &AuthContext) -> Result<&StudentResponse, CliError> {
    auth.user().ok_or(CliError::LoginRequired)
}

async fn show(auth: &AuthContext, route: Route) -> Result<(), CliError> {
    match route {
        Route::Login => {
            print!("{}", LoginPage::new().render());
            Ok(())
        }
        Route::Dashboard => run(auth, Command::Dashboard).await,
        Route::Profile => run(auth, Command::Profile).await,
        Route::MyBooking => run(auth, Command::Booking).await,
    }
}

fn finish(ok: bool, page: String, error: Option<&str>) -> Result<(), CliError> {
    print!("{page}");
    if ok {
        Ok(())
    } else {
        Err(CliError::Failed(error.unwrap_or("Request failed").to_string()))
    }
}

async fn run(auth: &AuthContext, command: Command) -> Result<(), CliError> {
    let user = student(auth)?;
    let api = auth.api();
    let today = Local::now().date_naive();

    match command {
        Command::Profile => {
            print!("{}", Profile::render(user));
            Ok(())
        }
        Command::Booking => {
            let mut page = MyBooking::new();
            let ok = page.load(api).await;
            finish(ok, page.render(), page.error())
        }
        Command::Dashboard => {
            let mut page = Dashboard::new(today);
            let ok = page.load(api).await;
            finish(ok, page.render(user), page.error())
        }
        Command::Book {
            bus_id,
            date,
            time,
            stop,
            weekend,
        } => {
            let mut page = Dashboard::new(today);
            if !page.load(api).await {
                return finish(false, page.render(user), page.error());
            }
            page.set_trip(date, time);
            if weekend {
                page.set_trip_type(Some(TripType::Weekend));
            }
            let ok = page.book(api, &bus_id, stop).await;
            finish(ok, page.render(user), page.error())
        }
        Command::Verify { code } => {
            let mut page = Dashboard::new(today);
            let ok = page.load(api).await && page.verify(api, &code).await;
            finish(ok, page.render(user), page.error())
        }
        Command::Resend => {
            let mut page = Dashboard::new(today);
            let ok = page.load(api).await && page.resend(api).await;
            finish(ok, page.render(user), page.error())
        }
        Command::Cancel => {
            let mut page = Dashboard::new(today);
            let ok = page.load(api).await && page.cancel(api).await;
            finish(ok, page.render(user), page.error())
        }
        Command::Login { .. } | Command::Logout | Command::Open { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn book_arguments_parse() {
        let cli = Cli::try_parse_from([
            "transport", "book", "65f0c0ffee0000000000bbbb", "--date", "2026-10-24", "--stop", "1",
            "--weekend",
        ])
        .unwrap();
        match cli.command {
            Command::Book { bus_id, date, stop, weekend, .. } => {
                assert_eq!(bus_id, "65f0c0ffee0000000000bbbb");
                assert_eq!(date.as_deref(), Some("2026-10-24"));
                assert_eq!(stop, Some(1));
                assert!(weekend);
            }
            other => panic!("parsed as {other:?}"),
        }
    }

    #[test]
    fn failures_show_the_message_not_the_variant() {
        let err = CliError::Failed("Bus is full".into());
        assert_eq!(err.to_string(), "Bus is full");
        assert_eq!(
            CliError::LoginRequired.to_string(),
            "not logged in; run `transport login --email <email>` first"
        );
    }
}
