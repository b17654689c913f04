// ==========================================
// Duty Roster Engine - command line entry
// ==========================================
// init / seed / serve / allocate / weights / show / config
// ==========================================

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use duty_roster_engine::app::{get_default_db_path, seed_default_categories, AppState};
use duty_roster_engine::db::{read_schema_version, open_sqlite_connection};
use duty_roster_engine::{logging, ActorRole, WeightStage, APP_NAME, VERSION};

#[derive(Parser, Debug)]
#[command(name = "duty-roster")]
#[command(about = "Duty allocation and fairness weighting for cohort rosters")]
#[command(version)]
struct Args {
    /// SQLite database path (defaults to the user data directory)
    #[arg(long, env = "DUTY_DB_PATH")]
    db_path: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema
    Init,
    /// Insert the default duty categories and canteen stations
    Seed,
    /// Run the distribution poll loop until Ctrl-C
    Serve,
    /// Allocate shifts and stations for one day
    Allocate {
        /// Duty date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Replace an existing allocation
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Role of the caller (admin, sergeant, assistant, ...)
        #[arg(long)]
        actor: String,
    },
    /// Finalize the survey and recompute category weights
    Weights {
        /// main, canteen or female; every stage when omitted
        #[arg(long)]
        stage: Option<String>,
        #[arg(long, default_value = "admin")]
        actor: String,
    },
    /// Print the assignments of one day
    Show {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only the people sharing a shift or station with this person
        #[arg(long)]
        person: Option<String>,
    },
    /// Read or override configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print every overridden key as JSON
    Show,
    /// Override one key
    Set { key: String, value: String },
}

fn parse_actor(raw: &str) -> Result<ActorRole> {
    ActorRole::parse(raw).ok_or_else(|| anyhow!("unknown actor role '{}'", raw))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_json);

    let db_path = args.db_path.unwrap_or_else(get_default_db_path);
    info!(version = VERSION, db_path = %db_path, "{}", APP_NAME);

    let state = AppState::new(db_path.clone())
        .map_err(|e| anyhow!(e))
        .context("failed to initialize application state")?;

    match args.command {
        Command::Init => {
            let conn = open_sqlite_connection(&db_path)?;
            let version = read_schema_version(&conn)?;
            println!("schema ready at {} (version {:?})", db_path, version);
        }
        Command::Seed => {
            let settings = state.config_manager.load_allocation_settings()?;
            let total = seed_default_categories(&state.repos.category_repo, &settings)?;
            println!("{} categories present", total);
        }
        Command::Serve => {
            let handle = state.scheduler().spawn();
            signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
            info!("shutting down");
            handle.abort();
        }
        Command::Allocate { date, force, actor } => {
            let actor = parse_actor(&actor)?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let report = state.duty_api.trigger_allocation_async(actor, date, force).await?;
            print_json(&report)?;
        }
        Command::Weights { stage, actor } => {
            let actor = parse_actor(&actor)?;
            let stage = match stage {
                Some(raw) => Some(WeightStage::parse(&raw).ok_or_else(|| anyhow!("unknown stage '{}'", raw))?),
                None => None,
            };
            let results = state.survey_api.finalize(actor, stage)?;
            for r in &results {
                println!("[{}] {} weights, {} votes skipped", r.stage, r.weights.len(), r.skipped_votes);
                for w in &r.weights {
                    println!("  category {:>4}: {:.2}", w.category_id, w.weight);
                }
            }
        }
        Command::Show { date, person } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            match person {
                Some(p) => print_json(&state.duty_api.with_whom(&p, date)?)?,
                None => {
                    print_json(&state.duty_api.shifts_for_date(date)?)?;
                    print_json(&state.duty_api.stations_for_date(date)?)?;
                }
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => println!("{}", state.config_manager.get_config_snapshot()?),
            ConfigAction::Set { key, value } => {
                state.config_manager.set_global_config_value(&key, &value)?;
                println!("{} = {}", key, value);
            }
        },
    }

    Ok(())
}
