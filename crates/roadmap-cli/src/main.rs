use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use roadmap_core::{AnswerKey, StepStatus};
use roadmap_http::HttpRemoteStore;
use roadmap_sync::{FileCache, LocalReason, OpOutcome, SyncConfig, SyncGateway};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_JSON_ENV: &str = "ROADMAP_LOG_JSON";

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if env_bool(LOG_JSON_ENV, false) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn cli() -> Command {
    let answer_args = AnswerKey::ALL.map(|key| {
        Arg::new(key.as_str())
            .long(key.as_str())
            .value_name("OPTION")
            .help(key.question())
    });

    Command::new("roadmap")
        .version(roadmap_sync::VERSION)
        .about("Home-buying roadmap: survey, checklist and progress sync")
        .subcommand_required(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .global(true)
                .help("Backend API root (overrides ROADMAP_API_URL)"),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Local cache file (overrides ROADMAP_CACHE_PATH)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("Request timeout in seconds (overrides ROADMAP_TIMEOUT_SECS)"),
        )
        .subcommand(
            Command::new("status")
                .about("Show derived progress")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("roadmap").about("Show every step with its status"))
        .subcommand(
            Command::new("steps").about("Open a step").arg(
                Arg::new("id")
                    .required(true)
                    .value_parser(value_parser!(u32))
                    .help("Step id"),
            ),
        )
        .subcommand(
            Command::new("answer")
                .about("Answer survey questions and submit them")
                .args(answer_args),
        )
        .subcommand(
            Command::new("toggle")
                .about("Flip a checklist item")
                .arg(
                    Arg::new("step")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .help("Step id"),
                )
                .arg(Arg::new("item").required(true).help("Item id, e.g. 2c")),
        )
        .subcommand(
            Command::new("save").about("Record the amount saved so far").arg(
                Arg::new("amount")
                    .required(true)
                    .value_parser(value_parser!(f64))
                    .help("Amount in dollars"),
            ),
        )
        .subcommand(
            Command::new("commit")
                .about("Commit to a purchase timeline")
                .arg(Arg::new("timeline").required(true).help("Timeline option")),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in and pull remote progress")
                .arg(Arg::new("email").long("email").required(true))
                .arg(Arg::new("password").long("password").required(true)),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account and push local answers")
                .arg(Arg::new("username").long("username").required(true))
                .arg(Arg::new("email").long("email").required(true))
                .arg(Arg::new("password").long("password").required(true)),
        )
        .subcommand(Command::new("logout").about("Sign out and clear the local cache"))
        .subcommand(Command::new("sync").about("Pull answers and checklist from the backend"))
}

fn config(matches: &ArgMatches) -> SyncConfig {
    let mut config = SyncConfig::from_env();
    if let Some(url) = matches.get_one::<String>("api-url") {
        config = config.with_api_url(url.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("cache") {
        config = config.with_cache_path(path.clone());
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config = config.with_request_timeout(Duration::from_secs(*secs));
    }
    config
}

/// Gateway over the file cache and the HTTP backend
///
/// With `refresh`, a cached session pulls remote progress first.
async fn gateway(config: &SyncConfig, refresh: bool) -> Result<SyncGateway> {
    let cache = FileCache::open(&config.cache_path).with_context(|| {
        format!(
            "failed to open cache {}; `roadmap logout` resets it",
            config.cache_path.display()
        )
    })?;
    let remote = HttpRemoteStore::new(config).context("failed to build http client")?;
    if refresh {
        return Ok(SyncGateway::open(Arc::new(cache), Arc::new(remote)).await);
    }
    let gateway = SyncGateway::new(Arc::new(cache), Arc::new(remote));
    gateway.hydrate();
    Ok(gateway)
}

fn describe(outcome: &OpOutcome) -> String {
    match outcome {
        OpOutcome::Settled => "synced".to_string(),
        OpOutcome::Failed(e) => format!("saved locally; remote failed: {e}"),
        OpOutcome::LocalOnly(LocalReason::Anonymous) => "saved locally (not signed in)".to_string(),
        OpOutcome::LocalOnly(LocalReason::UnmappedItem(id)) => {
            format!("saved locally; {id} has no remote record")
        }
        OpOutcome::LocalOnly(LocalReason::NothingToSend) => "nothing to send".to_string(),
    }
}

fn print_status(gateway: &SyncGateway, json: bool) -> Result<()> {
    let state = gateway.state();
    let snapshot = state.snapshot();

    if json {
        let body = serde_json::json!({ "state": state, "snapshot": snapshot });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match &state.user {
        Some(user) => println!("Signed in as {} <{}>", user.username, user.email),
        None => println!("Not signed in"),
    }
    println!("Archetype: {}", snapshot.buyer_archetype);
    println!("Completion: {}%", snapshot.completion_percent);
    match snapshot.active_step_id {
        Some(id) if snapshot.journey_complete => println!("Journey complete (last step {id})"),
        Some(id) => println!("Active step: {id}"),
        None => println!("Active step: none"),
    }
    println!(
        "Savings: ${:.2} of ${} goal",
        state.saved_amount, snapshot.savings_goal
    );
    if !state.committed_timeline.is_empty() {
        println!("Committed timeline: {}", state.committed_timeline);
    }
    println!(
        "Survey: {}",
        if state.survey_completed { "completed" } else { "not completed" }
    );
    Ok(())
}

fn print_roadmap(gateway: &SyncGateway) {
    for view in gateway.roadmap() {
        let marker = match view.status {
            StepStatus::Complete => "✓",
            StepStatus::Active => "▶",
            StepStatus::Locked => "🔒",
        };
        println!(
            "{marker} {}. {} ({}/{})",
            view.id, view.title, view.completed, view.total
        );
    }
}

async fn run(matches: ArgMatches) -> Result<()> {
    let config = config(&matches);

    match matches.subcommand() {
        Some(("status", args)) => {
            let gateway = gateway(&config, false).await?;
            print_status(&gateway, args.get_flag("json"))?;
        }
        Some(("roadmap", _)) => {
            let gateway = gateway(&config, false).await?;
            print_roadmap(&gateway);
        }
        Some(("steps", args)) => {
            let id = args.get_one::<u32>("id").copied().context("missing step id")?;
            let gateway = gateway(&config, false).await?;
            let step = gateway.open_step(id)?;

            println!("Step {}: {}", step.id, step.title);
            println!("{}", step.description);
            println!();
            for item in &step.todos {
                let check = if item.completed { "x" } else { " " };
                println!("  [{check}] {} {}", item.frontend_id, item.text);
            }
            if !step.tips.is_empty() {
                println!();
                println!("Tips:");
                for tip in &step.tips {
                    println!("  - {tip}");
                }
            }
        }
        Some(("answer", args)) => {
            let gateway = gateway(&config, true).await?;
            let mut answers = gateway.state().answers;
            let mut touched = false;
            for key in AnswerKey::ALL {
                if let Some(value) = args.get_one::<String>(key.as_str()) {
                    answers.set(key, value.clone())?;
                    touched = true;
                }
            }
            if !touched {
                bail!("no answers given; pass at least one of --income, --savings, --location, --timeline, --housing");
            }
            let outcome = gateway.submit_answers(answers).await?;
            println!("Answers {}", describe(&outcome));
            println!("Archetype: {}", gateway.snapshot().buyer_archetype);
        }
        Some(("toggle", args)) => {
            let step = args.get_one::<u32>("step").copied().context("missing step id")?;
            let item = args.get_one::<String>("item").context("missing item id")?;
            let gateway = gateway(&config, true).await?;

            let handle = gateway.toggle_item(step, item).await?;
            let completed = handle.completed();
            let outcome = handle.settled().await;
            println!(
                "{item} marked {} ({})",
                if completed { "done" } else { "not done" },
                describe(&outcome)
            );
            println!("Completion: {}%", gateway.snapshot().completion_percent);
        }
        Some(("save", args)) => {
            let amount = args.get_one::<f64>("amount").copied().context("missing amount")?;
            let gateway = gateway(&config, false).await?;
            gateway.set_saved_amount(amount)?;
            let goal = gateway.snapshot().savings_goal;
            println!("Saved ${amount:.2} of ${goal} goal");
        }
        Some(("commit", args)) => {
            let timeline = args.get_one::<String>("timeline").context("missing timeline")?;
            AnswerKey::Timeline.check(timeline)?;
            let gateway = gateway(&config, false).await?;
            gateway.set_committed_timeline(timeline.clone());
            println!("Committed to buying {timeline}");
        }
        Some(("login", args)) => {
            let email = args.get_one::<String>("email").context("missing email")?;
            let password = args.get_one::<String>("password").context("missing password")?;
            let gateway = gateway(&config, false).await?;

            let outcome = gateway.login(email, password).await?;
            println!("Signed in as {}", outcome.user.username);
            println!("Answers: {}", describe(&outcome.reload.answers));
            println!("Checklist: {}", describe(&outcome.reload.checklist));
        }
        Some(("register", args)) => {
            let username = args.get_one::<String>("username").context("missing username")?;
            let email = args.get_one::<String>("email").context("missing email")?;
            let password = args.get_one::<String>("password").context("missing password")?;
            let gateway = gateway(&config, false).await?;

            let outcome = gateway.register(username, email, password).await?;
            println!("Account created for {}", outcome.user.username);
            println!("Answers: {}", describe(&outcome.submitted));
            if outcome.submitted.error().is_some() {
                println!("Answers are kept locally; resubmit any of them with `roadmap answer` to retry");
            }
        }
        Some(("logout", _)) => {
            let cache = FileCache::open_or_reset(&config.cache_path)
                .with_context(|| format!("failed to reset cache {}", config.cache_path.display()))?;
            let remote = HttpRemoteStore::new(&config).context("failed to build http client")?;
            let gateway = SyncGateway::new(Arc::new(cache), Arc::new(remote));
            gateway.logout()?;
            println!("Signed out");
        }
        Some(("sync", _)) => {
            let gateway = gateway(&config, false).await?;
            if !gateway.is_authenticated() {
                bail!("not signed in; run `roadmap login` first");
            }
            let report = gateway.reload_user_data().await?;
            println!("Answers: {}", describe(&report.answers));
            println!("Checklist: {}", describe(&report.checklist));
            print_roadmap(&gateway);
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run(cli().get_matches()).await
}
