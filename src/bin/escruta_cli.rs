//! Escruta CLI: 登录、浏览笔记本、触发并等待生成任务的命令行工具
//!
//! Usage:
//!   escruta-cli login <email> <password>      Sign in and store the session token
//!   escruta-cli logout                        Forget the stored session
//!   escruta-cli me                            Show the signed-in user
//!   escruta-cli notebooks                     List notebooks
//!   escruta-cli generate <notebook-id> <type> Start a generation job and wait for it
//!   escruta-cli job <notebook-id> <type>      Show the latest job of a type

use anyhow::{anyhow, bail, Context};
use escruta_client::jobs::{GenerationJob, GenerationJobPoller, JobOptions, JobStatus, JobType};
use escruta_client::models::{endpoints, Notebook};
use escruta_client::auth::KeyringTokenStore;
use escruta_client::{AuthClient, ClientConfig, FetchClient, FetchOptions, FileTokenStore, TokenStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "login" => cmd_login(&args[2..]).await,
        "logout" => cmd_logout().await,
        "me" => cmd_me().await,
        "notebooks" => cmd_notebooks().await,
        "generate" => cmd_generate(&args[2..]).await,
        "job" => cmd_job(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"escruta-cli: Escruta 命令行工具

USAGE:
    escruta-cli <COMMAND> [ARGS]

COMMANDS:
    login <email> <password>        Sign in and store the session token
    logout                          Forget the stored session
    me                              Show the signed-in user
    notebooks                       List notebooks
    generate <notebook-id> <type>   Start a generation job and wait for it
    job <notebook-id> <type>        Show the latest job of a type
    version                         Show version information
    help                            Show this help message

JOB TYPES:
    mind-map, study-guide, flashcards, questionnaire

ENVIRONMENT:
    ESCRUTA_CORE_URL                Backend base URL (default http://localhost:8080)
    ESCRUTA_TOKEN_FILE              Session token file (default ~/.escruta/token.json)
    ESCRUTA_TOKEN_STORE             file (default) or keyring
    RUST_LOG                        Log filter (default warn)"#
    );
}

fn version_line() -> String {
    format!("escruta-cli {}", env!("CARGO_PKG_VERSION"))
}

fn cmd_version() {
    println!("{}", version_line());
}

fn build_client() -> anyhow::Result<FetchClient> {
    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let store: Arc<dyn TokenStore> = match std::env::var("ESCRUTA_TOKEN_STORE").as_deref() {
        Ok("keyring") => Arc::new(KeyringTokenStore::default()),
        _ => Arc::new(FileTokenStore::default_location()),
    };
    let client = FetchClient::builder().config(config).token_store(store).build()?;
    Ok(client)
}

fn parse_job_args(args: &[String]) -> anyhow::Result<(String, JobType)> {
    let [notebook_id, job_type, ..] = args else {
        bail!("expected <notebook-id> <type>");
    };
    let job_type = JobType::parse(job_type).ok_or_else(|| anyhow!("unknown job type: {job_type}"))?;
    Ok((notebook_id.clone(), job_type))
}

async fn cmd_login(args: &[String]) -> anyhow::Result<()> {
    let [email, password, ..] = args else {
        bail!("expected <email> <password>");
    };
    let auth = AuthClient::new(build_client()?);
    let outcome = auth.login(email, password).await?;
    match outcome.user {
        Some(user) => println!("Signed in as {}", user.full_name.unwrap_or(user.email)),
        None if outcome.data.token.is_some() => println!("Signed in"),
        None => bail!(
            "{}",
            outcome.data.message.unwrap_or_else(|| "login returned no token".to_string())
        ),
    }
    Ok(())
}

async fn cmd_logout() -> anyhow::Result<()> {
    AuthClient::new(build_client()?).logout().await?;
    println!("Signed out");
    Ok(())
}

async fn cmd_me() -> anyhow::Result<()> {
    match AuthClient::new(build_client()?).current_user().await? {
        Some(user) => {
            println!("email: {}", user.email);
            if let Some(name) = user.full_name {
                println!("name:  {name}");
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn cmd_notebooks() -> anyhow::Result<()> {
    let client = build_client()?;
    let notebooks: Vec<Notebook> = client
        .request(endpoints::NOTEBOOKS, &FetchOptions::get().retry(1))
        .await?;
    if notebooks.is_empty() {
        println!("No notebooks");
    }
    for nb in notebooks {
        println!("{:<38} {}", nb.id, nb.title);
    }
    Ok(())
}

async fn cmd_generate(args: &[String]) -> anyhow::Result<()> {
    let (notebook_id, job_type) = parse_job_args(args)?;
    let poller = GenerationJobPoller::new(build_client()?, notebook_id, job_type, JobOptions::default());
    let started = poller.start_generation().await?;
    println!("Started job {} ({})", started.job_id, job_type);
    let job = poller.wait_until_finished().await?;
    poller.close();
    print_job(&job);
    if job.status == JobStatus::Failed {
        bail!("{}", job.failure_message());
    }
    Ok(())
}

async fn cmd_job(args: &[String]) -> anyhow::Result<()> {
    let (notebook_id, job_type) = parse_job_args(args)?;
    let poller = GenerationJobPoller::new(build_client()?, notebook_id, job_type, JobOptions::default());
    let latest = poller.refetch().await?;
    poller.close();
    match latest {
        Some(job) => print_job(&job),
        None => println!("No {job_type} job yet"),
    }
    Ok(())
}

fn print_job(job: &GenerationJob) {
    println!("job:     {}", job.id);
    println!("type:    {}", job.job_type);
    println!("status:  {:?}", job.status);
    println!("created: {}", job.created_at);
    if let Some(done) = &job.completed_at {
        println!("done:    {done}");
    }
    if let Some(err) = &job.error_message {
        println!("error:   {err}");
    }
    if let Some(result) = &job.result {
        match serde_json::from_str::<serde_json::Value>(result)
            .and_then(|v| serde_json::to_string_pretty(&v))
        {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{result}"),
        }
    }
}
