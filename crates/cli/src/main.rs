use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use metrics::counter;
use serde::Serialize;
use tracing::{error, info, warn};

use awjob_args::flags::SubmitFlags;
use awjob_args::Job;
use awjob_core::{parse_toleration, TrainingJobType};
use awjob_kubehub::{AppWrapperTrainer, KubeAccessor};
use awjob_status::{AppWrapperJob, JobSummary};

#[derive(Parser, Debug)]
#[command(name = "awjobctl", version, about = "Submit and inspect AppWrapper training jobs")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace
    #[arg(long = "ns", global = true, env = "AWJOB_NAMESPACE", default_value = "default")]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json, Yaml }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose and validate submission arguments; prints the resulting job
    Submit {
        #[command(flatten)]
        flags: SubmitFlags,
        /// Training command run in every replica
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Parse toleration strings the way `submit --toleration` does
    Toleration {
        #[arg(required = true)]
        input: Vec<String>,
    },
    /// Show one AppWrapper job
    Get {
        name: String,
    },
    /// List AppWrapper jobs
    List {
        #[arg(short = 'A', long = "all-namespaces", action = ArgAction::SetTrue)]
        all_namespaces: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("AWJOB_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("AWJOB_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid AWJOB_METRICS_ADDR; expected host:port");
        }
    }
}

fn emit<T: Serialize>(output: Output, value: &T) -> Result<()> {
    match output {
        Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

async fn trainer() -> Result<AppWrapperTrainer<KubeAccessor>> {
    let accessor = KubeAccessor::try_default().await.context("connecting to the cluster")?;
    Ok(AppWrapperTrainer::new(accessor))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { flags, command } => {
            counter!("awjobctl_commands", 1u64, "command" => "submit");
            let job = compose_submission(flags, &cli.namespace, &command)?;
            info!(name = %job.name(), ns = %cli.namespace, "submission composed");
            match cli.output {
                Output::Human => {
                    let a = job.args();
                    println!("job {} ({}) in {}", job.name(), job.trainer(), a.common.namespace);
                    println!("  inner type   {}", a.inner_job_type);
                    println!("  workers      {}", a.common.worker_count);
                    println!("  gpus/worker  {}", a.common.gpu_count);
                    println!("  command      {}", a.common.command);
                    if let Some((k, v)) = job.queue_label() {
                        println!("  queue        {k}={v}");
                    }
                }
                out => emit(out, &job)?,
            }
        }
        Commands::Toleration { input } => {
            counter!("awjobctl_commands", 1u64, "command" => "toleration");
            let mut failed = false;
            for raw in &input {
                match parse_toleration(raw) {
                    Ok(t) => match cli.output {
                        Output::Human => println!("{raw}\t{}", serde_json::to_string(&t.to_k8s())?),
                        out => emit(out, &t)?,
                    },
                    Err(e) => {
                        failed = true;
                        eprintln!("{raw}: {e}");
                    }
                }
            }
            if failed {
                anyhow::bail!("some tolerations were rejected");
            }
        }
        Commands::Get { name } => {
            counter!("awjobctl_commands", 1u64, "command" => "get");
            let trainer = trainer().await?;
            if !trainer.is_enabled().await {
                warn!("AppWrapper CRD not found; is the controller installed?");
            }
            let job = match trainer.get_training_job(&name, &cli.namespace).await {
                Ok(job) => job,
                Err(e) => {
                    error!(error = %e, %name, "get failed");
                    return Err(e.into());
                }
            };
            match cli.output {
                Output::Human => {
                    let arena_ns = std::env::var("AWJOB_ARENA_NAMESPACE").unwrap_or_else(|_| "arena-system".to_string());
                    let dashboard = trainer.job_dashboard(&job, &arena_ns).await;
                    print_job(&job, dashboard.as_deref());
                }
                out => emit(out, &job.summary_at(Utc::now()))?,
            }
        }
        Commands::List { all_namespaces } => {
            counter!("awjobctl_commands", 1u64, "command" => "list");
            let ns = (!all_namespaces).then_some(cli.namespace.as_str());
            let trainer = trainer().await?;
            let now = Utc::now();
            let rows: Vec<JobSummary> = trainer.list_training_jobs(ns).await?.iter().map(|j| j.summary_at(now)).collect();
            match cli.output {
                Output::Human => print_table(&rows, all_namespaces),
                out => emit(out, &rows)?,
            }
        }
    }

    Ok(())
}

fn compose_submission(flags: SubmitFlags, namespace: &str, command: &[String]) -> Result<Job> {
    let mut b = flags.into_builder(namespace, command);
    b.pre_build()?;
    b.build()?;
    let args = b.into_args();
    Ok(Job::new(args.common.name.clone(), TrainingJobType::AppWrapperJob, args))
}

fn print_job(job: &AppWrapperJob, dashboard: Option<&str>) {
    let now = Utc::now();
    println!("Name:        {}", job.name());
    println!("Namespace:   {}", job.namespace());
    println!("Status:      {}", job.status());
    println!("Trainer:     {}", job.trainer().as_str().to_uppercase());
    println!("Age:         {}", render_age(job.age_at(now)));
    println!("Duration:    {}", render_age(job.duration_at(now)));
    println!("Retries:     {}", job.retries());
    println!("GPUs:        {} requested, {} allocated", job.requested_gpu(), job.allocated_gpu());
    println!("Chief IP:    {}", job.host_ip_of_chief());
    if let Some(url) = dashboard {
        println!("Dashboard:   {url}");
    }
    println!();
    println!("{:<40} {:<12} {:<16}", "INSTANCE", "STATUS", "NODE");
    for p in job.all_pods() {
        let name = p.metadata.name.as_deref().unwrap_or("-");
        let st = p.status.as_ref();
        let phase = st.and_then(|s| s.phase.as_deref()).unwrap_or("Unknown");
        let node = p.spec.as_ref().and_then(|s| s.node_name.as_deref()).unwrap_or("N/A");
        println!("{:<40} {:<12} {:<16}", name, phase, node);
    }
}

fn print_table(rows: &[JobSummary], with_ns: bool) {
    if with_ns {
        print!("{:<16} ", "NAMESPACE");
    }
    println!("{:<32} {:<10} {:<14} {:<10} {:<8} {:<8} {:<16}", "NAME", "STATUS", "TRAINER", "DURATION", "GPU(R)", "GPU(A)", "NODE");
    for r in rows {
        if with_ns {
            print!("{:<16} ", r.namespace);
        }
        println!(
            "{:<32} {:<10} {:<14} {:<10} {:<8} {:<8} {:<16}",
            r.name,
            r.status,
            r.trainer.as_str().to_uppercase(),
            render_age(Duration::seconds(r.duration_seconds)),
            r.requested_gpus,
            r.allocated_gpus,
            r.host_ip
        );
    }
}

fn render_age(d: Duration) -> String {
    let mut secs = d.num_seconds().max(0);
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}
