mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use deploy_core::BuildInfo;
use descriptor::Descriptor;
use dns::{
    ConvergenceGate, ConvergenceSignal, DigResolver, InteractiveSignal, Platform, TimedPoll,
};
use orchestrator::{check_deployed_address, sync_deployed_address, DeploymentManager};
use provision::{InfraTool, Provisioner, TerraformCli};
use release::KamalCli;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DeployctlConfig, DnsMode};

#[derive(Parser)]
#[command(name = "deployctl")]
#[command(about = "Provision, point DNS at and release a Kamal app", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root holding config/ and the Terraform directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Deploy descriptor, relative to the root
    #[arg(long, global = true)]
    descriptor: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision, update deploy.yml, wait for DNS, release, restore the timeout
    Deploy {
        /// Poll DNS on a timer instead of waiting for return
        #[arg(long)]
        headless: bool,
    },
    /// Check that the provisioned address matches deploy.yml
    Verify,
    /// Write the provisioned address into deploy.yml
    SyncAddress,
    /// Open and close a connection for every database role
    CheckDb {
        #[arg(long = "env", env = "RAILS_ENV", default_value = "development")]
        environment: String,
    },
    /// Show build revision and time
    Info,
}

struct Workspace {
    root: PathBuf,
    descriptor_path: PathBuf,
    config: DeployctlConfig,
}

impl Workspace {
    async fn new(cli: &Cli) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let config = DeployctlConfig::load(&root).await;
        let descriptor_path = root.join(
            cli.descriptor
                .clone()
                .unwrap_or_else(|| config.paths.descriptor.clone()),
        );

        Ok(Self {
            root,
            descriptor_path,
            config,
        })
    }

    async fn load_descriptor(&self) -> Result<Descriptor> {
        Descriptor::load(&self.descriptor_path)
            .await
            .with_context(|| format!("Failed to load {}", self.descriptor_path.display()))
    }

    fn infra_tool(&self) -> Arc<dyn InfraTool> {
        Arc::new(
            TerraformCli::new(self.root.join(&self.config.paths.terraform_dir))
                .with_program(&self.config.terraform.program),
        )
    }

    fn provisioner(&self) -> Provisioner {
        Provisioner::new(
            self.infra_tool(),
            self.config.terraform.provisioner_config(),
        )
    }

    fn signal(&self, headless: bool) -> Box<dyn ConvergenceSignal> {
        let dns = &self.config.dns;
        if headless || dns.mode == DnsMode::Headless {
            Box::new(TimedPoll::new(dns.poll_interval(), dns.max_attempts))
        } else {
            Box::new(InteractiveSignal::stdin())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let ws = Workspace::new(&cli).await?;

    match cli.command {
        Commands::Deploy { headless } => deploy(&ws, headless).await,
        Commands::Verify => verify(&ws).await,
        Commands::SyncAddress => sync_address(&ws).await,
        Commands::CheckDb { environment } => check_db(&ws, &environment).await,
        Commands::Info => info(),
    }
}

async fn deploy(ws: &Workspace, headless: bool) -> Result<()> {
    let descriptor = ws.load_descriptor().await?;
    let gate = ConvergenceGate::new(Arc::new(DigResolver::new()), ws.signal(headless));
    let release = KamalCli::new(&ws.root).with_command(
        &ws.config.release.program,
        ws.config.release.args_prefix.clone(),
    );
    let cache_flush = ws.config.dns.flush_local_cache.then(Platform::detect);

    let mut manager = DeploymentManager::new(descriptor, ws.provisioner(), gate, Arc::new(release))
        .with_cache_flush(cache_flush);

    let summary = match manager.deploy().await {
        Ok(summary) => summary,
        Err(e) => {
            if manager.timeout_elevated() {
                eprintln!(
                    "{}",
                    format!(
                        "Deployment stopped after {}. deploy_timeout in {} is still elevated.",
                        manager.phase(),
                        ws.descriptor_path.display()
                    )
                    .yellow()
                );
            }
            if e.is_aborted() {
                return Err(e.into());
            }
            return Err(e).context("Deployment failed");
        }
    };

    println!();
    println!("{}", "Deployment complete".green().bold());
    println!("  Host:     {}", summary.hostname);
    if summary.address_changed {
        println!(
            "  Address:  {} → {}",
            summary.old_address,
            summary.new_address.to_string().green()
        );
    } else {
        println!("  Address:  {} (unchanged)", summary.new_address);
    }
    println!("  Timeout:  {} seconds", summary.restored_timeout);
    println!();

    Ok(())
}

async fn verify(ws: &Workspace) -> Result<()> {
    let descriptor = ws.load_descriptor().await?;
    let check = check_deployed_address(&descriptor, &ws.provisioner())
        .await
        .context("Failed to read deployed address")?;

    if check.matches() {
        println!("{} {}", "✓".green(), check);
        Ok(())
    } else {
        bail!("{}", check)
    }
}

async fn sync_address(ws: &Workspace) -> Result<()> {
    let mut descriptor = ws.load_descriptor().await?;
    let (address, count) = sync_deployed_address(&mut descriptor, &ws.provisioner())
        .await
        .context("Failed to sync deployed address")?;

    if count == 0 {
        println!(
            "No server entries found in {}, nothing to update",
            ws.descriptor_path.display()
        );
    } else {
        println!(
            "{} {} now points at {}",
            "✓".green(),
            ws.descriptor_path.display(),
            address
        );
    }
    Ok(())
}

async fn check_db(ws: &Workspace, environment: &str) -> Result<()> {
    let path = ws.root.join(&ws.config.paths.database_config);
    let report = db::check_connections(environment, &path)
        .await
        .with_context(|| format!("Database check failed for {}", display_relative(&path, &ws.root)))?;

    println!();
    println!("Database connections ({}):", report.environment);
    for role in &report.roles {
        let line = role.summary();
        if role.success() {
            println!("  {}", line.green());
        } else {
            println!("  {}", line.red());
        }
    }
    println!();

    if !report.success() {
        bail!(
            "{} of {} database roles unreachable",
            report.failures().count(),
            report.roles.len()
        );
    }
    Ok(())
}

fn info() -> Result<()> {
    let build = BuildInfo::from_env();

    if !build.is_available() {
        println!("Build information unavailable (GIT_REVISION not set)");
        return Ok(());
    }

    println!("Revision:  {}", build.revision().unwrap_or_default());
    println!("Short:     {}", build.revision_short().unwrap_or_default());
    match build.build_time() {
        Some(time) => {
            println!("Built at:  {}", time.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(stamp) = build.deploy_timestamp(chrono::Utc::now()) {
                println!("           {}", stamp.dimmed());
            }
        }
        None => println!("Built at:  unknown"),
    }
    Ok(())
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deployctl=info,orchestrator=info,provision=info,dns=info,release=info,descriptor=info,db=info,deploy_core=info"
                    .into()
            }),
        )
        .init();
}
