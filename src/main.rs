//! mailtm - watch a Mail.tm inbox from the terminal
//!
//! Main entry point for the mailtm CLI.

use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use mailtm::config::{ServerAuth, ServerSettings};
use mailtm::events::{AccountSwitched, MessageDelete, ServerCalledOff, ServerStarted};
use mailtm::{MailServer, MailServerError};
use mailtm_api::MailClient;
use std::path::PathBuf;
use std::process;

/// mailtm - temporary inbox watcher
#[derive(Parser, Debug)]
#[command(name = "mailtm")]
#[command(version, about, long_about = None)]
struct Cli {
    /// API endpoint (default: https://api.mail.tm)
    #[arg(long, env = "MAILTM_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the domains addresses can be registered on
    Domains,

    /// Create an account and print its token
    Register {
        /// Full address, e.g. someone@example.com
        address: String,

        password: String,

        /// Save the credentials to the settings file
        #[arg(long)]
        save: bool,
    },

    /// Watch an inbox and print events as they happen
    Watch {
        /// Settings file (default: ~/.config/mailtm/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bearer token (overrides the settings file)
        #[arg(long, env = "MAILTM_TOKEN", requires = "account_id")]
        token: Option<String>,

        /// Account id the token belongs to
        #[arg(long, env = "MAILTM_ACCOUNT_ID")]
        account_id: Option<String>,

        /// Seconds between polls
        #[arg(short, long)]
        interval: Option<u64>,

        /// Keep polling when a fetch or handler fails
        #[arg(long)]
        suppress_errors: bool,

        #[arg(long)]
        no_banner: bool,
    },

    /// Print version and banner
    Version,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = mailtm::logging::init(&cli.log) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> mailtm::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let base_url = cli.base_url;

    match cli.command {
        Commands::Domains => runtime.block_on(list_domains(base_url)),
        Commands::Register {
            address,
            password,
            save,
        } => runtime.block_on(register(base_url, &address, &password, save)),
        Commands::Watch {
            config,
            token,
            account_id,
            interval,
            suppress_errors,
            no_banner,
        } => {
            let mut settings = match (token, account_id) {
                (Some(token), Some(account_id)) => {
                    ServerSettings::new(ServerAuth::new(token, account_id))
                }
                _ => match config {
                    Some(path) => ServerSettings::load(path)?,
                    None => ServerSettings::load_default()?,
                },
            };
            if base_url.is_some() {
                settings.base_url = base_url;
            }
            if let Some(interval) = interval {
                settings.poll_interval = interval;
            }
            settings.suppress_errors |= suppress_errors;
            settings.banner &= !no_banner;
            settings.enable_logging = true;

            runtime.block_on(watch(settings))
        }
        Commands::Version => {
            mailtm::server::banner::print(None);
            Ok(())
        }
    }
}

fn client(base_url: Option<String>) -> mailtm::Result<MailClient> {
    let mut builder = MailClient::builder();
    if let Some(url) = base_url {
        builder = builder.base_url(url);
    }
    Ok(builder.build()?)
}

async fn list_domains(base_url: Option<String>) -> mailtm::Result<()> {
    let client = client(base_url)?;
    let domains = client.all_domains().await?;

    if domains.is_empty() {
        println!("No domains available");
        return Ok(());
    }
    for domain in domains {
        let status = if domain.is_active {
            "active".green()
        } else {
            "inactive".dark_grey()
        };
        println!("{:<32} {}", domain.name, status);
    }
    Ok(())
}

async fn register(
    base_url: Option<String>,
    address: &str,
    password: &str,
    save: bool,
) -> mailtm::Result<()> {
    let client = client(base_url.clone())?;
    let account = client.create_account(address, password).await?;
    let token = client.token(address, password).await?;

    println!("{} {}", "Created".green().bold(), account.address);
    println!("  id:    {}", account.id);
    println!("  token: {}", token);

    if save {
        let mut settings =
            ServerSettings::new(ServerAuth::from(token).with_credentials(address, password));
        settings.base_url = base_url;
        settings.save_default()?;
        println!(
            "Saved credentials to {}",
            ServerSettings::default_path().display()
        );
    }
    Ok(())
}

async fn watch(settings: ServerSettings) -> mailtm::Result<()> {
    let server = MailServer::from_settings(settings)?;

    server.subscribe::<ServerStarted>().register(|_| async {
        println!("{}", "Watching inbox (Ctrl-C to stop)".cyan());
        Ok(())
    });
    server.on_new_domain(|event| async move {
        println!("{} {}", "domain".magenta(), event.domain.name);
        Ok(())
    });
    server.on_new_message(|event| async move {
        let message = &event.message;
        println!(
            "{} {} {}",
            "new".green().bold(),
            message.sender_address(),
            message.subject.as_str().bold()
        );
        if let Some(ref intro) = message.intro {
            println!("    {}", intro.as_str().dark_grey());
        }
        Ok(())
    });
    server.subscribe::<MessageDelete>().register(|event| async move {
        println!("{} {}", "deleted".red(), event.message.subject);
        Ok(())
    });
    server.subscribe::<AccountSwitched>().register(|event| async move {
        println!(
            "{} from {}",
            "switched".yellow(),
            event.previous_auth.account_id
        );
        Ok(())
    });
    server.subscribe::<ServerCalledOff>().register(|_| async {
        println!("{}", "Stopped".cyan());
        Ok(())
    });

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    let stopper = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.shutdown().await;
        }
    });

    match runner.await {
        Ok(result) => result,
        Err(e) => Err(MailServerError::Anyhow(anyhow::anyhow!(
            "runner task failed: {}",
            e
        ))),
    }
}

