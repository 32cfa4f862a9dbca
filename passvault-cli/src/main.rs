//! PassVault command-line front end.
//!
//! Every vault command selects a registered user with `--user`, unlocks the
//! vault (prompting up to the lockout threshold) and runs one operation.

mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use passvault_core::security::audit::{SecurityEventKind, SecurityLogger};
use passvault_core::security::generator::{self, GeneratorOptions};
use passvault_core::security::strength::{
    assess_strength, crack_time_seconds, describe_crack_time, estimate_entropy,
};
use passvault_core::storage::{load_settings, FileStore};
use passvault_core::{
    EntryUpdate, Error, NewEntry, SecretStore, UserRegistry, VaultEntry, VaultSession,
    VaultSettings,
};
use tracing::debug;
use zeroize::Zeroizing;

/// Offline password vault
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding users, settings, sealed vaults and the security log
    #[arg(long, env = "PASSVAULT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Where sealed vaults are stored
    #[arg(long, value_enum, default_value_t = StoreKind::File, global = true)]
    store: StoreKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StoreKind {
    /// One owner-only file per user in `<data-dir>/vaults`
    File,
    /// The OS keyring (requires the `os-keyring` feature)
    Keyring,
}

#[derive(Args, Debug)]
struct UserArg {
    /// Registered username
    #[arg(short, long, env = "PASSVAULT_USER")]
    user: String,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Password length (defaults to the configured length)
    #[arg(short, long)]
    length: Option<usize>,
    #[arg(long)]
    no_symbols: bool,
    #[arg(long)]
    no_numbers: bool,
    #[arg(long)]
    no_uppercase: bool,
    #[arg(long)]
    no_lowercase: bool,
}

impl GenerateArgs {
    fn options(&self, settings: &VaultSettings) -> GeneratorOptions {
        GeneratorOptions {
            length: self.length.unwrap_or(settings.default_password_length),
            use_symbols: !self.no_symbols,
            use_numbers: !self.no_numbers,
            use_uppercase: !self.no_uppercase,
            use_lowercase: !self.no_lowercase,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new user
    Register { username: String },
    /// List registered users
    Users,
    /// Create the vault for a user and set its master password
    Init(UserArg),
    /// List entries
    List(UserArg),
    /// Add an entry; the password is prompted for unless --generate is given
    Add {
        #[command(flatten)]
        user: UserArg,
        #[arg(long)]
        site: String,
        /// Login name stored with the entry
        #[arg(long)]
        login: String,
        /// Generate the password instead of prompting
        #[arg(long)]
        generate: bool,
        #[command(flatten)]
        generator: GenerateArgs,
    },
    /// Show one entry
    Show {
        #[command(flatten)]
        user: UserArg,
        id: String,
        /// Print the stored password
        #[arg(long)]
        reveal: bool,
    },
    /// Change fields of an entry
    Update {
        #[command(flatten)]
        user: UserArg,
        id: String,
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        login: Option<String>,
        /// Prompt for a new password
        #[arg(long, conflicts_with = "generate")]
        password: bool,
        /// Replace the password with a generated one
        #[arg(long)]
        generate: bool,
        #[command(flatten)]
        generator: GenerateArgs,
    },
    /// Delete an entry
    Delete {
        #[command(flatten)]
        user: UserArg,
        id: String,
    },
    /// Case-insensitive search on site and login
    Search {
        #[command(flatten)]
        user: UserArg,
        #[arg(default_value = "")]
        query: String,
    },
    /// Generate a password without storing it
    Generate(GenerateArgs),
    /// Check a password against the policy and estimate its crack time
    Strength,
    /// Re-seal the vault under a new master password
    ChangeMaster(UserArg),
}

struct AppContext {
    data_dir: PathBuf,
    settings: VaultSettings,
    registry: UserRegistry,
    store: Arc<dyn SecretStore>,
    audit: SecurityLogger,
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .context("Cannot determine home directory; pass --data-dir")?;
    Ok(PathBuf::from(home).join(".passvault"))
}

async fn open_store(kind: StoreKind, data_dir: &std::path::Path) -> Result<Arc<dyn SecretStore>> {
    let store: Arc<dyn SecretStore> = match kind {
        StoreKind::File => Arc::new(FileStore::open(data_dir.join("vaults"))?),
        #[cfg(feature = "os-keyring")]
        StoreKind::Keyring => {
            let keyring = passvault_core::storage::KeyringStore::new();
            keyring
                .check_availability()
                .await
                .context("OS keyring is not available; use --store file")?;
            Arc::new(keyring)
        }
        #[cfg(not(feature = "os-keyring"))]
        StoreKind::Keyring => bail!("This build does not include OS keyring support"),
    };
    Ok(store)
}

impl AppContext {
    async fn new(cli: &Cli) -> Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let settings = load_settings(&data_dir)?;
        let audit = if settings.audit_log {
            SecurityLogger::new(&data_dir)
        } else {
            SecurityLogger::disabled()
        };

        Ok(Self {
            registry: UserRegistry::new(&data_dir),
            store: open_store(cli.store, &data_dir).await?,
            data_dir,
            settings,
            audit,
        })
    }

    fn session(&self, username: &str) -> Result<VaultSession> {
        let account = self.registry.find(username)?;
        Ok(VaultSession::new(self.store.clone(), account).with_audit_log(self.audit.clone()))
    }

    /// Select the user and unlock, re-prompting after a wrong password until
    /// the session is torn down.
    async fn unlocked_session(&self, username: &str) -> Result<VaultSession> {
        let session = self.session(username)?;
        if !session.vault_exists().await? {
            bail!(
                "No vault for {}. Run `passvault init --user {}` first.",
                username,
                username
            );
        }

        loop {
            let secret = prompt::read_master_password()?;
            match session.unlock(secret).await {
                Ok(()) => return Ok(session),
                Err(Error::Authentication) if !prompt::master_password_from_env() => {
                    eprintln!(
                        "Invalid master password. {} attempt(s) remaining.",
                        session.remaining_attempts().await
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn print_entry(entry: &VaultEntry, reveal: bool) {
    println!("ID:       {}", entry.id);
    println!("Site:     {}", entry.site);
    println!("Login:    {}", entry.username);
    if reveal {
        println!("Password: {}", entry.password);
    } else {
        println!("Password: ******** (use --reveal to show)");
    }
    println!("Created:  {}", entry.created_at.to_rfc3339());
    println!("Updated:  {}", entry.updated_at.to_rfc3339());
}

fn print_entry_list(entries: &[VaultEntry]) {
    if entries.is_empty() {
        println!("No entries.");
        return;
    }
    for entry in entries {
        println!("{}  {}  {}", entry.id, entry.site, entry.username);
    }
    println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}

fn print_generated(password: &generator::GeneratedPassword, settings: &VaultSettings) {
    let crack = crack_time_seconds(password.entropy_bits, settings.guesses_per_second);
    println!("{}", password.as_str());
    if password.as_str().starts_with(' ') || password.as_str().ends_with(' ') {
        eprintln!("Note: the password starts or ends with a space.");
    }
    eprintln!(
        "Entropy: {:.1} bits ({} characters from a set of {}), crack time: {}",
        password.entropy_bits,
        password.len(),
        password.charset_size,
        describe_crack_time(crack)
    );
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::new(&cli).await?;
    debug!("Using data directory {:?}", ctx.data_dir);

    match cli.command {
        Command::Register { username } => {
            let account = ctx.registry.register(&username)?;
            ctx.audit.log_event(
                SecurityEventKind::UserRegistered,
                Some(&account.username),
                true,
                "",
            )
            .await;
            println!("Registered {}. Run `passvault init --user {}` to create the vault.", username, username);
        }

        Command::Users => {
            for account in ctx.registry.load()? {
                println!("{}", account.username);
            }
        }

        Command::Init(UserArg { user }) => {
            let session = ctx.session(&user)?;
            if session.vault_exists().await? {
                return Err(Error::AlreadyExists.into());
            }
            let secret = prompt::read_new_master_password("New master password", true)?;
            session.create_vault(secret).await?;
            println!("Vault created for {}.", user);
        }

        Command::List(UserArg { user }) => {
            let session = ctx.unlocked_session(&user).await?;
            print_entry_list(&session.entries().await?);
        }

        Command::Add {
            user: UserArg { user },
            site,
            login,
            generate,
            generator: gen_args,
        } => {
            let session = ctx.unlocked_session(&user).await?;
            let mut password = if generate {
                let generated = generator::generate_for_entry(&gen_args.options(&ctx.settings))?;
                Zeroizing::new(generated.as_str().to_string())
            } else {
                prompt::read_secret("Entry password: ")?
            };

            let entry = session
                .add_entry(NewEntry::new(site, login, std::mem::take(&mut *password)))
                .await?;
            println!("Added entry {}", entry.id);
        }

        Command::Show {
            user: UserArg { user },
            id,
            reveal,
        } => {
            let session = ctx.unlocked_session(&user).await?;
            print_entry(&session.entry(&id).await?, reveal);
        }

        Command::Update {
            user: UserArg { user },
            id,
            site,
            login,
            password,
            generate,
            generator: gen_args,
        } => {
            let new_password = if generate {
                let generated = generator::generate_for_entry(&gen_args.options(&ctx.settings))?;
                Some(generated.as_str().to_string())
            } else if password {
                Some(prompt::read_secret("New entry password: ")?.to_string())
            } else {
                None
            };

            let update = EntryUpdate {
                site,
                username: login,
                password: new_password,
            };
            if update.is_empty() {
                bail!("Nothing to update: pass --site, --login, --password or --generate");
            }

            let session = ctx.unlocked_session(&user).await?;
            let entry = session.update_entry(&id, update).await?;
            println!("Updated entry {}", entry.id);
        }

        Command::Delete {
            user: UserArg { user },
            id,
        } => {
            let session = ctx.unlocked_session(&user).await?;
            session.delete_entry(&id).await?;
            println!("Deleted entry {}", id);
        }

        Command::Search {
            user: UserArg { user },
            query,
        } => {
            let session = ctx.unlocked_session(&user).await?;
            print_entry_list(&session.search(&query).await?);
        }

        Command::Generate(gen_args) => {
            let generated = generator::generate(&gen_args.options(&ctx.settings))?;
            print_generated(&generated, &ctx.settings);
        }

        Command::Strength => {
            let password = prompt::read_secret("Password to check: ")?;
            let report = assess_strength(&password);
            let entropy = estimate_entropy(&password);
            let crack = crack_time_seconds(entropy, ctx.settings.guesses_per_second);

            if report.is_valid {
                println!("Meets the password policy.");
            } else {
                println!("Does not meet the password policy:");
                for reason in &report.reasons {
                    println!("  - {}", reason);
                }
            }
            println!("Estimated entropy: {:.1} bits", entropy);
            println!("Estimated crack time: {}", describe_crack_time(crack));
        }

        Command::ChangeMaster(UserArg { user }) => {
            let session = ctx.unlocked_session(&user).await?;
            let current = prompt::read_secret("Current master password: ")?;
            let new_secret = prompt::read_new_master_password("New master password", false)?;
            session.change_master_password(&current, new_secret).await?;
            println!("Master password changed.");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    passvault_core::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        match e.downcast_ref::<Error>() {
            Some(core) => {
                debug!("{:#}", e);
                eprintln!("Error: {}", core.user_message());
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}
