// src/cli.rs
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::migrate::parse_labels;
use crate::models::{AccountType, AccountUpdate};
use crate::projection::labels_to_text;
use crate::storage::{FileStorage, KeyValueStore};
use crate::store::AccountRepository;
use clap::{Parser, Subcommand};
use log;
use rpassword;
use std::io::{self, Write};
use std::path::PathBuf;

/// Keeps a list of local and LDAP account records.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the stored accounts (overrides the config file)
    #[clap(long, value_parser, global = true)]
    pub data_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all accounts (LDAP passwords are never shown)
    List {
        /// Print the accounts as JSON
        #[clap(long)]
        json: bool,
    },
    /// Add a new account
    Add {
        #[clap(short, long)]
        login: String,
        /// Account type: local or ldap
        #[clap(
            short = 't',
            long = "type",
            value_parser = parse_account_type,
            default_value = "local"
        )]
        account_type: AccountType,
        /// Labels separated by ';', e.g. "work; urgent"
        #[clap(long)]
        labels: Option<String>,
        /// Password for local accounts; prompted for when omitted
        #[clap(short, long)]
        password: Option<String>,
    },
    /// Change fields of an existing account
    Set {
        id: i64,
        #[clap(short, long)]
        login: Option<String>,
        #[clap(short, long)]
        password: Option<String>,
        #[clap(short = 't', long = "type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
    },
    /// Replace the labels of an account
    Labels {
        id: i64,
        /// Labels separated by ';'
        text: String,
    },
    /// Remove an account
    Remove { id: i64 },
    /// Validate every stored account and report field errors
    Check,
}

fn parse_account_type(s: &str) -> Result<AccountType, String> {
    s.parse()
}

fn output_error(e: io::Error) -> AppError {
    log::error!("Failed to write command output: {}", e);
    AppError::Cli(format!("Failed to write output: {}", e))
}

fn ensure_exists<S: KeyValueStore>(repo: &AccountRepository<S>, id: i64) -> AppResult<()> {
    if repo.get(id).is_none() {
        log::warn!("No account with id {}", id);
        return Err(AppError::Cli(format!("No account with id {}", id)));
    }
    Ok(())
}

fn rejected<S: KeyValueStore>(repo: &AccountRepository<S>, id: i64) -> AppError {
    let details = repo
        .reported_errors(id)
        .map(|errors| errors.to_string())
        .unwrap_or_default();
    log::warn!("Account {} is incomplete: {}", id, details);
    AppError::Cli(format!("Account {} is incomplete and was not saved: {}", id, details))
}

pub fn list_accounts<S: KeyValueStore>(
    repo: &AccountRepository<S>,
    json: bool,
    out: &mut dyn Write,
) -> AppResult<()> {
    let views = repo.project_all();
    if json {
        let rendered = serde_json::to_string_pretty(&views)
            .map_err(|e| AppError::Cli(format!("Failed to render accounts as JSON: {}", e)))?;
        writeln!(out, "{}", rendered).map_err(output_error)?;
        return Ok(());
    }

    if views.is_empty() {
        writeln!(out, "No accounts found.").map_err(output_error)?;
        return Ok(());
    }
    writeln!(out, "Accounts:").map_err(output_error)?;
    for view in &views {
        let password = if view.password.is_some() { "set" } else { "none" };
        writeln!(
            out,
            "  - [{}] {} ({}) labels: {} password: {}",
            view.id,
            view.login,
            view.account_type,
            labels_to_text(&view.labels),
            password
        )
        .map_err(output_error)?;
    }
    log::info!("Listed {} account(s).", views.len());
    Ok(())
}

pub fn add_account<S: KeyValueStore>(
    repo: &mut AccountRepository<S>,
    login: String,
    account_type: AccountType,
    labels: Option<&str>,
    password: Option<String>,
) -> AppResult<i64> {
    let id = repo.create();
    repo.update_field(id, AccountUpdate::SetLogin(login));
    repo.update_field(id, AccountUpdate::SetType(account_type));
    repo.update_field(id, AccountUpdate::SetPassword(password));
    let labels = parse_labels(labels.unwrap_or_default());
    repo.update_field(id, AccountUpdate::SetLabels(labels.clone()));
    if !repo.revalidate(id) {
        return Err(rejected(repo, id));
    }
    repo.commit_labels(id, labels);
    log::info!("Added account {}", id);
    Ok(id)
}

pub fn set_fields<S: KeyValueStore>(
    repo: &mut AccountRepository<S>,
    id: i64,
    login: Option<String>,
    password: Option<String>,
    account_type: Option<AccountType>,
) -> AppResult<()> {
    ensure_exists(repo, id)?;
    if let Some(login) = login {
        repo.update_field(id, AccountUpdate::SetLogin(login));
    }
    if let Some(password) = password {
        repo.update_field(id, AccountUpdate::SetPassword(Some(password)));
    }
    if let Some(account_type) = account_type {
        repo.update_field(id, AccountUpdate::SetType(account_type));
    }
    // Persisting an invalid record would drop it from storage.
    if !repo.revalidate(id) {
        return Err(rejected(repo, id));
    }
    repo.persist();
    Ok(())
}

pub fn set_labels<S: KeyValueStore>(
    repo: &mut AccountRepository<S>,
    id: i64,
    text: &str,
) -> AppResult<()> {
    ensure_exists(repo, id)?;
    repo.update_field(id, AccountUpdate::SetLabels(parse_labels(text)));
    if !repo.revalidate(id) {
        return Err(rejected(repo, id));
    }
    repo.commit_label_text(id, text);
    Ok(())
}

pub fn remove_account<S: KeyValueStore>(repo: &mut AccountRepository<S>, id: i64) -> AppResult<()> {
    ensure_exists(repo, id)?;
    repo.remove(id);
    Ok(())
}

/// Returns how many accounts failed validation.
pub fn check_accounts<S: KeyValueStore>(
    repo: &mut AccountRepository<S>,
    out: &mut dyn Write,
) -> AppResult<usize> {
    let ids: Vec<i64> = repo.accounts().iter().map(|a| a.id).collect();
    let mut invalid = 0;
    for id in ids {
        if repo.revalidate(id) {
            writeln!(out, "  [{}] ok", id).map_err(output_error)?;
        } else {
            invalid += 1;
            let details = repo.reported_errors(id).map(|e| e.to_string()).unwrap_or_default();
            writeln!(out, "  [{}] invalid: {}", id, details).map_err(output_error)?;
        }
    }
    log::info!("Checked accounts: {} invalid.", invalid);
    Ok(invalid)
}

fn open_repository(cli: &Cli, config: &Config) -> AppResult<AccountRepository<FileStorage>> {
    let data_dir = config
        .resolve_data_dir(cli.data_dir.as_deref())
        .ok_or_else(|| {
            log::error!("Could not determine a data directory for stored accounts.");
            AppError::Config("Could not determine a data directory; pass --data-dir".to_string())
        })?;
    log::debug!("Using data directory {:?}", data_dir);
    let mut repo = AccountRepository::new(FileStorage::new(data_dir), config.storage_key.clone())
        .with_pretty_json(config.pretty_json);
    repo.load();
    log::debug!("Opened {} account(s) from {:?}", repo.accounts().len(), repo.storage().dir());
    Ok(repo)
}

/// Handles the parsed CLI command against the file-backed account list.
pub fn handle_cli_command(cli: Cli, config: &Config) -> AppResult<()> {
    log::debug!("Handling CLI command: {:?}", cli.command);
    let mut repo = open_repository(&cli, config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::List { json } => list_accounts(&repo, json, &mut out),
        Commands::Add {
            login,
            account_type,
            labels,
            password,
        } => {
            let password = match (password, account_type) {
                (Some(password), _) => Some(password),
                (None, AccountType::Local) => {
                    let password = rpassword::prompt_password("Enter account password: ")
                        .map_err(|e| {
                            log::error!("Failed to read account password: {}", e);
                            AppError::Cli(format!("Failed to read password: {}", e))
                        })?;
                    Some(password)
                }
                (None, AccountType::Ldap) => None,
            };
            let id = add_account(&mut repo, login, account_type, labels.as_deref(), password)?;
            writeln!(out, "Added account {}.", id).map_err(output_error)
        }
        Commands::Set {
            id,
            login,
            password,
            account_type,
        } => {
            set_fields(&mut repo, id, login, password, account_type)?;
            let written = match repo.project_one(id) {
                Some(view) => writeln!(
                    out,
                    "Updated account {}: {} ({}).",
                    id, view.login, view.account_type
                ),
                None => writeln!(out, "Updated account {}.", id),
            };
            written.map_err(output_error)
        }
        Commands::Labels { id, text } => {
            set_labels(&mut repo, id, &text)?;
            writeln!(out, "Updated labels of account {}.", id).map_err(output_error)
        }
        Commands::Remove { id } => {
            remove_account(&mut repo, id)?;
            writeln!(out, "Removed account {}.", id).map_err(output_error)
        }
        Commands::Check => {
            let invalid = check_accounts(&mut repo, &mut out)?;
            if invalid > 0 {
                return Err(AppError::Cli(format!("{} account(s) failed validation", invalid)));
            }
            Ok(())
        }
    }
}
