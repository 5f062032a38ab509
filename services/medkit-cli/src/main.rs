//! medkit command line client
//!
//! Talks to a medkit server with a session kept on disk, so a login in one
//! invocation is reused (and transparently refreshed) by the next.

mod config;
mod import;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use medkit_auth::FileTokenStore;
use medkit_client::ApiClient;
use medkit_client::api::admin::{DEFAULT_USERS_PAGE_SIZE, DEFAULT_USERS_SORT};
use medkit_client::models::{
    BroadcastEmailRequest, Drug, DrugForm, DrugRequest, DrugSearchParams, DrugStatistics,
    ImportSummary, LoginRequest, Page, UserSummary,
};
use medkit_client::ExpirationStatus;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "medkit", version, about = "Household medication tracker client")]
struct Cli {
    /// Config file (default: $MEDKIT_CONFIG, then ./medkit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in; the password is read from MEDKIT_PASSWORD or stdin
    Login { email: String },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage medications
    #[command(subcommand)]
    Drugs(DrugsCommand),
    /// Administration
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Debug, Subcommand)]
enum DrugsCommand {
    /// Search medications
    List(Filters),
    /// Show one medication
    Show { id: i64 },
    /// Add a medication
    Add {
        name: String,
        #[arg(long)]
        form: DrugForm,
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a medication
    Rm { id: i64 },
    /// Totals by status and form
    Stats,
    /// Dosage forms the server knows
    Forms,
    /// Export the (filtered) list
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
        format: ExportFormat,
        /// Output file
        #[arg(long, short)]
        out: PathBuf,
        #[command(flatten)]
        filters: Filters,
    },
    /// Email expiration alerts now
    Alerts,
    /// Add every drug listed in a CSV file (name, form, date, description)
    Import { file: PathBuf },
}

#[derive(Debug, Subcommand)]
enum AdminCommand {
    /// List registered users
    Users {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_USERS_PAGE_SIZE)]
        size: u32,
    },
    /// Email every user
    Broadcast {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Pdf,
    Csv,
}

#[derive(Debug, Default, Args)]
struct Filters {
    /// Name contains
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    form: Option<DrugForm>,
    /// Only expired drugs
    #[arg(long)]
    expired: bool,
    /// Only drugs expiring within 30 days
    #[arg(long)]
    expiring_soon: bool,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    size: Option<u32>,
}

impl Filters {
    fn to_params(&self) -> DrugSearchParams {
        DrugSearchParams {
            name: self.name.clone(),
            form: self.form,
            expired: self.expired.then_some(true),
            expiring_soon: self.expiring_soon.then_some(true),
            page: self.page,
            size: self.size,
            ..DrugSearchParams::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let (path, explicit) = Config::resolve_path(cli.config.as_deref());
    let config = Config::load_or_default(&path, explicit)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    debug!(base_url = %config.api.base_url, "configuration loaded");

    let token_file = config.token_file();
    let store = FileTokenStore::load(token_file.clone())
        .await
        .with_context(|| format!("failed to open token file {}", token_file.display()))?;

    let observer = || {
        warn!("session expired");
        eprintln!("Session expired. Run `medkit login <email>` to sign in again.");
    };
    let client = ApiClient::new(config.api, Arc::new(store))
        .context("failed to build API client")?
        .with_session_observer(Arc::new(observer));

    run(&client, cli.command).await
}

/// LOG_LEVEL wins over RUST_LOG; quiet by default so command output stays clean.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let password = read_password()?;
            let request = LoginRequest {
                email,
                password: password.into(),
            };
            let tokens = client.auth().login(&request).await.context("login failed")?;
            match tokens.username {
                Some(name) => println!("Signed in as {name}"),
                None => println!("Signed in"),
            }
        }
        Command::Logout => {
            client.auth().logout().await?;
            println!("Signed out");
        }
        Command::Whoami => match client.auth().restore_session().await? {
            Some(user) => {
                let role = if user.is_admin() { " (admin)" } else { "" };
                println!("{} <{}>{role}", user.username, user.email);
            }
            None => println!("Not signed in"),
        },
        Command::Drugs(cmd) => run_drugs(client, cmd).await?,
        Command::Admin(cmd) => run_admin(client, cmd).await?,
    }
    Ok(())
}

async fn run_drugs(client: &ApiClient, command: DrugsCommand) -> Result<()> {
    let drugs = client.drugs();
    match command {
        DrugsCommand::List(filters) => {
            let page = drugs.search(&filters.to_params()).await?;
            print!("{}", render_drug_page(&page));
        }
        DrugsCommand::Show { id } => {
            let drug = drugs.get(id).await?;
            println!("{}", drug_row(&drug, drug.expiration_status()));
            if let Some(description) = &drug.drug_description {
                println!("  {description}");
            }
        }
        DrugsCommand::Add {
            name,
            form,
            year,
            month,
            description,
        } => {
            let request = DrugRequest {
                name,
                form,
                expiration_year: year,
                expiration_month: month,
                description,
            };
            let drug = drugs.create(&request).await?;
            println!("Added #{}", drug.drug_id);
        }
        DrugsCommand::Rm { id } => {
            drugs.delete(id).await?;
            println!("Deleted #{id}");
        }
        DrugsCommand::Stats => {
            let stats = drugs.statistics().await?;
            print!("{}", render_statistics(&stats));
        }
        DrugsCommand::Forms => {
            for form in drugs.forms().await? {
                println!("{:<14} {}", form.value, form.label);
            }
        }
        DrugsCommand::Export {
            format,
            out,
            filters,
        } => {
            let params = filters.to_params();
            let bytes = match format {
                ExportFormat::Pdf => drugs.export_pdf(&params).await?,
                ExportFormat::Csv => drugs.export_csv(&params).await?,
            };
            std::fs::write(&out, &bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
        DrugsCommand::Alerts => {
            let sent = drugs.send_alerts().await?;
            println!("Sent {sent} alert(s)");
        }
        DrugsCommand::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let parsed = import::read_rows(&text)?;
            for error in &parsed.errors {
                eprintln!("line {}: {}", error.line, error.message);
            }
            if parsed.rows.is_empty() {
                bail!("no importable rows in {}", file.display());
            }
            let summary = drugs.import(&parsed.rows).await?;
            for failure in &summary.failures {
                eprintln!("{}: {}", failure.name, failure.message);
            }
            println!("{}", render_import_summary(&summary, parsed.errors.len()));
        }
    }
    Ok(())
}

async fn run_admin(client: &ApiClient, command: AdminCommand) -> Result<()> {
    let admin = client.admin();
    match command {
        AdminCommand::Users { page, size } => {
            let users = admin.users(page, size, DEFAULT_USERS_SORT).await?;
            print!("{}", render_user_page(&users));
        }
        AdminCommand::Broadcast { subject, message } => {
            if subject.trim().is_empty() || message.trim().is_empty() {
                bail!("subject and message must not be empty");
            }
            let response = admin
                .broadcast_email(&BroadcastEmailRequest { subject, message })
                .await?;
            println!("{}", response.message);
        }
    }
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("MEDKIT_PASSWORD") {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("empty password");
    }
    Ok(password)
}

fn drug_row(drug: &Drug, status: Option<ExpirationStatus>) -> String {
    let status = status.map(ExpirationStatus::label).unwrap_or("unknown");
    let date = drug
        .expiration_date
        .split('T')
        .next()
        .unwrap_or(&drug.expiration_date);
    format!(
        "#{:<6} {:<30} {:<14} {} [{status}]",
        drug.drug_id, drug.drug_name, drug.drug_form, date
    )
}

fn render_drug_page(page: &Page<Drug>) -> String {
    if page.empty {
        return "No medications found\n".to_string();
    }
    let mut out = String::new();
    for drug in &page.content {
        out.push_str(&drug_row(drug, drug.expiration_status()));
        out.push('\n');
    }
    out.push_str(&page_footer(page.number, page.total_pages, page.total_elements));
    out
}

fn render_user_page(page: &Page<UserSummary>) -> String {
    let mut out = String::new();
    for user in &page.content {
        let state = if user.active { "active" } else { "inactive" };
        out.push_str(&format!(
            "#{:<6} {:<20} {:<30} {state}\n",
            user.user_id, user.username, user.email
        ));
    }
    out.push_str(&page_footer(page.number, page.total_pages, page.total_elements));
    out
}

fn page_footer(number: u32, total_pages: u32, total: u64) -> String {
    format!(
        "page {} of {} ({total} total)\n",
        number + 1,
        total_pages.max(1)
    )
}

fn render_import_summary(summary: &ImportSummary, invalid: usize) -> String {
    let mut out = format!("Imported {}", summary.success);
    if summary.failed > 0 {
        out.push_str(&format!(", {} rejected by the server", summary.failed));
    }
    if summary.skipped_expired > 0 {
        out.push_str(&format!(", {} expired skipped", summary.skipped_expired));
    }
    if invalid > 0 {
        out.push_str(&format!(", {invalid} invalid rows"));
    }
    out
}

fn render_statistics(stats: &DrugStatistics) -> String {
    let mut out = format!(
        "total:   {}\nactive:  {}\nexpired: {}\nalerts:  {}\n",
        stats.total_drugs, stats.active_drugs, stats.expired_drugs, stats.alert_sent_count
    );
    for (form, count) in &stats.drugs_by_form {
        out.push_str(&format!("  {form:<14} {count}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug(id: i64, name: &str, date: &str) -> Drug {
        Drug {
            drug_id: id,
            drug_name: name.to_string(),
            drug_form: DrugForm::Pills,
            expiration_date: date.to_string(),
            drug_description: None,
        }
    }

    #[test]
    fn parses_login() {
        let cli = Cli::try_parse_from(["medkit", "login", "ann@example.com"]).unwrap();
        assert!(!cli.json);
        assert!(matches!(cli.command, Command::Login { ref email } if email == "ann@example.com"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["medkit", "whoami", "--json", "--config", "/tmp/m.toml"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
    }

    #[test]
    fn parses_drug_add() {
        let cli = Cli::try_parse_from([
            "medkit", "drugs", "add", "Ibuprofen", "--form", "pills", "--year", "2027", "--month",
            "3",
        ])
        .unwrap();
        let Command::Drugs(DrugsCommand::Add {
            name,
            form,
            year,
            month,
            description,
        }) = cli.command
        else {
            panic!("expected drugs add");
        };
        assert_eq!(name, "Ibuprofen");
        assert_eq!(form, DrugForm::Pills);
        assert_eq!((year, month), (2027, 3));
        assert_eq!(description, None);
    }

    #[test]
    fn rejects_bad_month_and_form() {
        let base = ["medkit", "drugs", "add", "X", "--year", "2027"];
        let bad_month = base.iter().copied().chain(["--form", "gel", "--month", "13"]);
        assert!(Cli::try_parse_from(bad_month).is_err());
        let bad_form = base.iter().copied().chain(["--form", "capsule", "--month", "1"]);
        assert!(Cli::try_parse_from(bad_form).is_err());
    }

    #[test]
    fn export_filters_map_to_params() {
        let cli = Cli::try_parse_from([
            "medkit", "drugs", "export", "--format", "csv", "-o", "out.csv", "--expired",
            "--form", "syrup",
        ])
        .unwrap();
        let Command::Drugs(DrugsCommand::Export {
            format,
            out,
            filters,
        }) = cli.command
        else {
            panic!("expected drugs export");
        };
        assert_eq!(format, ExportFormat::Csv);
        assert_eq!(out, PathBuf::from("out.csv"));

        let params = filters.to_params();
        assert_eq!(params.expired, Some(true));
        assert_eq!(params.expiring_soon, None);
        assert_eq!(params.form, Some(DrugForm::Syrup));
    }

    #[test]
    fn admin_users_defaults() {
        let cli = Cli::try_parse_from(["medkit", "admin", "users"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Admin(AdminCommand::Users { page: 0, size }) if size == DEFAULT_USERS_PAGE_SIZE
        ));
    }

    #[test]
    fn drug_row_shows_date_and_status() {
        let row = drug_row(
            &drug(7, "Ibuprofen", "2027-03-31T00:00:00"),
            Some(ExpirationStatus::ExpiringSoon),
        );
        assert!(row.starts_with("#7 "), "got: {row}");
        assert!(row.contains("2027-03-31 [expiring-soon]"), "got: {row}");
        assert!(row.contains("PILLS"));

        let row = drug_row(&drug(8, "Mystery", "soon"), None);
        assert!(row.ends_with("[unknown]"), "got: {row}");
    }

    #[test]
    fn empty_page_renders_message() {
        let page = Page::<Drug> {
            content: vec![],
            total_elements: 0,
            total_pages: 0,
            size: 10,
            number: 0,
            first: true,
            last: true,
            empty: true,
        };
        assert_eq!(render_drug_page(&page), "No medications found\n");
    }

    #[test]
    fn parses_drug_import() {
        let cli = Cli::try_parse_from(["medkit", "drugs", "import", "cabinet.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Drugs(DrugsCommand::Import { ref file }) if file == &PathBuf::from("cabinet.csv")
        ));
    }

    #[test]
    fn import_summary_lists_only_nonzero_counts() {
        let mut summary = ImportSummary {
            success: 4,
            ..ImportSummary::default()
        };
        assert_eq!(render_import_summary(&summary, 0), "Imported 4");

        summary.failed = 1;
        summary.skipped_expired = 2;
        assert_eq!(
            render_import_summary(&summary, 3),
            "Imported 4, 1 rejected by the server, 2 expired skipped, 3 invalid rows"
        );
    }

    #[test]
    fn footer_is_one_based() {
        assert_eq!(page_footer(0, 3, 25), "page 1 of 3 (25 total)\n");
        assert_eq!(page_footer(0, 0, 0), "page 1 of 1 (0 total)\n");
    }

    #[test]
    fn statistics_list_forms() {
        let stats = DrugStatistics {
            total_drugs: 3,
            expired_drugs: 1,
            active_drugs: 2,
            alert_sent_count: 0,
            drugs_by_form: [("GEL".to_string(), 1), ("PILLS".to_string(), 2)]
                .into_iter()
                .collect(),
        };
        let out = render_statistics(&stats);
        assert!(out.starts_with("total:   3\n"));
        assert!(out.contains("  PILLS          2\n"));
    }
}
