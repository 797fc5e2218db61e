use casbin_datastore::adapter::{policy_records, Adapter, PolicyAdapter};
use casbin_datastore::datastore::{Datastore, SqlDatastore};
use casbin_datastore::errors::AdapterError;
use casbin_datastore::model::Model;
use casbin_datastore::settings::Settings;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "casbin-datastore",
    version,
    about = "Casbin policy storage on a key/value datastore"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the rule table
    Migrate,
    /// Replace the stored policy with the rules of a CSV policy file
    Import { path: String },
    /// Print the stored policy
    Export {
        #[arg(long)]
        json: bool,
    },
    /// Store one rule, e.g. `add p alice data1 read`
    Add { ptype: String, fields: Vec<String> },
    /// Delete one rule
    Remove { ptype: String, fields: Vec<String> },
    /// Delete every rule matching the values from `--field-index` on. Pass "" as a wildcard.
    RemoveFiltered {
        ptype: String,
        #[arg(long, allow_negative_numbers = true)]
        field_index: isize,
        values: Vec<String>,
    },
    /// Store a model definition (.conf)
    SaveModel { path: String },
    /// Print the stored model definition
    ShowModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    let store = SqlDatastore::connect(&settings.database.url).await?;

    if let Command::Migrate = cli.command {
        Migrator::up(store.connection(), None)
            .await
            .into_diagnostic()?;
        tracing::info!("Migrations applied");
        store.close().await?;
        return Ok(());
    }

    let adapter = Adapter::with_config(store, settings.adapter.to_config());
    let outcome = run(&adapter, cli.command).await;
    adapter.close().await?;
    outcome
}

/// Section a rule type belongs to: `p2` -> `p`.
fn section_of(ptype: &str) -> String {
    ptype.chars().take(1).collect()
}

async fn run(adapter: &Adapter<SqlDatastore>, command: Command) -> Result<()> {
    match command {
        Command::Migrate => {}
        Command::Import { path } => {
            let text = std::fs::read_to_string(&path).map_err(AdapterError::from)?;
            let mut model = Model::new();
            let rules = model.load_policy_text(&text)?;
            adapter.save_policy(&model).await?;
            tracing::info!(rules, path = %path, "Imported policy");
        }
        Command::Export { json } => {
            let mut model = Model::new();
            adapter.load_policy(&mut model).await?;
            if json {
                let records = policy_records(&model);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).into_diagnostic()?
                );
            } else {
                print!("{}", model.to_policy_text());
            }
        }
        Command::Add { ptype, fields } => {
            adapter.add_policy(&section_of(&ptype), &ptype, &fields).await?;
            tracing::info!(ptype = %ptype, ?fields, "Added rule");
        }
        Command::Remove { ptype, fields } => {
            adapter
                .remove_policy(&section_of(&ptype), &ptype, &fields)
                .await?;
            tracing::info!(ptype = %ptype, ?fields, "Removed rule");
        }
        Command::RemoveFiltered {
            ptype,
            field_index,
            values,
        } => {
            let removed = adapter
                .remove_filtered_policy(&section_of(&ptype), &ptype, field_index, &values)
                .await?;
            tracing::info!(removed, ptype = %ptype, "Removed filtered rules");
        }
        Command::SaveModel { path } => {
            let conf = std::fs::read_to_string(&path).map_err(AdapterError::from)?;
            adapter.save_model(&conf).await?;
            tracing::info!(path = %path, "Saved model definition");
        }
        Command::ShowModel => {
            let model = adapter.load_model().await?;
            print!("{}", model.to_conf_string());
        }
    }
    Ok(())
}
