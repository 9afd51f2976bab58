use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use metrics_acl::acl::{load_policy_file, MetricAuthorizer, RoleSet};
use metrics_acl::jwt::JwtConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "metrics-acl policy tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a policy file and print its summary
    Check { file: PathBuf },
    /// Evaluate a metric against a policy file for the given roles
    Authorize {
        #[arg(long)]
        policy: PathBuf,
        #[arg(long = "role")]
        roles: Vec<String>,
        metric: String,
    },
    /// Mint a bearer token for local testing (uses JWT_SECRET and ROLES_CLAIM)
    Token {
        #[arg(long)]
        subject: String,
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    // Try to load env from CWD, then fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file } => {
            let store = load_policy_file(&file)
                .with_context(|| format!("policy {} rejected", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&store.summary())?);
        }
        Commands::Authorize { policy, roles, metric } => {
            let store = load_policy_file(&policy)
                .with_context(|| format!("policy {} rejected", policy.display()))?;
            let roles: RoleSet = roles.into_iter().collect();
            let decision = store.authorize(&roles, &metric);
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if !decision.allowed {
                std::process::exit(2);
            }
        }
        Commands::Token { subject, roles } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", jwt.encode(&subject, &roles)?);
        }
    }

    Ok(())
}
