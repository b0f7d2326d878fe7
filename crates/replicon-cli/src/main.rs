use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "replicon")]
#[command(about = "Order replication relay — operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Run connectivity + schema presence checks.
    Status,
    /// Apply embedded SQLx migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = replicon_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = replicon_db::status(&pool).await?;
                    println!("db_ok={} has_core_tables={}", s.ok, s.has_core_tables);
                }
                DbCmd::Migrate => {
                    replicon_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }
    }

    Ok(())
}
