use assert_cmd::prelude::*;
use predicates::prelude::*;

/// DB-backed; skipped if DATABASE_URL is not set (local + CI friendly).
#[tokio::test]
async fn cli_db_migrate_then_status_reports_core_tables() -> anyhow::Result<()> {
    let url = match std::env::var(replicon_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: DATABASE_URL not set");
            return Ok(());
        }
    };

    let mut migrate_cmd = assert_cmd::Command::cargo_bin("replicon-cli")?;
    migrate_cmd
        .env(replicon_db::ENV_DB_URL, &url)
        .args(["db", "migrate"]);
    migrate_cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations_applied=true"));

    let mut status_cmd = assert_cmd::Command::cargo_bin("replicon-cli")?;
    status_cmd
        .env(replicon_db::ENV_DB_URL, &url)
        .args(["db", "status"]);
    status_cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("db_ok=true"))
        .stdout(predicate::str::contains("has_core_tables=true"));

    Ok(())
}
