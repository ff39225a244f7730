use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("Database connection established");

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    let migrations = [
        include_str!("../../migrations/001_global_mutes.sql"),
        include_str!("../../migrations/002_gmute_settings.sql"),
    ];

    for (i, migration) in migrations.iter().enumerate() {
        debug!("Running migration {}", i + 1);
        for statement in migration.split(';') {
            let statement = statement.trim();
            if statement.is_empty() || is_comment_only(statement) {
                continue;
            }
            if let Err(e) = sqlx::query(statement).execute(pool).await {
                let err_str = e.to_string();
                if !err_str.contains("already exists") && !err_str.contains("duplicate key") {
                    return Err(e);
                }
            }
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

fn is_comment_only(statement: &str) -> bool {
    statement
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_only_statements() {
        assert!(is_comment_only("-- just a note\n  "));
        assert!(!is_comment_only("-- note\nCREATE TABLE t (id INT)"));
    }
}
