//! Seed a demo project and a pair of API tokens for local development.
//!
//! Usage: `ADMIN_API_KEY=dev cargo run --bin seed-demo`

use anyhow::Result;
use tracing::info;

use crowd_translate::config::Config;
use crowd_translate::db::Database;
use crowd_translate::models::{NewFile, UserRole};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crowd_translate=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_path)?;

    db.upsert_token(
        "demo-translator-token",
        "demo-translator",
        "Demo Translator",
        UserRole::Contributor,
    )?;
    db.upsert_token(
        "demo-moderator-token",
        "demo-moderator",
        "Demo Moderator",
        UserRole::Moderator,
    )?;
    info!("Seeded tokens: demo-translator-token, demo-moderator-token");

    let (project, files) = db.create_project(
        "Getting Started Guide",
        &["documentation".to_string()],
        &[
            NewFile {
                label: "introduction.md".to_string(),
                original_text: "Welcome to the platform. This short guide walks you through \
                                claiming a file, translating it, and submitting it for review."
                    .to_string(),
                content_url: None,
                word_count: None,
            },
            NewFile {
                label: "style-guide.md".to_string(),
                original_text: "Keep technical identifiers untranslated. Match the tone of the \
                                original document and preserve its formatting."
                    .to_string(),
                content_url: None,
                word_count: None,
            },
        ],
    )?;

    info!("Seeded project {} ({})", project.name, project.id);
    for file in files {
        info!("  file {} ({})", file.label, file.id);
    }

    Ok(())
}
