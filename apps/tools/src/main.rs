use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reader::{demos, explorations, rights, ReaderContext};
use shared::domain::{ExplorationId, UserSummary};
use storage::Storage;

/// Operator commands against the exploration database.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/oppia.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load (or reload) one bundled demo, or every missing one.
    LoadDemo { exploration_id: Option<String> },
    DeleteDemo { exploration_id: String },
    /// Create a private draft owned by `owner_email`.
    CreateExploration {
        owner_email: String,
        title: String,
        #[arg(long, default_value = "Uncategorized")]
        category: String,
        #[arg(long)]
        id: Option<String>,
        /// Point the default rule at END instead of back at the first state.
        #[arg(long)]
        end_by_default: bool,
    },
    Publish {
        exploration_id: String,
        #[arg(long = "as")]
        actor_email: String,
    },
    AddEditor {
        exploration_id: String,
        editor_email: String,
        #[arg(long = "as")]
        actor_email: String,
    },
    MakeAdmin { email: String },
    /// Print state hits, submitted answers and reader feedback.
    Stats { exploration_id: String },
}

async fn user_by_email(ctx: &ReaderContext, email: &str) -> Result<UserSummary> {
    let user_id = ctx
        .storage
        .user_id_for_email(email)
        .await?
        .with_context(|| format!("no user with email {email}"))?;
    ctx.storage
        .get_user(user_id)
        .await?
        .with_context(|| format!("user {email} disappeared"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ReaderContext::new(storage);

    match cli.command {
        Command::LoadDemo {
            exploration_id: Some(id),
        } => {
            let id = ExplorationId(id);
            demos::delete_demo(&ctx, &id).await.map_err(|e| anyhow!(e))?;
            demos::load_demo(&ctx, &id).await.map_err(|e| anyhow!(e))?;
            println!("loaded demo {id}");
        }
        Command::LoadDemo {
            exploration_id: None,
        } => {
            let loaded = demos::load_missing_demos(&ctx)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("loaded {loaded} demo(s)");
        }
        Command::DeleteDemo { exploration_id } => {
            let id = ExplorationId(exploration_id);
            demos::delete_demo(&ctx, &id).await.map_err(|e| anyhow!(e))?;
            println!("deleted demo {id}");
        }
        Command::CreateExploration {
            owner_email,
            title,
            category,
            id,
            end_by_default,
        } => {
            let owner = ctx.storage.create_user(&owner_email).await?;
            let id = explorations::create_new(
                &ctx,
                owner,
                &title,
                &category,
                id.map(ExplorationId),
                end_by_default,
            )
            .await
            .map_err(|e| anyhow!(e))?;
            println!("created exploration_id={id}");
        }
        Command::Publish {
            exploration_id,
            actor_email,
        } => {
            let actor = user_by_email(&ctx, &actor_email).await?;
            let id = ExplorationId(exploration_id);
            rights::publish_exploration(&ctx, &actor, &id)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("published {id}");
        }
        Command::AddEditor {
            exploration_id,
            editor_email,
            actor_email,
        } => {
            let actor = user_by_email(&ctx, &actor_email).await?;
            let editor = ctx.storage.create_user(&editor_email).await?;
            let id = ExplorationId(exploration_id);
            rights::add_editor(&ctx, &actor, &id, editor)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("{editor_email} can now edit {id}");
        }
        Command::MakeAdmin { email } => {
            let user_id = ctx.storage.create_user(&email).await?;
            ctx.storage.set_admin(user_id, true).await?;
            println!("{email} is now an admin (user_id={})", user_id.0);
        }
        Command::Stats { exploration_id } => {
            let id = ExplorationId(exploration_id);
            for hit in ctx.storage.state_hit_counts(&id).await? {
                println!(
                    "{:<32} first={:<6} total={}",
                    hit.state_name, hit.first_hits, hit.total_hits
                );
                for answer in ctx.storage.list_answers(&id, &hit.state_name).await? {
                    println!("    {} {} -> {}", answer.handler, answer.rule, answer.answer_html);
                }
            }
            for feedback in ctx.storage.list_reader_feedback(&id).await? {
                println!(
                    "[{}] {}: {} (path: {})",
                    feedback.created_at,
                    feedback.state_name,
                    feedback.feedback,
                    feedback.state_history.join(" -> ")
                );
            }
        }
    }

    Ok(())
}
