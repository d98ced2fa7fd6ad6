//! Rebranch - default-branch migration for Azure DevOps repositories
//!
//! The `rebranch` command renames a repository's default branch and carries
//! its pipelines and branch policies across.
//!
//! ## Commands
//!
//! - `migrate`: migrate a repository (interactive selection by default)
//! - `rollback`: undo the branch changes of a migration
//! - `list`: show repositories and their default branches

mod prompt;

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rebranch_core::{
    MigrationError, MigrationOptions, MigrationOutcome, Migrator, RollbackOutcome,
    DEFAULT_NEW_BRANCH, DEFAULT_OLD_BRANCH,
};
use rebranch_remote::{AzureDevOpsClient, ConnectionConfig, GitService, Repository};
use tracing::{error, info, warn, Level};

use crate::prompt::Prompter;

#[derive(Parser)]
#[command(name = "rebranch")]
#[command(author = "Rebranch Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Migrate repositories to a new default branch", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and results
    #[arg(long, global = true)]
    json: bool,

    /// Azure DevOps organization name or URL
    #[arg(long, env = "AZURE_DEVOPS_ORG")]
    organization: String,

    /// Personal access token (required)
    #[arg(long, env = "AZURE_DEVOPS_PAT", hide_env_values = true)]
    token: Option<String>,

    /// Branch to migrate away from
    #[arg(long, default_value = DEFAULT_OLD_BRANCH, global = true)]
    old_branch: String,

    /// Branch to migrate to
    #[arg(long, default_value = DEFAULT_NEW_BRANCH, global = true)]
    new_branch: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a repository to the new default branch
    Migrate {
        /// Repository name (or project/name); prompts with a list if omitted
        #[arg(short, long)]
        repository: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Restore the old default branch and delete the new branch and mirroring pipeline
    Rollback {
        /// Repository name (or project/name)
        #[arg(short, long)]
        repository: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List repositories and their default branches
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rebranch_core::init_tracing(cli.json, level);

    let options = MigrationOptions::new(&cli.old_branch, &cli.new_branch)
        .context("Invalid branch names")?;

    let config = connection_config(&cli.organization, cli.token.as_deref())?;
    let client = Arc::new(
        AzureDevOpsClient::new(config).context("Failed to create Azure DevOps client")?,
    );
    let migrator = Migrator::from_service(client.clone(), options);
    let mut prompter = Prompter::stdio();

    match cli.command {
        Commands::Migrate { repository, yes } => {
            cmd_migrate(
                client.as_ref(),
                &migrator,
                &mut prompter,
                repository.as_deref(),
                yes,
                cli.json,
            )
            .await
        }
        Commands::Rollback { repository, yes } => {
            cmd_rollback(
                client.as_ref(),
                &migrator,
                &mut prompter,
                &repository,
                yes,
                cli.json,
            )
            .await
        }
        Commands::List => cmd_list(client.as_ref(), &mut prompter).await,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_list<R: BufRead, W: Write>(
    git: &dyn GitService,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    let repositories = list_sorted(git).await?;
    if repositories.is_empty() {
        prompter.say("No repositories found.")?;
        return Ok(());
    }
    for repo in &repositories {
        prompter.say(&format!(
            "{}/{}  {}",
            repo.project.name,
            repo.name,
            repo.default_branch.as_deref().unwrap_or("(empty)")
        ))?;
    }
    Ok(())
}

async fn cmd_migrate<R: BufRead, W: Write>(
    git: &dyn GitService,
    migrator: &Migrator,
    prompter: &mut Prompter<R, W>,
    repository: Option<&str>,
    yes: bool,
    json: bool,
) -> Result<()> {
    if let Some(name) = repository {
        let repositories = list_sorted(git).await?;
        let repo = find_repository(&repositories, name)?;
        let options = migrator.options();
        let question = format!(
            "Migrate {}/{} from {} to {}?",
            repo.project.name,
            repo.name,
            options.old_branch.short_name(),
            options.new_branch.short_name()
        );
        if !yes && !prompter.confirm(&question)? {
            info!("Migration cancelled");
            return Ok(());
        }
        let outcome = migrator
            .migrate(repo)
            .await
            .with_context(|| format!("Migration of {} failed", repo.name))?;
        prompter.say(&render_outcome(&outcome, json)?)?;
        return Ok(());
    }

    loop {
        match migrate_selected(git, migrator, prompter, !yes, json).await {
            Ok(()) => {}
            Err(e) if is_invalid_selection(&e) => warn!(error = %e, "Nothing migrated"),
            Err(e) => error!(error = %format!("{e:#}"), "Migration failed"),
        }
        if !prompter.confirm("Would you like to perform another migration?")? {
            return Ok(());
        }
    }
}

async fn migrate_selected<R: BufRead, W: Write>(
    git: &dyn GitService,
    migrator: &Migrator,
    prompter: &mut Prompter<R, W>,
    confirm: bool,
    json: bool,
) -> Result<()> {
    let repositories = list_sorted(git).await?;
    let Some(repo) = prompter.select_repository(&repositories, confirm)? else {
        info!("No repository selected");
        return Ok(());
    };
    let outcome = migrator.migrate(repo).await?;
    prompter.say(&render_outcome(&outcome, json)?)?;
    Ok(())
}

async fn cmd_rollback<R: BufRead, W: Write>(
    git: &dyn GitService,
    migrator: &Migrator,
    prompter: &mut Prompter<R, W>,
    repository: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let repositories = list_sorted(git).await?;
    let repo = find_repository(&repositories, repository)?;
    let options = migrator.options();
    let question = format!(
        "Restore {} as the default branch of {} and delete {}?",
        options.old_branch.short_name(),
        repo.name,
        options.new_branch.short_name()
    );
    if !yes && !prompter.confirm(&question)? {
        info!("Rollback cancelled");
        return Ok(());
    }

    let outcome = migrator
        .rollback(repo)
        .await
        .with_context(|| format!("Rollback of {} failed", repo.name))?;
    prompter.say(&render_rollback(&repo.name, &outcome, json)?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn connection_config(organization: &str, token: Option<&str>) -> Result<ConnectionConfig> {
    match token.map(str::trim) {
        Some(token) if !token.is_empty() => {
            Ok(ConnectionConfig::new(organization).with_token(token))
        }
        _ => bail!("A personal access token is required; pass --token or set AZURE_DEVOPS_PAT"),
    }
}

async fn list_sorted(git: &dyn GitService) -> Result<Vec<Repository>> {
    let mut repositories = git
        .list_repositories()
        .await
        .context("Failed to list repositories")?;
    repositories.sort_by(|a, b| {
        (&a.project.name, &a.name).cmp(&(&b.project.name, &b.name))
    });
    Ok(repositories)
}

/// Find a repository by `name` or `project/name`.
fn find_repository<'a>(repositories: &'a [Repository], name: &str) -> Result<&'a Repository> {
    let matches: Vec<&Repository> = repositories
        .iter()
        .filter(|r| r.name == name || format!("{}/{}", r.project.name, r.name) == name)
        .collect();
    match matches.as_slice() {
        [repo] => Ok(*repo),
        [] => bail!("Repository '{}' not found", name),
        _ => bail!(
            "Repository name '{}' is ambiguous; use project/name",
            name
        ),
    }
}

fn is_invalid_selection(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<MigrationError>(),
        Some(MigrationError::InvalidSelection(_))
    )
}

fn render_outcome(outcome: &MigrationOutcome, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(outcome)?);
    }
    if outcome.skipped_no_default_branch {
        return Ok(format!(
            "{}: repository has no default branch, nothing to migrate",
            outcome.repository
        ));
    }

    let mut lines = vec![format!("Migrated {}", outcome.repository)];
    for record in &outcome.steps {
        lines.push(format!("  {:<26} {}", record.step.as_str(), record.status));
    }
    let policies = &outcome.policies;
    lines.push(format!(
        "  policies: {} cloned, {} already present, {} rejected, {} failed",
        policies.cloned.len(),
        policies.skipped_existing.len(),
        policies.rejected.len(),
        policies.failed.len()
    ));
    if !outcome.updated_pipelines.is_empty() {
        lines.push(format!(
            "  pipelines updated: {}",
            outcome.updated_pipelines.join(", ")
        ));
    }
    Ok(lines.join("\n"))
}

fn render_rollback(repository: &str, outcome: &RollbackOutcome, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(outcome)?);
    }
    let done = |flag: bool| if flag { "done" } else { "skipped" };
    Ok(format!(
        "Rolled back {}\n  restore default branch     {}\n  delete mirroring pipeline  {}\n  delete new branch          {}",
        repository,
        done(outcome.restored_default_branch),
        done(outcome.deleted_mirroring_pipeline),
        done(outcome.deleted_branch)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebranch_remote::fakes::MemoryDevOps;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(prompter: Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompter.into_output()).unwrap()
    }

    fn setup() -> (Arc<MemoryDevOps>, Migrator) {
        let service = Arc::new(MemoryDevOps::new());
        service.add_repository("web", "Platform", Some("master"));
        service.add_repository("api", "Platform", Some("master"));
        service.add_repository("scratch", "Sandbox", None);
        let migrator = Migrator::from_service(service.clone(), MigrationOptions::default());
        (service, migrator)
    }

    #[test]
    fn test_missing_token_fails_before_any_request() {
        for token in [None, Some(""), Some("   ")] {
            let err = connection_config("contoso", token).unwrap_err();
            assert!(err.to_string().contains("AZURE_DEVOPS_PAT"));
        }
        let config = connection_config("contoso", Some("pat")).unwrap();
        assert_eq!(config.token.as_deref(), Some("pat"));
    }

    #[tokio::test]
    async fn test_cmd_list_shows_default_branches() {
        let (service, _) = setup();
        let mut p = prompter("");

        cmd_list(service.as_ref(), &mut p).await.unwrap();

        let out = output(p);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Platform/api  refs/heads/master");
        assert_eq!(lines[1], "Platform/web  refs/heads/master");
        assert_eq!(lines[2], "Sandbox/scratch  (empty)");
    }

    #[tokio::test]
    async fn test_cmd_migrate_named_repository() {
        let (service, migrator) = setup();
        let mut p = prompter("");

        cmd_migrate(service.as_ref(), &migrator, &mut p, Some("Platform/web"), true, false)
            .await
            .unwrap();

        let out = output(p);
        assert!(out.contains("Migrated web"));
        assert!(out.contains("create_branch"));
        let repos = service.list_repositories().await.unwrap();
        let web = repos.iter().find(|r| r.name == "web").unwrap();
        assert_eq!(web.default_branch.as_deref(), Some("refs/heads/main"));
    }

    #[tokio::test]
    async fn test_cmd_migrate_declined_makes_no_changes() {
        let (service, migrator) = setup();
        let mut p = prompter("n\n");

        cmd_migrate(service.as_ref(), &migrator, &mut p, Some("web"), false, false)
            .await
            .unwrap();
        assert_eq!(service.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_interactive_migration_then_quit() {
        let (service, migrator) = setup();
        // pick "api" (sorted first), confirm, then decline another run
        let mut p = prompter("1\ny\nn\n");

        cmd_migrate(service.as_ref(), &migrator, &mut p, None, false, false)
            .await
            .unwrap();

        let out = output(p);
        assert!(out.contains("Migrated api"));
        assert!(out.contains("Would you like to perform another migration? [Y/N]"));
        assert!(service.mutation_count() > 0);
    }

    #[tokio::test]
    async fn test_invalid_selection_performs_no_mutation() {
        let (service, migrator) = setup();
        let mut p = prompter("42\nn\n");

        cmd_migrate(service.as_ref(), &migrator, &mut p, None, false, false)
            .await
            .unwrap();
        assert_eq!(service.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_migration_offers_another_attempt() {
        let (service, migrator) = setup();
        service.deny_build_writes();
        let mut p = prompter("1\ny\ny\n2\ny\nn\n");

        cmd_migrate(service.as_ref(), &migrator, &mut p, None, false, false)
            .await
            .unwrap();

        let out = output(p);
        assert_eq!(
            out.matches("Would you like to perform another migration?")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_cmd_migrate_named_failure_is_returned() {
        let (service, migrator) = setup();
        service.deny_build_writes();
        let mut p = prompter("");

        let err = cmd_migrate(service.as_ref(), &migrator, &mut p, Some("web"), true, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Migration of web failed"));
    }

    #[tokio::test]
    async fn test_cmd_rollback_after_migrate() {
        let (service, migrator) = setup();
        let mut p = prompter("");
        cmd_migrate(service.as_ref(), &migrator, &mut p, Some("web"), true, false)
            .await
            .unwrap();

        let mut p = prompter("");
        cmd_rollback(service.as_ref(), &migrator, &mut p, "web", true, true)
            .await
            .unwrap();

        let out = output(p);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["restored_default_branch"], true);
        assert_eq!(value["deleted_branch"], true);
    }

    #[test]
    fn test_find_repository_by_name_and_path() {
        let service = MemoryDevOps::new();
        let repos = vec![
            service.add_repository("web", "Platform", Some("master")),
            service.add_repository("web", "Legacy", Some("master")),
            service.add_repository("api", "Platform", Some("master")),
        ];

        assert_eq!(find_repository(&repos, "api").unwrap().name, "api");
        assert_eq!(
            find_repository(&repos, "Legacy/web").unwrap().project.name,
            "Legacy"
        );
        let ambiguous = find_repository(&repos, "web").unwrap_err();
        assert!(ambiguous.to_string().contains("ambiguous"));
        assert!(find_repository(&repos, "missing").is_err());
    }

    #[test]
    fn test_render_skipped_outcome() {
        let outcome = MigrationOutcome {
            repository: "scratch".to_string(),
            steps: Vec::new(),
            policies: Default::default(),
            updated_pipelines: Vec::new(),
            skipped_no_default_branch: true,
        };
        let text = render_outcome(&outcome, false).unwrap();
        assert!(text.contains("no default branch"));

        let json = render_outcome(&outcome, true).unwrap();
        assert!(json.contains("\"skipped_no_default_branch\": true"));
    }
}
