//! CLI commands for float
//!
//! Each command works against an explicitly opened [`PodStore`]. File and
//! ritual commands act on the active pod, as the pod views do.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::{load_config, save_config, Config, FloatPaths};
use crate::db::{KeyValueStore, SqliteStore};
use crate::models::{
    split_list, NewFile, NewIdentity, NewPod, NewRitual, PodFilter, PodStatus, PromptPod,
};
use crate::store::{PodStore, StoreError};

/// Initialize float for first-time setup
pub fn init(paths: &FloatPaths) -> Result<()> {
    if paths.is_initialized() {
        println!("Float is already initialized at {}", paths.root.display());
        return Ok(());
    }

    println!("Initializing float at {}...", paths.root.display());

    paths.ensure_dirs()?;
    if !paths.config.exists() {
        save_config(paths, &Config::default())?;
        println!("  Created config.toml");
    }

    SqliteStore::open(paths).context("Failed to create float database")?;
    println!("  Created float.db");

    println!();
    println!("Float initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  float pod new <name>          Create a pod");
    println!("  float use <pod-id>            Make it the active pod");
    println!("  float identity new <name>     Create an identity");

    Ok(())
}

/// Open the on-disk store and its config
pub fn open_store(paths: &FloatPaths) -> Result<(PodStore<SqliteStore>, Config)> {
    ensure_initialized(paths)?;
    let config = load_config(paths)?;
    let storage = SqliteStore::open(paths).context("Failed to open float database")?;
    let store = PodStore::open(storage).context("Failed to load saved pods")?;
    Ok((store, config))
}

fn ensure_initialized(paths: &FloatPaths) -> Result<()> {
    if !paths.is_initialized() {
        bail!("Float not initialized. Run `float init` first.");
    }
    Ok(())
}

#[derive(Debug, Subcommand)]
pub enum PodOperation {
    /// Create a pod
    New {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// running, paused or archived (defaults to config)
        #[arg(short, long)]
        status: Option<String>,

        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// List pods
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Match name, description or tags
        #[arg(short, long, default_value = "")]
        query: String,
    },

    /// Show a pod
    Show {
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a pod's attributes
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        /// Comma-separated tags, replacing the current ones
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Delete a pod
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum IdentityOperation {
    /// Create an identity
    New {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Comma-separated traits
        #[arg(short, long, default_value = "")]
        traits: String,

        #[arg(short, long)]
        avatar: Option<String>,
    },

    /// List identities
    List,

    /// Edit an identity (updates every pod that embeds it)
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Comma-separated traits, replacing the current ones
        #[arg(short, long)]
        traits: Option<String>,

        #[arg(short, long)]
        avatar: Option<String>,
    },

    /// Delete an identity (removes it from every pod)
    Delete { id: String },

    /// Add the identity to the active pod, or remove it if already there
    Toggle { id: String },
}

#[derive(Debug, Subcommand)]
pub enum FileOperation {
    /// Add a file to the active pod
    Add {
        name: String,

        /// Free-text type tag (defaults to config)
        #[arg(short = 't', long = "type")]
        file_type: Option<String>,

        #[arg(short, long, conflicts_with = "from")]
        content: Option<String>,

        /// Read content from a local file
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// List files in the active pod
    List,

    /// Print a file's content
    Show { id: String },

    /// Edit a file in the active pod
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short = 't', long = "type")]
        file_type: Option<String>,

        #[arg(short, long, conflicts_with = "from")]
        content: Option<String>,

        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Delete a file from the active pod
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum RitualOperation {
    /// Add a ritual to the active pod
    Add {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// A step; repeat for each step in order
        #[arg(short, long = "step")]
        steps: Vec<String>,

        #[arg(long)]
        active: bool,
    },

    /// List rituals in the active pod
    List,

    /// Edit a ritual in the active pod
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Replace all steps; repeat for each step in order
        #[arg(short, long = "step")]
        steps: Vec<String>,

        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a ritual from the active pod
    Delete { id: String },
}

pub fn pod_command<S: KeyValueStore>(
    store: &mut PodStore<S>,
    config: &Config,
    operation: PodOperation,
) -> Result<()> {
    match operation {
        PodOperation::New {
            name,
            description,
            status,
            tags,
        } => {
            let status = match status {
                Some(s) => parse_status(&s)?,
                None => config.default_status,
            };
            let pod = store.create_pod(NewPod {
                name,
                description,
                status,
                tags: tags.as_deref().map(split_list).unwrap_or_default(),
                ..Default::default()
            })?;
            println!("Created pod: {}", pod.id);
        }
        PodOperation::List { status, query } => {
            let filter = PodFilter {
                query,
                status: status.as_deref().map(parse_status).transpose()?,
            };
            list_pods(store, &filter);
        }
        PodOperation::Show { id, json } => {
            let pod = store
                .pod(&id)
                .with_context(|| format!("Pod not found: {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(pod)?);
            } else {
                print_pod_summary(pod, store.active_pod_id() == Some(pod.id.as_str()));
            }
        }
        PodOperation::Edit {
            id,
            name,
            description,
            status,
            tags,
        } => {
            let mut pod = store
                .pod(&id)
                .cloned()
                .with_context(|| format!("Pod not found: {}", id))?;
            if let Some(name) = name {
                pod.name = name;
            }
            if let Some(description) = description {
                pod.description = description;
            }
            if let Some(status) = status {
                pod.status = parse_status(&status)?;
            }
            if let Some(tags) = tags {
                pod.tags = split_list(&tags);
            }
            store.update_pod(pod)?;
        }
        PodOperation::Delete { id } => {
            store.delete_pod(&id)?;
        }
    }
    Ok(())
}

/// Select the active pod, or clear it with `None`
pub fn use_pod<S: KeyValueStore>(store: &mut PodStore<S>, id: Option<&str>) -> Result<()> {
    store.set_active_pod(id)?;
    match store.active_pod() {
        Some(pod) => println!("Active pod: {} ({})", pod.name, pod.id),
        None => println!("No active pod"),
    }
    Ok(())
}

pub fn identity_command<S: KeyValueStore>(
    store: &mut PodStore<S>,
    operation: IdentityOperation,
) -> Result<()> {
    match operation {
        IdentityOperation::New {
            name,
            description,
            traits,
            avatar,
        } => {
            let identity = store.create_identity(NewIdentity {
                name,
                description,
                avatar,
                traits: split_list(&traits),
            })?;
            println!("Created identity: {}", identity.id);
        }
        IdentityOperation::List => {
            if store.identities().is_empty() {
                println!("No identities found.");
                println!("Create one with: float identity new <name>");
                return Ok(());
            }
            let active = store.active_pod();
            println!("{:<36} {:<20} {:<6} TRAITS", "ID", "NAME", "IN POD");
            println!("{}", "-".repeat(80));
            for identity in store.identities() {
                let in_pod = active.map(|p| p.has_identity(&identity.id)).unwrap_or(false);
                println!(
                    "{:<36} {:<20} {:<6} {}",
                    identity.id,
                    truncate(&identity.name, 18),
                    if in_pod { "yes" } else { "" },
                    identity.traits.join(", ")
                );
            }
        }
        IdentityOperation::Edit {
            id,
            name,
            description,
            traits,
            avatar,
        } => {
            let mut identity = store
                .identity(&id)
                .cloned()
                .with_context(|| format!("Identity not found: {}", id))?;
            if let Some(name) = name {
                identity.name = name;
            }
            if let Some(description) = description {
                identity.description = description;
            }
            if let Some(traits) = traits {
                identity.traits = split_list(&traits);
            }
            if let Some(avatar) = avatar {
                identity.avatar = Some(avatar).filter(|a| !a.is_empty());
            }
            store.update_identity(identity)?;
        }
        IdentityOperation::Delete { id } => {
            store.delete_identity(&id)?;
        }
        IdentityOperation::Toggle { id } => {
            let added = store.toggle_identity_in_active_pod(&id)?;
            println!(
                "{} {} the active pod",
                id,
                if added { "added to" } else { "removed from" }
            );
        }
    }
    Ok(())
}

pub fn file_command<S: KeyValueStore>(
    store: &mut PodStore<S>,
    config: &Config,
    operation: FileOperation,
) -> Result<()> {
    match operation {
        FileOperation::Add {
            name,
            file_type,
            content,
            from,
        } => {
            let content = read_content(content, from.as_ref())?.unwrap_or_default();
            let file = store.add_file_to_active_pod(NewFile {
                name,
                file_type: file_type.unwrap_or_else(|| config.default_file_type.clone()),
                content,
            })?;
            println!("Created file: {}", file.id);
        }
        FileOperation::List => {
            let pod = active_pod(store)?;
            if pod.files.is_empty() {
                println!("No files in {}.", pod.name);
                return Ok(());
            }
            println!("{:<32} {:<24} {:<10} {}", "ID", "NAME", "TYPE", "MODIFIED");
            println!("{}", "-".repeat(88));
            for file in &pod.files {
                println!(
                    "{:<32} {:<24} {:<10} {}",
                    file.id,
                    truncate(&file.name, 22),
                    truncate(&file.file_type, 10),
                    file.last_modified.format("%Y-%m-%d %H:%M")
                );
            }
        }
        FileOperation::Show { id } => {
            let pod = active_pod(store)?;
            let file = pod
                .file(&id)
                .with_context(|| format!("File not found: {}", id))?;
            println!("{} [{}]", file.name, file.file_type);
            println!("{}", "=".repeat(50));
            println!("{}", file.content);
        }
        FileOperation::Edit {
            id,
            name,
            file_type,
            content,
            from,
        } => {
            let pod = active_pod(store)?;
            let pod_id = pod.id.clone();
            let mut file = pod
                .file(&id)
                .cloned()
                .with_context(|| format!("File not found: {}", id))?;
            if let Some(name) = name {
                file.name = name;
            }
            if let Some(file_type) = file_type {
                file.file_type = file_type;
            }
            if let Some(content) = read_content(content, from.as_ref())? {
                file.content = content;
            }
            store.update_file(&pod_id, file)?;
        }
        FileOperation::Delete { id } => {
            let pod_id = active_pod(store)?.id.clone();
            store.delete_file(&pod_id, &id)?;
        }
    }
    Ok(())
}

pub fn ritual_command<S: KeyValueStore>(
    store: &mut PodStore<S>,
    operation: RitualOperation,
) -> Result<()> {
    match operation {
        RitualOperation::Add {
            name,
            description,
            steps,
            active,
        } => {
            let ritual = store.add_ritual_to_active_pod(NewRitual {
                name,
                description,
                steps: clean_steps(steps),
                is_active: active,
            })?;
            println!("Created ritual: {}", ritual.id);
        }
        RitualOperation::List => {
            let pod = active_pod(store)?;
            if pod.rituals.is_empty() {
                println!("No rituals in {}.", pod.name);
                return Ok(());
            }
            for ritual in &pod.rituals {
                let marker = if ritual.is_active { "●" } else { "○" };
                println!("{} {} ({})", marker, ritual.name, ritual.id);
                if !ritual.description.is_empty() {
                    println!("    {}", ritual.description);
                }
                for (idx, step) in ritual.steps.iter().enumerate() {
                    println!("    {}. {}", idx + 1, step);
                }
            }
        }
        RitualOperation::Edit {
            id,
            name,
            description,
            steps,
            active,
        } => {
            let pod = active_pod(store)?;
            let pod_id = pod.id.clone();
            let mut ritual = pod
                .ritual(&id)
                .cloned()
                .with_context(|| format!("Ritual not found: {}", id))?;
            if let Some(name) = name {
                ritual.name = name;
            }
            if let Some(description) = description {
                ritual.description = description;
            }
            if !steps.is_empty() {
                ritual.steps = clean_steps(steps);
            }
            if let Some(active) = active {
                ritual.is_active = active;
            }
            store.update_ritual(&pod_id, ritual)?;
        }
        RitualOperation::Delete { id } => {
            let pod_id = active_pod(store)?.id.clone();
            store.delete_ritual(&pod_id, &id)?;
        }
    }
    Ok(())
}

fn list_pods<S: KeyValueStore>(store: &PodStore<S>, filter: &PodFilter) {
    let pods = store.find_pods(filter);

    if store.pods().is_empty() {
        println!("No pods found.");
        println!("Create one with: float pod new <name>");
        return;
    }
    if pods.is_empty() {
        println!("No pods match your current search criteria.");
        return;
    }

    println!(
        "{:<2}{:<32} {:<20} {:<10} {:>4} {:>4} {:>4}",
        "", "ID", "NAME", "STATUS", "IDS", "FILE", "RITE"
    );
    println!("{}", "-".repeat(82));

    let active = store.active_pod_id();
    for pod in pods {
        println!(
            "{:<2}{:<32} {:<20} {:<10} {:>4} {:>4} {:>4}",
            if active == Some(pod.id.as_str()) { "*" } else { "" },
            truncate(&pod.id, 30),
            truncate(&pod.name, 18),
            pod.status.to_string(),
            pod.identities.len(),
            pod.files.len(),
            pod.rituals.len()
        );
    }
}

fn print_pod_summary(pod: &PromptPod, is_active: bool) {
    println!("Pod: {}{}", pod.id, if is_active { " (active)" } else { "" });
    println!("{}", "=".repeat(50));
    println!("Name:     {}", pod.name);
    println!("Status:   {}", pod.status);
    if !pod.description.is_empty() {
        println!("About:    {}", pod.description);
    }
    if !pod.tags.is_empty() {
        println!("Tags:     {}", pod.tags.join(", "));
    }

    println!();
    println!("Identities: {}", pod.identities.len());
    for identity in &pod.identities {
        println!("  {}: {}", identity.id, identity.name);
    }
    println!("Files: {}", pod.files.len());
    for file in &pod.files {
        println!("  {}: {} [{}]", file.id, file.name, file.file_type);
    }
    let active_rituals = pod.rituals.iter().filter(|r| r.is_active).count();
    println!("Rituals: {} ({} active)", pod.rituals.len(), active_rituals);

    println!();
    println!("Created:  {}", pod.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:  {}", pod.last_modified.format("%Y-%m-%d %H:%M:%S UTC"));
}

fn active_pod<S: KeyValueStore>(store: &PodStore<S>) -> Result<&PromptPod> {
    store.active_pod().ok_or_else(|| StoreError::NoActivePod.into())
}

fn parse_status(s: &str) -> Result<PodStatus> {
    s.parse::<PodStatus>().map_err(|e| anyhow::anyhow!(e))
}

fn read_content(inline: Option<String>, from: Option<&PathBuf>) -> Result<Option<String>> {
    match (inline, from) {
        (Some(content), _) => Ok(Some(content)),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map(Some),
        (None, None) => Ok(None),
    }
}

fn clean_steps(steps: Vec<String>) -> Vec<String> {
    steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn store() -> PodStore<MemoryStore> {
        PodStore::open(MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Écriture créative", 8), "Écrit...");
    }

    #[test]
    fn test_clean_steps_drops_blank_entries() {
        let steps = vec![" breathe ".to_string(), "  ".to_string(), "write".to_string()];
        assert_eq!(clean_steps(steps), vec!["breathe", "write"]);
    }

    #[test]
    fn test_new_pod_uses_config_default_status() -> Result<()> {
        let mut store = store();
        let config = Config {
            default_status: PodStatus::Paused,
            ..Default::default()
        };

        pod_command(
            &mut store,
            &config,
            PodOperation::New {
                name: "Writing".to_string(),
                description: String::new(),
                status: None,
                tags: Some("fiction, drafts".to_string()),
            },
        )?;

        let pod = &store.pods()[0];
        assert_eq!(pod.status, PodStatus::Paused);
        assert_eq!(pod.tags, vec!["fiction", "drafts"]);
        Ok(())
    }

    #[test]
    fn test_pod_edit_only_changes_given_fields() -> Result<()> {
        let mut store = store();
        let pod = store.create_pod(NewPod {
            name: "Writing".to_string(),
            description: "Novel".to_string(),
            ..Default::default()
        })?;

        pod_command(
            &mut store,
            &Config::default(),
            PodOperation::Edit {
                id: pod.id.clone(),
                name: None,
                description: None,
                status: Some("archived".to_string()),
                tags: None,
            },
        )?;

        let edited = store.pod(&pod.id).unwrap();
        assert_eq!(edited.name, "Writing");
        assert_eq!(edited.description, "Novel");
        assert_eq!(edited.status, PodStatus::Archived);
        Ok(())
    }

    #[test]
    fn test_file_commands_require_active_pod() {
        let mut store = store();
        let err = file_command(&mut store, &Config::default(), FileOperation::List).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NoActivePod)
        ));
    }

    #[test]
    fn test_file_add_uses_default_type() -> Result<()> {
        let mut store = store();
        let pod = store.create_pod(NewPod {
            name: "Writing".to_string(),
            ..Default::default()
        })?;
        store.set_active_pod(Some(&pod.id))?;

        file_command(
            &mut store,
            &Config::default(),
            FileOperation::Add {
                name: "outline".to_string(),
                file_type: None,
                content: Some("Act I".to_string()),
                from: None,
            },
        )?;

        let file = &store.active_pod().unwrap().files[0];
        assert_eq!(file.file_type, "text");
        assert_eq!(file.content, "Act I");
        Ok(())
    }
}
