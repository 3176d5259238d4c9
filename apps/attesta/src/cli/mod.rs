//! # Attesta CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `source` - Register an evidentiary source
//! - `validate` - Validate a mapping file without writing
//! - `create` - Create an entity from a mapping file
//! - `update` - Apply a mapping file to an entity
//! - `show` - Show an entity's current values
//! - `history` - Show the version history of one field
//! - `revisions` - Show an entity's revisions and their differences
//! - `revert` - Restore a field to a recorded version
//! - `revert-source` - Restore a field to the value a source set supported
//! - `translate` - Add a language variant of a translated field
//! - `publish` - Publish or unpublish an entity
//! - `status` - Show database status

mod commands;

use attesta::config::{Overrides, Settings};
use attesta_core::AttestaError;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Attesta - sourced, versioned records for human-rights research
///
/// Every attribute carries its sources, a confidence level and a full
/// edit history.
#[derive(Parser, Debug)]
#[command(name = "attesta")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: ./attesta.toml if present)
    #[arg(short = 'c', long, global = true, env = "ATTESTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the database
    #[arg(short = 'D', long, global = true, env = "ATTESTA_DATABASE")]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "file" (binary snapshot)
    #[arg(short = 'B', long, global = true, env = "ATTESTA_BACKEND")]
    pub backend: Option<String>,

    /// Language to read and write in
    #[arg(short = 'L', long, global = true, env = "ATTESTA_LANGUAGE")]
    pub language: Option<String>,

    /// Editor name recorded on revisions
    #[arg(short = 'E', long, global = true, env = "ATTESTA_EDITOR")]
    pub editor: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Register an evidentiary source
    Source {
        /// Source title
        #[arg(short, long)]
        title: String,

        /// Publication the source appeared in
        #[arg(short, long)]
        publication: Option<String>,

        /// Source URL
        #[arg(short, long)]
        url: Option<String>,

        /// Page, archive snapshot or other pointer into the source
        #[arg(short, long)]
        access_point: Option<String>,
    },

    /// Validate a mapping file without writing anything
    Validate {
        /// Entity type (organization, person, geosite, area, emplacement, violation,
        /// membershipperson, membershiporganization, composition, association)
        #[arg(short, long, required_unless_present = "entity")]
        kind: Option<String>,

        /// Validate against an existing entity (id or uuid)
        #[arg(short, long)]
        entity: Option<String>,

        /// JSON mapping file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create an entity from a mapping file
    Create {
        /// Entity type (organization, person, geosite, area, emplacement, violation,
        /// membershipperson, membershiporganization, composition, association)
        #[arg(short, long)]
        kind: String,

        /// JSON mapping file
        #[arg(short, long)]
        file: PathBuf,

        /// Revision comment
        #[arg(short = 'm', long, default_value = "")]
        comment: String,
    },

    /// Apply a mapping file to an existing entity
    Update {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// JSON mapping file
        #[arg(short, long)]
        file: PathBuf,

        /// Revision comment
        #[arg(short = 'm', long, default_value = "")]
        comment: String,
    },

    /// Show an entity's current values
    Show {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,
    },

    /// Show the version history of one field
    History {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// Field model name, e.g. OrganizationName
        #[arg(short, long)]
        field: String,
    },

    /// Show an entity's revisions
    Revisions {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// Show differences between consecutive revisions
        #[arg(short, long)]
        diff: bool,
    },

    /// Restore a field to a recorded version
    Revert {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// Field model name
        #[arg(short, long)]
        field: String,

        /// Version id to restore
        #[arg(short, long)]
        version: u64,

        /// Revision comment
        #[arg(short = 'm', long, default_value = "")]
        comment: String,
    },

    /// Restore a field to the value supported by exactly these sources
    RevertSource {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// Field model name
        #[arg(short, long)]
        field: String,

        /// Comma-separated source ids
        #[arg(short, long)]
        sources: String,

        /// Revision comment
        #[arg(short = 'm', long, default_value = "")]
        comment: String,
    },

    /// Add a language variant of a translated field
    Translate {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// Field model name
        #[arg(short, long)]
        field: String,

        /// Target language tag
        #[arg(short = 't', long)]
        to: String,

        /// Translated value
        #[arg(long)]
        value: String,

        /// Revision comment
        #[arg(short = 'm', long, default_value = "")]
        comment: String,
    },

    /// Publish or unpublish an entity
    Publish {
        /// Entity id or uuid
        #[arg(short, long)]
        entity: String,

        /// Withdraw instead of publishing
        #[arg(short, long)]
        unpublish: bool,
    },

    /// Show database status
    Status,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), AttestaError> {
    let overrides = Overrides {
        config: cli.config,
        database: cli.database,
        backend: cli.backend,
        language: cli.language,
        editor: cli.editor,
    };
    let settings = Settings::resolve(&overrides, Path::new("."))?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&settings, force),
        Some(Commands::Source {
            title,
            publication,
            url,
            access_point,
        }) => cmd_source(&settings, json_mode, title, publication, url, access_point),
        Some(Commands::Validate { kind, entity, file }) => {
            cmd_validate(&settings, json_mode, kind.as_deref(), entity.as_deref(), &file)
        }
        Some(Commands::Create {
            kind,
            file,
            comment,
        }) => cmd_create(&settings, json_mode, &kind, &file, &comment),
        Some(Commands::Update {
            entity,
            file,
            comment,
        }) => cmd_update(&settings, json_mode, &entity, &file, &comment),
        Some(Commands::Show { entity }) => cmd_show(&settings, json_mode, &entity),
        Some(Commands::History { entity, field }) => {
            cmd_history(&settings, json_mode, &entity, &field)
        }
        Some(Commands::Revisions { entity, diff }) => {
            cmd_revisions(&settings, json_mode, &entity, diff)
        }
        Some(Commands::Revert {
            entity,
            field,
            version,
            comment,
        }) => cmd_revert(&settings, json_mode, &entity, &field, version, &comment),
        Some(Commands::RevertSource {
            entity,
            field,
            sources,
            comment,
        }) => cmd_revert_source(&settings, json_mode, &entity, &field, &sources, &comment),
        Some(Commands::Translate {
            entity,
            field,
            to,
            value,
            comment,
        }) => cmd_translate(&settings, json_mode, &entity, &field, &to, &value, &comment),
        Some(Commands::Publish { entity, unpublish }) => {
            cmd_publish(&settings, json_mode, &entity, !unpublish)
        }
        Some(Commands::Status) | None => cmd_status(&settings, json_mode),
    }
}
