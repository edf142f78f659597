use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "shelfdev: asset catalog operator CLI", long_about = None)]
pub struct Cli {
    /// Content root holding models/, previews/ and models.json
    #[arg(long, global = true, env = "SHELF_ROOT", default_value = "public")]
    pub root: PathBuf,

    /// HMAC secret used to sign and check bearer tokens
    #[arg(long = "jwt-secret", global = true, env = "SHELF_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[arg(long = "token-ttl", global = true, env = "SHELF_TOKEN_TTL_SECS", default_value_t = 3600)]
    pub token_ttl_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Check credentials and print a bearer token
    Issue {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long = "admin-user", env = "SHELF_ADMIN_USER", default_value = "admin")]
        admin_user: String,
        /// argon2 PHC hash of the admin password (see `hash-password`)
        #[arg(long = "admin-hash", env = "SHELF_ADMIN_HASH", hide_env_values = true)]
        admin_hash: String,
    },
    /// Print the subject and expiry of a token, or fail
    Verify { token: String },
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the content root layout and an empty catalog
    Init,

    /// List catalog entries
    Ls {
        /// show mesh and preview paths
        #[arg(long)]
        long: bool,
    },

    /// Create or replace an asset from a .glb mesh and a preview image
    Upload {
        name: String,
        /// .glb mesh file
        mesh: PathBuf,
        /// png/jpg/jpeg/webp preview image
        preview: PathBuf,
        #[arg(long, env = "SHELF_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Delete an asset's files and catalog entry
    Rm {
        name: String,
        /// path the caller believes is recorded; only compared, never trusted
        #[arg(long = "model-path")]
        model_path: Option<String>,
        #[arg(long = "image-path")]
        image_path: Option<String>,
        #[arg(long, env = "SHELF_TOKEN", hide_env_values = true)]
        token: String,
    },

    #[command(subcommand)]
    /// Issue or inspect bearer tokens
    Token(TokenCommands),

    /// Print an argon2 PHC hash suitable for SHELF_ADMIN_HASH
    HashPassword { password: String },
}
