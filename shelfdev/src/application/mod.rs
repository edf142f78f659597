pub mod handlers;

use crate::presentation::cli::{Cli, Commands, TokenCommands};
use clap::Parser;
use shelf_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = handlers::Context {
        root: cli.root,
        jwt_secret: cli.jwt_secret,
        token_ttl_secs: cli.token_ttl_secs,
    };
    match cli.command {
        Commands::Init => handlers::handle_init(&ctx),
        Commands::Ls { long } => handlers::handle_ls(&ctx, long),
        Commands::Upload {
            name,
            mesh,
            preview,
            token,
        } => handlers::handle_upload(&ctx, name, mesh, preview, token),
        Commands::Rm {
            name,
            model_path,
            image_path,
            token,
        } => handlers::handle_rm(&ctx, name, model_path, image_path, token),
        Commands::Token(cmd) => match cmd {
            TokenCommands::Issue {
                username,
                password,
                admin_user,
                admin_hash,
            } => handlers::handle_token_issue(&ctx, username, password, admin_user, admin_hash),
            TokenCommands::Verify { token } => handlers::handle_token_verify(&ctx, token),
        },
        Commands::HashPassword { password } => handlers::handle_hash_password(password),
    }
}
