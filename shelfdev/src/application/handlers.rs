use std::path::PathBuf;

use shelf_core::error::{Result, ShelfError};
use shelf_core::{
    AuthGate, CatalogManager, ContentRoot, DeleteRequest, StaticCredentials, Upload,
    UploadRequest, hash_password,
};
use tracing::info;

pub struct Context {
    pub root: PathBuf,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
}

impl Context {
    fn gate(&self) -> Result<AuthGate> {
        let secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ShelfError::Config("SHELF_JWT_SECRET / --jwt-secret is required".into()))?;
        AuthGate::new(secret.as_bytes(), self.token_ttl_secs)
    }

    fn manager(&self) -> Result<CatalogManager> {
        CatalogManager::open(ContentRoot::new(&self.root))
    }

    /// Mutations only run once the token has been accepted.
    fn authorized_manager(&self, token: &str) -> Result<CatalogManager> {
        let principal = self.gate()?.verify(token)?;
        info!(user = %principal.subject, "token accepted");
        self.manager()
    }
}

pub fn handle_init(ctx: &Context) -> Result<()> {
    let root = ContentRoot::new(&ctx.root);
    root.ensure()?;
    eprintln!("init: {}", root.root().display());
    Ok(())
}

pub fn handle_ls(ctx: &Context, long: bool) -> Result<()> {
    let catalog = ctx.manager()?.catalog()?;
    for rec in &catalog.models {
        if long {
            println!("{:<32}  {:<48}  {}", rec.name, rec.model_path, rec.image_path);
        } else {
            println!("{}", rec.name);
        }
    }
    Ok(())
}

pub fn handle_upload(
    ctx: &Context,
    name: String,
    mesh: PathBuf,
    preview: PathBuf,
    token: String,
) -> Result<()> {
    let mgr = ctx.authorized_manager(&token)?;
    let rec = mgr.create_or_update(UploadRequest {
        name,
        mesh: Upload::from_path(mesh),
        preview: Upload::from_path(preview),
    })?;
    eprintln!("upload: {} -> {} + {}", rec.name, rec.model_path, rec.image_path);
    Ok(())
}

pub fn handle_rm(
    ctx: &Context,
    name: String,
    model_path: Option<String>,
    image_path: Option<String>,
    token: String,
) -> Result<()> {
    let mgr = ctx.authorized_manager(&token)?;
    let rec = mgr.delete(DeleteRequest {
        name,
        mesh_path: model_path,
        image_path,
    })?;
    eprintln!("rm: {}", rec.name);
    Ok(())
}

pub fn handle_token_issue(
    ctx: &Context,
    username: String,
    password: String,
    admin_user: String,
    admin_hash: String,
) -> Result<()> {
    let creds = StaticCredentials::new().with_user(admin_user, admin_hash)?;
    let token = ctx.gate()?.login(&creds, &username, &password)?;
    println!("{token}");
    Ok(())
}

pub fn handle_token_verify(ctx: &Context, token: String) -> Result<()> {
    let principal = ctx.gate()?.verify(&token)?;
    println!("user={} exp={}", principal.subject, principal.expires_at);
    Ok(())
}

pub fn handle_hash_password(password: String) -> Result<()> {
    println!("{}", hash_password(&password)?);
    Ok(())
}
