use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shelf_core::domain::Catalog;
use shelf_core::error::{Result, ShelfError};
use shelf_core::repo::CatalogRepo;
use shelf_core::repo_fs::FsCatalogRepo;
use shelf_core::{CatalogManager, ContentRoot, DeleteRequest, Upload, UploadRequest};

fn manager() -> (tempfile::TempDir, CatalogManager) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mgr = CatalogManager::open(ContentRoot::new(tmp.path().join("public"))).expect("open");
    (tmp, mgr)
}

fn upload(name: &str, mesh: &[u8], preview_name: &str) -> UploadRequest {
    UploadRequest {
        name: name.to_string(),
        mesh: Upload::from_bytes(format!("{name}.glb"), mesh.to_vec()),
        preview: Upload::from_bytes(preview_name, b"preview".to_vec()),
    }
}

/// Every file below `models/` and `previews/`, relative to the content root.
fn files_on_disk(root: &ContentRoot) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for top in ["models", "previews"] {
        collect(root.root(), &root.root().join(top), &mut out);
    }
    out
}

fn collect(base: &Path, dir: &Path, out: &mut BTreeSet<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect(base, &path, out);
        } else {
            let rel = path.strip_prefix(base).expect("under base");
            out.insert(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

/// Every catalog path exists and every file is referenced by the catalog.
fn assert_consistent(mgr: &CatalogManager) {
    let root = mgr.content_root();
    let catalog = mgr.catalog().expect("catalog");
    let mut referenced = BTreeSet::new();
    for rec in &catalog.models {
        for rel in [&rec.model_path, &rec.image_path] {
            assert!(root.resolve(rel).expect("resolve").is_file(), "{rel} missing");
            referenced.insert(rel.clone());
        }
    }
    assert_eq!(files_on_disk(root), referenced);
}

#[test]
fn example_scenario_chair_then_lowercase_chair() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();

    let first = mgr
        .create_or_update(UploadRequest {
            name: "Chair".into(),
            mesh: Upload::from_bytes("chair.glb", b"mesh-1".to_vec()),
            preview: Upload::from_bytes("chair.png", b"png".to_vec()),
        })
        .expect("first upload");
    assert_eq!(first.name, "Chair");
    assert_eq!(first.model_path, "models/Chair/scene.glb");
    assert!(first.image_path.starts_with("previews/"));
    assert!(first.image_path.ends_with(".png"));

    let second = mgr
        .create_or_update(UploadRequest {
            name: "chair".into(),
            mesh: Upload::from_bytes("chair.glb", b"mesh-2".to_vec()),
            preview: Upload::from_bytes("chair2.jpg", b"jpg".to_vec()),
        })
        .expect("re-upload");
    assert!(second.image_path.ends_with(".jpg"));
    assert_eq!(second.model_path, "models/Chair/scene.glb");

    let catalog = mgr.catalog().expect("catalog");
    assert_eq!(catalog.models, vec![second.clone()]);
    assert!(!root.resolve(&first.image_path).unwrap().exists());
    assert_eq!(
        fs::read(root.resolve(&second.model_path).unwrap()).unwrap(),
        b"mesh-2"
    );
    assert_consistent(&mgr);
}

#[test]
fn same_name_any_casing_stays_unique() {
    let (_tmp, mgr) = manager();
    for name in ["Lamp", "LAMP", "lamp", "lAmP"] {
        mgr.create_or_update(upload(name, b"m", "l.webp")).expect("upload");
    }
    mgr.create_or_update(upload("Table", b"t", "t.png")).expect("upload");

    let catalog = mgr.catalog().unwrap();
    let lamps: Vec<_> = catalog
        .models
        .iter()
        .filter(|m| m.name.eq_ignore_ascii_case("lamp"))
        .collect();
    assert_eq!(lamps.len(), 1);
    assert_eq!(catalog.len(), 2);
    assert_consistent(&mgr);
}

#[test]
fn retry_with_identical_input_replaces_preview() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    let a = mgr.create_or_update(upload("foo", b"m", "p.png")).unwrap();
    let b = mgr.create_or_update(upload("foo", b"m", "p.png")).unwrap();

    assert_ne!(a.image_path, b.image_path);
    assert!(!root.resolve(&a.image_path).unwrap().exists());
    assert_eq!(fs::read(root.resolve(&b.model_path).unwrap()).unwrap(), b"m");
    assert_eq!(mgr.catalog().unwrap().models, vec![b]);
    assert_consistent(&mgr);
}

#[test]
fn validation_failures_leave_no_files() {
    let (_tmp, mgr) = manager();
    mgr.create_or_update(upload("Keep", b"m", "k.png")).unwrap();
    let before = files_on_disk(mgr.content_root());
    let catalog_before = mgr.catalog().unwrap();

    let bad = [
        upload("", b"m", "p.png"),
        upload("../escape", b"m", "p.png"),
        upload("Gif", b"m", "p.gif"),
        UploadRequest {
            name: "Obj".into(),
            mesh: Upload::from_bytes("obj.obj", b"m".to_vec()),
            preview: Upload::from_bytes("p.png", b"p".to_vec()),
        },
    ];
    for req in bad {
        let err = mgr.create_or_update(req).unwrap_err();
        assert!(matches!(err, ShelfError::Validation(_)), "{err}");
    }

    assert_eq!(files_on_disk(mgr.content_root()), before);
    assert_eq!(mgr.catalog().unwrap(), catalog_before);
}

#[test]
fn failed_mesh_write_removes_the_new_preview() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    // A plain file where the mesh directory should go makes the mesh write fail.
    fs::write(root.models_dir().join("Broken"), b"in the way").unwrap();

    let err = mgr
        .create_or_update(upload("Broken", b"m", "b.png"))
        .unwrap_err();
    assert!(matches!(err, ShelfError::Io(_)), "{err}");

    let previews: Vec<_> = fs::read_dir(root.previews_dir()).unwrap().collect();
    assert!(previews.is_empty());
    assert!(mgr.catalog().unwrap().is_empty());
}

#[test]
fn delete_removes_files_and_entry_then_reports_not_found() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    let rec = mgr.create_or_update(upload("Sofa", b"m", "s.jpeg")).unwrap();
    mgr.create_or_update(upload("Desk", b"d", "d.png")).unwrap();

    let deleted = mgr.delete(DeleteRequest::by_name("sofa")).unwrap();
    assert_eq!(deleted, rec);
    assert!(!root.mesh_dir("Sofa").exists());
    assert!(!root.resolve(&rec.image_path).unwrap().exists());
    assert!(mgr.catalog().unwrap().find_by_name("Sofa").is_none());
    assert_consistent(&mgr);

    let err = mgr.delete(DeleteRequest::by_name("Sofa")).unwrap_err();
    assert!(matches!(err, ShelfError::NotFound(_)), "{err}");
}

#[test]
fn delete_ignores_caller_supplied_paths() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    let victim = mgr.create_or_update(upload("Victim", b"v", "v.png")).unwrap();
    let target = mgr.create_or_update(upload("Target", b"t", "t.png")).unwrap();
    let outside = root.root().join("secret.txt");
    fs::write(&outside, b"keep").unwrap();

    let deleted = mgr
        .delete(DeleteRequest {
            name: "Target".into(),
            mesh_path: Some("../secret.txt".into()),
            image_path: Some(victim.image_path.clone()),
        })
        .unwrap();

    assert_eq!(deleted, target);
    assert!(outside.exists());
    assert!(root.resolve(&victim.image_path).unwrap().exists());
    assert!(!root.resolve(&target.image_path).unwrap().exists());
    assert_consistent(&mgr);
}

#[test]
fn delete_tolerates_files_already_gone() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    let rec = mgr.create_or_update(upload("Ghost", b"g", "g.png")).unwrap();
    fs::remove_dir_all(root.mesh_dir("Ghost")).unwrap();
    fs::remove_file(root.resolve(&rec.image_path).unwrap()).unwrap();

    assert_eq!(mgr.delete(DeleteRequest::by_name("Ghost")).unwrap(), rec);
    assert!(mgr.catalog().unwrap().is_empty());
}

#[test]
fn corrupt_catalog_is_fatal_and_untouched() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    fs::write(root.catalog_path(), "{ not json").unwrap();

    let err = mgr.create_or_update(upload("A", b"a", "a.png")).unwrap_err();
    assert!(matches!(err, ShelfError::CorruptCatalog { .. }), "{err}");
    assert!(files_on_disk(&root).is_empty());

    let err = mgr.delete(DeleteRequest::by_name("A")).unwrap_err();
    assert!(matches!(err, ShelfError::CorruptCatalog { .. }), "{err}");
    assert_eq!(fs::read_to_string(root.catalog_path()).unwrap(), "{ not json");
}

#[test]
fn failed_preview_write_changes_nothing() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    let chair = mgr.create_or_update(upload("Chair", b"mesh-1", "c.png")).unwrap();
    let catalog_before = mgr.catalog().unwrap();
    let models_before: BTreeSet<_> = files_on_disk(&root)
        .into_iter()
        .filter(|f| f.starts_with("models/"))
        .collect();

    // A plain file where `previews/` should be makes every preview write fail.
    fs::rename(root.previews_dir(), root.root().join("previews.bak")).unwrap();
    fs::write(root.previews_dir(), b"in the way").unwrap();

    for req in [upload("Table", b"t", "t.png"), upload("chair", b"mesh-2", "c2.png")] {
        let err = mgr.create_or_update(req).unwrap_err();
        assert!(matches!(err, ShelfError::Io(_)), "{err}");
    }

    assert_eq!(files_on_disk(&root), models_before);
    assert!(!root.mesh_dir("Table").exists());
    assert_eq!(
        fs::read(root.resolve(&chair.model_path).unwrap()).unwrap(),
        b"mesh-1"
    );
    assert_eq!(fs::read(root.previews_dir()).unwrap(), b"in the way");
    assert_eq!(mgr.catalog().unwrap(), catalog_before);
}

#[test]
fn failed_mesh_source_leaves_no_asset_dir() {
    let (tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    let err = mgr
        .create_or_update(UploadRequest {
            name: "Ghost".into(),
            mesh: Upload::from_path(tmp.path().join("missing.glb")),
            preview: Upload::from_bytes("g.png", b"g".to_vec()),
        })
        .unwrap_err();
    assert!(matches!(err, ShelfError::Io(_)), "{err}");

    assert!(!root.mesh_dir("Ghost").exists());
    assert!(files_on_disk(&root).is_empty());
    assert_eq!(fs::read_dir(root.models_dir()).unwrap().count(), 0);
    assert!(mgr.catalog().unwrap().is_empty());
}

#[test]
fn delete_with_unusable_preview_path_still_removes_the_entry() {
    let (_tmp, mgr) = manager();
    let root = mgr.content_root().clone();
    mgr.create_or_update(upload("Chair", b"c", "c.png")).unwrap();
    mgr.create_or_update(upload("Stool", b"s", "s.png")).unwrap();
    let desk = mgr.create_or_update(upload("Desk", b"d", "d.png")).unwrap();

    // Hand-edited catalog: one preview path escapes, the other names a mesh.
    let repo = FsCatalogRepo::new(root.catalog_path());
    let mut catalog = repo.load().unwrap();
    for rec in &mut catalog.models {
        match rec.name.as_str() {
            "Chair" => rec.image_path = "previews/../x.png".into(),
            "Stool" => rec.image_path = desk.model_path.clone(),
            _ => {}
        }
    }
    repo.save(&catalog).unwrap();

    for name in ["Chair", "Stool"] {
        let deleted = mgr.delete(DeleteRequest::by_name(name)).unwrap();
        assert_eq!(deleted.name, name);
        assert!(!root.mesh_dir(name).exists());
    }

    assert_eq!(
        fs::read(root.resolve(&desk.model_path).unwrap()).unwrap(),
        b"d"
    );
    let catalog = mgr.catalog().unwrap();
    assert_eq!(catalog.models, vec![desk]);
    let err = mgr.delete(DeleteRequest::by_name("Chair")).unwrap_err();
    assert!(matches!(err, ShelfError::NotFound(_)), "{err}");
}

/// Filesystem repo whose saves can be switched off.
struct FlakyRepo {
    inner: FsCatalogRepo,
    fail_saves: Arc<AtomicBool>,
}

impl CatalogRepo for FlakyRepo {
    fn load(&self) -> Result<Catalog> {
        self.inner.load()
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.save(catalog)
    }
}

fn flaky_manager() -> (tempfile::TempDir, CatalogManager, Arc<AtomicBool>) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = ContentRoot::new(tmp.path());
    root.ensure().unwrap();
    let fail = Arc::new(AtomicBool::new(false));
    let repo = FlakyRepo {
        inner: FsCatalogRepo::new(root.catalog_path()),
        fail_saves: fail.clone(),
    };
    (tmp, CatalogManager::with_repo(root, Box::new(repo)), fail)
}

#[test]
fn failed_save_on_upload_is_persistence_error_and_retry_heals() {
    let (_tmp, mgr, fail) = flaky_manager();
    let root = mgr.content_root().clone();
    let old = mgr.create_or_update(upload("Vase", b"v1", "v.png")).unwrap();

    fail.store(true, Ordering::SeqCst);
    let err = mgr.create_or_update(upload("Vase", b"v2", "v.webp")).unwrap_err();
    match &err {
        ShelfError::Persistence { name, .. } => assert_eq!(name, "Vase"),
        other => panic!("expected persistence error, got {other}"),
    }
    assert!(err.to_string().contains("retrying the operation is safe"));
    // Catalog still points at the old preview, which still exists.
    assert_eq!(mgr.catalog().unwrap().models, vec![old.clone()]);
    assert!(root.resolve(&old.image_path).unwrap().exists());

    fail.store(false, Ordering::SeqCst);
    let new = mgr.create_or_update(upload("Vase", b"v2", "v.webp")).unwrap();
    assert_eq!(mgr.catalog().unwrap().models, vec![new]);
    assert_consistent(&mgr);
}

#[test]
fn failed_save_on_delete_then_retry_reports_not_found() {
    let (_tmp, mgr, fail) = flaky_manager();
    mgr.create_or_update(upload("Rug", b"r", "r.png")).unwrap();

    fail.store(true, Ordering::SeqCst);
    let err = mgr.delete(DeleteRequest::by_name("Rug")).unwrap_err();
    assert!(matches!(err, ShelfError::Persistence { .. }), "{err}");
    assert!(mgr.catalog().unwrap().find_by_name("Rug").is_some());

    fail.store(false, Ordering::SeqCst);
    let rec = mgr.delete(DeleteRequest::by_name("Rug")).unwrap();
    assert_eq!(rec.name, "Rug");
    assert!(matches!(
        mgr.delete(DeleteRequest::by_name("Rug")),
        Err(ShelfError::NotFound(_))
    ));
    assert_consistent(&mgr);
}

#[test]
fn concurrent_uploads_do_not_lose_updates() {
    let (_tmp, mgr) = manager();
    let mgr = Arc::new(mgr);
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let mgr = Arc::clone(&mgr);
            std::thread::spawn(move || {
                for i in 0..5 {
                    let name = format!("asset-{t}-{i}");
                    mgr.create_or_update(upload(&name, name.as_bytes(), "p.png"))
                        .expect("upload");
                    // Everyone also hammers one shared name.
                    mgr.create_or_update(upload("Shared", b"s", "s.jpg"))
                        .expect("shared upload");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread");
    }

    let catalog = mgr.catalog().unwrap();
    assert_eq!(catalog.len(), 8 * 5 + 1);
    assert_consistent(&mgr);
}

#[test]
fn file_sources_are_copied_not_moved() {
    let (tmp, mgr) = manager();
    let incoming = tmp.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    let mesh: PathBuf = incoming.join("tree.GLB");
    let preview: PathBuf = incoming.join("tree.JPG");
    fs::write(&mesh, b"tree mesh").unwrap();
    fs::write(&preview, b"tree preview").unwrap();

    let rec = mgr
        .create_or_update(UploadRequest {
            name: "Tree".into(),
            mesh: Upload::from_path(&mesh),
            preview: Upload::from_path(&preview),
        })
        .unwrap();
    assert!(rec.image_path.ends_with(".jpg"));
    assert!(mesh.exists() && preview.exists());
    assert_consistent(&mgr);
}
