//!
//! formworks storage module
//! ------------------------
//! File-backed store for form definitions using a flat directory layout:
//! `<root>/forms/<id>/` holds `form.xml` (the raw definition bytes, written
//! once at create and never rewritten) and `meta.json` (identity, hash,
//! lifecycle fields). The full set of definitions, soft-deleted history rows
//! included, is kept in memory and flushed per record on every mutation.
//!
//! Key responsibilities:
//! - Create with the version-registry uniqueness pre-check evaluated under
//!   the same lock hold that persists the accepted definition.
//! - Mutation of the two externally mutable fields (name, state) only.
//! - Soft deletion via `deleted_at`, preserving rows for history.
//! - Reload from disk at startup reproducing identical definitions.
//!
//! The public API centers around the `Store` type, which is usually wrapped
//! in a thread-safe `SharedStore` (`Arc<Mutex<Store>>`) elsewhere in the
//! codebase.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::definition::ParsedDefinition;
use crate::error::{AppError, AppResult};
use crate::form::{FormDefinition, FormState};
use crate::registry::{self, Acceptance};

/// Everything persisted about a definition except the raw bytes, which live
/// beside it in `form.xml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMeta {
    id: i64,
    xml_form_id: String,
    version: String,
    name: String,
    hash: String,
    state: FormState,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

/// Core on-disk storage handle for a formworks definition tree.
pub struct Store {
    /// Root folder; definitions live under `<root>/forms/<id>/`.
    root: PathBuf,
    forms: Vec<FormDefinition>,
    next_id: i64,
}

/// Thread-safe wrapper; the create path holds the lock across the uniqueness
/// decision and the persist, so concurrent creations of the same pair cannot
/// both succeed.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(SharedStore(Arc::new(Mutex::new(Store::new(root)?))))
    }
}

impl Store {
    /// Open (or initialize) a store rooted at the given path, loading every
    /// persisted definition back into memory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let forms_dir = root.join("forms");
        fs::create_dir_all(&forms_dir)
            .with_context(|| format!("Failed to create store root: {}", forms_dir.display()))?;

        let mut forms: Vec<FormDefinition> = Vec::new();
        for entry in fs::read_dir(&forms_dir)? {
            let dir = entry?.path();
            if !dir.is_dir() {
                continue;
            }
            let meta_path = dir.join("meta.json");
            let xml_path = dir.join("form.xml");
            // meta.json is written last on create, so a record dir without
            // one is the residue of an interrupted create: nothing ever
            // observed it, and it must not keep the rest of the store from
            // loading.
            if !meta_path.exists() {
                warn!(
                    target: "formworks::storage",
                    "skipping incomplete definition record at {}",
                    dir.display()
                );
                continue;
            }
            let meta: StoredMeta = serde_json::from_slice(
                &fs::read(&meta_path)
                    .with_context(|| format!("Failed to read {}", meta_path.display()))?,
            )
            .with_context(|| format!("Failed to decode {}", meta_path.display()))?;
            let xml = fs::read_to_string(&xml_path)
                .with_context(|| format!("Failed to read {}", xml_path.display()))?;
            forms.push(FormDefinition {
                id: meta.id,
                xml_form_id: meta.xml_form_id,
                version: meta.version,
                name: meta.name,
                hash: meta.hash,
                state: meta.state,
                created_at: meta.created_at,
                updated_at: meta.updated_at,
                deleted_at: meta.deleted_at,
                xml,
            });
        }
        forms.sort_by_key(|f| f.id);
        let next_id = forms.last().map(|f| f.id + 1).unwrap_or(1);
        debug!(target: "formworks::storage", "store opened: {} definitions loaded", forms.len());
        Ok(Self { root, forms, next_id })
    }

    pub fn root_path(&self) -> &PathBuf { &self.root }

    fn form_dir(&self, id: i64) -> PathBuf {
        self.root.join("forms").join(id.to_string())
    }

    fn flush_meta(&self, form: &FormDefinition) -> AppResult<()> {
        let meta = StoredMeta {
            id: form.id,
            xml_form_id: form.xml_form_id.clone(),
            version: form.version.clone(),
            name: form.name.clone(),
            hash: form.hash.clone(),
            state: form.state,
            created_at: form.created_at,
            updated_at: form.updated_at,
            deleted_at: form.deleted_at,
        };
        let dir = self.form_dir(form.id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("meta.json"), serde_json::to_vec_pretty(&meta).map_err(|e| AppError::internal(e.to_string()))?)?;
        Ok(())
    }

    /// Every definition, soft-deleted rows included, in creation order.
    pub fn all(&self) -> &[FormDefinition] {
        &self.forms
    }

    /// Every definition sharing the form id, soft-deleted rows included.
    pub fn find_by_form_id(&self, xml_form_id: &str) -> Vec<&FormDefinition> {
        self.forms.iter().filter(|f| f.xml_form_id == xml_form_id).collect()
    }

    /// Most recently created non-deleted definition with the given form id.
    pub fn get_active(&self, xml_form_id: &str) -> Option<&FormDefinition> {
        self.forms
            .iter()
            .rev()
            .find(|f| f.xml_form_id == xml_form_id && !f.is_deleted())
    }

    /// Definitions visible to listings and the formList, in creation order.
    pub fn listable(&self) -> Vec<FormDefinition> {
        self.forms.iter().filter(|f| f.is_listable()).cloned().collect()
    }

    /// Create a definition from already-parsed identity fields, enforcing the
    /// version-registry decision before anything is persisted. The caller
    /// holds the store lock for the whole call, which makes the check and the
    /// persist atomic with respect to other creations.
    pub fn create(&mut self, parsed: ParsedDefinition, hash: String, xml: String) -> AppResult<FormDefinition> {
        let history = self.find_by_form_id(&parsed.xml_form_id);
        match registry::check(&parsed.xml_form_id, &parsed.version, &history) {
            Acceptance::Accept => {}
            Acceptance::Reject { fields, values } => {
                return Err(AppError::duplicate(fields, values));
            }
        }

        let form = FormDefinition {
            id: self.next_id,
            xml_form_id: parsed.xml_form_id,
            version: parsed.version,
            name: parsed.name,
            hash,
            state: FormState::Open,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
            xml,
        };
        let dir = self.form_dir(form.id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("form.xml"), form.xml.as_bytes())?;
        self.flush_meta(&form)?;
        self.next_id += 1;
        debug!(
            target: "formworks::storage",
            "created definition id={} xmlFormId='{}' version='{}'",
            form.id, form.xml_form_id, form.version
        );
        self.forms.push(form.clone());
        Ok(form)
    }

    /// Update the externally mutable fields of the active definition. All
    /// other fields are write-protected after creation.
    pub fn update_mutable_fields(
        &mut self,
        xml_form_id: &str,
        name: Option<String>,
        state: Option<FormState>,
    ) -> AppResult<FormDefinition> {
        let idx = self
            .forms
            .iter()
            .rposition(|f| f.xml_form_id == xml_form_id && !f.is_deleted())
            .ok_or_else(|| AppError::not_found(format!("form {}", xml_form_id)))?;
        {
            let form = &mut self.forms[idx];
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(state) = state {
                form.state = state;
            }
            form.updated_at = Some(Utc::now());
        }
        let snapshot = self.forms[idx].clone();
        self.flush_meta(&snapshot)?;
        Ok(snapshot)
    }

    /// Soft-delete the active definition: it disappears from uniqueness
    /// consideration (blank versions excepted) and from every listing, but
    /// the row and its files stay for history.
    pub fn mark_deleted(&mut self, xml_form_id: &str) -> AppResult<()> {
        let idx = self
            .forms
            .iter()
            .rposition(|f| f.xml_form_id == xml_form_id && !f.is_deleted())
            .ok_or_else(|| AppError::not_found(format!("form {}", xml_form_id)))?;
        self.forms[idx].deleted_at = Some(Utc::now());
        let snapshot = self.forms[idx].clone();
        self.flush_meta(&snapshot)?;
        debug!(target: "formworks::storage", "soft-deleted definition id={} xmlFormId='{}'", snapshot.id, xml_form_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(id: &str, version: &str) -> ParsedDefinition {
        ParsedDefinition { xml_form_id: id.into(), version: version.into(), name: id.into() }
    }

    #[test]
    fn create_then_reload_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut store = Store::new(tmp.path()).unwrap();
            store.create(parsed("simple", "1.0"), "abc".into(), "<x/>".into()).unwrap();
        }
        let store = Store::new(tmp.path()).unwrap();
        let found = store.get_active("simple").unwrap();
        assert_eq!(found.version, "1.0");
        assert_eq!(found.hash, "abc");
        assert_eq!(found.xml, "<x/>");
    }

    #[test]
    fn duplicate_pair_is_rejected_before_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        store.create(parsed("simple", "1.0"), "a".into(), "<x/>".into()).unwrap();
        let err = store.create(parsed("simple", "1.0"), "b".into(), "<y/>".into()).unwrap_err();
        assert_eq!(
            err,
            AppError::duplicate(vec!["xmlFormId".into()], vec!["simple".into()])
        );
        // Only the first definition made it to disk.
        assert_eq!(store.find_by_form_id("simple").len(), 1);
    }

    #[test]
    fn deleted_rows_survive_reload_and_stay_hidden() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut store = Store::new(tmp.path()).unwrap();
            store.create(parsed("simple", "1.0"), "a".into(), "<x/>".into()).unwrap();
            store.mark_deleted("simple").unwrap();
        }
        let store = Store::new(tmp.path()).unwrap();
        assert!(store.get_active("simple").is_none());
        assert_eq!(store.find_by_form_id("simple").len(), 1);
        assert!(store.listable().is_empty());
    }

    #[test]
    fn interrupted_create_residue_does_not_block_reload() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut store = Store::new(tmp.path()).unwrap();
            store.create(parsed("simple", "1.0"), "a".into(), "<x/>".into()).unwrap();
        }
        // A crash between the form.xml write and the meta.json write leaves
        // a record dir holding only form.xml. The store must load past it.
        let orphan = tmp.path().join("forms").join("2");
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join("form.xml"), b"<y/>").unwrap();

        let mut store = Store::new(tmp.path()).unwrap();
        assert_eq!(store.all().len(), 1);
        assert!(store.get_active("simple").is_some());
        // The slot is reusable; a fresh create completes the record.
        let form = store.create(parsed("other", "1.0"), "b".into(), "<z/>".into()).unwrap();
        assert_eq!(form.id, 2);
        let reloaded = Store::new(tmp.path()).unwrap();
        assert_eq!(reloaded.all().len(), 2);
        assert_eq!(reloaded.get_active("other").unwrap().xml, "<z/>");
    }

    #[test]
    fn update_touches_only_mutable_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        let created = store.create(parsed("simple", "1.0"), "a".into(), "<x/>".into()).unwrap();
        let updated = store
            .update_mutable_fields("simple", Some("a fancy name".into()), Some(FormState::Draft))
            .unwrap();
        assert_eq!(updated.name, "a fancy name");
        assert_eq!(updated.state, FormState::Draft);
        assert_eq!(updated.hash, created.hash);
        assert_eq!(updated.xml, created.xml);
        assert!(updated.updated_at.is_some());
    }

    #[test]
    fn missing_form_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        let err = store.mark_deleted("ghost").unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
