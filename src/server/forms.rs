//!
//! Form service operations
//! -----------------------
//! The operations behind the HTTP handlers, usable directly by tests. Each
//! one takes the `SharedStore` and performs the whole unit of work: the
//! ingest path runs parse, hash, and the registry-checked create; the read
//! paths derive schema and protocol output on demand from the stored raw
//! bytes.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::definition;
use crate::digest;
use crate::error::{AppError, AppResult};
use crate::form::{FormDefinition, FormState};
use crate::openrosa;
use crate::schema;
use crate::storage::SharedStore;

/// Submission aggregation collaborator for extended listings. The real
/// implementation belongs to the submission store; the engine only consumes
/// the two numbers.
pub trait SubmissionStats: Send + Sync {
    fn submission_count(&self, xml_form_id: &str) -> i64;
    fn last_submission(&self, xml_form_id: &str) -> Option<chrono::DateTime<chrono::Utc>>;
}

/// Stats source used when no submission store is wired in.
pub struct NoSubmissions;

impl SubmissionStats for NoSubmissions {
    fn submission_count(&self, _xml_form_id: &str) -> i64 { 0 }
    fn last_submission(&self, _xml_form_id: &str) -> Option<chrono::DateTime<chrono::Utc>> { None }
}

/// PATCH body: only these two fields are externally mutable. Anything else a
/// caller sends is ignored rather than rejected.
#[derive(Debug, Default, Deserialize)]
pub struct FormPatch {
    pub name: Option<String>,
    pub state: Option<String>,
}

/// Ingest a raw definition: content-type gate, parse, hash, registry-checked
/// create. The store lock is held across the uniqueness decision and the
/// persist.
pub fn create_form(
    store: &SharedStore,
    body: &[u8],
    content_type: Option<&str>,
) -> AppResult<FormDefinition> {
    definition::check_content_type(content_type)?;
    let xml = std::str::from_utf8(body).map_err(|_| AppError::malformed(body.len()))?;
    let parsed = definition::parse(xml)?;
    let hash = digest::content_hash(body);

    let mut guard = store.0.lock();
    let form = guard.create(parsed, hash, xml.to_string())?;
    info!(
        target: "formworks::forms",
        "ingested form xmlFormId='{}' version='{}' hash={}",
        form.xml_form_id, form.version, form.hash
    );
    Ok(form)
}

/// Listable forms in creation order.
pub fn list_forms(store: &SharedStore) -> Vec<FormDefinition> {
    store.0.lock().listable()
}

/// Listable forms augmented with submission metadata from the collaborator.
pub fn list_forms_extended(store: &SharedStore, stats: &dyn SubmissionStats) -> Vec<Value> {
    list_forms(store).into_iter().map(|f| extend(f, stats)).collect()
}

fn extend(form: FormDefinition, stats: &dyn SubmissionStats) -> Value {
    let count = stats.submission_count(&form.xml_form_id);
    let last = stats.last_submission(&form.xml_form_id);
    let mut value = serde_json::to_value(&form).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("submissions".into(), json!(count));
        map.insert("lastSubmission".into(), json!(last));
    }
    value
}

/// Active (non-deleted) definition by form id.
pub fn get_form(store: &SharedStore, xml_form_id: &str) -> AppResult<FormDefinition> {
    store
        .0
        .lock()
        .get_active(xml_form_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("form {}", xml_form_id)))
}

/// Active definition augmented with submission metadata.
pub fn get_form_extended(
    store: &SharedStore,
    xml_form_id: &str,
    stats: &dyn SubmissionStats,
) -> AppResult<Value> {
    Ok(extend(get_form(store, xml_form_id)?, stats))
}

/// Raw definition bytes, verbatim as uploaded.
pub fn form_xml(store: &SharedStore, xml_form_id: &str) -> AppResult<String> {
    Ok(get_form(store, xml_form_id)?.xml)
}

/// Schema JSON for a stored form, nested or flattened. Derived on demand
/// from the raw bytes; never persisted.
pub fn form_schema(store: &SharedStore, xml_form_id: &str, flatten: bool) -> AppResult<Value> {
    let form = get_form(store, xml_form_id)?;
    let root = schema::extract(&form.xml)?;
    Ok(if flatten { schema::render_flattened(&root) } else { schema::render_nested(&root) })
}

/// Apply a PATCH to the mutable fields. The state value is validated against
/// the enumerated set before anything is written.
pub fn update_form(
    store: &SharedStore,
    xml_form_id: &str,
    patch: FormPatch,
) -> AppResult<FormDefinition> {
    let state = match patch.state.as_deref() {
        Some(value) => Some(FormState::parse(value)?),
        None => None,
    };
    store.0.lock().update_mutable_fields(xml_form_id, patch.name, state)
}

/// Soft-delete the active definition.
pub fn delete_form(store: &SharedStore, xml_form_id: &str) -> AppResult<()> {
    store.0.lock().mark_deleted(xml_form_id)
}

/// OpenRosa formList document over the currently listable forms.
pub fn openrosa_form_list(store: &SharedStore, base_url: &str) -> String {
    let forms = store.0.lock().listable();
    openrosa::render_form_list(&forms, base_url)
}
