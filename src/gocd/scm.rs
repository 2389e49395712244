use super::types::{Material, MaterialRevision, Modification, PipelineInstance};
use crate::octane::types::{ScmCommit, ScmData, ScmRepository};

const PIPELINE_MATERIAL: &str = "Pipeline";

/// Pulls commit information out of a resolved pipeline run.
pub trait ScmExtractor: Send + Sync {
    fn extract(&self, instance: &PipelineInstance) -> Option<ScmData>;
}

/// Reads SCM data from the run's build cause.
///
/// Only the first changed source-control material is reported; upstream
/// pipeline materials are not commits and are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialRevisionExtractor;

impl ScmExtractor for MaterialRevisionExtractor {
    fn extract(&self, instance: &PipelineInstance) -> Option<ScmData> {
        let revision = instance
            .build_cause
            .as_ref()?
            .material_revisions
            .iter()
            .find(|rev| rev.changed && rev.material.kind != PIPELINE_MATERIAL)?;

        Some(to_scm_data(revision))
    }
}

fn to_scm_data(revision: &MaterialRevision) -> ScmData {
    ScmData {
        repository: repository_of(&revision.material),
        built_rev_id: revision.modifications.first().map(|m| m.revision.clone()),
        commits: revision.modifications.iter().map(to_commit).collect(),
    }
}

fn repository_of(material: &Material) -> ScmRepository {
    let description = material.description.as_deref().unwrap_or_default();
    let url = description_field(description, "URL")
        .or(material.name.as_deref())
        .unwrap_or_default()
        .to_string();

    ScmRepository {
        kind: repository_kind(&material.kind),
        url,
        branch: description_field(description, "Branch").map(ToString::to_string),
    }
}

fn repository_kind(kind: &str) -> String {
    match kind {
        "Subversion" => "svn".to_string(),
        other => other.to_lowercase(),
    }
}

/// GoCD describes materials as `URL: https://host/repo, Branch: main`.
fn description_field<'a>(description: &'a str, key: &str) -> Option<&'a str> {
    description.split(", ").find_map(|part| {
        let (k, v) = part.split_once(':')?;
        (k.trim() == key).then(|| v.trim()).filter(|v| !v.is_empty())
    })
}

fn to_commit(modification: &Modification) -> ScmCommit {
    let (user, embedded_email) = modification
        .user_name
        .as_deref()
        .map(split_user)
        .unwrap_or((None, None));

    ScmCommit {
        time: modification.modified_time,
        user,
        user_email: modification.email_address.clone().or(embedded_email),
        rev_id: modification.revision.clone(),
        comment: modification.comment.clone(),
    }
}

/// Splits `Jane Doe <jane@example.com>` into name and address.
fn split_user(raw: &str) -> (Option<String>, Option<String>) {
    let raw = raw.trim();
    match (raw.find('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = raw[..open].trim();
            let email = raw[open + 1..close].trim();
            (
                (!name.is_empty()).then(|| name.to_string()),
                (!email.is_empty()).then(|| email.to_string()),
            )
        }
        _ if raw.is_empty() => (None, None),
        _ => (Some(raw.to_string()), None),
    }
}
