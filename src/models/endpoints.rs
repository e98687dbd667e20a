//! Resource paths, relative to the base URL.

use crate::jobs::JobType;

pub const LOGIN: &str = "login";
pub const REGISTER: &str = "register";
pub const CURRENT_USER: &str = "users/me";
pub const NOTEBOOKS: &str = "notebooks";

pub fn notebook(notebook_id: &str) -> String {
    format!("notebooks/{}", notebook_id)
}

pub fn sources(notebook_id: &str) -> String {
    format!("notebooks/{}/sources", notebook_id)
}

pub fn source(notebook_id: &str, source_id: &str) -> String {
    format!("notebooks/{}/sources/{}", notebook_id, source_id)
}

pub fn source_upload(notebook_id: &str) -> String {
    format!("notebooks/{}/sources/upload", notebook_id)
}

pub fn notes(notebook_id: &str) -> String {
    format!("notebooks/{}/notes", notebook_id)
}

pub fn summary(notebook_id: &str) -> String {
    format!("notebooks/{}/summary", notebook_id)
}

pub fn conversations(notebook_id: &str) -> String {
    format!("notebooks/{}/conversations", notebook_id)
}

pub fn generate(notebook_id: &str) -> String {
    format!("notebooks/{}/tools/generate", notebook_id)
}

pub fn job(notebook_id: &str, job_id: &str) -> String {
    format!("notebooks/{}/tools/jobs/{}", notebook_id, job_id)
}

pub fn latest_job(notebook_id: &str, job_type: JobType) -> String {
    format!(
        "notebooks/{}/tools/jobs/latest/{}",
        notebook_id,
        job_type.as_str()
    )
}
