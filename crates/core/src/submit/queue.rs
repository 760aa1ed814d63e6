use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{SubmitError, SubmittedTask};
use crate::api::ResponseBody;

/// Submitted tasks recovered from one persisted response.
#[derive(Debug, Clone)]
pub struct QueuedSubmission {
    pub path: PathBuf,
    pub tasks: Vec<SubmittedTask>,
}

/// Read every persisted submission response in `queue_dir`, sorted by name.
///
/// Unreadable files are skipped with a warning; tasks without an id, URL,
/// or tag cannot be fetched and are dropped.
pub async fn load_queued_submissions(queue_dir: &Path) -> Result<Vec<QueuedSubmission>, SubmitError> {
    let mut entries = match tokio::fs::read_dir(queue_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(SubmitError::Queue {
                path: queue_dir.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    let mut paths = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut submissions = Vec::new();
    for path in paths {
        match read_submission(&path).await {
            Ok(submission) if submission.tasks.is_empty() => {
                warn!(path = %path.display(), "No valid task ids in queued submission");
            }
            Ok(submission) => submissions.push(submission),
            Err(e) => warn!("{}", e),
        }
    }

    info!(files = submissions.len(), "Loaded queued submissions");
    Ok(submissions)
}

async fn read_submission(path: &Path) -> Result<QueuedSubmission, SubmitError> {
    let queue_err = |message: String| SubmitError::Queue {
        path: path.to_path_buf(),
        message,
    };
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| queue_err(e.to_string()))?;
    let body: ResponseBody =
        serde_json::from_slice(&bytes).map_err(|e| queue_err(e.to_string()))?;

    let tasks = body
        .tasks
        .iter()
        .filter(|t| !t.id.is_empty() && !t.is_rejected())
        .filter_map(|t| {
            let tag = t.tag()?;
            let url = t.data.target_url()?;
            Some(SubmittedTask {
                id: t.id.clone(),
                url: url.to_string(),
                tag: tag.to_string(),
            })
        })
        .collect();

    Ok(QueuedSubmission {
        path: path.to_path_buf(),
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rebuilds_tasks_from_persisted_responses() {
        let dir = TempDir::new().unwrap();
        let body = json!({
            "status_code": 20000,
            "tasks": [
                {"id": "t1", "status_code": 20100, "data": {"start_url": "https://a.com", "tag": "A/organic/type-organic_rg1_ra1_a.md"}},
                {"id": "t2", "status_code": 20100, "data": {"start_url": "https://b.com"}},
                {"id": "", "status_code": 20100, "data": {"start_url": "https://c.com", "tag": "C/organic/x.md"}},
                {"id": "t4", "status_code": 40501, "data": {"start_url": "https://d.com", "tag": "D/organic/x.md"}}
            ]
        });
        std::fs::write(dir.path().join("b_2.json"), body.to_string()).unwrap();
        std::fs::write(dir.path().join("a_1.json"), body.to_string()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("c_3.json"), "{broken").unwrap();

        let submissions = load_queued_submissions(dir.path()).await.unwrap();
        assert_eq!(submissions.len(), 2);
        assert!(submissions[0].path.ends_with("a_1.json"));
        assert_eq!(
            submissions[0].tasks,
            vec![SubmittedTask {
                id: "t1".to_string(),
                url: "https://a.com".to_string(),
                tag: "A/organic/type-organic_rg1_ra1_a.md".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_queue_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_queued_submissions(&dir.path().join("none"))
            .await
            .unwrap()
            .is_empty());
    }
}
