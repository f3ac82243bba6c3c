use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{MAX_ATTACHMENT_CONTEXT_CHARS, SIGNED_URL_TTL_SECS};
use crate::models::attachment::Attachment;
use crate::pipeline::extract::extract_pdf_text;
use crate::pipeline::normalize::{clean_and_truncate, normalize_extracted_text};
use crate::pipeline::vision::VisionSummarizer;
use crate::storage::ObjectStore;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "svg"];

/// One file as received from the multipart request.
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Per-file pipeline output: the durable attachment record plus the display
/// (truncated) and full extraction texts when an extractor produced any.
#[derive(Debug)]
pub struct ProcessedAttachment {
    pub attachment: Attachment,
    pub display_text: Option<String>,
    pub full_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Image,
    Other,
}

/// Classifies by declared content type first, lowercased filename extension
/// second. PDF wins when both PDF and image checks match.
pub fn classify(content_type: Option<&str>, file_name: &str) -> AttachmentKind {
    let extension = file_extension(file_name);

    let is_pdf = content_type == Some("application/pdf") || extension == "pdf";
    if is_pdf {
        return AttachmentKind::Pdf;
    }

    let is_image = content_type
        .map(|declared| declared.starts_with("image/"))
        .unwrap_or(false)
        || IMAGE_EXTENSIONS.contains(&extension.as_str());
    if is_image {
        AttachmentKind::Image
    } else {
        AttachmentKind::Other
    }
}

fn file_extension(file_name: &str) -> String {
    file_name
        .to_lowercase()
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Runs the per-file pipeline for every upload: classify, extract or
/// summarize, store, sign. Files are processed concurrently, one task each;
/// results are re-sequenced into submission order before returning. Any
/// storage failure fails the whole batch, while extraction failures degrade
/// to an attachment without text.
pub async fn process_attachments(
    store: &Arc<dyn ObjectStore>,
    summarizer: &Arc<VisionSummarizer>,
    user_id: &str,
    chat_id: Uuid,
    files: Vec<UploadedFile>,
) -> Result<Vec<ProcessedAttachment>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let mut tasks = Vec::with_capacity(files.len());
    for (index, file) in files.into_iter().enumerate() {
        let store = Arc::clone(store);
        let summarizer = Arc::clone(summarizer);
        let user_id = user_id.to_string();
        tasks.push(tokio::spawn(async move {
            let result = process_one(store.as_ref(), &summarizer, &user_id, chat_id, file).await;
            (index, result)
        }));
    }

    let mut processed = Vec::with_capacity(tasks.len());
    for joined in join_all(tasks).await {
        let (index, result) = joined.context("attachment task panicked")?;
        processed.push((index, result?));
    }

    // Tasks complete in arbitrary order; hand results back in the order the
    // files were submitted.
    processed.sort_by_key(|(index, _)| *index);
    Ok(processed.into_iter().map(|(_, item)| item).collect())
}

async fn process_one(
    store: &dyn ObjectStore,
    summarizer: &VisionSummarizer,
    user_id: &str,
    chat_id: Uuid,
    file: UploadedFile,
) -> Result<ProcessedAttachment> {
    let extension = {
        let extension = file_extension(&file.name);
        if extension.is_empty() {
            "bin".to_string()
        } else {
            extension
        }
    };
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    let object_path = format!(
        "{user_id}/{chat_id}/{}-{suffix}.{extension}",
        Utc::now().timestamp_millis()
    );

    let mut display_text = None;
    let mut full_text = None;
    let mut summary = None;

    match classify(file.content_type.as_deref(), &file.name) {
        AttachmentKind::Pdf => match extract_pdf_text(file.bytes.clone()).await {
            Ok(text) => {
                full_text = Some(normalize_extracted_text(&text));
                display_text = Some(clean_and_truncate(&text, MAX_ATTACHMENT_CONTEXT_CHARS));
                summary = display_text.clone();
                info!(
                    file_name = %file.name,
                    attachment_path = %object_path,
                    "PDF text extracted"
                );
            }
            Err(e) => {
                error!("Failed to parse PDF {}: {e:#}", file.name);
            }
        },
        AttachmentKind::Image => {
            let mime_type = file
                .content_type
                .clone()
                .unwrap_or_else(|| format!("image/{extension}"));
            if let Some(description) = summarizer.describe_image(&file.bytes, &mime_type).await {
                display_text = Some(description.clone());
                full_text = Some(description.clone());
                summary = Some(description);
                info!(
                    file_name = %file.name,
                    attachment_path = %object_path,
                    "Image description extracted"
                );
            }
        }
        AttachmentKind::Other => {}
    }

    let content_type = file.content_type.clone().unwrap_or_else(|| {
        mime_guess::from_path(&file.name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string()
    });
    let size = file.bytes.len() as i64;

    // Unlike extraction, a failed upload means the attachment cannot be
    // referenced at all, so it propagates.
    store
        .upload(&object_path, file.bytes, &content_type)
        .await
        .with_context(|| format!("failed to upload attachment {}", file.name))?;

    let url = match store.create_signed_url(&object_path, SIGNED_URL_TTL_SECS).await {
        Ok(url) => url,
        Err(e) => {
            warn!("Failed to generate signed URL for {object_path}: {e:#}");
            store.public_url(&object_path)
        }
    };

    Ok(ProcessedAttachment {
        attachment: Attachment {
            id: Uuid::new_v4(),
            name: file.name,
            mime_type: content_type,
            size,
            storage_path: object_path,
            url,
            summary,
        },
        display_text,
        full_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn uppercase_pdf_extension_classifies_as_pdf() {
        assert_eq!(classify(None, "statement.PDF"), AttachmentKind::Pdf);
    }

    #[test]
    fn content_type_alone_classifies_as_image() {
        assert_eq!(classify(Some("image/png"), "noextension"), AttachmentKind::Image);
    }

    #[test]
    fn pdf_content_type_beats_image_extension() {
        assert_eq!(
            classify(Some("application/pdf"), "scan.png"),
            AttachmentKind::Pdf
        );
    }

    #[test]
    fn spreadsheets_classify_as_other() {
        assert_eq!(
            classify(
                Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
                "budget.xlsx"
            ),
            AttachmentKind::Other
        );
    }

    #[test]
    fn image_extension_fallback_is_case_insensitive() {
        assert_eq!(classify(None, "chart.WEBP"), AttachmentKind::Image);
    }

    struct StubStore {
        upload_delays: HashMap<String, u64>,
        fail_upload: bool,
        fail_signing: bool,
        uploads: Mutex<Vec<String>>,
    }

    impl StubStore {
        fn ok() -> Self {
            StubStore {
                upload_delays: HashMap::new(),
                fail_upload: false,
                fail_signing: false,
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for StubStore {
        async fn upload(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<()> {
            let file_part = path.rsplit('/').next().unwrap_or_default();
            let delay = self
                .upload_delays
                .iter()
                .find(|(name, _)| file_part.ends_with(name.as_str()))
                .map(|(_, millis)| *millis)
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.fail_upload {
                return Err(anyhow!("bucket unavailable"));
            }
            self.uploads.lock().unwrap().push(path.to_string());
            Ok(())
        }

        async fn create_signed_url(&self, path: &str, _ttl_secs: u64) -> Result<String> {
            if self.fail_signing {
                return Err(anyhow!("signing backend down"));
            }
            Ok(format!("signed://{path}"))
        }

        fn public_url(&self, path: &str) -> String {
            format!("public://{path}")
        }
    }

    fn no_vision() -> Arc<VisionSummarizer> {
        Arc::new(VisionSummarizer::with_api(None, Vec::new()))
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: b"hello".to_vec(),
        }
    }

    #[tokio::test]
    async fn results_preserve_submission_order_despite_varied_latency() {
        // Extensions distinguish the files inside the randomized paths.
        let mut delays = HashMap::new();
        delays.insert(".aaa".to_string(), 40u64);
        delays.insert(".bbb".to_string(), 20u64);
        delays.insert(".ccc".to_string(), 5u64);
        let store: Arc<dyn ObjectStore> = Arc::new(StubStore {
            upload_delays: delays,
            ..StubStore::ok()
        });

        let results = process_attachments(
            &store,
            &no_vision(),
            "user-1",
            Uuid::new_v4(),
            vec![upload("first.aaa"), upload("second.bbb"), upload("third.ccc")],
        )
        .await
        .expect("pipeline");

        let names: Vec<&str> = results
            .iter()
            .map(|item| item.attachment.name.as_str())
            .collect();
        assert_eq!(names, vec!["first.aaa", "second.bbb", "third.ccc"]);
    }

    #[tokio::test]
    async fn upload_failure_is_fatal_for_the_batch() {
        let store: Arc<dyn ObjectStore> = Arc::new(StubStore {
            fail_upload: true,
            ..StubStore::ok()
        });

        let result = process_attachments(
            &store,
            &no_vision(),
            "user-1",
            Uuid::new_v4(),
            vec![upload("doc.txt")],
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn signing_failure_falls_back_to_public_url() {
        let store: Arc<dyn ObjectStore> = Arc::new(StubStore {
            fail_signing: true,
            ..StubStore::ok()
        });

        let results = process_attachments(
            &store,
            &no_vision(),
            "user-1",
            Uuid::new_v4(),
            vec![upload("doc.txt")],
        )
        .await
        .expect("pipeline");

        assert!(results[0].attachment.url.starts_with("public://"));
    }

    #[tokio::test]
    async fn unparseable_pdf_degrades_to_no_text() {
        let store: Arc<dyn ObjectStore> = Arc::new(StubStore::ok());

        let results = process_attachments(
            &store,
            &no_vision(),
            "user-1",
            Uuid::new_v4(),
            vec![UploadedFile {
                name: "broken.pdf".to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: b"not a pdf at all".to_vec(),
            }],
        )
        .await
        .expect("pipeline");

        assert!(results[0].display_text.is_none());
        assert!(results[0].full_text.is_none());
        assert!(results[0].attachment.summary.is_none());
        assert!(results[0].attachment.url.starts_with("signed://"));
    }

    #[tokio::test]
    async fn non_extractable_files_carry_no_text_but_still_upload() {
        let store = Arc::new(StubStore::ok());
        let store_dyn: Arc<dyn ObjectStore> = store.clone();

        let results = process_attachments(
            &store_dyn,
            &no_vision(),
            "user-1",
            Uuid::new_v4(),
            vec![upload("notes.txt")],
        )
        .await
        .expect("pipeline");

        assert!(results[0].display_text.is_none());
        assert_eq!(results[0].attachment.mime_type, "text/plain");
        assert_eq!(store.uploads.lock().unwrap().len(), 1);
    }
}
