use anyhow::{anyhow, Result};

/// Runs the PDF parser over raw bytes. Parsing is CPU-bound, so it happens
/// on the blocking pool. An error or an empty result is reported to the
/// caller, who degrades to "no text available" rather than failing the
/// request.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| anyhow!("PDF parse task failed: {e}"))?
        .map_err(|e| anyhow!("PDF parse error: {e}"))?;

    if text.trim().is_empty() {
        return Err(anyhow!("PDF contained no extractable text"));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_bytes_fail_gracefully() {
        let result = extract_pdf_text(b"definitely not a pdf".to_vec()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_input_fails_gracefully() {
        let result = extract_pdf_text(Vec::new()).await;
        assert!(result.is_err());
    }
}
