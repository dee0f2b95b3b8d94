use axum::extract::Multipart;
use mindmap_core::CandidateFile;

/// Parse a multipart form upload into the files it carries.
///
/// Every `file` part is returned in order; intake decides which are usable.
/// Other fields are ignored.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<Vec<CandidateFile>, String> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form field: {}", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" | "pdf" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let media_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {}", e))?
                    .to_vec();

                files.push(CandidateFile {
                    name: filename,
                    media_type,
                    bytes,
                });
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    if files.is_empty() {
        return Err("No file uploaded".to_string());
    }
    Ok(files)
}
