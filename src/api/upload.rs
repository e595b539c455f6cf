/// Multipart form collection for tool submissions, media and logos
use crate::{
    error::{MarketError, MarketResult},
    media::UploadedFile,
};
use axum::extract::Multipart;
use std::collections::HashMap;

/// Text fields and files from a multipart body
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl FormData {
    /// Drain a multipart body; parts with a filename are files
    pub async fn collect(mut multipart: Multipart) -> MarketResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| MarketError::Validation(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();

            if file_name.is_some() {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| MarketError::Validation(format!("Failed to read upload: {}", e)))?;
                if data.is_empty() {
                    continue;
                }
                form.files.push((
                    name,
                    UploadedFile {
                        data: data.to_vec(),
                        content_type,
                        file_name,
                    },
                ));
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| MarketError::Validation(format!("Failed to read field: {}", e)))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Text field, trimmed; empty values count as absent
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Text field that must be present
    pub fn required(&self, name: &str) -> MarketResult<String> {
        self.text(name)
            .ok_or_else(|| MarketError::Validation(format!("{} is required", name)))
    }

    /// Integer field; unparsable values count as absent
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.text(name).and_then(|v| v.parse().ok())
    }

    /// Take the first file sent under a field name
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    /// Take every file sent under a field name
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (matching, rest): (Vec<_>, Vec<_>) =
            self.files.drain(..).partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }

    #[cfg(test)]
    pub(crate) fn with(fields: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: files
                .into_iter()
                .map(|(name, file)| (name.to_string(), file))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str) -> UploadedFile {
        UploadedFile {
            data: vec![1, 2, 3],
            content_type: content_type.to_string(),
            file_name: Some("f".to_string()),
        }
    }

    #[test]
    fn test_text_fields() {
        let form = FormData::with(&[("name", "  Writer "), ("tagline", "  ")], vec![]);
        assert_eq!(form.text("name").as_deref(), Some("Writer"));
        assert_eq!(form.text("tagline"), None);
        assert!(form.required("tagline").is_err());
    }

    #[test]
    fn test_take_files_by_field() {
        let mut form = FormData::with(
            &[],
            vec![
                ("logo", file("image/png")),
                ("mediaFiles", file("image/jpeg")),
                ("mediaFiles", file("video/mp4")),
            ],
        );

        let media = form.take_files("mediaFiles");
        assert_eq!(media.len(), 2);
        assert_eq!(media[1].content_type, "video/mp4");

        assert!(form.take_file("logo").is_some());
        assert!(form.take_file("logo").is_none());
    }
}
