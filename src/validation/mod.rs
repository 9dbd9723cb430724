/// Submission validation module
///
/// Checks an untrusted post submission against shape and size rules and
/// turns it into a typed payload
use crate::{
    blob_store::ImageUpload,
    config::PostLimits,
    error::{PostError, PostResult},
    posts::Visibility,
};

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// One `image` entry exactly as it arrived in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawImage {
    /// A previously stored image the caller wants to keep
    Url(String),
    /// A new file to upload
    File { file_name: String, data: Vec<u8> },
    /// Anything else, with a short description of what it was
    Unsupported(String),
}

/// Raw submission as collected from the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSubmission {
    pub text: Option<String>,
    pub images: Vec<RawImage>,
    pub visibility: Option<String>,
}

/// Validated image entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEntry {
    Keep(String),
    Upload(ImageUpload),
}

/// Validated post payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
    pub text: String,
    pub images: Vec<ImageEntry>,
    pub visibility: Visibility,
}

impl PostPayload {
    /// Split images into URLs to keep and files to upload, each in submission order
    pub fn split_images(self) -> (String, Vec<String>, Vec<ImageUpload>, Visibility) {
        let mut kept = Vec::new();
        let mut uploads = Vec::new();
        for image in self.images {
            match image {
                ImageEntry::Keep(url) => kept.push(url),
                ImageEntry::Upload(upload) => uploads.push(upload),
            }
        }
        (self.text, kept, uploads, self.visibility)
    }
}

/// Submission validator
#[derive(Debug, Clone)]
pub struct PostValidator {
    limits: PostLimits,
}

impl Default for PostValidator {
    fn default() -> Self {
        Self::new(PostLimits::default())
    }
}

impl PostValidator {
    /// Create a validator enforcing the given limits
    pub fn new(limits: PostLimits) -> Self {
        Self { limits }
    }

    /// Validate a submission.
    ///
    /// Every failing field is reported in one `Validation` error so the caller
    /// can fix them all at once.
    pub fn validate(&self, submission: RawSubmission) -> PostResult<PostPayload> {
        let mut errors = Vec::new();

        let text = self.check_text(submission.text, &mut errors);
        let images = self.check_images(submission.images, &mut errors);
        let visibility = check_visibility(submission.visibility.as_deref(), &mut errors);

        match (text, visibility) {
            (Some(text), Some(visibility)) if errors.is_empty() => Ok(PostPayload {
                text,
                images,
                visibility,
            }),
            _ => Err(PostError::Validation(
                errors
                    .iter()
                    .map(|e| format!("{}: {}", e.path, e.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
        }
    }

    fn check_text(&self, text: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
        let Some(text) = text else {
            errors.push(FieldError::new("text", "Required field 'text' is missing"));
            return None;
        };

        let length = text.chars().count();
        if length < self.limits.text_min_chars {
            errors.push(FieldError::new(
                "text",
                format!(
                    "Text must be at least {} characters",
                    self.limits.text_min_chars
                ),
            ));
            return None;
        }
        if length > self.limits.text_max_chars {
            errors.push(FieldError::new(
                "text",
                format!(
                    "Text exceeds maximum length of {} characters: {}",
                    self.limits.text_max_chars, length
                ),
            ));
            return None;
        }

        Some(text)
    }

    fn check_images(&self, images: Vec<RawImage>, errors: &mut Vec<FieldError>) -> Vec<ImageEntry> {
        if images.len() > self.limits.max_images {
            errors.push(FieldError::new(
                "images",
                format!(
                    "You cannot add more than {} images: {}",
                    self.limits.max_images,
                    images.len()
                ),
            ));
        }

        let mut entries = Vec::with_capacity(images.len());
        for (i, image) in images.into_iter().enumerate() {
            let path = format!("images[{}]", i);
            match image {
                RawImage::Url(url) => {
                    let url = url.trim();
                    if url.is_empty() {
                        errors.push(FieldError::new(path, "Image reference cannot be empty"));
                    } else {
                        entries.push(ImageEntry::Keep(url.to_string()));
                    }
                }
                RawImage::File { file_name, data } => {
                    if let Some(upload) = self.check_file(&path, file_name, data, errors) {
                        entries.push(ImageEntry::Upload(upload));
                    }
                }
                RawImage::Unsupported(what) => {
                    errors.push(FieldError::new(
                        path,
                        format!("Expected an image URL or an image file, got {}", what),
                    ));
                }
            }
        }

        entries
    }

    fn check_file(
        &self,
        path: &str,
        file_name: String,
        data: Vec<u8>,
        errors: &mut Vec<FieldError>,
    ) -> Option<ImageUpload> {
        if file_name.trim().is_empty() {
            errors.push(FieldError::new(path, "Image file must have a name"));
            return None;
        }
        if data.is_empty() {
            errors.push(FieldError::new(path, "Image file is empty"));
            return None;
        }
        if data.len() > self.limits.max_image_bytes {
            errors.push(FieldError::new(
                path,
                format!(
                    "Image too large! Max {} bytes: {}",
                    self.limits.max_image_bytes,
                    data.len()
                ),
            ));
            return None;
        }

        match image::guess_format(&data) {
            Ok(format) => Some(ImageUpload {
                file_name,
                mime_type: format.to_mime_type().to_string(),
                data,
            }),
            Err(_) => {
                errors.push(FieldError::new(path, "Invalid image!"));
                None
            }
        }
    }
}

fn check_visibility(visibility: Option<&str>, errors: &mut Vec<FieldError>) -> Option<Visibility> {
    match visibility.map(Visibility::from_str) {
        Some(Ok(visibility)) => Some(visibility),
        _ => {
            errors.push(FieldError::new(
                "visibility",
                "Please select a valid visibility option.",
            ));
            None
        }
    }
}
