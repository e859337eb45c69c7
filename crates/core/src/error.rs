use facility_files::FilesError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("upload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
    #[error("file storage error: {0}")]
    Files(#[from] FilesError),
}

impl CoreError {
    /// Message suitable for returning to the uploader.
    ///
    /// Internal details (paths, OS errors) are not included.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::PayloadTooLarge { limit, .. } => {
                format!("file is too large (maximum {} MB)", limit / crate::constants::BYTES_PER_MB)
            }
            CoreError::Files(FilesError::UnsupportedType { category }) => {
                category.rejection_message().to_owned()
            }
            CoreError::Files(FilesError::InvalidLocationArgs(e)) => e.to_string(),
            _ => "upload failed, please try again".to_owned(),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
