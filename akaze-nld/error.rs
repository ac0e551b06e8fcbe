use akaze_core::ConfigError;

#[derive(Debug)]
pub enum ScaleSpaceError {
    InvalidImageSize { width: usize, height: usize },
    InvalidImageData { expected_len: usize, actual_len: usize },
    InvalidConfig(ConfigError),
}

impl std::fmt::Display for ScaleSpaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleSpaceError::InvalidImageSize { width, height } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", width, height)
            }
            ScaleSpaceError::InvalidImageData { expected_len, actual_len } => {
                write!(f, "Image data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            ScaleSpaceError::InvalidConfig(e) => {
                write!(f, "Invalid configuration: {}", e)
            }
        }
    }
}

impl std::error::Error for ScaleSpaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleSpaceError::InvalidConfig(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for ScaleSpaceError {
    fn from(err: ConfigError) -> Self {
        ScaleSpaceError::InvalidConfig(err)
    }
}

pub type ScaleSpaceResult<T> = Result<T, ScaleSpaceError>;
