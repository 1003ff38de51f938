// SPDX-License-Identifier: MPL-2.0

//! Error types for the face tracking service

use std::fmt;

/// Result type alias using [`FtsError`]
pub type FtsResult<T> = Result<T, FtsError>;

/// Top-level error type for the service
#[derive(Debug, Clone)]
pub enum FtsError {
    Config(ConfigError),
    Discovery(DiscoveryError),
    Camera(CameraError),
    Model(ModelError),
    Identity(IdentityError),
    Recorder(RecorderError),
    Controller(ControllerError),
    Other(String),
}

/// Configuration loading/validation errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// A required field was missing or empty (database credentials, model
    /// paths, secret keys, ...)
    Invalid(String),
    /// The backing file could not be read or parsed
    Load(String),
}

/// Camera/network discovery errors
#[derive(Debug, Clone)]
pub enum DiscoveryError {
    /// The global discovery deadline elapsed before completion
    Timeout,
}

/// Camera capture errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// The capture source could not be opened
    Open(String),
    /// A read from the capture source did not complete within its deadline
    ReadTimeout,
    /// The capture source disconnected mid-stream
    Disconnected,
    /// Format requested is not available on this source
    InvalidFormat(String),
}

/// Model loading / inference errors
#[derive(Debug, Clone)]
pub enum ModelError {
    /// The detector or embedder model failed to load
    Load(String),
    /// A single inference call failed (does not kill the pipeline)
    Inference(String),
}

/// Identity index errors
#[derive(Debug, Clone)]
pub enum IdentityError {
    /// `Enroll` found no face in the supplied image
    NoFace,
    /// `Enroll` found more than one face in the supplied image
    MultipleFaces,
    /// The supplied employee id already exists in the index
    Duplicate(String),
    /// A vector's dimension did not match the index dimension `D`
    DimensionMismatch { expected: usize, actual: usize },
    /// The on-disk index file was malformed or had an unexpected version/magic
    Corrupt(String),
    /// Underlying I/O failure while loading/persisting the index
    Io(String),
}

/// Attendance recorder errors
#[derive(Debug, Clone)]
pub enum RecorderError {
    /// The durable attendance store is unavailable after retry+spill
    StoreUnavailable(String),
    /// The local spill file itself could not accept a record
    SpillFull(String),
}

/// FTSController lifecycle errors
#[derive(Debug, Clone)]
pub enum ControllerError {
    /// An operation requiring a running controller was issued while stopped
    NotRunning,
    /// `Start` was issued while already running (surfaced as success, kept
    /// for completeness of the error taxonomy)
    AlreadyRunning,
}

impl fmt::Display for FtsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtsError::Config(e) => write!(f, "configuration error: {}", e),
            FtsError::Discovery(e) => write!(f, "discovery error: {}", e),
            FtsError::Camera(e) => write!(f, "camera error: {}", e),
            FtsError::Model(e) => write!(f, "model error: {}", e),
            FtsError::Identity(e) => write!(f, "identity error: {}", e),
            FtsError::Recorder(e) => write!(f, "recorder error: {}", e),
            FtsError::Controller(e) => write!(f, "controller error: {}", e),
            FtsError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(field) => write!(f, "invalid configuration field: {}", field),
            ConfigError::Load(msg) => write!(f, "failed to load configuration: {}", msg),
        }
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Timeout => write!(f, "discovery deadline elapsed"),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::Open(msg) => write!(f, "failed to open capture source: {}", msg),
            CameraError::ReadTimeout => write!(f, "capture read timed out"),
            CameraError::Disconnected => write!(f, "capture source disconnected"),
            CameraError::InvalidFormat(msg) => write!(f, "invalid capture format: {}", msg),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Load(msg) => write!(f, "failed to load model: {}", msg),
            ModelError::Inference(msg) => write!(f, "inference failed: {}", msg),
        }
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::NoFace => write!(f, "no face detected in image"),
            IdentityError::MultipleFaces => write!(f, "more than one face detected in image"),
            IdentityError::Duplicate(id) => write!(f, "identity '{}' already enrolled", id),
            IdentityError::DimensionMismatch { expected, actual } => write!(
                f,
                "embedding dimension mismatch: expected {}, got {}",
                expected, actual
            ),
            IdentityError::Corrupt(msg) => write!(f, "identity index corrupt: {}", msg),
            IdentityError::Io(msg) => write!(f, "identity index I/O error: {}", msg),
        }
    }
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderError::StoreUnavailable(msg) => {
                write!(f, "attendance store unavailable: {}", msg)
            }
            RecorderError::SpillFull(msg) => write!(f, "attendance spill file unusable: {}", msg),
        }
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::NotRunning => write!(f, "controller is not running"),
            ControllerError::AlreadyRunning => write!(f, "controller is already running"),
        }
    }
}

impl std::error::Error for FtsError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for DiscoveryError {}
impl std::error::Error for CameraError {}
impl std::error::Error for ModelError {}
impl std::error::Error for IdentityError {}
impl std::error::Error for RecorderError {}
impl std::error::Error for ControllerError {}

impl From<ConfigError> for FtsError {
    fn from(e: ConfigError) -> Self {
        FtsError::Config(e)
    }
}
impl From<DiscoveryError> for FtsError {
    fn from(e: DiscoveryError) -> Self {
        FtsError::Discovery(e)
    }
}
impl From<CameraError> for FtsError {
    fn from(e: CameraError) -> Self {
        FtsError::Camera(e)
    }
}
impl From<ModelError> for FtsError {
    fn from(e: ModelError) -> Self {
        FtsError::Model(e)
    }
}
impl From<IdentityError> for FtsError {
    fn from(e: IdentityError) -> Self {
        FtsError::Identity(e)
    }
}
impl From<RecorderError> for FtsError {
    fn from(e: RecorderError) -> Self {
        FtsError::Recorder(e)
    }
}
impl From<ControllerError> for FtsError {
    fn from(e: ControllerError) -> Self {
        FtsError::Controller(e)
    }
}

impl From<String> for FtsError {
    fn from(msg: String) -> Self {
        FtsError::Other(msg)
    }
}

impl From<&str> for FtsError {
    fn from(msg: &str) -> Self {
        FtsError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for IdentityError {
    fn from(err: std::io::Error) -> Self {
        IdentityError::Io(err.to_string())
    }
}

impl From<std::io::Error> for FtsError {
    fn from(err: std::io::Error) -> Self {
        FtsError::Other(err.to_string())
    }
}
