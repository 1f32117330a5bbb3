use crate::common::ParamError;
use crate::numerics::{CoercionError, ProjectionError, ProjectionErrorKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ProjdsResult<T> = Result<T, ProjdsError>;
pub type ComputeResult<T> = ProjdsResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjdsErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl ProjdsErrorCategory {
    pub const fn exit_status(self) -> ExitStatus {
        match self {
            Self::Success => ExitStatus {
                exit_code: 0,
                rust_category: "Success",
            },
            Self::InputValidationError => ExitStatus {
                exit_code: 2,
                rust_category: "InputValidationError",
            },
            Self::IoSystemError => ExitStatus {
                exit_code: 3,
                rust_category: "IoSystemError",
            },
            Self::ComputationError => ExitStatus {
                exit_code: 4,
                rust_category: "ComputationError",
            },
            Self::InternalError => ExitStatus {
                exit_code: 5,
                rust_category: "InternalError",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_status().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.exit_status().rust_category
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub exit_code: i32,
    pub rust_category: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjdsError {
    category: ProjdsErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl ProjdsError {
    pub fn new(
        category: ProjdsErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            ProjdsErrorCategory::InputValidationError,
            placeholder,
            message,
        )
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProjdsErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProjdsErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProjdsErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> ProjdsErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for ProjdsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.rust_category(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for ProjdsError {}

impl From<ProjectionError> for ProjdsError {
    fn from(error: ProjectionError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ProjectionErrorKind::ShapeMismatch => {
                Self::input_validation("INPUT.SHAPE_MISMATCH", message)
            }
            ProjectionErrorKind::TypeMismatch => {
                Self::input_validation("INPUT.TYPE_MISMATCH", message)
            }
            ProjectionErrorKind::ResourceExhausted => {
                Self::computation("RUN.RESOURCE_EXHAUSTED", message)
            }
            ProjectionErrorKind::Cancelled => Self::computation("RUN.CANCELLED", message),
        }
    }
}

impl From<CoercionError> for ProjdsError {
    fn from(error: CoercionError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ProjectionErrorKind::TypeMismatch => {
                Self::input_validation("INPUT.TYPE_MISMATCH", message)
            }
            _ => Self::input_validation("INPUT.SHAPE_MISMATCH", message),
        }
    }
}

impl From<ParamError> for ProjdsError {
    fn from(error: ParamError) -> Self {
        let message = error.to_string();
        match error {
            ParamError::Read { .. } => Self::io_system("IO.PARAM_READ", message),
            _ => Self::input_validation("INPUT.PARAM", message),
        }
    }
}
