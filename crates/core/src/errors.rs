use thiserror::Error;

use crate::flows::FlowTransitionError;

pub const NOT_READY_DETAIL: &str = "Model not loaded yet";
pub const INTERNAL_ERROR_DETAIL: &str = "Internal Server Error";
pub const EMPTY_MESSAGE_DETAIL: &str = "پیغام خالی نہیں ہو سکتا";
pub const CHAT_FALLBACK_REPLY: &str = "کچھ مسئلہ پیش آیا، دوبارہ کوشش کریں";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotReady,
    InvalidInput,
    GenerationFailure,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("oracle is not ready (state: {state})")]
    NotReady { state: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("generation failed: {message}")]
    GenerationFailure { message: String },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::GenerationFailure { .. } => ErrorKind::GenerationFailure,
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationFailure { message: message.into() }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        Self::GenerationFailure { message: value.to_string() }
    }
}

/// Public surfaces that apply an error policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Generate,
    Chat,
}

/// What a caller gets to see for a given failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Report the failure with this status and detail.
    Expose { status: u16, detail: String },
    /// Hide the failure behind a successful reply carrying `fallback`.
    Mask { status: u16, fallback: String },
}

impl ErrorDisposition {
    pub fn status(&self) -> u16 {
        match self {
            Self::Expose { status, .. } | Self::Mask { status, .. } => *status,
        }
    }

    pub fn is_masked(&self) -> bool {
        matches!(self, Self::Mask { .. })
    }
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Chat => "chat",
        }
    }

    /// Per-endpoint policy table.
    ///
    /// | kind              | generate   | chat                |
    /// |-------------------|------------|---------------------|
    /// | NotReady          | 503        | 503                 |
    /// | InvalidInput      | 400        | 400                 |
    /// | GenerationFailure | 500, opaque| 200 + fallback reply|
    pub fn disposition(&self, error: &ServiceError) -> ErrorDisposition {
        match (self, error) {
            (_, ServiceError::NotReady { .. }) => {
                ErrorDisposition::Expose { status: 503, detail: NOT_READY_DETAIL.to_string() }
            }
            (_, ServiceError::InvalidInput { message }) => {
                ErrorDisposition::Expose { status: 400, detail: message.clone() }
            }
            (Self::Generate, ServiceError::GenerationFailure { .. }) => {
                ErrorDisposition::Expose { status: 500, detail: INTERNAL_ERROR_DETAIL.to_string() }
            }
            (Self::Chat, ServiceError::GenerationFailure { .. }) => {
                ErrorDisposition::Mask { status: 200, fallback: CHAT_FALLBACK_REPLY.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        DomainError, Endpoint, ErrorDisposition, ErrorKind, ServiceError, CHAT_FALLBACK_REPLY,
        INTERNAL_ERROR_DETAIL, NOT_READY_DETAIL,
    };

    #[test]
    fn not_ready_is_exposed_as_service_unavailable_everywhere() {
        let error = ServiceError::NotReady { state: "loading".to_owned() };

        for endpoint in [Endpoint::Generate, Endpoint::Chat] {
            assert_eq!(
                endpoint.disposition(&error),
                ErrorDisposition::Expose { status: 503, detail: NOT_READY_DETAIL.to_owned() }
            );
        }
    }

    #[test]
    fn invalid_input_keeps_its_message() {
        let error = ServiceError::InvalidInput { message: "user_message is empty".to_owned() };
        let disposition = Endpoint::Chat.disposition(&error);

        assert_eq!(disposition.status(), 400);
        assert!(!disposition.is_masked());
        assert!(matches!(
            disposition,
            ErrorDisposition::Expose { ref detail, .. } if detail == "user_message is empty"
        ));
    }

    #[test]
    fn generation_failure_is_masked_on_chat_only() {
        let error = ServiceError::generation("cuda out of memory");

        let chat = Endpoint::Chat.disposition(&error);
        assert_eq!(
            chat,
            ErrorDisposition::Mask { status: 200, fallback: CHAT_FALLBACK_REPLY.to_owned() }
        );

        let generate = Endpoint::Generate.disposition(&error);
        assert_eq!(
            generate,
            ErrorDisposition::Expose { status: 500, detail: INTERNAL_ERROR_DETAIL.to_owned() }
        );
    }

    #[test]
    fn underlying_detail_never_reaches_the_disposition() {
        let error = ServiceError::generation("secret stack trace");

        for endpoint in [Endpoint::Generate, Endpoint::Chat] {
            let rendered = format!("{:?}", endpoint.disposition(&error));
            assert!(!rendered.contains("secret stack trace"));
        }
    }

    #[test]
    fn domain_errors_surface_as_generation_failures() {
        let error = ServiceError::from(DomainError::InvariantViolation("double write".to_owned()));
        assert_eq!(error.kind(), ErrorKind::GenerationFailure);
    }
}
