use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("course catalog unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("classification failure: {0}")]
    Classification(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "The request could not be verified.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Catalog(_) | Self::Integration(_))
    }

    /// Chat-facing text for a failed pipeline run.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Store(_) => {
                "I couldn't reach your saved classes right now. Please try again in a moment."
            }
            Self::Catalog(_) => {
                "I couldn't reach the course catalog right now. Please try again in a moment."
            }
            Self::Classification(_) => "I'm sorry. I didn't understand what you said.",
            Self::Integration(_) | Self::Configuration(_) => {
                "Something went wrong on my end. Please try again in a moment."
            }
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Classification(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Store(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Catalog(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, CatalogError, InterfaceError, StoreError};

    #[test]
    fn store_error_maps_to_service_unavailable_interface_error() {
        let interface = ApplicationError::from(StoreError::Unavailable("timed out".to_owned()))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::ServiceUnavailable {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn unavailable_errors_have_chat_safe_messages() {
        let store = ApplicationError::from(StoreError::Unavailable("db locked".to_owned()));
        let catalog = ApplicationError::from(CatalogError::Unavailable("timeout".to_owned()));

        assert!(store.is_unavailable());
        assert!(catalog.is_unavailable());
        assert!(!store.user_message().contains("db locked"));
        assert!(catalog.user_message().contains("course catalog"));
    }

    #[test]
    fn classification_error_maps_to_bad_request() {
        let interface =
            ApplicationError::Classification("empty text".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("missing page token".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
