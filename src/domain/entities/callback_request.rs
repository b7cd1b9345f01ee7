use serde::Deserialize;

/// Query parameters of one redirect-back request from the provider.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CallbackRequest {
    pub code: Option<String>,
    #[serde(rename = "state")]
    pub returned_state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackRequest {
    pub fn success(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            returned_state: Some(state.into()),
            ..Self::default()
        }
    }

    pub fn denied(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn code(&self) -> Option<&str> {
        non_empty(&self.code)
    }

    pub fn returned_state(&self) -> Option<&str> {
        non_empty(&self.returned_state)
    }

    pub fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }

    /// False for a plain page load that carries none of the callback fields.
    pub fn is_callback(&self) -> bool {
        self.code().is_some() || self.returned_state().is_some() || self.error().is_some()
    }
}

// `?code=&state=` arrives as empty strings; treat them as absent
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
