use std::collections::BTreeMap;
use std::fmt;

use tonic::{Code, Status};

use crate::db::{Article, NewArticle, NewComment};

pub trait Validate
where
    Self: Sized,
{
    fn validate(self) -> Result<Self, ValidationError>;
}

/// Failure of a handler, already carrying the message the client will see.
///
/// Several pairings of code and message look odd (a missing article is an
/// `InvalidArgument`, a failed delete is `Unauthenticated`); existing clients
/// depend on them, so they are kept as they are.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(&'static str),
    NotFound(&'static str),
    InvalidArgument(&'static str),
    Validation(ValidationError),
    Aborted(&'static str),
    Canceled(&'static str),
    Internal(&'static str),
}

impl ApiError {
    pub fn code(&self) -> Code {
        match self {
            ApiError::Unauthenticated(_) => Code::Unauthenticated,
            ApiError::NotFound(_) => Code::NotFound,
            ApiError::InvalidArgument(_) | ApiError::Validation(_) => Code::InvalidArgument,
            ApiError::Aborted(_) => Code::Aborted,
            ApiError::Canceled(_) => Code::Cancelled,
            ApiError::Internal(_) => Code::Internal,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::Validation(errors) => write!(f, "validation error: {}", errors),
            ApiError::Unauthenticated(msg)
            | ApiError::NotFound(msg)
            | ApiError::InvalidArgument(msg)
            | ApiError::Aborted(msg)
            | ApiError::Canceled(msg)
            | ApiError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl From<ApiError> for Status {
    fn from(err: ApiError) -> Status {
        Status::new(err.code(), err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Swaps any error for a fixed client-facing [`ApiError`], logging the cause.
pub trait OrReject<T> {
    fn or_reject(self, err: ApiError) -> ApiResult<T>;
}

impl<T, E: fmt::Display> OrReject<T> for Result<T, E> {
    fn or_reject(self, err: ApiError) -> ApiResult<T> {
        self.map_err(|cause| {
            tracing::warn!(code = ?err.code(), %cause, "{}", err);
            err
        })
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ValidationError(BTreeMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        self.0.entry(key.into()).or_default().push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            self.0.entry(key).or_default().extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (field, errors)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, errors.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn check_article(title: &str, tags: &[String]) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if title.trim().is_empty() {
        errors.add_error("title", "can't be blank");
    }
    if tags.iter().any(|tag| tag.trim().is_empty()) {
        errors.add_error("tagList", "tags can't be blank");
    }
    errors.into_result()
}

impl Validate for NewArticle {
    fn validate(self) -> Result<Self, ValidationError> {
        check_article(&self.title, &self.tags)?;
        Ok(self)
    }
}

impl Validate for Article {
    fn validate(self) -> Result<Self, ValidationError> {
        check_article(&self.title, &self.tags)?;
        Ok(self)
    }
}

impl Validate for NewComment {
    fn validate(self) -> Result<Self, ValidationError> {
        if self.body.trim().is_empty() {
            return Err(ValidationError::from("body", "can't be blank"));
        }
        Ok(self)
    }
}
