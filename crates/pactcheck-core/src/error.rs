use thiserror::Error;

/// Core error type shared across pactcheck crates.
#[derive(Debug, Error)]
pub enum Error {
    /// An artifact could not be read or decoded.
    #[error("unreadable artifact `{path}`: {reason}")]
    Unreadable { path: String, reason: String },
}

impl Error {
    pub fn unreadable(path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Unreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias for results returned by pactcheck crates.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_names_the_path() {
        let error = Error::unreadable("contracts/types.ts", "stream did not contain valid UTF-8");
        assert_eq!(
            error.to_string(),
            "unreadable artifact `contracts/types.ts`: stream did not contain valid UTF-8"
        );
    }
}
