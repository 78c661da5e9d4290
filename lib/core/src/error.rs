//! Error handling foundation for skycast.
//!
//! Only the `Result` alias lives here. Each crate owns its domain error
//! enums and wraps lower-level reports with `.context()` when an error
//! crosses into its layer.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_carries_typed_context() {
        #[derive(Debug)]
        struct Boom;

        impl std::fmt::Display for Boom {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "boom")
            }
        }

        impl std::error::Error for Boom {}

        let failed: Result<(), Boom> = Err(Boom.into());
        let report = failed.expect_err("should fail");
        assert_eq!(report.current_context().to_string(), "boom");
    }
}
