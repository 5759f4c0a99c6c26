//! Macros shared by the stream builders.

/// Validate that a value is greater than zero, returning an error otherwise.
macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err($crate::error::BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

pub(crate) use ensure_positive;

/// Generate a consuming setter storing `Some(value)` in an optional field.
macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $($field:ident).+, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$($field).+ = Some(value);
            self
        }
    };
}

pub(crate) use option_setter;

/// Generate the recovery tuning setters every stream builder exposes.
///
/// The builder must hold a [`StreamSettings`](super::common::StreamSettings)
/// in a field named `settings`.
macro_rules! stream_settings_setters {
    () => {
        /// Override backoff timings using the provided overrides.
        ///
        /// See [`BackoffOverrides`](crate::builders::BackoffOverrides) for
        /// fluent helpers when constructing the override set from Rust.
        pub fn with_backoff(mut self, overrides: $crate::builders::BackoffOverrides) -> Self {
            self.settings.backoff = overrides;
            self
        }

        $crate::builders::builder_macros::option_setter!(
            #[doc = "Reports emitted per failure episode before suppression."]
            with_status_limit,
            settings.status_limit,
            u32
        );
        $crate::builders::builder_macros::option_setter!(
            #[doc = "Minimum spacing of suppressed-report and dropped-write summaries."]
            with_warn_interval_ms,
            settings.warn_interval_ms,
            u64
        );

        /// Send diagnostics to `reporter` instead of the `log` facade.
        pub fn with_reporter(mut self, reporter: $crate::reporter::SharedReporter) -> Self {
            self.settings.reporter = Some(reporter);
            self
        }
    };
}

pub(crate) use stream_settings_setters;
