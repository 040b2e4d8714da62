//! Macro for implementing Display and FromStr for configuration enums
//!
//! Configuration values arrive as strings from environment variables and
//! files. This macro gives an enum a single canonical spelling for `Display`
//! and case-insensitive parsing for `FromStr`.
//!
//! # Example
//!
//! ```rust
//! use syncloop_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Verbosity {
//!     Quiet,
//!     Normal,
//!     Loud,
//! }
//!
//! impl_domain_enum_conversions!(Verbosity {
//!     Quiet => "quiet",
//!     Normal => "normal",
//!     Loud => "loud",
//! });
//!
//! assert_eq!("LOUD".parse::<Verbosity>().unwrap(), Verbosity::Loud);
//! ```

/// Implements Display and FromStr for a fieldless enum
///
/// Parsing failures are reported as [`DomainError::Config`] naming the enum
/// and the rejected input.
///
/// [`DomainError::Config`]: crate::errors::DomainError::Config
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::DomainError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::DomainError::Config(format!(
                        "Invalid {}: {}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}
