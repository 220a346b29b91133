//! Helpers for declaring actix route tables.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generates `pub fn routes(config: &mut ServiceConfig)` registering every
/// listed handler. `route` entries register a handler service, `module`
/// entries delegate to that module's own `routes` function.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     module history,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($($body:tt)*) => {
        pub fn routes(config: &mut $crate::actix_web::web::ServiceConfig) {
            $crate::__register_routes!(config; $($body)*);
        }
    };
}

#[cfg(feature = "actix")]
#[doc(hidden)]
#[macro_export]
macro_rules! __register_routes {
    ($config:ident;) => {};
    ($config:ident; route $handler:ident $(, $($rest:tt)*)?) => {
        $config.service($handler);
        $crate::__register_routes!($config; $($($rest)*)?);
    };
    ($config:ident; module $module:ident $(, $($rest:tt)*)?) => {
        $module::routes($config);
        $crate::__register_routes!($config; $($($rest)*)?);
    };
}
