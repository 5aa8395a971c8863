//! Metric and log emission.
//!
//! Each event registers its metric handles once in `register` and records
//! through them in `emit`, alongside a `tracing` event.

/// Declares an event struct holding registered metric handles.
///
/// Arguments in braces after the event name are passed to `register` and may
/// be used as metric labels.
macro_rules! registered_event {
    (
        $event:ident $({ $($arg:ident: $arg_ty:ty),* $(,)? })? => {
            $($field:ident: $type:ty = $value:expr,)*
        }

        fn emit(&$slf:ident, $data_name:ident: $data:ty) $emit_body:block
    ) => {
        #[derive(Clone)]
        pub struct $event {
            $($field: $type,)*
        }

        impl $event {
            pub fn register($($($arg: $arg_ty),*)?) -> Self {
                Self {
                    $($field: $value,)*
                }
            }

            pub fn emit(&$slf, $data_name: $data) $emit_body
        }
    };
}

pub(crate) use registered_event;

mod pressure;
mod request_completion;

pub use pressure::{PressureApplied, PressureFinished};
pub use request_completion::{RequestCompleted, RequestOutcome};
