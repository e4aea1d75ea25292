//! ## Logging Configuration
//!
//! This module sets up logging automatically at program startup using the `ctor` crate.
//! Logging behavior is controlled by the `DEBUG_TABULAR_PIPELINE` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no subscriber is installed and the library's `tracing` events are dropped.
//! - **Enabled**: Any other value installs a formatting subscriber with a maximum level of `DEBUG`.
//!
//! Applications that install their own subscriber should leave the variable unset.
//!
//! ```sh
//! export DEBUG_TABULAR_PIPELINE=true
//! ```

use ctor::ctor;
use tracing::Level;

fn logging_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false")))
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var("DEBUG_TABULAR_PIPELINE").ok();
    if logging_enabled(value.as_deref()) {
        // try_init: a host application may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}
