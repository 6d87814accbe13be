// SPDX-License-Identifier: MPL-2.0

mod session;
pub mod settings;

pub use session::{Session, SessionError, SessionManager};
pub use settings::AppSettings;
