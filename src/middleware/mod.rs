// SPDX-License-Identifier: MIT

//! Middleware modules (session handling, security headers).

pub mod security;
pub mod session;

pub use session::{attach_session, require_user, CurrentUser, SessionHandle};
