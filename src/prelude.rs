//! Imports for syntax extensions.

pub use crate::Error as _;
pub use crate::http::{HttpClient as _, HttpResponse as _};
pub use crate::signature::SignatureMethod as _;
