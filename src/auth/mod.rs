// Signed URL authentication
pub mod middleware;
pub mod signature;

pub use middleware::{SignatureParams, SignedRequest};
pub use signature::{Rejection, UrlSigner};
