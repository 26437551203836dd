/// Credential validation failures.
///
/// Everything except `AmbiguousCredentials` and `NotAllowListed` renders as
/// a generic 401: the caller must not learn whether a key was unknown,
/// malformed or expired.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential presented.
    #[error("Authentication credentials required")]
    MissingCredentials,

    /// Both X-API-Key and Authorization were presented.
    #[error("Ambiguous credentials: provide either X-API-Key or Authorization, not both")]
    AmbiguousCredentials,

    /// Malformed, unknown or expired credential (generic — prevents
    /// enumeration).
    #[error("Invalid authentication credentials")]
    InvalidCredentials,

    /// The key resolved to a principal outside the global admin allow-list.
    #[error("Principal '{0}' is not allow-listed for gateway access")]
    NotAllowListed(String),
}
