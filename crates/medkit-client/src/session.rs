//! Notification hook for an ended session

/// Receives notice that the session can no longer be recovered.
///
/// Called after the credential pair was cleared because there was no refresh
/// token or the refresh call failed. The observer owns the reaction (send
/// the user to a login screen, print a prompt); the client only reports.
pub trait SessionObserver: Send + Sync {
    fn session_expired(&self);
}

impl<F> SessionObserver for F
where
    F: Fn() + Send + Sync,
{
    fn session_expired(&self) {
        self()
    }
}
