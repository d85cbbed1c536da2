// Session login/logout
//
// Login returns an opaque cookie in the envelope's data. The channel never
// stores it; the caller (the session manager) owns it and passes it back on
// every authenticated call.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;
use crate::models::{
    ApplicationRole, AuthFailureReason, Empty, LoginData, LoginRequest, Operation, SessionCookie,
};
use crate::transport::TransportChannel;

impl TransportChannel {
    /// Authenticate with username, password and application role.
    ///
    /// Every rejection is reported as [`Error::Authentication`] with a
    /// classified reason. Network and protocol failures keep their own
    /// variants so callers can tell "wrong password" from "unreachable".
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        role: &ApplicationRole,
    ) -> Result<SessionCookie, Error> {
        debug!(username, %role, "logging in at {}", self.base_url());

        let body = LoginRequest {
            username,
            password: password.expose_secret(),
            role,
        };

        let data: LoginData = self
            .send(Operation::Login, &body, None)
            .await
            .map_err(classify_login_error)?;

        if data.cookie.is_empty() {
            return Err(Error::Authentication {
                reason: AuthFailureReason::Unknown,
                message: "controller issued an empty session cookie".into(),
            });
        }

        debug!("login successful");
        Ok(SessionCookie::new(data.cookie))
    }

    /// End the session identified by `cookie`.
    pub async fn logout(&self, cookie: &SessionCookie) -> Result<(), Error> {
        debug!("logging out at {}", self.base_url());
        self.send_unit(Operation::Logout, &Empty {}, Some(cookie))
            .await?;
        debug!("logout complete");
        Ok(())
    }
}

fn classify_login_error(err: Error) -> Error {
    match err {
        Error::SessionExpired => Error::Authentication {
            reason: AuthFailureReason::InvalidCredentials,
            message: "login rejected (HTTP 401)".into(),
        },
        Error::Forbidden { message } => Error::Authentication {
            reason: AuthFailureReason::AccessRestricted,
            message,
        },
        Error::Remote { code, message } => Error::Authentication {
            reason: AuthFailureReason::from_code(code.as_deref()),
            message,
        },
        other => other,
    }
}
