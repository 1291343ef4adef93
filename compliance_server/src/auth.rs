use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

use crate::error::ServiceError;

pub const USER_HEADER: &str = "X-User-Id";
pub const COMPANY_HEADER: &str = "X-Company-Id";

/// Caller identity forwarded by the upstream auth proxy.
///
/// Sessions and credentials are handled upstream; this server only trusts
/// the identity headers and scopes every query by `company_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub company_id: String,
}

fn header_value(req: &Request<'_>, name: &str) -> Option<String> {
    req.headers()
        .get_one(name)
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Actor {
    type Error = ServiceError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user_id = match header_value(req, USER_HEADER) {
            Some(v) => v,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    ServiceError::Unauthorized(format!("missing {} header", USER_HEADER)),
                ))
            }
        };
        let company_id = match header_value(req, COMPANY_HEADER) {
            Some(v) => v,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    ServiceError::Unauthorized(format!("missing {} header", COMPANY_HEADER)),
                ))
            }
        };

        Outcome::Success(Actor { user_id, company_id })
    }
}
