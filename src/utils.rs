use rocket::http::Status;
use rocket::request::Request;
use rocket::response::content::RawJson;
use rocket::response::{self, Responder, Response};
use serde_json::Value;

pub fn json_response(
    req: &Request<'_>,
    json: &Value,
    status: Status,
) -> response::Result<'static> {
    let body = json.to_string();
    RawJson(body)
        .respond_to(req)
        .and_then(|resp| Response::build_from(resp).status(status).ok())
}
